pub mod config;
pub mod gateway;
pub mod lifecycle;
pub mod probe;
pub mod service;
pub mod store;
pub mod telemetry;
