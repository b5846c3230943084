//! Shared model and error definitions used across the CloudTrace server.
//!
//! ## Submodules
//!
//! - [`error`] - Per-attempt store errors and resolved write outcomes.
//! - [`types`] - The persisted [`types::LogEntry`] and HTTP response bodies.

pub mod error;
pub mod types;

pub use error::{StoreError, WriteError};
pub use types::*;
