//! # `cloudtrace-core`: Shared types for the CloudTrace request logger
//!
//! CloudTrace is a stateless HTTP service that records which backend instance
//! served each request. This crate holds everything the server and its clients
//! agree on without doing any I/O:
//!
//! - [`id`] - Random request identifiers rendered as canonical v4 UUIDs.
//! - [`common::types`] - The append-only [`LogEntry`] and the JSON bodies
//!   returned by the HTTP surface.
//! - [`common::error`] - The persistence error taxonomy ([`StoreError`] for a
//!   single attempt, [`WriteError`] for the resolved outcome of a write).
//!
//! Identifier collisions are astronomically unlikely but not impossible, so
//! they are modelled as an ordinary [`WriteError::Collision`] outcome rather
//! than assumed away.

pub mod common;
pub mod id;

pub use common::*;
pub use id::{RandSource, RequestId, RequestIdGenerator, ThreadRandom};
