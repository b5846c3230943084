//! Request identifier generation.
//!
//! Every handled request gets a random 128-bit identifier rendered as a
//! canonical, hyphenated v4 UUID (36 characters). 122 of the bits are random,
//! so two identifiers collide with probability around 1 in 2^122. That is not
//! zero: the store's uniqueness constraint is the source of truth and callers
//! handle a collision by minting another identifier.

mod random;
mod request_id;

pub use random::{RandSource, ThreadRandom};
pub use request_id::{RequestId, RequestIdGenerator};
