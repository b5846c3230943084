//! Error types for the log-write path.
//!
//! Two layers of errors exist. [`StoreError`] describes why a *single*
//! transactional insert attempt failed, already classified by the store
//! implementation. [`WriteError`] is the terminal outcome the persistence
//! gateway reports once its retry protocol has run.
//!
//! ## Store error cases
//! - `Collision`: The request identifier violated the uniqueness constraint.
//! - `Transient`: A network or server-availability failure that may succeed
//!   if retried.
//! - `PoolExhausted`: No pooled connection became free within the acquire
//!   timeout. Treated as transient by the gateway.
//! - `Permanent`: Anything retrying cannot fix (bad SQL, auth, other
//!   constraints).
//!
//! ## Write error cases
//! - `Collision`: The caller must mint a fresh identifier and try again.
//! - `ExhaustedRetries`: Every attempt failed transiently.
//! - `Permanent`: A non-retryable failure, surfaced after one attempt.

use crate::id::RequestId;

pub type Result<T, E = WriteError> = core::result::Result<T, E>;

/// Classified failure of one insert attempt.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// Unique-constraint violation on the request identifier.
    #[error("request id already exists")]
    Collision,

    /// Connection-level or server-unavailable failure.
    #[error("transient database error: {reason}")]
    Transient { reason: String },

    /// Connection acquisition timed out.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Non-retryable failure.
    #[error("database error: {reason}")]
    Permanent { reason: String },
}

impl StoreError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::Permanent {
            reason: reason.into(),
        }
    }

    /// Whether another attempt with the same identifier could succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::PoolExhausted)
    }
}

/// Terminal outcome of a log write after the gateway's retry protocol.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum WriteError {
    /// The identifier is already taken; regenerate and retry.
    #[error("request id {request_id} collided with an existing entry")]
    Collision { request_id: RequestId },

    /// All attempts failed with transient errors.
    #[error("gave up after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: StoreError },

    /// A non-retryable error.
    #[error(transparent)]
    Permanent(StoreError),
}

impl WriteError {
    /// Short label used for logs and metric attributes.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Collision { .. } => "collision",
            Self::ExhaustedRetries { .. } => "exhausted_retries",
            Self::Permanent(_) => "permanent",
        }
    }
}
