//! Persistence gateway: the retry protocol around a single log insert.
//!
//! Each attempt is one full transaction on the [`LogStore`]. The outcome of a
//! failed attempt decides what happens next:
//!
//! | Attempt error            | Action                                            |
//! |--------------------------|---------------------------------------------------|
//! | `Collision`              | return [`WriteError::Collision`] immediately      |
//! | `Transient`/`PoolExhausted` | back off `base * 2^(n-1)` and retry, up to `max_attempts` |
//! | `Permanent`              | return [`WriteError::Permanent`] immediately      |
//!
//! Collisions are not timing problems, so they never consume the backoff
//! schedule; the caller mints a new identifier instead.

use crate::server::{
    config::RetryPolicy,
    store::LogStore,
    telemetry::{increment_write_retries, record_write_outcome},
};
use cloudtrace_core::{LogEntry, StoreError, WriteError};
use tokio::time::sleep;

#[derive(Clone, Debug)]
pub struct PersistenceGateway<S> {
    store: S,
    policy: RetryPolicy,
}

impl<S> PersistenceGateway<S>
where
    S: LogStore,
{
    pub const fn new(store: S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Writes `entry`, retrying transient failures with exponential backoff.
    ///
    /// # Errors
    ///
    /// - [`WriteError::Collision`] if `entry.request_id` is already stored.
    /// - [`WriteError::ExhaustedRetries`] after `max_attempts` transient
    ///   failures, carrying the last one.
    /// - [`WriteError::Permanent`] on the first non-retryable failure.
    #[tracing::instrument(skip_all, fields(request_id = %entry.request_id))]
    pub async fn write_log_entry(&self, entry: &LogEntry) -> Result<(), WriteError> {
        let mut attempt = 1;
        loop {
            let err = match self.store.insert(entry).await {
                Ok(()) => {
                    tracing::debug!(attempt, "Log entry committed");
                    record_write_outcome("success");
                    return Ok(());
                }
                Err(err) => err,
            };

            let outcome = if !err.is_transient() {
                match err {
                    StoreError::Collision => WriteError::Collision {
                        request_id: entry.request_id,
                    },
                    other => WriteError::Permanent(other),
                }
            } else if attempt >= self.policy.max_attempts {
                WriteError::ExhaustedRetries {
                    attempts: attempt,
                    last: err,
                }
            } else {
                let delay = self.policy.backoff(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = self.policy.max_attempts,
                    delay = ?delay,
                    error = %err,
                    "Transient database error, retrying"
                );
                increment_write_retries();
                sleep(delay).await;
                attempt += 1;
                continue;
            };

            tracing::warn!(attempt, kind = outcome.kind(), error = %outcome, "Log write failed");
            record_write_outcome(outcome.kind());
            return Err(outcome);
        }
    }
}
