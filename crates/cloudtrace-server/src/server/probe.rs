//! Liveness prober for the datastore dependency.

use crate::server::{store::LogStore, telemetry::record_health_check};
use core::time::Duration;
use tokio::time::timeout;

/// Result of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub healthy: bool,
}

/// Issues a trivial query through the shared pool.
///
/// The probe is bounded by `deadline` (connection acquisition plus statement
/// timeout) and never returns an error: any failure, including the deadline
/// elapsing, is reported as `healthy: false`.
#[derive(Clone, Debug)]
pub struct LivenessProber<S> {
    store: S,
    deadline: Duration,
}

impl<S> LivenessProber<S>
where
    S: LogStore,
{
    pub const fn new(store: S, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    pub async fn probe(&self) -> Health {
        let healthy = match timeout(self.deadline, self.store.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "Database liveness probe failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    deadline = ?self.deadline,
                    "Database liveness probe timed out"
                );
                false
            }
        };
        record_health_check(healthy);
        Health { healthy }
    }
}
