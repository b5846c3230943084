//! Storage seam for log entries.
//!
//! [`LogStore`] is the boundary between the retry protocol and the actual
//! datastore. One call to [`LogStore::insert`] is exactly one transactional
//! attempt; classification of the failure into a [`StoreError`] happens on
//! the store side, retrying happens above it in
//! [`crate::server::gateway::PersistenceGateway`].
//!
//! ## Implementations
//!
//! - [`postgres::PgLogStore`] - `sqlx` connection pool against PostgreSQL.
//! - `memory::MemoryLogStore` - scripted in-memory store used by tests.

#[cfg(test)]
pub mod memory;
pub mod postgres;

use cloudtrace_core::{LogEntry, StoreError};
use core::future::Future;

/// A pooled, append-only sink for [`LogEntry`] rows.
///
/// Implementations are cheap handles onto a shared pool; clones share the
/// same connections.
pub trait LogStore: Clone + Send + Sync + 'static {
    /// Acquires a connection, inserts `entry` inside a transaction and commits.
    ///
    /// On failure the transaction is rolled back and the connection is
    /// released before the classified error is returned. Nothing from a failed
    /// attempt is visible afterwards.
    fn insert(&self, entry: &LogEntry) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Round-trips a trivial query through the pool.
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Closes the pool, waiting for checked-out connections to be returned.
    fn close(&self) -> impl Future<Output = ()> + Send;
}
