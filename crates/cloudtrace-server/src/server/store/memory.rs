//! Scripted in-memory [`LogStore`] for tests.
//!
//! Behaves like a bounded pool in front of a table with a unique
//! `request_id`: acquisition waits on a semaphore up to `acquire_timeout`,
//! scripted errors are returned one per attempt before anything is committed,
//! and only successful attempts become visible in [`MemoryLogStore::committed`].

use super::LogStore;
use cloudtrace_core::{LogEntry, RequestId, StoreError};
use core::time::Duration;
use std::collections::VecDeque;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use tokio::{
    sync::Semaphore,
    time::{sleep, timeout},
};

#[derive(Clone)]
pub struct MemoryLogStore {
    script: Arc<Mutex<VecDeque<StoreError>>>,
    attempts: Arc<Mutex<Vec<RequestId>>>,
    committed: Arc<Mutex<Vec<LogEntry>>>,
    pool: Arc<Semaphore>,
    acquire_timeout: Duration,
    latency: Duration,
    healthy: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self {
            script: Arc::default(),
            attempts: Arc::default(),
            committed: Arc::default(),
            pool: Arc::new(Semaphore::new(10)),
            acquire_timeout: Duration::from_secs(2),
            latency: Duration::ZERO,
            healthy: Arc::new(AtomicBool::new(true)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_pool(mut self, size: usize, acquire_timeout: Duration) -> Self {
        self.pool = Arc::new(Semaphore::new(size));
        self.acquire_timeout = acquire_timeout;
        self
    }

    /// Time each insert holds its connection, and each ping takes.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queues errors returned by the next attempts, in order.
    pub fn fail_next(self, errors: impl IntoIterator<Item = StoreError>) -> Self {
        self.script.lock().unwrap().extend(errors);
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Identifiers of every insert attempt that obtained a connection.
    pub fn attempts(&self) -> Vec<RequestId> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn committed(&self) -> Vec<LogEntry> {
        self.committed.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl LogStore for MemoryLogStore {
    async fn insert(&self, entry: &LogEntry) -> Result<(), StoreError> {
        let _permit = match timeout(self.acquire_timeout, self.pool.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(StoreError::permanent("pool closed")),
            Err(_) => return Err(StoreError::PoolExhausted),
        };

        self.attempts.lock().unwrap().push(entry.request_id);

        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        if let Some(err) = scripted {
            return Err(err);
        }

        let mut committed = self.committed.lock().unwrap();
        if committed.iter().any(|e| e.request_id == entry.request_id) {
            return Err(StoreError::Collision);
        }
        committed.push(entry.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::transient("connection refused"))
        }
    }

    async fn close(&self) {
        self.pool.close();
        self.closed.store(true, Ordering::SeqCst);
    }
}
