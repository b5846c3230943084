use crate::server::{
    config::ServerConfig, gateway::PersistenceGateway, probe::LivenessProber, store::LogStore,
};
use cloudtrace_core::{RequestIdGenerator, ThreadRandom};
use std::sync::Arc;

/// Per-process state shared by every request handler.
///
/// Nothing in here is mutated after startup; the only shared resource with
/// internal concurrency is the store's connection pool.
#[derive(Clone, Debug)]
pub struct AppState<S> {
    pub server_hostname: Arc<str>,
    pub ids: RequestIdGenerator<ThreadRandom>,
    pub gateway: PersistenceGateway<S>,
    pub prober: LivenessProber<S>,
}

impl<S> AppState<S>
where
    S: LogStore,
{
    pub fn new(config: &ServerConfig, store: S) -> Self {
        let db = &config.database;
        Self {
            server_hostname: Arc::from(config.server_hostname.as_str()),
            ids: RequestIdGenerator::new(ThreadRandom),
            gateway: PersistenceGateway::new(store.clone(), config.retry),
            prober: LivenessProber::new(store, db.acquire_timeout + db.statement_timeout),
        }
    }
}
