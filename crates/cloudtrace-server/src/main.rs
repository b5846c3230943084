#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use server::config::{CliArgs, ServerConfig};
use server::lifecycle::{serve, shutdown_signal, startup_check};
use server::service::{AppState, router};
use server::store::postgres::PgLogStore;
use server::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let store = PgLogStore::connect_lazy(&config.database);
    if config.database.init_schema {
        match store.init_schema().await {
            Ok(()) => tracing::info!("Schema ready"),
            Err(err) => tracing::warn!(error = %err, "Schema bootstrap failed"),
        }
    }

    let state = AppState::new(&config, store.clone());
    startup_check(&state.prober).await;

    let listener = TcpListener::bind(&config.listen_addr).await?;
    log_startup_info(&config);

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let result = serve(
        listener,
        router(state),
        store,
        shutdown,
        config.shutdown_timeout,
    )
    .await;

    match &result {
        Ok(()) => tracing::info!("Service shut down successfully"),
        Err(err) => tracing::error!(error = %err, "Service stopped with an error"),
    }

    providers.shutdown();
    result
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting CloudTrace on {} with full config: {:#?}",
            config.listen_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting CloudTrace on {} as {} (pool size {})",
            config.listen_addr,
            config.server_hostname,
            config.database.pool_size
        );
    }
}
