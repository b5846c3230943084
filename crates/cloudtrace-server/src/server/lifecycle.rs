//! Process lifecycle: startup probe, signal handling and graceful drain.
//!
//! Shutdown proceeds in order:
//!
//! 1. SIGTERM or Ctrl+C cancels the shared [`CancellationToken`].
//! 2. The listener stops accepting; in-flight requests get up to the drain
//!    deadline to finish.
//! 3. The store's pool is closed. Connections still open past the deadline
//!    keep running, and closing the pool waits for their checked-out
//!    database connections (bounded by the statement timeout).
//!
//! Telemetry is flushed by the caller once [`serve`] returns.

use crate::server::{
    probe::{Health, LivenessProber},
    store::LogStore,
};
use axum::Router;
use core::time::Duration;
use std::net::SocketAddr;
use tokio::{net::TcpListener, signal, task::JoinError, time::timeout};
use tokio_util::sync::CancellationToken;

/// Runs one liveness probe before accepting traffic.
///
/// Failure is logged and otherwise ignored; the database may come up later.
pub async fn startup_check<S>(prober: &LivenessProber<S>) -> Health
where
    S: LogStore,
{
    let health = prober.probe().await;
    if health.healthy {
        tracing::info!("Database reachable at startup");
    } else {
        tracing::warn!("Database unreachable at startup, serving anyway");
    }
    health
}

/// Waits for SIGTERM or Ctrl+C, then cancels `token`.
pub async fn shutdown_signal(token: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            core::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
        () = token.cancelled() => return,
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
    token.cancel();
}

/// Serves `app` on `listener` until `shutdown` is cancelled, then drains and
/// closes `store`.
///
/// Once `drain` elapses `serve` stops waiting on the accept loop and moves on
/// to closing the pool. Connection tasks still running at that point are not
/// cancelled; their responses may still be written. The pool is closed on
/// every exit path.
pub async fn serve<S>(
    listener: TcpListener,
    app: Router,
    store: S,
    shutdown: CancellationToken,
    drain: Duration,
) -> anyhow::Result<()>
where
    S: LogStore,
{
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let mut server = tokio::spawn(server.into_future());

    let result = tokio::select! {
        joined = &mut server => {
            tracing::error!("HTTP server stopped without a shutdown signal");
            flatten(joined)
        }
        () = shutdown.cancelled() => {
            tracing::info!(
                drain_secs = drain.as_secs_f64(),
                "Draining in-flight requests"
            );
            match timeout(drain, &mut server).await {
                Ok(joined) => flatten(joined),
                Err(_) => {
                    tracing::warn!(
                        "Drain deadline elapsed, closing the pool with requests still in flight"
                    );
                    server.abort();
                    Ok(())
                }
            }
        }
    };

    store.close().await;
    tracing::info!("Connection pool closed");
    result
}

fn flatten(joined: Result<std::io::Result<()>, JoinError>) -> anyhow::Result<()> {
    Ok(joined??)
}
