//! HTTP handlers for the CloudTrace surface.
//!
//! | Method   | Path                 | Handler            |
//! |----------|----------------------|--------------------|
//! | OPTIONS  | any                  | CORS layer         |
//! | GET      | `/health`            | [`health`]         |
//! | GET,POST | `/`, `/api/request`  | [`record_request`] |
//! | any      | other                | [`not_found`]      |

use super::{client_addr::ClientAddr, error::AppError, state::AppState};
use crate::server::{probe::Health, store::LogStore, telemetry::increment_requests};
use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use cloudtrace_core::{HealthResponse, LogEntry, RequestLogResponse, WriteError};

/// Logs that this instance served the request and reports the outcome.
///
/// Always answers 200. If the write fails the body says so via
/// `db_status: "failed"`, so callers still see which node handled them while
/// the database is down.
///
/// A collision on the generated identifier is retried exactly once under a
/// fresh identifier; the gateway handles every other retry.
pub async fn record_request<S>(
    State(state): State<AppState<S>>,
    ClientAddr(client_ip): ClientAddr,
) -> Json<RequestLogResponse>
where
    S: LogStore,
{
    increment_requests("request");

    let entry = LogEntry::new(
        state.ids.next_id(),
        &*state.server_hostname,
        Utc::now(),
        client_ip,
    );

    let (entry, result) = match state.gateway.write_log_entry(&entry).await {
        Err(WriteError::Collision { request_id }) => {
            let fresh = state.ids.next_id();
            tracing::warn!(
                collided = %request_id,
                request_id = %fresh,
                "Request id collision, retrying with a fresh id"
            );
            let entry = entry.with_request_id(fresh);
            let result = state.gateway.write_log_entry(&entry).await;
            (entry, result)
        }
        result => (entry, result),
    };

    match &result {
        Ok(()) => tracing::info!(
            request_id = %entry.request_id,
            client_ip = %entry.client_address,
            "Request logged"
        ),
        Err(err) => tracing::error!(
            request_id = %entry.request_id,
            error = %err,
            "Request served without a log entry"
        ),
    }

    Json(RequestLogResponse::from_entry(
        entry,
        result.err().map(|err| err.to_string()),
    ))
}

/// Reports this node's identity and whether the database answers.
pub async fn health<S>(State(state): State<AppState<S>>) -> (StatusCode, Json<HealthResponse>)
where
    S: LogStore,
{
    increment_requests("health");

    let Health { healthy } = state.prober.probe().await;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse::new(&*state.server_hostname, Utc::now(), healthy)),
    )
}

pub async fn not_found() -> AppError {
    increment_requests("not_found");
    AppError::NotFound
}
