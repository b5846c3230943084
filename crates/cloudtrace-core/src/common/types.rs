//! # Log entry model and HTTP wire bodies
//!
//! [`LogEntry`] is the one durable record this system writes. It is
//! append-only: built once per request, inserted at most once per committed
//! attempt, and never updated or deleted. The surrogate `sequence` key is
//! assigned by the store and never travels through application code.
//!
//! The response bodies mirror the JSON the HTTP surface emits. Field names are
//! part of the public contract consumed by the frontend.

use crate::id::RequestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One durable record of a served request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub request_id: RequestId,
    pub server_hostname: String,
    pub occurred_at: DateTime<Utc>,
    pub client_address: String,
}

impl LogEntry {
    pub fn new(
        request_id: RequestId,
        server_hostname: impl Into<String>,
        occurred_at: DateTime<Utc>,
        client_address: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            server_hostname: server_hostname.into(),
            occurred_at,
            client_address: client_address.into(),
        }
    }

    /// Same entry under a freshly minted identifier, used after a collision.
    pub fn with_request_id(self, request_id: RequestId) -> Self {
        Self { request_id, ..self }
    }
}

/// Whether the log write for this request was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbStatus {
    Success,
    Failed,
}

/// Body of `GET|POST /` and `GET|POST /api/request`.
///
/// Always returned with status 200; persistence failures are reported through
/// `db_status` and `db_error` so the caller still learns which node served it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLogResponse {
    pub request_id: RequestId,
    pub server_hostname: String,
    pub timestamp: DateTime<Utc>,
    pub client_ip: String,
    pub db_status: DbStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_error: Option<String>,
}

impl RequestLogResponse {
    pub fn from_entry(entry: LogEntry, db_error: Option<String>) -> Self {
        Self {
            request_id: entry.request_id,
            server_hostname: entry.server_hostname,
            timestamp: entry.occurred_at,
            client_ip: entry.client_address,
            db_status: if db_error.is_none() {
                DbStatus::Success
            } else {
                DbStatus::Failed
            },
            db_error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseStatus {
    Connected,
    Disconnected,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub server_hostname: String,
    pub timestamp: DateTime<Utc>,
    pub database: DatabaseStatus,
}

impl HealthResponse {
    pub fn new(server_hostname: impl Into<String>, timestamp: DateTime<Utc>, healthy: bool) -> Self {
        let (status, database) = if healthy {
            (HealthStatus::Healthy, DatabaseStatus::Connected)
        } else {
            (HealthStatus::Unhealthy, DatabaseStatus::Disconnected)
        };
        Self {
            status,
            server_hostname: server_hostname.into(),
            timestamp,
            database,
        }
    }
}

/// Body of every 404 and 500 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
