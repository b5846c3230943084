//! PostgreSQL-backed [`LogStore`].
//!
//! The pool is created lazily: no connection is opened until the first query,
//! so an unreachable database never prevents the process from starting and
//! serving `/health`.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE request_logs (
//!     id              BIGSERIAL    PRIMARY KEY,
//!     request_id      VARCHAR(36)  NOT NULL UNIQUE,
//!     server_hostname VARCHAR(255) NOT NULL,
//!     timestamp       TIMESTAMPTZ  NOT NULL,
//!     client_ip       VARCHAR(45)  NOT NULL
//! );
//! ```
//!
//! with indexes on `timestamp DESC` and `server_hostname` for the aggregate
//! queries run by reporting tools outside this service. The uniqueness of
//! `request_id` is enforced here and only here.

use super::LogStore;
use crate::server::config::DatabaseConfig;
use cloudtrace_core::{LogEntry, StoreError};
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use std::io::ErrorKind;

const INSERT_LOG_ENTRY: &str = "INSERT INTO request_logs (request_id, server_hostname, timestamp, client_ip) \
     VALUES ($1, $2, $3, $4)";

/// Name Postgres gives the inline `UNIQUE` on `request_id`. A unique
/// violation on any other constraint is not an identifier collision.
const REQUEST_ID_CONSTRAINT: &str = "request_logs_request_id_key";

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS request_logs (
        id BIGSERIAL PRIMARY KEY,
        request_id VARCHAR(36) NOT NULL UNIQUE,
        server_hostname VARCHAR(255) NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        client_ip VARCHAR(45) NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_request_logs_timestamp ON request_logs (timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS idx_request_logs_server ON request_logs (server_hostname)",
];

/// A cloneable handle onto a bounded `sqlx` PostgreSQL pool.
#[derive(Clone, Debug)]
pub struct PgLogStore {
    pool: PgPool,
}

impl PgLogStore {
    /// Builds the pool without connecting.
    ///
    /// Every connection is opened with `statement_timeout` set, so a single
    /// hung query cannot hold a pool slot indefinitely.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name)
            .application_name("cloudtrace-server")
            .options([(
                "statement_timeout",
                config.statement_timeout.as_millis().to_string(),
            )]);

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy_with(options);

        Self { pool }
    }

    /// Creates `request_logs` and its indexes if they do not exist yet.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(classify)?;
        }
        Ok(())
    }
}

impl LogStore for PgLogStore {
    async fn insert(&self, entry: &LogEntry) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let inserted = sqlx::query(INSERT_LOG_ENTRY)
            .bind(entry.request_id.to_string())
            .bind(entry.server_hostname.as_str())
            .bind(entry.occurred_at)
            .bind(entry.client_address.as_str())
            .execute(&mut *tx)
            .await;

        match inserted {
            Ok(_) => tx.commit().await.map_err(classify),
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(
                        request_id = %entry.request_id,
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                Err(classify(err))
            }
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Maps a `sqlx` error onto the retry taxonomy.
pub fn classify(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
        sqlx::Error::Io(io) if is_transient_io(io.kind()) => StoreError::transient(err.to_string()),
        sqlx::Error::Database(db)
            if db.is_unique_violation()
                && db.constraint().is_none_or(|c| c == REQUEST_ID_CONSTRAINT) =>
        {
            StoreError::Collision
        }
        sqlx::Error::Database(db) => match db.code() {
            Some(code) if is_transient_sqlstate(&code) => StoreError::transient(err.to_string()),
            _ => StoreError::permanent(err.to_string()),
        },
        _ => StoreError::permanent(err.to_string()),
    }
}

const fn is_transient_io(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionRefused
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut
            | ErrorKind::UnexpectedEof
    )
}

/// SQLSTATEs that indicate the server, not the statement, is the problem.
fn is_transient_sqlstate(code: &str) -> bool {
    // Class 08: connection exception
    code.starts_with("08")
        || matches!(
            code,
            "57P01" // admin_shutdown
                | "57P02" // crash_shutdown
                | "57P03" // cannot_connect_now
                | "53300" // too_many_connections
                | "40001" // serialization_failure
                | "40P01" // deadlock_detected
                | "57014" // query_canceled (statement_timeout)
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind as DbErrorKind};
    use std::{borrow::Cow, error::Error as StdError, fmt, io};

    #[derive(Debug)]
    struct FakeDbError {
        code: &'static str,
        kind: DbErrorKind,
        constraint: Option<&'static str>,
    }

    impl FakeDbError {
        fn new(code: &'static str, kind: DbErrorKind) -> Self {
            Self {
                code,
                kind,
                constraint: None,
            }
        }

        fn on(mut self, constraint: &'static str) -> Self {
            self.constraint = Some(constraint);
            self
        }
    }

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "error with sqlstate {}", self.code)
        }
    }

    impl StdError for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "fake database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> DbErrorKind {
            match self.kind {
                DbErrorKind::UniqueViolation => DbErrorKind::UniqueViolation,
                DbErrorKind::NotNullViolation => DbErrorKind::NotNullViolation,
                _ => DbErrorKind::Other,
            }
        }
    }

    fn db(err: FakeDbError) -> StoreError {
        classify(sqlx::Error::Database(Box::new(err)))
    }

    #[test]
    fn pool_timeout_is_exhaustion() {
        assert_eq!(classify(sqlx::Error::PoolTimedOut), StoreError::PoolExhausted);
    }

    #[test]
    fn connection_level_io_is_transient() {
        for kind in [
            ErrorKind::ConnectionReset,
            ErrorKind::ConnectionRefused,
            ErrorKind::TimedOut,
            ErrorKind::BrokenPipe,
        ] {
            let err = classify(sqlx::Error::Io(io::Error::new(kind, "boom")));
            assert!(err.is_transient(), "{kind:?} should be transient");
        }
    }

    #[test]
    fn other_io_is_permanent() {
        let err = classify(sqlx::Error::Io(io::Error::new(
            ErrorKind::PermissionDenied,
            "nope",
        )));
        assert!(matches!(err, StoreError::Permanent { .. }));
    }

    #[test]
    fn closed_pool_and_decode_errors_are_permanent() {
        assert!(matches!(
            classify(sqlx::Error::PoolClosed),
            StoreError::Permanent { .. }
        ));
        assert!(matches!(
            classify(sqlx::Error::RowNotFound),
            StoreError::Permanent { .. }
        ));
    }

    #[test]
    fn sqlstate_classes() {
        assert!(is_transient_sqlstate("08006"));
        assert!(is_transient_sqlstate("08001"));
        assert!(is_transient_sqlstate("57P01"));
        assert!(is_transient_sqlstate("57P03"));
        assert!(is_transient_sqlstate("53300"));
        assert!(is_transient_sqlstate("57014"));

        assert!(!is_transient_sqlstate("23505"));
        assert!(!is_transient_sqlstate("23502"));
        assert!(!is_transient_sqlstate("42601"));
        assert!(!is_transient_sqlstate("28P01"));
    }

    #[test]
    fn request_id_unique_violation_is_collision() {
        let err = FakeDbError::new("23505", DbErrorKind::UniqueViolation).on(REQUEST_ID_CONSTRAINT);
        assert_eq!(db(err), StoreError::Collision);

        // no constraint reported
        let err = FakeDbError::new("23505", DbErrorKind::UniqueViolation);
        assert_eq!(db(err), StoreError::Collision);
    }

    #[test]
    fn unique_violation_on_other_constraint_is_permanent() {
        let err = FakeDbError::new("23505", DbErrorKind::UniqueViolation).on("request_logs_pkey");
        assert!(matches!(db(err), StoreError::Permanent { .. }));
    }

    #[test]
    fn server_side_sqlstates_are_transient() {
        for code in ["57P01", "08006", "53300", "40P01", "57014"] {
            let err = db(FakeDbError::new(code, DbErrorKind::Other));
            assert!(err.is_transient(), "{code} should be transient");
            assert!(matches!(err, StoreError::Transient { .. }), "{code}");
        }
    }

    #[test]
    fn statement_and_other_constraint_errors_are_permanent() {
        let syntax = db(FakeDbError::new("42601", DbErrorKind::Other));
        assert!(matches!(syntax, StoreError::Permanent { .. }));

        let not_null = db(FakeDbError::new("23502", DbErrorKind::NotNullViolation)
            .on("request_logs_client_ip_not_null"));
        assert!(matches!(not_null, StoreError::Permanent { .. }));
    }
}
