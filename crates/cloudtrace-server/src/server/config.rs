use anyhow::bail;
use clap::Parser;
use core::{fmt, time::Duration};
use std::fs;

/// Runtime configuration for the `cloudtrace-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first when present), with defaults suitable for a
/// single instance behind a load balancer talking to a local PostgreSQL.
#[derive(Parser, Clone)]
#[command(
    name = "cloudtrace-server",
    version,
    about = "Logs which backend instance handled each request"
)]
pub struct CliArgs {
    /// Interface to bind the HTTP listener to.
    ///
    /// Environment variable: `HOST`
    #[arg(long, env = "HOST", default_value_t = String::from("0.0.0.0"))]
    pub host: String,

    /// Port to bind the HTTP listener to.
    ///
    /// Environment variable: `PORT`
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Environment variable: `DB_HOST`
    #[arg(long, env = "DB_HOST", default_value_t = String::from("localhost"))]
    pub db_host: String,

    /// Environment variable: `DB_PORT`
    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    /// Environment variable: `DB_USER`
    #[arg(long, env = "DB_USER", default_value_t = String::from("postgres"))]
    pub db_user: String,

    /// Environment variable: `DB_PASSWORD`
    #[arg(long, env = "DB_PASSWORD", default_value_t = String::new(), hide_env_values = true)]
    pub db_password: String,

    /// Environment variable: `DB_NAME`
    #[arg(long, env = "DB_NAME", default_value_t = String::from("cloudtrace"))]
    pub db_name: String,

    /// Maximum number of pooled database connections held by this process.
    ///
    /// Requests beyond this many concurrent writes queue for a free
    /// connection.
    ///
    /// Environment variable: `DB_POOL_SIZE`
    #[arg(long, env = "DB_POOL_SIZE", default_value_t = 10)]
    pub db_pool_size: u32,

    /// How long a request waits for a pooled connection before failing.
    ///
    /// Environment variable: `DB_ACQUIRE_TIMEOUT_MS`
    #[arg(long, env = "DB_ACQUIRE_TIMEOUT_MS", default_value_t = 2_000)]
    pub db_acquire_timeout_ms: u64,

    /// Server-side `statement_timeout` applied to every pooled connection.
    ///
    /// Environment variable: `DB_STATEMENT_TIMEOUT_MS`
    #[arg(long, env = "DB_STATEMENT_TIMEOUT_MS", default_value_t = 5_000)]
    pub db_statement_timeout_ms: u64,

    /// Total insert attempts for transient failures, including the first.
    ///
    /// Environment variable: `DB_MAX_ATTEMPTS`
    #[arg(long, env = "DB_MAX_ATTEMPTS", default_value_t = 3)]
    pub db_max_attempts: u32,

    /// Backoff before the second attempt; doubled for each later attempt.
    ///
    /// Environment variable: `DB_RETRY_BASE_MS`
    #[arg(long, env = "DB_RETRY_BASE_MS", default_value_t = 100)]
    pub db_retry_base_ms: u64,

    /// How long in-flight requests may take to drain after SIGTERM.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Identity reported in every response and log row.
    ///
    /// Defaults to the machine hostname.
    ///
    /// Environment variable: `SERVER_HOSTNAME`
    #[arg(long, env = "SERVER_HOSTNAME")]
    pub server_hostname: Option<String>,

    /// Create the `request_logs` table and its indexes on startup if missing.
    ///
    /// Environment variable: `DB_INIT_SCHEMA`
    #[arg(long, env = "DB_INIT_SCHEMA", default_value_t = false)]
    pub init_schema: bool,
}

impl fmt::Debug for CliArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliArgs")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_user", &self.db_user)
            .field("db_password", &"<redacted>")
            .field("db_name", &self.db_name)
            .field("server_hostname", &self.server_hostname)
            .finish_non_exhaustive()
    }
}

/// Connection settings for the PostgreSQL pool.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub pool_size: u32,
    pub acquire_timeout: Duration,
    pub statement_timeout: Duration,
    pub init_schema: bool,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("pool_size", &self.pool_size)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .field("init_schema", &self.init_schema)
            .finish()
    }
}

/// Retry schedule for transient insert failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay slept after the given failed attempt (1-based): `base * 2^(n-1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exp)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Read once at startup and constant for the life of the process.
    pub server_hostname: String,
    pub database: DatabaseConfig,
    pub retry: RetryPolicy,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.port == 0 {
            bail!("PORT must be greater than 0");
        }

        if args.db_pool_size == 0 {
            bail!("DB_POOL_SIZE must be greater than 0");
        }

        if args.db_max_attempts == 0 {
            bail!("DB_MAX_ATTEMPTS must be greater than 0");
        }

        if args.db_acquire_timeout_ms == 0 || args.db_statement_timeout_ms == 0 {
            bail!("DB_ACQUIRE_TIMEOUT_MS and DB_STATEMENT_TIMEOUT_MS must be greater than 0");
        }

        let server_hostname = match args.server_hostname {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => resolve_hostname(),
        };

        Ok(Self {
            listen_addr: format!("{}:{}", args.host, args.port),
            server_hostname,
            database: DatabaseConfig {
                host: args.db_host,
                port: args.db_port,
                user: args.db_user,
                password: args.db_password,
                name: args.db_name,
                pool_size: args.db_pool_size,
                acquire_timeout: Duration::from_millis(args.db_acquire_timeout_ms),
                statement_timeout: Duration::from_millis(args.db_statement_timeout_ms),
                init_schema: args.init_schema,
            },
            retry: RetryPolicy {
                max_attempts: args.db_max_attempts,
                base_delay: Duration::from_millis(args.db_retry_base_ms),
            },
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        })
    }
}

/// Best-effort network name of this machine.
fn resolve_hostname() -> String {
    fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| {
            tracing::warn!("Could not determine hostname, using \"unknown\"");
            String::from("unknown")
        })
}
