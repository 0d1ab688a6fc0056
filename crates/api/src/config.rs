//! Process configuration (flags with environment fallbacks).

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::{Parser, ValueEnum};

use staffgate_infra::CompensationPolicy;
use staffgate_observability::LogFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IdentityBackend {
    /// Process-local accounts (dev/test; lost on restart).
    Memory,
    /// Remote provider over JSON/HTTP.
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DocumentBackend {
    /// Process-local records (dev/test; lost on restart).
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Compensation {
    /// Undo earlier steps when a later one fails.
    Compensate,
    /// Leave partial state for the reconciliation sweep.
    RecordOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InitFailure {
    /// Exit non-zero.
    Exit,
    /// Keep serving; staff routes answer 503.
    ServeUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Json,
    Pretty,
}

/// Staff account provisioning service
#[derive(Parser, Debug, Clone)]
#[command(name = "staffgate", version)]
pub struct Config {
    /// Bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Bind port
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, env = "STAFFGATE_IDENTITY_BACKEND", value_enum, default_value_t = IdentityBackend::Memory)]
    pub identity_backend: IdentityBackend,

    /// Base URL of the HTTP identity provider
    #[arg(long, env = "STAFFGATE_IDENTITY_URL")]
    pub identity_url: Option<String>,

    /// Bearer token for the HTTP identity provider
    #[arg(long, env = "STAFFGATE_IDENTITY_TOKEN", hide_env_values = true)]
    pub identity_token: Option<String>,

    #[arg(long, env = "STAFFGATE_DOCUMENT_BACKEND", value_enum, default_value_t = DocumentBackend::Memory)]
    pub document_backend: DocumentBackend,

    /// Postgres connection string (document backend `postgres`)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Upper bound on each identity-provider or document-store call
    #[arg(long, env = "STAFFGATE_BACKEND_TIMEOUT_MS", default_value_t = 10_000)]
    pub backend_timeout_ms: u64,

    #[arg(long, env = "STAFFGATE_COMPENSATION", value_enum, default_value_t = Compensation::Compensate)]
    pub compensation: Compensation,

    /// What to do when a backend cannot be initialised at start-up
    #[arg(long, env = "STAFFGATE_ON_INIT_FAILURE", value_enum, default_value_t = InitFailure::Exit)]
    pub on_init_failure: InitFailure,

    /// Seconds between background reconciliation sweeps (0 disables)
    #[arg(long, env = "STAFFGATE_RECONCILE_INTERVAL_SECS", default_value_t = 0)]
    pub reconcile_interval_secs: u64,

    #[arg(long, env = "STAFFGATE_LOG_FORMAT", value_enum, default_value_t = LogFormatArg::Json)]
    pub log_format: LogFormatArg,
}

impl Config {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn compensation_policy(&self) -> CompensationPolicy {
        match self.compensation {
            Compensation::Compensate => CompensationPolicy::Compensate,
            Compensation::RecordOnly => CompensationPolicy::RecordOnly,
        }
    }

    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0).then(|| Duration::from_secs(self.reconcile_interval_secs))
    }

    pub fn log_format(&self) -> LogFormat {
        match self.log_format {
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Pretty => LogFormat::Pretty,
        }
    }
}
