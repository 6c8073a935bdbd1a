//! Structured logging.
//!
//! # Example
//!
//! ```rust,ignore
//! use httpgate_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::debug!(stage = "cors", "preflight accepted");
//! ```

use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Level or filter directives (e.g. `"info"`, `"httpgate_middleware=debug,warn"`).
    pub level: String,

    /// JSON output instead of the pretty format.
    pub json_format: bool,

    /// Whether to include span events (new, close).
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include thread IDs.
    pub thread_ids: bool,

    /// Whether to include the target (module path).
    pub include_target: bool,

    /// Service name, logged once at startup.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Human-readable output at `debug`.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            thread_ids: false,
            include_target: true,
            service_name: "httpgate".to_string(),
        }
    }

    /// JSON output at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            thread_ids: false,
            include_target: true,
            service_name: "httpgate".to_string(),
        }
    }

    /// Checks that `level` is a known level or a valid directive list.
    pub fn validate(&self) -> TelemetryResult<()> {
        let level = self.level.trim();
        if level.is_empty() {
            return Err(TelemetryError::InvalidConfig("log level is empty".to_string()));
        }
        if level.contains('=') || level.contains(',') {
            create_env_filter(level).map(|_| ())
        } else {
            level
                .parse::<LevelFilter>()
                .map(|_| ())
                .map_err(|_| TelemetryError::InvalidConfig(format!("unknown log level '{level}'")))
        }
    }
}

/// Installs the global subscriber.
///
/// Does nothing when `config.enabled` is false. `RUST_LOG` overrides
/// `config.level` when it is set and parses.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the level is invalid or a global
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }
    config
        .validate()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => create_env_filter(&config.level)?,
    };

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_thread_ids(config.thread_ids)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_thread_ids(config.thread_ids)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    tracing::info!(
        service = %config.service_name,
        level = %config.level,
        json = config.json_format,
        "logging initialized"
    );
    Ok(())
}

/// Parses a filter string such as `"info"` or `"httpgate_authz=debug,warn"`.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Field names used by the httpgate log events.
pub mod fields {
    /// Correlation id of the request.
    pub const TRACE_ID: &str = "trace_id";

    /// HTTP method.
    pub const METHOD: &str = "method";

    /// Request URI.
    pub const URI: &str = "uri";

    /// Response status code.
    pub const STATUS: &str = "status";

    /// Handling time in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";

    /// Peer socket address.
    pub const REMOTE_ADDR: &str = "remote_addr";

    /// Error message.
    pub const ERROR: &str = "error";

    /// Recovered panic payload.
    pub const PANIC: &str = "panic";

    /// Captured backtrace.
    pub const STACK_TRACE: &str = "stack_trace";

    /// Health check name.
    pub const CHECK: &str = "check";
}
