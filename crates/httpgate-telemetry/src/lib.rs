//! Logging setup for httpgate services.
//!
//! The pipeline crates only emit `tracing` events. Nothing is printed until
//! the binary installs a subscriber, which is what [`init_logging`] does:
//!
//! ```text
//!   httpgate stages ── tracing::{debug,info,warn,error}! ──┐
//!                                                         ▼
//!                          registry ─▶ EnvFilter ─▶ fmt (json | pretty) ─▶ stdout
//! ```
//!
//! `RUST_LOG`, when set, takes precedence over [`LogConfig::level`].
//!
//! # Example
//!
//! ```rust,ignore
//! use httpgate_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::production())?;
//! tracing::info!(service = "orders", "gateway started");
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{fields, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
