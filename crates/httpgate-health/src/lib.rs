//! Health endpoints for httpgate.
//!
//! - [`Probe`]: runs named [`Checker`]s concurrently and joins the results
//!   (liveness when empty, readiness otherwise)
//! - [`Status`]: uptime, hostname and version
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use httpgate_health::{CheckError, Checker, FnChecker, HealthConfig, Probe};
//!
//! let db: Arc<dyn Checker> = Arc::new(FnChecker::new(|| async { Ok::<_, CheckError>(()) }));
//! let probe = Probe::new([("db", db)], HealthConfig::default());
//! let response = probe.respond().await;
//! ```

#![doc(html_root_url = "https://docs.rs/httpgate-health/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod checker;
pub mod config;
pub mod probe;
pub mod status;

pub use checker::{CheckError, Checker, FnChecker};
pub use config::HealthConfig;
pub use probe::{CheckResult, CheckStatus, Probe, ProbeReport};
pub use status::{format_uptime, Status};
