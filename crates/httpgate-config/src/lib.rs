//! Typed configuration for httpgate.
//!
//! [`GatewayConfig`] gathers the settings of every pipeline stage, the
//! health endpoints and logging. [`ConfigLoader`] builds one from layers:
//! defaults → file → `.env` → environment.
//!
//! # Configuration File Format
//!
//! ```toml
//! [trace_id]
//! header_name = "X-Request-ID"
//! id_format = "v7"
//!
//! [recovery]
//! include_stack_trace = false
//!
//! [interceptor]
//! intercept = [404, 500]
//!
//! [interceptor.messages]
//! 404 = "The requested resource does not exist."
//!
//! [cors]
//! allowed_origins = ["https://*.example.com"]
//! allowed_methods = ["GET", "POST"]
//! allow_credentials = true
//! max_age_secs = 600
//!
//! [authorization]
//! enforcer = "rego"
//! decision_timeout_ms = 250
//!
//! [authorization.rego]
//! query = "data.httpgate.authz.allow"
//! policies_path = "/etc/httpgate/policies"
//!
//! [health]
//! check_timeout_ms = 2000
//! version = "1.4.0"
//!
//! [logging]
//! level = "info"
//! json_format = true
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `HTTPGATE__TRACE_ID__HEADER_NAME=X-Correlation-ID`
//! - `HTTPGATE__CORS__ALLOW_CREDENTIALS=false`
//! - `HTTPGATE__AUTHORIZATION__REGO__POLICIES_PATH=/policies`

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::GatewayConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{AuthorizationSection, EnforcerMode};
