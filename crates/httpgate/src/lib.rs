//! # httpgate
//!
//! A composable HTTP middleware pipeline:
//!
//! - RFC 7807 problem responses from a single serialization path
//! - caller-supplied or generated trace ids
//! - CORS preflight and actual-request handling
//! - rewriting of selected statuses into problem responses
//! - panic recovery
//! - policy-based authorization that fails closed
//! - health probes and a status endpoint
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use httpgate::prelude::*;
//!
//! let config = ConfigLoader::new()
//!     .with_production()
//!     .with_optional_file("httpgate.toml")?
//!     .with_env_prefix("HTTPGATE")
//!     .load()?;
//! init_logging(&config.logging)?;
//!
//! let endpoint = build_chain(&config)?.endpoint(|_ctx: &mut RequestContext, _req: Request| {
//!     Box::pin(async { text_response(StatusCode::OK, "text/plain", "hello") })
//! });
//!
//! // Serve with hyper: `endpoint.for_peer(addr)` is a `hyper::service::Service`.
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → TraceId → Logger → Recovery → Interceptor → Cors → Authz → Handler
//!                                                                        ↓
//! Response ← TraceId ← Logger ← Recovery ← Interceptor ← Cors ← Authz ←──┘
//! ```

#![doc(html_root_url = "https://docs.rs/httpgate/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod gateway;

// Re-export core types
pub use httpgate_core as core;

// Re-export the pipeline and its stages
pub use httpgate_middleware as middleware;

// Re-export policy enforcers
pub use httpgate_authz as authz;

// Re-export health endpoints
pub use httpgate_health as health;

// Re-export configuration
pub use httpgate_config as config;

// Re-export logging setup
pub use httpgate_telemetry as telemetry;

pub use gateway::{build_chain, build_enforcer, BuildError};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use httpgate::prelude::*;
/// ```
pub mod prelude {
    pub use httpgate_core::{
        empty_response, present_error, respond_error, text_response, BoxFuture, GateError,
        PolicyEnforcer, PolicyError, PolicyInput, ProblemDetail, ProblemOptions, Request,
        RequestContext, Response, ResponseSink, ResponseWriter, TraceId,
    };

    pub use httpgate_middleware::stages::{
        abort_request, AuthorizationConfig, AuthorizationMiddleware, CorsConfig, CorsMiddleware,
        FnExtractor, InputExtractor, InterceptorConfig, InterceptorMiddleware, RecoveryConfig,
        RecoveryMiddleware, RequestLoggerMiddleware, RolesHeader, TraceIdConfig, TraceIdMiddleware,
    };
    pub use httpgate_middleware::{Chain, Endpoint, FnMiddleware, Middleware, Next};

    pub use httpgate_authz::{AllowAll, DenyAll, RegoConfig, RegoEnforcer, RolePolicy};

    pub use httpgate_health::{CheckError, Checker, FnChecker, HealthConfig, Probe, Status};

    pub use httpgate_config::{ConfigLoader, GatewayConfig};

    pub use httpgate_telemetry::{init_logging, LogConfig};

    pub use crate::gateway::{build_chain, build_enforcer, BuildError};
}
