//! Pipeline stages.
//!
//! Each stage is an independent [`Middleware`](crate::Middleware). A typical
//! outermost-first order is:
//!
//! ```text
//! trace_id → request_logger → recovery → interceptor → cors → authorization → handler
//! ```

pub mod authorization;
pub mod cors;
pub mod interceptor;
pub mod recovery;
pub mod request_logger;
pub mod trace_id;

pub use authorization::{
    AuthorizationConfig, AuthorizationMiddleware, FnExtractor, InputExtractor, RolesHeader,
    DEFAULT_ROLES_HEADER,
};
pub use cors::{CorsConfig, CorsMiddleware, CorsPolicy, OriginPredicate, WildcardOrigin};
pub use interceptor::{InterceptRules, InterceptingWriter, InterceptorConfig, InterceptorMiddleware};
pub use recovery::{abort_request, AbortRequest, RecoveryConfig, RecoveryMiddleware};
pub use request_logger::RequestLoggerMiddleware;
pub use trace_id::{TraceIdConfig, TraceIdMiddleware, DEFAULT_TRACE_HEADER};
