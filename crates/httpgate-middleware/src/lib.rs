//! # httpgate middleware
//!
//! Composable request pipeline for HTTP servers.
//!
//! A [`Chain`] is an ordered list of [`Middleware`] stages. Applied to a
//! handler, the first stage is outermost: it sees the request first and the
//! response last.
//!
//! ```text
//! Request → TraceId → Logger → Recovery → Interceptor → Cors → Authz → Handler
//!                                                                        ↓
//! Response ← TraceId ← Logger ← Recovery ← Interceptor ← Cors ← Authz ←──┘
//! ```
//!
//! ## Stages
//!
//! | Stage               | Purpose                                          |
//! |---------------------|--------------------------------------------------|
//! | `trace_id`          | Accept or generate the correlation id            |
//! | `request_logger`    | One access log event per request                 |
//! | `recovery`          | Turn panics into `500` problem responses         |
//! | `interceptor`       | Rewrite selected statuses into problem responses |
//! | `cors`              | Preflight and actual-request CORS headers        |
//! | `authorization`     | Policy decision, fail closed                     |
//!
//! ## Example
//!
//! ```
//! use httpgate_middleware::stages::{RecoveryMiddleware, TraceIdMiddleware};
//! use httpgate_middleware::Chain;
//!
//! let chain = Chain::new()
//!     .with(TraceIdMiddleware::default())
//!     .with(RecoveryMiddleware::default());
//!
//! assert_eq!(chain.stage_names(), vec!["trace_id", "recovery"]);
//! ```

#![doc(html_root_url = "https://docs.rs/httpgate-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod middleware;
pub mod pipeline;
pub mod service;
pub mod stages;

pub use httpgate_core::{BoxFuture, Request, RequestContext, Response};
pub use middleware::{FnMiddleware, Middleware, Next};
pub use pipeline::{BoxedMiddleware, Chain, Endpoint, SharedHandler};
pub use service::PeerService;
