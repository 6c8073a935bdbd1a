//! # httpgate Core
//!
//! Core types shared by every httpgate crate:
//!
//! - [`ProblemDetail`] and [`respond_error`]: RFC 7807 errors and the single
//!   path that writes them
//! - [`ResponseSink`] / [`ResponseWriter`]: the write side of a response
//! - [`RequestContext`] and [`TraceId`]: per-request state
//! - [`PolicyInput`] / [`PolicyEnforcer`]: the authorization port
//! - [`GateError`]: the error taxonomy of the pipeline
//!
//! ## Example
//!
//! ```
//! use httpgate_core::{GateError, ProblemOptions};
//!
//! let problem = GateError::AccessDenied.to_problem(ProblemOptions::default());
//! assert_eq!(problem.status(), 403);
//! ```

#![doc(html_root_url = "https://docs.rs/httpgate-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod policy;
pub mod problem;
pub mod sink;
pub mod types;

pub use context::{IdFormat, RequestContext, TraceId};
pub use error::{GateError, GateResult, ACCESS_DENIED_DETAIL};
pub use policy::{PolicyEnforcer, PolicyError, PolicyInput};
pub use problem::{present_error, respond_error, ProblemDetail, ProblemOptions, PROBLEM_JSON, UNKNOWN_ERROR};
pub use sink::{ResponseSink, ResponseWriter};
pub use types::{empty_response, text_response, BoxFuture, Request, Response};
