//! RFC 7807 problem details.
//!
//! [`ProblemDetail`] is the only shape in which an error leaves the pipeline,
//! and [`respond_error`] is the only function that writes one onto a
//! response. Everything else (stages, presenters, `into_response`) goes
//! through it.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "type": "https://example.com/problems/out-of-stock",
//!   "title": "Not Found",
//!   "status": 404,
//!   "detail": "item 42 is not stocked",
//!   "instance": "/items/42",
//!   "requestId": "01938f4e-...",
//!   "timestamp": "2024-11-30T12:00:00Z"
//! }
//! ```

use std::fmt::Display;

use chrono::{DateTime, Utc};
use http::{HeaderValue, StatusCode, Uri};
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::sink::{ResponseSink, ResponseWriter};
use crate::types::Response;

/// Media type of a serialized [`ProblemDetail`].
pub const PROBLEM_JSON: &str = "application/problem+json; charset=utf-8";

/// Detail used when neither an explicit detail nor an error message is available.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// A structured, machine-readable HTTP error.
///
/// Immutable once built. `status` always matches the status written by
/// [`respond_error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetail {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    type_uri: Option<String>,
    title: String,
    status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stack_trace: Option<String>,
}

/// Optional fields of a [`ProblemDetail`].
///
/// Build with struct update syntax:
///
/// ```
/// use httpgate_core::{ProblemDetail, ProblemOptions};
/// use http::StatusCode;
///
/// let problem = ProblemDetail::new(
///     "out of stock",
///     StatusCode::CONFLICT,
///     ProblemOptions {
///         detail: Some("item 42 is not stocked".into()),
///         ..ProblemOptions::default()
///     },
/// );
/// assert_eq!(problem.detail(), Some("item 42 is not stocked"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemOptions {
    /// URI identifying the problem type.
    pub type_uri: Option<String>,
    /// Occurrence-specific explanation. Wins over any error message.
    pub detail: Option<String>,
    /// Path of the failing request.
    pub instance: Option<String>,
    /// Correlation id of the failing request.
    pub request_id: Option<String>,
    /// Captured stack trace. Only set in debug mode.
    pub stack_trace: Option<String>,
}

impl ProblemOptions {
    /// Attaches the request path and trace id.
    pub fn for_request<B>(ctx: &RequestContext, request: &http::Request<B>) -> Self {
        Self::for_target(ctx, request.uri())
    }

    /// Attaches a request path and trace id when the request itself has been consumed.
    pub fn for_target(ctx: &RequestContext, uri: &Uri) -> Self {
        Self {
            instance: Some(uri.path().to_string()),
            request_id: ctx.trace_id().map(ToString::to_string),
            ..Self::default()
        }
    }
}

impl ProblemDetail {
    /// Creates a problem with an explicit title.
    ///
    /// An empty title falls back to the reason phrase of `status`.
    pub fn new(title: impl Into<String>, status: StatusCode, options: ProblemOptions) -> Self {
        let title = title.into();
        let title = if title.is_empty() {
            reason_phrase(status)
        } else {
            title
        };

        Self {
            type_uri: options.type_uri,
            title,
            status: status.as_u16(),
            detail: options.detail.filter(|d| !d.is_empty()),
            instance: options.instance,
            request_id: options.request_id,
            timestamp: Utc::now(),
            stack_trace: options.stack_trace,
        }
    }

    /// Wraps an error into a problem titled with the reason phrase of `status`.
    ///
    /// The detail is the first non-empty of: `options.detail`, the error
    /// message, [`UNKNOWN_ERROR`].
    pub fn from_error<E: Display + ?Sized>(err: &E, status: StatusCode, options: ProblemOptions) -> Self {
        let message = err.to_string();
        let detail = options
            .detail
            .clone()
            .filter(|d| !d.is_empty())
            .or_else(|| Some(message).filter(|m| !m.is_empty()))
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string());

        Self::new(
            reason_phrase(status),
            status,
            ProblemOptions {
                detail: Some(detail),
                ..options
            },
        )
    }

    /// The problem type URI.
    pub fn type_uri(&self) -> Option<&str> {
        self.type_uri.as_deref()
    }

    /// The short, stable title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The HTTP status as a number.
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// The HTTP status.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// The occurrence-specific explanation.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// The failing request path.
    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    /// The trace id of the failing request.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// When the problem was created.
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The debug-mode stack trace.
    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }

    /// Renders this problem as a complete response.
    pub fn into_response(self) -> Response {
        let mut writer = ResponseWriter::new();
        respond_error(&mut writer, &self);
        writer.into_response()
    }
}

impl Display for ProblemDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.title)
    }
}

impl std::error::Error for ProblemDetail {}

/// Writes `problem` onto `sink`: content type, status, then the JSON body.
pub fn respond_error<S: ResponseSink + ?Sized>(sink: &mut S, problem: &ProblemDetail) {
    let body = match serde_json::to_vec(problem) {
        Ok(mut body) => {
            body.push(b'\n');
            body
        }
        Err(e) => {
            tracing::error!(error = %e, status = problem.status, "failed to encode problem detail");
            Vec::new()
        }
    };

    let headers = sink.headers_mut();
    headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
    headers.remove(http::header::CONTENT_LENGTH);
    sink.write_header(problem.status_code());
    sink.write(&body);
}

/// Presents an arbitrary error as a problem response.
///
/// Server errors are logged with the original error before the response is built.
pub fn present_error<E: Display + ?Sized>(err: &E, status: StatusCode, options: ProblemOptions) -> Response {
    let problem = ProblemDetail::from_error(err, status, options);
    if status.is_server_error() {
        tracing::error!(
            error = %err,
            status = status.as_u16(),
            detail = problem.detail().unwrap_or(UNKNOWN_ERROR),
            "server error occurred"
        );
    }
    problem.into_response()
}

/// The canonical reason phrase, or `Status <code>` for codes without one.
pub(crate) fn reason_phrase(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map_or_else(|| format!("Status {}", status.as_u16()), str::to_string)
}
