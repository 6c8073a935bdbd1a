//! Trace id middleware.
//!
//! Assigns every request a correlation id. A caller-supplied id is accepted
//! only if it is a well-formed UUID; anything else is replaced by a freshly
//! generated one. The id is stored in the [`RequestContext`], written back
//! onto the request header for inner stages, and echoed on the response.
//!
//! ## Header
//!
//! The header name is configurable and defaults to `TransactionId`. Common
//! alternatives are `X-Request-ID` and `X-Correlation-ID`.

use http::{HeaderName, HeaderValue};
use httpgate_core::{BoxFuture, GateError, IdFormat, Request, RequestContext, Response, TraceId};
use serde::Deserialize;

use crate::middleware::{Middleware, Next};

/// The default trace header.
pub const DEFAULT_TRACE_HEADER: &str = "TransactionId";

/// Configuration for [`TraceIdMiddleware`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceIdConfig {
    /// Header carrying the id on both request and response. Default `TransactionId`.
    pub header_name: String,
    /// Format of generated ids. Default time-ordered v7.
    pub id_format: IdFormat,
}

impl Default for TraceIdConfig {
    fn default() -> Self {
        Self {
            header_name: DEFAULT_TRACE_HEADER.to_string(),
            id_format: IdFormat::V7,
        }
    }
}

/// Middleware that accepts or generates the per-request trace id.
#[derive(Debug, Clone)]
pub struct TraceIdMiddleware {
    header: HeaderName,
    id_format: IdFormat,
}

impl TraceIdMiddleware {
    /// Builds the stage, validating the header name.
    pub fn new(config: TraceIdConfig) -> Result<Self, GateError> {
        let header = HeaderName::from_bytes(config.header_name.as_bytes())
            .map_err(|_| GateError::config(format!("invalid trace header name: {:?}", config.header_name)))?;
        Ok(Self {
            header,
            id_format: config.id_format,
        })
    }

    /// The header this stage reads and writes.
    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    fn resolve(&self, request: &Request) -> TraceId {
        request
            .headers()
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .and_then(TraceId::parse)
            .unwrap_or_else(|| TraceId::generate(self.id_format))
    }
}

impl Default for TraceIdMiddleware {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static("transactionid"),
            id_format: IdFormat::V7,
        }
    }
}

impl Middleware for TraceIdMiddleware {
    fn name(&self) -> &'static str {
        "trace_id"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let trace_id = self.resolve(&request);
            let value = HeaderValue::from_str(trace_id.as_str()).ok();

            if let Some(value) = &value {
                request.headers_mut().insert(self.header.clone(), value.clone());
            }
            ctx.set_trace_id(trace_id);

            let mut response = next.run(ctx, request).await;

            if let Some(value) = value {
                response.headers_mut().insert(self.header.clone(), value);
            }
            response
        })
    }
}
