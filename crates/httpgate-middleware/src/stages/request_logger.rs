//! Access logging.
//!
//! Emits one `info` event named `request` per completed request, after the
//! inner stages have produced a response.

use std::net::SocketAddr;
use std::time::Instant;

use httpgate_core::{BoxFuture, Request, RequestContext, Response};
use tracing::info;

use crate::middleware::{Middleware, Next};

/// Middleware that logs status, duration and target of every request.
///
/// The remote address is taken from a [`SocketAddr`] request extension when
/// the transport provides one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLoggerMiddleware;

impl RequestLoggerMiddleware {
    /// Creates the stage.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for RequestLoggerMiddleware {
    fn name(&self) -> &'static str {
        "request_logger"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let start = Instant::now();
            let method = request.method().clone();
            let uri = request.uri().clone();
            let remote_addr = request
                .extensions()
                .get::<SocketAddr>()
                .map(ToString::to_string)
                .unwrap_or_default();

            let response = next.run(ctx, request).await;

            info!(
                status = response.status().as_u16(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                method = %method,
                uri = %uri,
                remote_addr = %remote_addr,
                trace_id = ctx.trace_id().map(|id| id.as_str()).unwrap_or_default(),
                "request"
            );
            response
        })
    }
}
