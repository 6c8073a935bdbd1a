//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that every pipeline stage
//! implements. A stage sees the request on the way in, decides whether to
//! delegate to [`Next`], and may observe or replace the response on the way
//! out.
//!
//! # Example
//!
//! ```ignore
//! use httpgate_middleware::{BoxFuture, Middleware, Next, Request, Response};
//! use httpgate_core::RequestContext;
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut RequestContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let response = next.run(ctx, request).await;
//!             tracing::debug!(elapsed = ?ctx.elapsed(), "done");
//!             response
//!         })
//!     }
//! }
//! ```

use httpgate_core::{BoxFuture, Request, RequestContext, Response};

/// The core middleware trait.
///
/// # Invariants
///
/// - A stage MUST call `next.run()` exactly once unless it short-circuits
/// - A stage MUST NOT assume it is the last one before the handler
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this stage, used in logs and by [`Chain::stage_names`](crate::Chain::stage_names).
    fn name(&self) -> &'static str;

    /// Process the request through this stage.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The per-request context
    /// * `request` - The incoming HTTP request
    /// * `next` - Callback to invoke the rest of the chain
    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// Callback to invoke the rest of the chain.
///
/// Consumed by [`Next::run`], so it can be called at most once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    /// More stages to process
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    /// End of chain - invoke the handler
    Handler(Box<dyn FnOnce(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + 'a>),
}

impl<'a> Next<'a> {
    /// Creates a `Next` that will invoke `middleware`, then `next`.
    pub fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the handler.
    pub fn handler<F>(f: F) -> Self
    where
        F: FnOnce(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        Self {
            inner: NextInner::Handler(Box::new(f)),
        }
    }

    /// Invokes the next stage or the handler.
    pub async fn run(self, ctx: &mut RequestContext, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => {
                middleware.process(ctx, request, *next).await
            }
            NextInner::Handler(handler) => handler(ctx, request).await,
        }
    }
}

/// A stage built from a function.
///
/// # Example
///
/// ```ignore
/// fn tag<'a>(ctx: &'a mut RequestContext, req: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
///     Box::pin(async move {
///         let mut response = next.run(ctx, req).await;
///         response.headers_mut().insert("x-tag", HeaderValue::from_static("1"));
///         response
///     })
/// }
///
/// let stage = FnMiddleware::new("tag", tag);
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a new function-based stage.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Request, Next<'a>) -> BoxFuture<'a, Response>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        (self.func)(ctx, request, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Request as HttpRequest, StatusCode};
    use http_body_util::Full;
    use httpgate_core::text_response;

    #[derive(Debug, Default)]
    struct Visited(Vec<&'static str>);

    struct Recording {
        name: &'static str,
    }

    impl Middleware for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut RequestContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                let mut visited = ctx.remove_extension::<Visited>().unwrap_or_default();
                visited.0.push(self.name);
                ctx.set_extension(visited);
                next.run(ctx, request).await
            })
        }
    }

    fn request() -> Request {
        HttpRequest::builder()
            .uri("/test")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn ok_handler(_ctx: &mut RequestContext, _req: Request) -> BoxFuture<'static, Response> {
        Box::pin(async { text_response(StatusCode::OK, "text/plain", "OK") })
    }

    #[tokio::test]
    async fn test_next_handler() {
        let mut ctx = RequestContext::new();
        let response = Next::handler(ok_handler).run(&mut ctx, request()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_next_chain_runs_in_order() {
        let first = Recording { name: "first" };
        let second = Recording { name: "second" };
        let mut ctx = RequestContext::new();

        let next = Next::new(&first, Next::new(&second, Next::handler(ok_handler)));
        let response = next.run(&mut ctx, request()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.get_extension::<Visited>().unwrap().0, vec!["first", "second"]);
    }

    fn teapot<'a>(_ctx: &'a mut RequestContext, _req: Request, _next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async { text_response(StatusCode::IM_A_TEAPOT, "text/plain", "short") })
    }

    #[tokio::test]
    async fn test_fn_middleware() {
        let mw = FnMiddleware::new("teapot", teapot);
        assert_eq!(mw.name(), "teapot");

        let mut ctx = RequestContext::new();
        let response = mw.process(&mut ctx, request(), Next::handler(ok_handler)).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }
}
