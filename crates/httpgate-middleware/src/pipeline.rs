//! Chain composition.
//!
//! A [`Chain`] is an ordered list of stages. The first stage is the
//! outermost: it sees the request first and the response last.
//!
//! ```text
//! Chain(a, b, c) applied to h:   a → b → c → h → c → b → a
//! ```
//!
//! Composition is associative. `Chain(a).then(Chain(b, c))`, a chain nested
//! inside another chain as a stage, and `Chain(a, b, c)` all behave
//! identically.

use std::sync::Arc;

use httpgate_core::{BoxFuture, Request, RequestContext, Response};

use crate::middleware::{Middleware, Next};

/// A type-erased stage that can be stored in a chain.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// A reusable terminal handler.
pub type SharedHandler =
    Arc<dyn Fn(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + Sync + 'static>;

/// An ordered, immutable composition of stages.
///
/// Cloning a chain is cheap and shares the stages.
///
/// # Example
///
/// ```ignore
/// use httpgate_middleware::Chain;
/// use httpgate_middleware::stages::{RecoveryMiddleware, TraceIdMiddleware};
///
/// let chain = Chain::new()
///     .with(TraceIdMiddleware::default())
///     .with(RecoveryMiddleware::default());
///
/// assert_eq!(chain.stage_names(), vec!["trace_id", "recovery"]);
/// ```
#[derive(Clone, Default)]
pub struct Chain {
    stages: Vec<BoxedMiddleware>,
}

impl Chain {
    /// Creates an empty chain. Applied to a handler it is the handler itself.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a chain from already shared stages, outermost first.
    pub fn from_stages<I>(stages: I) -> Self
    where
        I: IntoIterator<Item = BoxedMiddleware>,
    {
        Self {
            stages: stages.into_iter().collect(),
        }
    }

    /// Appends a stage. It becomes the innermost stage so far.
    #[must_use]
    pub fn with<M: Middleware>(self, middleware: M) -> Self {
        self.with_shared(Arc::new(middleware))
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn with_shared(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Concatenates `inner` after the stages of this chain.
    #[must_use]
    pub fn then(mut self, inner: Chain) -> Self {
        self.stages.extend(inner.stages);
        self
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|mw| mw.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the chain has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs `request` through every stage and finally `handler`.
    pub async fn handle<H>(&self, ctx: &mut RequestContext, request: Request, handler: H) -> Response
    where
        H: FnOnce(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        self.wrap(Next::handler(handler)).run(ctx, request).await
    }

    /// Binds this chain to a reusable handler.
    pub fn endpoint<H>(self, handler: H) -> Endpoint
    where
        H: Fn(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + Sync + 'static,
    {
        Endpoint::new(self, handler)
    }

    fn wrap<'a>(&'a self, inner: Next<'a>) -> Next<'a> {
        self.stages
            .iter()
            .rev()
            .fold(inner, |next, middleware| Next::new(middleware.as_ref(), next))
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Middleware for Chain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(self.wrap(next).run(ctx, request))
    }
}

/// A chain bound to its terminal handler: one complete request-handling unit.
///
/// Every call gets a fresh [`RequestContext`].
#[derive(Clone)]
pub struct Endpoint {
    chain: Chain,
    handler: SharedHandler,
}

impl Endpoint {
    /// Binds `chain` to `handler`.
    pub fn new<H>(chain: Chain, handler: H) -> Self
    where
        H: Fn(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + Sync + 'static,
    {
        Self {
            chain,
            handler: Arc::new(handler),
        }
    }

    /// The chain in front of the handler.
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Handles one request with a fresh context.
    pub async fn call(&self, request: Request) -> Response {
        let mut ctx = RequestContext::new();
        self.call_with(&mut ctx, request).await
    }

    /// Handles one request with a caller-provided context.
    pub async fn call_with(&self, ctx: &mut RequestContext, request: Request) -> Response {
        let handler = Arc::clone(&self.handler);
        self.chain
            .handle(ctx, request, move |ctx, request| handler(ctx, request))
            .await
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}
