//! Authorization middleware stage.
//!
//! Asks a [`PolicyEnforcer`] whether the request may proceed. The policy
//! input is produced by a pluggable [`InputExtractor`]; the stage then sets
//! its `action` to `"<METHOD>:<path>"`.
//!
//! | Outcome                          | Response                     |
//! |----------------------------------|------------------------------|
//! | extractor fails                  | `400` problem                |
//! | oracle errors or times out       | `500` problem (fail closed)  |
//! | oracle denies                    | `403` problem                |
//! | oracle allows                    | inner stages run untouched   |
//!
//! # Example
//!
//! ```rust,ignore
//! use httpgate_middleware::stages::{AuthorizationConfig, AuthorizationMiddleware, RolesHeader};
//!
//! let authz = AuthorizationMiddleware::new(
//!     Arc::new(my_enforcer),
//!     Arc::new(RolesHeader::default()),
//!     AuthorizationConfig::default(),
//! );
//! ```

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderName, StatusCode};
use httpgate_core::{
    present_error, BoxFuture, GateError, PolicyEnforcer, PolicyError, PolicyInput, ProblemOptions,
    Request, RequestContext, Response,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::middleware::{Middleware, Next};

/// Header carrying the caller's comma separated roles.
pub const DEFAULT_ROLES_HEADER: &str = "x-user-roles";

/// Produces the policy input for a request.
pub trait InputExtractor: Send + Sync + 'static {
    /// Builds the input. An error rejects the request with `400`.
    fn extract(&self, ctx: &RequestContext, request: &Request) -> Result<PolicyInput, GateError>;
}

/// Reads roles from a comma separated request header.
///
/// A missing header yields no roles. Entries are trimmed and empty entries
/// dropped, so `"admin, ,viewer"` is `{admin, viewer}`.
#[derive(Debug, Clone)]
pub struct RolesHeader {
    header: HeaderName,
}

impl RolesHeader {
    /// Reads roles from `header`.
    pub fn new(header: &str) -> Result<Self, GateError> {
        let header = HeaderName::from_bytes(header.as_bytes())
            .map_err(|_| GateError::config(format!("invalid roles header name: {header:?}")))?;
        Ok(Self { header })
    }
}

impl Default for RolesHeader {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static(DEFAULT_ROLES_HEADER),
        }
    }
}

impl InputExtractor for RolesHeader {
    fn extract(&self, _ctx: &RequestContext, request: &Request) -> Result<PolicyInput, GateError> {
        let Some(value) = request.headers().get(&self.header) else {
            return Ok(PolicyInput::default());
        };
        let value = value
            .to_str()
            .map_err(|_| GateError::invalid_input(format!("{} is not valid text", self.header)))?;

        Ok(PolicyInput::with_roles(
            value.split(',').map(str::trim).filter(|role| !role.is_empty()),
        ))
    }
}

/// An extractor backed by a function.
pub struct FnExtractor<F> {
    func: F,
}

impl<F> FnExtractor<F>
where
    F: Fn(&RequestContext, &Request) -> Result<PolicyInput, GateError> + Send + Sync + 'static,
{
    /// Wraps `func`.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> InputExtractor for FnExtractor<F>
where
    F: Fn(&RequestContext, &Request) -> Result<PolicyInput, GateError> + Send + Sync + 'static,
{
    fn extract(&self, ctx: &RequestContext, request: &Request) -> Result<PolicyInput, GateError> {
        (self.func)(ctx, request)
    }
}

impl<F> std::fmt::Debug for FnExtractor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnExtractor").finish_non_exhaustive()
    }
}

/// Configuration for [`AuthorizationMiddleware`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// Append `?query` to the action path.
    pub include_query: bool,
    /// Deadline for a decision. Exceeding it is treated as an oracle failure.
    pub decision_timeout_ms: Option<u64>,
}

/// Middleware that enforces a policy decision per request.
#[derive(Clone)]
pub struct AuthorizationMiddleware {
    enforcer: Arc<dyn PolicyEnforcer>,
    extractor: Arc<dyn InputExtractor>,
    include_query: bool,
    decision_timeout: Option<Duration>,
}

impl AuthorizationMiddleware {
    /// Creates the stage.
    pub fn new(
        enforcer: Arc<dyn PolicyEnforcer>,
        extractor: Arc<dyn InputExtractor>,
        config: AuthorizationConfig,
    ) -> Self {
        Self {
            enforcer,
            extractor,
            include_query: config.include_query,
            decision_timeout: config.decision_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Creates the stage with the default [`RolesHeader`] extractor.
    pub fn with_roles_header(enforcer: Arc<dyn PolicyEnforcer>, config: AuthorizationConfig) -> Self {
        Self::new(enforcer, Arc::new(RolesHeader::default()), config)
    }

    fn action(&self, request: &Request) -> String {
        let uri = request.uri();
        let target = match uri.query() {
            Some(query) if self.include_query => format!("{}?{query}", uri.path()),
            _ => uri.path().to_string(),
        };
        PolicyInput::action_for(request.method(), &target)
    }

    async fn decide(&self, input: &PolicyInput) -> Result<bool, PolicyError> {
        match self.decision_timeout {
            Some(limit) => tokio::time::timeout(limit, self.enforcer.is_allowed(input))
                .await
                .unwrap_or(Err(PolicyError::Timeout(limit))),
            None => self.enforcer.is_allowed(input).await,
        }
    }
}

impl std::fmt::Debug for AuthorizationMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationMiddleware")
            .field("include_query", &self.include_query)
            .field("decision_timeout", &self.decision_timeout)
            .finish_non_exhaustive()
    }
}

impl Middleware for AuthorizationMiddleware {
    fn name(&self) -> &'static str {
        "authorization"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let options = ProblemOptions::for_request(ctx, &request);

            let mut input = match self.extractor.extract(ctx, &request) {
                Ok(input) => input,
                Err(err) => {
                    debug!(error = %err, "authorization input rejected");
                    return present_error(&err, StatusCode::BAD_REQUEST, options);
                }
            };
            input.action = self.action(&request);

            match self.decide(&input).await {
                Ok(true) => {
                    ctx.set_extension(input);
                    next.run(ctx, request).await
                }
                Ok(false) => {
                    debug!(action = %input.action, roles = ?input.roles, "access denied");
                    GateError::AccessDenied.to_problem(options).into_response()
                }
                Err(err) => {
                    warn!(error = %err, action = %input.action, "policy evaluation failed");
                    present_error(
                        &GateError::from(err),
                        StatusCode::INTERNAL_SERVER_ERROR,
                        options,
                    )
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use httpgate_core::{text_response, ProblemDetail, ACCESS_DENIED_DETAIL};
    use std::sync::Mutex;

    /// Oracle returning a fixed answer and recording what it was asked.
    #[derive(Default)]
    struct FixedOracle {
        answer: Option<bool>,
        seen: Mutex<Vec<PolicyInput>>,
    }

    impl FixedOracle {
        fn allowing() -> Arc<Self> {
            Arc::new(Self {
                answer: Some(true),
                ..Self::default()
            })
        }

        fn denying() -> Arc<Self> {
            Arc::new(Self {
                answer: Some(false),
                ..Self::default()
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn last_action(&self) -> String {
            self.seen.lock().unwrap().last().unwrap().action.clone()
        }
    }

    impl PolicyEnforcer for FixedOracle {
        fn is_allowed<'a>(&'a self, input: &'a PolicyInput) -> BoxFuture<'a, Result<bool, PolicyError>> {
            self.seen.lock().unwrap().push(input.clone());
            let answer = self
                .answer
                .ok_or_else(|| PolicyError::Evaluation("engine offline".to_string()));
            Box::pin(async move { answer })
        }
    }

    struct SlowOracle;

    impl PolicyEnforcer for SlowOracle {
        fn is_allowed<'a>(&'a self, _input: &'a PolicyInput) -> BoxFuture<'a, Result<bool, PolicyError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(true)
            })
        }
    }

    fn request(uri: &str, roles: Option<&str>) -> Request {
        let mut builder = http::Request::builder().method("post").uri(uri);
        if let Some(roles) = roles {
            builder = builder.header(DEFAULT_ROLES_HEADER, roles);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    fn handler(ctx: &mut RequestContext, _req: Request) -> BoxFuture<'static, Response> {
        let roles = ctx
            .get_extension::<PolicyInput>()
            .map(|input| input.roles.iter().cloned().collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        Box::pin(async move { text_response(StatusCode::OK, "text/plain", roles) })
    }

    async fn run(middleware: &AuthorizationMiddleware, request: Request) -> Response {
        let mut ctx = RequestContext::new();
        middleware.process(&mut ctx, request, Next::handler(handler)).await
    }

    async fn problem(response: Response) -> ProblemDetail {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_allow_passes_through() {
        let oracle = FixedOracle::allowing();
        let authz = AuthorizationMiddleware::with_roles_header(oracle.clone(), AuthorizationConfig::default());
        let response = run(&authz, request("/orders?page=2", Some("admin, ,viewer"))).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"admin,viewer"));
        assert_eq!(oracle.last_action(), "POST:/orders");
    }

    #[tokio::test]
    async fn test_include_query_in_action() {
        let oracle = FixedOracle::allowing();
        let authz = AuthorizationMiddleware::with_roles_header(
            oracle.clone(),
            AuthorizationConfig {
                include_query: true,
                ..AuthorizationConfig::default()
            },
        );
        run(&authz, request("/orders?page=2", None)).await;
        assert_eq!(oracle.last_action(), "POST:/orders?page=2");
    }

    #[tokio::test]
    async fn test_deny_is_403() {
        let authz = AuthorizationMiddleware::with_roles_header(FixedOracle::denying(), AuthorizationConfig::default());
        let response = run(&authz, request("/admin", Some("guest"))).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let problem = problem(response).await;
        assert_eq!(problem.title(), "access denied");
        assert_eq!(problem.detail(), Some(ACCESS_DENIED_DETAIL));
        assert_eq!(problem.instance(), Some("/admin"));
    }

    #[tokio::test]
    async fn test_oracle_error_fails_closed() {
        let authz = AuthorizationMiddleware::with_roles_header(FixedOracle::failing(), AuthorizationConfig::default());
        let response = run(&authz, request("/admin", Some("admin"))).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let problem = problem(response).await;
        assert_eq!(problem.detail(), Some("policy evaluation failed: engine offline"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_decision_timeout_fails_closed() {
        let authz = AuthorizationMiddleware::with_roles_header(
            Arc::new(SlowOracle),
            AuthorizationConfig {
                decision_timeout_ms: Some(50),
                ..AuthorizationConfig::default()
            },
        );
        let response = run(&authz, request("/slow", None)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_extractor_failure_is_400() {
        let extractor = FnExtractor::new(|_ctx: &RequestContext, req: &Request| {
            if req.headers().contains_key("x-tenant") {
                Ok(PolicyInput::default())
            } else {
                Err(GateError::invalid_input("missing tenant"))
            }
        });
        let oracle = FixedOracle::allowing();
        let authz = AuthorizationMiddleware::new(oracle.clone(), Arc::new(extractor), AuthorizationConfig::default());
        let response = run(&authz, request("/orders", None)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let problem = problem(response).await;
        assert_eq!(problem.detail(), Some("invalid request: missing tenant"));
        assert!(oracle.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fn_extractor_payload_reaches_oracle() {
        let extractor = FnExtractor::new(|_ctx: &RequestContext, _req: &Request| {
            Ok(PolicyInput::with_roles(["svc"]).with_attribute("tenant", "acme"))
        });
        let oracle = FixedOracle::allowing();
        let authz = AuthorizationMiddleware::new(oracle.clone(), Arc::new(extractor), AuthorizationConfig::default());
        run(&authz, request("/orders", None)).await;

        let seen = oracle.seen.lock().unwrap();
        assert_eq!(seen[0].payload["tenant"], "acme");
        assert_eq!(seen[0].action, "POST:/orders");
    }

    #[test]
    fn test_roles_header_rejects_bad_name() {
        assert!(RolesHeader::new("x roles").is_err());
        assert!(RolesHeader::new("X-Groups").is_ok());
    }

    #[test]
    fn test_missing_roles_header_is_empty() {
        let input = RolesHeader::default()
            .extract(&RequestContext::new(), &request("/", None))
            .unwrap();
        assert!(input.roles.is_empty());
    }
}
