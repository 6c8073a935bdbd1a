//! CORS (Cross-Origin Resource Sharing) middleware.
//!
//! The decision logic lives in [`CorsPolicy`], a pure function of the request
//! and the configuration that returns the headers to emit. [`CorsMiddleware`]
//! is the transport adapter around it.
//!
//! ## Request classification
//!
//! - **Preflight**: `OPTIONS` with an `Access-Control-Request-Method` header.
//!   Answered with an empty `200` unless passthrough is enabled, in which case
//!   the inner stages still run.
//! - **Actual**: everything else. The request always proceeds; CORS headers
//!   are added only when origin and method are admissible. Enforcement is
//!   the browser's job, so nothing is ever rejected here.
//!
//! ## Origin rules
//!
//! | Configured origins          | Meaning                                  |
//! |-----------------------------|------------------------------------------|
//! | empty                       | every origin, header value `*`           |
//! | contains `*`                | every origin, header value `*`           |
//! | `https://*.example.com`     | prefix/suffix wildcard                   |
//! | `https://app.example.com`   | exact, case-insensitive                  |
//! | custom predicate            | lists ignored, request origin echoed     |
//!
//! ## Example
//!
//! ```ignore
//! use httpgate_middleware::stages::{CorsConfig, CorsMiddleware};
//!
//! let cors = CorsMiddleware::new(CorsConfig {
//!     allowed_origins: vec!["https://*.example.com".into()],
//!     allowed_methods: vec!["GET".into(), "POST".into()],
//!     allow_credentials: true,
//!     max_age_secs: Some(3600),
//!     ..CorsConfig::default()
//! })?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, VARY,
};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use http_body_util::Full;
use httpgate_core::{BoxFuture, GateError, Request, RequestContext, Response};
use serde::Deserialize;
use tracing::debug;

use crate::middleware::{Middleware, Next};

/// Custom origin decision. When set, the configured origin lists are ignored.
pub type OriginPredicate = Arc<dyn Fn(&Request, &str) -> bool + Send + Sync>;

/// Methods allowed when none are configured.
pub const DEFAULT_METHODS: [&str; 3] = ["GET", "POST", "HEAD"];

/// Configuration for [`CorsMiddleware`].
///
/// All fields are optional. With the defaults every origin is allowed for
/// `GET`, `POST` and `HEAD`, only the `Origin` request header is allowed, and
/// credentials and max-age are not advertised.
#[derive(Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Exact origins, `*`, or single-`*` wildcard patterns. Empty allows all.
    pub allowed_origins: Vec<String>,
    /// Allowed methods. Empty means `GET, POST, HEAD`.
    pub allowed_methods: Vec<String>,
    /// Allowed request headers, or `*`. `Origin` is always allowed.
    pub allowed_headers: Vec<String>,
    /// Response headers exposed to scripts.
    pub exposed_headers: Vec<String>,
    /// Emit `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,
    /// Preflight cache lifetime. Zero or absent means not advertised.
    pub max_age_secs: Option<u64>,
    /// Run the inner stages for preflight requests too.
    pub options_passthrough: bool,
    /// Custom origin decision.
    #[serde(skip)]
    pub allow_origin_predicate: Option<OriginPredicate>,
}

impl CorsConfig {
    /// A permissive configuration: any origin, common methods, any header,
    /// credentials allowed, 12 hour preflight cache.
    pub fn allow_all() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["HEAD", "GET", "POST", "PUT", "PATCH", "DELETE"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_headers: vec!["*".to_string()],
            allow_credentials: true,
            max_age_secs: Some(12 * 60 * 60),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for CorsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorsConfig")
            .field("allowed_origins", &self.allowed_origins)
            .field("allowed_methods", &self.allowed_methods)
            .field("allowed_headers", &self.allowed_headers)
            .field("exposed_headers", &self.exposed_headers)
            .field("allow_credentials", &self.allow_credentials)
            .field("max_age_secs", &self.max_age_secs)
            .field("options_passthrough", &self.options_passthrough)
            .field("allow_origin_predicate", &self.allow_origin_predicate.is_some())
            .finish()
    }
}

/// An origin pattern with a single `*`, split into the parts around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardOrigin {
    prefix: String,
    suffix: String,
}

impl WildcardOrigin {
    /// Splits `pattern` at its `*`. Returns `None` if there is no `*`.
    pub fn parse(pattern: &str) -> Option<Self> {
        pattern.split_once('*').map(|(prefix, suffix)| Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// Prefix and suffix must both match without overlapping.
    pub fn matches(&self, origin: &str) -> bool {
        origin.len() >= self.prefix.len() + self.suffix.len()
            && origin.starts_with(&self.prefix)
            && origin.ends_with(&self.suffix)
    }
}

#[derive(Clone)]
enum OriginRule {
    Any,
    Listed {
        exact: HashSet<String>,
        patterns: Vec<WildcardOrigin>,
    },
    Predicate(OriginPredicate),
}

#[derive(Debug, Clone)]
enum HeaderRule {
    Any,
    Listed(HashSet<String>),
}

/// The compiled CORS decision engine.
#[derive(Clone)]
pub struct CorsPolicy {
    origins: OriginRule,
    methods: HashSet<String>,
    headers: HeaderRule,
    exposed_headers: Option<HeaderValue>,
    allow_credentials: bool,
    max_age: Option<HeaderValue>,
}

impl CorsPolicy {
    /// Validates and compiles a configuration.
    pub fn compile(config: &CorsConfig) -> Result<Self, GateError> {
        Ok(Self {
            origins: compile_origins(config)?,
            methods: compile_methods(&config.allowed_methods)?,
            headers: compile_headers(&config.allowed_headers),
            exposed_headers: compile_exposed(&config.exposed_headers)?,
            allow_credentials: config.allow_credentials,
            max_age: config
                .max_age_secs
                .filter(|secs| *secs > 0)
                .map(HeaderValue::from),
        })
    }

    /// Whether every origin is allowed and `*` is emitted.
    pub fn allows_all_origins(&self) -> bool {
        matches!(self.origins, OriginRule::Any)
    }

    /// Decides whether `origin` may access the resource.
    pub fn is_origin_allowed(&self, request: &Request, origin: &str) -> bool {
        match &self.origins {
            OriginRule::Any => true,
            OriginRule::Predicate(predicate) => predicate(request, origin),
            OriginRule::Listed { exact, patterns } => {
                let origin = origin.to_lowercase();
                exact.contains(&origin) || patterns.iter().any(|p| p.matches(&origin))
            }
        }
    }

    /// `OPTIONS` is always admissible; other methods must be configured.
    pub fn is_method_allowed(&self, method: &str) -> bool {
        method.eq_ignore_ascii_case(Method::OPTIONS.as_str())
            || self.methods.contains(&method.to_ascii_uppercase())
    }

    /// Checks every requested header, case-insensitively.
    pub fn are_headers_allowed(&self, requested: &[&str]) -> bool {
        match &self.headers {
            HeaderRule::Any => true,
            HeaderRule::Listed(allowed) => requested
                .iter()
                .all(|h| allowed.contains(&h.to_ascii_lowercase())),
        }
    }

    /// Headers for a preflight request.
    ///
    /// The three `Vary` values are always present; the rest only when the
    /// preflight is admissible.
    pub fn preflight_headers(&self, request: &Request) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.append(VARY, HeaderValue::from_static("Origin"));
        headers.append(VARY, HeaderValue::from_static("Access-Control-Request-Method"));
        headers.append(VARY, HeaderValue::from_static("Access-Control-Request-Headers"));

        let Some(origin) = header_str(request, &ORIGIN) else {
            debug!("preflight aborted: missing origin");
            return headers;
        };
        if !self.is_origin_allowed(request, origin) {
            debug!(origin, "preflight aborted: origin not allowed");
            return headers;
        }

        let method = header_str(request, &ACCESS_CONTROL_REQUEST_METHOD).unwrap_or_default();
        if !self.is_method_allowed(method) {
            debug!(method, "preflight aborted: method not allowed");
            return headers;
        }

        let requested = parse_header_list(header_str(request, &ACCESS_CONTROL_REQUEST_HEADERS).unwrap_or_default());
        if !self.are_headers_allowed(&requested) {
            debug!(headers = ?requested, "preflight aborted: headers not allowed");
            return headers;
        }

        self.insert_allow_origin(&mut headers, origin);
        if let Ok(value) = HeaderValue::from_str(&method.to_ascii_uppercase()) {
            headers.insert(ACCESS_CONTROL_ALLOW_METHODS, value);
        }
        if !requested.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&requested.join(", ")) {
                headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, value);
            }
        }
        if self.allow_credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        if let Some(max_age) = &self.max_age {
            headers.insert(ACCESS_CONTROL_MAX_AGE, max_age.clone());
        }
        headers
    }

    /// Headers for an actual (non-preflight) request.
    pub fn actual_headers(&self, request: &Request) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.append(VARY, HeaderValue::from_static("Origin"));

        let Some(origin) = header_str(request, &ORIGIN) else {
            debug!("actual request: no headers added, missing origin");
            return headers;
        };
        if !self.is_origin_allowed(request, origin) {
            debug!(origin, "actual request: no headers added, origin not allowed");
            return headers;
        }
        if !self.is_method_allowed(request.method().as_str()) {
            debug!(method = %request.method(), "actual request: no headers added, method not allowed");
            return headers;
        }

        self.insert_allow_origin(&mut headers, origin);
        if let Some(exposed) = &self.exposed_headers {
            headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, exposed.clone());
        }
        if self.allow_credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        headers
    }

    fn insert_allow_origin(&self, headers: &mut HeaderMap, origin: &str) {
        let value = if self.allows_all_origins() {
            Some(HeaderValue::from_static("*"))
        } else {
            HeaderValue::from_str(origin).ok()
        };
        if let Some(value) = value {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
    }
}

impl std::fmt::Debug for CorsPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorsPolicy")
            .field("allows_all_origins", &self.allows_all_origins())
            .field("methods", &self.methods)
            .field("headers", &self.headers)
            .field("allow_credentials", &self.allow_credentials)
            .finish_non_exhaustive()
    }
}

/// Returns true for a CORS preflight request: `OPTIONS` with a non-empty
/// `Access-Control-Request-Method`.
pub fn is_preflight(request: &Request) -> bool {
    request.method() == Method::OPTIONS
        && header_str(request, &ACCESS_CONTROL_REQUEST_METHOD).is_some()
}

fn compile_origins(config: &CorsConfig) -> Result<OriginRule, GateError> {
    if let Some(predicate) = &config.allow_origin_predicate {
        return Ok(OriginRule::Predicate(Arc::clone(predicate)));
    }
    if config.allowed_origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*") {
        return Ok(OriginRule::Any);
    }

    let mut exact = HashSet::new();
    let mut patterns = Vec::new();
    for origin in &config.allowed_origins {
        let origin = origin.to_lowercase();
        match origin.matches('*').count() {
            0 => {
                exact.insert(origin);
            }
            1 => patterns.extend(WildcardOrigin::parse(&origin)),
            _ => {
                return Err(GateError::config(format!(
                    "cors origin {origin:?} has more than one wildcard"
                )))
            }
        }
    }
    Ok(OriginRule::Listed { exact, patterns })
}

fn compile_methods(methods: &[String]) -> Result<HashSet<String>, GateError> {
    if methods.is_empty() {
        return Ok(DEFAULT_METHODS.iter().map(|m| (*m).to_string()).collect());
    }
    methods
        .iter()
        .map(|m| {
            let upper = m.to_ascii_uppercase();
            Method::from_bytes(upper.as_bytes())
                .map(|_| upper)
                .map_err(|_| GateError::config(format!("invalid cors method: {m:?}")))
        })
        .collect()
}

fn compile_headers(headers: &[String]) -> HeaderRule {
    if headers.iter().any(|h| h == "*") {
        return HeaderRule::Any;
    }
    let mut allowed: HashSet<String> = headers.iter().map(|h| h.to_ascii_lowercase()).collect();
    allowed.insert(ORIGIN.as_str().to_string());
    HeaderRule::Listed(allowed)
}

fn compile_exposed(headers: &[String]) -> Result<Option<HeaderValue>, GateError> {
    if headers.is_empty() {
        return Ok(None);
    }
    let joined = headers
        .iter()
        .map(|h| canonical_header_name(h))
        .collect::<Vec<_>>()
        .join(", ");
    HeaderValue::from_str(&joined)
        .map(Some)
        .map_err(|_| GateError::config(format!("invalid cors exposed headers: {joined:?}")))
}

/// `x-request-id` → `X-Request-Id`.
fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn header_str<'r>(request: &'r Request, name: &http::HeaderName) -> Option<&'r str> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn parse_header_list(list: &str) -> Vec<&str> {
    list.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .collect()
}

/// Merges CORS headers into a response. `Vary` is appended; other headers
/// already set by inner stages are kept.
fn merge_headers(cors: &HeaderMap, response: &mut Response) {
    let target = response.headers_mut();
    for (name, value) in cors {
        if name == VARY {
            target.append(name.clone(), value.clone());
        } else if !target.contains_key(name) {
            target.insert(name.clone(), value.clone());
        }
    }
}

/// CORS middleware.
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    policy: CorsPolicy,
    options_passthrough: bool,
}

impl CorsMiddleware {
    /// Builds the stage from a validated configuration.
    pub fn new(config: CorsConfig) -> Result<Self, GateError> {
        Ok(Self {
            policy: CorsPolicy::compile(&config)?,
            options_passthrough: config.options_passthrough,
        })
    }

    /// The permissive preset, see [`CorsConfig::allow_all`].
    pub fn allow_all() -> Self {
        Self {
            policy: CorsPolicy {
                origins: OriginRule::Any,
                methods: ["HEAD", "GET", "POST", "PUT", "PATCH", "DELETE"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                headers: HeaderRule::Any,
                exposed_headers: None,
                allow_credentials: true,
                max_age: Some(HeaderValue::from(12u64 * 60 * 60)),
            },
            options_passthrough: false,
        }
    }

    /// The compiled policy.
    pub fn policy(&self) -> &CorsPolicy {
        &self.policy
    }
}

impl Middleware for CorsMiddleware {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if is_preflight(&request) {
                debug!("handling preflight request");
                let cors = self.policy.preflight_headers(&request);
                let mut response = if self.options_passthrough {
                    next.run(ctx, request).await
                } else {
                    let mut response = http::Response::new(Full::new(Bytes::new()));
                    *response.status_mut() = StatusCode::OK;
                    response
                };
                merge_headers(&cors, &mut response);
                return response;
            }

            let cors = self.policy.actual_headers(&request);
            let mut response = next.run(ctx, request).await;
            merge_headers(&cors, &mut response);
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpgate_core::text_response;
    use http_body_util::BodyExt;

    fn config(origins: &[&str], methods: &[&str]) -> CorsConfig {
        CorsConfig {
            allowed_origins: origins.iter().map(|s| (*s).to_string()).collect(),
            allowed_methods: methods.iter().map(|s| (*s).to_string()).collect(),
            ..CorsConfig::default()
        }
    }

    fn request(method: Method, headers: &[(&str, &str)]) -> Request {
        let mut builder = http::Request::builder().method(method).uri("/api/items");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    fn preflight(origin: &str, method: &str) -> Request {
        request(
            Method::OPTIONS,
            &[("origin", origin), ("access-control-request-method", method)],
        )
    }

    fn handler(_ctx: &mut RequestContext, _req: Request) -> BoxFuture<'static, Response> {
        Box::pin(async { text_response(StatusCode::ACCEPTED, "text/plain", "handled") })
    }

    async fn run(middleware: &CorsMiddleware, request: Request) -> Response {
        let mut ctx = RequestContext::new();
        middleware.process(&mut ctx, request, Next::handler(handler)).await
    }

    #[test]
    fn test_wildcard_origin_matching() {
        let policy = CorsPolicy::compile(&config(&["a*.b.com"], &[])).unwrap();
        let req = request(Method::GET, &[]);

        assert!(policy.is_origin_allowed(&req, "a-foo.b.com"));
        assert!(!policy.is_origin_allowed(&req, "x.a.b.com"));
    }

    #[test]
    fn test_wildcard_does_not_overlap() {
        let pattern = WildcardOrigin::parse("ab*ba").unwrap();
        assert!(!pattern.matches("aba"));
        assert!(pattern.matches("abba"));
        assert!(pattern.matches("ab-ba"));
    }

    #[test]
    fn test_exact_origin_is_case_insensitive() {
        let policy = CorsPolicy::compile(&config(&["https://App.Example.com"], &[])).unwrap();
        let req = request(Method::GET, &[]);

        assert!(policy.is_origin_allowed(&req, "https://app.example.COM"));
        assert!(!policy.is_origin_allowed(&req, "https://evil.example.com"));
    }

    #[test]
    fn test_star_overrides_lists() {
        let policy = CorsPolicy::compile(&config(&["https://a.com", "*"], &[])).unwrap();
        assert!(policy.allows_all_origins());
        assert!(policy.is_origin_allowed(&request(Method::GET, &[]), "https://anything.net"));
    }

    #[test]
    fn test_empty_origin_list_allows_all() {
        let policy = CorsPolicy::compile(&CorsConfig::default()).unwrap();
        assert!(policy.allows_all_origins());
    }

    #[test]
    fn test_predicate_ignores_lists() {
        let predicate: OriginPredicate = Arc::new(|_req: &Request, origin: &str| origin.ends_with(".trusted.io"));
        let policy = CorsPolicy::compile(&CorsConfig {
            allowed_origins: vec!["*".to_string()],
            allow_origin_predicate: Some(predicate),
            ..CorsConfig::default()
        })
        .unwrap();
        let req = request(Method::GET, &[]);

        assert!(!policy.allows_all_origins());
        assert!(policy.is_origin_allowed(&req, "https://api.trusted.io"));
        assert!(!policy.is_origin_allowed(&req, "https://other.io"));
    }

    #[test]
    fn test_method_rules() {
        let policy = CorsPolicy::compile(&config(&[], &["get", "PUT"])).unwrap();
        assert!(policy.is_method_allowed("GET"));
        assert!(policy.is_method_allowed("put"));
        assert!(policy.is_method_allowed("OPTIONS"));
        assert!(!policy.is_method_allowed("DELETE"));

        let defaults = CorsPolicy::compile(&CorsConfig::default()).unwrap();
        assert!(defaults.is_method_allowed("HEAD"));
        assert!(!defaults.is_method_allowed("PATCH"));
    }

    #[test]
    fn test_header_rules() {
        let policy = CorsPolicy::compile(&CorsConfig {
            allowed_headers: vec!["Content-Type".to_string()],
            ..CorsConfig::default()
        })
        .unwrap();
        assert!(policy.are_headers_allowed(&[]));
        assert!(policy.are_headers_allowed(&["content-type", "Origin"]));
        assert!(!policy.are_headers_allowed(&["content-type", "x-secret"]));

        let any = CorsPolicy::compile(&CorsConfig {
            allowed_headers: vec!["*".to_string()],
            ..CorsConfig::default()
        })
        .unwrap();
        assert!(any.are_headers_allowed(&["x-anything"]));
    }

    #[test]
    fn test_invalid_configurations() {
        assert!(CorsMiddleware::new(config(&["https://*.*.com"], &[])).is_err());
        assert!(CorsMiddleware::new(config(&[], &["GE T"])).is_err());
    }

    #[test]
    fn test_canonical_header_name() {
        assert_eq!(canonical_header_name("x-request-id"), "X-Request-Id");
        assert_eq!(canonical_header_name("ETAG"), "Etag");
    }

    #[tokio::test]
    async fn test_preflight_allowed() {
        let cors = CorsMiddleware::new(config(&["https://app.com"], &["GET", "POST"])).unwrap();
        let response = run(&cors, preflight("https://app.com", "post")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "https://app.com");
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(), "POST");
        assert_eq!(headers.get_all(VARY).iter().count(), 3);
        assert!(headers.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
        assert!(headers.get(ACCESS_CONTROL_MAX_AGE).is_none());
    }

    #[tokio::test]
    async fn test_preflight_method_not_allowed() {
        let cors = CorsMiddleware::new(config(&["https://app.com"], &["GET"])).unwrap();
        let response = run(&cors, preflight("https://app.com", "POST")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).is_none());
        assert_eq!(response.headers().get_all(VARY).iter().count(), 3);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_preflight_without_origin_only_varies() {
        let cors = CorsMiddleware::new(CorsConfig::default()).unwrap();
        let response = run(
            &cors,
            request(Method::OPTIONS, &[("access-control-request-method", "GET")]),
        )
        .await;

        assert_eq!(response.headers().len(), 3);
        assert_eq!(response.headers().get_all(VARY).iter().count(), 3);
    }

    #[tokio::test]
    async fn test_preflight_echoes_requested_headers() {
        let cors = CorsMiddleware::new(CorsConfig {
            allowed_headers: vec!["X-Custom".to_string(), "Content-Type".to_string()],
            allow_credentials: true,
            max_age_secs: Some(600),
            ..CorsConfig::default()
        })
        .unwrap();
        let response = run(
            &cors,
            request(
                Method::OPTIONS,
                &[
                    ("origin", "https://x.com"),
                    ("access-control-request-method", "GET"),
                    ("access-control-request-headers", " x-custom , Content-Type,"),
                ],
            ),
        )
        .await;

        let headers = response.headers();
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_HEADERS).unwrap(), "x-custom, Content-Type");
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
        assert_eq!(headers.get(ACCESS_CONTROL_MAX_AGE).unwrap(), "600");
    }

    #[tokio::test]
    async fn test_preflight_rejects_unlisted_header() {
        let cors = CorsMiddleware::new(CorsConfig::default()).unwrap();
        let response = run(
            &cors,
            request(
                Method::OPTIONS,
                &[
                    ("origin", "https://x.com"),
                    ("access-control-request-method", "GET"),
                    ("access-control-request-headers", "x-secret"),
                ],
            ),
        )
        .await;

        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_options_with_empty_request_method_is_actual_request() {
        let cors = CorsMiddleware::new(config(&["https://app.com"], &["GET"])).unwrap();
        let response = run(
            &cors,
            request(
                Method::OPTIONS,
                &[("origin", "https://app.com"), ("access-control-request-method", "")],
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "https://app.com");
        assert_eq!(response.headers().get_all(VARY).iter().count(), 1);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).is_none());
    }

    #[tokio::test]
    async fn test_preflight_passthrough_runs_handler() {
        let cors = CorsMiddleware::new(CorsConfig {
            options_passthrough: true,
            ..CorsConfig::default()
        })
        .unwrap();
        let response = run(&cors, preflight("https://x.com", "GET")).await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    }

    #[tokio::test]
    async fn test_actual_request_allowed() {
        let cors = CorsMiddleware::new(CorsConfig {
            allowed_origins: vec!["https://*.example.com".to_string()],
            exposed_headers: vec!["x-request-id".to_string(), "etag".to_string()],
            allow_credentials: true,
            ..CorsConfig::default()
        })
        .unwrap();
        let response = run(
            &cors,
            request(Method::GET, &[("origin", "https://shop.example.com")]),
        )
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let headers = response.headers();
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "https://shop.example.com");
        assert_eq!(headers.get(ACCESS_CONTROL_EXPOSE_HEADERS).unwrap(), "X-Request-Id, Etag");
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
        assert_eq!(headers.get(VARY).unwrap(), "Origin");
    }

    #[tokio::test]
    async fn test_actual_request_disallowed_still_proceeds() {
        let cors = CorsMiddleware::new(config(&["https://app.com"], &[])).unwrap();

        let wrong_origin = run(&cors, request(Method::GET, &[("origin", "https://evil.com")])).await;
        assert_eq!(wrong_origin.status(), StatusCode::ACCEPTED);
        assert!(wrong_origin.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(wrong_origin.headers().get(VARY).unwrap(), "Origin");

        let wrong_method = run(&cors, request(Method::DELETE, &[("origin", "https://app.com")])).await;
        assert_eq!(wrong_method.status(), StatusCode::ACCEPTED);
        assert!(wrong_method.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_star_emits_literal_star() {
        let cors = CorsMiddleware::new(config(&["*"], &[])).unwrap();
        let response = run(&cors, request(Method::GET, &[("origin", "https://site.org")])).await;
        assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    }

    #[tokio::test]
    async fn test_allow_all_preset() {
        let cors = CorsMiddleware::allow_all();
        let response = run(&cors, preflight("https://any.dev", "PATCH")).await;

        let headers = response.headers();
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(), "PATCH");
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
        assert_eq!(headers.get(ACCESS_CONTROL_MAX_AGE).unwrap(), "43200");

        let compiled = CorsMiddleware::new(CorsConfig::allow_all()).unwrap();
        assert_eq!(compiled.policy().methods, cors.policy().methods);
    }

    #[test]
    fn test_is_preflight() {
        assert!(is_preflight(&preflight("https://a.com", "GET")));
        assert!(!is_preflight(&request(Method::OPTIONS, &[])));
        assert!(!is_preflight(&request(
            Method::OPTIONS,
            &[("access-control-request-method", "")]
        )));
        assert!(!is_preflight(&request(
            Method::GET,
            &[("access-control-request-method", "GET")]
        )));
    }

    proptest::proptest! {
        #[test]
        fn prop_wildcard_matches_iff_prefix_suffix_fit(
            prefix in "[a-c.]{0,4}",
            suffix in "[a-c.]{0,4}",
            candidate in "[a-c.]{0,10}",
        ) {
            let pattern = WildcardOrigin::parse(&format!("{prefix}*{suffix}")).unwrap();
            let expected = candidate.len() >= prefix.len() + suffix.len()
                && candidate.starts_with(&prefix)
                && candidate.ends_with(&suffix);
            proptest::prop_assert_eq!(pattern.matches(&candidate), expected);
            let joined = format!("{prefix}{suffix}");
            proptest::prop_assert!(pattern.matches(&joined));
        }
    }
}
