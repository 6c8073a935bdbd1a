//! Response interception.
//!
//! Rewrites selected status codes into problem-detail responses after the
//! inner stages have produced them. The rewrite is done by
//! [`InterceptingWriter`], a [`ResponseSink`] decorator that holds back an
//! intercepted status and swaps whatever body follows for a synthesized
//! problem document.
//!
//! # Example
//!
//! ```rust,ignore
//! use httpgate_middleware::stages::{InterceptorConfig, InterceptorMiddleware};
//!
//! let config = InterceptorConfig {
//!     intercept: [404, 500].into(),
//!     messages: [(404, "no such resource".to_string())].into(),
//! };
//! let interceptor = InterceptorMiddleware::new(config)?;
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::convert::Infallible;

use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use httpgate_core::{
    respond_error, BoxFuture, GateError, ProblemOptions, Request, RequestContext, Response,
    ResponseSink, ResponseWriter,
};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::middleware::{Middleware, Next};

/// Configuration for [`InterceptorMiddleware`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterceptorConfig {
    /// Status codes to rewrite.
    pub intercept: BTreeSet<u16>,
    /// Custom `detail` per intercepted status. Without one the reason phrase is used.
    #[serde(deserialize_with = "status_keyed")]
    pub messages: BTreeMap<u16, String>,
}

impl InterceptorConfig {
    /// Checks that every code is a valid status and every message has a code.
    pub fn validate(&self) -> Result<(), GateError> {
        if let Some(code) = self.intercept.iter().find(|c| !(100..=599).contains(*c)) {
            return Err(GateError::config(format!(
                "intercepted status {code} is outside 100..=599"
            )));
        }
        if let Some(code) = self.messages.keys().find(|c| !self.intercept.contains(c)) {
            return Err(GateError::config(format!(
                "custom message for status {code}, which is not intercepted"
            )));
        }
        Ok(())
    }
}

// TOML table keys are always strings.
fn status_keyed<'de, D>(deserializer: D) -> Result<BTreeMap<u16, String>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, String>::deserialize(deserializer)?
        .into_iter()
        .map(|(code, message)| {
            code.trim()
                .parse::<u16>()
                .map(|code| (code, message))
                .map_err(|_| serde::de::Error::custom(format!("invalid status code key: {code:?}")))
        })
        .collect()
}

/// Compiled interception rules.
#[derive(Debug, Clone, Default)]
pub struct InterceptRules {
    codes: HashSet<StatusCode>,
    messages: HashMap<StatusCode, String>,
}

impl InterceptRules {
    /// Validates and compiles a configuration.
    pub fn from_config(config: &InterceptorConfig) -> Result<Self, GateError> {
        config.validate()?;
        let status = |code: u16| {
            StatusCode::from_u16(code)
                .map_err(|_| GateError::config(format!("invalid status code {code}")))
        };

        let codes = config
            .intercept
            .iter()
            .map(|code| status(*code))
            .collect::<Result<_, _>>()?;
        let messages = config
            .messages
            .iter()
            .map(|(code, message)| Ok((status(*code)?, message.clone())))
            .collect::<Result<_, GateError>>()?;
        Ok(Self { codes, messages })
    }

    /// Whether `status` is rewritten.
    pub fn intercepts(&self, status: StatusCode) -> bool {
        self.codes.contains(&status)
    }

    /// The custom message for `status`, if any.
    pub fn message(&self, status: StatusCode) -> Option<&str> {
        self.messages.get(&status).map(String::as_str)
    }
}

/// A sink decorator that replaces intercepted responses with problem details.
///
/// - `write_header` with an intercepted status holds it instead of forwarding.
/// - The first `write` after a held status discards the chunk and writes the
///   synthesized problem in its place. Later chunks are discarded too.
/// - [`finish`](Self::finish) flushes a status that is still held, so a
///   handler that never wrote a body still gets the problem response.
///
/// Everything else is forwarded to the wrapped sink unchanged.
pub struct InterceptingWriter<'w, S: ResponseSink + ?Sized> {
    inner: &'w mut S,
    rules: &'w InterceptRules,
    options: ProblemOptions,
    held: Option<StatusCode>,
    replaced: bool,
}

impl<'w, S: ResponseSink + ?Sized> InterceptingWriter<'w, S> {
    /// Wraps `inner`. `options` supplies instance and request id for the problem.
    pub fn new(inner: &'w mut S, rules: &'w InterceptRules, options: ProblemOptions) -> Self {
        Self {
            inner,
            rules,
            options,
            held: None,
            replaced: false,
        }
    }

    /// The status currently held back, if any.
    pub fn held_status(&self) -> Option<StatusCode> {
        self.held
    }

    /// Writes the synthetic error for a status that is still held.
    pub fn finish(mut self) {
        if let Some(status) = self.held.take() {
            self.synthesize(status);
        }
    }

    fn synthesize(&mut self, status: StatusCode) {
        debug!(status = status.as_u16(), "rewriting intercepted status");
        let problem = GateError::Intercepted { status }.to_problem(ProblemOptions {
            detail: self.rules.message(status).map(str::to_string),
            ..self.options.clone()
        });
        respond_error(&mut *self.inner, &problem);
        self.replaced = true;
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for InterceptingWriter<'_, S> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.rules.intercepts(status) {
            self.held = Some(status);
        } else {
            self.inner.write_header(status);
        }
    }

    fn write(&mut self, chunk: &[u8]) {
        if let Some(status) = self.held.take() {
            self.synthesize(status);
            return;
        }
        if !self.replaced {
            self.inner.write(chunk);
        }
    }
}

/// Middleware that rewrites configured status codes into problem details.
///
/// Responses with any other status pass through untouched and unbuffered.
#[derive(Debug, Clone, Default)]
pub struct InterceptorMiddleware {
    rules: InterceptRules,
}

impl InterceptorMiddleware {
    /// Builds the stage from a validated configuration.
    pub fn new(config: InterceptorConfig) -> Result<Self, GateError> {
        Ok(Self {
            rules: InterceptRules::from_config(&config)?,
        })
    }

    /// The compiled rules.
    pub fn rules(&self) -> &InterceptRules {
        &self.rules
    }
}

impl Middleware for InterceptorMiddleware {
    fn name(&self) -> &'static str {
        "interceptor"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let options = ProblemOptions::for_request(ctx, &request);
            let response = next.run(ctx, request).await;
            if !self.rules.intercepts(response.status()) {
                return response;
            }

            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .unwrap_or_else(|never: Infallible| match never {})
                .to_bytes();

            let mut sink = ResponseWriter::new();
            *sink.headers_mut() = parts.headers;
            let mut writer = InterceptingWriter::new(&mut sink, &self.rules, options);
            writer.write_header(parts.status);
            if !body.is_empty() {
                writer.write(&body);
            }
            writer.finish();
            sink.into_response()
        })
    }
}
