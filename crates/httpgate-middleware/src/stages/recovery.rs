//! Panic recovery middleware.
//!
//! Catches panics raised anywhere further down the chain and turns them into
//! a generic `500` problem response. The panic message and a backtrace are
//! logged; neither reaches the client unless `include_stack_trace` is set.
//!
//! The backtrace is taken by a process-wide panic hook, installed once when
//! the first stage is built, so it shows the panicking frame rather than the
//! frames left after unwinding. The hook chains to the previous one.
//!
//! Panicking with [`AbortRequest`] (see [`abort_request`]) is never caught
//! here. The unwind continues to the transport so the connection is dropped.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::Once;

use futures_util::FutureExt;
use http::header::CONNECTION;
use http::StatusCode;
use httpgate_core::{
    empty_response, present_error, BoxFuture, GateError, ProblemOptions, Request, RequestContext,
    Response,
};
use serde::Deserialize;
use tracing::error;

use crate::middleware::{Middleware, Next};

/// Panic payload that aborts the request instead of producing a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortRequest;

/// Aborts the current request by unwinding past [`RecoveryMiddleware`].
pub fn abort_request() -> ! {
    std::panic::panic_any(AbortRequest)
}

/// Configuration for [`RecoveryMiddleware`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoveryConfig {
    /// Put the captured backtrace in the problem's `stackTrace` field.
    /// Development only.
    pub include_stack_trace: bool,
}

thread_local! {
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static TRACE_HOOK: Once = Once::new();

/// Records a backtrace at the panic site for the thread that panicked.
fn install_trace_hook() {
    TRACE_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// The trace recorded by the hook on this thread. `catch_unwind` runs on the
/// thread that panicked, so this is the trace of the panic just caught.
fn take_panic_trace() -> String {
    PANIC_TRACE
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| Backtrace::force_capture().to_string())
}

/// Middleware that converts panics into `500` problem responses.
#[derive(Debug, Clone)]
pub struct RecoveryMiddleware {
    config: RecoveryConfig,
}

impl RecoveryMiddleware {
    /// Creates the stage and installs the backtrace hook if needed.
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self {
        install_trace_hook();
        Self { config }
    }
}

impl Default for RecoveryMiddleware {
    fn default() -> Self {
        Self::new(RecoveryConfig::default())
    }
}

impl Middleware for RecoveryMiddleware {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let upgrade = is_upgrade(&request);
            let uri = request.uri().clone();

            let outcome = AssertUnwindSafe(next.run(ctx, request)).catch_unwind().await;
            let payload = match outcome {
                Ok(response) => return response,
                Err(payload) => payload,
            };
            let stack_trace = take_panic_trace();
            if payload.is::<AbortRequest>() {
                std::panic::resume_unwind(payload);
            }

            let message = panic_message(payload.as_ref());
            error!(
                panic = %message,
                stack_trace = %stack_trace,
                uri = %uri,
                "recovered from panic"
            );

            if upgrade {
                return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
            }

            let mut options = ProblemOptions::for_target(ctx, &uri);
            if self.config.include_stack_trace {
                options.stack_trace = Some(stack_trace);
            }
            present_error(
                &GateError::Panic { message },
                StatusCode::INTERNAL_SERVER_ERROR,
                options,
            )
        })
    }
}

fn is_upgrade(request: &Request) -> bool {
    request
        .headers()
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
