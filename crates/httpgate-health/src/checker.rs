//! The check port.

use std::future::Future;
use std::sync::Arc;

use httpgate_core::BoxFuture;
use thiserror::Error;

/// Why a check failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    /// The dependency reported a problem.
    #[error("{0}")]
    Failed(String),

    /// The check exceeded the probe's per-check timeout.
    #[error("check timed out")]
    TimedOut,

    /// The check task panicked.
    #[error("check panicked")]
    Panicked,
}

impl CheckError {
    /// A failure with `message`.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// One health check. `Ok(())` means healthy.
pub trait Checker: Send + Sync + 'static {
    /// Runs the check.
    fn check(&self) -> BoxFuture<'_, Result<(), CheckError>>;
}

impl<T: Checker + ?Sized> Checker for Arc<T> {
    fn check(&self) -> BoxFuture<'_, Result<(), CheckError>> {
        (**self).check()
    }
}

/// Adapts an async closure into a [`Checker`].
///
/// ```
/// use httpgate_health::{CheckError, FnChecker};
///
/// let db = FnChecker::new(|| async { Err(CheckError::failed("connection refused")) });
/// ```
pub struct FnChecker<F> {
    f: F,
}

impl<F, Fut> FnChecker<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CheckError>> + Send + 'static,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> Checker for FnChecker<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CheckError>> + Send + 'static,
{
    fn check(&self) -> BoxFuture<'_, Result<(), CheckError>> {
        Box::pin((self.f)())
    }
}

impl<F> std::fmt::Debug for FnChecker<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnChecker").finish_non_exhaustive()
    }
}
