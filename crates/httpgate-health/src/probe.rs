//! Health check fan-out.
//!
//! A [`Probe`] runs every registered check concurrently and answers with the
//! joined result:
//!
//! | Checks                 | Status | Body                         |
//! |------------------------|--------|------------------------------|
//! | none                   | `200`  | `OK`                         |
//! | all pass               | `200`  | per-check JSON map           |
//! | at least one fails     | `503`  | per-check JSON map           |
//!
//! ```json
//! {
//!   "cache": { "status": "OK", "durationMs": 0.41 },
//!   "db":    { "status": "FAIL", "durationMs": 12.7, "error": "connection refused" }
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;
use httpgate_core::{present_error, text_response, ProblemOptions, Response};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::warn;

use crate::checker::{CheckError, Checker};
use crate::config::HealthConfig;

/// Pass or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    /// Healthy.
    Ok,
    /// Unhealthy.
    Fail,
}

/// The outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// Pass or fail.
    pub status: CheckStatus,
    /// Wall time spent in the check, in milliseconds.
    pub duration_ms: f64,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn from_outcome(outcome: Result<(), CheckError>, started: Instant) -> Self {
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        match outcome {
            Ok(()) => Self {
                status: CheckStatus::Ok,
                duration_ms,
                error: None,
            },
            Err(err) => Self {
                status: CheckStatus::Fail,
                duration_ms,
                error: Some(err.to_string()),
            },
        }
    }

    /// Whether the check passed.
    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Ok
    }
}

/// Joined results of one probe invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    /// Results keyed by check name.
    pub checks: BTreeMap<String, CheckResult>,
}

impl ProbeReport {
    /// Whether every check passed.
    pub fn is_healthy(&self) -> bool {
        self.checks.values().all(CheckResult::passed)
    }

    /// `200` when healthy, else `503`.
    pub fn status_code(&self) -> StatusCode {
        if self.is_healthy() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Health probe over a fixed set of named checks.
#[derive(Clone)]
pub struct Probe {
    checks: Arc<BTreeMap<String, Arc<dyn Checker>>>,
    config: HealthConfig,
}

impl Probe {
    /// Creates a probe. A later check with the same name replaces an earlier one.
    pub fn new<I, N>(checks: I, config: HealthConfig) -> Self
    where
        I: IntoIterator<Item = (N, Arc<dyn Checker>)>,
        N: Into<String>,
    {
        Self {
            checks: Arc::new(
                checks
                    .into_iter()
                    .map(|(name, check)| (name.into(), check))
                    .collect(),
            ),
            config,
        }
    }

    /// A probe with no checks: always `200 OK`.
    pub fn liveness() -> Self {
        Self::new(Vec::<(String, Arc<dyn Checker>)>::new(), HealthConfig::default())
    }

    /// Names of the registered checks.
    pub fn check_names(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }

    /// Runs every check concurrently and waits for all of them.
    ///
    /// Dropping the returned future aborts the checks still in flight.
    pub async fn run(&self) -> ProbeReport {
        let results = Arc::new(Mutex::new(BTreeMap::new()));
        let timeout = self.config.check_timeout();
        let mut tasks = JoinSet::new();

        for (name, checker) in self.checks.iter() {
            let name = name.clone();
            let checker = Arc::clone(checker);
            let results = Arc::clone(&results);
            tasks.spawn(async move {
                let started = Instant::now();
                let outcome = match timeout {
                    Some(limit) => tokio::time::timeout(limit, checker.check())
                        .await
                        .unwrap_or(Err(CheckError::TimedOut)),
                    None => checker.check().await,
                };
                results
                    .lock()
                    .insert(name, CheckResult::from_outcome(outcome, started));
            });
        }
        while tasks.join_next().await.is_some() {}

        let mut checks = std::mem::take(&mut *results.lock());
        for name in self.checks.keys() {
            checks.entry(name.clone()).or_insert_with(|| CheckResult {
                status: CheckStatus::Fail,
                duration_ms: 0.0,
                error: Some(CheckError::Panicked.to_string()),
            });
        }

        for (name, result) in checks.iter().filter(|(_, r)| !r.passed()) {
            warn!(
                check = %name,
                duration_ms = result.duration_ms,
                error = result.error.as_deref().unwrap_or_default(),
                "health check failed"
            );
        }
        ProbeReport { checks }
    }

    /// Runs the probe and renders the HTTP response.
    pub async fn respond(&self) -> Response {
        if self.checks.is_empty() {
            return text_response(StatusCode::OK, "text/plain; charset=utf-8", "OK");
        }

        let report = self.run().await;
        match serde_json::to_vec(&report.checks) {
            Ok(body) => text_response(report.status_code(), "application/json; charset=utf-8", body),
            Err(err) => present_error(&err, StatusCode::INTERNAL_SERVER_ERROR, ProblemOptions::default()),
        }
    }
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Probe")
            .field("checks", &self.checks.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}
