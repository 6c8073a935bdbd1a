//! Service status endpoint.

use std::time::{Duration, Instant};

use http::StatusCode;
use httpgate_core::{present_error, text_response, ProblemOptions, Response};
use serde::Serialize;

/// Reports uptime, hostname and version.
///
/// ```json
/// {"uptime":"2h14m3s","hostname":"gate-7f9c","version":"1.4.0"}
/// ```
#[derive(Debug, Clone)]
pub struct Status {
    started_at: Instant,
    hostname: String,
    version: String,
}

#[derive(Serialize)]
struct StatusBody<'a> {
    uptime: String,
    hostname: &'a str,
    version: &'a str,
}

impl Status {
    /// Starts the uptime clock now.
    ///
    /// The hostname comes from `HOSTNAME`, falling back to `localhost`.
    pub fn new(version: impl Into<String>) -> Self {
        let hostname = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| "localhost".to_string());
        Self::with_hostname(version, hostname)
    }

    /// Uses an explicit hostname.
    pub fn with_hostname(version: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            started_at: Instant::now(),
            hostname: hostname.into(),
            version: version.into(),
        }
    }

    /// Time since construction.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// The reported hostname.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The reported version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Renders the status document.
    pub fn respond(&self) -> Response {
        let body = StatusBody {
            uptime: format_uptime(self.uptime()),
            hostname: &self.hostname,
            version: &self.version,
        };
        match serde_json::to_vec(&body) {
            Ok(body) => text_response(StatusCode::OK, "application/json; charset=utf-8", body),
            Err(err) => present_error(&err, StatusCode::INTERNAL_SERVER_ERROR, ProblemOptions::default()),
        }
    }
}

/// `350ms`, `4.021s`, `3m7s`, `2h14m3s`.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else if seconds > 0 {
        format!("{seconds}.{:03}s", uptime.subsec_millis())
    } else {
        format!("{}ms", uptime.subsec_millis())
    }
}
