//! Health endpoint configuration.

use std::time::Duration;

use serde::Deserialize;

/// Settings shared by [`Probe`](crate::Probe) and [`Status`](crate::Status).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Per-check timeout. `None` lets a check run as long as the request does.
    pub check_timeout_ms: Option<u64>,

    /// Version reported by the status endpoint.
    pub version: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_timeout_ms: None,
            version: "unknown".to_string(),
        }
    }
}

impl HealthConfig {
    /// The per-check timeout as a [`Duration`].
    pub fn check_timeout(&self) -> Option<Duration> {
        self.check_timeout_ms.map(Duration::from_millis)
    }
}
