//! Configuration for the embedded Rego enforcer.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{AuthzError, AuthzResult};

/// Configuration for [`RegoEnforcer`](crate::RegoEnforcer).
///
/// ```toml
/// [authorization.rego]
/// query = "data.httpgate.authz.allow"
/// policies_path = "policies"
/// data_files = ["policies/roles.json"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegoConfig {
    /// Query whose first expression is the boolean decision.
    pub query: String,
    /// A `.rego` file, or a directory searched recursively for `.rego` and
    /// `.json` files.
    pub policies_path: PathBuf,
    /// Extra JSON data documents outside `policies_path`.
    pub data_files: Vec<PathBuf>,
    /// Fail evaluation on builtin errors instead of treating them as undefined.
    pub strict_builtin_errors: bool,
}

impl RegoConfig {
    /// Creates a configuration for `query` over the policies at `path`.
    pub fn new(query: impl Into<String>, policies_path: impl Into<PathBuf>) -> Self {
        Self {
            query: query.into(),
            policies_path: policies_path.into(),
            ..Self::default()
        }
    }

    /// Adds a data file.
    #[must_use]
    pub fn with_data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_files.push(path.into());
        self
    }

    /// Query and policies path are both required.
    pub fn validate(&self) -> AuthzResult<()> {
        if self.query.trim().is_empty() {
            return Err(AuthzError::Config("rego query must not be empty".to_string()));
        }
        if self.policies_path.as_os_str().is_empty() {
            return Err(AuthzError::Config(
                "rego policies path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(RegoConfig::new("data.x.allow", "policies").validate().is_ok());
        assert!(RegoConfig::new("", "policies").validate().is_err());
        assert!(RegoConfig::new("data.x.allow", "").validate().is_err());
        assert!(RegoConfig::default().validate().is_err());
    }

    #[test]
    fn test_deserialize() {
        let config: RegoConfig = serde_json::from_str(
            r#"{"query":"data.a.allow","policies_path":"p","data_files":["d.json"]}"#,
        )
        .unwrap();
        assert_eq!(config, RegoConfig::new("data.a.allow", "p").with_data_file("d.json"));
    }
}
