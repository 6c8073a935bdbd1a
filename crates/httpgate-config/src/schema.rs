//! Authorization section of the gateway configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use httpgate_authz::RegoConfig;
use httpgate_middleware::stages::{AuthorizationConfig, DEFAULT_ROLES_HEADER};
use serde::Deserialize;

/// Which policy enforcer backs the authorization stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcerMode {
    /// Every request is allowed.
    AllowAll,
    /// Every request is denied.
    #[default]
    DenyAll,
    /// Role grants from [`AuthorizationSection::grants`].
    Rbac,
    /// Embedded Rego from [`AuthorizationSection::rego`].
    Rego,
}

impl FromStr for EnforcerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow_all" => Ok(Self::AllowAll),
            "deny_all" => Ok(Self::DenyAll),
            "rbac" => Ok(Self::Rbac),
            "rego" => Ok(Self::Rego),
            other => Err(format!(
                "unknown enforcer '{other}', expected 'allow_all', 'deny_all', 'rbac' or 'rego'"
            )),
        }
    }
}

impl fmt::Display for EnforcerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AllowAll => "allow_all",
            Self::DenyAll => "deny_all",
            Self::Rbac => "rbac",
            Self::Rego => "rego",
        })
    }
}

/// `[authorization]`
///
/// ```toml
/// [authorization]
/// enforcer = "rbac"
/// roles_header = "X-User-Roles"
/// decision_timeout_ms = 250
///
/// [authorization.grants]
/// admin = ["*"]
/// viewer = ["GET:/orders/*"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorizationSection {
    /// Decision source. Defaults to `deny_all`.
    pub enforcer: EnforcerMode,
    /// Header the roles are read from.
    pub roles_header: String,
    /// Append `?query` to the action path.
    pub include_query: bool,
    /// Decision deadline.
    pub decision_timeout_ms: Option<u64>,
    /// Role grants for `rbac`.
    pub grants: BTreeMap<String, Vec<String>>,
    /// Engine settings for `rego`.
    pub rego: Option<RegoConfig>,
}

impl Default for AuthorizationSection {
    fn default() -> Self {
        Self {
            enforcer: EnforcerMode::default(),
            roles_header: DEFAULT_ROLES_HEADER.to_string(),
            include_query: false,
            decision_timeout_ms: None,
            grants: BTreeMap::new(),
            rego: None,
        }
    }
}

impl AuthorizationSection {
    /// The stage settings carried by this section.
    pub fn stage_config(&self) -> AuthorizationConfig {
        AuthorizationConfig {
            include_query: self.include_query,
            decision_timeout_ms: self.decision_timeout_ms,
        }
    }
}
