//! Role-based grants and static decisions.
//!
//! [`RolePolicy`] maps each role to the actions it may perform. Actions are
//! the `"<METHOD>:<path>"` strings built by the authorization stage, and a
//! grant is a pattern over them:
//!
//! | Pattern            | Matches                                       |
//! |--------------------|-----------------------------------------------|
//! | `*`                | every action                                  |
//! | `GET:/orders`      | exactly `GET:/orders`                         |
//! | `*:/orders`        | any method on `/orders`                       |
//! | `GET:/orders/*`    | `GET:/orders` and anything below it           |
//!
//! # Example
//!
//! ```
//! use httpgate_authz::RolePolicy;
//!
//! let policy = RolePolicy::builder()
//!     .allow_role("admin", ["*"])
//!     .allow_role("viewer", ["GET:/orders/*"])
//!     .build()
//!     .unwrap();
//!
//! assert!(policy.permits(["viewer"], "GET:/orders/42"));
//! assert!(!policy.permits(["viewer"], "DELETE:/orders/42"));
//! ```

use std::collections::{BTreeMap, HashMap};

use http::Method;
use httpgate_core::{BoxFuture, PolicyEnforcer, PolicyError, PolicyInput};

use crate::error::{AuthzError, AuthzResult};

/// One grant pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionPattern {
    /// `*`
    Any,
    /// `METHOD:/path`, `*:/path` or `METHOD:/prefix/*`.
    Scoped {
        /// `None` matches any method.
        method: Option<String>,
        /// Path or path prefix.
        path: String,
        /// Whether `path` is a prefix.
        prefix: bool,
    },
}

impl ActionPattern {
    /// Parses a pattern.
    pub fn parse(pattern: &str) -> AuthzResult<Self> {
        let pattern = pattern.trim();
        if pattern == "*" {
            return Ok(Self::Any);
        }

        let (method, path) = pattern
            .split_once(':')
            .ok_or_else(|| AuthzError::invalid_pattern(pattern, "expected METHOD:/path"))?;
        let method = match method {
            "*" => None,
            m => {
                let upper = m.to_ascii_uppercase();
                Method::from_bytes(upper.as_bytes())
                    .map_err(|_| AuthzError::invalid_pattern(pattern, "invalid method"))?;
                Some(upper)
            }
        };
        if !path.starts_with('/') {
            return Err(AuthzError::invalid_pattern(pattern, "path must start with '/'"));
        }

        let (path, prefix) = match path.strip_suffix("/*") {
            Some(stem) => (stem.to_string(), true),
            None => (path.to_string(), false),
        };
        if path.contains('*') {
            return Err(AuthzError::invalid_pattern(
                pattern,
                "'*' is only allowed as the whole method or a trailing '/*'",
            ));
        }
        Ok(Self::Scoped { method, path, prefix })
    }

    /// Whether this pattern grants `action`.
    pub fn matches(&self, action: &str) -> bool {
        let Self::Scoped { method, path, prefix } = self else {
            return true;
        };
        let Some((action_method, action_path)) = action.split_once(':') else {
            return false;
        };
        if method.as_deref().is_some_and(|m| m != action_method) {
            return false;
        }
        if *prefix {
            action_path == path.as_str()
                || action_path
                    .strip_prefix(path.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        } else {
            action_path == path.as_str()
        }
    }
}

/// Role-to-actions grants.
#[derive(Debug, Clone, Default)]
pub struct RolePolicy {
    grants: HashMap<String, Vec<ActionPattern>>,
}

impl RolePolicy {
    /// Starts a builder.
    pub fn builder() -> RolePolicyBuilder {
        RolePolicyBuilder::default()
    }

    /// Builds a policy from a role → patterns table, as found in configuration.
    pub fn from_grants(grants: &BTreeMap<String, Vec<String>>) -> AuthzResult<Self> {
        grants
            .iter()
            .fold(Self::builder(), |builder, (role, patterns)| {
                builder.allow_role(role.as_str(), patterns.iter().map(String::as_str))
            })
            .build()
    }

    /// Whether any of `roles` is granted `action`.
    pub fn permits<I, S>(&self, roles: I, action: &str) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        roles.into_iter().any(|role| {
            self.grants
                .get(role.as_ref())
                .is_some_and(|patterns| patterns.iter().any(|p| p.matches(action)))
        })
    }
}

impl PolicyEnforcer for RolePolicy {
    fn is_allowed<'a>(&'a self, input: &'a PolicyInput) -> BoxFuture<'a, Result<bool, PolicyError>> {
        let allowed = self.permits(&input.roles, &input.action);
        Box::pin(async move { Ok(allowed) })
    }
}

/// Builder for [`RolePolicy`]. Pattern errors surface from [`build`](Self::build).
#[derive(Debug, Default)]
pub struct RolePolicyBuilder {
    grants: Vec<(String, String)>,
}

impl RolePolicyBuilder {
    /// Grants `patterns` to `role`.
    #[must_use]
    pub fn allow_role<R, I, P>(mut self, role: R, patterns: I) -> Self
    where
        R: Into<String>,
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let role = role.into();
        self.grants
            .extend(patterns.into_iter().map(|p| (role.clone(), p.into())));
        self
    }

    /// Parses every pattern.
    pub fn build(self) -> AuthzResult<RolePolicy> {
        let mut grants: HashMap<String, Vec<ActionPattern>> = HashMap::new();
        for (role, pattern) in self.grants {
            grants
                .entry(role)
                .or_default()
                .push(ActionPattern::parse(&pattern)?);
        }
        Ok(RolePolicy { grants })
    }
}

/// Allows every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PolicyEnforcer for AllowAll {
    fn is_allowed<'a>(&'a self, _input: &'a PolicyInput) -> BoxFuture<'a, Result<bool, PolicyError>> {
        Box::pin(async { Ok(true) })
    }
}

/// Denies every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl PolicyEnforcer for DenyAll {
    fn is_allowed<'a>(&'a self, _input: &'a PolicyInput) -> BoxFuture<'a, Result<bool, PolicyError>> {
        Box::pin(async { Ok(false) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(roles: &[&str], action: &str) -> PolicyInput {
        PolicyInput {
            action: action.to_string(),
            ..PolicyInput::with_roles(roles.iter().copied())
        }
    }

    #[test]
    fn test_parse_patterns() {
        assert_eq!(ActionPattern::parse("*").unwrap(), ActionPattern::Any);
        assert_eq!(
            ActionPattern::parse("get:/orders/*").unwrap(),
            ActionPattern::Scoped {
                method: Some("GET".to_string()),
                path: "/orders".to_string(),
                prefix: true,
            }
        );
        assert!(ActionPattern::parse("GET").is_err());
        assert!(ActionPattern::parse("GET:orders").is_err());
        assert!(ActionPattern::parse("GET:/or*ders").is_err());
        assert!(ActionPattern::parse("G ET:/orders").is_err());
    }

    #[test]
    fn test_exact_match() {
        let pattern = ActionPattern::parse("GET:/orders").unwrap();
        assert!(pattern.matches("GET:/orders"));
        assert!(!pattern.matches("GET:/orders/1"));
        assert!(!pattern.matches("POST:/orders"));
    }

    #[test]
    fn test_any_method() {
        let pattern = ActionPattern::parse("*:/health").unwrap();
        assert!(pattern.matches("GET:/health"));
        assert!(pattern.matches("HEAD:/health"));
        assert!(!pattern.matches("GET:/healthz"));
    }

    #[test]
    fn test_prefix_does_not_match_sibling() {
        let pattern = ActionPattern::parse("GET:/orders/*").unwrap();
        assert!(pattern.matches("GET:/orders"));
        assert!(pattern.matches("GET:/orders/1/items"));
        assert!(!pattern.matches("GET:/orders-archive"));
    }

    #[test]
    fn test_role_policy() {
        let policy = RolePolicy::builder()
            .allow_role("admin", ["*"])
            .allow_role("viewer", ["GET:/orders/*", "GET:/status"])
            .build()
            .unwrap();

        assert!(policy.permits(["admin"], "DELETE:/anything"));
        assert!(policy.permits(["guest", "viewer"], "GET:/status"));
        assert!(!policy.permits(["viewer"], "POST:/orders"));
        assert!(!policy.permits(Vec::<String>::new(), "GET:/status"));
    }

    #[test]
    fn test_builder_reports_bad_pattern() {
        let result = RolePolicy::builder().allow_role("x", ["nope"]).build();
        assert!(matches!(result, Err(AuthzError::InvalidPattern { .. })));
    }

    #[test]
    fn test_from_grants() {
        let mut grants = BTreeMap::new();
        grants.insert("ops".to_string(), vec!["POST:/deploy".to_string()]);
        let policy = RolePolicy::from_grants(&grants).unwrap();
        assert!(policy.permits(["ops"], "POST:/deploy"));
    }

    #[tokio::test]
    async fn test_enforcers() {
        let policy = RolePolicy::builder()
            .allow_role("admin", ["*"])
            .build()
            .unwrap();
        assert!(policy.is_allowed(&input(&["admin"], "GET:/")).await.unwrap());
        assert!(!policy.is_allowed(&input(&["user"], "GET:/")).await.unwrap());
        assert!(AllowAll.is_allowed(&input(&[], "GET:/")).await.unwrap());
        assert!(!DenyAll.is_allowed(&input(&["admin"], "GET:/")).await.unwrap());
    }
}
