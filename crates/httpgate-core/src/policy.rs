//! The policy port: what the authorization stage sends to a policy oracle.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::BoxFuture;

/// The authorization request handed to a [`PolicyEnforcer`].
///
/// Serialized as the `input` document of a policy query:
///
/// ```json
/// { "roles": ["admin"], "action": "GET:/orders", "payload": {} }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyInput {
    /// Roles held by the caller.
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// `"<METHOD>:<PATH>"`, set by the authorization stage.
    #[serde(default)]
    pub action: String,
    /// Free-form attributes produced by the extractor.
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl PolicyInput {
    /// Creates an input holding the given roles.
    pub fn with_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Adds a payload attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Builds the action string for a request method and target.
    ///
    /// ```
    /// use httpgate_core::PolicyInput;
    ///
    /// assert_eq!(PolicyInput::action_for(&http::Method::DELETE, "/orders/1"), "DELETE:/orders/1");
    /// ```
    #[must_use]
    pub fn action_for(method: &http::Method, target: &str) -> String {
        format!("{}:{}", method.as_str().to_ascii_uppercase(), target)
    }
}

/// Failure of a policy oracle to reach a decision.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy engine failed while evaluating.
    #[error("policy evaluation failed: {0}")]
    Evaluation(String),

    /// The policy produced something other than a boolean decision.
    #[error("policy returned a non-boolean result: {0}")]
    InvalidResult(String),

    /// No decision was reached within the configured deadline.
    #[error("policy decision timed out after {0:?}")]
    Timeout(Duration),
}

/// An oracle answering "is this action allowed".
///
/// Implementations are shared by every in-flight request and must be safe for
/// concurrent use. Dropping the returned future abandons the evaluation.
pub trait PolicyEnforcer: Send + Sync + 'static {
    /// Decides whether `input` is allowed.
    fn is_allowed<'a>(&'a self, input: &'a PolicyInput) -> BoxFuture<'a, Result<bool, PolicyError>>;
}

impl<T: PolicyEnforcer + ?Sized> PolicyEnforcer for std::sync::Arc<T> {
    fn is_allowed<'a>(&'a self, input: &'a PolicyInput) -> BoxFuture<'a, Result<bool, PolicyError>> {
        (**self).is_allowed(input)
    }
}
