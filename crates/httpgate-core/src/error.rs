//! The error taxonomy shared by every pipeline stage.
//!
//! Each variant knows the HTTP status it maps to and how to render itself as a
//! [`ProblemDetail`](crate::ProblemDetail).

use http::StatusCode;
use thiserror::Error;

use crate::policy::PolicyError;
use crate::problem::{reason_phrase, ProblemDetail, ProblemOptions};

/// Result type alias using [`GateError`].
pub type GateResult<T> = Result<T, GateError>;

/// Detail sent with every authorization denial.
pub const ACCESS_DENIED_DETAIL: &str = "You do not have permission to perform this action.";

/// Errors surfaced by pipeline stages.
#[derive(Debug, Error)]
pub enum GateError {
    /// The request did not carry a usable authorization input.
    #[error("invalid request: {message}")]
    InvalidInput {
        /// What was wrong with the request.
        message: String,
    },

    /// The policy oracle denied the action.
    #[error("access denied")]
    AccessDenied,

    /// The policy oracle could not reach a decision. Always fail-closed.
    #[error(transparent)]
    PolicyEvaluation(#[from] PolicyError),

    /// The inner handler panicked.
    #[error("recovered from panic")]
    Panic {
        /// The panic payload, for logs only.
        message: String,
    },

    /// A configured status was rewritten into a problem response.
    #[error("status {}", .status.as_u16())]
    Intercepted {
        /// The status the inner handler produced.
        status: StatusCode,
    },

    /// A stage was built from an invalid configuration record.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GateError {
    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns the HTTP status this error maps to.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::Intercepted { status } => *status,
            Self::PolicyEvaluation(_) | Self::Panic { .. } | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Renders this error as a problem document.
    ///
    /// An explicit `options.detail` always takes precedence.
    pub fn to_problem(&self, options: ProblemOptions) -> ProblemDetail {
        let status = self.status_code();
        match self {
            Self::AccessDenied => ProblemDetail::new(
                "access denied",
                status,
                ProblemOptions {
                    detail: options
                        .detail
                        .clone()
                        .or_else(|| Some(ACCESS_DENIED_DETAIL.to_string())),
                    ..options
                },
            ),
            Self::Intercepted { status } => ProblemDetail::from_error(
                self,
                *status,
                ProblemOptions {
                    detail: options
                        .detail
                        .clone()
                        .or_else(|| Some(reason_phrase(*status))),
                    ..options
                },
            ),
            _ => ProblemDetail::from_error(self, status, options),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GateError::invalid_input("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(GateError::AccessDenied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            GateError::from(PolicyError::Timeout(Duration::from_millis(50))).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GateError::Intercepted {
                status: StatusCode::NOT_FOUND
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_access_denied_problem() {
        let problem = GateError::AccessDenied.to_problem(ProblemOptions::default());
        assert_eq!(problem.title(), "access denied");
        assert_eq!(problem.status(), 403);
        assert_eq!(problem.detail(), Some(ACCESS_DENIED_DETAIL));
    }

    #[test]
    fn test_intercepted_problem_defaults_to_reason_phrase() {
        let err = GateError::Intercepted {
            status: StatusCode::NOT_FOUND,
        };
        let problem = err.to_problem(ProblemOptions::default());
        assert_eq!(problem.title(), "Not Found");
        assert_eq!(problem.detail(), Some("Not Found"));
    }

    #[test]
    fn test_intercepted_status_without_reason_phrase() {
        let err = GateError::Intercepted {
            status: StatusCode::from_u16(499).unwrap(),
        };
        let problem = err.to_problem(ProblemOptions::default());
        assert_eq!(problem.title(), "Status 499");
        assert_eq!(problem.detail(), Some("Status 499"));
        assert_eq!(problem.status(), 499);
    }

    #[test]
    fn test_intercepted_problem_uses_custom_message() {
        let err = GateError::Intercepted {
            status: StatusCode::NOT_FOUND,
        };
        let problem = err.to_problem(ProblemOptions {
            detail: Some("nothing here".to_string()),
            ..ProblemOptions::default()
        });
        assert_eq!(problem.detail(), Some("nothing here"));
    }

    #[test]
    fn test_policy_failure_detail_is_error_message() {
        let err = GateError::from(PolicyError::Evaluation("engine offline".to_string()));
        let problem = err.to_problem(ProblemOptions::default());
        assert_eq!(problem.status(), 500);
        assert_eq!(
            problem.detail(),
            Some("policy evaluation failed: engine offline")
        );
    }

    #[test]
    fn test_panic_message_stays_out_of_problem() {
        let err = GateError::Panic {
            message: "index out of bounds".to_string(),
        };
        let problem = err.to_problem(ProblemOptions::default());
        assert_eq!(problem.detail(), Some("recovered from panic"));
    }
}
