//! The gateway configuration root.

use httpgate_authz::RolePolicy;
use httpgate_health::HealthConfig;
use httpgate_middleware::stages::{
    CorsConfig, CorsPolicy, InterceptorConfig, RecoveryConfig, RolesHeader, TraceIdConfig,
    TraceIdMiddleware,
};
use httpgate_telemetry::LogConfig;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::schema::{AuthorizationSection, EnforcerMode};

/// Everything needed to assemble a gateway pipeline.
///
/// Stages that are optional in the pipeline are optional here: a missing
/// `[cors]` or `[authorization]` table leaves that stage out, and an empty
/// intercept set leaves out the interceptor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// `[trace_id]`
    pub trace_id: TraceIdConfig,
    /// `[recovery]`
    pub recovery: RecoveryConfig,
    /// `[interceptor]`
    pub interceptor: InterceptorConfig,
    /// `[cors]`
    pub cors: Option<CorsConfig>,
    /// `[authorization]`
    pub authorization: Option<AuthorizationSection>,
    /// `[health]`
    pub health: HealthConfig,
    /// `[logging]`
    pub logging: LogConfig,
}

impl GatewayConfig {
    /// Development preset: pretty debug logs, stack traces in problem
    /// bodies and permissive CORS.
    #[must_use]
    pub fn development() -> Self {
        Self {
            recovery: RecoveryConfig {
                include_stack_trace: true,
            },
            cors: Some(CorsConfig::allow_all()),
            logging: LogConfig::development(),
            ..Self::default()
        }
    }

    /// Production preset: JSON logs, no stack traces.
    #[must_use]
    pub fn production() -> Self {
        Self {
            logging: LogConfig::production(),
            ..Self::default()
        }
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let header = self.trace_id.header_name.trim();
        if header.is_empty() {
            return Err(ConfigError::missing_field("trace_id.header_name"));
        }
        TraceIdMiddleware::new(self.trace_id.clone())
            .map_err(|e| ConfigError::invalid_value("trace_id.header_name", e))?;

        self.interceptor
            .validate()
            .map_err(|e| ConfigError::invalid_value("interceptor", e))?;

        if let Some(cors) = &self.cors {
            CorsPolicy::compile(cors).map_err(|e| ConfigError::invalid_value("cors", e))?;
        }

        if let Some(authorization) = &self.authorization {
            validate_authorization(authorization)?;
        }

        if self.health.check_timeout_ms == Some(0) {
            return Err(ConfigError::invalid_value(
                "health.check_timeout_ms",
                "must be greater than zero",
            ));
        }

        self.logging
            .validate()
            .map_err(|e| ConfigError::invalid_value("logging.level", e))?;

        Ok(())
    }
}

fn validate_authorization(section: &AuthorizationSection) -> Result<(), ConfigError> {
    RolesHeader::new(&section.roles_header)
        .map_err(|e| ConfigError::invalid_value("authorization.roles_header", e))?;

    if section.decision_timeout_ms == Some(0) {
        return Err(ConfigError::invalid_value(
            "authorization.decision_timeout_ms",
            "must be greater than zero",
        ));
    }

    match section.enforcer {
        EnforcerMode::AllowAll | EnforcerMode::DenyAll => Ok(()),
        EnforcerMode::Rbac => RolePolicy::from_grants(&section.grants)
            .map(|_| ())
            .map_err(|e| ConfigError::invalid_value("authorization.grants", e)),
        EnforcerMode::Rego => section
            .rego
            .as_ref()
            .ok_or_else(|| ConfigError::missing_field("authorization.rego"))?
            .validate()
            .map_err(|e| ConfigError::invalid_value("authorization.rego", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.cors.is_none());
        assert!(config.authorization.is_none());
        assert_eq!(config.trace_id.header_name, "TransactionId");
    }

    #[test]
    fn test_presets() {
        let dev = GatewayConfig::development();
        assert!(dev.validate().is_ok());
        assert!(dev.recovery.include_stack_trace);
        assert_eq!(dev.logging.level, "debug");
        assert!(dev.cors.is_some());

        let prod = GatewayConfig::production();
        assert!(!prod.recovery.include_stack_trace);
        assert!(prod.logging.json_format);
    }

    #[test]
    fn test_rejects_bad_trace_header() {
        let mut config = GatewayConfig::default();
        config.trace_id.header_name = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::MissingField { .. })));

        config.trace_id.header_name = "bad header".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_rejects_bad_interceptor() {
        let mut config = GatewayConfig::default();
        config.interceptor.intercept = [700].into();
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.interceptor.intercept = [404].into();
        config.interceptor.messages = [(500, "boom".to_string())].into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_double_wildcard_origin() {
        let config = GatewayConfig {
            cors: Some(CorsConfig {
                allowed_origins: vec!["https://*.*.example.com".to_string()],
                ..CorsConfig::default()
            }),
            ..GatewayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut config = GatewayConfig::default();
        config.logging.level = "chatty".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_authorization_validation() {
        let mut section = AuthorizationSection {
            enforcer: EnforcerMode::Rego,
            ..AuthorizationSection::default()
        };
        let config = GatewayConfig {
            authorization: Some(section.clone()),
            ..GatewayConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MissingField { .. })));

        section.rego = Some(httpgate_authz::RegoConfig::new("", "policies"));
        let config = GatewayConfig {
            authorization: Some(section.clone()),
            ..GatewayConfig::default()
        };
        assert!(config.validate().is_err());

        section.enforcer = EnforcerMode::Rbac;
        section.grants = [("admin".to_string(), vec!["nonsense".to_string()])].into();
        let config = GatewayConfig {
            authorization: Some(section),
            ..GatewayConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
