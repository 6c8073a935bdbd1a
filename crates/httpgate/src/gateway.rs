//! Assembling a pipeline from [`GatewayConfig`].
//!
//! Stages are added in a fixed order. Optional stages are skipped when their
//! section is absent:
//!
//! ```text
//! trace_id → request_logger → recovery → [interceptor] → [cors] → [authorization]
//! ```

use std::sync::Arc;

use httpgate_authz::{AllowAll, AuthzError, DenyAll, RegoEnforcer, RolePolicy};
use httpgate_config::{AuthorizationSection, ConfigError, EnforcerMode, GatewayConfig};
use httpgate_core::{GateError, PolicyEnforcer};
use httpgate_middleware::stages::{
    AuthorizationMiddleware, CorsMiddleware, InterceptorMiddleware, RecoveryMiddleware,
    RequestLoggerMiddleware, RolesHeader, TraceIdMiddleware,
};
use httpgate_middleware::{BoxedMiddleware, Chain};
use thiserror::Error;
use tracing::info;

/// Why a pipeline could not be assembled.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The configuration did not validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A stage rejected its settings.
    #[error(transparent)]
    Stage(#[from] GateError),

    /// The policy enforcer could not be loaded.
    #[error(transparent)]
    Authz(#[from] AuthzError),
}

/// Builds the enforcer selected by `section`.
pub fn build_enforcer(section: &AuthorizationSection) -> Result<Arc<dyn PolicyEnforcer>, BuildError> {
    let enforcer: Arc<dyn PolicyEnforcer> = match section.enforcer {
        EnforcerMode::AllowAll => Arc::new(AllowAll),
        EnforcerMode::DenyAll => Arc::new(DenyAll),
        EnforcerMode::Rbac => Arc::new(RolePolicy::from_grants(&section.grants)?),
        EnforcerMode::Rego => {
            let rego = section
                .rego
                .as_ref()
                .ok_or_else(|| ConfigError::missing_field("authorization.rego"))?;
            Arc::new(RegoEnforcer::from_config(rego)?)
        }
    };
    Ok(enforcer)
}

/// Validates `config` and builds its chain.
pub fn build_chain(config: &GatewayConfig) -> Result<Chain, BuildError> {
    config.validate()?;

    let mut stages: Vec<BoxedMiddleware> = vec![
        Arc::new(TraceIdMiddleware::new(config.trace_id.clone())?),
        Arc::new(RequestLoggerMiddleware::new()),
        Arc::new(RecoveryMiddleware::new(config.recovery.clone())),
    ];
    if !config.interceptor.intercept.is_empty() {
        stages.push(Arc::new(InterceptorMiddleware::new(config.interceptor.clone())?));
    }
    if let Some(cors) = &config.cors {
        stages.push(Arc::new(CorsMiddleware::new(cors.clone())?));
    }
    if let Some(section) = &config.authorization {
        stages.push(Arc::new(AuthorizationMiddleware::new(
            build_enforcer(section)?,
            Arc::new(RolesHeader::new(&section.roles_header)?),
            section.stage_config(),
        )));
    }

    let chain = Chain::from_stages(stages);
    info!(stages = ?chain.stage_names(), "pipeline assembled");
    Ok(chain)
}
