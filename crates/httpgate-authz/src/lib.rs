//! httpgate authorization - policy enforcers
//!
//! Concrete [`PolicyEnforcer`](httpgate_core::PolicyEnforcer) implementations
//! for the authorization stage:
//!
//! | Enforcer         | Decision source                                  |
//! |------------------|--------------------------------------------------|
//! | [`RegoEnforcer`] | embedded OPA/Rego policies (`regorus`)           |
//! | [`RolePolicy`]   | role → action pattern grants                     |
//! | [`AllowAll`]     | always allow                                     |
//! | [`DenyAll`]      | always deny                                      |
//!
//! # Architecture
//!
//! ```text
//!      PolicyInput { roles, action, payload }
//!          │
//!          ▼
//!     ┌────────────────────┐
//!     │ AuthorizationStage │──── is_allowed ────▶ dyn PolicyEnforcer
//!     └────────────────────┘                        │
//!                                     ┌─────────────┼──────────────┐
//!                                     ▼             ▼              ▼
//!                               RegoEnforcer    RolePolicy    AllowAll/DenyAll
//! ```
//!
//! # Example
//!
//! ```ignore
//! use httpgate_authz::{RegoConfig, RegoEnforcer};
//!
//! let enforcer = RegoEnforcer::from_config(&RegoConfig::new(
//!     "data.httpgate.authz.allow",
//!     "policies/",
//! ))?;
//! ```

#![doc(html_root_url = "https://docs.rs/httpgate-authz/0.1.0")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod rbac;
pub mod rego;

pub use config::RegoConfig;
pub use error::{AuthzError, AuthzResult};
pub use rbac::{ActionPattern, AllowAll, DenyAll, RolePolicy, RolePolicyBuilder};
pub use rego::RegoEnforcer;
