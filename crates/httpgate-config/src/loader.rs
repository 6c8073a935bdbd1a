//! Layered configuration loading.
//!
//! Layers apply in call order, later ones overriding earlier ones:
//!
//! 1. Built-in defaults or a preset
//! 2. A configuration file (TOML or JSON) or string
//! 3. `.env` entries, exported into the process environment
//! 4. `PREFIX__SECTION__KEY` environment variables
//!
//! A file or string layer replaces the whole configuration: fields it leaves
//! out take their defaults, not the values of an earlier layer.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use httpgate_authz::RegoConfig;
use httpgate_core::IdFormat;
use httpgate_middleware::stages::CorsConfig;

use crate::schema::AuthorizationSection;
use crate::{ConfigError, GatewayConfig};

/// Default prefix for environment overrides.
pub const DEFAULT_ENV_PREFIX: &str = "HTTPGATE";

/// Configuration loader with a layered approach.
///
/// # Example
///
/// ```no_run
/// use httpgate_config::ConfigLoader;
///
/// # fn main() -> Result<(), httpgate_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_production()
///     .with_optional_file("httpgate.toml")?
///     .with_dotenv()?
///     .with_env_prefix("HTTPGATE")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: GatewayConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a loader holding the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the default configuration.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = GatewayConfig::default();
        self
    }

    /// Reset to [`GatewayConfig::development`].
    ///
    /// ```
    /// use httpgate_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = GatewayConfig::development();
        self
    }

    /// Reset to [`GatewayConfig::production`].
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = GatewayConfig::production();
        self
    }

    /// Load a `.toml` or `.json` file, chosen by extension.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or unreadable, has another extension,
    /// does not parse, or contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.config = Self::parse(&content, &file_format(path)?)?;
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in `format` (`"toml"` or `"json"`).
    ///
    /// ```
    /// use httpgate_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[trace_id]\nheader_name = \"X-Request-ID\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.trace_id.header_name, "X-Request-ID");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = Self::parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Export the entries of `./.env` (if present) into the environment.
    ///
    /// Variables already set in the process are not overwritten.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::DotenvError(e.to_string())),
        }
    }

    /// Export the entries of a specific `.env` file into the environment.
    pub fn with_dotenv_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        dotenvy::from_path(path.as_ref()).map_err(|e| ConfigError::DotenvError(e.to_string()))?;
        Ok(self)
    }

    /// Apply `PREFIX__SECTION__KEY` variables when loading.
    ///
    /// List values are comma separated:
    ///
    /// - `HTTPGATE__TRACE_ID__HEADER_NAME=X-Request-ID`
    /// - `HTTPGATE__CORS__ALLOWED_ORIGINS=https://a.example.com,https://*.b.example.com`
    /// - `HTTPGATE__AUTHORIZATION__ENFORCER=rbac`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Apply environment overrides and validate.
    pub fn load(self) -> Result<GatewayConfig, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides without validating.
    pub fn load_unvalidated(mut self) -> Result<GatewayConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let scope = format!("{prefix}__");
            let mut vars: Vec<(String, String)> = env::vars()
                .filter(|(key, _)| key.starts_with(&scope))
                .collect();
            vars.sort();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }
        Ok(self.config)
    }

    fn parse(content: &str, format: &str) -> Result<GatewayConfig, ConfigError> {
        match format {
            "toml" => Ok(toml::from_str(content)?),
            "json" => Ok(serde_json::from_str(content)?),
            other => Err(ConfigError::validation_error(format!(
                "unsupported configuration format: {other}"
            ))),
        }
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let path = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;
        let parts: Vec<&str> = path.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["TRACE_ID", "HEADER_NAME"] => config.trace_id.header_name = value.to_string(),
            ["TRACE_ID", "ID_FORMAT"] => {
                config.trace_id.id_format = match value.to_lowercase().as_str() {
                    "v7" => IdFormat::V7,
                    "v4" => IdFormat::V4,
                    _ => return Err(ConfigError::env_parse_error(key, "expected 'v7' or 'v4'")),
                };
            }

            ["RECOVERY", "INCLUDE_STACK_TRACE"] => {
                config.recovery.include_stack_trace = bool_var(key, value)?;
            }

            ["INTERCEPTOR", "INTERCEPT"] => {
                config.interceptor.intercept = list(value)
                    .map(|code| {
                        code.parse::<u16>()
                            .map_err(|_| ConfigError::env_parse_error(key, "expected status codes"))
                    })
                    .collect::<Result<_, _>>()?;
            }

            ["CORS", field] => apply_cors(config.cors.get_or_insert_with(CorsConfig::default), field, key, value)?,

            ["AUTHORIZATION", rest @ ..] => apply_authorization(
                config.authorization.get_or_insert_with(AuthorizationSection::default),
                rest,
                key,
                value,
            )?,

            ["HEALTH", "CHECK_TIMEOUT_MS"] => config.health.check_timeout_ms = optional_u64(key, value)?,
            ["HEALTH", "VERSION"] => config.health.version = value.to_string(),

            ["LOGGING", "ENABLED"] => config.logging.enabled = bool_var(key, value)?,
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "JSON_FORMAT"] => config.logging.json_format = bool_var(key, value)?,
            ["LOGGING", "SERVICE_NAME"] => config.logging.service_name = value.to_string(),

            // Unknown keys are ignored.
            _ => {}
        }
        Ok(())
    }
}

fn apply_cors(cors: &mut CorsConfig, field: &str, key: &str, value: &str) -> Result<(), ConfigError> {
    match field {
        "ALLOWED_ORIGINS" => cors.allowed_origins = list(value).map(String::from).collect(),
        "ALLOWED_METHODS" => cors.allowed_methods = list(value).map(String::from).collect(),
        "ALLOWED_HEADERS" => cors.allowed_headers = list(value).map(String::from).collect(),
        "EXPOSED_HEADERS" => cors.exposed_headers = list(value).map(String::from).collect(),
        "ALLOW_CREDENTIALS" => cors.allow_credentials = bool_var(key, value)?,
        "MAX_AGE_SECS" => cors.max_age_secs = optional_u64(key, value)?,
        "OPTIONS_PASSTHROUGH" => cors.options_passthrough = bool_var(key, value)?,
        _ => {}
    }
    Ok(())
}

fn apply_authorization(
    section: &mut AuthorizationSection,
    path: &[&str],
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    match path {
        ["ENFORCER"] => {
            section.enforcer = value
                .parse()
                .map_err(|reason: String| ConfigError::env_parse_error(key, reason))?;
        }
        ["ROLES_HEADER"] => section.roles_header = value.to_string(),
        ["INCLUDE_QUERY"] => section.include_query = bool_var(key, value)?,
        ["DECISION_TIMEOUT_MS"] => section.decision_timeout_ms = optional_u64(key, value)?,
        ["REGO", "QUERY"] => section.rego.get_or_insert_with(RegoConfig::default).query = value.to_string(),
        ["REGO", "POLICIES_PATH"] => {
            section.rego.get_or_insert_with(RegoConfig::default).policies_path = PathBuf::from(value);
        }
        ["REGO", "DATA_FILES"] => {
            section.rego.get_or_insert_with(RegoConfig::default).data_files =
                list(value).map(PathBuf::from).collect();
        }
        _ => {}
    }
    Ok(())
}

fn file_format(path: &Path) -> Result<String, ConfigError> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some(ext @ ("toml" | "json")) => Ok(ext.to_string()),
        _ => Err(ConfigError::validation_error(format!(
            "unsupported configuration file format: {}",
            path.display()
        ))),
    }
}

fn list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn bool_var(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn optional_u64(key: &str, value: &str) -> Result<Option<u64>, ConfigError> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer or 'none'"))
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
