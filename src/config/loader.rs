//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that overrides `webhook.secret_key`.
pub const ENV_WEBHOOK_SECRET: &str = "GATEWAY_WEBHOOK_SECRET";
/// Environment variable that overrides `admin.api_key`.
pub const ENV_ADMIN_API_KEY: &str = "GATEWAY_ADMIN_API_KEY";
/// Environment variable that overrides `gateway.api_key`.
pub const ENV_GATEWAY_API_KEY: &str = "GATEWAY_API_KEY";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Secrets set in the environment replace the values from the file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse TOML without validation or environment overrides.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Replace secrets with values from `lookup`. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(secret) = get(ENV_WEBHOOK_SECRET) {
        config.webhook.secret_key = secret;
    }
    if let Some(key) = get(ENV_ADMIN_API_KEY) {
        config.admin.api_key = key;
    }
    if let Some(key) = get(ENV_GATEWAY_API_KEY) {
        config.gateway.api_key = key;
    }
}
