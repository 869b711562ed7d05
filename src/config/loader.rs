//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Optional TOML file holding tunables.
pub const CONFIG_FILE_ENV: &str = "GATEWAY_CONFIG";

pub const ENV_KEY: &str = "ENV";
pub const PORT_KEY: &str = "PORT";
pub const FRONTEND_URL_KEY: &str = "FRONTEND_URL";
pub const AUTH_SERVICE_URL_KEY: &str = "AUTH_SERVICE_URL";
pub const TEMPLATE_SERVICE_URL_KEY: &str = "TEMPLATE_SERVICE_URL";
pub const PDF_SERVICE_URL_KEY: &str = "PDF_SERVICE_URL";
pub const JWT_SECRET_KEY: &str = "JWT_SECRET";
pub const COOKIE_SECURE_KEY: &str = "COOKIE_SECURE";
pub const METRICS_ADDRESS_KEY: &str = "METRICS_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("empty key: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key} ('{value}'): {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from the process environment.
pub fn load_config() -> Result<GatewayConfig, ConfigError> {
    load_with(|key| std::env::var(key).ok())
}

/// Load and validate configuration, reading settings through `lookup`.
///
/// A TOML file named by `GATEWAY_CONFIG` is read first; environment values
/// override it. Required settings missing from both sources are reported by
/// the environment key that should carry them. `PORT` is optional; without it
/// the listener keeps its configured or default `0.0.0.0:8080`.
pub fn load_with<F>(lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

    let mut config = match get(CONFIG_FILE_ENV) {
        Some(path) => load_file(Path::new(&path))?,
        None => GatewayConfig::default(),
    };

    if let Some(env) = get(ENV_KEY) {
        config.env = env;
    }
    if let Some(port) = get(PORT_KEY) {
        config.listener.bind_address = normalize_bind_address(&port);
    }
    if let Some(origin) = get(FRONTEND_URL_KEY) {
        config.cors.allowed_origin = origin;
    }
    if let Some(url) = get(AUTH_SERVICE_URL_KEY) {
        config.upstreams.auth = url;
    }
    if let Some(url) = get(TEMPLATE_SERVICE_URL_KEY) {
        config.upstreams.templates = url;
    }
    if let Some(url) = get(PDF_SERVICE_URL_KEY) {
        config.upstreams.pdf = url;
    }
    if let Some(secret) = get(JWT_SECRET_KEY) {
        config.auth.jwt_secret = secret;
    }
    if let Some(raw) = get(COOKIE_SECURE_KEY) {
        let secure = parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
            key: COOKIE_SECURE_KEY,
            value: raw.clone(),
            reason: "expected a boolean".to_string(),
        })?;
        config.auth.cookie_secure = Some(secure);
    }
    if let Some(address) = get(METRICS_ADDRESS_KEY) {
        config.observability.metrics_address = Some(address);
    }

    require(&config.cors.allowed_origin, FRONTEND_URL_KEY)?;
    require(&config.upstreams.auth, AUTH_SERVICE_URL_KEY)?;
    require(&config.upstreams.templates, TEMPLATE_SERVICE_URL_KEY)?;
    require(&config.upstreams.pdf, PDF_SERVICE_URL_KEY)?;
    require(&config.auth.jwt_secret, JWT_SECRET_KEY)?;
    if config.auth.cookie_secure.is_none() {
        return Err(ConfigError::Missing(COOKIE_SECURE_KEY));
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load a TOML file without applying the environment or validating.
pub fn load_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

fn require(value: &str, key: &'static str) -> Result<(), ConfigError> {
    if value.is_empty() {
        tracing::error!(var = key, "Failed to load environment");
        return Err(ConfigError::Missing(key));
    }
    Ok(())
}

/// `PORT` may be `:8080`, `8080` or a full `host:port`.
fn normalize_bind_address(port: &str) -> String {
    if let Some(bare) = port.strip_prefix(':') {
        format!("0.0.0.0:{bare}")
    } else if port.chars().all(|c| c.is_ascii_digit()) {
        format!("0.0.0.0:{port}")
    } else {
        port.to_string()
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
