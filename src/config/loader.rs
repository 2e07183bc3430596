//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::SyncConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, override and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<SyncConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: SyncConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build configuration from defaults plus environment overrides only.
pub fn load_from_env() -> Result<SyncConfig, ConfigError> {
    let mut config = SyncConfig::default();

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the deployment environment variables on top of `config`.
///
/// Recognized keys:
/// - `PROXY_NGINX_DIR` → `artifacts.dir`
/// - `PROXY_DOMAIN` → `artifacts.domain`
/// - `PROXY_LABEL` → `selection.label` (and `artifacts.domain` when
///   `selection.legacy_label_sets_domain` is set)
/// - `KUBERNETES_API_PROTOCOL`, `KUBERNETES_RO_SERVICE_HOST`,
///   `KUBERNETES_RO_SERVICE_PORT` → `registry.url`
///
/// Empty values are ignored. `lookup` is injected so tests never touch the
/// real process environment.
pub fn apply_env_overrides<F>(config: &mut SyncConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(dir) = get("PROXY_NGINX_DIR") {
        config.artifacts.dir = dir.into();
    }
    if let Some(domain) = get("PROXY_DOMAIN") {
        config.artifacts.domain = domain;
    }
    if let Some(label) = get("PROXY_LABEL") {
        if config.selection.legacy_label_sets_domain {
            tracing::warn!(
                label = %label,
                "legacy_label_sets_domain is set: PROXY_LABEL also replaces the artifact domain"
            );
            config.artifacts.domain = label.clone();
        }
        config.selection.label = label;
    }

    let protocol = get("KUBERNETES_API_PROTOCOL");
    let host = get("KUBERNETES_RO_SERVICE_HOST");
    let port = get("KUBERNETES_RO_SERVICE_PORT");
    if protocol.is_some() || host.is_some() || port.is_some() {
        config.registry.url = format!(
            "{}://{}:{}",
            protocol.as_deref().unwrap_or("http"),
            host.as_deref().unwrap_or("127.0.0.1"),
            port.as_deref().unwrap_or("8080"),
        );
    }
}
