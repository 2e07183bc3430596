//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, intervals > 0)
//! - Check that addresses and URLs parse before anything binds or connects
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SyncConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{RegistryKind, SyncConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending key (e.g. `proxy.reload_command`).
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a loaded configuration, collecting every problem found.
pub fn validate_config(config: &SyncConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.artifacts.dir.as_os_str().is_empty() {
        errors.push(ValidationError::new("artifacts.dir", "must not be empty"));
    }
    if config.artifacts.domain.trim().is_empty() {
        errors.push(ValidationError::new("artifacts.domain", "must not be empty"));
    }
    let ext = &config.artifacts.extension;
    if ext.is_empty() || ext.starts_with('.') || ext.contains('/') {
        errors.push(ValidationError::new(
            "artifacts.extension",
            format!("invalid extension {ext:?} (no leading dot, no path separators)"),
        ));
    }
    if config.selection.label.trim().is_empty() {
        errors.push(ValidationError::new("selection.label", "must not be empty"));
    }

    if config.proxy.validate_command.is_empty() {
        errors.push(ValidationError::new("proxy.validate_command", "must name a program"));
    }
    if config.proxy.reload_command.is_empty() {
        errors.push(ValidationError::new("proxy.reload_command", "must name a program"));
    }
    if config.proxy.command_timeout_secs == 0 {
        errors.push(ValidationError::new("proxy.command_timeout_secs", "must be > 0"));
    }

    if config.registry.poll_interval_secs == 0 {
        errors.push(ValidationError::new("registry.poll_interval_secs", "must be > 0"));
    }
    if config.registry.request_timeout_secs == 0 {
        errors.push(ValidationError::new("registry.request_timeout_secs", "must be > 0"));
    }
    match config.registry.kind {
        RegistryKind::Kubernetes => {
            if let Err(e) = url::Url::parse(&config.registry.url) {
                errors.push(ValidationError::new(
                    "registry.url",
                    format!("invalid URL {:?}: {}", config.registry.url, e),
                ));
            }
        }
        RegistryKind::File => {
            if config.registry.snapshot_path.as_os_str().is_empty() {
                errors.push(ValidationError::new("registry.snapshot_path", "must not be empty"));
            }
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {}", config.observability.metrics_address),
        ));
    }
    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("not a socket address: {}", config.admin.bind_address),
            ));
        }
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
