//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the sync daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the sync daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Artifact directory and rendering settings.
    pub artifacts: ArtifactConfig,

    /// Which registry services get a routing artifact.
    pub selection: SelectionConfig,

    /// Proxy validate/reload commands.
    pub proxy: ProxyCommandConfig,

    /// Where snapshots come from.
    pub registry: RegistryConfig,

    /// Reconciliation behavior.
    pub reconcile: ReconcileConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Read-only admin API.
    pub admin: AdminConfig,
}

/// Artifact directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Directory holding one artifact per service.
    pub dir: PathBuf,

    /// Suffix for default hosts (`<name>.<domain>`).
    pub domain: String,

    /// Artifact file extension, without the leading dot.
    pub extension: String,

    /// Optional template file replacing the built-in nginx template.
    pub template_path: Option<PathBuf>,

    /// Directory that TLS certificate and key labels are resolved against.
    pub tls_dir: PathBuf,

    /// Label keys consumed by the renderer.
    pub labels: RenderLabels,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/etc/nginx/conf.d"),
            domain: "proxy.local".to_string(),
            extension: "conf".to_string(),
            template_path: None,
            tls_dir: PathBuf::from("/etc/nginx/ssl"),
            labels: RenderLabels::default(),
        }
    }
}

/// Service label keys read when rendering an artifact.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RenderLabels {
    /// Overrides the default `<name>.<domain>` host.
    pub host: String,

    /// Extra server name.
    pub alias: String,

    /// `"true"` enables websocket upgrade headers.
    pub websocket: String,

    /// Certificate file name under `tls_dir`.
    pub tls_cert: String,

    /// Key file name under `tls_dir`.
    pub tls_key: String,
}

impl Default for RenderLabels {
    fn default() -> Self {
        Self {
            host: "host".to_string(),
            alias: "hostname".to_string(),
            websocket: "websockets".to_string(),
            tls_cert: "tls-cert".to_string(),
            tls_key: "tls-key".to_string(),
        }
    }
}

/// Selection predicate configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    /// Services carrying this label key are proxied.
    pub label: String,

    /// Reproduce the old wiring where the label override also replaced the
    /// artifact domain. Off unless explicitly needed for parity.
    pub legacy_label_sets_domain: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            label: "proxy".to_string(),
            legacy_label_sets_domain: false,
        }
    }
}

/// Proxy process commands.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProxyCommandConfig {
    /// Configuration check (argv). Must exit zero.
    pub validate_command: Vec<String>,

    /// Reload/restart (argv). Must exit zero.
    pub reload_command: Vec<String>,

    /// Deadline for each command in seconds.
    pub command_timeout_secs: u64,
}

impl Default for ProxyCommandConfig {
    fn default() -> Self {
        Self {
            validate_command: vec!["/usr/sbin/nginx".to_string(), "-t".to_string()],
            reload_command: vec![
                "/usr/sbin/service".to_string(),
                "nginx".to_string(),
                "reload".to_string(),
            ],
            command_timeout_secs: 30,
        }
    }
}

/// Registry backend kind.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    /// Kubernetes-compatible service list API.
    #[default]
    Kubernetes,
    /// JSON snapshot file on disk.
    File,
}

/// Registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    pub kind: RegistryKind,

    /// API base URL (kubernetes kind).
    pub url: String,

    /// Restrict to one namespace; all namespaces when unset.
    pub namespace: Option<String>,

    /// Inline bearer token.
    pub token: Option<String>,

    /// File holding the bearer token (read once at startup).
    pub token_file: Option<PathBuf>,

    /// Snapshot file (file kind).
    pub snapshot_path: PathBuf,

    /// Poll interval in seconds.
    pub poll_interval_secs: u64,

    /// Registry request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            kind: RegistryKind::Kubernetes,
            url: "http://127.0.0.1:8080".to_string(),
            namespace: None,
            token: None,
            token_file: None,
            snapshot_path: PathBuf::from("services.json"),
            poll_interval_secs: 10,
            request_timeout_secs: 10,
        }
    }
}

/// When the proxy is reloaded during a pass.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReloadMode {
    /// One reload per artifact write or delete.
    #[default]
    PerChange,
    /// One reload after the pass, if anything changed on disk.
    Batched,
}

/// How an endpoint change is applied.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceStrategy {
    /// Delete the old artifact (and reload), then write the new one.
    #[default]
    RemoveThenAdd,
    /// Overwrite in place; the service is never left without an artifact.
    Overwrite,
}

/// Reconciliation behavior.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct ReconcileConfig {
    pub reload_mode: ReloadMode,
    pub replace_strategy: ReplaceStrategy,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
