//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides)
//!     → validation.rs (semantic checks)
//!     → SyncConfig (validated, immutable)
//!     → handed by value/reference to each subsystem constructor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - No process-wide mutable settings

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    AdminConfig, ArtifactConfig, LogFormat, ObservabilityConfig, ProxyCommandConfig,
    ReconcileConfig, RegistryConfig, RegistryKind, ReloadMode, RenderLabels, ReplaceStrategy,
    SelectionConfig, SyncConfig,
};
