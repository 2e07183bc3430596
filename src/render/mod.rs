//! Artifact rendering subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     template file (or built-in nginx block)
//!     → template.rs (compile, fail fast on definition errors)
//!
//! Per write:
//!     ServiceRecord
//!     → nginx.rs (labels → ArtifactContext, value checks)
//!     → template.rs (fill)
//!     → artifact text
//! ```

pub mod nginx;
pub mod template;

pub use nginx::{ArtifactRenderer, RenderError, DEFAULT_TEMPLATE};
pub use template::{ArtifactContext, Template, TemplateError};
