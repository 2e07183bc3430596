//! Proxy process boundary.
//!
//! # Data Flow
//! ```text
//! ArtifactStore mutation
//!     → ProcessController::reload
//!         → validate (e.g. `nginx -t`)   ── fail → ReloadError::Validation
//!         → apply    (e.g. `service nginx reload`) ── fail → ReloadError::Apply
//! ```

pub mod controller;
#[cfg(test)]
pub mod testing;

pub use controller::{CommandController, ProcessController, ProcessFailure, ReloadError};
