//! Artifact storage subsystem.
//!
//! # Data Flow
//! ```text
//! upsert(record):  mkdir -p → render → write tmp → rename → reload
//! remove(name):    unlink → reload
//! write/delete:    the same file steps without the reload (batched passes)
//! ```

pub mod artifact;

pub use artifact::{ArtifactError, ArtifactStore};
