//! Registry subsystem.
//!
//! # Data Flow
//! ```text
//! Kubernetes API (kubernetes.rs)  ─┐
//!                                  ├→ RegistrySource::fetch → full snapshot
//! JSON snapshot file (file.rs)    ─┘
//!     → watch.rs (poll tick / file change)
//!     → ReconcilerHandle::reconcile
//! ```
//!
//! # Design Decisions
//! - Sources always return complete snapshots, never deltas
//! - A failed fetch keeps the current state; it is never an empty snapshot
//! - Client construction failure is the only fatal registry error

pub mod file;
pub mod kubernetes;
pub mod source;
pub mod types;
pub mod watch;

pub use file::FileSource;
pub use kubernetes::KubernetesSource;
pub use source::RegistrySource;
pub use types::{Labels, Protocol, RawService, RegistryError, RegistryResult, ServiceRecord};
pub use watch::{build_source, run_watch, sync_once, SnapshotTrigger, SyncError};
