//! Reconciliation of registry snapshots against on-disk artifacts.
//!
//! # Responsibilities
//! - Decide which services are proxied (selector)
//! - Diff each snapshot against the cache and drive the artifact store
//! - Report what every pass did
//!
//! # Data Flow
//! ```text
//! RegistrySource ──snapshot──▶ ReconcilerHandle ──▶ Reconciler ──▶ ArtifactStore ──▶ proxy
//!                                    ▲
//!                     admin API ─────┘ (services, last report)
//! ```

pub mod engine;
pub mod handle;
pub mod report;
pub mod selector;

pub use engine::Reconciler;
pub use handle::{ReconcileCommand, ReconcilerError, ReconcilerHandle};
pub use report::{Action, PassReport, ServiceFailure};
pub use selector::{LabelPresent, Selector};
