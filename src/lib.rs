//! Registry-to-proxy configuration synchronizer.

// Core pipeline
pub mod config;
pub mod reconcile;
pub mod registry;
pub mod render;
pub mod store;
pub mod proxy;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;

pub use config::schema::SyncConfig;
pub use lifecycle::Shutdown;
pub use reconcile::{PassReport, Reconciler, ReconcilerHandle};
