//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! SIGTERM / Ctrl-C (signals.rs)
//!     → Shutdown::trigger (shutdown.rs)
//!     → registry watch and admin server stop
//!     → ReconcilerHandle::shutdown (queued passes finish first)
//! ```
//!
//! # Design Decisions
//! - An in-flight pass is never interrupted; artifacts are written atomically
//! - No hot reload: configuration changes need a restart

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
