//! Snapshot source abstraction.

use async_trait::async_trait;

use crate::registry::types::{RawService, RegistryResult};

/// A registry that can produce a complete snapshot of its services.
///
/// Every call returns the full current membership, never a delta. The watch
/// loop calls `fetch` serially, so implementations need no internal locking.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Short name for logs.
    fn describe(&self) -> String;

    /// Fetch the current full set of services.
    async fn fetch(&self) -> RegistryResult<Vec<RawService>>;
}
