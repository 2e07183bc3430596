//! Snapshot file source.
//!
//! Reads a JSON array of services from disk. A `notify` watcher signals
//! changes so the watch loop can re-read immediately instead of waiting for
//! the next poll tick.

use async_trait::async_trait;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::registry::source::RegistrySource;
use crate::registry::types::{RawService, RegistryError, RegistryResult};

/// Registry backed by a JSON snapshot file.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start watching the snapshot file.
    ///
    /// Returns the watcher (keep it alive) and a receiver that yields one
    /// unit per modify/create event.
    pub fn watch(&self) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<()>), notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::debug!("Snapshot file change detected");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Snapshot file watcher started");
        Ok((watcher, rx))
    }
}

#[async_trait]
impl RegistrySource for FileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn fetch(&self) -> RegistryResult<Vec<RawService>> {
        let content = tokio::fs::read(&self.path).await?;
        serde_json::from_slice(&content).map_err(|e| RegistryError::Decode(e.to_string()))
    }
}
