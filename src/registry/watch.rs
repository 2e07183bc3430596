//! Registry watch loop.
//!
//! # Responsibilities
//! - Build the configured source
//! - Fetch a snapshot on every poll tick (and on file changes)
//! - Hand each snapshot to the reconciler
//!
//! # Design Decisions
//! - The first tick fires immediately, so startup converges without waiting
//! - Fetch errors are logged and counted; the cache and artifacts stay as-is
//! - Bursts of file events collapse into one fetch

use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};

use crate::config::{RegistryConfig, RegistryKind};
use crate::observability::metrics;
use crate::reconcile::{PassReport, ReconcilerError, ReconcilerHandle};
use crate::registry::file::FileSource;
use crate::registry::kubernetes::KubernetesSource;
use crate::registry::source::RegistrySource;
use crate::registry::types::{RegistryError, RegistryResult};

/// Change notifications for sources that can push them.
pub struct SnapshotTrigger {
    _watcher: notify::RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<()>,
}

impl SnapshotTrigger {
    /// Wait for the next change, swallowing any burst queued behind it.
    async fn changed(&mut self) -> Option<()> {
        self.rx.recv().await?;
        while self.rx.try_recv().is_ok() {}
        Some(())
    }
}

async fn next_change(trigger: &mut Option<SnapshotTrigger>) {
    match trigger {
        Some(t) => {
            if t.changed().await.is_none() {
                tracing::warn!("Snapshot file watcher stopped; falling back to polling");
                *trigger = None;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

/// Errors of a single fetch-and-reconcile step.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Reconciler(#[from] ReconcilerError),
}

/// Construct the registry source named by the config.
///
/// File sources also get a change trigger when the file can be watched.
pub fn build_source(
    config: &RegistryConfig,
) -> RegistryResult<(Box<dyn RegistrySource>, Option<SnapshotTrigger>)> {
    match config.kind {
        RegistryKind::Kubernetes => {
            let source = KubernetesSource::new(config)?;
            Ok((Box::new(source), None))
        }
        RegistryKind::File => {
            let source = FileSource::new(&config.snapshot_path);
            let trigger = match source.watch() {
                Ok((watcher, rx)) => Some(SnapshotTrigger {
                    _watcher: watcher,
                    rx,
                }),
                Err(e) => {
                    tracing::warn!(path = ?config.snapshot_path, error = %e, "Cannot watch snapshot file; polling only");
                    None
                }
            };
            Ok((Box::new(source), trigger))
        }
    }
}

/// Fetch one snapshot and run one pass over it.
pub async fn sync_once(
    source: &dyn RegistrySource,
    handle: &ReconcilerHandle,
) -> Result<PassReport, SyncError> {
    let snapshot = source.fetch().await.inspect_err(|_| metrics::record_registry_fetch_error())?;
    tracing::debug!(source = %source.describe(), services = snapshot.len(), "Snapshot fetched");
    Ok(handle.reconcile(snapshot).await?)
}

/// Poll the source until shutdown, reconciling every snapshot.
pub async fn run_watch(
    source: Box<dyn RegistrySource>,
    poll_interval: Duration,
    mut trigger: Option<SnapshotTrigger>,
    handle: ReconcilerHandle,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        source = %source.describe(),
        interval_secs = poll_interval.as_secs(),
        "Registry watch started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = next_change(&mut trigger) => {
                tracing::debug!("Snapshot change triggered a pass");
            }
            _ = shutdown.recv() => {
                tracing::info!("Registry watch shutting down");
                break;
            }
        }

        match sync_once(source.as_ref(), &handle).await {
            Ok(report) if report.is_clean() => {
                tracing::debug!(pass_id = %report.id, "Pass converged");
            }
            Ok(report) => {
                tracing::warn!(
                    pass_id = %report.id,
                    failures = report.failures.len(),
                    "Pass finished with failures; retrying next tick"
                );
            }
            Err(SyncError::Registry(e)) => {
                tracing::error!(source = %source.describe(), error = %e, "Registry fetch failed; keeping current state");
            }
            Err(SyncError::Reconciler(e)) => {
                tracing::error!(error = %e, "Reconciler unavailable; stopping watch");
                break;
            }
        }
    }
}
