//! Single-owner task around the [`Reconciler`].
//!
//! Passes never overlap: the registry watcher and the admin API both talk to
//! one task through a channel, and that task is the only code that touches
//! the cache or the artifact directory.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::reconcile::engine::Reconciler;
use crate::reconcile::report::PassReport;
use crate::registry::{RawService, ServiceRecord};

/// Commands accepted by the reconciler task.
pub enum ReconcileCommand {
    Reconcile(Vec<RawService>, oneshot::Sender<PassReport>),
    Services(oneshot::Sender<Vec<ServiceRecord>>),
    LastReport(oneshot::Sender<Option<PassReport>>),
    Shutdown,
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("reconciler task has stopped")]
    Closed,
}

impl<T> From<mpsc::error::SendError<T>> for ReconcilerError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        ReconcilerError::Closed
    }
}

impl From<oneshot::error::RecvError> for ReconcilerError {
    fn from(_: oneshot::error::RecvError) -> Self {
        ReconcilerError::Closed
    }
}

/// Cloneable handle to the reconciler task.
#[derive(Clone)]
pub struct ReconcilerHandle {
    tx: mpsc::Sender<ReconcileCommand>,
}

impl ReconcilerHandle {
    /// Move the reconciler into its own task.
    pub fn spawn(mut reconciler: Reconciler) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<ReconcileCommand>(32);

        let task = tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    ReconcileCommand::Reconcile(snapshot, reply) => {
                        let report = reconciler.reconcile(snapshot).await;
                        let _ = reply.send(report);
                    }
                    ReconcileCommand::Services(reply) => {
                        let _ = reply.send(reconciler.services());
                    }
                    ReconcileCommand::LastReport(reply) => {
                        let _ = reply.send(reconciler.last_report().cloned());
                    }
                    ReconcileCommand::Shutdown => {
                        tracing::info!("Reconciler shutting down");
                        break;
                    }
                }
            }
        });

        (Self { tx }, task)
    }

    /// Run one pass over a complete snapshot.
    pub async fn reconcile(&self, snapshot: Vec<RawService>) -> Result<PassReport, ReconcilerError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ReconcileCommand::Reconcile(snapshot, reply)).await?;
        Ok(rx.await?)
    }

    /// Currently configured services, sorted by name.
    pub async fn services(&self) -> Result<Vec<ServiceRecord>, ReconcilerError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ReconcileCommand::Services(reply)).await?;
        Ok(rx.await?)
    }

    pub async fn last_report(&self) -> Result<Option<PassReport>, ReconcilerError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ReconcileCommand::LastReport(reply)).await?;
        Ok(rx.await?)
    }

    /// Stop the task after any queued commands.
    pub async fn shutdown(&self) -> Result<(), ReconcilerError> {
        self.tx.send(ReconcileCommand::Shutdown).await?;
        Ok(())
    }
}
