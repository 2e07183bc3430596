//! Outcome of one reconciliation pass.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

/// What was being attempted when a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Write (and reload) a selected service.
    Upsert,
    /// Remove the old artifact of a service whose endpoint changed.
    Replace,
    /// Remove a service that left the snapshot or the selection.
    Remove,
}

/// One per-service failure inside a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFailure {
    pub service: String,
    pub action: Action,
    pub error: String,
}

/// Everything a pass did, for logs and the admin API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub id: Uuid,
    /// Snapshot entries that passed selection.
    pub selected: usize,
    /// Snapshot entries that did not.
    pub skipped: usize,
    /// Services written successfully (unchanged ones included).
    pub upserted: Vec<String>,
    /// Services whose old artifact was removed because the endpoint changed.
    pub replaced: Vec<String>,
    /// Services removed because they are no longer selected.
    pub removed: Vec<String>,
    pub failures: Vec<ServiceFailure>,
    /// Reload protocol invocations during the pass.
    pub reloads: usize,
    /// End-of-pass reload failure (batched mode only).
    pub reload_error: Option<String>,
    pub duration_ms: u64,
}

impl PassReport {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            ..Self::default()
        }
    }

    /// No per-service failures and no failed batch reload.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.reload_error.is_none()
    }

    pub(crate) fn fail(&mut self, service: &str, action: Action, error: &impl Display) {
        self.failures.push(ServiceFailure {
            service: service.to_string(),
            action,
            error: error.to_string(),
        });
    }

    /// Failures recorded for one service.
    pub fn failures_for<'a>(&'a self, service: &'a str) -> impl Iterator<Item = &'a ServiceFailure> {
        self.failures.iter().filter(move |f| f.service == service)
    }
}
