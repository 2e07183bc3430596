//! The reconciliation engine.
//!
//! # Responsibilities
//! - Own the cache of configured services
//! - Turn each full snapshot into add/replace/remove operations
//! - Keep going when a single service fails
//!
//! # Pass Order
//! ```text
//! 1. selected = snapshot entries accepted by the selector
//! 2. for each selected service, in snapshot order:
//!        endpoint changed? → remove old artifact (per replace strategy)
//!        cache ← new record; write artifact (+ reload)
//! 3. for each cached name not selected: remove artifact (+ reload), drop it
//! 4. batched mode only: one reload if anything changed on disk
//! ```
//!
//! # Design Decisions
//! - Every selected service is rewritten every pass, changed or not
//! - The cache entry is replaced before the write, so it is kept even when
//!   the write fails; the next pass retries
//! - Disappeared services leave the cache even if their removal failed

use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::Instrument;

use crate::config::{ReconcileConfig, ReloadMode, ReplaceStrategy};
use crate::observability::metrics;
use crate::reconcile::report::{Action, PassReport};
use crate::reconcile::selector::Selector;
use crate::registry::{RawService, ServiceRecord};
use crate::store::{ArtifactError, ArtifactStore};

/// Applies store mutations for one pass, honoring the reload mode.
struct PassWriter<'a> {
    store: &'a ArtifactStore,
    batched: bool,
    dirty: bool,
    reloads: usize,
}

impl<'a> PassWriter<'a> {
    fn new(store: &'a ArtifactStore, mode: ReloadMode) -> Self {
        Self {
            store,
            batched: mode == ReloadMode::Batched,
            dirty: false,
            reloads: 0,
        }
    }

    fn count_reload(&mut self, result: &Result<(), ArtifactError>) {
        if matches!(result, Ok(()) | Err(ArtifactError::Reload(_))) {
            self.reloads += 1;
        }
    }

    async fn upsert(&mut self, record: &ServiceRecord) -> Result<(), ArtifactError> {
        if self.batched {
            self.store.write(record).await?;
            self.dirty = true;
            return Ok(());
        }
        let result = self.store.upsert(record).await;
        self.count_reload(&result);
        result
    }

    async fn remove(&mut self, name: &str) -> Result<(), ArtifactError> {
        if self.batched {
            self.store.delete(name).await?;
            self.dirty = true;
            return Ok(());
        }
        let result = self.store.remove(name).await;
        self.count_reload(&result);
        result
    }

    async fn finish(&mut self) -> Option<ArtifactError> {
        if !(self.batched && self.dirty) {
            return None;
        }
        self.reloads += 1;
        self.store.reload().await.err()
    }
}

/// Owns the cache and drives the artifact store from snapshots.
pub struct Reconciler {
    cache: HashMap<String, ServiceRecord>,
    store: ArtifactStore,
    selector: Box<dyn Selector>,
    options: ReconcileConfig,
    last_report: Option<PassReport>,
}

impl Reconciler {
    pub fn new(
        store: ArtifactStore,
        selector: impl Selector + 'static,
        options: ReconcileConfig,
    ) -> Self {
        Self {
            cache: HashMap::new(),
            store,
            selector: Box::new(selector),
            options,
            last_report: None,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn get(&self, name: &str) -> Option<&ServiceRecord> {
        self.cache.get(name)
    }

    /// Cached records sorted by name.
    pub fn services(&self) -> Vec<ServiceRecord> {
        let mut records: Vec<_> = self.cache.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    pub fn last_report(&self) -> Option<&PassReport> {
        self.last_report.as_ref()
    }

    /// Reconcile against a complete snapshot of the registry.
    ///
    /// Never fails as a whole: per-service errors are logged and collected
    /// in the returned report.
    pub async fn reconcile(&mut self, snapshot: Vec<RawService>) -> PassReport {
        let started = Instant::now();
        let mut report = PassReport::new();
        let span = tracing::info_span!("reconcile_pass", pass_id = %report.id);

        self.run_pass(snapshot, &mut report).instrument(span).await;

        report.duration_ms = started.elapsed().as_millis() as u64;
        metrics::record_pass(started.elapsed(), report.is_clean());
        metrics::record_cached_services(self.cache.len());

        self.last_report = Some(report.clone());
        report
    }

    async fn run_pass(&mut self, snapshot: Vec<RawService>, report: &mut PassReport) {
        let (selected, skipped): (Vec<_>, Vec<_>) = snapshot
            .into_iter()
            .partition(|service| self.selector.select(&service.labels));
        report.selected = selected.len();
        report.skipped = skipped.len();
        for service in &skipped {
            tracing::trace!(service = %service.name, "Not selected");
        }

        let mut writer = PassWriter::new(&self.store, self.options.reload_mode);

        for service in &selected {
            let name = &service.name;

            if let Some(existing) = self.cache.get(name) {
                if existing.endpoint_differs(service) {
                    tracing::info!(
                        service = %name,
                        old = %format!("{}:{}", existing.endpoint_address, existing.endpoint_port),
                        new = %format!("{}:{}", service.address, service.port),
                        "Service endpoint changed"
                    );
                    match self.options.replace_strategy {
                        ReplaceStrategy::RemoveThenAdd => match writer.remove(name).await {
                            Ok(()) => report.replaced.push(name.clone()),
                            Err(e) => {
                                tracing::warn!(service = %name, error = %e, "Failed to remove old proxy config");
                                report.fail(name, Action::Replace, &e);
                            }
                        },
                        ReplaceStrategy::Overwrite => report.replaced.push(name.clone()),
                    }
                }
            }

            let record = ServiceRecord::from_raw(service);
            tracing::debug!(
                service = %name,
                address = %record.endpoint_address,
                port = record.endpoint_port,
                protocol = %record.protocol,
                "Adding service"
            );
            self.cache.insert(name.clone(), record.clone());

            match writer.upsert(&record).await {
                Ok(()) => report.upserted.push(name.clone()),
                Err(e) => {
                    tracing::warn!(service = %name, error = %e, "Failed to add proxy config");
                    report.fail(name, Action::Upsert, &e);
                }
            }
        }

        let active: HashSet<&str> = selected.iter().map(|s| s.name.as_str()).collect();
        let mut stale: Vec<String> = self
            .cache
            .keys()
            .filter(|name| !active.contains(name.as_str()))
            .cloned()
            .collect();
        stale.sort();

        for name in stale {
            tracing::info!(service = %name, "Removing service");
            match writer.remove(&name).await {
                Ok(()) => report.removed.push(name.clone()),
                Err(e) => {
                    tracing::warn!(service = %name, error = %e, "Failed to remove proxy config");
                    report.fail(&name, Action::Remove, &e);
                }
            }
            self.cache.remove(&name);
        }

        if let Some(e) = writer.finish().await {
            tracing::warn!(error = %e, "Batched proxy reload failed");
            report.reload_error = Some(e.to_string());
        }
        report.reloads = writer.reloads;

        tracing::info!(
            selected = report.selected,
            skipped = report.skipped,
            upserted = report.upserted.len(),
            replaced = report.replaced.len(),
            removed = report.removed.len(),
            failures = report.failures.len(),
            reloads = report.reloads,
            "Reconciliation pass complete"
        );
    }
}
