//! Recording fake proxy for unit tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::proxy::controller::{ProcessController, ProcessFailure};

/// Artifact directory contents (file name → text) seen by one validate call.
pub type DirView = BTreeMap<String, String>;

/// Records every reload and what the artifact directory held at that moment.
#[derive(Default)]
pub struct RecordingController {
    dir: Option<PathBuf>,
    fail_validations: AtomicUsize,
    fail_applies: AtomicUsize,
    views: Mutex<Vec<DirView>>,
    applies: AtomicUsize,
}

impl RecordingController {
    pub fn watching(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Fail the next `n` validate calls.
    pub fn fail_validations(&self, n: usize) {
        self.fail_validations.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` apply calls.
    pub fn fail_applies(&self, n: usize) {
        self.fail_applies.store(n, Ordering::SeqCst);
    }

    pub fn reloads(&self) -> usize {
        self.views.lock().unwrap().len()
    }

    pub fn applies(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }

    pub fn views(&self) -> Vec<DirView> {
        self.views.lock().unwrap().clone()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn failure(program: &str) -> ProcessFailure {
        ProcessFailure::Spawn {
            program: program.to_string(),
            source: std::io::Error::other("injected failure"),
        }
    }
}

#[async_trait]
impl ProcessController for RecordingController {
    async fn validate(&self) -> Result<(), ProcessFailure> {
        let mut view = DirView::new();
        if let Some(dir) = &self.dir {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let name = entry.file_name().to_string_lossy().to_string();
                    let text = std::fs::read_to_string(entry.path()).unwrap_or_default();
                    view.insert(name, text);
                }
            }
        }
        self.views.lock().unwrap().push(view);

        if Self::take_failure(&self.fail_validations) {
            return Err(Self::failure("validate"));
        }
        Ok(())
    }

    async fn apply(&self) -> Result<(), ProcessFailure> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_applies) {
            return Err(Self::failure("apply"));
        }
        Ok(())
    }
}
