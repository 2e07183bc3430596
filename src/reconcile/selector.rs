//! Selection predicates over service labels.

use crate::registry::Labels;

/// Decides whether a registry service gets a routing artifact.
pub trait Selector: Send + Sync {
    fn select(&self, labels: &Labels) -> bool;
}

impl<F> Selector for F
where
    F: Fn(&Labels) -> bool + Send + Sync,
{
    fn select(&self, labels: &Labels) -> bool {
        self(labels)
    }
}

/// Selects services that carry a label key, whatever its value.
#[derive(Debug, Clone)]
pub struct LabelPresent {
    key: String,
}

impl LabelPresent {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Selector for LabelPresent {
    fn select(&self, labels: &Labels) -> bool {
        labels.contains_key(&self.key)
    }
}
