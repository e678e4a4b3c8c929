//! Completer registry
//!
//! Maps each connection target to its shared completion index. Readers get
//! an `Arc` snapshot; a refresh publishes a new index by replacing the `Arc`
//! under the lock, so nobody ever observes a half-built index.

use super::CompletionIndex;
use crate::config::ConnectionTarget;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct CompleterRegistry {
    entries: Mutex<HashMap<ConnectionTarget, Arc<CompletionIndex>>>,
}

impl CompleterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a keywords-only placeholder if the target has no index yet.
    ///
    /// Returns true when the placeholder was created by this call.
    pub fn ensure_placeholder(&self, target: &ConnectionTarget) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(target) {
            return false;
        }
        entries.insert(target.clone(), Arc::new(CompletionIndex::placeholder()));
        tracing::debug!(db = %target, "completion placeholder installed");
        true
    }

    /// Publish a freshly built index, recreating the entry if it was forgotten
    pub fn swap(&self, target: &ConnectionTarget, index: CompletionIndex) {
        self.entries.lock().insert(target.clone(), Arc::new(index));
    }

    pub fn get(&self, target: &ConnectionTarget) -> Option<Arc<CompletionIndex>> {
        self.entries.lock().get(target).cloned()
    }

    /// Update only the search path of an existing index.
    ///
    /// Readers holding the previous snapshot keep it unchanged.
    pub fn set_search_path(&self, target: &ConnectionTarget, path: Vec<String>) {
        let mut entries = self.entries.lock();
        if let Some(index) = entries.get_mut(target) {
            Arc::make_mut(index).set_search_path(path);
        }
    }

    pub fn forget(&self, target: &ConnectionTarget) {
        self.entries.lock().remove(target);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn shutdown(&self) {
        self.entries.lock().clear();
    }
}
