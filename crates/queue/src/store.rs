//! In-memory result storage.

use std::collections::HashMap;
use std::sync::RwLock;

use taskwell_core::TaskId;

use crate::result::TaskResult;

/// In-memory store of terminal task results, keyed by task id.
///
/// Results accumulate until [`ResultStore::clear`] is called; there is no
/// TTL or size bound. A missing entry does not distinguish "still
/// pending/running" from "never submitted" or "cleared" — callers that
/// need the difference track their submitted ids themselves.
#[derive(Debug, Default)]
pub struct ResultStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    results: HashMap<TaskId, TaskResult>,
    /// Completion order, for `all()`.
    order: Vec<TaskId>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, result: TaskResult) {
        let id = result.task_id;
        let mut inner = self.inner.write().unwrap();
        if inner.results.insert(id, result).is_none() {
            inner.order.push(id);
        }
    }

    /// Look up the result for a task, if it is terminal.
    pub fn get(&self, task_id: TaskId) -> Option<TaskResult> {
        self.inner.read().unwrap().results.get(&task_id).cloned()
    }

    /// All stored results, in completion order (which can differ from
    /// submission order).
    pub fn all(&self) -> Vec<TaskResult> {
        let inner = self.inner.read().unwrap();
        inner
            .order
            .iter()
            .filter_map(|id| inner.results.get(id).cloned())
            .collect()
    }

    /// Remove all stored results. Pending and running tasks are not
    /// affected; their results will land here once terminal.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.results.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().results.is_empty()
    }
}
