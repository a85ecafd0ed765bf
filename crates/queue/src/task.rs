//! Core task records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use taskwell_core::{Priority, TaskId};

/// Retry budget applied when a submission does not specify one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A task submission: what to run and how to schedule it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Open string tag used to route the task to a registered handler.
    pub kind: String,
    /// Opaque value, interpreted only by the handler matching `kind`.
    pub payload: Value,
    /// Queue-ordering priority; never changes after submission.
    pub priority: Priority,
    /// Maximum number of re-queues after a failed attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl TaskSpec {
    pub fn new(kind: impl Into<String>, payload: Value, priority: Priority) -> Self {
        Self {
            kind: kind.into(),
            payload,
            priority,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Override the retry budget (0 = a single attempt, no retries).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// A task owned by the scheduler while pending or running.
///
/// Discarded once terminal; only its [`TaskResult`](crate::TaskResult)
/// outlives it, indexed by `id`.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique id, assigned at submission.
    pub id: TaskId,
    /// The submission this task was created from.
    pub spec: TaskSpec,
    /// Re-queues so far. Always `<= spec.max_retries`.
    pub retry_count: u32,
    /// When the task was submitted.
    pub submitted_at: DateTime<Utc>,
}

impl Task {
    pub(crate) fn new(spec: TaskSpec) -> Self {
        Self {
            id: TaskId::new(),
            spec,
            retry_count: 0,
            submitted_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.spec.kind
    }

    pub fn priority(&self) -> Priority {
        self.spec.priority
    }

    /// True if a failed attempt may still be re-queued.
    pub fn has_retry_budget(&self) -> bool {
        self.retry_count < self.spec.max_retries
    }
}
