//! Terminal task outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use taskwell_core::TaskId;

/// Why a task finished without success.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFailure {
    /// No handler registered for the task's kind. Retrying cannot
    /// succeed, so the task fails on its first attempt.
    #[error("unknown task kind: {kind}")]
    UnknownKind { kind: String },

    /// The retry budget was spent; carries the last handler error.
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Outcome of a finished task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The handler completed; `data` is its return value.
    Succeeded { data: Value },
    /// The task is terminally failed.
    Failed { error: TaskFailure },
}

/// Terminal outcome of a task.
///
/// References the task by id only; the task record itself is discarded
/// once a result exists. Stored until the caller clears the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub outcome: TaskOutcome,
    /// Time the result was finalized.
    pub finished_at: DateTime<Utc>,
}

impl TaskResult {
    pub(crate) fn succeeded(task_id: TaskId, data: Value) -> Self {
        Self {
            task_id,
            outcome: TaskOutcome::Succeeded { data },
            finished_at: Utc::now(),
        }
    }

    pub(crate) fn failed(task_id: TaskId, error: TaskFailure) -> Self {
        Self {
            task_id,
            outcome: TaskOutcome::Failed { error },
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Succeeded { .. })
    }

    /// The handler's return value, present iff the task succeeded.
    pub fn data(&self) -> Option<&Value> {
        match &self.outcome {
            TaskOutcome::Succeeded { data } => Some(data),
            TaskOutcome::Failed { .. } => None,
        }
    }

    /// The failure, present iff the task failed.
    pub fn error(&self) -> Option<&TaskFailure> {
        match &self.outcome {
            TaskOutcome::Succeeded { .. } => None,
            TaskOutcome::Failed { error } => Some(error),
        }
    }
}
