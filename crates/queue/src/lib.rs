//! Bounded-concurrency task processing with priority admission, retry
//! with exponential backoff, and pull-based results.
//!
//! ## Design
//!
//! - Tasks are typed by an open string `kind` and routed to registered handlers
//! - Pending work is admitted priority-first, FIFO within a priority tier
//! - At most `concurrency_limit` handlers have in-flight work at once
//! - Failed attempts are re-queued with exponential backoff until the
//!   per-task retry budget is spent
//! - Terminal outcomes land in an in-memory result store keyed by task id;
//!   completion events let callers wait without polling
//!
//! ## Components
//!
//! - `TaskSpec`: what to run (kind, payload, priority, retry budget)
//! - `TaskHandler`: the work itself, registered per kind
//! - `Scheduler`: admission, concurrency ceiling, retry re-submission
//! - `ResultStore`: terminal outcomes, queryable by task id

pub mod handler;
pub mod result;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod task;

pub use handler::{handler_fn, HandlerRegistry, TaskHandler};
pub use result::{TaskFailure, TaskOutcome, TaskResult};
pub use retry::RetryPolicy;
pub use scheduler::{
    ConfigError, Scheduler, SchedulerBuilder, SchedulerCounters, SchedulerStatus,
};
pub use store::ResultStore;
pub use task::{Task, TaskSpec, DEFAULT_MAX_RETRIES};
