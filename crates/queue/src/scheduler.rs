//! Scheduler: admission, concurrency ceiling, and retry re-submission.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use taskwell_core::TaskId;

use crate::handler::{HandlerRegistry, TaskHandler};
use crate::result::{TaskFailure, TaskResult};
use crate::retry::RetryPolicy;
use crate::store::ResultStore;
use crate::task::{Task, TaskSpec};

/// Concurrency ceiling applied when the builder does not specify one.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 4;

/// Capacity of the completion-event channel. Waiters re-check the result
/// store on lag, so overflow is harmless.
const COMPLETION_CHANNEL_CAPACITY: usize = 256;

/// Construction-time configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("concurrency limit must be positive")]
    ZeroConcurrencyLimit,
    #[error("backoff base delay must be positive")]
    ZeroBaseDelay,
}

/// Configures and builds a [`Scheduler`].
pub struct SchedulerBuilder {
    name: String,
    concurrency_limit: usize,
    retry: RetryPolicy,
    handlers: Vec<(String, Arc<dyn TaskHandler>)>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self {
            name: "taskwell".to_string(),
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            retry: RetryPolicy::default(),
            handlers: Vec::new(),
        }
    }
}

impl SchedulerBuilder {
    /// Name used in log fields, to tell schedulers apart.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Maximum number of handlers with in-flight work (default 4). Bounds
    /// running tasks only; the pending queue is unbounded.
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Base unit of the exponential backoff (default 1000 ms).
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.retry.base_delay = delay;
        self
    }

    /// Upper bound on any single backoff delay (default 60 s).
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.retry.max_delay = delay;
        self
    }

    /// Register a handler at construction time. Handlers can also be
    /// added later via [`Scheduler::register`].
    pub fn handler(mut self, kind: impl Into<String>, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.push((kind.into(), handler));
        self
    }

    pub fn build(self) -> Result<Scheduler, ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::ZeroConcurrencyLimit);
        }
        if self.retry.base_delay.is_zero() {
            return Err(ConfigError::ZeroBaseDelay);
        }
        Ok(Scheduler::from_builder(self))
    }
}

/// Point-in-time snapshot of scheduler occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub concurrency_limit: usize,
}

/// Cumulative counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerCounters {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Re-queues after failed attempts (not counting first attempts).
    pub retries: u64,
}

/// Heap entry: priority first, then submission sequence (FIFO within a
/// priority tier).
struct PendingEntry {
    seq: u64,
    task: Task,
}

impl PartialEq for PendingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.task.priority() == other.task.priority() && self.seq == other.seq
    }
}

impl Eq for PendingEntry {}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.task.priority().cmp(&other.task.priority()) {
            // Lower sequence first within a tier.
            Ordering::Equal => other.seq.cmp(&self.seq),
            ordering => ordering,
        }
    }
}

struct State {
    pending: BinaryHeap<PendingEntry>,
    running: usize,
    next_seq: u64,
    counters: SchedulerCounters,
}

struct Inner {
    name: String,
    concurrency_limit: usize,
    retry: RetryPolicy,
    registry: HandlerRegistry,
    store: ResultStore,
    state: Mutex<State>,
    completions: broadcast::Sender<TaskId>,
}

/// Bounded-concurrency task scheduler.
///
/// Accepts heterogeneous units of work, runs at most `concurrency_limit`
/// concurrently, admits pending work priority-first (FIFO within a
/// tier), and retries failed attempts with exponential backoff until the
/// per-task budget is spent. Terminal outcomes land in the result store
/// and are announced on the completion channel.
///
/// Cheap to clone; clones share the same queue, store, and counters.
/// Separate instances have fully independent state — there is no global
/// scheduler.
///
/// `submit` and `status` never suspend, but admission and execution run
/// on spawned tasks, so the scheduler must be used inside a tokio
/// runtime. A retried task re-enters the *back* of its priority tier
/// when its backoff elapses. Cancellation is not supported: once
/// submitted, a task runs to a terminal result.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::default()
    }

    /// A scheduler with default configuration and no handlers.
    pub fn new() -> Self {
        Self::from_builder(SchedulerBuilder::default())
    }

    fn from_builder(builder: SchedulerBuilder) -> Self {
        let (completions, _) = broadcast::channel(COMPLETION_CHANNEL_CAPACITY);
        let registry = HandlerRegistry::new();
        for (kind, handler) in builder.handlers {
            registry.register(kind, handler);
        }

        debug!(
            scheduler = %builder.name,
            concurrency_limit = builder.concurrency_limit,
            base_delay_ms = builder.retry.base_delay.as_millis() as u64,
            "scheduler created"
        );

        Self {
            inner: Arc::new(Inner {
                name: builder.name,
                concurrency_limit: builder.concurrency_limit,
                retry: builder.retry,
                registry,
                store: ResultStore::new(),
                state: Mutex::new(State {
                    pending: BinaryHeap::new(),
                    running: 0,
                    next_seq: 0,
                    counters: SchedulerCounters::default(),
                }),
                completions,
            }),
        }
    }

    /// Register a handler for a task kind, replacing any previous one.
    pub fn register(&self, kind: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.inner.registry.register(kind, handler);
    }

    /// Submit a task for execution and return its id immediately.
    ///
    /// Never blocks; admission and execution happen asynchronously. Poll
    /// [`result`](Self::result) or await [`join`](Self::join) for the
    /// outcome.
    pub fn submit(&self, spec: TaskSpec) -> TaskId {
        let task = Task::new(spec);
        let id = task.id;

        debug!(
            scheduler = %self.inner.name,
            task_id = %id,
            kind = %task.kind(),
            priority = %task.priority(),
            "task submitted"
        );

        {
            let mut state = self.inner.state.lock().unwrap();
            state.counters.submitted += 1;
            let seq = state.next_seq;
            state.next_seq += 1;
            state.pending.push(PendingEntry { seq, task });
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { pump(&inner) });

        id
    }

    /// Point-in-time occupancy snapshot.
    pub fn status(&self) -> SchedulerStatus {
        let state = self.inner.state.lock().unwrap();
        SchedulerStatus {
            pending: state.pending.len(),
            running: state.running,
            completed: self.inner.store.len(),
            concurrency_limit: self.inner.concurrency_limit,
        }
    }

    /// Cumulative counters since construction.
    pub fn counters(&self) -> SchedulerCounters {
        self.inner.state.lock().unwrap().counters
    }

    /// The terminal result for a task, if it has finished.
    pub fn result(&self, task_id: TaskId) -> Option<TaskResult> {
        self.inner.store.get(task_id)
    }

    /// All terminal results, in completion order.
    pub fn results(&self) -> Vec<TaskResult> {
        self.inner.store.all()
    }

    /// Drop all stored results. Pending and running tasks are not
    /// affected.
    pub fn clear_results(&self) {
        self.inner.store.clear();
    }

    /// Subscribe to completion events: the id of every task that reaches
    /// a terminal result is broadcast exactly once.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskId> {
        self.inner.completions.subscribe()
    }

    /// Wait until `task_id` is terminal and return its result. Resolves
    /// immediately if the task already finished.
    ///
    /// An id that was never submitted (or whose result was cleared while
    /// waiting) never resolves; the store cannot tell those apart from
    /// "not yet done".
    pub async fn join(&self, task_id: TaskId) -> TaskResult {
        let mut events = self.inner.completions.subscribe();
        loop {
            if let Some(result) = self.inner.store.get(task_id) {
                return result;
            }
            match events.recv().await {
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    // The scheduler owns the sender, so the channel cannot
                    // close while a handle exists; park rather than spin.
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Admit pending tasks until the ceiling is reached or the queue is
/// empty, filling multiple free slots in one pass.
fn pump(inner: &Arc<Inner>) {
    loop {
        let task = {
            let mut state = inner.state.lock().unwrap();
            if state.running >= inner.concurrency_limit {
                return;
            }
            let Some(entry) = state.pending.pop() else {
                return;
            };
            state.running += 1;
            entry.task
        };

        debug!(
            scheduler = %inner.name,
            task_id = %task.id,
            kind = %task.kind(),
            priority = %task.priority(),
            "task admitted"
        );

        let inner = Arc::clone(inner);
        tokio::spawn(async move { run_task(inner, task).await });
    }
}

/// One execution attempt.
enum Attempt {
    Success(serde_json::Value),
    HandlerError(String),
    UnknownKind,
}

async fn execute(inner: &Inner, task: &Task) -> Attempt {
    let Some(handler) = inner.registry.lookup(task.kind()) else {
        return Attempt::UnknownKind;
    };

    // Run the handler in its own task so a panic is contained and
    // surfaces as an ordinary failed attempt.
    let payload = task.spec.payload.clone();
    let join = tokio::spawn(async move { handler.run(&payload).await });

    match join.await {
        Ok(Ok(data)) => Attempt::Success(data),
        Ok(Err(error)) => Attempt::HandlerError(format!("{error:#}")),
        Err(join_error) => Attempt::HandlerError(format!("handler panicked: {join_error}")),
    }
}

async fn run_task(inner: Arc<Inner>, mut task: Task) {
    let attempt = execute(&inner, &task).await;

    // The slot frees regardless of the outcome; a task waiting out its
    // backoff occupies no running slot.
    {
        let mut state = inner.state.lock().unwrap();
        state.running -= 1;
    }

    match attempt {
        Attempt::Success(data) => {
            debug!(scheduler = %inner.name, task_id = %task.id, "task completed");
            finalize(&inner, TaskResult::succeeded(task.id, data));
        }
        Attempt::UnknownKind => {
            warn!(
                scheduler = %inner.name,
                task_id = %task.id,
                kind = %task.kind(),
                "no handler registered for task kind"
            );
            finalize(
                &inner,
                TaskResult::failed(
                    task.id,
                    TaskFailure::UnknownKind {
                        kind: task.kind().to_string(),
                    },
                ),
            );
        }
        Attempt::HandlerError(error) => {
            if task.has_retry_budget() {
                task.retry_count += 1;
                let delay = inner.retry.delay_for(task.retry_count);

                {
                    let mut state = inner.state.lock().unwrap();
                    state.counters.retries += 1;
                }

                debug!(
                    scheduler = %inner.name,
                    task_id = %task.id,
                    kind = %task.kind(),
                    error = %error,
                    retry_count = task.retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "task failed, retry scheduled"
                );

                let inner = Arc::clone(&inner);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    requeue(&inner, task);
                });
            } else {
                let attempts = task.retry_count + 1;
                warn!(
                    scheduler = %inner.name,
                    task_id = %task.id,
                    kind = %task.kind(),
                    error = %error,
                    attempts,
                    "task failed permanently, retries exhausted"
                );
                finalize(
                    &inner,
                    TaskResult::failed(
                        task.id,
                        TaskFailure::RetriesExhausted {
                            attempts,
                            last_error: error,
                        },
                    ),
                );
            }
        }
    }

    pump(&inner);
}

/// Re-enter a retried task at the back of its priority tier.
fn requeue(inner: &Arc<Inner>, task: Task) {
    debug!(
        scheduler = %inner.name,
        task_id = %task.id,
        retry_count = task.retry_count,
        "task re-queued after backoff"
    );

    {
        let mut state = inner.state.lock().unwrap();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push(PendingEntry { seq, task });
    }

    pump(inner);
}

/// Record a terminal result and announce the completion. The store write
/// happens before the event so a waiter woken by it always finds the
/// result.
fn finalize(inner: &Inner, result: TaskResult) {
    let task_id = result.task_id;

    {
        let mut state = inner.state.lock().unwrap();
        if result.is_success() {
            state.counters.succeeded += 1;
        } else {
            state.counters.failed += 1;
        }
    }

    inner.store.insert(result);
    let _ = inner.completions.send(task_id);
}
