//! Handler dispatch: routing a task's kind to the code that runs it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

/// A unit of work, registered under a task kind.
///
/// Handlers must be safe to retry: the scheduler re-invokes them after a
/// failed attempt and makes no attempt to detect duplicate side effects.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Run the work for one task. The returned value becomes the
    /// result's `data` on success; any error is routed to the retry
    /// policy.
    async fn run(&self, payload: &Value) -> anyhow::Result<Value>;
}

type BoxedRunFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F> TaskHandler for FnHandler<F>
where
    F: Fn(Value) -> BoxedRunFuture + Send + Sync,
{
    async fn run(&self, payload: &Value) -> anyhow::Result<Value> {
        (self.f)(payload.clone()).await
    }
}

/// Wrap an async closure as a [`TaskHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn TaskHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler {
        f: move |payload| Box::pin(f(payload)) as BoxedRunFuture,
    })
}

/// Registry mapping task kinds to handlers.
///
/// Kinds are an open set: registration may happen at any time, including
/// after the scheduler has started admitting work. A task whose kind has
/// no registration at execution time fails without retry.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any previous registration.
    pub fn register(&self, kind: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.handlers.write().unwrap().insert(kind.into(), handler);
    }

    pub fn lookup(&self, kind: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.read().unwrap().get(kind).cloned()
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.handlers.read().unwrap().contains_key(kind)
    }
}

impl core::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kinds: Vec<String> = self.handlers.read().unwrap().keys().cloned().collect();
        f.debug_struct("HandlerRegistry").field("kinds", &kinds).finish()
    }
}
