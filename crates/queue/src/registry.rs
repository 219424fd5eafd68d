//! Task name → handler registry.
//!
//! Grounded on `original_source/worker_manager.py`'s `_register_core_tasks`:
//! each Celery task becomes a boxed async closure keyed by its `{domain}.
//! {verb}` name. The five core names (`workflow.execute`,
//! `forms.process_submission`, `integration.sync_data`,
//! `notifications.send`, `system.cleanup_expired_data`) are pre-registered
//! by whoever constructs the broker (see the `cli` crate's wiring); this
//! module only defines the registration surface.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use serde_json::Value;

/// A task's outcome: success carries its JSON result, failure carries a
/// human-readable message plus whether it should be retried.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Success(Value),
    Transient(String),
    Permanent(String),
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A registered task handler: takes `(args, kwargs)`, returns an outcome.
pub type TaskHandler = Arc<dyn Fn(Value, Value) -> BoxFuture<'static, TaskOutcome> + Send + Sync>;

/// Read-mostly map from task name to handler, mirroring the
/// `NodeRegistry`/validator known-type split: registration happens at
/// startup, lookups happen on every dequeue.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<RwLock<HashMap<String, TaskHandler>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, handler: TaskHandler) {
        let mut guard = self.inner.write().expect("task registry lock poisoned");
        guard.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<TaskHandler> {
        let guard = self.inner.read().expect("task registry lock poisoned");
        guard.get(name).cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        let guard = self.inner.read().expect("task registry lock poisoned");
        guard.contains_key(name)
    }
}
