//! Registers the core task handlers named in spec.md §4.5 onto a
//! `TaskRegistry` before the broker is constructed — mirroring
//! `original_source/worker_manager.py`'s `_register_core_tasks`, where each
//! Celery task is bound at `WorkerManager.__init__` time.
//!
//! `workflow.execute` and `system.cleanup_expired_data` are wired to real
//! engine/state operations; the forms/integration/notifications handlers
//! are out of scope for this crate (their node types and external
//! collaborators live outside the engine) and simply echo their args back
//! as a successful no-op, so the queue's dispatch/retry machinery has a
//! real handler to exercise end to end.

use std::sync::Arc;

use engine::Engine;
use queue::{TaskOutcome, TaskRegistry};
use serde_json::Value;
use state::StateStore;

const NOOP_TASK_NAMES: [&str; 3] = [
    "forms.process_submission",
    "integration.sync_data",
    "notifications.send",
];

pub fn register_core_tasks(registry: &TaskRegistry, engine: Engine, state: Arc<StateStore>) {
    registry.register(
        "workflow.execute",
        Arc::new(move |args: Value, _kwargs: Value| {
            let engine = engine.clone();
            Box::pin(async move { run_workflow_execute(engine, args).await })
        }),
    );

    for name in NOOP_TASK_NAMES {
        registry.register(
            name,
            Arc::new(|args: Value, _kwargs: Value| Box::pin(async move { TaskOutcome::Success(args) })),
        );
    }

    registry.register(
        "system.cleanup_expired_data",
        Arc::new(move |args: Value, _kwargs: Value| {
            let state = Arc::clone(&state);
            Box::pin(async move { run_cleanup_expired_data(state, args).await })
        }),
    );
}

async fn run_workflow_execute(engine: Engine, args: Value) -> TaskOutcome {
    let Some(workflow_id) = args.get("workflow_id").and_then(Value::as_str).and_then(|s| s.parse().ok()) else {
        return TaskOutcome::Permanent("workflow.execute requires a workflow_id".to_string());
    };
    let trigger_data = args.get("trigger_data").cloned().unwrap_or_else(|| serde_json::json!({}));
    let started_by = args.get("started_by").and_then(Value::as_str).map(str::to_string);
    let priority = args.get("priority").and_then(Value::as_u64).map(|p| p as u8).unwrap_or(5);

    match engine.execute_workflow(workflow_id, trigger_data, started_by, priority, None).await {
        Ok(run) => TaskOutcome::Success(serde_json::json!({"run_id": run.id})),
        Err(e) => TaskOutcome::Permanent(e.to_string()),
    }
}

async fn run_cleanup_expired_data(state: Arc<StateStore>, args: Value) -> TaskOutcome {
    let max_age_days = args.get("max_age_days").and_then(Value::as_i64).unwrap_or(30);

    match state.cleanup_expired(max_age_days).await {
        Ok(removed) => TaskOutcome::Success(serde_json::json!({"removed": removed})),
        Err(e) => TaskOutcome::Permanent(e.to_string()),
    }
}
