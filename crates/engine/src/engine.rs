//! Workflow execution engine (C4).
//!
//! `Engine` is the central orchestrator: `CreateWorkflow`/`UpdateWorkflow`
//! validate-then-persist definitions; `ExecuteWorkflow` creates a `PENDING`
//! run and schedules it on a spawned task; `GetWorkflowStatus` composes a
//! read-only snapshot; `StopWorkflow` cooperatively cancels an in-flight run.
//! Grounded on `original_source/workflow_engine.py`'s `WorkflowEngine` —
//! same method set, same "execute returns immediately, the run proceeds on
//! a background task" shape (there: `asyncio.create_task`; here:
//! `tokio::spawn`).

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use db::DbPool;
use nodes::traits::ExecutionContext;
use nodes::{NodeError, NodeRegistry};
use state::StateStore;

use crate::models::{
    Edge, NodeDefinition, NodeExecution, RunError, RunProgress, Workflow, WorkflowDefinition,
    WorkflowRun, WorkflowStatus,
};
use crate::{conditional, dag, validator};
use crate::EngineError;

/// A patch applied by `UpdateWorkflow`. `None` fields are left unchanged.
#[derive(Debug, Default, Clone)]
pub struct WorkflowPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub definition: Option<WorkflowDefinition>,
    pub status: Option<WorkflowStatus>,
}

/// A read-only composite view returned by `GetWorkflowStatus`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunStatusView {
    pub run: WorkflowRun,
    pub progress: RunProgress,
    /// Populated only when the caller asked for `include_nodes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_executions: Option<Vec<NodeExecution>>,
}

/// Tracks an in-flight run on this process — the source of truth for "is
/// this run in-flight on this instance" (spec.md §4.4's resource lifecycle
/// note).
struct ExecutionHandle {
    cancel: Arc<AtomicBool>,
    notify: Arc<Notify>,
    deadline: Option<Instant>,
}

/// Outcome of resolving one node while walking the schedule.
#[derive(Debug, Clone)]
enum NodeOutcome {
    Completed(Value),
    Skipped,
}

/// The workflow execution engine.
///
/// Cheap to clone: every field is itself `Clone` over an `Arc` (or is a
/// `sqlx::Pool`, cheap to clone by design), so a clone handed into a spawned
/// task shares the same pool, cache, registry and handle table as the
/// original.
#[derive(Clone)]
pub struct Engine {
    pool: DbPool,
    state: Arc<StateStore>,
    nodes: NodeRegistry,
    handles: Arc<std::sync::RwLock<HashMap<Uuid, ExecutionHandle>>>,
}

impl Engine {
    pub fn new(pool: DbPool, state: Arc<StateStore>, nodes: NodeRegistry) -> Self {
        Self {
            pool,
            state,
            nodes,
            handles: Arc::new(std::sync::RwLock::new(HashMap::new())),
        }
    }

    fn known_types(&self) -> std::collections::HashSet<String> {
        let mut types = validator::core_known_types();
        types.extend(self.nodes.known_types());
        types
    }

    // -----------------------------------------------------------------
    // CreateWorkflow / UpdateWorkflow
    // -----------------------------------------------------------------

    #[instrument(skip(self, definition))]
    pub async fn create_workflow(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        definition: WorkflowDefinition,
        created_by: Option<String>,
    ) -> Result<Workflow, EngineError> {
        let result = validator::validate(&definition, &self.known_types());
        if !result.valid {
            return Err(EngineError::ValidationFailed(result.errors));
        }

        let name = name.into();
        let id = Uuid::new_v4();
        let row = db::repository::workflows::create(
            &self.pool,
            id,
            &name,
            description.as_deref(),
            serde_json::to_value(&definition).map_err(|e| EngineError::Internal(e.to_string()))?,
            created_by.as_deref(),
        )
        .await?;

        row.try_into().map_err(EngineError::Internal)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_workflow(&self, id: Uuid, patch: WorkflowPatch) -> Result<Workflow, EngineError> {
        let row = db::repository::workflows::get_by_id(&self.pool, id)
            .await
            .map_err(|e| match e {
                db::DbError::NotFound => EngineError::NotFound(format!("workflow {id}")),
                other => EngineError::Database(other),
            })?;
        let current: Workflow = row.try_into().map_err(EngineError::Internal)?;

        let name = patch.name.unwrap_or(current.name);
        let description = patch.description.unwrap_or(current.description);
        let status = patch.status.unwrap_or(current.status);

        let (definition, bump_version) = match patch.definition {
            Some(def) => (def, true),
            None => (current.definition, false),
        };

        if bump_version {
            let result = validator::validate(&definition, &self.known_types());
            if !result.valid {
                return Err(EngineError::ValidationFailed(result.errors));
            }
        }

        let row = db::repository::workflows::update(
            &self.pool,
            id,
            &name,
            description.as_deref(),
            serde_json::to_value(&definition).map_err(|e| EngineError::Internal(e.to_string()))?,
            &status.to_string(),
            bump_version,
        )
        .await
        .map_err(|e| match e {
            db::DbError::NotFound => EngineError::NotFound(format!("workflow {id}")),
            other => EngineError::Database(other),
        })?;

        row.try_into().map_err(EngineError::Internal)
    }

    // -----------------------------------------------------------------
    // ExecuteWorkflow
    // -----------------------------------------------------------------

    /// Load `workflow_id`, require `ACTIVE`, create a `PENDING` run, and
    /// schedule its execution on a spawned task. Returns as soon as the run
    /// is persisted — it does not wait for any node to execute.
    #[instrument(skip(self, trigger_data))]
    pub async fn execute_workflow(
        &self,
        workflow_id: Uuid,
        trigger_data: Value,
        started_by: Option<String>,
        priority: u8,
        deadline: Option<Duration>,
    ) -> Result<WorkflowRun, EngineError> {
        let row = db::repository::workflows::get_by_id(&self.pool, workflow_id)
            .await
            .map_err(|e| match e {
                db::DbError::NotFound => EngineError::NotFound(format!("workflow {workflow_id}")),
                other => EngineError::Database(other),
            })?;
        let workflow: Workflow = row.try_into().map_err(EngineError::Internal)?;

        if workflow.status != WorkflowStatus::Active {
            return Err(EngineError::InvalidState(format!(
                "workflow {workflow_id} is {} — only ACTIVE workflows accept new runs",
                workflow.status
            )));
        }

        let run = WorkflowRun::with_priority(workflow_id, trigger_data.clone(), started_by, priority);
        let run_row = db::repository::workflow_runs::create(
            &self.pool,
            run.id,
            workflow_id,
            trigger_data.clone(),
            run.started_by.as_deref(),
            run.priority as i16,
        )
        .await?;
        let run: WorkflowRun = run_row.try_into().map_err(EngineError::Internal)?;

        self.state
            .init_workflow_state(run.id, HashMap::new(), trigger_data)
            .await?;

        let cancel = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        let deadline_at = deadline.map(|d| Instant::now() + d);

        self.handles.write().expect("handle map poisoned").insert(
            run.id,
            ExecutionHandle {
                cancel: Arc::clone(&cancel),
                notify: Arc::clone(&notify),
                deadline: deadline_at,
            },
        );

        let engine = self.clone();
        let spawned_workflow = workflow;
        let spawned_run_id = run.id;
        tokio::spawn(async move {
            engine
                .execute_run(spawned_workflow, spawned_run_id, cancel, notify, deadline_at)
                .await;
        });

        Ok(run)
    }

    // -----------------------------------------------------------------
    // GetWorkflowStatus
    // -----------------------------------------------------------------

    pub async fn get_workflow_status(
        &self,
        run_id: Uuid,
        include_nodes: bool,
    ) -> Result<RunStatusView, EngineError> {
        let run_row = db::repository::workflow_runs::get_by_id(&self.pool, run_id)
            .await
            .map_err(|e| match e {
                db::DbError::NotFound => EngineError::NotFound(format!("run {run_id}")),
                other => EngineError::Database(other),
            })?;
        let run: WorkflowRun = run_row.try_into().map_err(EngineError::Internal)?;

        let workflow_row = db::repository::workflows::get_by_id(&self.pool, run.workflow_id).await?;
        let total_nodes: WorkflowDefinition =
            serde_json::from_value(workflow_row.definition).map_err(|e| EngineError::Internal(e.to_string()))?;

        let rows = db::repository::node_executions::list_by_run(&self.pool, run_id).await?;
        let executions: Vec<NodeExecution> = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<_, String>>()
            .map_err(EngineError::Internal)?;

        let progress = RunProgress::from_executions(total_nodes.nodes.len(), &executions);

        Ok(RunStatusView {
            run,
            progress,
            node_executions: include_nodes.then_some(executions),
        })
    }

    // -----------------------------------------------------------------
    // StopWorkflow
    // -----------------------------------------------------------------

    /// Cooperatively cancel `run_id` if it is in-flight on this instance.
    /// Persists `CANCELLED` immediately; the scheduling loop notices the
    /// cancellation flag at its next node boundary and stops without
    /// re-persisting a terminal status.
    #[instrument(skip(self))]
    pub async fn stop_workflow(&self, run_id: Uuid) -> Result<bool, EngineError> {
        let handle = {
            let guard = self.handles.read().expect("handle map poisoned");
            match guard.get(&run_id) {
                Some(h) => (Arc::clone(&h.cancel), Arc::clone(&h.notify)),
                None => return Ok(false),
            }
        };
        let (cancel, notify) = handle;
        cancel.store(true, Ordering::SeqCst);
        notify.notify_waiters();

        let completed_at = Utc::now();
        let mut tx = db::pool::begin(&self.pool).await?;
        db::repository::workflow_runs::mark_terminal_tx(
            &mut tx,
            run_id,
            "CANCELLED",
            None,
            None,
            completed_at,
        )
        .await?;
        self.state.finalize_workflow_state(&mut tx, run_id, "cancelled").await?;
        tx.commit().await.map_err(db::DbError::from)?;

        info!(run_id = %run_id, "run cancelled");
        Ok(true)
    }

    // -----------------------------------------------------------------
    // Internal: scheduling loop
    // -----------------------------------------------------------------

    async fn execute_run(
        self,
        workflow: Workflow,
        run_id: Uuid,
        cancel: Arc<AtomicBool>,
        _notify: Arc<Notify>,
        deadline: Option<Instant>,
    ) {
        db::repository::workflow_runs::mark_running(&self.pool, run_id, Utc::now())
            .await
            .ok();
        if let Err(e) = self
            .state
            .update_workflow_state(run_id, |s| s.status = "running".to_string())
            .await
        {
            error!(run_id = %run_id, error = %e, "failed to mark state running");
        }

        let outcome = self.run_schedule(&workflow, run_id, &cancel, deadline).await;
        self.handles.write().expect("handle map poisoned").remove(&run_id);
        self.state.cleanup_run(run_id);

        match outcome {
            Ok(()) => info!(run_id = %run_id, "run completed"),
            Err(EngineError::Cancelled) => info!(run_id = %run_id, "run stopped mid-schedule"),
            Err(e) => warn!(run_id = %run_id, error = %e, "run failed"),
        }
    }

    #[instrument(skip(self, workflow, cancel), fields(workflow_id = %workflow.id, run_id = %run_id))]
    async fn run_schedule(
        &self,
        workflow: &Workflow,
        run_id: Uuid,
        cancel: &Arc<AtomicBool>,
        deadline: Option<Instant>,
    ) -> Result<(), EngineError> {
        let definition = &workflow.definition;

        // Re-check acyclicity cheaply — a workflow can be ACTIVE at an
        // older, already-validated version.
        if dag::has_cycle(&definition.nodes, &definition.edges) {
            return self
                .fail_run(run_id, "InconsistentGraph", "workflow graph contains a cycle", None)
                .await;
        }

        let index_of: HashMap<&str, usize> = definition
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); definition.nodes.len()];
        let mut in_degree: Vec<usize> = vec![0; definition.nodes.len()];
        let mut incoming: Vec<Vec<&Edge>> = vec![Vec::new(); definition.nodes.len()];

        for edge in &definition.edges {
            let from = index_of[edge.from.as_str()];
            let to = index_of[edge.to.as_str()];
            adjacency[from].push(to);
            in_degree[to] += 1;
            incoming[to].push(edge);
        }

        let mut ready: BTreeSet<usize> = (0..definition.nodes.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut resolved: HashMap<usize, NodeOutcome> = HashMap::new();
        let mut execution_order: i32 = 0;

        while let Some(&idx) = ready.iter().next() {
            ready.remove(&idx);

            if cancel.load(Ordering::SeqCst) {
                return Err(EngineError::Cancelled);
            }
            if let Some(deadline) = deadline {
                if Instant::now() > deadline {
                    return self
                        .fail_run(run_id, "DeadlineExceeded", "run exceeded its deadline", None)
                        .await;
                }
            }

            let node = &definition.nodes[idx];
            let node_incoming = &incoming[idx];

            let envelope = self.state.get_node_input(run_id).await?;
            let all_pruned = !node_incoming.is_empty()
                && node_incoming
                    .iter()
                    .all(|edge| self.edge_pruned(edge, &index_of, &definition.nodes, &resolved, &envelope));

            if all_pruned {
                db::repository::node_executions::insert_skipped(
                    &self.pool,
                    run_id,
                    &node.id,
                    &node.node_type,
                    execution_order,
                )
                .await?;
                resolved.insert(idx, NodeOutcome::Skipped);
            } else {
                match self.run_node(workflow, run_id, node, envelope, execution_order).await {
                    Ok(output) => {
                        resolved.insert(idx, NodeOutcome::Completed(output));
                    }
                    Err(e) => {
                        let (code, message) = engine_error_to_run_error(&e);
                        self.fail_run(run_id, &code, &message, Some(node.id.clone())).await.ok();
                        return Err(e);
                    }
                }
            }

            execution_order += 1;

            for &neighbour in &adjacency[idx] {
                in_degree[neighbour] -= 1;
                if in_degree[neighbour] == 0 {
                    ready.insert(neighbour);
                }
            }
        }

        if resolved.len() != definition.nodes.len() {
            return self
                .fail_run(run_id, "InconsistentGraph", "not every node was reached", None)
                .await;
        }

        let completed_at = Utc::now();
        let mut tx = db::pool::begin(&self.pool).await?;
        db::repository::workflow_runs::mark_terminal_tx(
            &mut tx,
            run_id,
            "COMPLETED",
            None,
            None,
            completed_at,
        )
        .await?;
        self.state.finalize_workflow_state(&mut tx, run_id, "completed").await?;
        tx.commit().await.map_err(db::DbError::from)?;

        Ok(())
    }

    fn edge_pruned(
        &self,
        edge: &Edge,
        index_of: &HashMap<&str, usize>,
        nodes: &[NodeDefinition],
        resolved: &HashMap<usize, NodeOutcome>,
        envelope: &Value,
    ) -> bool {
        let source_idx = index_of[edge.from.as_str()];
        match resolved.get(&source_idx) {
            None => false,
            Some(NodeOutcome::Skipped) => true,
            Some(NodeOutcome::Completed(output)) => {
                let source = &nodes[source_idx];
                if source.node_type == "Conditional" {
                    match conditional::active_edges(output) {
                        Some(active) => !active.iter().any(|id| id == &edge.to),
                        // The node didn't enumerate `active_edges` — fall
                        // back to the edge's own `condition` string, the
                        // same evaluation non-`Conditional`-sourced edges
                        // get. This is the path spec.md Scenario S5 takes:
                        // `G`'s output carries no `active_edges`, so its
                        // outgoing edges route on their own conditions.
                        None => match &edge.condition {
                            Some(cond) => !conditional::evaluate(cond, envelope),
                            None => false,
                        },
                    }
                } else if let Some(cond) = &edge.condition {
                    !conditional::evaluate(cond, envelope)
                } else {
                    false
                }
            }
        }
    }

    async fn run_node(
        &self,
        workflow: &Workflow,
        run_id: Uuid,
        node: &NodeDefinition,
        envelope: Value,
        execution_order: i32,
    ) -> Result<Value, EngineError> {
        self.state.add_execution_step(run_id, &node.id, None).await?;

        let exec_row = db::repository::node_executions::start_attempt(
            &self.pool,
            run_id,
            &node.id,
            &node.node_type,
            envelope.clone(),
            execution_order,
            0,
        )
        .await?;

        // Secret resolution is not implemented yet — empty map.
        let ctx = ExecutionContext {
            workflow_id: workflow.id,
            run_id,
            secrets: HashMap::new(),
        };

        match self.dispatch_with_retry(node, envelope, &ctx).await {
            Ok(output) => {
                db::repository::node_executions::complete_attempt(
                    &self.pool,
                    exec_row.id,
                    output.clone(),
                    Utc::now(),
                )
                .await?;
                self.state.save_node_output(run_id, &node.id, output.clone()).await?;
                Ok(output)
            }
            Err(e) => {
                let message = e.to_string();
                db::repository::node_executions::fail_attempt(&self.pool, exec_row.id, &message, Utc::now())
                    .await
                    .ok();
                Err(e)
            }
        }
    }

    async fn dispatch_with_retry(
        &self,
        node: &NodeDefinition,
        envelope: Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, EngineError> {
        let Some(executor) = self.nodes.get(&node.node_type) else {
            return Err(EngineError::NodeFailed {
                node_id: node.id.clone(),
                message: format!("no executor registered for node type '{}'", node.node_type),
                retries_exhausted: false,
            });
        };

        let policy = executor.retry_policy();
        let mut attempt = 0u32;

        loop {
            match executor.execute(envelope.clone(), &node.config, ctx).await {
                Ok(output) => return Ok(output),

                Err(NodeError::Permanent(message)) => {
                    return Err(EngineError::NodeFailed {
                        node_id: node.id.clone(),
                        message,
                        retries_exhausted: false,
                    });
                }

                Err(NodeError::Transient(message)) => {
                    attempt += 1;
                    if attempt > policy.max_retries {
                        return Err(EngineError::NodeFailed {
                            node_id: node.id.clone(),
                            message,
                            retries_exhausted: true,
                        });
                    }

                    let delay = policy.backoff_for(attempt);
                    warn!(
                        node_id = %node.id,
                        attempt,
                        max_retries = policy.max_retries,
                        ?delay,
                        "node transient failure, retrying: {message}"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn fail_run(
        &self,
        run_id: Uuid,
        code: &str,
        message: &str,
        node_id: Option<String>,
    ) -> Result<(), EngineError> {
        let run_error = RunError {
            code: code.to_string(),
            message: message.to_string(),
            node_id,
        };
        let completed_at = Utc::now();
        let mut tx = db::pool::begin(&self.pool).await?;
        db::repository::workflow_runs::mark_terminal_tx(
            &mut tx,
            run_id,
            "FAILED",
            None,
            Some(serde_json::to_value(&run_error).map_err(|e| EngineError::Internal(e.to_string()))?),
            completed_at,
        )
        .await?;
        self.state.finalize_workflow_state(&mut tx, run_id, "failed").await?;
        tx.commit().await.map_err(db::DbError::from)?;
        Ok(())
    }
}

/// Map an `EngineError` produced mid-schedule onto a `(code, message)` pair
/// for the run's persisted `RunError`.
fn engine_error_to_run_error(e: &EngineError) -> (String, String) {
    match e {
        EngineError::NodeFailed { retries_exhausted, message, .. } => {
            let code = if *retries_exhausted { "RetriesExhausted" } else { "NodeFailed" };
            (code.to_string(), message.clone())
        }
        other => ("NodeFailed".to_string(), other.to_string()),
    }
}

/// Exercises the scheduling loop end-to-end (spec.md §8's S1/S4/S5/S6)
/// against a real Postgres instance (`#[sqlx::test]` provisions and
/// migrates a throwaway database per test, the same migration set
/// `db::pool::run_migrations` applies in production) with `MockNode`s
/// standing in for real executors.
#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use sqlx::PgPool;
    use tokio::sync::OnceCell;

    use nodes::mock::MockNode;
    use nodes::ExecutableNode;
    use state::StateStore;

    use crate::models::{NodeStatus, RunStatus};

    use super::*;

    fn node(id: &str, node_type: &str, config: Value) -> NodeDefinition {
        NodeDefinition {
            id: id.into(),
            node_type: node_type.into(),
            config,
            position: None,
        }
    }

    fn edge(from: &str, to: &str, condition: Option<&str>) -> Edge {
        Edge {
            from: from.into(),
            to: to.into(),
            condition: condition.map(String::from),
        }
    }

    /// Create an `ACTIVE` workflow wrapping `definition` and the `Engine`
    /// wired to `registry`, ready for `execute_workflow`.
    async fn setup(
        pool: PgPool,
        registry: NodeRegistry,
        definition: WorkflowDefinition,
    ) -> (Engine, Arc<StateStore>, Uuid) {
        let state = Arc::new(StateStore::new(pool.clone()));
        let engine = Engine::new(pool, Arc::clone(&state), registry);

        let workflow = engine
            .create_workflow("test-workflow", None, definition, None)
            .await
            .expect("create_workflow");
        engine
            .update_workflow(
                workflow.id,
                WorkflowPatch {
                    status: Some(WorkflowStatus::Active),
                    ..Default::default()
                },
            )
            .await
            .expect("activate workflow");

        (engine, state, workflow.id)
    }

    /// Poll `GetWorkflowStatus` until the run reaches a terminal status.
    /// Every node in these tests resolves instantly, so a two-second ceiling
    /// is generous, not a tuned timeout.
    async fn wait_for_terminal(engine: &Engine, run_id: Uuid) -> RunStatusView {
        for _ in 0..200 {
            let status = engine.get_workflow_status(run_id, true).await.expect("get_workflow_status");
            if status.run.status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {run_id} did not reach a terminal status in time");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn s1_happy_path_linear_dag_completes_in_order(pool: PgPool) {
        let registry = NodeRegistry::new();
        registry.register("ScheduleTrigger", Arc::new(MockNode::returning("A", json!({}))));
        registry.register("DataMapper", Arc::new(MockNode::returning("B", json!({}))));
        registry.register("DatabaseWrite", Arc::new(MockNode::returning("C", json!({}))));

        let definition = WorkflowDefinition {
            nodes: vec![
                node("A", "ScheduleTrigger", json!({"cron": "* * * * *"})),
                node(
                    "B",
                    "DataMapper",
                    json!({"input_schema": {}, "output_schema": {}, "mapping_rules": {}}),
                ),
                node(
                    "C",
                    "DatabaseWrite",
                    json!({"connection": "c", "table": "t", "operation": "insert"}),
                ),
            ],
            edges: vec![edge("A", "B", None), edge("B", "C", None)],
        };

        let (engine, state, workflow_id) = setup(pool, registry, definition).await;
        let run = engine
            .execute_workflow(workflow_id, json!({"k": 1}), None, 5, None)
            .await
            .expect("execute_workflow");

        let status = wait_for_terminal(&engine, run.id).await;
        assert_eq!(status.run.status, RunStatus::Completed);

        let executions = status.node_executions.expect("include_nodes was requested");
        let order: Vec<&str> = executions.iter().map(|e| e.node_id.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert!(executions.iter().all(|e| e.status == NodeStatus::Completed));

        let workflow_state = state
            .get_workflow_state(run.id)
            .await
            .expect("get_workflow_state")
            .expect("state was initialized");
        assert_eq!(workflow_state.status, "completed");
        let path: Vec<&str> = workflow_state.execution_path.iter().map(|s| s.node_id.as_str()).collect();
        assert_eq!(path, vec!["A", "B", "C"]);
        assert_eq!(workflow_state.node_outputs.len(), 3);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn s4_fail_fast_stops_before_downstream_node(pool: PgPool) {
        let registry = NodeRegistry::new();
        registry.register("ScheduleTrigger", Arc::new(MockNode::returning("A", json!({}))));
        registry.register("DataMapper", Arc::new(MockNode::failing_permanent("B", "boom")));
        registry.register("DatabaseWrite", Arc::new(MockNode::returning("C", json!({}))));

        let definition = WorkflowDefinition {
            nodes: vec![
                node("A", "ScheduleTrigger", json!({"cron": "* * * * *"})),
                node(
                    "B",
                    "DataMapper",
                    json!({"input_schema": {}, "output_schema": {}, "mapping_rules": {}}),
                ),
                node(
                    "C",
                    "DatabaseWrite",
                    json!({"connection": "c", "table": "t", "operation": "insert"}),
                ),
            ],
            edges: vec![edge("A", "B", None), edge("B", "C", None)],
        };

        let (engine, _state, workflow_id) = setup(pool, registry, definition).await;
        let run = engine
            .execute_workflow(workflow_id, json!({}), None, 5, None)
            .await
            .expect("execute_workflow");

        let status = wait_for_terminal(&engine, run.id).await;
        assert_eq!(status.run.status, RunStatus::Failed);
        let error = status.run.error.as_ref().expect("failed run carries a RunError");
        assert_eq!(error.node_id.as_deref(), Some("B"));

        let executions = status.node_executions.expect("include_nodes was requested");
        let a = executions.iter().find(|e| e.node_id == "A").expect("A was attempted");
        assert_eq!(a.status, NodeStatus::Completed);
        let b = executions.iter().find(|e| e.node_id == "B").expect("B was attempted");
        assert_eq!(b.status, NodeStatus::Failed);
        assert!(
            executions.iter().all(|e| e.node_id != "C"),
            "C must never be invoked once B fails permanently"
        );
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn s5_conditional_skip_prunes_the_false_branch(pool: PgPool) {
        let registry = NodeRegistry::new();
        registry.register("FormTrigger", Arc::new(MockNode::returning("T", json!({}))));
        registry.register("Conditional", Arc::new(nodes::ConditionalNode));
        registry.register("APICall", Arc::new(MockNode::returning("branch", json!({}))));

        let definition = WorkflowDefinition {
            nodes: vec![
                node("T", "FormTrigger", json!({"form_id": "f"})),
                node("G", "Conditional", json!({"conditions": "x>0"})),
                node("L", "APICall", json!({"endpoint": "https://x", "method": "POST"})),
                node("R", "APICall", json!({"endpoint": "https://x", "method": "POST"})),
            ],
            edges: vec![
                edge("T", "G", None),
                edge("G", "L", Some("x>0")),
                edge("G", "R", Some("x<=0")),
            ],
        };

        let (engine, _state, workflow_id) = setup(pool, registry, definition).await;
        let run = engine
            .execute_workflow(workflow_id, json!({"x": 5}), None, 5, None)
            .await
            .expect("execute_workflow");

        let status = wait_for_terminal(&engine, run.id).await;
        assert_eq!(status.run.status, RunStatus::Completed);

        let executions = status.node_executions.expect("include_nodes was requested");
        let l = executions.iter().find(|e| e.node_id == "L").expect("L was scheduled");
        let r = executions.iter().find(|e| e.node_id == "R").expect("R was scheduled");
        assert_eq!(l.status, NodeStatus::Completed);
        assert_eq!(r.status, NodeStatus::Skipped);
    }

    /// Flips the shared cancellation flag (via `Engine::stop_workflow`, the
    /// same path a real `StopWorkflow` API call takes) as soon as it runs,
    /// simulating a cancel request that lands right after its node finishes.
    struct CancelAfterExecute {
        engine: Arc<OnceCell<Engine>>,
    }

    #[async_trait]
    impl ExecutableNode for CancelAfterExecute {
        async fn execute(&self, _envelope: Value, _config: &Value, ctx: &ExecutionContext) -> Result<Value, NodeError> {
            if let Some(engine) = self.engine.get() {
                engine.stop_workflow(ctx.run_id).await.ok();
            }
            Ok(json!({"node": "A"}))
        }
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn s6_cancellation_at_node_boundary_stops_before_next_node(pool: PgPool) {
        let engine_cell: Arc<OnceCell<Engine>> = Arc::new(OnceCell::new());

        let registry = NodeRegistry::new();
        registry.register(
            "ScheduleTrigger",
            Arc::new(CancelAfterExecute { engine: Arc::clone(&engine_cell) }),
        );
        registry.register("Wait", Arc::new(MockNode::returning("B", json!({}))));

        let definition = WorkflowDefinition {
            nodes: vec![
                node("A", "ScheduleTrigger", json!({"cron": "* * * * *"})),
                node("B", "Wait", json!({})),
            ],
            edges: vec![edge("A", "B", None)],
        };

        let (engine, state, workflow_id) = setup(pool, registry, definition).await;
        assert!(engine_cell.set(engine.clone()).is_ok());

        let run = engine
            .execute_workflow(workflow_id, json!({}), None, 5, None)
            .await
            .expect("execute_workflow");

        let status = wait_for_terminal(&engine, run.id).await;
        assert_eq!(status.run.status, RunStatus::Cancelled);

        let executions = status.node_executions.expect("include_nodes was requested");
        assert!(executions.iter().any(|e| e.node_id == "A" && e.status == NodeStatus::Completed));
        assert!(executions.iter().all(|e| e.node_id != "B"), "B must never be invoked after cancellation");

        let workflow_state = state
            .get_workflow_state(run.id)
            .await
            .expect("get_workflow_state")
            .expect("state was initialized");
        assert_eq!(workflow_state.status, "cancelled");
    }
}
