//! `StateStore` — the two-tier (fast cache / durable store) contract from
//! spec.md §4.2.
//!
//! Reads prefer the cache and repopulate it on a miss from the durable
//! store; writes go to both, cache first (latency), durable write
//! completing before the caller considers the mutation persisted — exactly
//! the read/write order `original_source/state_manager.py`'s
//! `get_workflow_state`/`_set_redis_state` pair follows, with Postgres
//! (via `db::repository`) standing in for its SQLAlchemy-backed tables.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use db::DbPool;

use crate::cache::Cache;
use crate::models::{ExecutionStep, StateKey, WorkflowStateView};
use crate::StateError;

/// Two-tier, run-addressable state store.
pub struct StateStore {
    pool: DbPool,
    cache: Cache,
    /// Per-run mutex serializing the read-merge-write `UpdateWorkflowState`
    /// performs, per spec.md §5 ("updates to WorkflowState within one run
    /// are serialized by a per-run mutex").
    run_locks: StdMutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl StateStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            cache: Cache::new(),
            run_locks: StdMutex::new(HashMap::new()),
        }
    }

    fn run_lock(&self, run_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut guard = self.run_locks.lock().expect("run lock map poisoned");
        guard.entry(run_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    // -----------------------------------------------------------------
    // Workflow state
    // -----------------------------------------------------------------

    /// Create `{status: "running", startedAt, variables: initial,
    /// nodeOutputs: {}, executionPath: []}` in both tiers.
    pub async fn init_workflow_state(
        &self,
        run_id: Uuid,
        initial: HashMap<String, Value>,
        trigger_data: Value,
    ) -> Result<WorkflowStateView, StateError> {
        let started_at = Utc::now();
        let mut state = WorkflowStateView::new(started_at, trigger_data);
        state.variables = initial;

        self.persist(run_id, &state).await?;
        Ok(state)
    }

    /// Read-through: cache first, durable store on miss (repopulating the
    /// cache), `None` if never initialized.
    pub async fn get_workflow_state(&self, run_id: Uuid) -> Result<Option<WorkflowStateView>, StateError> {
        let key = StateKey::workflow(run_id).to_string();

        if let Some(cached) = self.cache.get(&key) {
            return Ok(Some(serde_json::from_value(cached).map_err(StateError::Serde)?));
        }

        let Some(row) = db::repository::workflow_states::get(&self.pool, run_id).await? else {
            return Ok(None);
        };

        let state = WorkflowStateView {
            status: row.status,
            started_at: row.started_at,
            updated_at: Some(row.updated_at),
            variables: serde_json::from_value(row.variables).unwrap_or_default(),
            node_outputs: serde_json::from_value(row.node_outputs).unwrap_or_default(),
            execution_path: serde_json::from_value(row.execution_path).unwrap_or_default(),
            trigger_data: row.trigger_data,
        };

        self.cache.set(key, serde_json::to_value(&state).map_err(StateError::Serde)?, None);
        Ok(Some(state))
    }

    /// Merge `patch` over the current state and stamp `updatedAt`.
    /// Serialized per-run so concurrent callers can't race a read-merge-write.
    pub async fn update_workflow_state(
        &self,
        run_id: Uuid,
        patch: impl FnOnce(&mut WorkflowStateView),
    ) -> Result<WorkflowStateView, StateError> {
        let lock = self.run_lock(run_id);
        let _guard = lock.lock().await;

        let mut state = self
            .get_workflow_state(run_id)
            .await?
            .ok_or(StateError::NotInitialized(run_id))?;

        patch(&mut state);
        state.updated_at = Some(Utc::now());

        self.persist(run_id, &state).await?;
        Ok(state)
    }

    /// Patch `status` onto the current `WorkflowState` and persist it inside
    /// the caller's transaction, paired with that same transaction's
    /// terminal `workflow_runs` write (spec.md §4.6: "the facade must
    /// support transactional writes when (a) marking a run terminal and
    /// (b) writing its final `WorkflowState`"). The cache write still
    /// happens eagerly and outside the transaction — per §4.2 only the
    /// durable write needs to complete before the mutation is considered
    /// persisted — but the durable write now commits atomically with the
    /// run's terminal status.
    pub async fn finalize_workflow_state(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        run_id: Uuid,
        status: &str,
    ) -> Result<WorkflowStateView, StateError> {
        let lock = self.run_lock(run_id);
        let _guard = lock.lock().await;

        let mut state = self
            .get_workflow_state(run_id)
            .await?
            .ok_or(StateError::NotInitialized(run_id))?;

        state.status = status.to_string();
        state.updated_at = Some(Utc::now());

        let key = StateKey::workflow(run_id).to_string();
        self.cache.set(
            key,
            serde_json::to_value(&state).map_err(StateError::Serde)?,
            None,
        );

        db::repository::workflow_states::upsert_tx(
            tx,
            run_id,
            &state.status,
            state.started_at,
            serde_json::to_value(&state.variables).map_err(StateError::Serde)?,
            serde_json::to_value(&state.node_outputs).map_err(StateError::Serde)?,
            serde_json::to_value(&state.execution_path).map_err(StateError::Serde)?,
            state.trigger_data.clone(),
        )
        .await?;

        Ok(state)
    }

    async fn persist(&self, run_id: Uuid, state: &WorkflowStateView) -> Result<(), StateError> {
        let key = StateKey::workflow(run_id).to_string();
        let serialized = serde_json::to_value(state).map_err(StateError::Serde)?;

        // Cache write happens first — the store only needs the durable
        // write to complete before the caller treats the mutation as
        // persisted (spec.md §4.2).
        self.cache.set(key, serialized, None);

        db::repository::workflow_states::upsert(
            &self.pool,
            run_id,
            &state.status,
            state.started_at,
            serde_json::to_value(&state.variables).map_err(StateError::Serde)?,
            serde_json::to_value(&state.node_outputs).map_err(StateError::Serde)?,
            serde_json::to_value(&state.execution_path).map_err(StateError::Serde)?,
            state.trigger_data.clone(),
        )
        .await?;

        Ok(())
    }

    // -----------------------------------------------------------------
    // Node output / input envelope
    // -----------------------------------------------------------------

    /// Write node-scoped output AND mirror it into
    /// `workflowState.nodeOutputs[nodeId]`.
    pub async fn save_node_output(&self, run_id: Uuid, node_id: &str, output: Value) -> Result<(), StateError> {
        let node_key = StateKey::node(run_id, node_id, "output").to_string();
        self.cache.set(node_key, output.clone(), None);

        self.update_workflow_state(run_id, |state| {
            state.node_outputs.insert(node_id.to_string(), output.clone());
        })
        .await?;

        db::repository::node_states::append(&self.pool, run_id, node_id, "output", output).await?;
        Ok(())
    }

    /// The canonical node input envelope: `{workflow, nodes, trigger}`.
    pub async fn get_node_input(&self, run_id: Uuid) -> Result<Value, StateError> {
        let state = self
            .get_workflow_state(run_id)
            .await?
            .ok_or(StateError::NotInitialized(run_id))?;
        Ok(state.node_input_envelope(run_id))
    }

    // -----------------------------------------------------------------
    // Generic node-state audit sink
    // -----------------------------------------------------------------

    pub async fn save_node_state(
        &self,
        run_id: Uuid,
        node_id: &str,
        state_type: &str,
        data: Value,
    ) -> Result<(), StateError> {
        let key = StateKey::node(run_id, node_id, state_type).to_string();
        self.cache.set(key, data.clone(), None);
        db::repository::node_states::append(&self.pool, run_id, node_id, state_type, data).await?;
        Ok(())
    }

    pub async fn get_node_state(
        &self,
        run_id: Uuid,
        node_id: &str,
        state_type: &str,
    ) -> Result<Option<Value>, StateError> {
        let key = StateKey::node(run_id, node_id, state_type).to_string();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Some(cached));
        }

        let row = db::repository::node_states::get_latest(&self.pool, run_id, node_id, state_type).await?;
        if let Some(row) = &row {
            self.cache.set(key, row.data.clone(), None);
        }
        Ok(row.map(|r| r.data))
    }

    // -----------------------------------------------------------------
    // Workflow variables
    // -----------------------------------------------------------------

    pub async fn set_workflow_variable(&self, run_id: Uuid, name: &str, value: Value) -> Result<(), StateError> {
        self.update_workflow_state(run_id, |state| {
            state.variables.insert(name.to_string(), value.clone());
        })
        .await?;
        Ok(())
    }

    pub async fn get_workflow_variable(
        &self,
        run_id: Uuid,
        name: &str,
        default: Option<Value>,
    ) -> Result<Option<Value>, StateError> {
        let state = self.get_workflow_state(run_id).await?;
        Ok(state
            .and_then(|s| s.variables.get(name).cloned())
            .or(default))
    }

    // -----------------------------------------------------------------
    // Global variables — shared across runs, durable tier is authoritative
    // -----------------------------------------------------------------

    pub async fn set_global_variable(
        &self,
        name: &str,
        value: Value,
        ttl: Option<chrono::Duration>,
    ) -> Result<(), StateError> {
        let expires_at = ttl.map(|d| Utc::now() + d);
        let key = StateKey::global(name).to_string();
        self.cache.set(key, value.clone(), expires_at);
        db::repository::global_variables::set(&self.pool, name, value, expires_at).await?;
        Ok(())
    }

    pub async fn get_global_variable(&self, name: &str, default: Option<Value>) -> Result<Option<Value>, StateError> {
        let key = StateKey::global(name).to_string();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Some(cached));
        }

        let row = db::repository::global_variables::get(&self.pool, name).await?;
        if let Some(row) = &row {
            self.cache.set(key, row.value.clone(), row.expires_at);
        }
        Ok(row.map(|r| r.value).or(default))
    }

    // -----------------------------------------------------------------
    // Execution path
    // -----------------------------------------------------------------

    /// Append a step to `executionPath`. Called when a node transitions to
    /// `RUNNING`, so the path reflects invocation order exactly (spec.md
    /// invariant 4).
    pub async fn add_execution_step(&self, run_id: Uuid, node_id: &str, data: Option<Value>) -> Result<(), StateError> {
        let step = ExecutionStep {
            node_id: node_id.to_string(),
            timestamp: Utc::now(),
            data,
        };
        self.update_workflow_state(run_id, move |state| {
            state.execution_path.push(step);
        })
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Cleanup
    // -----------------------------------------------------------------

    /// Evict every cache entry for `run_id`. Durable retention is a policy
    /// knob — default keeps rows for audit, per spec.md §4.2.
    pub fn cleanup_run(&self, run_id: Uuid) {
        self.cache.remove_matching(&StateKey::run_prefix(run_id));
        let mut guard = self.run_locks.lock().expect("run lock map poisoned");
        guard.remove(&run_id);
    }

    /// Remove durable rows (workflow_states, node_states) older than the
    /// threshold. Driven by `queue`'s `system.cleanup_expired_data` task.
    pub async fn cleanup_expired(&self, max_age_days: i64) -> Result<u64, StateError> {
        let states = db::repository::workflow_states::delete_older_than(&self.pool, max_age_days).await?;
        let node_states = db::repository::node_states::delete_older_than(&self.pool, max_age_days).await?;
        Ok(states + node_states)
    }
}
