//! `TaskQueue` — the broker-neutral, in-process priority task queue and
//! worker pool described in spec.md §4.5.
//!
//! Grounded on `original_source/worker_manager.py`'s `WorkerManager`
//! (a Celery wrapper), translated per spec.md §9's "broker-driven task
//! dispatch... specification is broker-neutral" into a durable-within-process,
//! priority-capable, at-least-once queue: one [`Lane`] per named queue,
//! drained by a pool of `tokio::task` workers in queue-weight order, then by
//! per-task priority within a queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::QueueError;
use crate::models::{
    HealthReport, QueueName, QueueStats, QueuedTask, SubmitTaskParams, TaskRecord, TaskStatus,
    WorkerStats,
};
use crate::queue::Lane;
use crate::registry::{TaskOutcome, TaskRegistry};

/// The prioritized, multi-queue task broker plus the worker pool that
/// drains it.
pub struct TaskQueue {
    lanes: HashMap<QueueName, Lane>,
    tasks: std::sync::RwLock<HashMap<Uuid, TaskRecord>>,
    registry: TaskRegistry,
    sequence: AtomicU64,
    tasks_processed: AtomicU64,
    tasks_failed: AtomicU64,
    running: Arc<AtomicBool>,
}

impl TaskQueue {
    pub fn new(registry: TaskRegistry) -> Arc<Self> {
        let mut lanes = HashMap::new();
        for queue in QueueName::ALL {
            lanes.insert(queue, Lane::new());
        }

        Arc::new(Self {
            lanes,
            tasks: std::sync::RwLock::new(HashMap::new()),
            registry,
            sequence: AtomicU64::new(0),
            tasks_processed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    // -----------------------------------------------------------------
    // SubmitTask
    // -----------------------------------------------------------------

    /// Enqueue a task. Two calls with identical `(name, args, kwargs)`
    /// always produce two distinct task ids — there is no dedup guarantee
    /// (spec.md Testable Property 7).
    pub fn submit(&self, params: SubmitTaskParams) -> Uuid {
        let id = Uuid::new_v4();
        let queue = params.queue.unwrap_or_else(|| QueueName::for_task_name(&params.name));
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);

        let not_before = match (params.countdown, params.eta) {
            (Some(delay), _) => Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default(),
            (None, Some(eta)) => eta,
            (None, None) => Utc::now(),
        };

        let task = QueuedTask {
            id,
            name: params.name.clone(),
            args: params.args,
            kwargs: params.kwargs,
            priority: params.priority.clamp(1, 10),
            sequence,
            not_before,
            expires: params.expires,
            retry_policy: params.retry_policy.unwrap_or_default(),
            retry_count: 0,
        };

        let record = TaskRecord {
            id,
            name: params.name,
            queue: queue.as_str().to_string(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            retry_count: 0,
            submitted_at: Utc::now(),
            priority: task.priority,
        };

        self.tasks.write().expect("task map lock poisoned").insert(id, record);
        self.lanes[&queue].push(task);

        id
    }

    /// Convenience wrapper matching spec.md's `SubmitTask(name, args,
    /// kwargs, priority, queue?, countdown?, eta?, expires?, retryPolicy?)`.
    pub fn submit_task(
        &self,
        name: impl Into<String>,
        args: serde_json::Value,
        priority: u8,
    ) -> Uuid {
        self.submit(SubmitTaskParams::new(name, args).with_priority(priority))
    }

    // -----------------------------------------------------------------
    // GetTaskStatus / CancelTask / PurgeQueue
    // -----------------------------------------------------------------

    pub fn get_status(&self, task_id: Uuid) -> Option<TaskRecord> {
        self.tasks.read().expect("task map lock poisoned").get(&task_id).cloned()
    }

    /// Mark a task `REVOKED`. `terminate` has no distinct effect here (no
    /// in-flight preemption is modeled beyond cooperative cancellation,
    /// which belongs to the `engine` crate, not the queue); a task already
    /// running or terminal is unaffected.
    pub fn cancel(&self, task_id: Uuid, _terminate: bool) -> bool {
        let mut guard = self.tasks.write().expect("task map lock poisoned");
        match guard.get_mut(&task_id) {
            Some(record) if !record.status.is_terminal() && record.status != TaskStatus::Started => {
                record.status = TaskStatus::Revoked;
                true
            }
            _ => false,
        }
    }

    /// Drain every queued (not yet dequeued) task from `queue`, marking each
    /// `REVOKED`. Returns the number purged.
    pub fn purge_queue(&self, queue: QueueName) -> usize {
        let drained = self.lanes[&queue].drain();
        let mut guard = self.tasks.write().expect("task map lock poisoned");
        for task in &drained {
            if let Some(record) = guard.get_mut(&task.id) {
                record.status = TaskStatus::Revoked;
            }
        }
        drained.len()
    }

    // -----------------------------------------------------------------
    // Stats / health
    // -----------------------------------------------------------------

    pub fn queue_stats(&self) -> Vec<QueueStats> {
        QueueName::ALL
            .iter()
            .map(|&q| QueueStats {
                queue: q.as_str().to_string(),
                weight: q.weight(),
                pending: self.lanes[&q].len(),
            })
            .collect()
    }

    pub fn worker_stats(&self, worker_count: usize) -> WorkerStats {
        WorkerStats {
            worker_count,
            tasks_processed: self.tasks_processed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
        }
    }

    pub fn health_check(&self, worker_count: usize) -> HealthReport {
        HealthReport {
            healthy: self.running.load(Ordering::Relaxed),
            worker_count,
            queues: self.queue_stats(),
        }
    }

    // -----------------------------------------------------------------
    // Worker pool
    // -----------------------------------------------------------------

    /// Spawn `count` worker tasks, each looping: drain queues in weight
    /// order, run whatever's ready, sleep briefly when nothing is.
    pub fn spawn_workers(self: &Arc<Self>, count: usize) -> Vec<tokio::task::JoinHandle<()>> {
        let mut queues_by_weight = QueueName::ALL.to_vec();
        queues_by_weight.sort_by_key(|q| std::cmp::Reverse(q.weight()));

        (0..count)
            .map(|worker_id| {
                let broker = Arc::clone(self);
                let queues = queues_by_weight.clone();
                tokio::spawn(async move { broker.worker_loop(worker_id, queues).await })
            })
            .collect()
    }

    /// Stop every worker loop at its next idle check.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize, queues: Vec<QueueName>) {
        info!(worker_id, "task worker started");
        while self.running.load(Ordering::Relaxed) {
            let picked = queues.iter().find_map(|&q| self.lanes[&q].pop_ready().map(|t| (q, t)));

            match picked {
                Some((queue, task)) => self.run_task(queue, task).await,
                None => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
        info!(worker_id, "task worker stopped");
    }

    async fn run_task(self: &Arc<Self>, queue: QueueName, task: QueuedTask) {
        if self.get_status(task.id).map(|r| r.status) == Some(TaskStatus::Revoked) {
            return;
        }

        if let Some(expires) = task.expires {
            if Utc::now() > expires {
                self.set_status(task.id, TaskStatus::Revoked, None, None);
                return;
            }
        }

        self.set_status(task.id, TaskStatus::Started, None, None);

        let Some(handler) = self.registry.get(&task.name) else {
            warn!(task_name = %task.name, "no handler registered for task");
            self.fail(task.id, "unknown task name".to_string());
            return;
        };

        let outcome = handler(task.args.clone(), task.kwargs.clone()).await;

        match outcome {
            TaskOutcome::Success(result) => {
                self.tasks_processed.fetch_add(1, Ordering::Relaxed);
                self.set_status(task.id, TaskStatus::Success, Some(result), None);
            }
            TaskOutcome::Permanent(message) => self.fail(task.id, message),
            TaskOutcome::Transient(message) => {
                if task.retry_count < task.retry_policy.max_retries {
                    let mut retried = task;
                    retried.retry_count += 1;
                    retried.not_before = Utc::now()
                        + chrono::Duration::from_std(retried.retry_policy.countdown * retried.retry_count)
                            .unwrap_or_default();
                    self.set_status(retried.id, TaskStatus::Retry, None, Some(message));
                    self.bump_retry_count(retried.id, retried.retry_count);
                    self.lanes[&queue].push(retried);
                } else {
                    self.fail(task.id, message);
                }
            }
        }
    }

    fn fail(&self, task_id: Uuid, message: String) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        self.set_status(task_id, TaskStatus::Failure, None, Some(message));
    }

    fn set_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) {
        let mut guard = self.tasks.write().expect("task map lock poisoned");
        if let Some(record) = guard.get_mut(&task_id) {
            record.status = status;
            if result.is_some() {
                record.result = result;
            }
            if error.is_some() {
                record.error = error;
            }
        }
    }

    fn bump_retry_count(&self, task_id: Uuid, retry_count: u32) {
        let mut guard = self.tasks.write().expect("task map lock poisoned");
        if let Some(record) = guard.get_mut(&task_id) {
            record.retry_count = retry_count;
        }
    }
}

/// Error-returning accessor used where an unknown queue name needs to
/// surface as a typed error rather than a panic (e.g. an admin HTTP route).
pub fn parse_queue(name: &str) -> Result<QueueName, QueueError> {
    name.parse().map_err(|_| QueueError::UnknownQueue(name.to_string()))
}
