//! Wire-level and internal shapes for the task queue.
//!
//! Grounded on `original_source/worker_manager.py`'s `TaskPriority`/
//! `TaskStatus` enums and its five named, statically-prioritized queues
//! (`workflow`, `forms`, `integration`, `notifications`, `system`).

use std::cmp::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed set of queues spec.md §4.5 defines, each with a static
/// priority weight used to pick which queue a worker drains next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueName {
    Workflow,
    Forms,
    Integration,
    Notifications,
    System,
}

impl QueueName {
    pub const ALL: [QueueName; 5] = [
        QueueName::Workflow,
        QueueName::Forms,
        QueueName::Integration,
        QueueName::Notifications,
        QueueName::System,
    ];

    /// Static queue weight — higher drains first. Values fixed by spec.md
    /// §4.5: `workflow`=3, `forms`=2, `integration`=2, `notifications`=1,
    /// `system`=0.
    pub fn weight(self) -> u8 {
        match self {
            QueueName::Workflow => 3,
            QueueName::Forms => 2,
            QueueName::Integration => 2,
            QueueName::Notifications => 1,
            QueueName::System => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueueName::Workflow => "workflow",
            QueueName::Forms => "forms",
            QueueName::Integration => "integration",
            QueueName::Notifications => "notifications",
            QueueName::System => "system",
        }
    }

    /// Infer the queue from a `{domain}.{verb}` task name, falling back to
    /// `system` for anything unrecognized — mirrors
    /// `original_source/worker_manager.py`'s `task_routes` mapping by module
    /// prefix (`concertmaster.tasks.workflow_execution.*` → `workflow`, …).
    pub fn for_task_name(name: &str) -> QueueName {
        match name.split('.').next().unwrap_or("") {
            "workflow" => QueueName::Workflow,
            "forms" => QueueName::Forms,
            "integration" => QueueName::Integration,
            "notifications" => QueueName::Notifications,
            _ => QueueName::System,
        }
    }
}

impl std::str::FromStr for QueueName {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workflow" => Ok(QueueName::Workflow),
            "forms" => Ok(QueueName::Forms),
            "integration" => Ok(QueueName::Integration),
            "notifications" => Ok(QueueName::Notifications),
            "system" => Ok(QueueName::System),
            other => Err(format!("unknown queue '{other}'")),
        }
    }
}

/// Convenience priority levels, kept alongside the raw `1..=10` contract
/// `SubmitTask` itself takes — grounded on
/// `original_source/worker_manager.py`'s `_get_priority_value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl From<TaskPriority> for u8 {
    fn from(p: TaskPriority) -> u8 {
        match p {
            TaskPriority::Low => 1,
            TaskPriority::Normal => 5,
            TaskPriority::High => 8,
            TaskPriority::Critical => 10,
        }
    }
}

/// Lifecycle status of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Started,
    Success,
    Failure,
    Retry,
    Revoked,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure | TaskStatus::Revoked)
    }
}

/// Retry tuning a task is submitted with. Distinct from `nodes::RetryPolicy`
/// — this governs queue-level task redelivery, not node dispatch.
#[derive(Debug, Clone, Copy)]
pub struct TaskRetryPolicy {
    pub max_retries: u32,
    pub countdown: Duration,
}

impl Default for TaskRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            countdown: Duration::from_secs(60),
        }
    }
}

/// Parameters accepted by `TaskQueue::submit`.
#[derive(Debug, Clone)]
pub struct SubmitTaskParams {
    pub name: String,
    pub args: serde_json::Value,
    pub kwargs: serde_json::Value,
    /// `1..=10`, clamped at construction.
    pub priority: u8,
    /// Explicit queue override; defaults to [`QueueName::for_task_name`].
    pub queue: Option<QueueName>,
    /// Delay before the task becomes eligible to run.
    pub countdown: Option<Duration>,
    /// Absolute time before which the task is not eligible to run.
    pub eta: Option<DateTime<Utc>>,
    /// Absolute time after which the task is discarded as `REVOKED`.
    pub expires: Option<DateTime<Utc>>,
    pub retry_policy: Option<TaskRetryPolicy>,
}

impl SubmitTaskParams {
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            args,
            kwargs: serde_json::json!({}),
            priority: 5,
            queue: None,
            countdown: None,
            eta: None,
            expires: None,
            retry_policy: None,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 10);
        self
    }

    pub fn with_queue(mut self, queue: QueueName) -> Self {
        self.queue = Some(queue);
        self
    }
}

/// A queued unit of work, ordered within its queue by `(priority, sequence)`
/// — higher priority first, FIFO among equal priorities.
#[derive(Debug, Clone)]
pub struct QueuedTask {
    pub id: Uuid,
    pub name: String,
    pub args: serde_json::Value,
    pub kwargs: serde_json::Value,
    pub priority: u8,
    pub sequence: u64,
    pub not_before: DateTime<Utc>,
    pub expires: Option<DateTime<Utc>>,
    pub retry_policy: TaskRetryPolicy,
    pub retry_count: u32,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}
impl Eq for QueuedTask {}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: higher priority pops first; among equal
        // priorities, the *smaller* sequence (submitted earlier) should pop
        // first, hence the reversed comparison on `sequence`.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}
impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The externally visible record returned by `GetTaskStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub name: String,
    pub queue: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retry_count: u32,
    pub submitted_at: DateTime<Utc>,
    pub priority: u8,
}

/// Aggregate stats for one named queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub queue: String,
    pub weight: u8,
    pub pending: usize,
}

/// Aggregate stats across the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStats {
    pub worker_count: usize,
    pub tasks_processed: u64,
    pub tasks_failed: u64,
}

/// Shallow liveness report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub worker_count: usize,
    pub queues: Vec<QueueStats>,
}
