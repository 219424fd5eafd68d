//! A single named queue's priority lane.
//!
//! Wraps a `BinaryHeap<QueuedTask>` behind a `Mutex` so pushes and pops are
//! cheap, uncontended operations — the in-process equivalent of
//! `original_source/worker_manager.py`'s per-queue Celery/Kombu `Queue`.

use std::collections::BinaryHeap;
use std::sync::Mutex;

use chrono::Utc;

use crate::models::QueuedTask;

#[derive(Default)]
pub struct Lane {
    heap: Mutex<BinaryHeap<QueuedTask>>,
}

impl Lane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: QueuedTask) {
        let mut guard = self.heap.lock().expect("queue lane lock poisoned");
        guard.push(task);
    }

    /// Pop the highest-priority task whose `not_before` has elapsed, leaving
    /// any not-yet-eligible (delayed/ETA) tasks in the lane.
    ///
    /// `BinaryHeap` doesn't support scanning past its head cheaply, so a
    /// not-yet-ready head is set aside in a scratch buffer and restored —
    /// fine at the scale an in-process broker is expected to run at.
    pub fn pop_ready(&self) -> Option<QueuedTask> {
        let mut guard = self.heap.lock().expect("queue lane lock poisoned");
        let now = Utc::now();
        let mut deferred = Vec::new();

        let found = loop {
            match guard.pop() {
                Some(task) if task.not_before <= now => break Some(task),
                Some(task) => deferred.push(task),
                None => break None,
            }
        };

        for task in deferred {
            guard.push(task);
        }

        found
    }

    pub fn len(&self) -> usize {
        self.heap.lock().expect("queue lane lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every queued task, for `PurgeQueue`.
    pub fn drain(&self) -> Vec<QueuedTask> {
        let mut guard = self.heap.lock().expect("queue lane lock poisoned");
        guard.drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::models::TaskRetryPolicy;

    fn task(priority: u8, sequence: u64) -> QueuedTask {
        QueuedTask {
            id: uuid::Uuid::new_v4(),
            name: "t".into(),
            args: json!({}),
            kwargs: json!({}),
            priority,
            sequence,
            not_before: Utc::now() - chrono::Duration::seconds(1),
            expires: None,
            retry_policy: TaskRetryPolicy::default(),
            retry_count: 0,
        }
    }

    #[test]
    fn higher_priority_dequeues_first() {
        let lane = Lane::new();
        lane.push(task(1, 0));
        lane.push(task(9, 1));
        lane.push(task(5, 2));
        assert_eq!(lane.pop_ready().unwrap().priority, 9);
        assert_eq!(lane.pop_ready().unwrap().priority, 5);
        assert_eq!(lane.pop_ready().unwrap().priority, 1);
    }

    #[test]
    fn equal_priority_is_fifo() {
        let lane = Lane::new();
        lane.push(task(5, 0));
        lane.push(task(5, 1));
        lane.push(task(5, 2));
        assert_eq!(lane.pop_ready().unwrap().sequence, 0);
        assert_eq!(lane.pop_ready().unwrap().sequence, 1);
        assert_eq!(lane.pop_ready().unwrap().sequence, 2);
    }

    #[test]
    fn not_yet_eligible_task_stays_in_the_lane() {
        let lane = Lane::new();
        let mut future = task(9, 0);
        future.not_before = Utc::now() + chrono::Duration::seconds(60);
        lane.push(future);
        lane.push(task(1, 1));

        // The high-priority task isn't eligible yet, so the low-priority one
        // pops instead.
        assert_eq!(lane.pop_ready().unwrap().priority, 1);
        assert_eq!(lane.len(), 1);
    }
}
