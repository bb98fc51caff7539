//! Recently finished tasks and cumulative counters.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::task::Task;

/// Bounded history of terminal tasks; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct RecentTasks {
    tasks: VecDeque<Task>,
    capacity: usize,
}

impl RecentTasks {
    /// Create an empty buffer holding at most `capacity` tasks.
    pub fn new(capacity: usize) -> Self {
        Self {
            tasks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a finished task, evicting the oldest when full.
    pub fn push(&mut self, task: Task) {
        if self.capacity == 0 {
            return;
        }
        if self.tasks.len() >= self.capacity {
            self.tasks.pop_back();
        }
        self.tasks.push_front(task);
    }

    /// Most recent first.
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.iter().cloned().collect()
    }

    /// Find a task by id.
    pub fn find(&self, id: crate::core::TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Number of tasks held.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Configured capacity.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Cumulative counters since process start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks accepted into the queue.
    pub total_enqueued: u64,
    /// Tasks that completed.
    pub total_completed: u64,
    /// Tasks that exhausted retries.
    pub total_failed: u64,
    /// Tasks canceled before running.
    pub total_canceled: u64,
    /// Failed attempts that were re-queued.
    pub total_retries: u64,
    /// Ticks deferred by admission control.
    pub total_deferred: u64,
    /// Scheduler-originated tasks dropped because the queue was full.
    pub total_rejected: u64,
    /// Running mean execution time of completed tasks, in milliseconds.
    pub average_execution_ms: f64,
}

impl QueueStats {
    /// Count a completion and fold its duration into the running mean.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_completion(&mut self, elapsed: Duration) {
        self.total_completed += 1;
        let n = self.total_completed as f64;
        let sample = elapsed.as_secs_f64() * 1000.0;
        self.average_execution_ms += (sample - self.average_execution_ms) / n;
    }
}
