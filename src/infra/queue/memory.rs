//! In-memory priority queue.
//!
//! Backed by a binary heap, so push and pop are O(log n). Removing a single
//! task and taking a snapshot rebuild or sort a copy of the heap, which is
//! O(n log n); expected depth is tens of tasks, so that cost is accepted in
//! exchange for keeping the heap the single source of truth.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::task::{Task, TaskId};
use crate::core::{SchedulerError, TaskQueue};

/// Heap entry: lower priority value first, then older, then earlier insert.
struct QueuedTask {
    task: Task,
    seq: u64,
}

impl QueuedTask {
    fn key(&self) -> (u8, chrono::DateTime<chrono::Utc>, u64) {
        (self.task.priority, self.task.created_at, self.seq)
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap and the smallest key must pop first.
        other.key().cmp(&self.key())
    }
}

/// In-memory queue storing tasks in a priority heap.
pub struct InMemoryQueue {
    max_depth: usize,
    next_seq: u64,
    tasks: BinaryHeap<QueuedTask>,
}

impl InMemoryQueue {
    /// Create a new in-memory queue with a maximum depth.
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            next_seq: 0,
            tasks: BinaryHeap::with_capacity(max_depth.min(1024)),
        }
    }

    fn push(&mut self, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.push(QueuedTask { task, seq });
    }

    fn sorted(&self) -> Vec<&QueuedTask> {
        let mut entries: Vec<_> = self.tasks.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries
    }
}

impl TaskQueue for InMemoryQueue {
    fn enqueue(&mut self, task: Task) -> Result<(), SchedulerError> {
        if self.len() >= self.max_depth() {
            return Err(SchedulerError::QueueFull(format!(
                "max queue depth {} reached",
                self.max_depth
            )));
        }
        self.push(task);
        Ok(())
    }

    fn requeue(&mut self, task: Task) -> Result<(), SchedulerError> {
        self.push(task);
        Ok(())
    }

    fn dequeue(&mut self) -> Result<Option<Task>, SchedulerError> {
        Ok(self.tasks.pop().map(|entry| entry.task))
    }

    fn remove(&mut self, id: TaskId) -> Option<Task> {
        if !self.tasks.iter().any(|entry| entry.task.id == id) {
            return None;
        }
        let mut removed = None;
        let entries: Vec<_> = self.tasks.drain().collect();
        self.tasks = entries
            .into_iter()
            .filter_map(|entry| {
                if entry.task.id == id {
                    removed = Some(entry.task);
                    None
                } else {
                    Some(entry)
                }
            })
            .collect();
        removed
    }

    fn drain(&mut self) -> Vec<Task> {
        let mut out = Vec::with_capacity(self.tasks.len());
        while let Some(entry) = self.tasks.pop() {
            out.push(entry.task);
        }
        out
    }

    fn snapshot(&self) -> Vec<Task> {
        self.sorted().into_iter().map(|entry| entry.task.clone()).collect()
    }

    fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }
}
