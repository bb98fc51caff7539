//! Priority queue seam used by the sequencer.

use crate::core::task::{Task, TaskId};
use crate::core::SchedulerError;

/// Abstraction for pending-task storage.
///
/// Ordering contract: ascending `priority`, then earliest `created_at`, then
/// insertion order. Implementations only hold `Queued` tasks.
pub trait TaskQueue: Send {
    /// Add a new task, rejecting it when the queue is at `max_depth`.
    fn enqueue(&mut self, task: Task) -> Result<(), SchedulerError>;
    /// Put back a task after a failed attempt. Not subject to `max_depth`,
    /// since the task held a slot before it was dequeued.
    fn requeue(&mut self, task: Task) -> Result<(), SchedulerError>;
    /// Remove and return the highest-priority task.
    fn dequeue(&mut self) -> Result<Option<Task>, SchedulerError>;
    /// Remove a specific task.
    fn remove(&mut self, id: TaskId) -> Option<Task>;
    /// Remove every task, returned in dequeue order.
    fn drain(&mut self) -> Vec<Task>;
    /// Copies of the queued tasks in dequeue order.
    fn snapshot(&self) -> Vec<Task>;
    /// Maximum depth allowed for this queue.
    fn max_depth(&self) -> usize;
    /// Current depth.
    fn len(&self) -> usize;
    /// Whether nothing is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
