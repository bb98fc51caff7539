//! Task lifecycle audit trail.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::task::{Task, TaskId, TaskKind};

/// Lifecycle step being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Accepted into the queue.
    Enqueued,
    /// Dequeued and started.
    Started,
    /// Finished successfully.
    Completed,
    /// Failed and put back in the queue.
    Retried,
    /// Failed permanently.
    Failed,
    /// Canceled while queued.
    Canceled,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Enqueued => "enqueued",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Retried => "retried",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Related task.
    pub task_id: TaskId,
    /// Task kind.
    pub kind: TaskKind,
    /// What happened.
    pub action: AuditAction,
    /// Attempt number at the time of the event (0 before the first failure).
    pub retry_count: u32,
    /// When it happened.
    pub at: DateTime<Utc>,
    /// Additional context, such as an error message.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
///
/// Clones share one buffer: keep a clone and box the other into the
/// sequencer to read the trail back.
#[derive(Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Helper to build an audit event from a task.
pub fn build_audit_event(task: &Task, action: AuditAction, detail: Option<String>) -> AuditEvent {
    AuditEvent {
        task_id: task.id,
        kind: task.kind,
        action,
        retry_count: task.retry_count,
        at: Utc::now(),
        detail,
    }
}
