//! Error types for queue, scheduler, and control operations.

use thiserror::Error;

use crate::core::task::{TaskId, TaskKind, TaskStatus};

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A raw task kind string did not match any known kind.
    #[error("unknown task kind: {0}")]
    UnknownKind(String),
    /// The kind is known but no executor was registered for it.
    #[error("no executor registered for task kind `{0}`")]
    UnregisteredKind(TaskKind),
    /// A schedule definition or patch was malformed.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
    /// Queue is at its configured depth.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// No queued, running, or recent task carries this id.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    /// No schedule carries this id.
    #[error("schedule not found: {0}")]
    ScheduleNotFound(uuid::Uuid),
    /// A status change that the task state machine does not allow.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Status the task was in.
        from: TaskStatus,
        /// Status that was requested.
        to: TaskStatus,
    },
    /// The system probe could not produce a snapshot.
    #[error("telemetry error: {0}")]
    Telemetry(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
