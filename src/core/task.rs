//! Task model: kinds, lifecycle status, results, and transition guards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::SchedulerError;

/// Opaque task identifier.
pub type TaskId = Uuid;

/// Numeric priority. Lower values are dequeued first.
pub type Priority = u8;

/// Category of scan work. Each kind carries a default priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Core application security checks.
    Core,
    /// Repository-wide secret pattern search.
    Secrets,
    /// HTTP security header checks.
    Headers,
    /// Third-party dependency audit.
    Dependency,
    /// Payment-data handling heuristics.
    Payment,
}

impl TaskKind {
    /// Every kind, in default-priority order.
    pub const ALL: [Self; 5] = [
        Self::Core,
        Self::Secrets,
        Self::Headers,
        Self::Dependency,
        Self::Payment,
    ];

    /// Priority applied when neither config nor caller overrides it.
    pub const fn default_priority(self) -> Priority {
        match self {
            Self::Core => 1,
            Self::Secrets => 2,
            Self::Headers => 3,
            Self::Dependency => 4,
            Self::Payment => 5,
        }
    }

    /// Stable lowercase name, used in logs and result-store keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Secrets => "secrets",
            Self::Headers => "headers",
            Self::Dependency => "dependency",
            Self::Payment => "payment",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SchedulerError::UnknownKind(s.to_string()))
    }
}

/// Status of a task in the queue lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the priority queue.
    Queued,
    /// Currently executing. At most one task holds this status.
    Running,
    /// Finished successfully.
    Completed,
    /// Retries exhausted.
    Failed,
    /// Removed from the queue before it ran.
    Canceled,
}

impl TaskStatus {
    /// Whether no further transitions are possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Transitions permitted by the lifecycle state machine.
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Queued, Self::Running | Self::Canceled)
                | (Self::Running, Self::Completed | Self::Failed | Self::Queued)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Where a task came from. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    /// Requested by an operator.
    #[default]
    Manual,
    /// Produced by a recurring schedule.
    Scheduled,
    /// Raised by the system itself.
    System,
    /// Requested through an external API client.
    Api,
    /// Triggered by an inbound webhook.
    Webhook,
}

/// Finding counts by severity bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingCounts {
    /// Critical findings.
    pub critical: u32,
    /// High severity findings.
    pub high: u32,
    /// Medium severity findings.
    pub medium: u32,
    /// Low severity findings.
    pub low: u32,
}

impl FindingCounts {
    /// Sum across all buckets.
    pub const fn total(&self) -> u32 {
        self.critical + self.high + self.medium + self.low
    }
}

/// Outcome of a successful scan execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Findings by severity.
    pub findings: FindingCounts,
    /// Checks that passed.
    pub checks_passed: u32,
    /// Checks that ran.
    pub checks_total: u32,
    /// Wall time reported by the scan, in milliseconds.
    pub duration_ms: u64,
    /// Kind-specific detail payload.
    #[serde(default)]
    pub details: serde_json::Value,
}

/// Caller-supplied options for a new task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnqueueOptions {
    /// Overrides the kind's default priority.
    pub priority: Option<Priority>,
    /// Provenance tag.
    pub source: TaskSource,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Write a successful result to the result store.
    pub persist_results: bool,
}

impl EnqueueOptions {
    /// Options with defaults: kind priority, manual source, no tags, no persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the priority.
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the provenance tag.
    pub const fn with_source(mut self, source: TaskSource) -> Self {
        self.source = source;
        self
    }

    /// Attach labels.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Persist a successful result.
    pub const fn with_persist_results(mut self, persist: bool) -> Self {
        self.persist_results = persist;
        self
    }
}

/// A unit of scheduled scan work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, fixed at creation.
    pub id: TaskId,
    /// Scan category.
    pub kind: TaskKind,
    /// Run the thorough variant of the scan.
    pub deep: bool,
    /// Queue ordering key; lower runs first.
    pub priority: Priority,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the latest attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failed attempts so far.
    pub retry_count: u32,
    /// Last failure message.
    pub error: Option<String>,
    /// Provenance tag.
    pub source: TaskSource,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Write a successful result to the result store.
    pub persist_results: bool,
    /// Present once the task has completed.
    pub result: Option<ScanResult>,
}

impl Task {
    /// Create a queued task. `priority` is the already-resolved priority.
    pub fn new(
        kind: TaskKind,
        deep: bool,
        priority: Priority,
        options: EnqueueOptions,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            deep,
            priority,
            status: TaskStatus::Queued,
            created_at: now,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            error: None,
            source: options.source,
            tags: options.tags,
            persist_results: options.persist_results,
            result: None,
        }
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), SchedulerError> {
        if !self.status.can_transition_to(to) {
            return Err(SchedulerError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// `Queued -> Running`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.transition(TaskStatus::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// `Running -> Completed`.
    pub fn complete(
        &mut self,
        result: ScanResult,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        self.transition(TaskStatus::Completed)?;
        self.completed_at = Some(now);
        self.result = Some(result);
        Ok(())
    }

    /// Record a failed attempt. Returns `true` when the task went back to
    /// `Queued`, `false` when retries are exhausted and it is now `Failed`.
    pub fn fail_attempt(
        &mut self,
        error: impl Into<String>,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Result<bool, SchedulerError> {
        let next = if self.retry_count + 1 < max_retries {
            TaskStatus::Queued
        } else {
            TaskStatus::Failed
        };
        self.transition(next)?;
        self.retry_count += 1;
        self.error = Some(error.into());
        if next == TaskStatus::Failed {
            self.completed_at = Some(now);
            return Ok(false);
        }
        Ok(true)
    }

    /// `Queued -> Canceled`.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.transition(TaskStatus::Canceled)?;
        self.completed_at = Some(now);
        Ok(())
    }
}
