//! Query/control facade over the sequencer and scheduler.
//!
//! Every operation works on in-memory state and returns immediately; none of
//! them triggers a sequencer tick. Transports (HTTP, RPC, CLI) wrap this type.

use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::core::{
    EnqueueOptions, NewSchedule, QueueStats, ScheduleDefinition, ScheduleId, SchedulePatch,
    ScheduleTick, Scheduler, SchedulerError, Sequencer, Task, TaskId, TaskKind, TelemetrySnapshot,
    TickOutcome,
};
use crate::util::clock;

/// Read-only view of the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Task currently executing.
    pub running: Option<Task>,
    /// How long the running task has been executing.
    pub running_for_ms: Option<u64>,
    /// Queued tasks in dequeue order.
    pub queued: Vec<Task>,
    /// Recently finished tasks, most recent first.
    pub recently_completed: Vec<Task>,
    /// Cumulative counters.
    pub stats: QueueStats,
    /// Fresh telemetry, absent when the probe failed.
    pub telemetry: Option<TelemetrySnapshot>,
    /// Whether the sequencer is paused.
    pub paused: bool,
}

/// A sequencer, a scheduler feeding it, and the periods the driver runs them at.
#[derive(Debug)]
pub struct ScanQueue {
    sequencer: Arc<Sequencer>,
    scheduler: Scheduler,
    tick_interval: Duration,
    schedule_interval: Duration,
}

impl ScanQueue {
    /// Wrap a sequencer. Calendar cadences are computed in `timezone`.
    pub fn new(sequencer: Sequencer, timezone: Tz) -> Self {
        let sequencer = Arc::new(sequencer);
        Self {
            scheduler: Scheduler::new(Arc::clone(&sequencer), timezone),
            sequencer,
            tick_interval: Duration::from_secs(10),
            schedule_interval: Duration::from_secs(60),
        }
    }

    /// Override the driver periods.
    #[must_use]
    pub const fn with_intervals(mut self, tick: Duration, schedule: Duration) -> Self {
        self.tick_interval = tick;
        self.schedule_interval = schedule;
        self
    }

    /// Sequencer tick period.
    pub const fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Scheduler tick period.
    pub const fn schedule_interval(&self) -> Duration {
        self.schedule_interval
    }

    /// Underlying sequencer.
    pub const fn sequencer(&self) -> &Arc<Sequencer> {
        &self.sequencer
    }

    /// Underlying scheduler.
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Queue a task. Priority is the override, the configured kind priority,
    /// or the kind default, in that order.
    pub fn enqueue(
        &self,
        kind: TaskKind,
        deep: bool,
        options: EnqueueOptions,
    ) -> Result<TaskId, SchedulerError> {
        self.sequencer.enqueue(kind, deep, options)
    }

    /// Queue a task from a raw kind name, rejecting unknown names.
    pub fn enqueue_str(
        &self,
        kind: &str,
        deep: bool,
        options: EnqueueOptions,
    ) -> Result<TaskId, SchedulerError> {
        self.enqueue(kind.parse()?, deep, options)
    }

    /// Cancel a queued task. `false` when it is running or unknown.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.sequencer.cancel(id)
    }

    /// Cancel every queued task and return how many were canceled.
    pub fn clear_queue(&self) -> usize {
        self.sequencer.clear_queue()
    }

    /// Stop starting new tasks. Enqueueing and scheduling continue.
    pub fn pause(&self) {
        self.sequencer.pause();
    }

    /// Resume starting tasks.
    pub fn resume(&self) {
        self.sequencer.resume();
    }

    /// Whether the sequencer is paused.
    pub fn is_paused(&self) -> bool {
        self.sequencer.is_paused()
    }

    /// Snapshot of queue state plus a fresh telemetry sample.
    pub fn status(&self) -> QueueStatus {
        let snapshot = self.sequencer.snapshot();
        let running_for_ms = snapshot
            .running
            .as_ref()
            .and_then(|t| t.started_at)
            .map(|started| clock::elapsed_ms(started, clock::now()));
        QueueStatus {
            running: snapshot.running,
            running_for_ms,
            queued: snapshot.queued,
            recently_completed: snapshot.recently_completed,
            stats: snapshot.stats,
            telemetry: self.sequencer.telemetry().ok(),
            paused: snapshot.paused,
        }
    }

    /// A running, queued or recently finished task.
    pub fn task(&self, id: TaskId) -> Result<Task, SchedulerError> {
        self.sequencer.find(id).ok_or(SchedulerError::TaskNotFound(id))
    }

    /// Run one sequencer step.
    pub async fn tick(&self) -> TickOutcome {
        self.sequencer.tick().await
    }

    /// Fire due schedules.
    pub fn run_schedules(&self) -> ScheduleTick {
        self.scheduler.tick_at(clock::now())
    }

    /// Register a recurring schedule.
    pub fn create_schedule(&self, new: NewSchedule) -> Result<ScheduleDefinition, SchedulerError> {
        self.scheduler.create(new)
    }

    /// Patch a schedule.
    pub fn update_schedule(
        &self,
        id: ScheduleId,
        patch: SchedulePatch,
    ) -> Result<ScheduleDefinition, SchedulerError> {
        self.scheduler.update(id, patch)
    }

    /// Remove a schedule.
    pub fn delete_schedule(&self, id: ScheduleId) -> Result<(), SchedulerError> {
        if self.scheduler.delete(id) {
            Ok(())
        } else {
            Err(SchedulerError::ScheduleNotFound(id))
        }
    }

    /// One schedule by id.
    pub fn schedule(&self, id: ScheduleId) -> Result<ScheduleDefinition, SchedulerError> {
        self.scheduler.get(id).ok_or(SchedulerError::ScheduleNotFound(id))
    }

    /// All schedules in creation order.
    pub fn list_schedules(&self) -> Vec<ScheduleDefinition> {
        self.scheduler.list()
    }
}
