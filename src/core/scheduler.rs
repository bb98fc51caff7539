//! Recurring schedules that feed the sequencer.
//!
//! Each definition carries a `next_run` cursor. On every scheduler tick, enabled
//! definitions with `next_run <= now` produce one task and get a new cursor
//! computed from `now`, not from the old cursor, so a stalled process does
//! not replay missed runs when it catches up.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::sequencer::Sequencer;
use crate::core::task::{EnqueueOptions, Priority, Task, TaskKind, TaskSource};
use crate::core::SchedulerError;

/// Schedule identifier.
pub type ScheduleId = Uuid;

/// How often a schedule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// One hour after the last computation.
    Hourly,
    /// Next midnight.
    Daily,
    /// Next Monday midnight.
    Weekly,
    /// Midnight on the first of next month.
    Monthly,
    /// Driven by a cron expression.
    Custom,
}

/// A recurring task template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDefinition {
    /// Identifier.
    pub id: ScheduleId,
    /// Kind of task produced.
    pub task_kind: TaskKind,
    /// Produce deep scans.
    pub deep: bool,
    /// Cadence.
    pub frequency: Frequency,
    /// Cron expression, used when `frequency` is `Custom`.
    pub custom_cadence: Option<String>,
    /// When the schedule last fired.
    pub last_run: Option<DateTime<Utc>>,
    /// When the schedule fires next.
    pub next_run: DateTime<Utc>,
    /// Disabled schedules are skipped and keep their cursor.
    pub enabled: bool,
    /// Priority for produced tasks; kind default when absent.
    pub priority_override: Option<Priority>,
    /// Labels copied onto produced tasks.
    pub tags: Vec<String>,
    /// Persist results of produced tasks.
    pub persist_results: bool,
    /// Free-form description.
    pub description: Option<String>,
}

/// Fields for a new schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSchedule {
    /// Kind of task produced.
    pub task_kind: TaskKind,
    /// Produce deep scans.
    #[serde(default)]
    pub deep: bool,
    /// Cadence.
    pub frequency: Frequency,
    /// Cron expression, required when `frequency` is `Custom`.
    #[serde(default)]
    pub custom_cadence: Option<String>,
    /// Start enabled.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Priority for produced tasks.
    #[serde(default)]
    pub priority_override: Option<Priority>,
    /// Labels copied onto produced tasks.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Persist results of produced tasks.
    #[serde(default)]
    pub persist_results: bool,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

const fn enabled_by_default() -> bool {
    true
}

impl NewSchedule {
    /// Enabled schedule with no overrides.
    pub const fn new(task_kind: TaskKind, frequency: Frequency) -> Self {
        Self {
            task_kind,
            deep: false,
            frequency,
            custom_cadence: None,
            enabled: true,
            priority_override: None,
            tags: Vec::new(),
            persist_results: false,
            description: None,
        }
    }
}

/// Partial update; `None` leaves a field unchanged.
///
/// The nullable fields take `Some(None)` to clear them. In JSON an explicit
/// `null` clears and an absent key leaves the field alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulePatch {
    /// New kind.
    pub task_kind: Option<TaskKind>,
    /// New deep flag.
    pub deep: Option<bool>,
    /// New cadence.
    pub frequency: Option<Frequency>,
    /// New cron expression.
    pub custom_cadence: Option<String>,
    /// Enable or disable.
    pub enabled: Option<bool>,
    /// New priority override, or `Some(None)` to fall back to the kind priority.
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub priority_override: Option<Option<Priority>>,
    /// Replace tags.
    pub tags: Option<Vec<String>>,
    /// New persistence flag.
    pub persist_results: Option<bool>,
    /// New description, or `Some(None)` to remove it.
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

/// Maps a key that is present, `null` included, to `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Counts from one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTick {
    /// Due schedules that fired.
    pub fired: usize,
    /// Tasks accepted by the queue.
    pub enqueued: usize,
    /// Tasks dropped because the queue was full.
    pub rejected: usize,
}

/// Parse a cron expression, accepting the 5-field form by prepending seconds.
pub fn parse_cadence(expr: &str) -> Result<Schedule, SchedulerError> {
    let trimmed = expr.trim();
    let parsed = if trimmed.split_whitespace().count() == 5 {
        Schedule::from_str(&format!("0 {trimmed}"))
    } else {
        Schedule::from_str(trimmed)
    };
    parsed.map_err(|e| SchedulerError::InvalidSchedule(format!("cadence `{expr}`: {e}")))
}

/// Compute the next due time after `now` for a cadence, in timezone `tz`.
///
/// An unparseable or exhausted custom cadence falls back to `now + 1 day`.
pub fn next_run_after(
    frequency: Frequency,
    custom_cadence: Option<&str>,
    now: DateTime<Utc>,
    tz: Tz,
) -> DateTime<Utc> {
    let local = now.with_timezone(&tz);
    let today = local.date_naive();
    match frequency {
        Frequency::Hourly => now + Duration::hours(1),
        Frequency::Daily => local_midnight(tz, today + Days::new(1)),
        Frequency::Weekly => {
            let ahead = 7 - u64::from(local.weekday().num_days_from_monday());
            local_midnight(tz, today + Days::new(ahead))
        }
        Frequency::Monthly => {
            let (year, month) = if today.month() == 12 {
                (today.year() + 1, 1)
            } else {
                (today.year(), today.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)
                .map_or_else(|| now + Duration::days(1), |first| local_midnight(tz, first))
        }
        Frequency::Custom => {
            let next = custom_cadence
                .ok_or_else(|| SchedulerError::InvalidSchedule("missing cadence".into()))
                .and_then(parse_cadence)
                .map(|schedule| next_cron_after(&schedule, &local));
            match next {
                Ok(Some(at)) => at,
                Ok(None) => now + Duration::days(1),
                Err(e) => {
                    warn!(error = %e, "unusable custom cadence, falling back to one day");
                    now + Duration::days(1)
                }
            }
        }
    }
}

fn next_cron_after(schedule: &Schedule, local: &DateTime<Tz>) -> Option<DateTime<Utc>> {
    schedule.after(local).next().map(|at| at.with_timezone(&Utc))
}

/// Start of `date` in `tz`: midnight, or the first valid local minute after
/// it when midnight falls in a DST gap.
fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::default());
    (0..24 * 60)
        .map(|minute| midnight + Duration::minutes(minute))
        .find_map(|naive| tz.from_local_datetime(&naive).earliest())
        .map_or_else(|| Utc.from_utc_datetime(&midnight), |at| at.with_timezone(&Utc))
}

fn validate_cadence(frequency: Frequency, cadence: Option<&str>) -> Result<(), SchedulerError> {
    if frequency != Frequency::Custom {
        return Ok(());
    }
    match cadence {
        Some(expr) if !expr.trim().is_empty() => parse_cadence(expr).map(|_| ()),
        _ => Err(SchedulerError::InvalidSchedule(
            "custom frequency requires a cadence expression".into(),
        )),
    }
}

/// Owns schedule definitions and enqueues their tasks when due.
pub struct Scheduler {
    sequencer: Arc<Sequencer>,
    timezone: Tz,
    schedules: Mutex<Vec<ScheduleDefinition>>,
}

impl Scheduler {
    /// Scheduler feeding `sequencer`, computing calendar cadences in `timezone`.
    pub const fn new(sequencer: Arc<Sequencer>, timezone: Tz) -> Self {
        Self {
            sequencer,
            timezone,
            schedules: Mutex::new(Vec::new()),
        }
    }

    /// Timezone used for calendar cadences.
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Register a schedule. `next_run` is computed from now.
    pub fn create(&self, new: NewSchedule) -> Result<ScheduleDefinition, SchedulerError> {
        self.create_at(new, Utc::now())
    }

    /// [`create`](Self::create) with an explicit clock.
    pub fn create_at(
        &self,
        new: NewSchedule,
        now: DateTime<Utc>,
    ) -> Result<ScheduleDefinition, SchedulerError> {
        if !self.sequencer.registry().contains(new.task_kind) {
            return Err(SchedulerError::UnregisteredKind(new.task_kind));
        }
        validate_cadence(new.frequency, new.custom_cadence.as_deref())?;

        let definition = ScheduleDefinition {
            id: Uuid::new_v4(),
            task_kind: new.task_kind,
            deep: new.deep,
            frequency: new.frequency,
            next_run: next_run_after(
                new.frequency,
                new.custom_cadence.as_deref(),
                now,
                self.timezone,
            ),
            custom_cadence: new.custom_cadence,
            last_run: None,
            enabled: new.enabled,
            priority_override: new.priority_override,
            tags: new.tags,
            persist_results: new.persist_results,
            description: new.description,
        };
        info!(
            schedule_id = %definition.id,
            kind = %definition.task_kind,
            frequency = ?definition.frequency,
            next_run = %definition.next_run,
            "schedule created"
        );
        self.schedules.lock().push(definition.clone());
        Ok(definition)
    }

    /// Apply a patch. `next_run` is recomputed when the cadence changes.
    pub fn update(
        &self,
        id: ScheduleId,
        patch: SchedulePatch,
    ) -> Result<ScheduleDefinition, SchedulerError> {
        self.update_at(id, patch, Utc::now())
    }

    /// [`update`](Self::update) with an explicit clock.
    pub fn update_at(
        &self,
        id: ScheduleId,
        patch: SchedulePatch,
        now: DateTime<Utc>,
    ) -> Result<ScheduleDefinition, SchedulerError> {
        let mut schedules = self.schedules.lock();
        let slot = schedules
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(SchedulerError::ScheduleNotFound(id))?;

        let mut updated = slot.clone();
        let cadence_changed = patch.frequency.is_some_and(|f| f != updated.frequency)
            || patch
                .custom_cadence
                .as_ref()
                .is_some_and(|c| updated.custom_cadence.as_ref() != Some(c));

        if let Some(kind) = patch.task_kind {
            if !self.sequencer.registry().contains(kind) {
                return Err(SchedulerError::UnregisteredKind(kind));
            }
            updated.task_kind = kind;
        }
        if let Some(deep) = patch.deep {
            updated.deep = deep;
        }
        if let Some(frequency) = patch.frequency {
            updated.frequency = frequency;
        }
        if let Some(cadence) = patch.custom_cadence {
            updated.custom_cadence = Some(cadence);
        }
        if let Some(enabled) = patch.enabled {
            updated.enabled = enabled;
        }
        if let Some(priority) = patch.priority_override {
            updated.priority_override = priority;
        }
        if let Some(tags) = patch.tags {
            updated.tags = tags;
        }
        if let Some(persist) = patch.persist_results {
            updated.persist_results = persist;
        }
        if let Some(description) = patch.description {
            updated.description = description;
        }

        validate_cadence(updated.frequency, updated.custom_cadence.as_deref())?;
        if cadence_changed {
            updated.next_run = next_run_after(
                updated.frequency,
                updated.custom_cadence.as_deref(),
                now,
                self.timezone,
            );
        }

        *slot = updated.clone();
        drop(schedules);
        info!(schedule_id = %id, next_run = %updated.next_run, "schedule updated");
        Ok(updated)
    }

    /// Remove a schedule. Returns `false` if it did not exist.
    pub fn delete(&self, id: ScheduleId) -> bool {
        let mut schedules = self.schedules.lock();
        let before = schedules.len();
        schedules.retain(|s| s.id != id);
        let removed = schedules.len() != before;
        drop(schedules);
        if removed {
            info!(schedule_id = %id, "schedule deleted");
        }
        removed
    }

    /// All schedules in creation order.
    pub fn list(&self) -> Vec<ScheduleDefinition> {
        self.schedules.lock().clone()
    }

    /// One schedule by id.
    pub fn get(&self, id: ScheduleId) -> Option<ScheduleDefinition> {
        self.schedules.lock().iter().find(|s| s.id == id).cloned()
    }

    /// Fire due schedules against the wall clock.
    pub fn tick(&self) -> ScheduleTick {
        self.tick_at(Utc::now())
    }

    /// Fire every enabled schedule with `next_run <= now`.
    ///
    /// Tasks are built and cursors advanced under the schedule lock; the lock
    /// is released before the tasks are handed to the sequencer. A full queue
    /// drops the task with a warning and the cursor still advances.
    pub fn tick_at(&self, now: DateTime<Utc>) -> ScheduleTick {
        let due: Vec<(Uuid, Task)> = {
            let mut schedules = self.schedules.lock();
            schedules
                .iter_mut()
                .filter(|s| s.enabled && s.next_run <= now)
                .map(|schedule| {
                    schedule.last_run = Some(now);
                    schedule.next_run = next_run_after(
                        schedule.frequency,
                        schedule.custom_cadence.as_deref(),
                        now,
                        self.timezone,
                    );
                    (schedule.id, self.task_for(schedule, now))
                })
                .collect()
        };

        let mut tick = ScheduleTick {
            fired: due.len(),
            ..ScheduleTick::default()
        };
        for (schedule_id, task) in due {
            let kind = task.kind;
            match self.sequencer.submit(task) {
                Ok(task_id) => {
                    tick.enqueued += 1;
                    debug!(%schedule_id, %task_id, kind = %kind, "scheduled task enqueued");
                }
                Err(SchedulerError::QueueFull(reason)) => {
                    tick.rejected += 1;
                    self.sequencer.note_rejected();
                    warn!(
                        %schedule_id,
                        kind = %kind,
                        %reason,
                        "queue full, dropping scheduled task"
                    );
                }
                Err(e) => {
                    tick.rejected += 1;
                    warn!(
                        %schedule_id,
                        kind = %kind,
                        error = %e,
                        "failed to enqueue scheduled task"
                    );
                }
            }
        }
        if tick.fired > 0 {
            info!(
                fired = tick.fired,
                enqueued = tick.enqueued,
                rejected = tick.rejected,
                "schedules fired"
            );
        }
        tick
    }

    fn task_for(&self, schedule: &ScheduleDefinition, now: DateTime<Utc>) -> Task {
        let priority = self
            .sequencer
            .resolve_priority(schedule.task_kind, schedule.priority_override);
        let options = EnqueueOptions::new()
            .with_source(TaskSource::Scheduled)
            .with_tags(schedule.tags.iter().cloned())
            .with_persist_results(schedule.persist_results);
        Task::new(schedule.task_kind, schedule.deep, priority, options, now)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("timezone", &self.timezone)
            .field("schedules", &self.schedules.lock().len())
            .finish_non_exhaustive()
    }
}
