//! Single-flight sequencer: admission-gated, priority-ordered execution with bounded retry.
//!
//! Each [`tick`](Sequencer::tick) runs at most one task to completion:
//!
//! 1. Skip if paused, if another tick is in progress, if a task is running,
//!    or if the queue is empty.
//! 2. Sample telemetry and consult admission control; defer if any
//!    threshold is exceeded. Deferred tasks stay queued untouched.
//! 3. Dequeue the highest-priority task and mark it running, atomically.
//! 4. Execute it on a spawned tokio task so that panics surface as a
//!    `JoinError` instead of unwinding through the tick.
//! 5. Complete, re-queue, or fail it, then clear the running slot.
//! 6. Persist the result of a completed task on the blocking pool.
//!
//! A tick dropped during step 4 aborts the execution and counts it as a
//! failed attempt.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::core::admission::{self, Admission, LimitingResource, ResourceThresholds};
use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::executor::ExecutorRegistry;
use crate::core::history::{QueueStats, RecentTasks};
use crate::core::probe::{SystemProbe, TelemetrySnapshot};
use crate::core::results::ResultStore;
use crate::core::task::{EnqueueOptions, Priority, ScanResult, Task, TaskId, TaskKind};
use crate::core::{SchedulerError, TaskQueue};

/// Tunables for the sequencer.
#[derive(Debug, Clone)]
pub struct SequencerSettings {
    /// Admission thresholds.
    pub thresholds: ResourceThresholds,
    /// Attempts before a task fails permanently.
    pub max_retries: u32,
    /// Capacity of the recently-finished ring buffer.
    pub history_capacity: usize,
    /// Abort executions running longer than this. `None` waits indefinitely.
    pub task_timeout: Option<Duration>,
    /// Per-kind overrides of the default priority.
    pub priorities: HashMap<TaskKind, Priority>,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            thresholds: ResourceThresholds::default(),
            max_retries: 3,
            history_capacity: 10,
            task_timeout: None,
            priorities: HashMap::new(),
        }
    }
}

/// What a tick did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Processing is paused.
    Paused,
    /// Another tick is in progress or a task is running.
    Busy,
    /// Nothing queued.
    Idle,
    /// Admission control refused; carries the first violated threshold.
    Deferred {
        /// Threshold that was exceeded.
        reason: LimitingResource,
    },
    /// Telemetry could not be sampled; treated like a deferral.
    TelemetryUnavailable {
        /// Probe error.
        error: String,
    },
    /// The task completed.
    Completed {
        /// Task that ran.
        task_id: TaskId,
    },
    /// The task failed and was re-queued.
    Retried {
        /// Task that ran.
        task_id: TaskId,
        /// Failed attempts so far.
        retry_count: u32,
    },
    /// The task exhausted its retries.
    Failed {
        /// Task that ran.
        task_id: TaskId,
    },
}

/// Consistent copy of the sequencer's in-memory state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencerSnapshot {
    /// Task currently executing.
    pub running: Option<Task>,
    /// Queued tasks in dequeue order.
    pub queued: Vec<Task>,
    /// Recently finished tasks, most recent first.
    pub recently_completed: Vec<Task>,
    /// Cumulative counters.
    pub stats: QueueStats,
    /// Whether ticks are paused.
    pub paused: bool,
}

struct SequencerState {
    queue: Box<dyn TaskQueue>,
    running: Option<Task>,
    recent: RecentTasks,
    stats: QueueStats,
}

/// Resets the in-progress flag when a tick ends, however it ends.
struct TickGuard<'a>(&'a AtomicBool);

impl<'a> TickGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the running task between dequeue and settlement.
///
/// If the tick future is dropped mid-execution, the attempt is settled as a
/// failure so the running slot never stays occupied.
struct InFlight<'a> {
    sequencer: &'a Sequencer,
    task: Option<Task>,
    started: Instant,
}

impl<'a> InFlight<'a> {
    fn new(sequencer: &'a Sequencer, task: Task) -> Self {
        Self {
            sequencer,
            task: Some(task),
            started: Instant::now(),
        }
    }

    fn finish(mut self, outcome: Result<ScanResult, String>) -> (TickOutcome, Option<Task>) {
        match self.task.take() {
            Some(task) => self.sequencer.finish(task, outcome, self.started.elapsed()),
            None => (TickOutcome::Idle, None),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            warn!(task_id = %task.id, "tick dropped during execution");
            let outcome = Err("tick canceled during execution".to_string());
            self.sequencer.finish(task, outcome, self.started.elapsed());
        }
    }
}

/// Admission-controlled single-consumer task sequencer.
///
/// The queue, the running slot, the ring buffer and the statistics live
/// behind one `parking_lot::Mutex`; it is never held across an await.
pub struct Sequencer {
    settings: SequencerSettings,
    state: Mutex<SequencerState>,
    ticking: AtomicBool,
    paused: AtomicBool,
    registry: ExecutorRegistry,
    probe: Arc<dyn SystemProbe>,
    store: Option<ResultStore>,
    audit: Option<Mutex<Box<dyn AuditSink>>>,
}

impl Sequencer {
    /// Create a sequencer from its components.
    pub fn new(
        settings: SequencerSettings,
        queue: Box<dyn TaskQueue>,
        registry: ExecutorRegistry,
        probe: Arc<dyn SystemProbe>,
    ) -> Self {
        let recent = RecentTasks::new(settings.history_capacity);
        Self {
            settings,
            state: Mutex::new(SequencerState {
                queue,
                running: None,
                recent,
                stats: QueueStats::default(),
            }),
            ticking: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            registry,
            probe,
            store: None,
            audit: None,
        }
    }

    /// Persist results of tasks that ask for it.
    #[must_use]
    pub fn with_result_store(mut self, store: ResultStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Mutex::new(audit));
        self
    }

    /// Settings in effect.
    pub const fn settings(&self) -> &SequencerSettings {
        &self.settings
    }

    /// Registered executors.
    pub const fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Priority for `kind`: explicit override, then config, then the kind default.
    pub fn resolve_priority(&self, kind: TaskKind, requested: Option<Priority>) -> Priority {
        requested
            .or_else(|| self.settings.priorities.get(&kind).copied())
            .unwrap_or_else(|| kind.default_priority())
    }

    /// Create and queue a task. Does not trigger a tick.
    pub fn enqueue(
        &self,
        kind: TaskKind,
        deep: bool,
        options: EnqueueOptions,
    ) -> Result<TaskId, SchedulerError> {
        if !self.registry.contains(kind) {
            return Err(SchedulerError::UnregisteredKind(kind));
        }
        let priority = self.resolve_priority(kind, options.priority);
        self.submit(Task::new(kind, deep, priority, options, Utc::now()))
    }

    /// Queue an already-built task.
    pub fn submit(&self, task: Task) -> Result<TaskId, SchedulerError> {
        let id = task.id;
        let event = self
            .audit
            .is_some()
            .then(|| build_audit_event(&task, AuditAction::Enqueued, None));
        let (kind, priority, source) = (task.kind, task.priority, task.source);
        {
            let mut state = self.state.lock();
            state.queue.enqueue(task)?;
            state.stats.total_enqueued += 1;
        }
        info!(task_id = %id, kind = %kind, priority, ?source, "task enqueued");
        self.record(event);
        Ok(id)
    }

    /// Cancel a queued task. Returns `false` if it is running or unknown.
    pub fn cancel(&self, id: TaskId) -> bool {
        let canceled = {
            let mut state = self.state.lock();
            if state.running.as_ref().is_some_and(|t| t.id == id) {
                debug!(task_id = %id, "cannot cancel running task");
                return false;
            }
            let Some(mut task) = state.queue.remove(id) else {
                return false;
            };
            if let Err(e) = task.cancel(Utc::now()) {
                error!(task_id = %id, error = %e, "queued task in unexpected state");
                return false;
            }
            state.stats.total_canceled += 1;
            state.recent.push(task.clone());
            task
        };
        info!(task_id = %id, kind = %canceled.kind, "task canceled");
        self.record_for(&canceled, AuditAction::Canceled, None);
        true
    }

    /// Cancel every queued task. The running task is untouched.
    pub fn clear_queue(&self) -> usize {
        let now = Utc::now();
        let canceled: Vec<Task> = {
            let mut state = self.state.lock();
            let mut canceled = Vec::new();
            for mut task in state.queue.drain() {
                if let Err(e) = task.cancel(now) {
                    error!(task_id = %task.id, error = %e, "queued task in unexpected state");
                    continue;
                }
                canceled.push(task);
            }
            state.stats.total_canceled += canceled.len() as u64;
            for task in &canceled {
                state.recent.push(task.clone());
            }
            canceled
        };
        if !canceled.is_empty() {
            info!(count = canceled.len(), "queue cleared");
        }
        for task in &canceled {
            self.record_for(task, AuditAction::Canceled, None);
        }
        canceled.len()
    }

    /// Stop starting new tasks. A task already running is unaffected.
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::AcqRel) {
            info!("sequencer paused");
        }
    }

    /// Resume starting tasks.
    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::AcqRel) {
            info!("sequencer resumed");
        }
    }

    /// Whether ticks are paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Read-only copy of queue, running slot, history and stats.
    pub fn snapshot(&self) -> SequencerSnapshot {
        let state = self.state.lock();
        SequencerSnapshot {
            running: state.running.clone(),
            queued: state.queue.snapshot(),
            recently_completed: state.recent.snapshot(),
            stats: state.stats.clone(),
            paused: self.is_paused(),
        }
    }

    /// Number of queued tasks.
    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Look a task up in the running slot, the queue, then recent history.
    pub fn find(&self, id: TaskId) -> Option<Task> {
        let state = self.state.lock();
        if let Some(task) = state.running.as_ref().filter(|t| t.id == id) {
            return Some(task.clone());
        }
        if let Some(task) = state.queue.snapshot().into_iter().find(|t| t.id == id) {
            return Some(task);
        }
        state.recent.find(id).cloned()
    }

    /// Fresh telemetry reading that leaves the admission baseline alone.
    pub fn telemetry(&self) -> Result<TelemetrySnapshot, SchedulerError> {
        self.probe.peek()
    }

    /// Count a scheduler-originated task dropped on overflow.
    pub(crate) fn note_rejected(&self) {
        self.state.lock().stats.total_rejected += 1;
    }

    /// Run one sequencing step. Never returns an error: execution failures
    /// become retries or permanent failures on the task itself.
    pub async fn tick(&self) -> TickOutcome {
        if self.is_paused() {
            return TickOutcome::Paused;
        }
        let Some(_guard) = TickGuard::acquire(&self.ticking) else {
            return TickOutcome::Busy;
        };

        {
            let state = self.state.lock();
            if state.running.is_some() {
                return TickOutcome::Busy;
            }
            if state.queue.is_empty() {
                return TickOutcome::Idle;
            }
        }

        match self.probe.sample() {
            Ok(snapshot) => {
                let verdict = admission::check(&snapshot, &self.settings.thresholds);
                if let Admission::Defer(reason) = verdict {
                    self.state.lock().stats.total_deferred += 1;
                    debug!(%reason, "insufficient headroom, deferring");
                    return TickOutcome::Deferred { reason };
                }
            }
            Err(e) => {
                self.state.lock().stats.total_deferred += 1;
                warn!(error = %e, "telemetry unavailable, deferring");
                return TickOutcome::TelemetryUnavailable {
                    error: e.to_string(),
                };
            }
        }

        let Some(task) = self.start_next() else {
            return TickOutcome::Idle;
        };
        self.record_for(&task, AuditAction::Started, None);

        let (kind, deep) = (task.kind, task.deep);
        let in_flight = InFlight::new(self, task);
        let result = self.execute(kind, deep).await;
        let (outcome, completed) = in_flight.finish(result);

        if let Some(task) = completed {
            self.persist(task).await;
        }
        outcome
    }

    /// Dequeue and mark running under a single lock acquisition.
    fn start_next(&self) -> Option<Task> {
        let mut state = self.state.lock();
        let mut task = match state.queue.dequeue() {
            Ok(Some(task)) => task,
            Ok(None) => return None,
            Err(e) => {
                error!(error = %e, "failed to dequeue");
                return None;
            }
        };
        if let Err(e) = task.start(Utc::now()) {
            error!(task_id = %task.id, error = %e, "dequeued task in unexpected state");
            return None;
        }
        state.running = Some(task.clone());
        drop(state);

        info!(
            task_id = %task.id,
            kind = %task.kind,
            deep = task.deep,
            attempt = task.retry_count + 1,
            "task started"
        );
        Some(task)
    }

    /// Run the executor for `kind` on its own task. Dropping the returned
    /// future aborts the execution.
    async fn execute(&self, kind: TaskKind, deep: bool) -> Result<ScanResult, String> {
        let executor = self.registry.get(kind).map_err(|e| e.to_string())?;
        let mut execution = JoinSet::new();
        execution.spawn(async move { executor.execute(deep).await });

        let joined = match self.settings.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, execution.join_next()).await {
                Ok(joined) => joined,
                Err(_) => {
                    return Err(format!("execution timed out after {}s", limit.as_secs_f64()));
                }
            },
            None => execution.join_next().await,
        };

        match joined {
            Some(Ok(Ok(result))) => Ok(result),
            Some(Ok(Err(e))) => Err(format!("{e:#}")),
            Some(Err(e)) if e.is_panic() => Err("executor panicked".to_string()),
            Some(Err(e)) => Err(format!("execution aborted: {e}")),
            None => Err("execution vanished".to_string()),
        }
    }

    /// Settle the running task and clear the slot. A completed task is
    /// handed back for persistence.
    fn finish(
        &self,
        mut task: Task,
        outcome: Result<ScanResult, String>,
        elapsed: Duration,
    ) -> (TickOutcome, Option<Task>) {
        let now = Utc::now();
        let id = task.id;
        let mut state = self.state.lock();
        state.running = None;

        match outcome {
            Ok(result) => {
                if let Err(e) = task.complete(result, now) {
                    error!(task_id = %id, error = %e, "running task in unexpected state");
                    return (TickOutcome::Idle, None);
                }
                state.stats.record_completion(elapsed);
                state.recent.push(task.clone());
                drop(state);

                info!(
                    task_id = %id,
                    kind = %task.kind,
                    elapsed_ms = elapsed.as_millis(),
                    "task completed"
                );
                self.record_for(&task, AuditAction::Completed, None);
                (TickOutcome::Completed { task_id: id }, Some(task))
            }
            Err(message) => match task.fail_attempt(&message, self.settings.max_retries, now) {
                Ok(true) => {
                    state.stats.total_retries += 1;
                    let retry_count = task.retry_count;
                    let event = self
                        .audit
                        .is_some()
                        .then(|| {
                            build_audit_event(&task, AuditAction::Retried, Some(message.clone()))
                        });
                    if let Err(e) = state.queue.requeue(task) {
                        error!(task_id = %id, error = %e, "failed to re-queue task");
                    }
                    drop(state);

                    warn!(task_id = %id, retry_count, error = %message, "task failed, re-queued");
                    self.record(event);
                    (TickOutcome::Retried { task_id: id, retry_count }, None)
                }
                Ok(false) => {
                    state.stats.total_failed += 1;
                    state.recent.push(task.clone());
                    drop(state);

                    warn!(
                        task_id = %id,
                        kind = %task.kind,
                        retry_count = task.retry_count,
                        error = %message,
                        "task failed permanently"
                    );
                    self.record_for(&task, AuditAction::Failed, Some(message));
                    (TickOutcome::Failed { task_id: id }, None)
                }
                Err(e) => {
                    error!(task_id = %id, error = %e, "running task in unexpected state");
                    (TickOutcome::Idle, None)
                }
            },
        }
    }

    /// Best-effort write on the blocking pool; failures are logged only.
    async fn persist(&self, task: Task) {
        if !task.persist_results {
            return;
        }
        let Some(store) = self.store.clone() else {
            debug!(task_id = %task.id, "no result store configured, skipping persistence");
            return;
        };
        let id = task.id;
        match tokio::task::spawn_blocking(move || store.persist(&task)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(task_id = %id, error = %e, "failed to persist scan result"),
            Err(e) => warn!(task_id = %id, error = %e, "result persistence task failed"),
        }
    }

    fn record_for(&self, task: &Task, action: AuditAction, detail: Option<String>) {
        if self.audit.is_some() {
            self.record(Some(build_audit_event(task, action, detail)));
        }
    }

    fn record(&self, event: Option<crate::core::AuditEvent>) {
        if let (Some(sink), Some(event)) = (&self.audit, event) {
            sink.lock().record(event);
        }
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}
