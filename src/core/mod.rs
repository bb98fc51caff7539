//! Domain model, admission control, sequencing and scheduling.

pub mod admission;
pub mod audit;
pub mod error;
pub mod executor;
pub mod history;
pub mod probe;
pub mod queue;
pub mod results;
pub mod scheduler;
pub mod sequencer;
pub mod task;

pub use admission::{Admission, LimitingResource, ResourceThresholds};
pub use audit::{AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, build_audit_event};
pub use error::{AppResult, SchedulerError};
pub use executor::{ExecutorRegistry, ScanExecutor};
pub use history::{QueueStats, RecentTasks};
pub use probe::{SystemProbe, TelemetrySnapshot};
pub use queue::TaskQueue;
pub use results::{ResultBackend, ResultRecord, ResultStore, StoreArea, record_key};
pub use scheduler::{
    Frequency, NewSchedule, ScheduleDefinition, ScheduleId, SchedulePatch, ScheduleTick, Scheduler,
    next_run_after, parse_cadence,
};
pub use sequencer::{Sequencer, SequencerSettings, SequencerSnapshot, TickOutcome};
pub use task::{
    EnqueueOptions, FindingCounts, Priority, ScanResult, Task, TaskId, TaskKind, TaskSource,
    TaskStatus,
};
