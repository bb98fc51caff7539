//! Result store front-end: turns finished tasks into keyed JSON records.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::task::Task;
use crate::core::SchedulerError;

/// Which part of the store a record is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreArea {
    /// Latest results, may be overwritten or pruned by operators.
    Current,
    /// Append-only archive; a key is never rewritten.
    History,
}

impl StoreArea {
    /// Directory or namespace name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::History => "history",
        }
    }
}

impl fmt::Display for StoreArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable sink for serialized records.
pub trait ResultBackend: Send + Sync {
    /// Write `blob` under `key` in `area`.
    fn put(&self, area: StoreArea, key: &str, blob: &str) -> Result<(), SchedulerError>;
}

/// What gets persisted for a completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Storage key, `<timestamp>_<kind>_<id>`.
    pub key: String,
    /// When the record was written.
    pub persisted_at: DateTime<Utc>,
    /// Task metadata and result.
    pub task: Task,
}

/// Build the storage key for a task. Keys sort chronologically.
pub fn record_key(task: &Task) -> String {
    let at = task.completed_at.unwrap_or(task.created_at);
    format!(
        "{}_{}_{}",
        at.format("%Y%m%dT%H%M%S%.3fZ"),
        task.kind,
        task.id.simple()
    )
}

/// Writes completed tasks to both store areas.
#[derive(Clone)]
pub struct ResultStore {
    backend: Arc<dyn ResultBackend>,
}

impl ResultStore {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn ResultBackend>) -> Self {
        Self { backend }
    }

    /// Serialize `task` and write it to the current and history areas.
    ///
    /// Both writes are attempted; the first error is returned. Returns the key.
    pub fn persist(&self, task: &Task) -> Result<String, SchedulerError> {
        let record = ResultRecord {
            key: record_key(task),
            persisted_at: Utc::now(),
            task: task.clone(),
        };
        let blob = serde_json::to_string_pretty(&record)
            .map_err(|e| SchedulerError::Backend(format!("serialize result: {e}")))?;

        let current = self.backend.put(StoreArea::Current, &record.key, &blob);
        let history = self.backend.put(StoreArea::History, &record.key, &blob);
        current.and(history)?;

        tracing::debug!(key = %record.key, "persisted scan result");
        Ok(record.key)
    }
}

impl fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{EnqueueOptions, ScanResult, TaskKind};
    use crate::infra::store::InMemoryBackend;
    use chrono::TimeZone;

    fn completed_task() -> Task {
        let created = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let mut task = Task::new(TaskKind::Dependency, true, 4, EnqueueOptions::new(), created);
        task.start(created).unwrap();
        task.complete(ScanResult::default(), created).unwrap();
        task
    }

    #[test]
    fn test_record_key_format() {
        let task = completed_task();
        let key = record_key(&task);
        assert!(key.starts_with("20260304T050607.000Z_dependency_"));
        assert!(key.ends_with(&task.id.simple().to_string()));
    }

    #[test]
    fn test_persist_writes_both_areas() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = ResultStore::new(backend.clone());
        let task = completed_task();

        let key = store.persist(&task).unwrap();

        for area in [StoreArea::Current, StoreArea::History] {
            let blob = backend.get(area, &key).expect("record written");
            let record: ResultRecord = serde_json::from_str(&blob).unwrap();
            assert_eq!(record.task.id, task.id);
            assert_eq!(record.key, key);
        }
    }
}
