//! Scan execution contract and the kind -> executor registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::task::{ScanResult, TaskKind};
use crate::core::SchedulerError;

/// Runs one kind of scan.
///
/// The sequencer is the only caller and never runs two executions at once.
/// Returning `Err` (or panicking) counts as a failed attempt and drives the
/// retry path; the error text ends up on the task.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_scan_queue::core::{ScanExecutor, ScanResult};
///
/// struct DependencyAudit;
///
/// #[async_trait]
/// impl ScanExecutor for DependencyAudit {
///     async fn execute(&self, deep: bool) -> anyhow::Result<ScanResult> {
///         let report = run_audit(deep).await?;
///         Ok(report.into())
///     }
/// }
/// ```
#[async_trait]
pub trait ScanExecutor: Send + Sync + 'static {
    /// Execute the scan. `deep` selects the thorough variant.
    async fn execute(&self, deep: bool) -> anyhow::Result<ScanResult>;
}

/// Maps each task kind to the executor that runs it.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<TaskKind, Arc<dyn ScanExecutor>>,
}

impl ExecutorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor. Fails if the kind already has one.
    pub fn register<E: ScanExecutor>(
        &mut self,
        kind: TaskKind,
        executor: E,
    ) -> Result<(), SchedulerError> {
        self.register_arc(kind, Arc::new(executor))
    }

    /// Register a shared executor. Fails if the kind already has one.
    pub fn register_arc(
        &mut self,
        kind: TaskKind,
        executor: Arc<dyn ScanExecutor>,
    ) -> Result<(), SchedulerError> {
        if self.executors.contains_key(&kind) {
            return Err(SchedulerError::InvalidConfig(format!(
                "executor for `{kind}` registered twice"
            )));
        }
        self.executors.insert(kind, executor);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<E: ScanExecutor>(
        mut self,
        kind: TaskKind,
        executor: E,
    ) -> Result<Self, SchedulerError> {
        self.register(kind, executor)?;
        Ok(self)
    }

    /// Executor for `kind`, or `UnregisteredKind`.
    pub fn get(&self, kind: TaskKind) -> Result<Arc<dyn ScanExecutor>, SchedulerError> {
        self.executors
            .get(&kind)
            .cloned()
            .ok_or(SchedulerError::UnregisteredKind(kind))
    }

    /// Whether `kind` has an executor.
    pub fn contains(&self, kind: TaskKind) -> bool {
        self.executors.contains_key(&kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<TaskKind> {
        let mut kinds: Vec<_> = self.executors.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
