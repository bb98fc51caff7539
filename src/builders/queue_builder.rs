//! Builds a [`ScanQueue`] from [`QueueConfig`].

use std::sync::Arc;

use tracing::info;

use crate::config::QueueConfig;
use crate::core::{AuditSink, ExecutorRegistry, ResultStore, SchedulerError, Sequencer, SystemProbe};
use crate::infra::{FileBackend, InMemoryQueue};
use crate::runtime::ScanQueue;

/// Validate `cfg` and assemble a queue around `registry` and `probe`.
///
/// A filesystem result store is attached when `results_dir` is set.
pub fn build_queue(
    cfg: &QueueConfig,
    registry: ExecutorRegistry,
    probe: Arc<dyn SystemProbe>,
) -> Result<ScanQueue, SchedulerError> {
    build(cfg, registry, probe, None)
}

/// [`build_queue`] with a lifecycle audit sink attached.
pub fn build_queue_with_audit(
    cfg: &QueueConfig,
    registry: ExecutorRegistry,
    probe: Arc<dyn SystemProbe>,
    audit: Box<dyn AuditSink>,
) -> Result<ScanQueue, SchedulerError> {
    build(cfg, registry, probe, Some(audit))
}

fn build(
    cfg: &QueueConfig,
    registry: ExecutorRegistry,
    probe: Arc<dyn SystemProbe>,
    audit: Option<Box<dyn AuditSink>>,
) -> Result<ScanQueue, SchedulerError> {
    cfg.validate()
        .map_err(|e| SchedulerError::InvalidConfig(format!("config invalid: {e}")))?;
    let timezone = cfg.timezone().map_err(SchedulerError::InvalidConfig)?;

    let mut sequencer = Sequencer::new(
        cfg.sequencer_settings(),
        Box::new(InMemoryQueue::new(cfg.max_queue_depth)),
        registry,
        probe,
    );
    if let Some(dir) = &cfg.results_dir {
        let backend = FileBackend::new(dir)?;
        info!(results_dir = %dir.display(), "filesystem result store enabled");
        sequencer = sequencer.with_result_store(ResultStore::new(Arc::new(backend)));
    }
    if let Some(audit) = audit {
        sequencer = sequencer.with_audit(audit);
    }

    Ok(ScanQueue::new(sequencer, timezone)
        .with_intervals(cfg.tick_interval(), cfg.schedule_interval()))
}
