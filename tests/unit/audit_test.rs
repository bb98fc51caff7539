//! Tests for the lifecycle audit trail

use std::sync::Arc;

use prometheus_scan_queue::core::{
    build_audit_event, AuditAction, AuditSink, EnqueueOptions, ExecutorRegistry, InMemoryAuditSink,
    Sequencer, SequencerSettings, Task, TaskKind,
};
use prometheus_scan_queue::infra::{FixedProbe, InMemoryQueue};

use crate::common::Flaky;

#[test]
fn test_in_memory_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);
    let task = Task::new(TaskKind::Core, false, 1, EnqueueOptions::new(), chrono::Utc::now());

    sink.record(build_audit_event(&task, AuditAction::Enqueued, None));
    sink.record(build_audit_event(&task, AuditAction::Started, None));
    sink.record(build_audit_event(&task, AuditAction::Completed, None));

    let actions: Vec<_> = sink.events().iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::Started, AuditAction::Completed]);
}

#[tokio::test]
async fn test_sequencer_emits_lifecycle_events() {
    let sink = InMemoryAuditSink::new(64);
    let (flaky, _) = Flaky::new(1);
    let registry = ExecutorRegistry::new()
        .with(TaskKind::Payment, flaky)
        .unwrap();
    let sequencer = Sequencer::new(
        SequencerSettings::default(),
        Box::new(InMemoryQueue::new(10)),
        registry,
        Arc::new(FixedProbe::idle()),
    )
    .with_audit(Box::new(sink.clone()));

    let id = sequencer.enqueue(TaskKind::Payment, false, EnqueueOptions::new()).unwrap();
    let doomed = sequencer.enqueue(TaskKind::Payment, false, EnqueueOptions::new()).unwrap();
    assert!(sequencer.cancel(doomed));
    sequencer.tick().await;
    sequencer.tick().await;

    let events = sink.events();
    let trail: Vec<_> = events
        .iter()
        .filter(|e| e.task_id == id)
        .map(|e| (e.action, e.retry_count))
        .collect();
    assert_eq!(
        trail,
        vec![
            (AuditAction::Enqueued, 0),
            (AuditAction::Started, 0),
            (AuditAction::Retried, 1),
            (AuditAction::Started, 1),
            (AuditAction::Completed, 1),
        ]
    );

    let retried = events
        .iter()
        .find(|e| e.action == AuditAction::Retried)
        .cloned()
        .unwrap();
    assert!(retried.detail.unwrap().contains("transient failure"));
    assert!(events
        .iter()
        .any(|e| e.task_id == doomed && e.action == AuditAction::Canceled));
}
