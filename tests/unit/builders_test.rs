//! Tests for builder modules

use std::sync::Arc;
use std::time::Duration;

use prometheus_scan_queue::builders::{build_queue, build_queue_with_audit};
use prometheus_scan_queue::config::QueueConfig;
use prometheus_scan_queue::core::{
    AuditAction, EnqueueOptions, InMemoryAuditSink, SchedulerError, TaskKind,
};
use prometheus_scan_queue::infra::FixedProbe;

use crate::common::recording_registry;

#[test]
fn test_build_queue_applies_config() {
    let cfg = QueueConfig {
        tick_interval_secs: 3,
        schedule_interval_secs: 30,
        max_queue_depth: 1,
        timezone: "America/New_York".into(),
        ..QueueConfig::default()
    };
    let (registry, _) = recording_registry();
    let queue = build_queue(&cfg, registry, Arc::new(FixedProbe::idle())).unwrap();

    assert_eq!(queue.tick_interval(), Duration::from_secs(3));
    assert_eq!(queue.schedule_interval(), Duration::from_secs(30));
    assert_eq!(queue.scheduler().timezone(), chrono_tz::America::New_York);

    queue.enqueue(TaskKind::Core, false, EnqueueOptions::new()).unwrap();
    assert!(matches!(
        queue.enqueue(TaskKind::Core, false, EnqueueOptions::new()),
        Err(SchedulerError::QueueFull(_))
    ));
}

#[test]
fn test_build_queue_rejects_invalid_config() {
    let cfg = QueueConfig {
        history_capacity: 0,
        ..QueueConfig::default()
    };
    let (registry, _) = recording_registry();
    let err = build_queue(&cfg, registry, Arc::new(FixedProbe::idle())).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
}

#[test]
fn test_build_queue_creates_results_dir() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("scan-results");
    let cfg = QueueConfig {
        results_dir: Some(root.clone()),
        ..QueueConfig::default()
    };
    let (registry, _) = recording_registry();
    let sink = InMemoryAuditSink::new(16);
    let probe = Arc::new(FixedProbe::idle());
    let queue = build_queue_with_audit(&cfg, registry, probe, Box::new(sink.clone())).unwrap();

    assert!(root.join("current").is_dir());
    assert!(root.join("history").is_dir());

    let id = queue.enqueue(TaskKind::Headers, false, EnqueueOptions::new()).unwrap();
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].task_id, id);
    assert_eq!(events[0].action, AuditAction::Enqueued);
}
