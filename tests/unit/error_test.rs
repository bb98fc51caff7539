//! Tests for error types

use prometheus_scan_queue::core::{SchedulerError, TaskKind, TaskStatus};
use uuid::Uuid;

#[test]
fn test_queue_full_error() {
    let err = SchedulerError::QueueFull("depth 100 reached".to_string());
    assert_eq!(format!("{err}"), "queue full: depth 100 reached");
}

#[test]
fn test_unknown_kind_error() {
    let err = "firewall".parse::<TaskKind>().unwrap_err();
    assert_eq!(format!("{err}"), "unknown task kind: firewall");
}

#[test]
fn test_unregistered_kind_error() {
    let err = SchedulerError::UnregisteredKind(TaskKind::Payment);
    assert_eq!(format!("{err}"), "no executor registered for task kind `payment`");
}

#[test]
fn test_invalid_transition_error() {
    let err = SchedulerError::InvalidTransition {
        from: TaskStatus::Completed,
        to: TaskStatus::Running,
    };
    let msg = format!("{err}");
    assert!(msg.starts_with("invalid transition: "));
    assert!(msg.contains("completed"));
    assert!(msg.contains("running"));
}

#[test]
fn test_not_found_errors() {
    let id = Uuid::nil();
    assert_eq!(
        format!("{}", SchedulerError::TaskNotFound(id)),
        format!("task not found: {id}")
    );
    assert_eq!(
        format!("{}", SchedulerError::ScheduleNotFound(id)),
        format!("schedule not found: {id}")
    );
}

#[test]
fn test_backend_error() {
    let err = SchedulerError::Backend("disk full".to_string());
    assert_eq!(format!("{err}"), "backend error: disk full");
}

#[test]
fn test_into_anyhow() {
    let err: anyhow::Error = SchedulerError::Telemetry("no /proc".into()).into();
    assert_eq!(err.to_string(), "telemetry error: no /proc");
}
