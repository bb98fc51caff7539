//! Tests for configuration validation

use prometheus_scan_queue::config::QueueConfig;
use prometheus_scan_queue::core::TaskKind;

#[test]
fn test_queue_config_defaults() {
    let cfg = QueueConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.tick_interval_secs, 10);
    assert_eq!(cfg.schedule_interval_secs, 60);
    assert_eq!(cfg.max_retries, 3);
    assert_eq!(cfg.history_capacity, 10);
    assert_eq!(cfg.thresholds.min_free_memory_mb, 512);
    assert!(cfg.results_dir.is_none());
}

#[test]
fn test_queue_config_invalid_intervals() {
    for cfg in [
        QueueConfig {
            tick_interval_secs: 0,
            ..QueueConfig::default()
        },
        QueueConfig {
            schedule_interval_secs: 0,
            ..QueueConfig::default()
        },
        QueueConfig {
            max_queue_depth: 0,
            ..QueueConfig::default()
        },
        QueueConfig {
            task_timeout_secs: Some(0),
            ..QueueConfig::default()
        },
    ] {
        assert!(cfg.validate().is_err(), "{cfg:?}");
    }
}

#[test]
fn test_queue_config_invalid_threshold() {
    let mut cfg = QueueConfig::default();
    cfg.thresholds.max_memory_percent = 120.0;
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("max_memory_percent"));
}

#[test]
fn test_queue_config_from_json() {
    let json = r#"
    {
        "tick_interval_secs": 5,
        "thresholds": { "max_cpu_percent": 70 },
        "priorities": { "payment": 0 },
        "task_timeout_secs": 900,
        "timezone": "Asia/Tokyo"
    }
    "#;
    let cfg = QueueConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.tick_interval_secs, 5);
    assert_eq!(cfg.schedule_interval_secs, 60);
    assert!((cfg.thresholds.max_cpu_percent - 70.0).abs() < f64::EPSILON);
    assert!((cfg.thresholds.max_memory_percent - 85.0).abs() < f64::EPSILON);
    assert_eq!(cfg.priorities.get(&TaskKind::Payment), Some(&0));
    assert_eq!(cfg.timezone().unwrap(), chrono_tz::Asia::Tokyo);

    let settings = cfg.sequencer_settings();
    assert_eq!(settings.task_timeout, Some(std::time::Duration::from_secs(900)));
}

#[test]
fn test_queue_config_from_json_rejects() {
    assert!(QueueConfig::from_json_str("{ not json").unwrap_err().starts_with("parse error"));
    assert!(QueueConfig::from_json_str(r#"{"timezone":"Nowhere/Special"}"#).is_err());
    assert!(QueueConfig::from_json_str(r#"{"priorities":{"firewall":1}}"#).is_err());
}
