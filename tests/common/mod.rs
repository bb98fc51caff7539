//! Shared executors and fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use prometheus_scan_queue::core::{
    ExecutorRegistry, FindingCounts, ScanExecutor, ScanResult, Sequencer, SequencerSettings,
    TaskKind,
};
use prometheus_scan_queue::infra::{FixedProbe, InMemoryQueue};
use prometheus_scan_queue::runtime::ScanQueue;
use tokio::sync::Notify;

/// Appends its kind to a shared log on every execution.
pub struct Recorder {
    pub kind: TaskKind,
    pub log: Arc<Mutex<Vec<TaskKind>>>,
}

#[async_trait]
impl ScanExecutor for Recorder {
    async fn execute(&self, deep: bool) -> anyhow::Result<ScanResult> {
        self.log.lock().push(self.kind);
        Ok(ScanResult {
            findings: FindingCounts {
                critical: 0,
                high: u32::from(deep),
                medium: 2,
                low: 3,
            },
            checks_passed: 9,
            checks_total: 10,
            duration_ms: 5,
            details: serde_json::json!({ "kind": self.kind.as_str() }),
        })
    }
}

/// Fails a fixed number of times, then succeeds.
pub struct Flaky {
    pub failures_left: AtomicU32,
    pub calls: Arc<AtomicU32>,
}

impl Flaky {
    pub fn new(failures: u32) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Self {
                failures_left: AtomicU32::new(failures),
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

#[async_trait]
impl ScanExecutor for Flaky {
    async fn execute(&self, _deep: bool) -> anyhow::Result<ScanResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            anyhow::bail!("transient failure ({left} left)");
        }
        Ok(ScanResult::default())
    }
}

/// Signals `started`, then blocks until `release` is notified.
pub struct Gated {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[async_trait]
impl ScanExecutor for Gated {
    async fn execute(&self, _deep: bool) -> anyhow::Result<ScanResult> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(ScanResult::default())
    }
}

/// Registry with a [`Recorder`] for every kind.
pub fn recording_registry() -> (ExecutorRegistry, Arc<Mutex<Vec<TaskKind>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ExecutorRegistry::new();
    for kind in TaskKind::ALL {
        registry
            .register(
                kind,
                Recorder {
                    kind,
                    log: Arc::clone(&log),
                },
            )
            .unwrap();
    }
    (registry, log)
}

/// Queue over an idle [`FixedProbe`], depth 100, UTC.
pub fn queue_with(
    settings: SequencerSettings,
    registry: ExecutorRegistry,
) -> (ScanQueue, Arc<FixedProbe>) {
    queue_with_depth(settings, registry, 100)
}

/// [`queue_with`] with an explicit queue depth.
pub fn queue_with_depth(
    settings: SequencerSettings,
    registry: ExecutorRegistry,
    depth: usize,
) -> (ScanQueue, Arc<FixedProbe>) {
    let probe = Arc::new(FixedProbe::idle());
    let queue = Box::new(InMemoryQueue::new(depth));
    let sequencer = Sequencer::new(settings, queue, registry, probe.clone());
    (ScanQueue::new(sequencer, chrono_tz::Tz::UTC), probe)
}
