//! Tests for tokio spawner utilities and the queue facade

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use prometheus_scan_queue::core::{
    SchedulerError, Sequencer, SequencerSettings, SystemProbe, TelemetrySnapshot,
};
use prometheus_scan_queue::infra::InMemoryQueue;
use prometheus_scan_queue::runtime::{ScanQueue, Spawn, TokioSpawner};

use crate::common::recording_registry;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

/// Counts admission samples and status peeks separately.
#[derive(Default)]
struct CountingProbe {
    samples: AtomicUsize,
    peeks: AtomicUsize,
}

impl SystemProbe for CountingProbe {
    fn sample(&self) -> Result<TelemetrySnapshot, SchedulerError> {
        self.samples.fetch_add(1, Ordering::SeqCst);
        Ok(TelemetrySnapshot::default())
    }

    fn peek(&self) -> Result<TelemetrySnapshot, SchedulerError> {
        self.peeks.fetch_add(1, Ordering::SeqCst);
        Ok(TelemetrySnapshot {
            free_memory_mb: 1,
            ..TelemetrySnapshot::default()
        })
    }
}

#[test]
fn test_status_peeks_without_sampling() {
    let probe = Arc::new(CountingProbe::default());
    let (registry, _) = recording_registry();
    let sequencer = Sequencer::new(
        SequencerSettings::default(),
        Box::new(InMemoryQueue::new(10)),
        registry,
        probe.clone(),
    );
    let queue = ScanQueue::new(sequencer, chrono_tz::Tz::UTC);

    for _ in 0..3 {
        assert_eq!(queue.status().telemetry.unwrap().free_memory_mb, 1);
    }
    assert_eq!(probe.peeks.load(Ordering::SeqCst), 3);
    assert_eq!(probe.samples.load(Ordering::SeqCst), 0);
}
