//! Background loops driving the sequencer and the scheduler.
//!
//! Shutdown is only observed while a loop waits for its next period; a tick
//! that is executing a task always runs to completion first.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::core::TickOutcome;
use crate::runtime::api::ScanQueue;
use crate::runtime::Spawn;

/// Controls the spawned loops. Dropping the handle also stops them.
#[derive(Debug)]
pub struct DriverHandle {
    shutdown: watch::Sender<bool>,
    done: mpsc::Receiver<()>,
}

impl DriverHandle {
    /// Ask both loops to stop without waiting.
    pub fn signal_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Stop both loops and wait until they have exited.
    pub async fn shutdown(mut self) {
        self.signal_shutdown();
        // Resolves to `None` once every loop has dropped its sender.
        while self.done.recv().await.is_some() {}
        info!("scan queue driver stopped");
    }
}

/// Spawn the sequencer and scheduler loops for `queue`.
pub fn start<S: Spawn>(queue: Arc<ScanQueue>, spawner: &S) -> DriverHandle {
    let (shutdown, shutdown_rx) = watch::channel(false);
    let (done_tx, done) = mpsc::channel(1);

    info!(
        tick_interval_secs = queue.tick_interval().as_secs_f64(),
        schedule_interval_secs = queue.schedule_interval().as_secs_f64(),
        "scan queue driver started"
    );

    spawner.spawn(sequencer_loop(Arc::clone(&queue), shutdown_rx.clone(), done_tx.clone()));
    spawner.spawn(scheduler_loop(queue, shutdown_rx, done_tx));

    DriverHandle { shutdown, done }
}

async fn sequencer_loop(
    queue: Arc<ScanQueue>,
    mut shutdown: watch::Receiver<bool>,
    _done: mpsc::Sender<()>,
) {
    let mut ticker = interval(queue.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
        match queue.tick().await {
            TickOutcome::Idle | TickOutcome::Paused | TickOutcome::Busy => {}
            outcome => debug!(?outcome, "sequencer tick"),
        }
    }
    debug!("sequencer loop exited");
}

async fn scheduler_loop(
    queue: Arc<ScanQueue>,
    mut shutdown: watch::Receiver<bool>,
    _done: mpsc::Sender<()>,
) {
    let mut ticker = interval(queue.schedule_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
        queue.run_schedules();
    }
    debug!("scheduler loop exited");
}
