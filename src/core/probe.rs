//! System telemetry contract consumed by admission control.

use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;

/// Point-in-time resource readings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// CPU utilisation, 0-100.
    pub cpu_percent: f64,
    /// Memory utilisation, 0-100.
    pub memory_percent: f64,
    /// Available memory in MB.
    pub free_memory_mb: u64,
    /// Installed memory in MB.
    pub total_memory_mb: u64,
    /// 1, 5 and 15 minute load averages.
    pub load_average: [f64; 3],
}

/// Source of telemetry snapshots.
///
/// Called on every sequencer tick and on every status query, so
/// implementations must be cheap and must not block for long.
pub trait SystemProbe: Send + Sync {
    /// Take a fresh reading for an admission decision.
    fn sample(&self) -> Result<TelemetrySnapshot, SchedulerError>;

    /// Reading for status queries. Must not disturb whatever state
    /// [`sample`](Self::sample) keeps between calls.
    fn peek(&self) -> Result<TelemetrySnapshot, SchedulerError> {
        self.sample()
    }
}
