//! Probe returning a caller-controlled snapshot.

use parking_lot::Mutex;

use crate::core::{SchedulerError, SystemProbe, TelemetrySnapshot};

/// Returns whatever snapshot was last set. Useful for tests and for hosts
/// that sample telemetry elsewhere and push it in.
pub struct FixedProbe {
    snapshot: Mutex<Result<TelemetrySnapshot, String>>,
}

impl FixedProbe {
    /// Probe reporting `snapshot` until changed.
    pub fn new(snapshot: TelemetrySnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Ok(snapshot)),
        }
    }

    /// Probe reporting an idle machine with plenty of memory.
    pub fn idle() -> Self {
        Self::new(TelemetrySnapshot {
            cpu_percent: 5.0,
            memory_percent: 30.0,
            free_memory_mb: 8_192,
            total_memory_mb: 16_384,
            load_average: [0.1, 0.1, 0.1],
        })
    }

    /// Replace the reported snapshot.
    pub fn set(&self, snapshot: TelemetrySnapshot) {
        *self.snapshot.lock() = Ok(snapshot);
    }

    /// Change only the CPU reading.
    pub fn set_cpu(&self, cpu_percent: f64) {
        let mut guard = self.snapshot.lock();
        let mut snapshot = guard.clone().unwrap_or_default();
        snapshot.cpu_percent = cpu_percent;
        *guard = Ok(snapshot);
    }

    /// Make subsequent samples fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.snapshot.lock() = Err(message.into());
    }
}

impl SystemProbe for FixedProbe {
    fn sample(&self) -> Result<TelemetrySnapshot, SchedulerError> {
        self.snapshot.lock().clone().map_err(SchedulerError::Telemetry)
    }
}
