//! Linux `/proc` telemetry probe.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::core::{SchedulerError, SystemProbe, TelemetrySnapshot};

/// Aggregate CPU counters from the first line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    idle: u64,
    total: u64,
}

/// Counters and reading from the last admission sample.
#[derive(Debug, Default)]
struct CpuBaseline {
    times: Option<CpuTimes>,
    percent: Option<f64>,
}

/// Reads `/proc/stat`, `/proc/meminfo` and `/proc/loadavg`.
///
/// CPU utilisation is the busy share of counter deltas since the previous
/// [`sample`](SystemProbe::sample). The first sample has no baseline and uses
/// the 1-minute load average divided by the CPU count instead; a sample whose
/// counters have not advanced repeats the previous reading.
/// [`peek`](SystemProbe::peek) measures against the same baseline without
/// moving it.
pub struct ProcfsProbe {
    root: PathBuf,
    cpus: usize,
    baseline: Mutex<CpuBaseline>,
}

impl ProcfsProbe {
    /// Probe reading the real `/proc`.
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Probe reading from an alternate procfs mount.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            cpus: num_cpus::get().max(1),
            baseline: Mutex::new(CpuBaseline::default()),
        }
    }

    fn read(&self, name: &str) -> Result<String, SchedulerError> {
        let path = self.root.join(name);
        fs::read_to_string(&path)
            .map_err(|e| SchedulerError::Telemetry(format!("{}: {e}", path.display())))
    }

    #[allow(clippy::cast_precision_loss)]
    fn cpu_percent(&self, load_1m: f64, advance: bool) -> Result<f64, SchedulerError> {
        let now = parse_cpu_times(&self.read("stat")?)?;
        let mut baseline = self.baseline.lock();
        let load_estimate = || (load_1m / self.cpus as f64 * 100.0).clamp(0.0, 100.0);

        let percent = match baseline.times {
            Some(prev) if now.total > prev.total => {
                let total = (now.total - prev.total) as f64;
                let idle = now.idle.saturating_sub(prev.idle) as f64;
                (100.0 * (1.0 - idle / total)).clamp(0.0, 100.0)
            }
            Some(_) => baseline.percent.unwrap_or_else(load_estimate),
            None => load_estimate(),
        };
        if advance {
            baseline.times = Some(now);
            baseline.percent = Some(percent);
        }
        Ok(percent)
    }

    #[allow(clippy::cast_precision_loss)]
    fn read_snapshot(&self, advance: bool) -> Result<TelemetrySnapshot, SchedulerError> {
        let load_average = parse_loadavg(&self.read("loadavg")?)?;
        let (total_kb, available_kb) = parse_meminfo(&self.read("meminfo")?)?;
        let cpu_percent = self.cpu_percent(load_average[0], advance)?;

        let memory_percent = if total_kb == 0 {
            0.0
        } else {
            100.0 * (total_kb.saturating_sub(available_kb)) as f64 / total_kb as f64
        };

        Ok(TelemetrySnapshot {
            cpu_percent,
            memory_percent,
            free_memory_mb: available_kb / 1024,
            total_memory_mb: total_kb / 1024,
            load_average,
        })
    }
}

impl Default for ProcfsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe for ProcfsProbe {
    fn sample(&self) -> Result<TelemetrySnapshot, SchedulerError> {
        self.read_snapshot(true)
    }

    fn peek(&self) -> Result<TelemetrySnapshot, SchedulerError> {
        self.read_snapshot(false)
    }
}

fn parse_cpu_times(stat: &str) -> Result<CpuTimes, SchedulerError> {
    let line = stat
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| SchedulerError::Telemetry("stat: missing aggregate cpu line".into()))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|e| SchedulerError::Telemetry(format!("stat: {e}")))?;
    if fields.len() < 4 {
        return Err(SchedulerError::Telemetry("stat: too few cpu fields".into()));
    }
    // user nice system idle iowait irq softirq steal
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Ok(CpuTimes {
        idle,
        total: fields.iter().sum(),
    })
}

fn parse_meminfo(meminfo: &str) -> Result<(u64, u64), SchedulerError> {
    let field = |name: &str| {
        meminfo
            .lines()
            .find_map(|l| l.strip_prefix(name))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|v| v.parse::<u64>().ok())
    };
    let total = field("MemTotal")
        .ok_or_else(|| SchedulerError::Telemetry("meminfo: missing MemTotal".into()))?;
    let available = field("MemAvailable")
        .or_else(|| field("MemFree"))
        .ok_or_else(|| SchedulerError::Telemetry("meminfo: missing MemAvailable".into()))?;
    Ok((total, available))
}

fn parse_loadavg(loadavg: &str) -> Result<[f64; 3], SchedulerError> {
    let mut values = [0.0; 3];
    let mut parts = loadavg.split_whitespace();
    for slot in &mut values {
        *slot = parts
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| SchedulerError::Telemetry(format!("loadavg: malformed `{loadavg}`")))?;
    }
    Ok(values)
}
