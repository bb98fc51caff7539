//! Queue, admission and scheduler configuration.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::core::sequencer::SequencerSettings;
use crate::core::{Priority, ResourceThresholds, SchedulerError, TaskKind};

/// Prefix of every environment variable read by [`QueueConfig::from_env`].
pub const ENV_PREFIX: &str = "SCAN_QUEUE_";

/// Load a `.env` file from the working directory, if present.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Root configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Seconds between sequencer ticks.
    pub tick_interval_secs: u64,
    /// Seconds between scheduler ticks.
    pub schedule_interval_secs: u64,
    /// Admission thresholds.
    pub thresholds: ResourceThresholds,
    /// Attempts before a task fails permanently.
    pub max_retries: u32,
    /// Recently finished tasks kept in memory.
    pub history_capacity: usize,
    /// Queued tasks accepted before enqueue is refused.
    pub max_queue_depth: usize,
    /// Abort executions running longer than this many seconds.
    pub task_timeout_secs: Option<u64>,
    /// Per-kind priority overrides.
    pub priorities: HashMap<TaskKind, Priority>,
    /// Directory for the filesystem result store; no store when unset.
    pub results_dir: Option<PathBuf>,
    /// IANA timezone for calendar cadences.
    pub timezone: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 10,
            schedule_interval_secs: 60,
            thresholds: ResourceThresholds::default(),
            max_retries: 3,
            history_capacity: 10,
            max_queue_depth: 100,
            task_timeout_secs: None,
            priorities: HashMap::new(),
            results_dir: None,
            timezone: "UTC".to_string(),
        }
    }
}

impl QueueConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_secs == 0 {
            return Err("tick_interval_secs must be greater than 0".into());
        }
        if self.schedule_interval_secs == 0 {
            return Err("schedule_interval_secs must be greater than 0".into());
        }
        if self.max_retries == 0 {
            return Err("max_retries must be greater than 0".into());
        }
        if self.history_capacity == 0 {
            return Err("history_capacity must be greater than 0".into());
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.task_timeout_secs == Some(0) {
            return Err("task_timeout_secs must be greater than 0 when set".into());
        }
        self.thresholds.validate()?;
        self.timezone()?;
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `.env` and `SCAN_QUEUE_*` environment variables.
    pub fn from_env() -> Result<Self, SchedulerError> {
        load_dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `SCAN_QUEUE_*` key. Empty values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SchedulerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut cfg = Self::default();

        if let Some(v) = get("TICK_INTERVAL_SECS") {
            cfg.tick_interval_secs = parse_var("TICK_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("SCHEDULE_INTERVAL_SECS") {
            cfg.schedule_interval_secs = parse_var("SCHEDULE_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("MAX_CPU_PERCENT") {
            cfg.thresholds.max_cpu_percent = parse_var("MAX_CPU_PERCENT", &v)?;
        }
        if let Some(v) = get("MAX_MEMORY_PERCENT") {
            cfg.thresholds.max_memory_percent = parse_var("MAX_MEMORY_PERCENT", &v)?;
        }
        if let Some(v) = get("MIN_FREE_MEMORY_MB") {
            cfg.thresholds.min_free_memory_mb = parse_var("MIN_FREE_MEMORY_MB", &v)?;
        }
        if let Some(v) = get("MAX_RETRIES") {
            cfg.max_retries = parse_var("MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("HISTORY_CAPACITY") {
            cfg.history_capacity = parse_var("HISTORY_CAPACITY", &v)?;
        }
        if let Some(v) = get("MAX_QUEUE_DEPTH") {
            cfg.max_queue_depth = parse_var("MAX_QUEUE_DEPTH", &v)?;
        }
        if let Some(v) = get("TASK_TIMEOUT_SECS") {
            cfg.task_timeout_secs = Some(parse_var("TASK_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("RESULTS_DIR") {
            cfg.results_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("TIMEZONE") {
            cfg.timezone = v;
        }
        for kind in TaskKind::ALL {
            let name = format!("PRIORITY_{}", kind.as_str().to_ascii_uppercase());
            if let Some(v) = get(&name) {
                cfg.priorities.insert(kind, parse_var(&name, &v)?);
            }
        }

        cfg.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(cfg)
    }

    /// Parsed [`timezone`](Self::timezone).
    pub fn timezone(&self) -> Result<Tz, String> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| format!("timezone `{}`: {e}", self.timezone))
    }

    /// Sequencer tick period.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    /// Scheduler tick period.
    pub const fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_secs)
    }

    /// Settings for the sequencer built from this config.
    pub fn sequencer_settings(&self) -> SequencerSettings {
        SequencerSettings {
            thresholds: self.thresholds,
            max_retries: self.max_retries,
            history_capacity: self.history_capacity,
            task_timeout: self.task_timeout_secs.map(Duration::from_secs),
            priorities: self.priorities.clone(),
        }
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T, SchedulerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| SchedulerError::InvalidConfig(format!("{ENV_PREFIX}{name}=`{value}`: {e}")))
}
