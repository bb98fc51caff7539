//! Admission control: decide from a telemetry snapshot whether a new task may start.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::probe::TelemetrySnapshot;

/// Resource limits a snapshot must satisfy before a task is admitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceThresholds {
    /// Highest CPU utilisation (percent) at which a task may start.
    pub max_cpu_percent: f64,
    /// Highest memory utilisation (percent) at which a task may start.
    pub max_memory_percent: f64,
    /// Lowest free memory (MB) at which a task may start.
    pub min_free_memory_mb: u64,
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            max_cpu_percent: 80.0,
            max_memory_percent: 85.0,
            min_free_memory_mb: 512,
        }
    }
}

impl ResourceThresholds {
    /// Reject percentages outside 0-100.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("max_cpu_percent", self.max_cpu_percent),
            ("max_memory_percent", self.max_memory_percent),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(format!("{name} must be within 0..=100, got {value}"));
            }
        }
        Ok(())
    }
}

/// The first threshold a snapshot violated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resource", rename_all = "snake_case")]
pub enum LimitingResource {
    /// CPU utilisation above the limit.
    Cpu {
        /// Observed utilisation.
        observed: f64,
        /// Configured limit.
        limit: f64,
    },
    /// Memory utilisation above the limit.
    Memory {
        /// Observed utilisation.
        observed: f64,
        /// Configured limit.
        limit: f64,
    },
    /// Free memory below the floor.
    FreeMemory {
        /// Observed free MB.
        observed_mb: u64,
        /// Configured floor.
        floor_mb: u64,
    },
}

impl fmt::Display for LimitingResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu { observed, limit } => write!(f, "cpu {observed:.1}% > {limit:.1}%"),
            Self::Memory { observed, limit } => write!(f, "memory {observed:.1}% > {limit:.1}%"),
            Self::FreeMemory {
                observed_mb,
                floor_mb,
            } => write!(f, "free memory {observed_mb}MB < {floor_mb}MB"),
        }
    }
}

/// Admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Admission {
    /// Headroom available.
    Admit,
    /// Defer; carries the first violated threshold.
    Defer(LimitingResource),
}

impl Admission {
    /// Whether a task may start.
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admit)
    }
}

/// Check a snapshot against thresholds, short-circuiting on the first violation
/// in the order CPU, memory, free memory.
pub fn check(snapshot: &TelemetrySnapshot, thresholds: &ResourceThresholds) -> Admission {
    if snapshot.cpu_percent > thresholds.max_cpu_percent {
        return Admission::Defer(LimitingResource::Cpu {
            observed: snapshot.cpu_percent,
            limit: thresholds.max_cpu_percent,
        });
    }
    if snapshot.memory_percent > thresholds.max_memory_percent {
        return Admission::Defer(LimitingResource::Memory {
            observed: snapshot.memory_percent,
            limit: thresholds.max_memory_percent,
        });
    }
    if snapshot.free_memory_mb < thresholds.min_free_memory_mb {
        return Admission::Defer(LimitingResource::FreeMemory {
            observed_mb: snapshot.free_memory_mb,
            floor_mb: thresholds.min_free_memory_mb,
        });
    }
    Admission::Admit
}

/// Boolean form of [`check`].
pub fn has_headroom(snapshot: &TelemetrySnapshot, thresholds: &ResourceThresholds) -> bool {
    check(snapshot, thresholds).is_admitted()
}
