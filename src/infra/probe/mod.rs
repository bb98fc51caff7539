//! Telemetry probes.

pub mod fixed;
pub mod procfs;

pub use fixed::FixedProbe;
pub use procfs::ProcfsProbe;
