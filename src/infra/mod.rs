//! Infrastructure adapters: queue, result-store backends and telemetry probes.

pub mod probe;
pub mod queue;
pub mod store;

pub use probe::{FixedProbe, ProcfsProbe};
pub use queue::InMemoryQueue;
pub use store::{FileBackend, InMemoryBackend};
