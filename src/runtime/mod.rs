//! Query/control facade, background driver and spawner.

use std::future::Future;

pub mod api;
pub mod driver;
pub mod tokio_spawner;

pub use api::{QueueStatus, ScanQueue};
pub use driver::{start, DriverHandle};
pub use tokio_spawner::TokioSpawner;

/// Abstraction for spawning background futures on a runtime.
pub trait Spawn {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
