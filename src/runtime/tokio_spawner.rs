//! Tokio runtime spawner implementation.

use std::future::Future;

use tokio::runtime::Handle;

use crate::core::SchedulerError;
use crate::runtime::Spawn;

/// Spawns driver loops on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    /// Spawner bound to an explicit runtime handle.
    pub const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Spawner bound to the runtime the caller is running on.
    pub fn current() -> Result<Self, SchedulerError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| SchedulerError::Backend(format!("no tokio runtime: {e}")))
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(fut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_outside_runtime_fails() {
        assert!(matches!(TokioSpawner::current(), Err(SchedulerError::Backend(_))));
    }

    #[tokio::test]
    async fn test_spawns_on_current_runtime() {
        let spawner = TokioSpawner::current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        spawner.spawn(async move {
            let _ = tx.send(7);
        });
        assert_eq!(rx.await.unwrap(), 7);
    }
}
