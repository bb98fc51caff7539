//! Configuration models for the scan queue.

pub mod queue;

pub use queue::{load_dotenv, QueueConfig, ENV_PREFIX};
