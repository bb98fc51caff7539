//! # Prometheus Scan Queue
//!
//! A resource-aware, priority-ordered background queue for long-running scan jobs.
//!
//! At most one scan executes at a time. Before each task starts, a live telemetry
//! sample is checked against CPU, memory and free-memory thresholds; when the host
//! is busy the queue simply holds. Failed executions are re-queued up to a fixed
//! number of attempts. Recurring schedules feed the same queue, and results of
//! completed tasks can be persisted to a durable store.
//!
//! ## Components
//!
//! - **Sequencer** ([`core::Sequencer`]): the single-consumer loop. Each tick
//!   checks admission, dequeues the highest-priority task, executes it and
//!   applies the retry policy.
//! - **Scheduler** ([`core::Scheduler`]): hourly, daily, weekly, monthly or
//!   cron-driven task templates.
//! - **Result store** ([`core::ResultStore`]): writes completed tasks to a
//!   "current" and an append-only "history" area.
//! - **Facade** ([`runtime::ScanQueue`]): enqueue, cancel, clear, pause and
//!   status queries plus schedule CRUD, for whatever transport embeds it.
//! - **Driver** ([`runtime::start`]): spawns the two periodic loops.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_scan_queue::builders::build_queue;
//! use prometheus_scan_queue::config::QueueConfig;
//! use prometheus_scan_queue::core::{EnqueueOptions, ExecutorRegistry, TaskKind};
//! use prometheus_scan_queue::infra::ProcfsProbe;
//! use prometheus_scan_queue::runtime::{start, TokioSpawner};
//!
//! let cfg = QueueConfig::from_env()?;
//! let registry = ExecutorRegistry::new().with(TaskKind::Core, CoreScanner::default())?;
//! let queue = Arc::new(build_queue(&cfg, registry, Arc::new(ProcfsProbe::new()))?);
//!
//! let driver = start(Arc::clone(&queue), &TokioSpawner::current()?);
//! queue.enqueue(TaskKind::Core, false, EnqueueOptions::new())?;
//! // ...
//! driver.shutdown().await;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Task model, admission control, sequencing and scheduling.
pub mod core;
/// Configuration models with validation.
pub mod config;
/// Builders to construct a scan queue from configuration.
pub mod builders;
/// Infrastructure adapters for queues, result stores and telemetry.
pub mod infra;
/// Query/control facade and background driver.
pub mod runtime;
/// Shared utilities.
pub mod util;
