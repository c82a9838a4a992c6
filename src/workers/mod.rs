//! # Workers
//!
//! Background job workers and their lifecycle.
//!
//! - [`traits`]: the closed [`JobType`] set and the [`WorkerHandle`] /
//!   [`WorkerFactory`] capabilities
//! - [`lifecycle`]: validated all-or-nothing creation and settle-all shutdown
//! - [`executor`]: [`QueueWorker`], the polling worker with bounded concurrency
//!   and retry built in

pub mod executor;
pub mod lifecycle;
pub mod traits;

pub use executor::{
    Job, JobHandler, JobSource, JobStatus, JobStatusUpdate, NoopBroadcaster, QueueWorker,
    QueueWorkerBuilder, QueueWorkerConfig, QueueWorkerFactory, StatusBroadcaster,
};
pub use lifecycle::{
    NamedWorkerStatus, RegisteredWorker, ShutdownReport, WorkerDescriptor, WorkerLifecycleEvent,
    WorkerLifecycleManager, WorkerMap,
};
pub use traits::{JobType, WorkerFactory, WorkerHandle, WorkerStatus};
