//! # Health Monitoring
//!
//! Cached, multi-component health aggregation used to gate admission of work.
//!
//! ## Components
//!
//! - **database**: `ping` plus one cheap read through a [`StorageProbe`]
//! - **cache**: readiness flag plus a `GET` round trip through a [`CacheBackendProbe`]
//! - **queues** (optional): one nested check per queue through a [`QueueProbe`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use importer_core::config::HealthConfig;
//! use importer_core::health::{CacheBackendProbe, HealthMonitor, StorageProbe};
//! use std::sync::Arc;
//!
//! # async fn example(storage: Arc<dyn StorageProbe>, cache: Arc<dyn CacheBackendProbe>) {
//! let monitor = HealthMonitor::new(storage, cache, HealthConfig::default());
//! let health = monitor.get_health().await;
//! println!("{} -> HTTP {}", health.status, health.http_status_code());
//! # }
//! ```

pub mod monitor;
pub mod probes;
pub mod types;

pub use monitor::HealthMonitor;
pub use probes::{CacheBackendProbe, QueueProbe, QueueStats, StorageProbe};
pub use types::{
    aggregate_status, performance_score, Component, ComponentHealth, HealthCheck, HealthStatus,
    ServiceHealth,
};

#[cfg(feature = "postgres")]
pub use probes::PgStorageProbe;

#[cfg(feature = "redis-backend")]
pub use probes::RedisBackendProbe;
