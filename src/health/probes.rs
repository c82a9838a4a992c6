//! Probe seams for the dependencies the health monitor checks.
//!
//! Each trait is a narrow view of a real client: the monitor only ever needs a
//! cheap round trip. Concrete probes for PostgreSQL (`postgres` feature) and
//! Redis (`redis-backend` feature) are provided; tests supply doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Durable storage liveness
#[async_trait]
pub trait StorageProbe: Send + Sync {
    async fn ping(&self) -> anyhow::Result<()>;

    /// One cheap read, e.g. a row count
    async fn count(&self) -> anyhow::Result<i64>;
}

/// Cache / queue backend liveness
#[async_trait]
pub trait CacheBackendProbe: Send + Sync {
    /// Whether the client has finished connecting
    fn is_ready(&self) -> bool;

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
}

/// Job counts for one queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub active: u64,
    pub failed: u64,
}

/// Per-queue backlog inspection
#[async_trait]
pub trait QueueProbe: Send + Sync {
    async fn queue_names(&self) -> anyhow::Result<Vec<String>>;

    async fn stats(&self, queue: &str) -> anyhow::Result<QueueStats>;
}

#[cfg(feature = "postgres")]
pub use postgres::PgStorageProbe;

#[cfg(feature = "postgres")]
mod postgres {
    use super::StorageProbe;
    use async_trait::async_trait;
    use sqlx::PgPool;

    const DEFAULT_COUNT_QUERY: &str = "SELECT COUNT(*) FROM pg_catalog.pg_namespace";

    /// `SELECT 1` plus a cheap count against a PostgreSQL pool
    #[derive(Debug, Clone)]
    pub struct PgStorageProbe {
        pool: PgPool,
        count_query: String,
    }

    impl PgStorageProbe {
        pub fn new(pool: PgPool) -> Self {
            Self {
                pool,
                count_query: DEFAULT_COUNT_QUERY.to_string(),
            }
        }

        /// Count against an application table instead of the catalog
        pub fn with_count_query(mut self, query: impl Into<String>) -> Self {
            self.count_query = query.into();
            self
        }
    }

    #[async_trait]
    impl StorageProbe for PgStorageProbe {
        async fn ping(&self) -> anyhow::Result<()> {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        }

        async fn count(&self) -> anyhow::Result<i64> {
            let count: i64 = sqlx::query_scalar(&self.count_query)
                .fetch_one(&self.pool)
                .await?;
            Ok(count)
        }
    }
}

#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisBackendProbe;

#[cfg(feature = "redis-backend")]
mod redis_backend {
    use super::CacheBackendProbe;
    use async_trait::async_trait;

    /// Round trips through a multiplexed Redis connection
    #[derive(Clone)]
    pub struct RedisBackendProbe {
        connection_manager: redis::aio::ConnectionManager,
    }

    impl std::fmt::Debug for RedisBackendProbe {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RedisBackendProbe")
                .field("connection_manager", &"ConnectionManager")
                .finish()
        }
    }

    impl RedisBackendProbe {
        pub async fn connect(url: &str) -> anyhow::Result<Self> {
            let client = redis::Client::open(url)?;
            let connection_manager = redis::aio::ConnectionManager::new(client).await?;
            Ok(Self { connection_manager })
        }
    }

    #[async_trait]
    impl CacheBackendProbe for RedisBackendProbe {
        /// The initial connect succeeded in `connect`; the manager reconnects on its own
        fn is_ready(&self) -> bool {
            true
        }

        async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            let mut conn = self.connection_manager.clone();
            let value: Option<String> = redis::cmd("GET")
                .arg(key)
                .query_async(&mut conn)
                .await
                .map_err(|e| anyhow::anyhow!("redis GET failed: {e}"))?;
            Ok(value)
        }
    }
}
