//! # Service Health Monitor
//!
//! Probes durable storage, the cache backend and (optionally) every job queue,
//! reduces the results into one [`ServiceHealth`] and caches it for a TTL so
//! admission checks do not pay a live round trip per request.
//!
//! Probes run concurrently and independently: one failing or hanging probe
//! never prevents the others from reporting. Each is bounded by the probe
//! timeout, and a timeout is reported as Unhealthy.
//!
//! The cache lock is only held to read or swap the cached value, never across an
//! await. A refresh keeps serving the previous snapshot until the new one is
//! swapped in. Two callers that both find the cache stale will both probe; the
//! last write wins.

use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::HealthConfig;
use crate::constants::error_codes;
use crate::health::probes::{CacheBackendProbe, QueueProbe, QueueStats, StorageProbe};
use crate::health::types::{Component, ComponentHealth, HealthCheck, HealthStatus, ServiceHealth};
use crate::logging::{log_classified_error, log_health_check};
use crate::resilience::{ErrorClassifier, HeuristicErrorClassifier};

#[derive(Debug, Clone)]
struct CachedHealth {
    health: ServiceHealth,
    computed_at: Instant,
}

/// Cached multi-component health aggregator
pub struct HealthMonitor {
    storage: Arc<dyn StorageProbe>,
    cache_backend: Arc<dyn CacheBackendProbe>,
    queues: Option<Arc<dyn QueueProbe>>,
    config: HealthConfig,
    classifier: Arc<dyn ErrorClassifier>,
    cached: RwLock<Option<CachedHealth>>,
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("config", &self.config)
            .field("has_queue_probe", &self.queues.is_some())
            .field("classifier", &self.classifier.classifier_name())
            .finish()
    }
}

impl HealthMonitor {
    pub fn new(
        storage: Arc<dyn StorageProbe>,
        cache_backend: Arc<dyn CacheBackendProbe>,
        config: HealthConfig,
    ) -> Self {
        Self {
            storage,
            cache_backend,
            queues: None,
            config,
            classifier: Arc::new(HeuristicErrorClassifier),
            cached: RwLock::new(None),
        }
    }

    /// Also report a nested `queues` component, one check per queue
    pub fn with_queue_probe(mut self, queues: Arc<dyn QueueProbe>) -> Self {
        self.queues = Some(queues);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Cached health if younger than the TTL, otherwise a fresh probe round
    pub async fn get_health(&self) -> ServiceHealth {
        if let Some(health) = self.fresh_cached() {
            debug!(status = %health.status, "Health served from cache");
            return health;
        }
        self.refresh_health().await
    }

    /// Probe every component regardless of the cache, then replace the cached snapshot
    pub async fn refresh_health(&self) -> ServiceHealth {
        let started = Instant::now();
        let (database, cache, queues) = tokio::join!(
            self.check_database(),
            self.check_cache_backend(),
            self.check_queues()
        );

        let mut checks = BTreeMap::new();
        checks.insert(Component::Database, ComponentHealth::Single(database));
        checks.insert(Component::Cache, ComponentHealth::Single(cache));
        if let Some(queues) = queues {
            checks.insert(Component::Queues, queues);
        }

        let health = ServiceHealth::from_checks(checks);
        info!(
            status = %health.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "🩺 Health refreshed"
        );

        *self.cached.write() = Some(CachedHealth {
            health: health.clone(),
            computed_at: Instant::now(),
        });
        health
    }

    /// Serviceable unless Unhealthy; Degraded still admits work
    pub async fn is_healthy(&self) -> bool {
        self.get_health().await.status != HealthStatus::Unhealthy
    }

    /// Last cached result for one component, without probing
    pub fn get_component_health(&self, component: Component) -> Option<ComponentHealth> {
        self.cached
            .read()
            .as_ref()
            .and_then(|cached| cached.health.checks.get(&component).cloned())
    }

    /// Last cached result regardless of age
    pub fn cached_health(&self) -> Option<ServiceHealth> {
        self.cached.read().as_ref().map(|cached| cached.health.clone())
    }

    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }

    fn fresh_cached(&self) -> Option<ServiceHealth> {
        let guard = self.cached.read();
        guard
            .as_ref()
            .filter(|cached| cached.computed_at.elapsed() < self.config.cache_ttl())
            .map(|cached| cached.health.clone())
    }

    async fn check_database(&self) -> HealthCheck {
        let component = Component::Database.as_str();
        let started = Instant::now();
        let outcome = self
            .bounded(async {
                self.storage.ping().await?;
                self.storage.count().await
            })
            .await;

        let check = match outcome {
            Some(Ok(_)) => {
                HealthCheck::from_latency(component, started.elapsed(), self.config.degraded_latency())
            }
            Some(Err(error)) => {
                self.failed_check(component, &error, error_codes::DATABASE_UNAVAILABLE, true)
            }
            None => self.timed_out(component, true),
        };
        log_health_check(component, &check);
        check
    }

    async fn check_cache_backend(&self) -> HealthCheck {
        let component = Component::Cache.as_str();
        if !self.cache_backend.is_ready() {
            let check = HealthCheck::unhealthy(
                "cache backend client is not ready",
                error_codes::CACHE_NOT_READY,
                true,
            );
            log_health_check(component, &check);
            return check;
        }

        let started = Instant::now();
        let outcome = self
            .bounded(self.cache_backend.get(&self.config.cache_probe_key))
            .await;

        let check = match outcome {
            Some(Ok(_)) => {
                HealthCheck::from_latency(component, started.elapsed(), self.config.degraded_latency())
            }
            Some(Err(error)) => {
                self.failed_check(component, &error, error_codes::CACHE_UNAVAILABLE, true)
            }
            None => self.timed_out(component, true),
        };
        log_health_check(component, &check);
        check
    }

    async fn check_queues(&self) -> Option<ComponentHealth> {
        let probe = self.queues.as_ref()?;
        let component = Component::Queues.as_str();

        // listing and every per-queue stats call share one timeout
        let outcome = self
            .bounded(async {
                let names = probe.queue_names().await?;
                let stats = join_all(names.into_iter().map(|name| async move {
                    let started = Instant::now();
                    let stats = probe.stats(&name).await;
                    (name, started.elapsed(), stats)
                }))
                .await;
                anyhow::Ok(stats)
            })
            .await;

        let results = match outcome {
            Some(Ok(results)) => results,
            Some(Err(error)) => {
                let check =
                    self.failed_check(component, &error, error_codes::QUEUE_UNAVAILABLE, false);
                log_health_check(component, &check);
                return Some(ComponentHealth::Single(check));
            }
            None => {
                let check = self.timed_out(component, false);
                log_health_check(component, &check);
                return Some(ComponentHealth::Single(check));
            }
        };

        let checks = results
            .into_iter()
            .map(|(name, elapsed, stats)| {
                let label = format!("queue:{name}");
                let check = match stats {
                    Ok(stats) => self.queue_check(&label, elapsed, stats),
                    Err(error) => {
                        self.failed_check(&label, &error, error_codes::QUEUE_UNAVAILABLE, false)
                    }
                };
                log_health_check(&label, &check);
                (name, check)
            })
            .collect();

        Some(ComponentHealth::Nested(checks))
    }

    fn queue_check(&self, label: &str, elapsed: Duration, stats: QueueStats) -> HealthCheck {
        let mut warnings = Vec::new();
        if stats.waiting > self.config.max_waiting_jobs {
            warnings.push(format!(
                "{label} has {} waiting jobs (limit {})",
                stats.waiting, self.config.max_waiting_jobs
            ));
        }
        if stats.failed > self.config.max_failed_jobs {
            warnings.push(format!(
                "{label} has {} failed jobs (limit {})",
                stats.failed, self.config.max_failed_jobs
            ));
        }

        match HealthCheck::from_latency(label, elapsed, self.config.degraded_latency()) {
            HealthCheck::Healthy {
                response_time_ms,
                performance_score,
            } if !warnings.is_empty() => HealthCheck::Degraded {
                response_time_ms,
                performance_score,
                warnings,
            },
            HealthCheck::Degraded {
                response_time_ms,
                performance_score,
                warnings: mut latency_warnings,
            } => {
                latency_warnings.extend(warnings);
                HealthCheck::Degraded {
                    response_time_ms,
                    performance_score,
                    warnings: latency_warnings,
                }
            }
            check => check,
        }
    }

    /// `None` when the probe exceeded the timeout
    async fn bounded<T>(&self, probe: impl Future<Output = T>) -> Option<T> {
        tokio::time::timeout(self.config.probe_timeout(), probe)
            .await
            .ok()
    }

    fn failed_check(
        &self,
        component: &str,
        error: &anyhow::Error,
        error_code: &str,
        critical: bool,
    ) -> HealthCheck {
        self.classified_check(component, &format!("{error:#}"), error_code, critical)
    }

    fn timed_out(&self, component: &str, critical: bool) -> HealthCheck {
        let message = format!(
            "{component} probe timed out after {}ms",
            self.config.probe_timeout_ms
        );
        self.classified_check(component, &message, error_codes::PROBE_TIMEOUT, critical)
    }

    fn classified_check(
        &self,
        component: &str,
        message: &str,
        error_code: &str,
        critical: bool,
    ) -> HealthCheck {
        let typed = self
            .classifier
            .classify_message(message)
            .with_context("component", component)
            .with_context("error_code", error_code);
        log_classified_error("health_probe", &typed);
        HealthCheck::unhealthy(typed.message, error_code, critical)
    }
}
