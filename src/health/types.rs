//! Health check result types and aggregation rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::constants::health::PERFORMANCE_SCORE_STEPS;

/// Overall or per-check status, ordered `Healthy < Degraded < Unhealthy`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// Serviceable but impaired; work is still admitted
    Degraded,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Outcome of probing one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HealthCheck {
    Healthy {
        response_time_ms: u64,
        performance_score: u8,
    },
    Degraded {
        response_time_ms: u64,
        performance_score: u8,
        warnings: Vec<String>,
    },
    Unhealthy {
        error: String,
        error_code: String,
        /// Whether the failed dependency is required for serving
        critical: bool,
    },
}

impl HealthCheck {
    pub fn status(&self) -> HealthStatus {
        match self {
            HealthCheck::Healthy { .. } => HealthStatus::Healthy,
            HealthCheck::Degraded { .. } => HealthStatus::Degraded,
            HealthCheck::Unhealthy { .. } => HealthStatus::Unhealthy,
        }
    }

    /// Healthy below `degraded_threshold`, Degraded with a warning at or above it
    pub fn from_latency(component: &str, elapsed: Duration, degraded_threshold: Duration) -> Self {
        let response_time_ms = elapsed.as_millis() as u64;
        let performance_score = performance_score(elapsed);
        if elapsed < degraded_threshold {
            HealthCheck::Healthy {
                response_time_ms,
                performance_score,
            }
        } else {
            HealthCheck::Degraded {
                response_time_ms,
                performance_score,
                warnings: vec![format!(
                    "{component} response time {response_time_ms}ms exceeds {}ms",
                    degraded_threshold.as_millis()
                )],
            }
        }
    }

    pub fn unhealthy(error: impl Into<String>, error_code: impl Into<String>, critical: bool) -> Self {
        HealthCheck::Unhealthy {
            error: error.into(),
            error_code: error_code.into(),
            critical,
        }
    }
}

/// Stepped latency to score curve
pub fn performance_score(elapsed: Duration) -> u8 {
    let millis = elapsed.as_millis();
    PERFORMANCE_SCORE_STEPS
        .iter()
        .find(|(bound_ms, _)| millis < u128::from(*bound_ms))
        .map(|(_, score)| *score)
        .unwrap_or(0)
}

/// Probed components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Database,
    Cache,
    Queues,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Database => "database",
            Component::Cache => "cache",
            Component::Queues => "queues",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A component's result: one check, or one check per subcomponent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentHealth {
    Single(HealthCheck),
    Nested(BTreeMap<String, HealthCheck>),
}

impl ComponentHealth {
    /// Worst status among the contained checks; an empty nested map is Healthy
    pub fn status(&self) -> HealthStatus {
        match self {
            ComponentHealth::Single(check) => check.status(),
            ComponentHealth::Nested(checks) => checks
                .values()
                .map(HealthCheck::status)
                .max()
                .unwrap_or(HealthStatus::Healthy),
        }
    }
}

/// Aggregated health of the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    pub checks: BTreeMap<Component, ComponentHealth>,
    pub timestamp: DateTime<Utc>,
}

impl ServiceHealth {
    pub fn from_checks(checks: BTreeMap<Component, ComponentHealth>) -> Self {
        Self {
            status: aggregate_status(checks.values()),
            checks,
            timestamp: Utc::now(),
        }
    }

    /// Degraded still counts as serviceable
    pub fn is_serviceable(&self) -> bool {
        self.status != HealthStatus::Unhealthy
    }

    /// Status code for health endpoints: 200 unless Unhealthy
    pub fn http_status_code(&self) -> u16 {
        match self.status {
            HealthStatus::Healthy | HealthStatus::Degraded => 200,
            HealthStatus::Unhealthy => 503,
        }
    }
}

/// Unhealthy if any check is, else Degraded if any is, else Healthy
pub fn aggregate_status<'a>(components: impl IntoIterator<Item = &'a ComponentHealth>) -> HealthStatus {
    components
        .into_iter()
        .map(ComponentHealth::status)
        .max()
        .unwrap_or(HealthStatus::Healthy)
}
