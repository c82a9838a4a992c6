#![allow(dead_code)]

pub mod fs;
pub mod jobs;
pub mod probes;
pub mod workers;

pub use fs::*;
pub use jobs::*;
pub use probes::*;
pub use workers::*;

use importer_core::config::HealthConfig;
use importer_core::health::HealthMonitor;
use std::sync::Arc;

/// Monitor over the given doubles with default thresholds
pub fn monitor(storage: Arc<MockStorage>, cache: Arc<MockCacheBackend>) -> HealthMonitor {
    HealthMonitor::new(storage, cache, HealthConfig::default())
}

/// Poll `condition` every 10ms until it holds or 30s (of possibly paused) time pass
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..3_000 {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    condition()
}
