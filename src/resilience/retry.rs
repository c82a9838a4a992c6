//! # Retry Policy
//!
//! Retry eligibility, capped exponential backoff and the two wrappers every call
//! site uses for uniform failure semantics:
//!
//! - [`with_error_handling`]: observe, classify, log, propagate
//! - [`retry_with_backoff`]: the same, retrying recoverable failures with backoff

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ImporterError, Result};
use crate::logging::log_classified_error;
use crate::resilience::error_classifier::{ErrorClassifier, HeuristicErrorClassifier, TypedError};

/// Retry configuration for one call site or worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// 0.0 disables jitter
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        crate::config::RetryConfig::default().policy()
    }
}

/// Whether a failure that has used `attempts_so_far` attempts may be retried
pub fn should_retry(error: &TypedError, attempts_so_far: u32, policy: &RetryPolicy) -> bool {
    if attempts_so_far >= policy.max_attempts {
        return false;
    }
    error.is_recoverable()
}

/// `min(base_delay * multiplier^attempts_so_far, max_delay)`, jittered when configured
pub fn backoff_delay(attempts_so_far: u32, policy: &RetryPolicy) -> Duration {
    let exponent = i32::try_from(attempts_so_far).unwrap_or(i32::MAX);
    let max_secs = policy.max_delay.as_secs_f64();
    let raw_secs = policy.base_delay.as_secs_f64() * policy.backoff_multiplier.powi(exponent);

    let capped_secs = if raw_secs.is_finite() {
        raw_secs.min(max_secs)
    } else {
        max_secs
    };

    let jittered_secs = if policy.jitter_factor > 0.0 {
        (capped_secs * (1.0 + fastrand::f64() * policy.jitter_factor)).min(max_secs)
    } else {
        capped_secs
    };

    Duration::from_secs_f64(jittered_secs.max(0.0))
}

/// Run `operation`; on failure classify, log and return `ImporterError::Queue`
pub async fn with_error_handling<T, E, F, Fut>(operation_name: &str, operation: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Into<ImporterError>,
{
    match operation().await {
        Ok(value) => Ok(value),
        Err(error) => {
            let typed = HeuristicErrorClassifier
                .classify_error(&error.into())
                .with_context("operation", operation_name);
            log_classified_error(operation_name, &typed);
            Err(ImporterError::Queue(typed))
        }
    }
}

/// Retries recoverable failures with capped exponential backoff
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    classifier: Arc<dyn ErrorClassifier>,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("classifier", &self.classifier.classifier_name())
            .finish()
    }
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_classifier(policy, Arc::new(HeuristicErrorClassifier))
    }

    pub fn with_classifier(policy: RetryPolicy, classifier: Arc<dyn ErrorClassifier>) -> Self {
        Self { policy, classifier }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` (called with the 1-based attempt number) until it
    /// succeeds or the classified failure is not retryable. The last classified
    /// error is returned unchanged.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> std::result::Result<T, TypedError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<ImporterError>,
    {
        let mut attempts_so_far: u32 = 0;
        loop {
            let attempt = attempts_so_far + 1;
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = %operation_name, attempt = attempt, "✅ Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    attempts_so_far = attempt;
                    let typed = self.classifier.classify_error(&error.into());

                    if !should_retry(&typed, attempts_so_far, &self.policy) {
                        log_classified_error(operation_name, &typed);
                        return Err(typed);
                    }

                    // First retry waits base_delay
                    let delay = backoff_delay(attempts_so_far - 1, &self.policy);
                    warn!(
                        operation = %operation_name,
                        attempt = attempt,
                        max_attempts = self.policy.max_attempts,
                        kind = %typed.kind,
                        delay_ms = delay.as_millis() as u64,
                        error = %typed.message,
                        "🔁 Retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// [`RetryExecutor::run`] with the default classifier
pub async fn retry_with_backoff<T, E, F, Fut>(
    operation_name: &str,
    policy: &RetryPolicy,
    operation: F,
) -> std::result::Result<T, TypedError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Into<ImporterError>,
{
    RetryExecutor::new(policy.clone())
        .run(operation_name, operation)
        .await
}
