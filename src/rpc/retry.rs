use std::future::Future;
use std::time::Duration;
use rand::Rng;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::chain::Chain;
use crate::recovery::{BlockchainError, ErrorClassifier};
use crate::rpc::ChainClientError;

/// Retry policy for chain client calls
pub trait RetryPolicy: Send + Sync {
    /// Check if the call should be attempted again
    fn should_retry(&self, error: &BlockchainError, attempt: u32) -> bool;

    /// Delay before the next attempt
    fn get_delay(&self, attempt: u32) -> Duration;

    /// Record the final outcome of a retried call
    fn record_outcome(&self, success: bool, attempts: u32);

    /// Get retry metrics
    fn metrics(&self) -> RetryMetrics;
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Retry metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryMetrics {
    pub total_calls: u64,
    pub total_retries: u64,
    pub successful_retries: u64,
    pub failed_retries: u64,
}

/// Exponential backoff with jitter, bounded attempts
pub struct DefaultRetryPolicy {
    config: RetryConfig,
    metrics: parking_lot::RwLock<RetryMetrics>,
}

impl DefaultRetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            metrics: parking_lot::RwLock::new(RetryMetrics::default()),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn calculate_exponential_backoff(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay.as_secs_f64();
        let max_delay = self.config.max_delay.as_secs_f64();
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let backoff = base_delay * self.config.backoff_factor.powi(exponent);

        let jitter_range = backoff * self.config.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::rng().random_range(-jitter_range..jitter_range)
        } else {
            0.0
        };
        let delay = (backoff + jitter).clamp(0.0, max_delay);

        Duration::from_secs_f64(delay)
    }
}

impl RetryPolicy for DefaultRetryPolicy {
    fn should_retry(&self, error: &BlockchainError, attempt: u32) -> bool {
        attempt < self.config.max_attempts && error.retryable()
    }

    fn get_delay(&self, attempt: u32) -> Duration {
        self.calculate_exponential_backoff(attempt)
    }

    fn record_outcome(&self, success: bool, attempts: u32) {
        let mut metrics = self.metrics.write();
        metrics.total_calls += 1;
        if attempts > 1 {
            metrics.total_retries += (attempts - 1) as u64;
            if success {
                metrics.successful_retries += 1;
            } else {
                metrics.failed_retries += 1;
            }
        }
    }

    fn metrics(&self) -> RetryMetrics {
        self.metrics.read().clone()
    }
}

/// Run a chain call under a per-attempt timeout, retrying retryable failures
///
/// Attempts run sequentially. Failures are classified on the way out so the
/// caller only ever sees a [`BlockchainError`].
pub async fn with_retry<T, F, Fut>(
    chain: Chain,
    call_timeout: Duration,
    policy: &dyn RetryPolicy,
    classifier: &ErrorClassifier,
    mut operation: F,
) -> Result<T, BlockchainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChainClientError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(call_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(ChainClientError::Timeout(format!(
                "{} call exceeded {}ms",
                chain,
                call_timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(value) => {
                policy.record_outcome(true, attempt);
                return Ok(value);
            }
            Err(error) => {
                let classified = classifier
                    .classify(Some(chain), &error)
                    .with_context("attempt", attempt.to_string());
                if policy.should_retry(&classified, attempt) {
                    let delay = policy.get_delay(attempt);
                    debug!(chain = %chain, attempt, delay_ms = delay.as_millis() as u64, "retrying chain call");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                policy.record_outcome(false, attempt);
                return Err(classified);
            }
        }
    }
}
