//! Policy-wrapped inference calls.
//!
//! Every remote call runs under a hard timeout with a two-strike rule for
//! throttling and a fixed retry budget for transient failures. A call that
//! exhausts its budget yields `SkipUnit`; the stage decides what a skipped
//! unit means.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::inference::InferenceError;
use crate::rate_limit::RateGate;

/// Outcome of a call whose retry budget is exhausted.
#[derive(Debug, Clone)]
pub struct SkipUnit {
    pub label: String,
    pub reason: String,
}

impl SkipUnit {
    fn new(label: &str, reason: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SkipUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} skipped: {}", self.label, self.reason)
    }
}

/// Retry/timeout policy shared by all inference calls of a job.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    gate: Arc<RateGate>,
    call_timeout: Duration,
    retry_interval: Duration,
    max_transient_retries: u32,
}

impl CallPolicy {
    pub fn new(gate: Arc<RateGate>, config: &WorkerConfig) -> Self {
        Self {
            gate,
            call_timeout: config.call_timeout,
            retry_interval: config.transient_retry_interval,
            max_transient_retries: config.max_transient_retries,
        }
    }

    /// Execute one remote call under the policy.
    ///
    /// - Waits on the rate gate before every attempt.
    /// - First throttle triggers the shared pause and retries; the second
    ///   throttle skips the unit.
    /// - Transient failures (5xx, timeouts) wait the fixed interval and
    ///   retry up to the budget.
    /// - Anything else skips immediately.
    pub async fn call<T, F, Fut>(&self, label: &str, attempt: F) -> Result<T, SkipUnit>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, InferenceError>>,
    {
        let mut rate_limit_hits = 0u32;
        let mut transient_retries = 0u32;

        loop {
            self.gate.wait_if_paused().await;

            let error = match tokio::time::timeout(self.call_timeout, attempt()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => InferenceError::timeout(self.call_timeout),
            };

            if error.is_rate_limit() {
                rate_limit_hits += 1;
                if rate_limit_hits >= 2 {
                    return Err(SkipUnit::new(label, format!("throttled twice: {}", error)));
                }
                self.gate.trigger_pause(label);
                continue;
            }

            if error.is_transient() {
                if transient_retries >= self.max_transient_retries {
                    return Err(SkipUnit::new(
                        label,
                        format!(
                            "transient failure after {} retries: {}",
                            self.max_transient_retries, error
                        ),
                    ));
                }
                transient_retries += 1;
                debug!(
                    "{}: transient failure ({}), retry {}/{} in {:?}",
                    label, error, transient_retries, self.max_transient_retries, self.retry_interval
                );
                tokio::time::sleep(self.retry_interval).await;
                continue;
            }

            warn!("{}: non-retryable inference failure: {}", label, error);
            return Err(SkipUnit::new(label, error.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy_with(config: &WorkerConfig) -> (CallPolicy, Arc<RateGate>) {
        let gate = Arc::new(RateGate::new(config.rate_limit_pause));
        (CallPolicy::new(Arc::clone(&gate), config), gate)
    }

    fn rate_limited() -> InferenceError {
        InferenceError::new(Some(429), "resource_exhausted")
    }

    fn server_error() -> InferenceError {
        InferenceError::new(Some(503), "unavailable")
    }

    #[tokio::test(start_paused = true)]
    async fn success_passes_through() {
        let config = WorkerConfig::default();
        let (policy, _) = policy_with(&config);

        let result = policy
            .call("detect[0]", || async { Ok::<_, InferenceError>(7) })
            .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn first_throttle_pauses_and_retries() {
        let config = WorkerConfig::default();
        let (policy, _) = policy_with(&config);
        let calls = AtomicU32::new(0);

        let result = policy
            .call("detect[2]", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(rate_limited())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn second_throttle_skips_the_unit() {
        let config = WorkerConfig::default();
        let (policy, _) = policy_with(&config);

        let result: Result<u32, _> = policy
            .call("detect[3]", || async { Err(rate_limited()) })
            .await;

        let skip = result.unwrap_err();
        assert_eq!(skip.label, "detect[3]");
        assert!(skip.reason.contains("throttled twice"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_then_succeed() {
        let config = WorkerConfig::default();
        let (policy, _) = policy_with(&config);
        let calls = AtomicU32::new(0);

        let result = policy
            .call("validate[1]", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(server_error())
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_budget_exhaustion_skips_with_last_error() {
        let config = WorkerConfig::default();
        let (policy, _) = policy_with(&config);
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = policy
            .call("validate[4]", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;

        let skip = result.unwrap_err();
        assert!(skip.reason.contains("unavailable"));
        // Initial attempt plus the full retry budget.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_call_times_out_and_counts_as_transient() {
        let config = WorkerConfig::default();
        let (policy, _) = policy_with(&config);
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = policy
            .call("detect[9]", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { std::future::pending().await }
            })
            .await;

        let skip = result.unwrap_err();
        assert!(skip.reason.contains("timed out"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_skip_immediately() {
        let config = WorkerConfig::default();
        let (policy, _) = policy_with(&config);
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = policy
            .call("detect[5]", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(InferenceError::new(Some(400), "invalid argument")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_on_an_active_pause_before_attempting() {
        let config = WorkerConfig::default();
        let (policy, gate) = policy_with(&config);
        gate.trigger_pause("elsewhere");

        let started = tokio::time::Instant::now();
        let result = policy
            .call("detect[0]", || async { Ok::<_, InferenceError>(1) })
            .await;
        assert_eq!(result.unwrap(), 1);
        assert!(started.elapsed() >= config.rate_limit_pause);
    }
}
