//! Retry policy for the HTTP transports

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::Utc;
use tokio::time::sleep;
use tracing::debug;

use super::transport::{ApiResponse, Method};
use super::ApiError;

/// Statuses worth retrying on read calls
pub const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// How a transport retries a request
///
/// Each transport owns its own policy value; nothing changes it after
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts in total, including the first one
    pub max_attempts: u32,
    /// Multiplier for exponential backoff between attempts
    pub backoff_factor: f64,
    /// Upper bound for a single backoff sleep
    pub max_backoff: Duration,
    /// Response statuses that trigger a retry
    pub retry_statuses: Vec<u16>,
    /// Methods that may be retried
    pub retry_methods: Vec<Method>,
    /// Whether a `Retry-After` header overrides the computed backoff
    pub respect_retry_after: bool,
    /// Budget for the whole call, retries and sleeps included
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::resilient()
    }
}

impl RetryPolicy {
    /// Policy for idempotent reads: 15 attempts within 180 seconds
    pub fn resilient() -> Self {
        Self {
            max_attempts: 15,
            backoff_factor: 1.0,
            max_backoff: Duration::from_secs(120),
            retry_statuses: RETRY_STATUSES.to_vec(),
            retry_methods: vec![Method::Get, Method::Post],
            respect_retry_after: true,
            timeout: Duration::from_secs(180),
        }
    }

    /// Policy for side-effecting calls: one attempt, 15 second timeout
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            backoff_factor: 0.0,
            max_backoff: Duration::ZERO,
            retry_statuses: Vec::new(),
            retry_methods: Vec::new(),
            respect_retry_after: false,
            timeout: Duration::from_secs(15),
        }
    }

    /// Whether this policy ever issues more than one attempt
    pub fn retries(&self) -> bool {
        self.max_attempts > 1
    }

    /// Backoff schedule for the retries after the first
    ///
    /// Intervals start at `2 * backoff_factor` seconds and double up to
    /// `max_backoff`, without jitter. The schedule ends once the call's
    /// `timeout` would be overrun.
    pub fn schedule(&self) -> ExponentialBackoff {
        let initial = Duration::from_secs_f64((self.backoff_factor * 2.0).max(0.0));
        ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.max_backoff,
            max_elapsed_time: Some(self.timeout),
            ..Default::default()
        }
    }

    fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Drives `send` until it succeeds, fails permanently, or the policy runs out
    ///
    /// `send` receives the time left in the call's budget and should use it as
    /// the attempt's timeout. Responses with a non-retryable status are
    /// returned as-is; a retryable status still present after the last attempt
    /// of a retrying policy becomes [`ApiError::TransportExhausted`].
    pub async fn run<F, Fut>(&self, method: Method, mut send: F) -> Result<ApiResponse, ApiError>
    where
        F: FnMut(Duration) -> Fut,
        Fut: Future<Output = Result<ApiResponse, ApiError>>,
    {
        let mut schedule = self.schedule();
        let method_retryable = self.retry_methods.contains(&method);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let remaining = self.timeout.saturating_sub(schedule.get_elapsed_time());
            let outcome = send(remaining).await;

            let retryable = match &outcome {
                Ok(response) => self.is_retryable_status(response.status),
                Err(e) => e.is_transient(),
            };
            if !retryable || !method_retryable || attempts >= self.max_attempts {
                return self.finish(outcome, attempts);
            }

            // The first retry goes out immediately.
            let scheduled = if attempts == 1 {
                Some(Duration::ZERO)
            } else {
                schedule.next_backoff()
            };
            let Some(scheduled) = scheduled else {
                debug!(attempts, "Retry budget exhausted");
                return self.finish(outcome, attempts);
            };

            let hinted = match &outcome {
                Ok(response) if self.respect_retry_after => response.retry_after(Utc::now()),
                _ => None,
            };
            let remaining = self.timeout.saturating_sub(schedule.get_elapsed_time());
            if let Some(wait) = hinted.filter(|wait| *wait >= remaining) {
                debug!(attempts, delay_ms = wait.as_millis() as u64, "Retry-After exceeds budget");
                return self.finish(outcome, attempts);
            }
            let delay = hinted.unwrap_or(scheduled);

            debug!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Retrying after backoff"
            );
            sleep(delay).await;
        }
    }

    fn finish(
        &self,
        outcome: Result<ApiResponse, ApiError>,
        attempts: u32,
    ) -> Result<ApiResponse, ApiError> {
        match outcome {
            Ok(response) if self.retries() && self.is_retryable_status(response.status) => {
                Err(ApiError::TransportExhausted {
                    status: response.status,
                    attempts,
                })
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_factor: 0.0,
            respect_retry_after: false,
            ..RetryPolicy::resilient()
        }
    }

    #[test]
    fn test_resilient_defaults() {
        let policy = RetryPolicy::resilient();
        assert_eq!(policy.max_attempts, 15);
        assert_eq!(policy.timeout, Duration::from_secs(180));
        assert_eq!(policy.retry_statuses, vec![429, 500, 502, 503, 504]);
        assert!(policy.respect_retry_after);
        assert!(policy.retries());
    }

    #[test]
    fn test_single_attempt_defaults() {
        let policy = RetryPolicy::single_attempt();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.timeout, Duration::from_secs(15));
        assert!(!policy.retries());
    }

    #[test]
    fn test_schedule_grows_exponentially_and_caps() {
        let mut schedule = RetryPolicy::resilient().schedule();
        let secs: Vec<u64> = (0..8)
            .map(|_| schedule.next_backoff().expect("within budget").as_secs())
            .collect();
        assert_eq!(secs, vec![2, 4, 8, 16, 32, 64, 120, 120]);
    }

    #[test]
    fn test_schedule_ends_at_call_budget() {
        let policy = RetryPolicy {
            timeout: Duration::from_secs(1),
            ..RetryPolicy::resilient()
        };
        assert_eq!(policy.schedule().next_backoff(), None);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = Cell::new(0);
        let result = fast_policy(5)
            .run(Method::Get, |_| {
                calls.set(calls.get() + 1);
                let status = if calls.get() < 3 { 503 } else { 200 };
                async move { Ok(ApiResponse::new(status, "{}")) }
            })
            .await;

        assert_eq!(result.unwrap().status, 200);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_status() {
        let calls = Cell::new(0);
        let result = fast_policy(4)
            .run(Method::Get, |_| {
                calls.set(calls.get() + 1);
                async { Ok(ApiResponse::new(429, "")) }
            })
            .await;

        assert_eq!(calls.get(), 4);
        assert!(matches!(
            result,
            Err(ApiError::TransportExhausted {
                status: 429,
                attempts: 4
            })
        ));
    }

    #[tokio::test]
    async fn test_non_retryable_status_is_returned_immediately() {
        let calls = Cell::new(0);
        let result = fast_policy(5)
            .run(Method::Get, |_| {
                calls.set(calls.get() + 1);
                async { Ok(ApiResponse::new(404, "")) }
            })
            .await;

        assert_eq!(calls.get(), 1);
        assert_eq!(result.unwrap().status, 404);
    }

    #[tokio::test]
    async fn test_single_attempt_passes_retryable_status_through() {
        let calls = Cell::new(0);
        let result = RetryPolicy::single_attempt()
            .run(Method::Post, |_| {
                calls.set(calls.get() + 1);
                async { Ok(ApiResponse::new(503, "")) }
            })
            .await;

        assert_eq!(calls.get(), 1);
        assert_eq!(result.unwrap().status, 503);
    }

    #[tokio::test]
    async fn test_method_outside_retry_set_is_not_retried() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            retry_methods: vec![Method::Get],
            ..fast_policy(5)
        };
        let result = policy
            .run(Method::Post, |_| {
                calls.set(calls.get() + 1);
                async { Ok(ApiResponse::new(500, "")) }
            })
            .await;

        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(ApiError::TransportExhausted { .. })));
    }

    #[tokio::test]
    async fn test_retry_after_zero_is_honored() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            backoff_factor: 1000.0,
            ..RetryPolicy::resilient()
        };
        let result = policy
            .run(Method::Get, |_| {
                calls.set(calls.get() + 1);
                let response = if calls.get() == 1 {
                    ApiResponse::new(429, "").with_header("Retry-After", "0")
                } else {
                    ApiResponse::new(200, "[]")
                };
                async move { Ok(response) }
            })
            .await;

        assert_eq!(result.unwrap().status, 200);
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_delay_beyond_budget_stops_retrying() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            timeout: Duration::from_secs(5),
            ..RetryPolicy::resilient()
        };
        let result = policy
            .run(Method::Get, |_| {
                calls.set(calls.get() + 1);
                async { Ok(ApiResponse::new(503, "").with_header("Retry-After", "60")) }
            })
            .await;

        assert_eq!(calls.get(), 1);
        assert!(matches!(
            result,
            Err(ApiError::TransportExhausted { attempts: 1, .. })
        ));
    }
}
