//! Rate-limited, retrying request execution.
//!
//! Each call runs a small state machine:
//! `Attempting -> Success | Throttled -> WaitThenRetry -> Attempting | Failed`.
//! At most `max_attempts` requests are dispatched per call.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::constants::{DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_CAP_MS, DEFAULT_MAX_ATTEMPTS};
use crate::error::{FetchError, TransportError};
use crate::rate_limiter::RateLimiter;
use crate::transport::{ApiRequest, ApiResponse, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            max_delay: Duration::from_millis(DEFAULT_BACKOFF_CAP_MS),
        }
    }
}

impl RetryPolicy {
    /// Upper bound of the wait after failed attempt `attempt` (1-based):
    /// `base * 2^(attempt-1)`, capped at `max_delay`
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Equal jitter: half of the ceiling is fixed, the other half random
    pub fn backoff(&self, attempt: u32) -> Duration {
        let half = self.ceiling(attempt) / 2;
        half + half.mul_f64(rand::thread_rng().gen_range(0.0..=1.0))
    }
}

/// Parses a `Retry-After` value given either as delta-seconds or as an HTTP-date
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds).ok();
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

enum Step {
    Attempting(u32),
    WaitThenRetry { attempt: u32, delay: Duration },
    Done(Result<String, FetchError>),
}

pub struct RetryingFetcher {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(transport: Arc<dyn Transport>, limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            limiter,
            policy: RetryPolicy {
                max_attempts: policy.max_attempts.max(1),
                ..policy
            },
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches and deserializes a JSON body
    pub async fn fetch<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, FetchError> {
        let body = self.fetch_text(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Runs the request to a terminal state and returns the raw success body
    pub async fn fetch_text(&self, request: &ApiRequest) -> Result<String, FetchError> {
        let mut step = Step::Attempting(1);
        loop {
            step = match step {
                Step::Attempting(attempt) => {
                    self.limiter.acquire().await;
                    tracing::debug!(context = %request.context, attempt, path = %request.path, "dispatching");
                    let result = self.transport.send(request).await;
                    self.next_step(request, attempt, result)
                }
                Step::WaitThenRetry { attempt, delay } => {
                    tokio::time::sleep(delay).await;
                    Step::Attempting(attempt + 1)
                }
                Step::Done(result) => return result,
            };
        }
    }

    fn next_step(
        &self,
        request: &ApiRequest,
        attempt: u32,
        result: Result<ApiResponse, TransportError>,
    ) -> Step {
        match result {
            Ok(response) if response.status.is_success() => Step::Done(Ok(response.body)),
            Ok(response) if response.status == StatusCode::TOO_MANY_REQUESTS => self.retry_or_fail(
                request,
                attempt,
                response.retry_after,
                format!("status {}", response.status),
            ),
            Ok(response) => Step::Done(Err(FetchError::Status {
                status: response.status,
                body: response.body,
            })),
            Err(TransportError::Retryable(reason)) => {
                self.retry_or_fail(request, attempt, None, reason)
            }
            Err(TransportError::Fatal(reason)) => Step::Done(Err(FetchError::Transport(reason))),
        }
    }

    fn retry_or_fail(
        &self,
        request: &ApiRequest,
        attempt: u32,
        hint: Option<Duration>,
        reason: String,
    ) -> Step {
        if attempt >= self.policy.max_attempts {
            tracing::warn!(context = %request.context, attempt, %reason, "retries exhausted");
            return Step::Done(Err(FetchError::Exhausted {
                attempts: attempt,
                last: reason,
            }));
        }

        let delay = hint.unwrap_or_else(|| self.policy.backoff(attempt));
        tracing::warn!(
            context = %request.context,
            attempt,
            delay_ms = delay.as_millis() as u64,
            from_server = hint.is_some(),
            %reason,
            "request throttled, retrying"
        );
        Step::WaitThenRetry { attempt, delay }
    }
}
