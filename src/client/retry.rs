//! Retry with exponential backoff for remote API requests.
//!
//! Transient failures (5xx, 429 and connection problems) are retried according
//! to [`RetryConfig`]. On 429 the server's `X-Rate-Limit-Reset` header, when
//! present, stretches the delay until the limit window resets.

use std::{borrow::Cow, future::Future, time::Duration};

use reqwest::{StatusCode, header::HeaderMap};
use tracing::{debug, warn};

use crate::config::RetryConfig;

const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// Determines if a reqwest error is retryable.
pub fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect()
        || error.is_timeout()
        || error.is_request()
        || error
            .status()
            .map(|s| s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS)
            .unwrap_or(false)
}

/// Cap the number of retries for a single operation.
///
/// Creating a user or changing a password is not idempotent; a blind retry of
/// a request the server already processed would fail or repeat the change.
pub fn with_max_retries(config: &RetryConfig, max_retries: u32) -> Cow<'_, RetryConfig> {
    if config.max_retries <= max_retries {
        Cow::Borrowed(config)
    } else {
        Cow::Owned(RetryConfig {
            max_retries,
            ..config.clone()
        })
    }
}

/// Seconds until the rate limit window resets, capped at the configured
/// maximum delay.
fn rate_limit_delay(config: &RetryConfig, headers: &HeaderMap) -> Option<Duration> {
    let reset = headers
        .get(RATE_LIMIT_RESET_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()?;
    let wait_secs = reset - chrono::Utc::now().timestamp();
    if wait_secs <= 0 {
        return None;
    }
    let wait = Duration::from_secs(wait_secs as u64);
    Some(wait.min(Duration::from_millis(config.max_delay_ms)))
}

/// Execute an HTTP request with retry logic.
///
/// `make_request` is called once per attempt. Returns the first response that
/// is not retryable, the last response once retries are exhausted, or the
/// last transport error.
pub async fn with_retry<F, Fut>(
    config: &RetryConfig,
    operation: &str,
    make_request: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    if !config.enabled {
        return make_request().await;
    }

    let max_attempts = config.max_retries + 1;

    for attempt in 0..max_attempts {
        match make_request().await {
            Ok(response) => {
                let status = response.status();

                if config.should_retry_status(status.as_u16()) && attempt < max_attempts - 1 {
                    let mut delay = config.delay_for_attempt(attempt);
                    if status == StatusCode::TOO_MANY_REQUESTS
                        && let Some(reset) = rate_limit_delay(config, response.headers())
                    {
                        delay = delay.max(reset);
                    }
                    warn!(
                        operation = operation,
                        status = %status,
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis(),
                        "Retryable status code, will retry after delay"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }

                if attempt > 0 {
                    debug!(
                        operation = operation,
                        status = %status,
                        attempt = attempt + 1,
                        "Request completed after retry"
                    );
                }

                return Ok(response);
            }
            Err(error) => {
                if is_retryable_error(&error) && attempt < max_attempts - 1 {
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        operation = operation,
                        error = %error,
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis(),
                        "Retryable error, will retry after delay"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }

                if attempt > 0 {
                    warn!(
                        operation = operation,
                        error = %error,
                        attempts = attempt + 1,
                        "Request failed after all retry attempts"
                    );
                }

                return Err(error);
            }
        }
    }

    unreachable!("Retry loop should have returned")
}
