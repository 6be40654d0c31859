//! Retry policy for device-management API calls.
//!
//! # Retry Strategy
//!
//! - 429 Too Many Requests: wait a fixed delay (10 seconds by default), retry
//! - 500 Internal Server Error: retry immediately
//! - Anything else: terminal, returned to the caller as is
//!
//! At most `max_retries` retries follow the first attempt.

use super::client::ApiResponse;
use crate::Result;
use crate::config::DeploySettings;
use std::time::Duration;
use tracing::warn;

/// HTTP 429.
pub const TOO_MANY_REQUESTS: u16 = 429;

/// HTTP 500.
pub const INTERNAL_SERVER_ERROR: u16 = 500;

/// Retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before retrying a rate-limited request.
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Builds the policy from deploy settings.
    #[must_use]
    pub const fn from_settings(settings: &DeploySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            rate_limit_delay: Duration::from_secs(settings.rate_limit_delay_secs),
        }
    }

    /// Returns `true` for statuses worth retrying.
    #[must_use]
    pub const fn is_retryable(status: u16) -> bool {
        matches!(status, TOO_MANY_REQUESTS | INTERNAL_SERVER_ERROR)
    }

    /// Delay to wait before retrying after `status`.
    #[must_use]
    pub const fn delay_for(&self, status: u16) -> Option<Duration> {
        if status == TOO_MANY_REQUESTS {
            Some(self.rate_limit_delay)
        } else {
            None
        }
    }
}

/// Final response of a retried call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome {
    /// The last response received.
    pub response: ApiResponse,
    /// Attempts made, including the first.
    pub attempts: u32,
}

/// Sends a request until it gets a non-retryable response or retries run out.
///
/// `expected` is the success status. Every other response is logged with its
/// status and body. `sleep` performs the rate-limit wait.
///
/// # Errors
///
/// Returns the first transport error from `send`; those are not retried.
pub fn send_with_retry(
    policy: &RetryPolicy,
    operation: &str,
    expected: u16,
    sleep: &dyn Fn(Duration),
    mut send: impl FnMut() -> Result<ApiResponse>,
) -> Result<RetryOutcome> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let response = send()?;
        if response.status == expected {
            return Ok(RetryOutcome { response, attempts });
        }

        warn!(
            operation,
            status = response.status,
            body = %response.body,
            attempt = attempts,
            "request failed"
        );
        if !RetryPolicy::is_retryable(response.status) || attempts > policy.max_retries {
            return Ok(RetryOutcome { response, attempts });
        }
        if let Some(delay) = policy.delay_for(response.status) {
            sleep(delay);
        }
    }
}
