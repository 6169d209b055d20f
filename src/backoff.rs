// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry logic with exponential backoff and jitter.
//!
//! Provides configurable retry behavior for transient failures.
//! Different presets are available for different use cases.
//!
//! # Example
//!
//! ```
//! use matchsync::RetryConfig;
//!
//! // Gateway calls: bounded attempts, generous cap
//! let gateway = RetryConfig::gateway();
//! assert_eq!(gateway.max_attempts, 4);
//!
//! // Startup: fail fast on bad config
//! let connect = RetryConfig::connect();
//! assert_eq!(connect.max_attempts, 5);
//! ```

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Configuration for retry behavior.
///
/// Use the preset constructors for common patterns:
/// - [`RetryConfig::gateway()`] - Upstream API calls behind the request budget
/// - [`RetryConfig::connect()`] - Fast-fail for initial backend connections
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    /// Total attempts, including the first one. Always bounded.
    pub max_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::gateway()
    }
}

impl RetryConfig {
    /// Retry for upstream API calls. The remote side throttles aggressively,
    /// so the delay doubles from half a second up to a 30 second cap.
    #[must_use]
    pub fn gateway() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
        }
    }

    /// Fast-fail retry for initial backend connections (Redis, SQL).
    /// Attempts 5 times with exponential backoff, failing after ~5 seconds.
    /// Use this during startup to detect configuration errors quickly.
    #[must_use]
    pub fn connect() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
        }
    }

    /// Fast retry for tests (minimal delays)
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            factor: 2.0,
        }
    }

    /// Delay before the next attempt: exponential in the attempt number,
    /// capped, with up to 50% additive jitter so callers that hit the same
    /// throttle window don't retry in lockstep.
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exp = self
            .initial_delay
            .mul_f64(self.factor.powi(attempt.saturating_sub(1) as i32))
            .min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0.0..=0.5);
        exp.mul_f64(1.0 + jitter).min(self.max_delay)
    }
}

/// Retry `operation` until it succeeds, returns a non-retryable error, or
/// attempts are exhausted. `is_retryable` decides which errors are worth
/// another attempt; the last error is returned verbatim either way.
pub async fn retry<F, Fut, T, E, P>(
    operation_name: &str,
    config: &RetryConfig,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(val) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "operation succeeded after retries");
                }
                return Ok(val);
            }
            Err(err) => {
                if !is_retryable(&err) || attempt >= config.max_attempts {
                    return Err(err);
                }

                let delay = config.delay_for(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = config.max_attempts,
                    error = %err,
                    ?delay,
                    "operation failed, retrying"
                );
                crate::metrics::record_retry(operation_name);
                sleep(delay).await;
            }
        }
    }
}
