// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Rate-limited gateway to the remote game-data API.
//!
//! All upstream traffic flows through [`RateLimitedGateway`], which layers a
//! rolling-window request budget, a per-call timeout and bounded retries with
//! exponential backoff over any [`MatchApi`] implementation. Callers never
//! talk to the raw client directly, so the remote rate limit is respected
//! even when many sync jobs run at once.

mod http;
mod rate_limit;

pub use http::RiotHttpClient;
pub use rate_limit::RequestBudget;

use crate::backoff::RetryConfig;
use crate::model::{MatchRecord, Participant, PlayerRef};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Raw client error, before retry policy is applied.
///
/// [`RateLimitedGateway`] maps these into [`GatewayError`] once its retry
/// budget is exhausted.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// Remote side asked us to slow down (HTTP 429).
    #[error("throttled by upstream")]
    Throttled { retry_after: Option<Duration> },

    /// Transient upstream failure (5xx, connect error, timeout).
    #[error("transient upstream failure: {0}")]
    Transient(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Upstream responded but the payload was not usable.
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl ApiError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled { .. } | Self::Transient(_))
    }
}

/// Error surface of the gateway, as seen by the sync orchestrator.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Request budget and retry attempts exhausted while throttled.
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: usize },

    /// Upstream kept failing transiently until attempts ran out.
    #[error("upstream unavailable after {attempts} attempts: {message}")]
    UpstreamUnavailable { attempts: usize, message: String },

    /// The requested resource does not exist. Not retryable.
    #[error("not found: {0}")]
    NotFound(String),

    /// Upstream responded with an unusable payload. Not retryable.
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    fn from_exhausted(err: ApiError, attempts: usize) -> Self {
        match err {
            ApiError::Throttled { .. } => Self::RateLimitExceeded { attempts },
            ApiError::Transient(message) => Self::UpstreamUnavailable { attempts, message },
            ApiError::NotFound(what) => Self::NotFound(what),
            ApiError::Malformed(what) => Self::InvalidResponse(what),
        }
    }
}

/// Minimal surface of the remote match API.
///
/// Implemented by [`RiotHttpClient`] for production and by scripted fakes in
/// tests. Implementations do shape translation only; throttling and retries
/// live in the gateway wrapper.
#[async_trait]
pub trait MatchApi: Send + Sync {
    /// List the most recent match identifiers for a player, newest first.
    async fn recent_match_ids(
        &self,
        player: &PlayerRef,
        limit: usize,
    ) -> Result<Vec<String>, ApiError>;

    /// Fetch the full record for one match.
    async fn match_detail(
        &self,
        match_id: &str,
    ) -> Result<(MatchRecord, Vec<Participant>), ApiError>;
}

/// Rate-limited, retrying wrapper around a [`MatchApi`].
pub struct RateLimitedGateway {
    client: Arc<dyn MatchApi>,
    budget: RequestBudget,
    retry: RetryConfig,
    call_timeout: Duration,
}

impl RateLimitedGateway {
    pub fn new(
        client: Arc<dyn MatchApi>,
        budget: RequestBudget,
        retry: RetryConfig,
        call_timeout: Duration,
    ) -> Self {
        Self {
            client,
            budget,
            retry,
            call_timeout,
        }
    }

    /// List recent match ids for `player`, at most `limit`.
    #[tracing::instrument(skip(self), fields(player_id = player.id))]
    pub async fn fetch_recent_match_ids(
        &self,
        player: &PlayerRef,
        limit: usize,
    ) -> Result<Vec<String>, GatewayError> {
        let _timer = crate::metrics::LatencyTimer::new("match_ids");
        self.call("match_ids", || self.client.recent_match_ids(player, limit))
            .await
    }

    /// Fetch the full record for one match.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_match_detail(
        &self,
        match_id: &str,
    ) -> Result<(MatchRecord, Vec<Participant>), GatewayError> {
        let _timer = crate::metrics::LatencyTimer::new("match_detail");
        self.call("match_detail", || self.client.match_detail(match_id))
            .await
    }

    /// Shared call path: budget slot, per-attempt timeout, bounded retries.
    ///
    /// A timed-out attempt counts as transient; the request may still land
    /// upstream, which is why the store layer is idempotent. An explicit
    /// `Retry-After` from the remote side overrides the computed backoff.
    async fn call<T, F, Fut>(&self, endpoint: &'static str, mut op: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.budget.acquire().await;

            let outcome = match timeout(self.call_timeout, op()).await {
                Ok(res) => res,
                Err(_) => Err(ApiError::Transient(format!(
                    "call timed out after {:?}",
                    self.call_timeout
                ))),
            };

            match outcome {
                Ok(val) => {
                    if attempt > 1 {
                        debug!(endpoint, attempt, "gateway call succeeded after retries");
                    }
                    crate::metrics::record_gateway_call(endpoint, "success");
                    return Ok(val);
                }
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = match &err {
                        ApiError::Throttled {
                            retry_after: Some(hint),
                        } => (*hint).min(self.retry.max_delay),
                        _ => self.retry.delay_for(attempt),
                    };
                    warn!(
                        endpoint,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %err,
                        ?delay,
                        "gateway call failed, retrying"
                    );
                    crate::metrics::record_retry(endpoint);
                    sleep(delay).await;
                }
                Err(err) => {
                    debug!(endpoint, attempt, error = %err, "gateway call failed");
                    crate::metrics::record_gateway_call(endpoint, "error");
                    return Err(GatewayError::from_exhausted(err, attempt));
                }
            }
        }
    }
}
