//! Configuration for the match sync engine.
//!
//! # Example
//!
//! ```
//! use matchsync::MatchSyncConfig;
//!
//! // Minimal config (uses defaults)
//! let config = MatchSyncConfig::default();
//! assert_eq!(config.requests_per_window, 100);
//!
//! // Full config
//! let config = MatchSyncConfig {
//!     api_key: "RGAPI-...".into(),
//!     redis_url: Some("redis://localhost:6379".into()),
//!     sql_url: Some("sqlite:matches.db".into()),
//!     sync_match_ceiling: 50,
//!     worker_count: 8,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;
use std::time::Duration;

/// Configuration for the match sync engine.
///
/// All fields have sensible defaults. At minimum, you should configure
/// `api_key` for production use; without `redis_url` the analytics cache
/// falls back to the in-process map, and without `sql_url` the match store
/// is in-memory only.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchSyncConfig {
    /// API key sent with every upstream request
    #[serde(default)]
    pub api_key: String,

    /// Default region for players that do not carry one (e.g., "euw1")
    #[serde(default = "default_region")]
    pub default_region: String,

    /// Redis connection string (e.g., "redis://localhost:6379")
    #[serde(default)]
    pub redis_url: Option<String>,

    /// SQL connection string (e.g., "sqlite:matches.db")
    #[serde(default)]
    pub sql_url: Option<String>,

    /// Request budget: requests allowed per rolling window
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: usize,
    /// Request budget: rolling window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Per-call timeout for upstream API requests, in milliseconds
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Retry attempts per gateway call before giving up
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,

    /// Max matches fetched per sync run
    #[serde(default = "default_sync_match_ceiling")]
    pub sync_match_ceiling: usize,
    /// Concurrent detail fetches per sync run
    #[serde(default = "default_sync_fetch_concurrency")]
    pub sync_fetch_concurrency: usize,

    /// Worker pool size
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Bounded queue capacity per priority lane
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Per-task computation timeout in milliseconds
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,

    /// TTL class durations in seconds
    #[serde(default = "default_ttl_short_secs")]
    pub ttl_short_secs: u64,
    #[serde(default = "default_ttl_medium_secs")]
    pub ttl_medium_secs: u64,
    #[serde(default = "default_ttl_long_secs")]
    pub ttl_long_secs: u64,

    /// Auto-sync sweep interval in seconds (0 = disabled)
    #[serde(default = "default_auto_sync_interval_secs")]
    pub auto_sync_interval_secs: u64,
    /// A player is stale when last synced longer ago than this
    #[serde(default = "default_auto_sync_stale_secs")]
    pub auto_sync_stale_secs: u64,
    /// Max players picked up per auto-sync sweep
    #[serde(default = "default_auto_sync_batch")]
    pub auto_sync_batch: usize,
}

fn default_region() -> String { "euw1".into() }
fn default_requests_per_window() -> usize { 100 }
fn default_window_secs() -> u64 { 120 } // 100 requests / 2 minutes
fn default_call_timeout_ms() -> u64 { 10_000 }
fn default_retry_attempts() -> usize { 4 }
fn default_sync_match_ceiling() -> usize { 20 }
fn default_sync_fetch_concurrency() -> usize { 4 }
fn default_worker_count() -> usize { 4 }
fn default_queue_capacity() -> usize { 64 }
fn default_task_timeout_ms() -> u64 { 30_000 }
fn default_ttl_short_secs() -> u64 { 300 } // 5 minutes
fn default_ttl_medium_secs() -> u64 { 3600 } // 1 hour
fn default_ttl_long_secs() -> u64 { 86_400 } // 24 hours
fn default_auto_sync_interval_secs() -> u64 { 1800 }
fn default_auto_sync_stale_secs() -> u64 { 3600 }
fn default_auto_sync_batch() -> usize { 10 }

impl Default for MatchSyncConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            default_region: default_region(),
            redis_url: None,
            sql_url: None,
            requests_per_window: default_requests_per_window(),
            window_secs: default_window_secs(),
            call_timeout_ms: default_call_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            sync_match_ceiling: default_sync_match_ceiling(),
            sync_fetch_concurrency: default_sync_fetch_concurrency(),
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            task_timeout_ms: default_task_timeout_ms(),
            ttl_short_secs: default_ttl_short_secs(),
            ttl_medium_secs: default_ttl_medium_secs(),
            ttl_long_secs: default_ttl_long_secs(),
            auto_sync_interval_secs: default_auto_sync_interval_secs(),
            auto_sync_stale_secs: default_auto_sync_stale_secs(),
            auto_sync_batch: default_auto_sync_batch(),
        }
    }
}

impl MatchSyncConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Gateway retry policy with `retry_attempts` as the bound.
    pub fn retry(&self) -> crate::backoff::RetryConfig {
        crate::backoff::RetryConfig {
            max_attempts: self.retry_attempts.max(1),
            ..crate::backoff::RetryConfig::gateway()
        }
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn auto_sync_interval(&self) -> Option<Duration> {
        (self.auto_sync_interval_secs > 0)
            .then(|| Duration::from_secs(self.auto_sync_interval_secs))
    }

    pub fn auto_sync_staleness(&self) -> Duration {
        Duration::from_secs(self.auto_sync_stale_secs)
    }

    pub fn ttls(&self) -> crate::cache::TtlDurations {
        crate::cache::TtlDurations::from_config(self)
    }
}
