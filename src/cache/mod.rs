// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Analytics snapshot cache.
//!
//! Caching is an optimization, never a correctness dependency: every error a
//! backend produces is swallowed by the analytics service and treated as a
//! miss. Entries are kept past their TTL so callers can serve a stale value
//! while a background refresh runs.

mod memory;
mod redis;

pub use memory::MemoryCache;
pub use redis::RedisCache;

use crate::analytics::AnalyticsSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors from cache backends. Callers log these and carry on.
#[derive(Error, Debug)]
#[error("cache backend error: {0}")]
pub struct CacheError(pub String);

/// What kind of analytics artifact a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalyticsKind {
    PeriodStats,
    MmrTrajectory,
    Recommendations,
}

impl AnalyticsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PeriodStats => "period_stats",
            Self::MmrTrajectory => "mmr",
            Self::Recommendations => "recommendations",
        }
    }
}

/// Cache key: player, artifact kind and the parameters it was computed with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub player_id: i64,
    pub kind: AnalyticsKind,
    pub params: String,
}

impl CacheKey {
    pub fn new(player_id: i64, kind: AnalyticsKind, params: impl Into<String>) -> Self {
        Self {
            player_id,
            kind,
            params: params.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "analytics:{}:{}:{}",
            self.player_id,
            self.kind.as_str(),
            self.params
        )
    }
}

/// Freshness class. Concrete durations come from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    /// Volatile artifacts (current-period stats). Default 5 minutes.
    Short,
    /// Slow-moving artifacts (MMR trajectory). Default 1 hour.
    Medium,
    /// Near-static artifacts (season aggregates). Default 24 hours.
    Long,
}

/// Resolved TTL durations for the three classes.
#[derive(Debug, Clone, Copy)]
pub struct TtlDurations {
    pub short: Duration,
    pub medium: Duration,
    pub long: Duration,
}

impl Default for TtlDurations {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(300),
            medium: Duration::from_secs(3600),
            long: Duration::from_secs(86_400),
        }
    }
}

impl TtlDurations {
    pub fn from_config(config: &crate::config::MatchSyncConfig) -> Self {
        Self {
            short: Duration::from_secs(config.ttl_short_secs),
            medium: Duration::from_secs(config.ttl_medium_secs),
            long: Duration::from_secs(config.ttl_long_secs),
        }
    }

    pub fn duration(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Short => self.short,
            TtlClass::Medium => self.medium,
            TtlClass::Long => self.long,
        }
    }
}

/// A cached snapshot plus its freshness at read time.
#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    pub snapshot: AnalyticsSnapshot,
    /// False once the entry's TTL has lapsed. Stale values are still
    /// servable; the caller schedules a refresh.
    pub fresh: bool,
}

/// Cache surface used by the analytics service and the sync orchestrator.
#[async_trait]
pub trait AnalyticsCache: Send + Sync {
    /// Look up a snapshot. Expired entries come back with `fresh == false`.
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedSnapshot>, CacheError>;

    /// Store a snapshot under `key` for `ttl`.
    async fn set(
        &self,
        key: &CacheKey,
        snapshot: &AnalyticsSnapshot,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Drop every entry belonging to one player. Other players' entries are
    /// untouched.
    async fn invalidate_player(&self, player_id: i64) -> Result<usize, CacheError>;

    /// Drop one artifact kind for one player.
    async fn invalidate_kind(&self, player_id: i64, kind: AnalyticsKind)
        -> Result<usize, CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_rendering() {
        let key = CacheKey::new(42, AnalyticsKind::PeriodStats, "week");
        assert_eq!(key.to_string(), "analytics:42:period_stats:week");
    }

    #[test]
    fn test_ttl_durations_default() {
        let ttls = TtlDurations::default();
        assert_eq!(ttls.duration(TtlClass::Short), Duration::from_secs(300));
        assert_eq!(ttls.duration(TtlClass::Medium), Duration::from_secs(3600));
        assert_eq!(ttls.duration(TtlClass::Long), Duration::from_secs(86_400));
    }
}
