// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cached, pool-backed analytics reads.

use super::{mmr, period, recommend};
use super::{AnalyticsSnapshot, MmrTrajectory, MmrWeights, Period, PeriodStats, Recommendation};
use crate::cache::{AnalyticsCache, AnalyticsKind, CacheKey, TtlClass, TtlDurations};
use crate::model::{PlayerMatch, PlayerRef};
use crate::store::MatchStore;
use crate::worker::{AnalyticsTask, Priority, TaskRunner, WorkerError, WorkerPool};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// How much history feeds a computation. The sync ceiling keeps growth
/// incremental; this bounds the read side.
const HISTORY_LIMIT: usize = 200;

/// Analytics read path: fresh cache hit, stale hit + background refresh, or
/// compute (preferably on the pool, inline when it is saturated).
///
/// Reads never hard-fail: an empty or unreachable store degrades to
/// zero-valued snapshots, and cache errors are logged misses.
pub struct AnalyticsService {
    store: Arc<dyn MatchStore>,
    cache: Arc<dyn AnalyticsCache>,
    ttls: TtlDurations,
    weights: MmrWeights,
    // Set after construction; the pool needs the service as its runner.
    pool: OnceLock<Arc<WorkerPool>>,
}

impl AnalyticsService {
    pub fn new(
        store: Arc<dyn MatchStore>,
        cache: Arc<dyn AnalyticsCache>,
        ttls: TtlDurations,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            cache,
            ttls,
            weights: MmrWeights::default(),
            pool: OnceLock::new(),
        })
    }

    /// Wire in the worker pool. Called once during engine assembly.
    pub fn attach_pool(&self, pool: Arc<WorkerPool>) {
        let _ = self.pool.set(pool);
    }

    pub async fn period_stats(&self, player: &PlayerRef, period: Period) -> PeriodStats {
        let task = AnalyticsTask::PeriodStats {
            player: player.clone(),
            period,
        };
        match self.read(&task).await {
            AnalyticsSnapshot::Period(stats) => stats,
            other => {
                // A kind mismatch means a poisoned cache entry; recompute.
                warn!(kind = other.kind(), "unexpected snapshot kind for period stats");
                match self.compute_now(&task).await {
                    AnalyticsSnapshot::Period(stats) => stats,
                    _ => PeriodStats {
                        period,
                        ..Default::default()
                    },
                }
            }
        }
    }

    pub async fn mmr_trajectory(&self, player: &PlayerRef) -> MmrTrajectory {
        let task = AnalyticsTask::MmrTrajectory {
            player: player.clone(),
        };
        match self.read(&task).await {
            AnalyticsSnapshot::Mmr(trajectory) => trajectory,
            other => {
                warn!(kind = other.kind(), "unexpected snapshot kind for mmr");
                MmrTrajectory::default()
            }
        }
    }

    pub async fn recommendations(&self, player: &PlayerRef) -> Vec<Recommendation> {
        let task = AnalyticsTask::Recommendations {
            player: player.clone(),
        };
        match self.read(&task).await {
            AnalyticsSnapshot::Recommendations(recs) => recs,
            other => {
                warn!(kind = other.kind(), "unexpected snapshot kind for recommendations");
                Vec::new()
            }
        }
    }

    fn key_for(task: &AnalyticsTask) -> CacheKey {
        let player = task.player();
        match task {
            AnalyticsTask::PeriodStats { period, .. } => {
                CacheKey::new(player.id, AnalyticsKind::PeriodStats, period.as_str())
            }
            AnalyticsTask::MmrTrajectory { .. } => {
                CacheKey::new(player.id, AnalyticsKind::MmrTrajectory, "all")
            }
            AnalyticsTask::Recommendations { .. } | AnalyticsTask::WarmCache { .. } => {
                CacheKey::new(player.id, AnalyticsKind::Recommendations, "all")
            }
        }
    }

    fn ttl_for(&self, task: &AnalyticsTask) -> std::time::Duration {
        let class = match task {
            AnalyticsTask::PeriodStats { period, .. } => match period {
                Period::Day | Period::Week => TtlClass::Short,
                Period::Month => TtlClass::Medium,
                Period::Season => TtlClass::Long,
            },
            AnalyticsTask::MmrTrajectory { .. } => TtlClass::Medium,
            AnalyticsTask::Recommendations { .. } | AnalyticsTask::WarmCache { .. } => {
                TtlClass::Medium
            }
        };
        self.ttls.duration(class)
    }

    /// Cache-first read. Stale hits are returned as-is with a low-priority
    /// refresh scheduled behind them.
    async fn read(&self, task: &AnalyticsTask) -> AnalyticsSnapshot {
        let key = Self::key_for(task);
        let kind = task.kind();

        match self.cache.get(&key).await {
            Ok(Some(hit)) if hit.fresh => {
                crate::metrics::record_cache_lookup(kind, "hit");
                return hit.snapshot;
            }
            Ok(Some(hit)) => {
                crate::metrics::record_cache_lookup(kind, "stale");
                self.schedule_refresh(task);
                return hit.snapshot;
            }
            Ok(None) => {
                crate::metrics::record_cache_lookup(kind, "miss");
            }
            Err(e) => {
                // Cache trouble never propagates; it just costs a recompute.
                warn!(key = %key, error = %e, "cache read failed, treating as miss");
                crate::metrics::record_cache_lookup(kind, "error");
            }
        }

        // Prefer the pool; fall back inline on saturation or timeout.
        if let Some(pool) = self.pool.get() {
            match pool.submit(task.clone(), Priority::High) {
                Ok(handle) => match handle.wait().await {
                    Ok(snapshot) => return snapshot,
                    Err(e) => {
                        warn!(kind, error = %e, "pooled computation failed, computing inline");
                    }
                },
                Err(e) => {
                    debug!(kind, error = %e, "pool unavailable, computing inline");
                }
            }
        }
        self.compute_now(task).await
    }

    fn schedule_refresh(&self, task: &AnalyticsTask) {
        if let Some(pool) = self.pool.get() {
            // Rejection is fine; the stale value was already served.
            if pool.submit(task.clone(), Priority::Low).is_ok() {
                debug!(kind = task.kind(), "scheduled background refresh");
            }
        }
    }

    /// Load history; store failures degrade to an empty history (the caller
    /// already tried the cache).
    async fn load_history(&self, player: &PlayerRef) -> Option<Vec<PlayerMatch>> {
        match self
            .store
            .player_matches(&player.puuid, HISTORY_LIMIT, 0)
            .await
        {
            Ok(matches) => Some(matches),
            Err(e) => {
                warn!(player_id = player.id, error = %e, "match store read failed");
                crate::metrics::record_store_error("player_matches");
                None
            }
        }
    }

    /// Compute a snapshot now, caching the result when the store was
    /// reachable. Also the execution path for pooled tasks.
    async fn compute_now(&self, task: &AnalyticsTask) -> AnalyticsSnapshot {
        let player = task.player();
        let (snapshot, cacheable) = match self.load_history(player).await {
            Some(history) => (self.compute_from(task, &history), true),
            // Zero-valued result, but never cached as the truth.
            None => (self.compute_from(task, &[]), false),
        };

        if cacheable {
            let key = Self::key_for(task);
            if let Err(e) = self
                .cache
                .set(&key, &snapshot, self.ttl_for(task))
                .await
            {
                warn!(key = %key, error = %e, "cache write failed");
            }
        }
        snapshot
    }

    fn compute_from(&self, task: &AnalyticsTask, history: &[PlayerMatch]) -> AnalyticsSnapshot {
        match task {
            AnalyticsTask::PeriodStats { period, .. } => {
                AnalyticsSnapshot::Period(period::compute(history, *period, Utc::now()))
            }
            AnalyticsTask::MmrTrajectory { .. } => {
                AnalyticsSnapshot::Mmr(mmr::compute(history, &self.weights))
            }
            AnalyticsTask::Recommendations { .. } | AnalyticsTask::WarmCache { .. } => {
                AnalyticsSnapshot::Recommendations(recommend::compute(history))
            }
        }
    }

    /// Recompute and cache all artifacts for a player. Used by the
    /// post-sync warm-up task.
    async fn warm(&self, player: &PlayerRef) -> AnalyticsSnapshot {
        for period in [Period::Day, Period::Week, Period::Month, Period::Season] {
            let task = AnalyticsTask::PeriodStats {
                player: player.clone(),
                period,
            };
            self.compute_now(&task).await;
        }
        self.compute_now(&AnalyticsTask::MmrTrajectory {
            player: player.clone(),
        })
        .await;
        self.compute_now(&AnalyticsTask::Recommendations {
            player: player.clone(),
        })
        .await
    }
}

#[async_trait]
impl TaskRunner for AnalyticsService {
    async fn run(&self, task: AnalyticsTask) -> Result<AnalyticsSnapshot, WorkerError> {
        match &task {
            AnalyticsTask::WarmCache { player } => Ok(self.warm(player).await),
            _ => Ok(self.compute_now(&task).await),
        }
    }
}
