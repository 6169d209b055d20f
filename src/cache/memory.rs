//! In-process analytics cache backed by DashMap.

use super::{AnalyticsCache, AnalyticsKind, CacheError, CacheKey, CachedSnapshot};
use crate::analytics::AnalyticsSnapshot;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct Entry {
    player_id: i64,
    kind: AnalyticsKind,
    snapshot: AnalyticsSnapshot,
    stored_at: Instant,
    ttl: Duration,
}

/// In-process [`AnalyticsCache`].
///
/// Expired entries are kept until overwritten or invalidated so the service
/// can serve them stale while a refresh runs. The per-player entry count is
/// small (kinds x parameter values), so no eviction is needed.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl AnalyticsCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedSnapshot>, CacheError> {
        Ok(self.entries.get(&key.to_string()).map(|entry| CachedSnapshot {
            snapshot: entry.snapshot.clone(),
            fresh: entry.stored_at.elapsed() < entry.ttl,
        }))
    }

    async fn set(
        &self,
        key: &CacheKey,
        snapshot: &AnalyticsSnapshot,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                player_id: key.player_id,
                kind: key.kind,
                snapshot: snapshot.clone(),
                stored_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn invalidate_player(&self, player_id: i64) -> Result<usize, CacheError> {
        // Counted inside the closure; comparing map sizes around the retain
        // would misattribute concurrent inserts.
        let mut dropped = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.player_id != player_id;
            if !keep {
                dropped += 1;
            }
            keep
        });
        crate::metrics::record_cache_invalidation(dropped);
        Ok(dropped)
    }

    async fn invalidate_kind(
        &self,
        player_id: i64,
        kind: AnalyticsKind,
    ) -> Result<usize, CacheError> {
        let mut dropped = 0;
        self.entries.retain(|_, entry| {
            let keep = !(entry.player_id == player_id && entry.kind == kind);
            if !keep {
                dropped += 1;
            }
            keep
        });
        crate::metrics::record_cache_invalidation(dropped);
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{AnalyticsSnapshot, PeriodStats};

    fn snapshot() -> AnalyticsSnapshot {
        AnalyticsSnapshot::Period(PeriodStats::default())
    }

    fn key(player: i64, kind: AnalyticsKind) -> CacheKey {
        CacheKey::new(player, kind, "week")
    }

    #[tokio::test]
    async fn test_set_get_fresh() {
        let cache = MemoryCache::new();
        let k = key(1, AnalyticsKind::PeriodStats);
        cache
            .set(&k, &snapshot(), Duration::from_secs(60))
            .await
            .unwrap();

        let hit = cache.get(&k).await.unwrap().unwrap();
        assert!(hit.fresh);
    }

    #[tokio::test]
    async fn test_expired_entry_served_stale() {
        let cache = MemoryCache::new();
        let k = key(1, AnalyticsKind::PeriodStats);
        cache.set(&k, &snapshot(), Duration::ZERO).await.unwrap();

        let hit = cache.get(&k).await.unwrap().unwrap();
        assert!(!hit.fresh, "zero-TTL entry must come back stale");
    }

    #[tokio::test]
    async fn test_miss_on_absent_key() {
        let cache = MemoryCache::new();
        assert!(cache
            .get(&key(9, AnalyticsKind::MmrTrajectory))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_invalidate_player_scoped() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache
            .set(&key(1, AnalyticsKind::PeriodStats), &snapshot(), ttl)
            .await
            .unwrap();
        cache
            .set(&key(1, AnalyticsKind::MmrTrajectory), &snapshot(), ttl)
            .await
            .unwrap();
        cache
            .set(&key(2, AnalyticsKind::PeriodStats), &snapshot(), ttl)
            .await
            .unwrap();

        let dropped = cache.invalidate_player(1).await.unwrap();
        assert_eq!(dropped, 2);
        assert!(cache
            .get(&key(1, AnalyticsKind::PeriodStats))
            .await
            .unwrap()
            .is_none());
        // Player 2 untouched.
        assert!(cache
            .get(&key(2, AnalyticsKind::PeriodStats))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invalidate_count_exact_under_concurrent_writes() {
        use std::sync::Arc;

        let cache = Arc::new(MemoryCache::new());
        let ttl = Duration::from_secs(60);

        // Other players keep writing while the victim is invalidated; the
        // reported drop count must cover the victim's entries only.
        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for i in 0..200i64 {
                    let k = CacheKey::new(1000 + i, AnalyticsKind::PeriodStats, "week");
                    cache.set(&k, &snapshot(), Duration::from_secs(60)).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        for _ in 0..20 {
            cache
                .set(&key(1, AnalyticsKind::PeriodStats), &snapshot(), ttl)
                .await
                .unwrap();
            cache
                .set(&key(1, AnalyticsKind::MmrTrajectory), &snapshot(), ttl)
                .await
                .unwrap();
            let dropped = cache.invalidate_player(1).await.unwrap();
            assert_eq!(dropped, 2);
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_kind_scoped() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache
            .set(&key(1, AnalyticsKind::PeriodStats), &snapshot(), ttl)
            .await
            .unwrap();
        cache
            .set(&key(1, AnalyticsKind::Recommendations), &snapshot(), ttl)
            .await
            .unwrap();

        let dropped = cache
            .invalidate_kind(1, AnalyticsKind::Recommendations)
            .await
            .unwrap();
        assert_eq!(dropped, 1);
        assert!(cache
            .get(&key(1, AnalyticsKind::PeriodStats))
            .await
            .unwrap()
            .is_some());
    }
}
