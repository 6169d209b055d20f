// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis-backed analytics cache.

use super::{AnalyticsCache, AnalyticsKind, CacheError, CacheKey, CachedSnapshot};
use crate::analytics::AnalyticsSnapshot;
use crate::backoff::{self, RetryConfig};
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Redis entries outlive their logical TTL by this factor so a stale value
/// is still there to serve while a refresh runs.
const STALE_RETENTION_FACTOR: u32 = 4;

/// Stored envelope; logical freshness is computed from it, not from the
/// Redis key TTL.
#[derive(Serialize, Deserialize)]
struct Envelope {
    stored_at_ms: i64,
    ttl_ms: u64,
    snapshot: AnalyticsSnapshot,
}

/// Redis-backed [`AnalyticsCache`].
///
/// If the initial connection fails the cache comes up disabled and every
/// operation is a miss. Runtime errors are reported as [`CacheError`]; the
/// analytics service logs and treats them as misses, so a Redis outage only
/// costs recomputation. The connection manager reconnects on its own once
/// the server returns.
pub struct RedisCache {
    connection: Option<ConnectionManager>,
}

impl RedisCache {
    /// Connect to Redis, retrying briefly. A failure yields a disabled cache
    /// rather than an error.
    pub async fn connect(url: &str) -> Self {
        let manager = match redis::Client::open(url) {
            Ok(client) => {
                backoff::retry("redis_connect", &RetryConfig::connect(), |_| true, || {
                    ConnectionManager::new(client.clone())
                })
                .await
            }
            Err(e) => Err(e),
        };

        match manager {
            Ok(connection) => {
                info!(url, "redis analytics cache ready");
                crate::metrics::set_cache_healthy("redis", true);
                Self {
                    connection: Some(connection),
                }
            }
            Err(e) => {
                warn!(url, error = %e, "redis unavailable, analytics cache disabled");
                crate::metrics::set_cache_healthy("redis", false);
                Self { connection: None }
            }
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self { connection: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.connection.is_some()
    }

    async fn matching_keys(
        conn: &mut ConnectionManager,
        pattern: &str,
    ) -> Result<Vec<String>, CacheError> {
        let mut iter = conn
            .scan_match::<&str, String>(pattern)
            .await
            .map_err(|e| CacheError(e.to_string()))?;
        let mut keys = Vec::new();
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<usize, CacheError> {
        let Some(conn) = &self.connection else {
            return Ok(0);
        };
        let mut conn = conn.clone();
        let keys = Self::matching_keys(&mut conn, pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let dropped: usize = conn
            .del(&keys)
            .await
            .map_err(|e| CacheError(e.to_string()))?;
        crate::metrics::record_cache_invalidation(dropped);
        Ok(dropped)
    }
}

#[async_trait]
impl AnalyticsCache for RedisCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedSnapshot>, CacheError> {
        let Some(conn) = &self.connection else {
            return Ok(None);
        };
        let mut conn = conn.clone();
        let raw: Option<String> = conn
            .get(key.to_string())
            .await
            .map_err(|e| CacheError(e.to_string()))?;
        let Some(raw) = raw else { return Ok(None) };

        let envelope: Envelope =
            serde_json::from_str(&raw).map_err(|e| CacheError(format!("decode {key}: {e}")))?;
        let age_ms = Utc::now().timestamp_millis() - envelope.stored_at_ms;
        Ok(Some(CachedSnapshot {
            snapshot: envelope.snapshot,
            fresh: age_ms >= 0 && (age_ms as u64) < envelope.ttl_ms,
        }))
    }

    async fn set(
        &self,
        key: &CacheKey,
        snapshot: &AnalyticsSnapshot,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let Some(conn) = &self.connection else {
            return Ok(());
        };
        let mut conn = conn.clone();
        let envelope = Envelope {
            stored_at_ms: Utc::now().timestamp_millis(),
            ttl_ms: ttl.as_millis() as u64,
            snapshot: snapshot.clone(),
        };
        let raw =
            serde_json::to_string(&envelope).map_err(|e| CacheError(format!("encode {key}: {e}")))?;
        let retention = (ttl * STALE_RETENTION_FACTOR).as_secs().max(1);
        conn.set_ex::<_, _, ()>(key.to_string(), raw, retention)
            .await
            .map_err(|e| CacheError(e.to_string()))?;
        Ok(())
    }

    async fn invalidate_player(&self, player_id: i64) -> Result<usize, CacheError> {
        self.delete_matching(&format!("analytics:{player_id}:*")).await
    }

    async fn invalidate_kind(
        &self,
        player_id: i64,
        kind: AnalyticsKind,
    ) -> Result<usize, CacheError> {
        self.delete_matching(&format!("analytics:{player_id}:{}:*", kind.as_str()))
            .await
    }
}
