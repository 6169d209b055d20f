//! # MatchSync
//!
//! A rate-limit-aware match history sync and analytics engine for Riot-style
//! game APIs.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Sync Orchestrator                      │
//! │  • One live job per player, pending → running → terminal   │
//! │  • Set-diff against the store, bounded concurrent fetches  │
//! │  • Cancellation, progress counters, auto-sync sweeps       │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                               │
//!                 ▼                               ▼
//! ┌──────────────────────────────┐ ┌──────────────────────────────┐
//! │       API Gateway            │ │         Match Store          │
//! │  • Rolling request budget    │ │  • Idempotent upserts        │
//! │  • Backoff with jitter       │ │  • SQLite or in-memory       │
//! │  • Error taxonomy            │ │  • Last-sync bookkeeping     │
//! └──────────────────────────────┘ └──────────────────────────────┘
//!                                                 │
//!                                                 ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Analytics Service                       │
//! │  • Period stats, MMR trajectory, recommendations           │
//! │  • Worker pool with priority lanes and timeouts            │
//! │  • Redis/memory cache: TTL classes, serve-stale refresh    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use matchsync::{
//!     AnalyticsService, MatchSyncConfig, MemoryCache, Period, PlayerRef,
//!     RateLimitedGateway, RequestBudget, RiotHttpClient,
//!     InMemoryMatchStore, SyncOrchestrator, WorkerPool,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = MatchSyncConfig::default();
//!
//!     let api = RiotHttpClient::new("RGAPI-...").expect("http client");
//!     let gateway = Arc::new(RateLimitedGateway::new(
//!         Arc::new(api),
//!         RequestBudget::new(config.requests_per_window, config.window()),
//!         config.retry(),
//!         config.call_timeout(),
//!     ));
//!
//!     let store = Arc::new(InMemoryMatchStore::new());
//!     let cache = Arc::new(MemoryCache::new());
//!
//!     let service = AnalyticsService::new(store.clone(), cache.clone(), config.ttls());
//!     let pool = WorkerPool::new(
//!         service.clone(),
//!         config.worker_count,
//!         config.queue_capacity,
//!         config.task_timeout(),
//!     );
//!     service.attach_pool(pool.clone());
//!
//!     let orchestrator = SyncOrchestrator::new(
//!         gateway,
//!         store,
//!         cache,
//!         pool,
//!         config.sync_match_ceiling,
//!         config.sync_fetch_concurrency,
//!     );
//!
//!     let player = PlayerRef::new(1, "puuid-...", "euw1");
//!     let report = orchestrator.sync_player(&player).await.expect("sync");
//!     println!("synced {} new matches", report.matches_new);
//!
//!     let stats = service.period_stats(&player, Period::Week).await;
//!     println!("week win rate: {:.1}%", stats.win_rate);
//! }
//! ```
//!
//! ## Features
//!
//! - **Rate-Limited Gateway**: Rolling request budget with retry, backoff and
//!   jitter; upstream `Retry-After` hints honored
//! - **Idempotent Store**: Re-syncing is always safe; unchanged matches are
//!   detected and skipped
//! - **Incremental Sync**: Only matches absent from the store are fetched,
//!   with bounded concurrency per job
//! - **Priority Worker Pool**: Interactive reads pre-empt background warm-ups;
//!   per-task timeouts keep workers live
//! - **Serve-Stale Caching**: Expired entries are served once while a refresh
//!   runs in the background; a dead Redis degrades to compute-through
//! - **Auto-Sync**: Periodic sweeps re-sync players whose history has gone
//!   stale
//!
//! ## Configuration
//!
//! See [`MatchSyncConfig`] for all configuration options.
//!
//! ## Modules
//!
//! - [`sync`]: The [`SyncOrchestrator`] driving per-player sync jobs
//! - [`gateway`]: Rate-limited upstream API access
//! - [`store`]: Match persistence (SQLite, in-memory)
//! - [`cache`]: Analytics snapshot cache (Redis, in-memory)
//! - [`worker`]: Bounded analytics worker pool
//! - [`analytics`]: Period stats, MMR trajectory, recommendations
//! - [`backoff`]: Retry policies shared by gateway and backends
//! - [`metrics`]: Metric recording helpers

pub mod analytics;
pub mod backoff;
pub mod cache;
pub mod config;
pub mod gateway;
pub mod metrics;
pub mod model;
pub mod store;
pub mod sync;
pub mod worker;

pub use analytics::{
    AnalyticsService, AnalyticsSnapshot, MmrTrajectory, Period, PeriodStats, Recommendation, Trend,
};
pub use backoff::RetryConfig;
pub use cache::{AnalyticsCache, AnalyticsKind, CacheKey, MemoryCache, RedisCache, TtlDurations};
pub use config::MatchSyncConfig;
pub use gateway::{
    ApiError, GatewayError, MatchApi, RateLimitedGateway, RequestBudget, RiotHttpClient,
};
pub use metrics::LatencyTimer;
pub use model::{MatchRecord, Participant, PlayerMatch, PlayerRef};
pub use store::{InMemoryMatchStore, MatchStore, SqlMatchStore, StoreError, UpsertOutcome};
pub use sync::{SyncError, SyncJobReport, SyncOrchestrator, SyncStatus};
pub use worker::{AnalyticsTask, PoolStats, Priority, SubmitError, WorkerError, WorkerPool};
