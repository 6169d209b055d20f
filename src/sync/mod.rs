// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-player sync orchestration.
//!
//! A sync job walks `pending -> running -> {completed | failed | cancelled}`
//! and never leaves a terminal state. The orchestrator enforces one live job
//! per player, diffs the remote id list against the store, fetches missing
//! matches with bounded concurrency and keeps the job's counters current so
//! a poller sees partial progress. Completion invalidates the player's
//! analytics cache and queues a low-priority warm-up task.

use crate::cache::AnalyticsCache;
use crate::gateway::{GatewayError, RateLimitedGateway};
use crate::model::PlayerRef;
use crate::store::{MatchStore, StoreError, UpsertOutcome};
use crate::worker::{AnalyticsTask, Priority, WorkerPool};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Sync job lifecycle. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one job for the polled status surface.
#[derive(Debug, Clone, Serialize)]
pub struct SyncJobReport {
    pub job_id: Uuid,
    pub player_id: i64,
    pub status: SyncStatus,
    pub matches_processed: u64,
    pub matches_new: u64,
    pub matches_updated: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Errors surfaced by sync orchestration.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A non-terminal job already exists for this player; its id is included
    /// so the caller can poll it instead.
    #[error("sync already running for player {player_id} (job {job_id})")]
    AlreadyRunning { player_id: i64, job_id: Uuid },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("sync cancelled")]
    Cancelled,

    /// A fetch task panicked or was aborted.
    #[error("sync task failed: {0}")]
    Internal(String),
}

/// Shared mutable state of one job. Counters are monotonic during a run and
/// updated after each successful upsert.
struct JobState {
    id: Uuid,
    player_id: i64,
    status: RwLock<SyncStatus>,
    processed: AtomicU64,
    new: AtomicU64,
    updated: AtomicU64,
    started_at: DateTime<Utc>,
    finished_at: RwLock<Option<DateTime<Utc>>>,
    error: RwLock<Option<String>>,
    cancel: watch::Sender<bool>,
}

impl JobState {
    fn new(player_id: i64) -> Arc<Self> {
        let (cancel, _) = watch::channel(false);
        Arc::new(Self {
            id: Uuid::new_v4(),
            player_id,
            status: RwLock::new(SyncStatus::Pending),
            processed: AtomicU64::new(0),
            new: AtomicU64::new(0),
            updated: AtomicU64::new(0),
            started_at: Utc::now(),
            finished_at: RwLock::new(None),
            error: RwLock::new(None),
            cancel,
        })
    }

    fn status(&self) -> SyncStatus {
        *self.status.read()
    }

    fn mark_running(&self) {
        let mut status = self.status.write();
        if *status == SyncStatus::Pending {
            *status = SyncStatus::Running;
        }
    }

    /// Move to a terminal state. First writer wins; later transitions are
    /// ignored so a cancel racing a completion cannot reopen the job.
    fn finish(&self, terminal: SyncStatus, error: Option<String>) -> bool {
        debug_assert!(terminal.is_terminal());
        let mut status = self.status.write();
        if status.is_terminal() {
            return false;
        }
        *status = terminal;
        *self.finished_at.write() = Some(Utc::now());
        *self.error.write() = error;
        true
    }

    fn report(&self) -> SyncJobReport {
        SyncJobReport {
            job_id: self.id,
            player_id: self.player_id,
            status: self.status(),
            matches_processed: self.processed.load(Ordering::Relaxed),
            matches_new: self.new.load(Ordering::Relaxed),
            matches_updated: self.updated.load(Ordering::Relaxed),
            started_at: self.started_at,
            finished_at: *self.finished_at.read(),
            error: self.error.read().clone(),
        }
    }
}

/// Owns the sync pipeline: gateway, store, cache invalidation and the
/// post-sync warm-up hand-off to the worker pool.
pub struct SyncOrchestrator {
    gateway: Arc<RateLimitedGateway>,
    store: Arc<dyn MatchStore>,
    cache: Arc<dyn AnalyticsCache>,
    pool: Arc<WorkerPool>,
    /// Most recent job per player; the gate for one-live-job-per-player.
    active: DashMap<i64, Arc<JobState>>,
    /// Jobs by id, for status polling. Bounded: holds each player's latest
    /// job only, so a long-running process does not accumulate history.
    jobs: DashMap<Uuid, Arc<JobState>>,
    match_ceiling: usize,
    fetch_concurrency: usize,
    background: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl SyncOrchestrator {
    pub fn new(
        gateway: Arc<RateLimitedGateway>,
        store: Arc<dyn MatchStore>,
        cache: Arc<dyn AnalyticsCache>,
        pool: Arc<WorkerPool>,
        match_ceiling: usize,
        fetch_concurrency: usize,
    ) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            gateway,
            store,
            cache,
            pool,
            active: DashMap::new(),
            jobs: DashMap::new(),
            match_ceiling: match_ceiling.max(1),
            fetch_concurrency: fetch_concurrency.max(1),
            background: Mutex::new(Vec::new()),
            shutdown,
        })
    }

    /// Claim the per-player slot. The entry API makes the check and the
    /// insert one atomic step, so two racing requests cannot both win.
    fn register(&self, player: &PlayerRef) -> Result<Arc<JobState>, SyncError> {
        use dashmap::mapref::entry::Entry;

        let job = match self.active.entry(player.id) {
            Entry::Occupied(mut slot) => {
                let current = slot.get();
                if !current.status().is_terminal() {
                    return Err(SyncError::AlreadyRunning {
                        player_id: player.id,
                        job_id: current.id,
                    });
                }
                let job = JobState::new(player.id);
                let previous = slot.insert(job.clone());
                // The replaced job is terminal; drop it from the status
                // surface so the map stays bounded by the player count.
                self.jobs.remove(&previous.id);
                job
            }
            Entry::Vacant(slot) => {
                let job = JobState::new(player.id);
                slot.insert(job.clone());
                job
            }
        };
        self.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    /// Run a sync to completion and return the final report. The job is
    /// registered first, so pollers and duplicate requests observe it
    /// throughout.
    #[tracing::instrument(skip(self, player), fields(player_id = player.id))]
    pub async fn sync_player(
        self: &Arc<Self>,
        player: &PlayerRef,
    ) -> Result<SyncJobReport, SyncError> {
        let job = self.register(player)?;
        self.clone().run_job(job.clone(), player.clone()).await;
        Ok(job.report())
    }

    /// Start a sync in the background and return its job id immediately.
    pub fn spawn_sync(self: &Arc<Self>, player: PlayerRef) -> Result<Uuid, SyncError> {
        let job = self.register(&player)?;
        let id = job.id;
        let this = self.clone();
        let handle = tokio::spawn(async move {
            this.run_job(job, player).await;
        });
        self.track_background(handle);
        Ok(id)
    }

    /// Keep the background set bounded: reap handles whose task already
    /// finished before adding the new one.
    fn track_background(&self, handle: JoinHandle<()>) {
        let mut background = self.background.lock();
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    /// Status of any known job.
    pub fn job_report(&self, job_id: Uuid) -> Option<SyncJobReport> {
        self.jobs.get(&job_id).map(|job| job.report())
    }

    /// Latest job for a player, if any.
    pub fn player_report(&self, player_id: i64) -> Option<SyncJobReport> {
        self.active.get(&player_id).map(|job| job.report())
    }

    /// Request cancellation. Returns false for unknown or already-terminal
    /// jobs. The job lands in `Cancelled` once in-flight work unwinds.
    pub fn cancel_job(&self, job_id: Uuid) -> bool {
        let Some(job) = self.jobs.get(&job_id) else {
            return false;
        };
        if job.status().is_terminal() {
            return false;
        }
        let _ = job.cancel.send(true);
        true
    }

    fn running_jobs(&self) -> usize {
        self.active
            .iter()
            .filter(|entry| !entry.status().is_terminal())
            .count()
    }

    /// Periodically re-sync players whose last successful sync is older than
    /// `staleness`. The loop is owned by the orchestrator and stops on
    /// [`SyncOrchestrator::shutdown`].
    pub fn start_auto_sync(self: &Arc<Self>, interval: Duration, staleness: Duration, batch: usize) {
        let this = self.clone();
        let mut stop = self.shutdown.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(?interval, ?staleness, "auto-sync loop started");
            loop {
                tokio::select! {
                    _ = stop.changed() => break,
                    _ = ticker.tick() => {}
                }
                let due = match this.store.players_needing_sync(staleness, batch).await {
                    Ok(due) => due,
                    Err(e) => {
                        warn!(error = %e, "auto-sync sweep failed to list stale players");
                        continue;
                    }
                };
                if due.is_empty() {
                    continue;
                }
                info!(players = due.len(), "auto-sync sweep");
                for player in due {
                    match this.spawn_sync(player) {
                        Ok(_) | Err(SyncError::AlreadyRunning { .. }) => {}
                        Err(e) => warn!(error = %e, "auto-sync spawn failed"),
                    }
                }
            }
            info!("auto-sync loop stopped");
        });
        self.track_background(handle);
    }

    /// Cancel all live jobs, stop the auto-sync loop and join background
    /// tasks.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        for entry in self.active.iter() {
            let _ = entry.cancel.send(true);
        }
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.background.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "sync task panicked during shutdown");
            }
        }
    }

    async fn run_job(self: Arc<Self>, job: Arc<JobState>, player: PlayerRef) {
        job.mark_running();
        crate::metrics::set_jobs_running(self.running_jobs());
        let started = std::time::Instant::now();

        let result = self.run_inner(&job, &player).await;
        let terminal = match &result {
            Ok(()) => {
                job.finish(SyncStatus::Completed, None);
                SyncStatus::Completed
            }
            Err(SyncError::Cancelled) => {
                job.finish(SyncStatus::Cancelled, None);
                SyncStatus::Cancelled
            }
            Err(e) => {
                job.finish(SyncStatus::Failed, Some(e.to_string()));
                SyncStatus::Failed
            }
        };

        let report = job.report();
        crate::metrics::record_sync_job(terminal.as_str());
        crate::metrics::record_sync_duration(started.elapsed());
        crate::metrics::set_jobs_running(self.running_jobs());
        info!(
            job_id = %report.job_id,
            player_id = report.player_id,
            status = %report.status,
            processed = report.matches_processed,
            new = report.matches_new,
            updated = report.matches_updated,
            "sync finished"
        );

        if terminal == SyncStatus::Completed {
            crate::metrics::record_sync_matches(report.matches_new, report.matches_updated);
            self.after_success(&player).await;
        }
    }

    /// Completion side effects. Partial failures here do not fail the job;
    /// the data is already durable.
    async fn after_success(&self, player: &PlayerRef) {
        if let Err(e) = self.store.touch_last_sync(player.id, Utc::now()).await {
            warn!(player_id = player.id, error = %e, "failed to record last sync");
        }
        match self.cache.invalidate_player(player.id).await {
            Ok(dropped) if dropped > 0 => {
                debug!(player_id = player.id, dropped, "analytics cache invalidated");
            }
            Ok(_) => {}
            Err(e) => warn!(player_id = player.id, error = %e, "cache invalidation failed"),
        }
        // Warm-up is best effort; a saturated pool just means the next read
        // computes on demand.
        let _ = self.pool.submit(
            AnalyticsTask::WarmCache {
                player: player.clone(),
            },
            Priority::Low,
        );
    }

    async fn run_inner(&self, job: &Arc<JobState>, player: &PlayerRef) -> Result<(), SyncError> {
        let mut cancel = job.cancel.subscribe();

        // Make sure the player exists for last-sync bookkeeping and
        // auto-sync sweeps.
        self.store.upsert_player(player).await?;

        let ids = tokio::select! {
            biased;
            _ = cancel.changed() => return Err(SyncError::Cancelled),
            ids = self
                .gateway
                .fetch_recent_match_ids(player, self.match_ceiling) => ids?,
        };

        let known = self.store.list_match_ids(&player.puuid).await?;
        let missing: Vec<String> = ids.into_iter().filter(|id| !known.contains(id)).collect();
        debug!(
            player_id = player.id,
            known = known.len(),
            missing = missing.len(),
            "sync diff computed"
        );

        if missing.is_empty() {
            return Ok(());
        }

        let semaphore = Arc::new(Semaphore::new(self.fetch_concurrency));
        let mut fetches = JoinSet::new();
        for match_id in missing {
            let gateway = self.gateway.clone();
            let store = self.store.clone();
            let semaphore = semaphore.clone();
            let mut cancel = job.cancel.subscribe();
            fetches.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| SyncError::Cancelled)?;
                if *cancel.borrow() {
                    return Err(SyncError::Cancelled);
                }
                tokio::select! {
                    biased;
                    _ = cancel.changed() => Err(SyncError::Cancelled),
                    result = async {
                        let (record, participants) = gateway.fetch_match_detail(&match_id).await?;
                        let outcome = store.upsert_match(&record, &participants).await?;
                        Ok::<UpsertOutcome, SyncError>(outcome)
                    } => result,
                }
            });
        }

        let mut cancelled = *cancel.borrow();
        let mut failure: Option<SyncError> = None;
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok(Ok(outcome)) => {
                    // Counter updates land as each fetch finishes, so a
                    // poller observes partial progress.
                    job.processed.fetch_add(1, Ordering::Relaxed);
                    match outcome {
                        UpsertOutcome::Inserted => {
                            job.new.fetch_add(1, Ordering::Relaxed);
                        }
                        UpsertOutcome::Updated => {
                            job.updated.fetch_add(1, Ordering::Relaxed);
                        }
                        UpsertOutcome::Unchanged => {}
                    }
                }
                Ok(Err(SyncError::Cancelled)) => cancelled = true,
                Ok(Err(e)) => {
                    if failure.is_none() {
                        // Fail fast: stop the siblings, keep what landed.
                        let _ = job.cancel.send(true);
                        failure = Some(e);
                    }
                }
                Err(join_error) => {
                    if failure.is_none() {
                        let _ = job.cancel.send(true);
                        failure = Some(SyncError::Internal(join_error.to_string()));
                    }
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if cancelled || *cancel.borrow() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::AnalyticsService;
    use crate::backoff::RetryConfig;
    use crate::cache::{AnalyticsKind, CacheKey, MemoryCache, TtlDurations};
    use crate::gateway::{ApiError, MatchApi, RequestBudget};
    use crate::model::{MatchRecord, Participant};
    use crate::store::InMemoryMatchStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Fake upstream holding a fixed match list; failure modes switchable
    /// per test.
    struct FakeApi {
        ids: Vec<String>,
        throttle_details_after: Option<usize>,
        detail_calls: AtomicUsize,
        detail_delay: Duration,
    }

    impl FakeApi {
        fn with_matches(count: usize) -> Self {
            Self {
                ids: (0..count).map(|i| format!("EUW1_{i}")).collect(),
                throttle_details_after: None,
                detail_calls: AtomicUsize::new(0),
                detail_delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl MatchApi for FakeApi {
        async fn recent_match_ids(
            &self,
            _player: &PlayerRef,
            limit: usize,
        ) -> Result<Vec<String>, ApiError> {
            Ok(self.ids.iter().take(limit).cloned().collect())
        }

        async fn match_detail(
            &self,
            match_id: &str,
        ) -> Result<(MatchRecord, Vec<Participant>), ApiError> {
            let call = self.detail_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(after) = self.throttle_details_after {
                if call >= after {
                    return Err(ApiError::Throttled { retry_after: None });
                }
            }
            if !self.detail_delay.is_zero() {
                tokio::time::sleep(self.detail_delay).await;
            }
            Ok((
                MatchRecord {
                    match_id: match_id.into(),
                    game_start: Utc::now(),
                    duration_secs: 1800,
                    queue_id: 420,
                    game_mode: "CLASSIC".into(),
                },
                vec![Participant {
                    puuid: "p-1".into(),
                    champion_id: 1,
                    champion_name: "Annie".into(),
                    role: "MIDDLE".into(),
                    team_id: 100,
                    kills: 5,
                    deaths: 3,
                    assists: 7,
                    creep_score: 170,
                    gold_earned: 10_500,
                    damage_to_champions: 15_500,
                    vision_score: 21,
                    win: true,
                }],
            ))
        }
    }

    struct Fixture {
        orchestrator: Arc<SyncOrchestrator>,
        store: Arc<InMemoryMatchStore>,
        cache: Arc<MemoryCache>,
        pool: Arc<WorkerPool>,
    }

    fn fixture(api: FakeApi) -> Fixture {
        let store = Arc::new(InMemoryMatchStore::new());
        let cache = Arc::new(MemoryCache::new());
        let gateway = Arc::new(RateLimitedGateway::new(
            Arc::new(api),
            RequestBudget::new(10_000, Duration::from_secs(1)),
            RetryConfig::fast(),
            Duration::from_secs(5),
        ));
        let service = AnalyticsService::new(store.clone(), cache.clone(), TtlDurations::default());
        let pool = WorkerPool::new(service.clone(), 2, 16, Duration::from_secs(5));
        service.attach_pool(pool.clone());
        let orchestrator =
            SyncOrchestrator::new(gateway, store.clone(), cache.clone(), pool.clone(), 20, 4);
        Fixture {
            orchestrator,
            store,
            cache,
            pool,
        }
    }

    fn player() -> PlayerRef {
        PlayerRef::new(1, "p-1", "euw1")
    }

    #[tokio::test]
    async fn test_full_sync_processes_all_matches() {
        let fx = fixture(FakeApi::with_matches(8));
        let report = fx.orchestrator.sync_player(&player()).await.unwrap();

        assert_eq!(report.status, SyncStatus::Completed);
        assert_eq!(report.matches_processed, 8);
        assert_eq!(report.matches_new, 8);
        assert_eq!(report.matches_updated, 0);
        assert_eq!(fx.store.match_count(), 8);
        assert!(report.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_resync_skips_known_matches() {
        let fx = fixture(FakeApi::with_matches(5));
        let first = fx.orchestrator.sync_player(&player()).await.unwrap();
        assert_eq!(first.matches_new, 5);

        let second = fx.orchestrator.sync_player(&player()).await.unwrap();
        assert_eq!(second.status, SyncStatus::Completed);
        assert_eq!(second.matches_processed, 0);
        assert_eq!(second.matches_new, 0);
        assert_eq!(fx.store.match_count(), 5);
    }

    #[tokio::test]
    async fn test_throttled_details_fail_job_keep_partial() {
        let mut api = FakeApi::with_matches(6);
        // Two details succeed; everything after is throttled on every
        // attempt, so the retry budget runs out.
        api.throttle_details_after = Some(2);
        let fx = fixture(api);

        let report = fx.orchestrator.sync_player(&player()).await.unwrap();
        assert_eq!(report.status, SyncStatus::Failed);
        let error = report.error.expect("failed job must carry an error");
        assert!(error.contains("rate limit"), "unexpected error: {error}");
        // Matches fetched before the throttle remain persisted.
        assert!(fx.store.match_count() >= 1);
        assert!(fx.store.match_count() < 6);
    }

    #[tokio::test]
    async fn test_second_sync_rejected_while_running() {
        let mut api = FakeApi::with_matches(4);
        api.detail_delay = Duration::from_millis(200);
        let fx = fixture(api);

        let id = fx.orchestrator.spawn_sync(player()).unwrap();
        // Give the spawned job a moment to claim the slot and start.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = fx.orchestrator.sync_player(&player()).await.unwrap_err();
        match err {
            SyncError::AlreadyRunning { player_id, job_id } => {
                assert_eq!(player_id, 1);
                assert_eq!(job_id, id);
            }
            other => panic!("expected AlreadyRunning, got {other}"),
        }
        fx.orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_cancel_lands_in_cancelled() {
        let mut api = FakeApi::with_matches(10);
        api.detail_delay = Duration::from_millis(500);
        let fx = fixture(api);

        let id = fx.orchestrator.spawn_sync(player()).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(fx.orchestrator.cancel_job(id));

        fx.orchestrator.shutdown().await;
        let report = fx.orchestrator.job_report(id).unwrap();
        assert_eq!(report.status, SyncStatus::Cancelled);
        // Terminal; a second cancel is a no-op.
        assert!(!fx.orchestrator.cancel_job(id));
    }

    #[tokio::test]
    async fn test_completion_invalidates_cache_and_warms() {
        let fx = fixture(FakeApi::with_matches(3));
        // Seed a cache entry that must be dropped by the sync.
        let key = CacheKey::new(1, AnalyticsKind::PeriodStats, "week");
        fx.cache
            .set(
                &key,
                &crate::analytics::AnalyticsSnapshot::Period(Default::default()),
                Duration::from_secs(300),
            )
            .await
            .unwrap();

        let report = fx.orchestrator.sync_player(&player()).await.unwrap();
        assert_eq!(report.status, SyncStatus::Completed);

        // Warm-up task repopulates the cache shortly after.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fx.pool.stats().submitted >= 1);
        fx.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_sync_registers_player_for_auto_sync() {
        let fx = fixture(FakeApi::with_matches(2));
        fx.orchestrator.sync_player(&player()).await.unwrap();

        // Freshly synced, so not due yet.
        let due = fx
            .store
            .players_needing_sync(Duration::from_secs(3600), 10)
            .await
            .unwrap();
        assert!(due.is_empty());

        // But due once the threshold shrinks to zero.
        let due = fx
            .store
            .players_needing_sync(Duration::ZERO, 10)
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_sync_picks_up_stale_players() {
        let fx = fixture(FakeApi::with_matches(3));
        fx.store
            .upsert_player(&PlayerRef::new(7, "p-1", "euw1"))
            .await
            .unwrap();

        fx.orchestrator
            .start_auto_sync(Duration::from_secs(60), Duration::from_secs(3600), 10);
        // First tick fires immediately; let the spawned sync run.
        tokio::time::sleep(Duration::from_millis(500)).await;

        let report = fx.orchestrator.player_report(7).expect("job should exist");
        assert_eq!(report.status, SyncStatus::Completed);
        fx.orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_job_history_keeps_latest_per_player() {
        let fx = fixture(FakeApi::with_matches(2));
        let first = fx.orchestrator.sync_player(&player()).await.unwrap();
        let second = fx.orchestrator.sync_player(&player()).await.unwrap();
        assert_ne!(first.job_id, second.job_id);

        // Registering the replacement drops the older terminal job, so the
        // map stays bounded by the number of tracked players.
        assert!(fx.orchestrator.job_report(first.job_id).is_none());
        assert!(fx.orchestrator.job_report(second.job_id).is_some());
        assert_eq!(fx.orchestrator.jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_finished_background_handles_reaped() {
        let fx = fixture(FakeApi::with_matches(1));
        for i in 0..5 {
            let id = fx
                .orchestrator
                .spawn_sync(PlayerRef::new(100 + i, "p-1", "euw1"))
                .unwrap();
            while fx
                .orchestrator
                .job_report(id)
                .is_some_and(|r| !r.status.is_terminal())
            {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Each spawn reaps the handles of already-finished jobs.
        assert!(fx.orchestrator.background.lock().len() < 5);
        fx.orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_job_report_counters_monotonic_shape() {
        let fx = fixture(FakeApi::with_matches(5));
        let report = fx.orchestrator.sync_player(&player()).await.unwrap();
        assert!(report.matches_new + report.matches_updated <= report.matches_processed);
    }
}
