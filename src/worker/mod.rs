// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded worker pool for analytics computations.
//!
//! A fixed set of tokio workers drains two bounded queues, high priority
//! first. Submission never blocks: a full queue is an immediate
//! [`SubmitError::Saturated`] and the caller computes inline. Every
//! execution runs under a timeout, so a wedged computation costs one worker
//! for the timeout and nothing more. The pool can always make progress;
//! every submitted task completes, times out, or is rejected up front.

use crate::analytics::{AnalyticsSnapshot, Period};
use crate::model::PlayerRef;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// A unit of analytics work.
#[derive(Debug, Clone)]
pub enum AnalyticsTask {
    PeriodStats { player: PlayerRef, period: Period },
    MmrTrajectory { player: PlayerRef },
    Recommendations { player: PlayerRef },
    /// Recompute and cache everything for a player after a sync.
    WarmCache { player: PlayerRef },
}

impl AnalyticsTask {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PeriodStats { .. } => "period_stats",
            Self::MmrTrajectory { .. } => "mmr",
            Self::Recommendations { .. } => "recommendations",
            Self::WarmCache { .. } => "warm_cache",
        }
    }

    pub fn player(&self) -> &PlayerRef {
        match self {
            Self::PeriodStats { player, .. }
            | Self::MmrTrajectory { player }
            | Self::Recommendations { player }
            | Self::WarmCache { player } => player,
        }
    }
}

/// Interactive requests jump the warm-up queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Low,
}

/// Errors produced by task execution.
#[derive(Error, Debug, Clone)]
pub enum WorkerError {
    /// The computation exceeded its deadline and was aborted.
    #[error("computation timed out after {0:?}")]
    ComputationTimeout(Duration),

    /// The runner reported a failure.
    #[error("task failed: {0}")]
    Failed(String),

    /// The pool shut down before the task produced a result.
    #[error("worker pool shut down")]
    Shutdown,
}

/// Errors produced at submission time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Queue full. Compute inline instead of waiting.
    #[error("worker queue saturated")]
    Saturated,

    /// The pool has been shut down.
    #[error("worker pool not running")]
    NotRunning,
}

/// Executes tasks on behalf of the pool. Implemented by the analytics
/// service; injected so the pool stays free of analytics dependencies.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: AnalyticsTask) -> Result<AnalyticsSnapshot, WorkerError>;
}

/// Awaitable result of a submitted task.
#[derive(Debug)]
pub struct TaskHandle {
    rx: oneshot::Receiver<Result<AnalyticsSnapshot, WorkerError>>,
}

impl TaskHandle {
    /// Wait for the task's result. A dropped pool reads as [`WorkerError::Shutdown`].
    pub async fn wait(self) -> Result<AnalyticsSnapshot, WorkerError> {
        self.rx.await.unwrap_or(Err(WorkerError::Shutdown))
    }
}

struct Job {
    task: AnalyticsTask,
    respond: oneshot::Sender<Result<AnalyticsSnapshot, WorkerError>>,
    enqueued: Instant,
}

/// Both priority lanes behind one cursor. Workers take turns holding the
/// lock while idle; `recv` on a closed-and-drained pair returns `None`.
struct LaneReceiver {
    high: mpsc::Receiver<Job>,
    low: mpsc::Receiver<Job>,
}

impl LaneReceiver {
    async fn next(&mut self) -> Option<Job> {
        loop {
            // Drain high priority first when work is already queued.
            match self.high.try_recv() {
                Ok(job) => return Some(job),
                Err(mpsc::error::TryRecvError::Empty | mpsc::error::TryRecvError::Disconnected) => {}
            }
            tokio::select! {
                biased;
                job = self.high.recv() => match job {
                    Some(job) => return Some(job),
                    // High lane closed; finish whatever the low lane holds.
                    None => return self.low.recv().await,
                },
                job = self.low.recv() => match job {
                    Some(job) => return Some(job),
                    None => return self.high.recv().await,
                },
            }
        }
    }
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    rejected: AtomicU64,
    active: AtomicUsize,
    queued: AtomicUsize,
}

/// Point-in-time view of pool activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub active_workers: usize,
    pub queue_depth: usize,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub rejected: u64,
}

struct Lanes {
    high: mpsc::Sender<Job>,
    low: mpsc::Sender<Job>,
}

/// Fixed-size pool of analytics workers.
pub struct WorkerPool {
    lanes: Mutex<Option<Lanes>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers sharing two `queue_capacity`-deep lanes.
    /// `task_timeout` bounds each execution.
    pub fn new(
        runner: Arc<dyn TaskRunner>,
        worker_count: usize,
        queue_capacity: usize,
        task_timeout: Duration,
    ) -> Arc<Self> {
        let worker_count = worker_count.max(1);
        let (high_tx, high_rx) = mpsc::channel(queue_capacity.max(1));
        let (low_tx, low_rx) = mpsc::channel(queue_capacity.max(1));
        let counters = Arc::new(Counters::default());

        let shared_rx = Arc::new(tokio::sync::Mutex::new(LaneReceiver {
            high: high_rx,
            low: low_rx,
        }));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let rx = shared_rx.clone();
            let runner = runner.clone();
            let counters = counters.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = rx.lock().await;
                        rx.next().await
                    };
                    let Some(job) = job else { break };
                    let depth = counters.queued.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
                    crate::metrics::set_queue_depth(depth);
                    execute(worker_id, &*runner, job, task_timeout, &counters).await;
                }
                debug!(worker_id, "analytics worker stopped");
            }));
        }

        info!(worker_count, queue_capacity, "worker pool started");
        Arc::new(Self {
            lanes: Mutex::new(Some(Lanes {
                high: high_tx,
                low: low_tx,
            })),
            workers: Mutex::new(workers),
            worker_count,
            counters,
        })
    }

    /// Submit a task. Returns immediately; a full lane is a rejection so the
    /// caller can fall back to inline computation.
    pub fn submit(
        &self,
        task: AnalyticsTask,
        priority: Priority,
    ) -> Result<TaskHandle, SubmitError> {
        let (respond, rx) = oneshot::channel();
        let job = Job {
            task,
            respond,
            enqueued: Instant::now(),
        };

        let lanes = self.lanes.lock();
        let Some(lanes) = lanes.as_ref() else {
            return Err(SubmitError::NotRunning);
        };
        let lane = match priority {
            Priority::High => &lanes.high,
            Priority::Low => &lanes.low,
        };

        // Count before sending: a worker can dequeue the job the instant
        // try_send returns, and its decrement must never see a counter that
        // does not yet include this job.
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        match lane.try_send(job) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                crate::metrics::set_queue_depth(self.counters.queued.load(Ordering::Relaxed));
                Ok(TaskHandle { rx })
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                crate::metrics::record_task(job.task.kind(), "rejected");
                Err(SubmitError::Saturated)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                Err(SubmitError::NotRunning)
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.worker_count,
            active_workers: self.counters.active.load(Ordering::Relaxed),
            queue_depth: self.counters.queued.load(Ordering::Relaxed),
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// Close the queues, drain outstanding work and join the workers.
    pub async fn shutdown(&self) {
        // Dropping the senders lets workers finish the backlog and exit.
        if self.lanes.lock().take().is_none() {
            return;
        }
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "worker task panicked during shutdown");
            }
        }
        info!("worker pool drained and stopped");
    }
}

async fn execute(
    worker_id: usize,
    runner: &dyn TaskRunner,
    job: Job,
    task_timeout: Duration,
    counters: &Counters,
) {
    let kind = job.task.kind();
    let queued_for = job.enqueued.elapsed();
    let active = counters.active.fetch_add(1, Ordering::Relaxed) + 1;
    crate::metrics::set_workers_active(active);

    let started = Instant::now();
    let result = match timeout(task_timeout, runner.run(job.task)).await {
        Ok(Ok(snapshot)) => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
            crate::metrics::record_task(kind, "success");
            Ok(snapshot)
        }
        Ok(Err(e)) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            crate::metrics::record_task(kind, "error");
            warn!(worker_id, kind, error = %e, "analytics task failed");
            Err(e)
        }
        Err(_) => {
            // The future is dropped by the timeout; the computation stops here.
            counters.timed_out.fetch_add(1, Ordering::Relaxed);
            crate::metrics::record_task(kind, "timeout");
            warn!(worker_id, kind, ?task_timeout, "analytics task timed out");
            Err(WorkerError::ComputationTimeout(task_timeout))
        }
    };
    crate::metrics::record_task_latency(kind, started.elapsed());
    debug!(worker_id, kind, ?queued_for, "task finished");

    let active = counters.active.fetch_sub(1, Ordering::Relaxed) - 1;
    crate::metrics::set_workers_active(active);

    // Receiver may have given up; that is fine.
    let _ = job.respond.send(result);
}
