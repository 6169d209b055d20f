// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the match sync engine.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application is responsible for choosing the exporter
//! (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `match_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `endpoint`: match_ids, match_detail
//! - `status`: success, error, rejected, timeout
//! - `outcome`: inserted, updated, unchanged / hit, stale, miss

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

// ═══════════════════════════════════════════════════════════════════════════
// GATEWAY - Upstream API calls and the request budget
// ═══════════════════════════════════════════════════════════════════════════

/// Record a gateway call outcome
pub fn record_gateway_call(endpoint: &str, status: &str) {
    counter!(
        "match_sync_gateway_calls_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record gateway call latency (includes budget wait and retries)
pub fn record_gateway_latency(endpoint: &str, duration: Duration) {
    histogram!(
        "match_sync_gateway_seconds",
        "endpoint" => endpoint.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record time spent waiting for a request budget slot
pub fn record_budget_wait(duration: Duration) {
    histogram!("match_sync_budget_wait_seconds").record(duration.as_secs_f64());
}

/// Record a retry of a named operation
pub fn record_retry(operation: &str) {
    counter!(
        "match_sync_retries_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// STORE - Match persistence
// ═══════════════════════════════════════════════════════════════════════════

/// Record a match upsert outcome (inserted, updated, unchanged)
pub fn record_upsert(outcome: &str) {
    counter!(
        "match_sync_upserts_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a store error
pub fn record_store_error(operation: &str) {
    counter!(
        "match_sync_store_errors_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// CACHE - Analytics snapshot cache
// ═══════════════════════════════════════════════════════════════════════════

/// Record a cache lookup outcome (hit, stale, miss, error)
pub fn record_cache_lookup(kind: &str, outcome: &str) {
    counter!(
        "match_sync_cache_lookups_total",
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record cache invalidations (keys dropped)
pub fn record_cache_invalidation(count: usize) {
    counter!("match_sync_cache_invalidations_total").increment(count as u64);
}

/// Set cache backend health (1 = connected, 0 = degraded/disabled)
pub fn set_cache_healthy(backend: &str, healthy: bool) {
    gauge!(
        "match_sync_cache_healthy",
        "backend" => backend.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

// ═══════════════════════════════════════════════════════════════════════════
// WORKER POOL - Analytics computations
// ═══════════════════════════════════════════════════════════════════════════

/// Record a task completion (success, error, timeout, rejected)
pub fn record_task(kind: &str, status: &str) {
    counter!(
        "match_sync_tasks_total",
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record task execution latency
pub fn record_task_latency(kind: &str, duration: Duration) {
    histogram!(
        "match_sync_task_seconds",
        "kind" => kind.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Set current queue depth across both priority lanes
pub fn set_queue_depth(depth: usize) {
    gauge!("match_sync_queue_depth").set(depth as f64);
}

/// Set workers currently executing a task
pub fn set_workers_active(count: usize) {
    gauge!("match_sync_workers_active").set(count as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// SYNC - Orchestrator jobs
// ═══════════════════════════════════════════════════════════════════════════

/// Record a sync job reaching a terminal state
pub fn record_sync_job(status: &str) {
    counter!(
        "match_sync_jobs_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record matches processed by a completed sync run
pub fn record_sync_matches(new: u64, updated: u64) {
    counter!("match_sync_matches_new_total").increment(new);
    counter!("match_sync_matches_updated_total").increment(updated);
}

/// Record full sync run duration
pub fn record_sync_duration(duration: Duration) {
    histogram!("match_sync_job_seconds").record(duration.as_secs_f64());
}

/// Set number of currently running sync jobs
pub fn set_jobs_running(count: usize) {
    gauge!("match_sync_jobs_running").set(count as f64);
}

/// A timing guard that records gateway latency on drop
pub struct LatencyTimer {
    endpoint: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_gateway_latency(self.endpoint, self.start.elapsed());
    }
}
