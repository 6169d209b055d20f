// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Storage trait and error types for the match store.

use crate::model::{MatchRecord, Participant, PlayerMatch, PlayerRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Errors from match store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend unreachable or query failed
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Data in the store could not be decoded
    #[error("corrupt record for match {0}")]
    Corrupt(String),
}

/// Result of an idempotent match upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Match was not present before.
    Inserted,
    /// Match existed with different content and was replaced.
    Updated,
    /// Match existed with identical content; nothing written.
    Unchanged,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Persistent store for matches, participants and player sync bookkeeping.
///
/// A match and its participants are written atomically: either the full
/// replacement lands or nothing does. Upserts keyed by the external match id
/// are idempotent, which makes the at-least-once fetch pipeline safe.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Insert or replace one match with its participants.
    async fn upsert_match(
        &self,
        record: &MatchRecord,
        participants: &[Participant],
    ) -> Result<UpsertOutcome, StoreError>;

    /// All match ids the store holds for a player, for set-diffing against
    /// the remote id list.
    async fn list_match_ids(&self, puuid: &str) -> Result<HashSet<String>, StoreError>;

    /// Per-player match history, newest first.
    async fn player_matches(
        &self,
        puuid: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PlayerMatch>, StoreError>;

    /// Register or refresh a tracked player.
    async fn upsert_player(&self, player: &PlayerRef) -> Result<(), StoreError>;

    /// Record a successful sync for the player.
    async fn touch_last_sync(&self, player_id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Tracked players whose last sync is older than `staleness` (or who
    /// never synced), oldest first, at most `limit`.
    async fn players_needing_sync(
        &self,
        staleness: Duration,
        limit: usize,
    ) -> Result<Vec<PlayerRef>, StoreError>;
}
