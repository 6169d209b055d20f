// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory match store backed by DashMap.

use super::traits::{MatchStore, StoreError, UpsertOutcome};
use crate::model::{MatchRecord, Participant, PlayerMatch, PlayerRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
struct StoredMatch {
    record: MatchRecord,
    participants: Vec<Participant>,
}

#[derive(Debug, Clone)]
struct TrackedPlayer {
    player: PlayerRef,
    last_sync: Option<DateTime<Utc>>,
}

/// Match store held entirely in process memory.
///
/// Used by tests and by deployments that run without a SQL backend. Scans
/// are linear in the number of stored matches, which is fine at the scale a
/// single process tracks.
#[derive(Default)]
pub struct InMemoryMatchStore {
    matches: DashMap<String, StoredMatch>,
    players: DashMap<i64, TrackedPlayer>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn upsert_match(
        &self,
        record: &MatchRecord,
        participants: &[Participant],
    ) -> Result<UpsertOutcome, StoreError> {
        let incoming = StoredMatch {
            record: record.clone(),
            participants: participants.to_vec(),
        };
        let outcome = match self.matches.entry(record.match_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut existing) => {
                if *existing.get() == incoming {
                    UpsertOutcome::Unchanged
                } else {
                    existing.insert(incoming);
                    UpsertOutcome::Updated
                }
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(incoming);
                UpsertOutcome::Inserted
            }
        };
        crate::metrics::record_upsert(outcome.as_str());
        Ok(outcome)
    }

    async fn list_match_ids(&self, puuid: &str) -> Result<HashSet<String>, StoreError> {
        Ok(self
            .matches
            .iter()
            .filter(|entry| entry.participants.iter().any(|p| p.puuid == puuid))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn player_matches(
        &self,
        puuid: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PlayerMatch>, StoreError> {
        let mut rows: Vec<PlayerMatch> = self
            .matches
            .iter()
            .filter_map(|entry| {
                entry
                    .participants
                    .iter()
                    .find(|p| p.puuid == puuid)
                    .map(|p| PlayerMatch::from_match(&entry.record, p))
            })
            .collect();
        rows.sort_by(|a, b| b.game_start.cmp(&a.game_start));
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn upsert_player(&self, player: &PlayerRef) -> Result<(), StoreError> {
        self.players
            .entry(player.id)
            .and_modify(|tracked| tracked.player = player.clone())
            .or_insert_with(|| TrackedPlayer {
                player: player.clone(),
                last_sync: None,
            });
        Ok(())
    }

    async fn touch_last_sync(&self, player_id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(mut tracked) = self.players.get_mut(&player_id) {
            tracked.last_sync = Some(at);
        }
        Ok(())
    }

    async fn players_needing_sync(
        &self,
        staleness: Duration,
        limit: usize,
    ) -> Result<Vec<PlayerRef>, StoreError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(staleness)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut due: Vec<(Option<DateTime<Utc>>, PlayerRef)> = self
            .players
            .iter()
            .filter(|t| t.last_sync.map_or(true, |at| at < cutoff))
            .map(|t| (t.last_sync, t.player.clone()))
            .collect();
        // Never-synced players first, then oldest sync first.
        due.sort_by_key(|(at, _)| *at);
        Ok(due.into_iter().take(limit).map(|(_, p)| p).collect())
    }
}
