// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite-backed match store.

use super::traits::{MatchStore, StoreError, UpsertOutcome};
use crate::backoff::{self, RetryConfig};
use crate::model::{MatchRecord, Participant, PlayerMatch, PlayerRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::time::Duration;
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS matches (
    match_id      TEXT PRIMARY KEY,
    game_start    INTEGER NOT NULL,
    duration_secs INTEGER NOT NULL,
    queue_id      INTEGER NOT NULL,
    game_mode     TEXT NOT NULL,
    payload       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS participants (
    match_id            TEXT NOT NULL,
    puuid               TEXT NOT NULL,
    champion_id         INTEGER NOT NULL,
    champion_name       TEXT NOT NULL,
    role                TEXT NOT NULL,
    team_id             INTEGER NOT NULL,
    kills               INTEGER NOT NULL,
    deaths              INTEGER NOT NULL,
    assists             INTEGER NOT NULL,
    creep_score         INTEGER NOT NULL,
    gold_earned         INTEGER NOT NULL,
    damage_to_champions INTEGER NOT NULL,
    vision_score        INTEGER NOT NULL,
    win                 INTEGER NOT NULL,
    PRIMARY KEY (match_id, puuid)
);
CREATE INDEX IF NOT EXISTS idx_participants_puuid ON participants(puuid);

CREATE TABLE IF NOT EXISTS players (
    id           INTEGER PRIMARY KEY,
    puuid        TEXT NOT NULL,
    region       TEXT NOT NULL,
    display_name TEXT NOT NULL,
    last_sync    INTEGER
);
"#;

/// SQLite-backed [`MatchStore`].
///
/// The full `(record, participants)` pair is also kept as a JSON payload
/// column, which is what upserts compare to detect unchanged content.
pub struct SqlMatchStore {
    pool: SqlitePool,
}

impl SqlMatchStore {
    /// Connect and initialize the schema. Connection attempts are retried
    /// with the fast-fail preset so a bad URL surfaces within seconds.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = backoff::retry("sql_connect", &RetryConfig::connect(), |_| true, || {
            // SQLite serializes writers; one connection avoids lock churn
            // and keeps `sqlite::memory:` databases coherent.
            SqlitePoolOptions::new().max_connections(1).connect(url)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("connect {url}: {e}")))?;

        // raw_sql: the schema is several statements in one batch.
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("schema init: {e}")))?;
        info!(url, "sql match store ready");
        Ok(Self { pool })
    }

    fn payload_of(
        record: &MatchRecord,
        participants: &[Participant],
    ) -> Result<String, StoreError> {
        serde_json::to_string(&(record, participants))
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", record.match_id)))
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl MatchStore for SqlMatchStore {
    async fn upsert_match(
        &self,
        record: &MatchRecord,
        participants: &[Participant],
    ) -> Result<UpsertOutcome, StoreError> {
        let payload = Self::payload_of(record, participants)?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT payload FROM matches WHERE match_id = ?1")
                .bind(&record.match_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;

        let outcome = match existing {
            Some(current) if current == payload => UpsertOutcome::Unchanged,
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        };

        if outcome != UpsertOutcome::Unchanged {
            sqlx::query(
                "INSERT INTO matches (match_id, game_start, duration_secs, queue_id, game_mode, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(match_id) DO UPDATE SET
                     game_start = excluded.game_start,
                     duration_secs = excluded.duration_secs,
                     queue_id = excluded.queue_id,
                     game_mode = excluded.game_mode,
                     payload = excluded.payload",
            )
            .bind(&record.match_id)
            .bind(record.game_start.timestamp())
            .bind(i64::from(record.duration_secs))
            .bind(i64::from(record.queue_id))
            .bind(&record.game_mode)
            .bind(&payload)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            // Full replace keeps the row set exactly equal to the payload.
            sqlx::query("DELETE FROM participants WHERE match_id = ?1")
                .bind(&record.match_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            for p in participants {
                sqlx::query(
                    "INSERT INTO participants
                     (match_id, puuid, champion_id, champion_name, role, team_id,
                      kills, deaths, assists, creep_score, gold_earned,
                      damage_to_champions, vision_score, win)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                )
                .bind(&record.match_id)
                .bind(&p.puuid)
                .bind(i64::from(p.champion_id))
                .bind(&p.champion_name)
                .bind(&p.role)
                .bind(i64::from(p.team_id))
                .bind(i64::from(p.kills))
                .bind(i64::from(p.deaths))
                .bind(i64::from(p.assists))
                .bind(i64::from(p.creep_score))
                .bind(i64::from(p.gold_earned))
                .bind(i64::from(p.damage_to_champions))
                .bind(i64::from(p.vision_score))
                .bind(p.win)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }
        }

        tx.commit().await.map_err(db_err)?;
        crate::metrics::record_upsert(outcome.as_str());
        Ok(outcome)
    }

    async fn list_match_ids(&self, puuid: &str) -> Result<HashSet<String>, StoreError> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT match_id FROM participants WHERE puuid = ?1")
                .bind(puuid)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(ids.into_iter().collect())
    }

    async fn player_matches(
        &self,
        puuid: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PlayerMatch>, StoreError> {
        let rows = sqlx::query(
            "SELECT m.match_id, m.game_start, m.duration_secs, m.queue_id,
                    p.champion_id, p.champion_name, p.role,
                    p.kills, p.deaths, p.assists, p.creep_score, p.gold_earned,
                    p.damage_to_champions, p.vision_score, p.win
             FROM participants p
             JOIN matches m ON m.match_id = p.match_id
             WHERE p.puuid = ?1
             ORDER BY m.game_start DESC
             LIMIT ?2 OFFSET ?3",
        )
        .bind(puuid)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|row| {
                let match_id: String = row.get("match_id");
                let game_start = DateTime::<Utc>::from_timestamp(row.get::<i64, _>("game_start"), 0)
                    .ok_or_else(|| StoreError::Corrupt(match_id.clone()))?;
                Ok(PlayerMatch {
                    match_id,
                    game_start,
                    duration_secs: row.get::<i64, _>("duration_secs") as u32,
                    queue_id: row.get::<i64, _>("queue_id") as u32,
                    champion_id: row.get::<i64, _>("champion_id") as i32,
                    champion_name: row.get("champion_name"),
                    role: row.get("role"),
                    kills: row.get::<i64, _>("kills") as u32,
                    deaths: row.get::<i64, _>("deaths") as u32,
                    assists: row.get::<i64, _>("assists") as u32,
                    creep_score: row.get::<i64, _>("creep_score") as u32,
                    gold_earned: row.get::<i64, _>("gold_earned") as u32,
                    damage_to_champions: row.get::<i64, _>("damage_to_champions") as u32,
                    vision_score: row.get::<i64, _>("vision_score") as u32,
                    win: row.get("win"),
                })
            })
            .collect()
    }

    async fn upsert_player(&self, player: &PlayerRef) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO players (id, puuid, region, display_name)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 puuid = excluded.puuid,
                 region = excluded.region,
                 display_name = excluded.display_name",
        )
        .bind(player.id)
        .bind(&player.puuid)
        .bind(&player.region)
        .bind(&player.display_name)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn touch_last_sync(&self, player_id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE players SET last_sync = ?2 WHERE id = ?1")
            .bind(player_id)
            .bind(at.timestamp())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn players_needing_sync(
        &self,
        staleness: Duration,
        limit: usize,
    ) -> Result<Vec<PlayerRef>, StoreError> {
        let cutoff = (Utc::now()
            - chrono::Duration::from_std(staleness)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?)
        .timestamp();

        let rows = sqlx::query(
            "SELECT id, puuid, region, display_name FROM players
             WHERE last_sync IS NULL OR last_sync < ?1
             ORDER BY last_sync ASC NULLS FIRST
             LIMIT ?2",
        )
        .bind(cutoff)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|row| PlayerRef {
                id: row.get("id"),
                puuid: row.get("puuid"),
                region: row.get("region"),
                display_name: row.get("display_name"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn memory_store() -> SqlMatchStore {
        SqlMatchStore::connect("sqlite::memory:").await.unwrap()
    }

    fn record(id: &str, start_hour: u32) -> MatchRecord {
        MatchRecord {
            match_id: id.into(),
            game_start: Utc.with_ymd_and_hms(2026, 3, 1, start_hour, 0, 0).unwrap(),
            duration_secs: 1800,
            queue_id: 420,
            game_mode: "CLASSIC".into(),
        }
    }

    fn participant(puuid: &str, kills: u32) -> Participant {
        Participant {
            puuid: puuid.into(),
            champion_id: 1,
            champion_name: "Annie".into(),
            role: "MIDDLE".into(),
            team_id: 100,
            kills,
            deaths: 3,
            assists: 5,
            creep_score: 150,
            gold_earned: 10_000,
            damage_to_champions: 15_000,
            vision_score: 20,
            win: true,
        }
    }

    #[tokio::test]
    async fn test_upsert_insert_unchanged_updated() {
        let store = memory_store().await;
        let rec = record("EUW1_1", 10);
        let parts = vec![participant("p-1", 4)];

        assert_eq!(
            store.upsert_match(&rec, &parts).await.unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            store.upsert_match(&rec, &parts).await.unwrap(),
            UpsertOutcome::Unchanged
        );
        assert_eq!(
            store
                .upsert_match(&rec, &[participant("p-1", 9)])
                .await
                .unwrap(),
            UpsertOutcome::Updated
        );

        let rows = store.player_matches("p-1", 10, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kills, 9);
    }

    #[tokio::test]
    async fn test_participant_rows_follow_replacement() {
        let store = memory_store().await;
        let rec = record("EUW1_1", 10);
        store
            .upsert_match(&rec, &[participant("p-1", 1), participant("p-2", 2)])
            .await
            .unwrap();
        // Replacement shrinks the roster; the removed row must not linger.
        store
            .upsert_match(&rec, &[participant("p-1", 1)])
            .await
            .unwrap();

        assert!(store.list_match_ids("p-2").await.unwrap().is_empty());
        assert_eq!(store.list_match_ids("p-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_player_matches_ordering() {
        let store = memory_store().await;
        for (id, hour) in [("EUW1_1", 8), ("EUW1_2", 12), ("EUW1_3", 10)] {
            store
                .upsert_match(&record(id, hour), &[participant("p-1", 1)])
                .await
                .unwrap();
        }
        let rows = store.player_matches("p-1", 10, 0).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|m| m.match_id.as_str()).collect();
        assert_eq!(ids, vec!["EUW1_2", "EUW1_3", "EUW1_1"]);
    }

    #[tokio::test]
    async fn test_players_needing_sync() {
        let store = memory_store().await;
        store
            .upsert_player(&PlayerRef::new(1, "p-1", "euw1"))
            .await
            .unwrap();
        store
            .upsert_player(&PlayerRef::new(2, "p-2", "euw1"))
            .await
            .unwrap();
        store
            .touch_last_sync(1, Utc::now() - chrono::Duration::hours(3))
            .await
            .unwrap();

        let due = store
            .players_needing_sync(Duration::from_secs(3600), 10)
            .await
            .unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, 2); // never synced sorts first

        store.touch_last_sync(1, Utc::now()).await.unwrap();
        store.touch_last_sync(2, Utc::now()).await.unwrap();
        let due = store
            .players_needing_sync(Duration::from_secs(3600), 10)
            .await
            .unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn test_connect_bad_url_fails() {
        let result = SqlMatchStore::connect("sqlite:///nonexistent-dir/x/y/z.db").await;
        assert!(result.is_err());
    }
}
