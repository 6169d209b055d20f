//! Domain types for match history.
//!
//! A [`MatchRecord`] is the immutable record of one completed game, shared
//! across every player that took part in it. [`Participant`] rows are owned by
//! their match and written atomically with it. [`PlayerMatch`] is the
//! flattened per-player view the analytics engine consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked player account.
///
/// Created by the account-validation collaborator; this crate only reads the
/// identifiers and updates the last-sync timestamp through the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRef {
    /// Local numeric identifier.
    pub id: i64,
    /// Stable external account identifier (PUUID).
    pub puuid: String,
    /// Region/platform the account lives on (e.g. `euw1`).
    pub region: String,
    /// Display name, informational only.
    pub display_name: String,
}

impl PlayerRef {
    pub fn new(id: i64, puuid: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            id,
            puuid: puuid.into(),
            region: region.into(),
            display_name: String::new(),
        }
    }
}

/// Immutable record of one completed game.
///
/// Identity is the external match identifier; upserting the same content
/// twice is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// External match identifier (e.g. `EUW1_6543210987`).
    pub match_id: String,
    /// When the game started.
    pub game_start: DateTime<Utc>,
    /// Game duration in seconds.
    pub duration_secs: u32,
    /// Numeric queue identifier (420 = ranked solo, 440 = ranked flex, ...).
    pub queue_id: u32,
    /// Game mode string as reported upstream.
    pub game_mode: String,
}

/// Per-match, per-player performance record. Owned by its match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub puuid: String,
    pub champion_id: i32,
    pub champion_name: String,
    /// Assigned position (`TOP`, `JUNGLE`, `MIDDLE`, `BOTTOM`, `UTILITY`).
    pub role: String,
    pub team_id: u16,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    /// Lane + neutral minions killed.
    pub creep_score: u32,
    pub gold_earned: u32,
    pub damage_to_champions: u32,
    pub vision_score: u32,
    pub win: bool,
}

/// Flattened per-player view of one match, as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMatch {
    pub match_id: String,
    pub game_start: DateTime<Utc>,
    pub duration_secs: u32,
    pub queue_id: u32,
    pub champion_id: i32,
    pub champion_name: String,
    pub role: String,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub creep_score: u32,
    pub gold_earned: u32,
    pub damage_to_champions: u32,
    pub vision_score: u32,
    pub win: bool,
}

impl PlayerMatch {
    /// KDA ratio. Zero deaths count as one so the ratio is never infinite.
    #[must_use]
    pub fn kda(&self) -> f64 {
        f64::from(self.kills + self.assists) / f64::from(self.deaths.max(1))
    }

    /// Game duration in minutes, floored at one to keep per-minute rates finite.
    #[must_use]
    pub fn duration_minutes(&self) -> f64 {
        (f64::from(self.duration_secs) / 60.0).max(1.0)
    }

    #[must_use]
    pub fn cs_per_minute(&self) -> f64 {
        f64::from(self.creep_score) / self.duration_minutes()
    }

    #[must_use]
    pub fn gold_per_minute(&self) -> f64 {
        f64::from(self.gold_earned) / self.duration_minutes()
    }

    #[must_use]
    pub fn damage_per_minute(&self) -> f64 {
        f64::from(self.damage_to_champions) / self.duration_minutes()
    }

    /// Project the participant row for `puuid` out of a full match record.
    #[must_use]
    pub fn from_match(record: &MatchRecord, participant: &Participant) -> Self {
        Self {
            match_id: record.match_id.clone(),
            game_start: record.game_start,
            duration_secs: record.duration_secs,
            queue_id: record.queue_id,
            champion_id: participant.champion_id,
            champion_name: participant.champion_name.clone(),
            role: participant.role.clone(),
            kills: participant.kills,
            deaths: participant.deaths,
            assists: participant.assists,
            creep_score: participant.creep_score,
            gold_earned: participant.gold_earned,
            damage_to_champions: participant.damage_to_champions,
            vision_score: participant.vision_score,
            win: participant.win,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_match() -> PlayerMatch {
        PlayerMatch {
            match_id: "EUW1_100".into(),
            game_start: Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap(),
            duration_secs: 1800,
            queue_id: 420,
            champion_id: 103,
            champion_name: "Ahri".into(),
            role: "MIDDLE".into(),
            kills: 8,
            deaths: 2,
            assists: 6,
            creep_score: 210,
            gold_earned: 12_400,
            damage_to_champions: 24_000,
            vision_score: 22,
            win: true,
        }
    }

    #[test]
    fn test_kda_normal() {
        let m = sample_match();
        assert!((m.kda() - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_kda_zero_deaths_is_kills_plus_assists() {
        let mut m = sample_match();
        m.deaths = 0;
        assert_eq!(m.kda(), 14.0);
        assert!(m.kda().is_finite());
    }

    #[test]
    fn test_per_minute_rates_finite_for_zero_duration() {
        let mut m = sample_match();
        m.duration_secs = 0;
        assert!(m.cs_per_minute().is_finite());
        assert!(m.gold_per_minute().is_finite());
        assert!(m.damage_per_minute().is_finite());
    }

    #[test]
    fn test_cs_per_minute() {
        let m = sample_match();
        assert!((m.cs_per_minute() - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_match_projects_participant() {
        let record = MatchRecord {
            match_id: "EUW1_7".into(),
            game_start: Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap(),
            duration_secs: 1500,
            queue_id: 440,
            game_mode: "CLASSIC".into(),
        };
        let participant = Participant {
            puuid: "p-1".into(),
            champion_id: 64,
            champion_name: "LeeSin".into(),
            role: "JUNGLE".into(),
            team_id: 100,
            kills: 4,
            deaths: 5,
            assists: 9,
            creep_score: 160,
            gold_earned: 10_000,
            damage_to_champions: 15_000,
            vision_score: 30,
            win: false,
        };

        let pm = PlayerMatch::from_match(&record, &participant);
        assert_eq!(pm.match_id, "EUW1_7");
        assert_eq!(pm.queue_id, 440);
        assert_eq!(pm.champion_name, "LeeSin");
        assert!(!pm.win);
    }

    #[test]
    fn test_serde_round_trip() {
        let m = sample_match();
        let json = serde_json::to_string(&m).unwrap();
        let back: PlayerMatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
