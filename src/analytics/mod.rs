// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Analytics over synced match history.
//!
//! Three artifact families: per-period aggregates ([`PeriodStats`]),
//! estimated rating trajectory ([`MmrTrajectory`]) and actionable
//! [`Recommendation`]s. Pure computation lives in the submodules;
//! [`AnalyticsService`] adds caching and worker-pool offload.

mod mmr;
mod period;
mod recommend;
mod service;

pub use mmr::{base_mmr, compute as compute_mmr, rank_for_mmr, MmrWeights};
pub use period::compute as compute_period;
pub use recommend::compute as compute_recommendations;
pub use service::AnalyticsService;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Aggregation window for period stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    #[default]
    Week,
    Month,
    Season,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Season => "season",
        }
    }

    /// Start of the window ending at `now`.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Day => now - Duration::days(1),
            Self::Week => now - Duration::days(7),
            Self::Month => now - Duration::days(30),
            Self::Season => now - Duration::days(120),
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "season" => Ok(Self::Season),
            other => Err(format!("unknown period: {other}")),
        }
    }
}

/// Direction of recent results relative to the window before them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    #[default]
    Stable,
    Declining,
}

/// Per-champion aggregate within a period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChampionStats {
    pub champion_id: i32,
    pub champion_name: String,
    pub games: u32,
    pub wins: u32,
    /// Percentage, 0..=100.
    pub win_rate: f64,
    pub avg_kda: f64,
    pub performance_score: f64,
}

/// Per-role aggregate within a period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleStats {
    pub role: String,
    pub games: u32,
    pub wins: u32,
    /// Percentage, 0..=100.
    pub win_rate: f64,
    pub avg_kda: f64,
}

/// Aggregated performance over one [`Period`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub period: Period,
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    /// Percentage, 0..=100.
    pub win_rate: f64,
    pub avg_kda: f64,
    pub avg_cs_per_min: f64,
    pub avg_gold_per_min: f64,
    pub avg_damage_per_min: f64,
    pub avg_vision: f64,
    pub top_champions: Vec<ChampionStats>,
    pub roles: Vec<RoleStats>,
    pub best_role: Option<String>,
    pub worst_role: Option<String>,
    pub trend: Trend,
    /// Composite 0..=100 score over win rate, KDA and sample size.
    pub performance_score: f64,
}

/// One step of the estimated rating walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MmrPoint {
    pub match_id: String,
    pub date: DateTime<Utc>,
    pub mmr: i32,
    /// Delta applied by this match, already clamped.
    pub change: i32,
    /// 0..=1 confidence in this single estimate.
    pub confidence: f64,
    pub rank: String,
}

/// Estimated rating trajectory over the synced history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MmrTrajectory {
    pub points: Vec<MmrPoint>,
    pub current_mmr: i32,
    pub current_rank: String,
    pub peak_mmr: i32,
    pub lowest_mmr: i32,
    /// Standard deviation of per-match deltas.
    pub volatility: f64,
    pub trend: Trend,
    /// 0..=1 confidence grade over the whole trajectory.
    pub confidence: f64,
}

impl Default for MmrTrajectory {
    fn default() -> Self {
        let mmr = 1000;
        Self {
            points: Vec::new(),
            current_mmr: mmr,
            current_rank: rank_for_mmr(mmr),
            peak_mmr: mmr,
            lowest_mmr: mmr,
            volatility: 0.0,
            trend: Trend::Stable,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ChampionFocus,
    RoleFocus,
    Improvement,
    PlayMore,
}

/// One actionable recommendation, scored and ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub title: String,
    pub description: String,
    /// Ranking score; higher is stronger evidence.
    pub score: f64,
    /// 0..=1, grows with sample size.
    pub confidence: f64,
    /// Games backing this recommendation.
    pub sample_size: u32,
    pub champion_id: Option<i32>,
    pub role: Option<String>,
}

/// Any cacheable analytics artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnalyticsSnapshot {
    Period(PeriodStats),
    Mmr(MmrTrajectory),
    Recommendations(Vec<Recommendation>),
}

impl AnalyticsSnapshot {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Period(_) => "period_stats",
            Self::Mmr(_) => "mmr",
            Self::Recommendations(_) => "recommendations",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parse() {
        assert_eq!("week".parse::<Period>().unwrap(), Period::Week);
        assert_eq!("SEASON".parse::<Period>().unwrap(), Period::Season);
        assert!("fortnight".parse::<Period>().is_err());
    }

    #[test]
    fn test_period_start_ordering() {
        let now = Utc::now();
        assert!(Period::Day.start(now) > Period::Week.start(now));
        assert!(Period::Week.start(now) > Period::Month.start(now));
        assert!(Period::Month.start(now) > Period::Season.start(now));
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let snap = AnalyticsSnapshot::Period(PeriodStats {
            games: 12,
            wins: 7,
            ..Default::default()
        });
        let json = serde_json::to_string(&snap).unwrap();
        let back: AnalyticsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
        assert_eq!(back.kind(), "period_stats");
    }

    #[test]
    fn test_default_trajectory_is_neutral() {
        let t = MmrTrajectory::default();
        assert_eq!(t.current_mmr, 1000);
        assert!(t.points.is_empty());
        assert_eq!(t.confidence, 0.0);
    }
}
