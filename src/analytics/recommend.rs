// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Recommendation generation.
//!
//! Aggregates per champion and per role are compared against the player's
//! overall baseline; positive outliers become focus recommendations, weak
//! fundamentals become improvement recommendations. Ranking is by score,
//! with near-ties (within [`SCORE_EPSILON`]) broken toward the larger
//! sample.

use super::{Recommendation, RecommendationKind};
use crate::model::PlayerMatch;
use std::collections::HashMap;

/// Scores closer than this are considered tied.
const SCORE_EPSILON: f64 = 0.05;
/// Games needed before an aggregate is trusted at all.
const MIN_SAMPLE: u32 = 3;
/// Below this many games the only advice is to play more.
const MIN_HISTORY: usize = 5;
const MAX_RECOMMENDATIONS: usize = 5;

struct Aggregate {
    games: u32,
    wins: u32,
    kda_sum: f64,
}

impl Aggregate {
    fn win_rate(&self) -> f64 {
        f64::from(self.wins) / f64::from(self.games)
    }

    fn avg_kda(&self) -> f64 {
        self.kda_sum / f64::from(self.games)
    }
}

/// Generate ranked recommendations from a player's match history.
pub fn compute(matches: &[PlayerMatch]) -> Vec<Recommendation> {
    if matches.len() < MIN_HISTORY {
        return vec![Recommendation {
            kind: RecommendationKind::PlayMore,
            title: "Play more games".into(),
            description: format!(
                "Only {} recent games on record; play at least {MIN_HISTORY} for tailored advice",
                matches.len()
            ),
            score: 1.0,
            confidence: 0.3,
            sample_size: matches.len() as u32,
            champion_id: None,
            role: None,
        }];
    }

    let n = matches.len() as f64;
    let baseline_win_rate = matches.iter().filter(|m| m.win).count() as f64 / n;
    let baseline_kda = matches.iter().map(|m| m.kda()).sum::<f64>() / n;
    let avg_cs = matches.iter().map(|m| m.cs_per_minute()).sum::<f64>() / n;
    let avg_vision = matches.iter().map(|m| f64::from(m.vision_score)).sum::<f64>() / n;

    let mut recommendations = Vec::new();
    recommendations.extend(champion_focus(matches, baseline_win_rate, baseline_kda));
    recommendations.extend(role_focus(matches, baseline_win_rate));
    recommendations.extend(improvements(baseline_kda, avg_cs, avg_vision, matches.len() as u32));

    // Deterministic ranking: score bucketed to the tie epsilon, then sample
    // size. A fuzzy comparator here would not be a total order.
    recommendations.sort_by_key(|r| {
        let bucket = (r.score / SCORE_EPSILON).round() as i64;
        (std::cmp::Reverse(bucket), std::cmp::Reverse(r.sample_size))
    });
    recommendations.truncate(MAX_RECOMMENDATIONS);
    recommendations
}

fn champion_focus(
    matches: &[PlayerMatch],
    baseline_win_rate: f64,
    baseline_kda: f64,
) -> Vec<Recommendation> {
    let mut by_champion: HashMap<i32, (String, Aggregate)> = HashMap::new();
    for m in matches {
        let entry = by_champion.entry(m.champion_id).or_insert_with(|| {
            (
                m.champion_name.clone(),
                Aggregate {
                    games: 0,
                    wins: 0,
                    kda_sum: 0.0,
                },
            )
        });
        entry.1.games += 1;
        entry.1.wins += u32::from(m.win);
        entry.1.kda_sum += m.kda();
    }

    by_champion
        .into_iter()
        .filter(|(_, (_, agg))| agg.games >= MIN_SAMPLE)
        .filter_map(|(champion_id, (name, agg))| {
            let score = (agg.win_rate() - baseline_win_rate) * 0.6
                + ((agg.avg_kda() - baseline_kda) / 10.0) * 0.4;
            (score > 0.0).then(|| Recommendation {
                kind: RecommendationKind::ChampionFocus,
                title: format!("Keep playing {name}"),
                description: format!(
                    "{name}: {:.0}% win rate over {} games, above your {:.0}% baseline",
                    agg.win_rate() * 100.0,
                    agg.games,
                    baseline_win_rate * 100.0
                ),
                score,
                confidence: (f64::from(agg.games) / 10.0).min(1.0),
                sample_size: agg.games,
                champion_id: Some(champion_id),
                role: None,
            })
        })
        .collect()
}

fn role_focus(matches: &[PlayerMatch], baseline_win_rate: f64) -> Vec<Recommendation> {
    let mut by_role: HashMap<String, Aggregate> = HashMap::new();
    for m in matches {
        if m.role.is_empty() {
            continue;
        }
        let entry = by_role.entry(m.role.clone()).or_insert(Aggregate {
            games: 0,
            wins: 0,
            kda_sum: 0.0,
        });
        entry.games += 1;
        entry.wins += u32::from(m.win);
        entry.kda_sum += m.kda();
    }

    by_role
        .into_iter()
        .filter(|(_, agg)| agg.games >= MIN_SAMPLE)
        .filter_map(|(role, agg)| {
            let score = (agg.win_rate() - baseline_win_rate) * 0.5;
            (score > 0.0).then(|| Recommendation {
                kind: RecommendationKind::RoleFocus,
                title: format!("Queue for {role}"),
                description: format!(
                    "{role}: {:.0}% win rate over {} games, above your {:.0}% baseline",
                    agg.win_rate() * 100.0,
                    agg.games,
                    baseline_win_rate * 100.0
                ),
                score,
                confidence: (f64::from(agg.games) / 10.0).min(1.0),
                sample_size: agg.games,
                champion_id: None,
                role: Some(role),
            })
        })
        .collect()
}

fn improvements(kda: f64, cs_per_min: f64, vision: f64, games: u32) -> Vec<Recommendation> {
    let mut out = Vec::new();
    if kda < 2.0 {
        out.push(Recommendation {
            kind: RecommendationKind::Improvement,
            title: "Reduce deaths".into(),
            description: format!("Average KDA {kda:.1}; aim for 2.0+ by playing safer"),
            score: (2.0 - kda) / 4.0,
            confidence: 0.6,
            sample_size: games,
            champion_id: None,
            role: None,
        });
    }
    if cs_per_min < 5.0 {
        out.push(Recommendation {
            kind: RecommendationKind::Improvement,
            title: "Improve CS".into(),
            description: format!("{cs_per_min:.1} CS/min; 5.0+ is the next milestone"),
            score: (5.0 - cs_per_min) / 10.0,
            confidence: 0.6,
            sample_size: games,
            champion_id: None,
            role: None,
        });
    }
    if vision < 15.0 {
        out.push(Recommendation {
            kind: RecommendationKind::Improvement,
            title: "Place more wards".into(),
            description: format!("Average vision score {vision:.0}; aim for 15+"),
            score: (15.0 - vision) / 30.0,
            confidence: 0.5,
            sample_size: games,
            champion_id: None,
            role: None,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn game(i: i64, win: bool, champion: i32, kills: u32, deaths: u32) -> PlayerMatch {
        PlayerMatch {
            match_id: format!("M_{i}"),
            game_start: Utc::now() - Duration::hours(i),
            duration_secs: 1800,
            queue_id: 420,
            champion_id: champion,
            champion_name: format!("Champ{champion}"),
            role: "MIDDLE".into(),
            kills,
            deaths,
            assists: 5,
            creep_score: 200,
            gold_earned: 11_000,
            damage_to_champions: 16_000,
            vision_score: 20,
            win,
        }
    }

    #[test]
    fn test_thin_history_recommends_playing_more() {
        let matches = vec![game(1, true, 1, 5, 3)];
        let recs = compute(&matches);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, RecommendationKind::PlayMore);
        assert_eq!(recs[0].sample_size, 1);
    }

    #[test]
    fn test_strong_champion_is_recommended() {
        let mut matches = Vec::new();
        // Champion 1: 4-0. Champion 2: 0-4.
        for i in 0..4 {
            matches.push(game(i, true, 1, 8, 2));
            matches.push(game(i + 10, false, 2, 2, 6));
        }
        let recs = compute(&matches);
        let champ_rec = recs
            .iter()
            .find(|r| r.kind == RecommendationKind::ChampionFocus)
            .expect("expected a champion focus recommendation");
        assert_eq!(champ_rec.champion_id, Some(1));
        assert!(champ_rec.score > 0.0);
    }

    #[test]
    fn test_losing_champion_not_recommended() {
        let mut matches = Vec::new();
        for i in 0..6 {
            matches.push(game(i, i % 2 == 0, 1, 5, 3));
        }
        // Champion 2 below baseline.
        for i in 6..10 {
            matches.push(game(i, false, 2, 1, 8));
        }
        let recs = compute(&matches);
        assert!(!recs
            .iter()
            .any(|r| r.kind == RecommendationKind::ChampionFocus && r.champion_id == Some(2)));
    }

    #[test]
    fn test_low_kda_triggers_improvement() {
        let matches: Vec<PlayerMatch> = (0..8).map(|i| game(i, i % 2 == 0, 1, 1, 9)).collect();
        let recs = compute(&matches);
        assert!(recs
            .iter()
            .any(|r| r.kind == RecommendationKind::Improvement && r.title == "Reduce deaths"));
    }

    #[test]
    fn test_ties_break_toward_larger_sample() {
        let a = Recommendation {
            kind: RecommendationKind::ChampionFocus,
            title: "a".into(),
            description: String::new(),
            score: 0.30,
            confidence: 0.5,
            sample_size: 4,
            champion_id: Some(1),
            role: None,
        };
        let b = Recommendation {
            sample_size: 12,
            score: 0.31, // within epsilon of a
            title: "b".into(),
            champion_id: Some(2),
            ..a.clone()
        };
        let mut recs = vec![a, b];
        recs.sort_by_key(|r| {
            let bucket = (r.score / SCORE_EPSILON).round() as i64;
            (std::cmp::Reverse(bucket), std::cmp::Reverse(r.sample_size))
        });
        assert_eq!(recs[0].title, "b");
    }

    #[test]
    fn test_result_count_bounded() {
        let matches: Vec<PlayerMatch> = (0..40)
            .map(|i| game(i, i % 3 == 0, (i % 6) as i32, 1, 9))
            .collect();
        let recs = compute(&matches);
        assert!(recs.len() <= MAX_RECOMMENDATIONS);
    }
}
