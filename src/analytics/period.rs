// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-period aggregation.

use super::{ChampionStats, Period, PeriodStats, RoleStats, Trend};
use crate::model::PlayerMatch;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Sub-window size for trend detection: the most recent N games are
/// compared against the N before them.
const TREND_WINDOW: usize = 5;
/// Win-rate delta (fraction) that counts as a real shift.
const TREND_THRESHOLD: f64 = 0.2;
/// Minimum games before a role is considered for best/worst.
const ROLE_MIN_GAMES: u32 = 3;
const TOP_CHAMPIONS: usize = 5;

/// Aggregate `matches` (newest first) over the window ending at `now`.
///
/// An empty window yields zero-valued stats with a `Stable` trend, never an
/// error.
pub fn compute(matches: &[PlayerMatch], period: Period, now: DateTime<Utc>) -> PeriodStats {
    let cutoff = period.start(now);
    let window: Vec<&PlayerMatch> = matches.iter().filter(|m| m.game_start >= cutoff).collect();

    if window.is_empty() {
        return PeriodStats {
            period,
            ..Default::default()
        };
    }

    let games = window.len() as u32;
    let wins = window.iter().filter(|m| m.win).count() as u32;
    let n = f64::from(games);

    let avg_kda = window.iter().map(|m| m.kda()).sum::<f64>() / n;
    let avg_cs_per_min = window.iter().map(|m| m.cs_per_minute()).sum::<f64>() / n;
    let avg_gold_per_min = window.iter().map(|m| m.gold_per_minute()).sum::<f64>() / n;
    let avg_damage_per_min = window.iter().map(|m| m.damage_per_minute()).sum::<f64>() / n;
    let avg_vision = window.iter().map(|m| f64::from(m.vision_score)).sum::<f64>() / n;
    let win_rate = f64::from(wins) / n * 100.0;

    let top_champions = champion_stats(&window);
    let roles = role_stats(&window);
    let (best_role, worst_role) = best_worst_role(&roles);

    PeriodStats {
        period,
        games,
        wins,
        losses: games - wins,
        win_rate,
        avg_kda,
        avg_cs_per_min,
        avg_gold_per_min,
        avg_damage_per_min,
        avg_vision,
        top_champions,
        roles,
        best_role,
        worst_role,
        trend: trend(&window),
        performance_score: performance_score(win_rate, avg_kda, games),
    }
}

/// Composite 0..=100 score: win rate and KDA, weighted, with a small bonus
/// for larger samples.
pub fn performance_score(win_rate_pct: f64, kda: f64, games: u32) -> f64 {
    let kda_score = (kda * 20.0).min(100.0);
    let games_weight = (f64::from(games) * 5.0).min(25.0);
    let base = win_rate_pct * 0.5 + kda_score * 0.3;
    (base * (1.0 + games_weight / 100.0)).min(100.0)
}

/// Recent sub-window win rate against the one before it. Too few games for
/// two full sub-windows reads as stable.
fn trend(window: &[&PlayerMatch]) -> Trend {
    if window.len() < TREND_WINDOW * 2 {
        return Trend::Stable;
    }
    let rate = |slice: &[&PlayerMatch]| {
        slice.iter().filter(|m| m.win).count() as f64 / slice.len() as f64
    };
    // Input is newest first.
    let recent = rate(&window[..TREND_WINDOW]);
    let prior = rate(&window[TREND_WINDOW..TREND_WINDOW * 2]);
    let delta = recent - prior;
    if delta > TREND_THRESHOLD {
        Trend::Improving
    } else if delta < -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

fn champion_stats(window: &[&PlayerMatch]) -> Vec<ChampionStats> {
    let mut by_champion: HashMap<i32, (String, u32, u32, f64)> = HashMap::new();
    for m in window {
        let entry = by_champion
            .entry(m.champion_id)
            .or_insert_with(|| (m.champion_name.clone(), 0, 0, 0.0));
        entry.1 += 1;
        entry.2 += u32::from(m.win);
        entry.3 += m.kda();
    }

    let mut stats: Vec<ChampionStats> = by_champion
        .into_iter()
        .map(|(champion_id, (champion_name, games, wins, kda_sum))| {
            let win_rate = f64::from(wins) / f64::from(games) * 100.0;
            let avg_kda = kda_sum / f64::from(games);
            ChampionStats {
                champion_id,
                champion_name,
                games,
                wins,
                win_rate,
                avg_kda,
                performance_score: performance_score(win_rate, avg_kda, games),
            }
        })
        .collect();
    stats.sort_by(|a, b| {
        b.games
            .cmp(&a.games)
            .then(b.wins.cmp(&a.wins))
            .then(a.champion_id.cmp(&b.champion_id))
    });
    stats.truncate(TOP_CHAMPIONS);
    stats
}

fn role_stats(window: &[&PlayerMatch]) -> Vec<RoleStats> {
    let mut by_role: HashMap<String, (u32, u32, f64)> = HashMap::new();
    for m in window {
        if m.role.is_empty() {
            continue;
        }
        let entry = by_role.entry(m.role.clone()).or_insert((0, 0, 0.0));
        entry.0 += 1;
        entry.1 += u32::from(m.win);
        entry.2 += m.kda();
    }

    let mut stats: Vec<RoleStats> = by_role
        .into_iter()
        .map(|(role, (games, wins, kda_sum))| RoleStats {
            role,
            games,
            wins,
            win_rate: f64::from(wins) / f64::from(games) * 100.0,
            avg_kda: kda_sum / f64::from(games),
        })
        .collect();
    stats.sort_by(|a, b| b.games.cmp(&a.games).then(a.role.cmp(&b.role)));
    stats
}

fn best_worst_role(roles: &[RoleStats]) -> (Option<String>, Option<String>) {
    let qualified: Vec<&RoleStats> = roles.iter().filter(|r| r.games >= ROLE_MIN_GAMES).collect();
    if qualified.len() < 2 {
        return (None, None);
    }
    let best = qualified
        .iter()
        .max_by(|a, b| {
            a.win_rate
                .total_cmp(&b.win_rate)
                .then(a.avg_kda.total_cmp(&b.avg_kda))
        })
        .map(|r| r.role.clone());
    let worst = qualified
        .iter()
        .min_by(|a, b| {
            a.win_rate
                .total_cmp(&b.win_rate)
                .then(a.avg_kda.total_cmp(&b.avg_kda))
        })
        .map(|r| r.role.clone());
    (best, worst)
}
