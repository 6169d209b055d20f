// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Estimated MMR trajectory.
//!
//! The walk starts at the queue's base rating and applies one clamped delta
//! per match: a fixed win/loss component plus a performance modifier built
//! from KDA, CS rate, damage rate and vision. Coefficients live in
//! [`MmrWeights`] so they can be tuned (and tested) in one place.

use super::{MmrPoint, MmrTrajectory, Trend};
use crate::model::PlayerMatch;

/// Tunable coefficients for the rating walk.
#[derive(Debug, Clone)]
pub struct MmrWeights {
    /// Added on a win, subtracted on a loss.
    pub result_base: f64,
    /// Performance modifier: (KDA - 1) * kda_scale, capped.
    pub kda_scale: f64,
    pub kda_cap: f64,
    /// Performance modifier: CS/min - cs_offset, capped.
    pub cs_offset: f64,
    pub cs_cap: f64,
    /// Performance modifier: damage/min / damage_divisor, capped.
    pub damage_divisor: f64,
    pub damage_cap: f64,
    /// Performance modifier: vision / vision_divisor, capped.
    pub vision_divisor: f64,
    pub vision_cap: f64,
    /// Total performance modifier clamp (+/-).
    pub performance_clamp: f64,
    /// Per-match delta clamp (+/-).
    pub step_clamp: f64,
}

impl Default for MmrWeights {
    fn default() -> Self {
        Self {
            result_base: 25.0,
            kda_scale: 10.0,
            kda_cap: 20.0,
            cs_offset: 5.0,
            cs_cap: 10.0,
            damage_divisor: 100.0,
            damage_cap: 10.0,
            vision_divisor: 2.0,
            vision_cap: 5.0,
            performance_clamp: 30.0,
            step_clamp: 50.0,
        }
    }
}

impl MmrWeights {
    /// Performance component of one match's delta, clamped.
    pub fn performance_modifier(&self, m: &PlayerMatch) -> f64 {
        let kda_score = ((m.kda() - 1.0) * self.kda_scale).min(self.kda_cap);
        let cs_score = (m.cs_per_minute() - self.cs_offset).min(self.cs_cap);
        let damage_score = (m.damage_per_minute() / self.damage_divisor).min(self.damage_cap);
        let vision_score = (f64::from(m.vision_score) / self.vision_divisor).min(self.vision_cap);
        (kda_score + cs_score + damage_score + vision_score)
            .clamp(-self.performance_clamp, self.performance_clamp)
    }

    /// Full delta for one match, clamped.
    pub fn delta(&self, m: &PlayerMatch) -> f64 {
        let result = if m.win {
            self.result_base
        } else {
            -self.result_base
        };
        (result + self.performance_modifier(m)).clamp(-self.step_clamp, self.step_clamp)
    }
}

/// Base rating for a queue: ranked solo starts above ranked flex, everything
/// else at the normal baseline.
pub fn base_mmr(queue_id: u32) -> i32 {
    match queue_id {
        420 => 1200,
        440 => 1100,
        _ => 1000,
    }
}

/// Tier/division label for a rating. Divisions span 100 MMR, tiers 400,
/// apex tiers are open-ended.
pub fn rank_for_mmr(mmr: i32) -> String {
    const TIERS: [&str; 7] = [
        "IRON", "BRONZE", "SILVER", "GOLD", "PLATINUM", "EMERALD", "DIAMOND",
    ];
    const DIVISIONS: [&str; 4] = ["IV", "III", "II", "I"];

    if mmr >= 3600 {
        return "CHALLENGER".into();
    }
    if mmr >= 3200 {
        return "GRANDMASTER".into();
    }
    if mmr >= 2800 {
        return "MASTER".into();
    }
    let clamped = mmr.max(0) as usize;
    let tier = (clamped / 400).min(TIERS.len() - 1);
    let division = (clamped % 400) / 100;
    format!("{} {}", TIERS[tier], DIVISIONS[division])
}

/// Confidence in a single match's estimate: longer games and ranked queues
/// carry more signal.
fn match_confidence(m: &PlayerMatch) -> f64 {
    let mut confidence: f64 = 0.5;
    if m.duration_secs > 1200 {
        confidence += 0.2;
    }
    if matches!(m.queue_id, 420 | 440) {
        confidence += 0.2;
    }
    confidence.min(1.0)
}

/// Walk `matches` (newest first, as the store returns them) into a
/// trajectory. Empty history yields the neutral default.
pub fn compute(matches: &[PlayerMatch], weights: &MmrWeights) -> MmrTrajectory {
    if matches.is_empty() {
        return MmrTrajectory::default();
    }

    // Oldest first for the walk.
    let mut ordered: Vec<&PlayerMatch> = matches.iter().collect();
    ordered.sort_by_key(|m| m.game_start);

    let start = f64::from(base_mmr(ordered[0].queue_id));
    let mut mmr = start;
    let mut points = Vec::with_capacity(ordered.len());
    let mut peak = start;
    let mut lowest = start;

    for m in &ordered {
        let change = weights.delta(m);
        mmr += change;
        peak = peak.max(mmr);
        lowest = lowest.min(mmr);
        points.push(MmrPoint {
            match_id: m.match_id.clone(),
            date: m.game_start,
            mmr: mmr.round() as i32,
            change: change.round() as i32,
            confidence: match_confidence(m),
            rank: rank_for_mmr(mmr.round() as i32),
        });
    }

    let changes: Vec<f64> = points.iter().map(|p| f64::from(p.change)).collect();
    let volatility = stddev(&changes);
    let trend = slope_trend(&points);

    let n = points.len() as f64;
    let avg_confidence = points.iter().map(|p| p.confidence).sum::<f64>() / n;
    let quantity_bonus = (n / 20.0).min(0.3);
    let confidence = (avg_confidence + quantity_bonus).min(1.0);

    let current_mmr = mmr.round() as i32;
    MmrTrajectory {
        points,
        current_mmr,
        current_rank: rank_for_mmr(current_mmr),
        peak_mmr: peak.round() as i32,
        lowest_mmr: lowest.round() as i32,
        volatility,
        trend,
        confidence,
    }
}

fn stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Least-squares slope of MMR over match index. More than +/-2 MMR per game
/// counts as a real trend.
fn slope_trend(points: &[MmrPoint]) -> Trend {
    const SLOPE_THRESHOLD: f64 = 2.0;
    if points.len() < 2 {
        return Trend::Stable;
    }
    let n = points.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = points.iter().map(|p| f64::from(p.mmr)).sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, p) in points.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (f64::from(p.mmr) - mean_y);
        den += dx * dx;
    }
    if den == 0.0 {
        return Trend::Stable;
    }
    let slope = num / den;
    if slope > SLOPE_THRESHOLD {
        Trend::Improving
    } else if slope < -SLOPE_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}
