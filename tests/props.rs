//! Property-based tests for the analytics math and storage invariants.
//!
//! Random match histories and cache key sets verify that the pure
//! computations never produce NaN/Inf or panic, and that the idempotency
//! and isolation guarantees hold for arbitrary inputs.
//!
//! Run with: `cargo test --test props`

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use matchsync::analytics::{rank_for_mmr, MmrWeights};
use matchsync::{
    AnalyticsCache, AnalyticsKind, AnalyticsSnapshot, CacheKey, InMemoryMatchStore, MatchRecord,
    MatchStore, MemoryCache, Participant, PeriodStats, PlayerMatch, UpsertOutcome,
};

// =============================================================================
// Strategies
// =============================================================================

fn participant_strategy() -> impl Strategy<Value = Participant> {
    (
        0u32..50,
        0u32..30,
        0u32..60,
        0u32..600,
        0u32..40_000,
        0u32..120_000,
        0u32..150,
        any::<bool>(),
        0i32..200,
    )
        .prop_map(
            |(kills, deaths, assists, cs, gold, damage, vision, win, champion)| Participant {
                puuid: "puuid-prop".into(),
                champion_id: champion,
                champion_name: format!("Champ{champion}"),
                role: "MIDDLE".into(),
                team_id: 100,
                kills,
                deaths,
                assists,
                creep_score: cs,
                gold_earned: gold,
                damage_to_champions: damage,
                vision_score: vision,
                win,
            },
        )
}

fn record_strategy() -> impl Strategy<Value = MatchRecord> {
    (0u32..100_000, 0u32..8_000, prop_oneof![Just(420u32), Just(440), Just(400), Just(450)])
        .prop_map(|(index, duration, queue)| MatchRecord {
            match_id: format!("PROP_{index}"),
            game_start: Utc.timestamp_opt(1_700_000_000 + i64::from(index) * 60, 0).unwrap(),
            duration_secs: duration,
            queue_id: queue,
            game_mode: "CLASSIC".into(),
        })
}

fn player_match_strategy() -> impl Strategy<Value = PlayerMatch> {
    (record_strategy(), participant_strategy())
        .prop_map(|(record, participant)| PlayerMatch::from_match(&record, &participant))
}

fn history_strategy(max: usize) -> impl Strategy<Value = Vec<PlayerMatch>> {
    prop::collection::vec(player_match_strategy(), 0..max)
}

// =============================================================================
// Derived stats stay finite
// =============================================================================

proptest! {
    #[test]
    fn prop_per_match_rates_finite(m in player_match_strategy()) {
        prop_assert!(m.kda().is_finite());
        prop_assert!(m.kda() >= 0.0);
        prop_assert!(m.cs_per_minute().is_finite());
        prop_assert!(m.gold_per_minute().is_finite());
        prop_assert!(m.damage_per_minute().is_finite());
    }

    #[test]
    fn prop_rank_label_total(mmr in any::<i32>()) {
        let label = rank_for_mmr(mmr);
        prop_assert!(!label.is_empty());
    }

    #[test]
    fn prop_mmr_walk_bounded(history in history_strategy(60)) {
        let weights = MmrWeights::default();
        let trajectory = matchsync::analytics::compute_mmr(&history, &weights);

        prop_assert_eq!(trajectory.points.len(), history.len());
        prop_assert!(trajectory.lowest_mmr <= trajectory.current_mmr);
        prop_assert!(trajectory.current_mmr <= trajectory.peak_mmr);
        prop_assert!(trajectory.volatility.is_finite());
        prop_assert!((0.0..=1.0).contains(&trajectory.confidence));
        for point in &trajectory.points {
            prop_assert!(point.change.abs() <= weights.step_clamp as i32);
        }
    }

    #[test]
    fn prop_period_stats_finite(history in history_strategy(60)) {
        let now = Utc::now();
        let matches: Vec<PlayerMatch> = history
            .into_iter()
            .enumerate()
            .map(|(i, mut m)| {
                // Pull every game into the window under test.
                m.game_start = now - ChronoDuration::hours(i as i64);
                m
            })
            .collect();
        let stats: PeriodStats =
            matchsync::analytics::compute_period(&matches, matchsync::Period::Season, now);

        prop_assert!(stats.win_rate.is_finite());
        prop_assert!((0.0..=100.0).contains(&stats.win_rate));
        prop_assert!((0.0..=100.0).contains(&stats.performance_score));
        prop_assert!(stats.avg_kda.is_finite());
        prop_assert_eq!(stats.wins + stats.losses, stats.games);
    }

    #[test]
    fn prop_recommendations_bounded(history in history_strategy(60)) {
        let recs = matchsync::analytics::compute_recommendations(&history);
        prop_assert!(recs.len() <= 5);
        for rec in &recs {
            prop_assert!(rec.score.is_finite());
            prop_assert!((0.0..=1.0).contains(&rec.confidence));
        }
    }
}

// =============================================================================
// Storage and cache invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_upsert_idempotent(record in record_strategy(), participants in prop::collection::vec(participant_strategy(), 1..6)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        rt.block_on(async {
            let store = InMemoryMatchStore::new();
            let first = store.upsert_match(&record, &participants).await.unwrap();
            prop_assert_eq!(first, UpsertOutcome::Inserted);
            let second = store.upsert_match(&record, &participants).await.unwrap();
            prop_assert_eq!(second, UpsertOutcome::Unchanged);
            prop_assert_eq!(store.match_count(), 1);
            Ok(())
        })?;
    }

    #[test]
    fn prop_cache_invalidation_isolated(
        players in prop::collection::hash_set(1i64..50, 2..8),
        victim_index in 0usize..8,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        rt.block_on(async {
            let cache = Arc::new(MemoryCache::new());
            let players: Vec<i64> = players.into_iter().collect();
            let victim = players[victim_index % players.len()];

            for &player in &players {
                for kind in [
                    AnalyticsKind::PeriodStats,
                    AnalyticsKind::MmrTrajectory,
                    AnalyticsKind::Recommendations,
                ] {
                    let key = CacheKey::new(player, kind, "all");
                    let snap = AnalyticsSnapshot::Period(PeriodStats::default());
                    cache.set(&key, &snap, Duration::from_secs(300)).await.unwrap();
                }
            }

            let dropped = cache.invalidate_player(victim).await.unwrap();
            prop_assert_eq!(dropped, 3);

            // The victim's entries are gone, everyone else's survive.
            for &player in &players {
                let key = CacheKey::new(player, AnalyticsKind::PeriodStats, "all");
                let hit = cache.get(&key).await.unwrap();
                if player == victim {
                    prop_assert!(hit.is_none());
                } else {
                    prop_assert!(hit.is_some());
                }
            }
            Ok(())
        })?;
    }
}
