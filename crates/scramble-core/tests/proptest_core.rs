//! Property-based tests for the Scramble core.
//!
//! Uses proptest to generate random action sequences, then verify the
//! invariants the components promise hold throughout.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use proptest::prelude::*;
use scramble_core::catalog::Catalog;
use scramble_core::config::{IncorrectSortPolicy, MillisRange, SessionConfig};
use scramble_core::difficulty::{DifficultyController, MAX_LEVEL, MIN_LEVEL};
use scramble_core::event::{Event, EventKind};
use scramble_core::fixed::Fixed64;
use scramble_core::item::{ItemBlueprint, ItemKind};
use scramble_core::overlay::{OverlayScheduler, OverlayTransition};
use scramble_core::rng::SimRng;
use scramble_core::test_utils::*;
use scramble_core::transport::{Conveyor, TransportEnv};
use scramble_core::upgrade::NoUpgrades;

// ===========================================================================
// Generators
// ===========================================================================

fn arb_kind() -> impl Strategy<Value = ItemKind> {
    (0..ItemKind::ALL.len()).prop_map(|i| ItemKind::ALL[i])
}

fn arb_bin_key() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("bin-tech"), Just("bin-bio"), Just("bin-discard")]
}

/// Player and clock actions against a running session.
#[derive(Debug, Clone)]
enum Action {
    Drop(ItemKind, &'static str),
    Step(u64),
}

fn arb_actions(max: usize) -> impl Strategy<Value = Vec<Action>> {
    proptest::collection::vec(
        prop_oneof![
            3 => (arb_kind(), arb_bin_key()).prop_map(|(k, b)| Action::Drop(k, b)),
            1 => (1..400u64).prop_map(Action::Step),
        ],
        1..=max,
    )
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// 0 <= collected <= required, and collected never decreases for an order.
    #[test]
    fn order_progress_is_bounded_and_monotonic(
        quantity in 1..6u32,
        actions in arb_actions(60),
        seed in 0..1000u64,
    ) {
        let mut session = started_session(seed);
        open_order(&mut session, ItemKind::Datachip, quantity, None);

        let mut last: Option<(u64, u32)> = None;
        for action in actions {
            match action {
                Action::Drop(kind, key) => {
                    let item = place(&mut session, kind);
                    let receptacle = bin(&session, key);
                    let _ = session.resolve_sort(item, receptacle);
                }
                Action::Step(dt) => {
                    session.step(dt);
                }
            }
            if let Some(order) = session.active_order() {
                prop_assert!(order.collected() <= order.required);
                if let Some((id, collected)) = last
                    && id == order.id.0
                {
                    prop_assert!(order.collected() >= collected);
                }
                last = Some((order.id.0, order.collected()));
            }
        }
    }

    /// The level stays in [MIN_LEVEL, MAX_LEVEL] and the streaks are never
    /// both non-zero.
    #[test]
    fn difficulty_level_is_clamped(outcomes in proptest::collection::vec(any::<bool>(), 0..200)) {
        let mut difficulty = DifficultyController::new(IncorrectSortPolicy::Ignore);
        for success in outcomes {
            if success {
                difficulty.notify_success();
            } else {
                difficulty.notify_failure();
            }
            let state = difficulty.state();
            prop_assert!((MIN_LEVEL..=MAX_LEVEL).contains(&state.level));
            prop_assert!(state.success_streak == 0 || state.failure_streak == 0);
        }
    }

    /// Every started overlay ends exactly once and leaves the modifiers
    /// exactly as they were before it started.
    #[test]
    fn overlays_always_reverse(
        window in 1..5000u64,
        level in 1..=10u32,
        dts in proptest::collection::vec(1..3000u64, 1..200),
        seed in 0..1000u64,
    ) {
        let catalog = Catalog::standard();
        let mut rng = SimRng::new(seed);
        let mut overlays = OverlayScheduler::new(
            MillisRange::new(window, window * 2),
            Fixed64::ONE,
            &mut rng,
        );
        let mut started = 0u32;
        let mut ended = 0u32;
        let mut now = 0u64;
        for dt in dts {
            now += dt;
            match overlays.advance(dt, level, &catalog, &mut rng, now) {
                Some(OverlayTransition::Started(active)) => {
                    prop_assert_eq!(started, ended);
                    prop_assert!(overlays.active().is_some());
                    prop_assert_eq!(overlays.active().map(|a| a.overlay), Some(active.overlay));
                    started += 1;
                }
                Some(OverlayTransition::Ended(_)) => {
                    ended += 1;
                    prop_assert_eq!(started, ended);
                    prop_assert!(overlays.modifiers().is_neutral());
                }
                None => {}
            }
        }
        if overlays.force_end().is_some() {
            ended += 1;
        }
        prop_assert_eq!(started, ended);
        prop_assert!(overlays.modifiers().is_neutral());
        prop_assert!(overlays.force_end().is_none());
    }

    /// An item leaves the lane at most once, and every item is either still
    /// on the lane or was reported.
    #[test]
    fn lane_exits_are_reported_once(
        placed in 0..20usize,
        dts in proptest::collection::vec(1..1500u64, 1..120),
        seed in 0..1000u64,
    ) {
        let catalog = Catalog::standard();
        let config = SessionConfig::default();
        let mut rng = SimRng::new(seed);
        let mut conveyor = Conveyor::new(&config, &mut rng);
        for i in 0..placed {
            let blueprint = ItemBlueprint::new(ItemKind::Hardware, "Gear", 40)
                .at(fixed((i * 37) as f64));
            let blueprint = if i % 3 == 0 {
                blueprint.volatile(0, 1500 + (i as u64) * 200)
            } else {
                blueprint
            };
            conveyor.place(blueprint);
        }

        let mut reported = HashSet::new();
        let mut now = 0u64;
        for dt in dts {
            now += dt;
            let env = TransportEnv {
                catalog: &catalog,
                demand: None,
                order_bias: config.order_bias,
                special_chance: fixed(0.3),
                volatile_lifespan: config.volatile_lifespan,
                spawn_interval_multiplier: Fixed64::ONE,
                speed_multiplier: Fixed64::ONE,
                now,
            };
            let report = conveyor.advance(dt, &env, &mut rng);
            for item in report.missed.iter().chain(report.exploded.iter()) {
                prop_assert!(reported.insert(item.id), "item reported twice");
                prop_assert!(!conveyor.contains(item.id));
            }
        }
        // Placed items count toward the spawn total.
        prop_assert!(conveyor.spawned_total() >= placed as u64);
        prop_assert_eq!(
            conveyor.spawned_total(),
            (conveyor.len() + reported.len()) as u64
        );
    }

    /// The score always equals the sum of the published deltas.
    #[test]
    fn score_matches_published_deltas(actions in arb_actions(80), seed in 0..1000u64) {
        let mut session = started_session(seed);
        let sum = Rc::new(Cell::new(0i64));
        let sink = Rc::clone(&sum);
        session.on_event(EventKind::ScoreChanged, Box::new(move |event| {
            if let Event::ScoreChanged { delta, .. } = event {
                sink.set(sink.get() + delta);
            }
        }));

        for action in actions {
            match action {
                Action::Drop(kind, key) => {
                    let item = place(&mut session, kind);
                    let receptacle = bin(&session, key);
                    let _ = session.resolve_sort(item, receptacle);
                }
                Action::Step(dt) => {
                    session.step(dt);
                }
            }
        }
        prop_assert_eq!(sum.get(), session.score());
    }

    /// Two sessions with the same seed and frames stay in lockstep.
    #[test]
    fn deterministic_sessions(
        seed in 0..10_000u64,
        frames in proptest::collection::vec(1..60u64, 1..400),
    ) {
        let mut a = started_with(eager_overlay_config(3000), Box::new(NoUpgrades), seed);
        let mut b = started_with(eager_overlay_config(3000), Box::new(NoUpgrades), seed);
        for frame in frames {
            a.advance(frame);
            b.advance(frame);
        }
        prop_assert_eq!(a.state_hash(), b.state_hash());
        prop_assert_eq!(a.score(), b.score());
    }
}
