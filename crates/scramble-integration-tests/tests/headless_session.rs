//! End-to-end sessions driven the way a host would: frames in, events out.

use std::fs;
use std::path::{Path, PathBuf};

use scramble_core::config::IncorrectSortPolicy;
use scramble_core::event::{Event, EventKind};
use scramble_core::fixed::Fixed64;
use scramble_core::item::{ItemBlueprint, ItemKind};
use scramble_core::session::{Session, SessionStatus};
use scramble_core::test_utils::*;
use scramble_core::upgrade::NoUpgrades;
use scramble_data::load_game_data;

// ===========================================================================
// Helpers
// ===========================================================================

fn standard_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../scramble-data/data/standard")
}

/// Copy the standard catalog files into a fresh temp dir, without session
/// tuning, so a test can supply its own.
fn tuned_dir(suffix: &str, session_toml: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "scramble_it_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    for file in ["items.ron", "receptacles.ron", "requesters.toml", "overlays.ron"] {
        fs::copy(standard_dir().join(file), dir.join(file)).unwrap();
    }
    fs::write(dir.join("session.toml"), session_toml).unwrap();
    dir
}

fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

fn kinds(session: &Session) -> Vec<EventKind> {
    session.events().history().iter().map(Event::kind).collect()
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn transport_runs_before_queued_sorts() {
    let mut session = started_session(21);
    let tech = bin(&session, "bin-tech");
    let edge = session.conveyor().lane_length() - Fixed64::from_num(0.5);
    let chip = session
        .place_item(ItemBlueprint::new(ItemKind::Datachip, "Edge Chip", 50).at(edge))
        .unwrap();

    session.submit_sort(chip, tech).unwrap();
    let report = session.step(33);

    // The item fell off the lane before the queued drop was applied.
    assert_eq!(report.missed, 1);
    assert_eq!(report.sorts_resolved, 0);
    assert_eq!(session.stats().sorted, 0);

    let history = kinds(&session);
    let missed = history
        .iter()
        .position(|k| *k == EventKind::ItemMissed)
        .unwrap();
    assert!(!history[missed..].contains(&EventKind::ItemSorted));
    let texts: Vec<String> = session
        .events()
        .history()
        .iter()
        .filter_map(|e| match e {
            Event::Feedback { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect();
    assert!(texts.iter().any(|t| t == "Missed: Edge Chip!"));
    assert!(texts.iter().any(|t| t == "Item not found"));
}

#[test]
fn tuned_session_file_controls_length_and_policy() {
    let dir = tuned_dir(
        "tuned",
        "session_length_ms = 5000\nincorrect_sort_policy = \"count_as_failure\"\noverlay_trigger_chance = 0.0\n",
    );
    let data = load_game_data(&dir).unwrap();
    assert_eq!(
        data.config.incorrect_sort_policy,
        IncorrectSortPolicy::CountAsFailure
    );

    let mut session = Session::new(data.catalog, data.config, Box::new(NoUpgrades), 5);
    session.start().unwrap();
    assert_eq!(session.seconds_left(), 5);

    let mut frames = 0;
    while session.status() == SessionStatus::Running {
        session.advance(16);
        frames += 1;
        assert!(frames < 1000, "session overran its length");
    }
    assert!(session.now() >= 5000);
    assert_eq!(session.time_left(), 0);
    let ended = kinds(&session)
        .into_iter()
        .filter(|k| *k == EventKind::SessionEnded)
        .count();
    assert_eq!(ended, 1);
    cleanup(&dir);
}

#[test]
fn pause_freezes_the_clock() {
    let mut session = started_with(eager_overlay_config(2000), Box::new(NoUpgrades), 31);
    for _ in 0..100 {
        session.advance(20);
    }
    session.pause().unwrap();
    let hash = session.state_hash();
    let left = session.time_left();

    for _ in 0..500 {
        let result = session.advance(50);
        assert_eq!(result.steps_run(), 0);
    }
    assert_eq!(session.state_hash(), hash);
    assert_eq!(session.time_left(), left);

    session.resume().unwrap();
    // A single frame after resume covers only its own time.
    let result = session.advance(40);
    assert_eq!(result.steps_run(), 1);
    assert_eq!(result.steps[0].dt, 40);
}

#[test]
fn restart_drops_pending_order_generation() {
    let mut session = started_session(41);
    open_order(&mut session, ItemKind::Biomod, 1, None);
    let gland = place(&mut session, ItemKind::Biomod);
    session
        .resolve_sort(gland, bin(&session, "bin-bio"))
        .unwrap();
    assert_eq!(session.pending_tasks(), 1);

    session.end();
    assert_eq!(session.pending_tasks(), 0);
    session.start().unwrap();
    assert_eq!(session.score(), 0);
    assert!(session.active_order().is_some());

    // The task from the previous run must not add a second order. History
    // is cleared on restart, so it holds only this run's events.
    for _ in 0..10 {
        session.step(500);
    }
    let generated = kinds(&session)
        .into_iter()
        .filter(|k| *k == EventKind::OrderGenerated)
        .count();
    assert_eq!(generated, 1);
}

#[test]
fn scripted_player_completes_orders() {
    let mut session = started_session(51);
    let mut completed = 0;
    for _ in 0..40 {
        if let Some(order) = session.active_order() {
            let (kind, target, remaining) = (order.kind, order.target, order.remaining());
            for _ in 0..remaining {
                let item = place(&mut session, kind);
                session.resolve_sort(item, target).unwrap();
            }
            completed += 1;
        }
        session.step(2000);
        if session.status() != SessionStatus::Running {
            break;
        }
    }
    assert!(completed >= 10);
    assert_eq!(session.snapshot().orders_completed, completed);
    assert!(session.level() > 1);
    assert_eq!(session.snapshot().orders_failed, 0);
}
