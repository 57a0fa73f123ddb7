//! Shared test helpers for unit and integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so integration
//! tests in other crates can use them through the `test-utils` feature.

use crate::catalog::Catalog;
use crate::config::{MillisRange, SessionConfig};
use crate::fixed::{f64_to_fixed64, Fixed64};
use crate::id::{ItemId, ReceptacleId};
use crate::item::{ItemBlueprint, ItemKind};
use crate::order::OrderRequest;
use crate::session::Session;
use crate::upgrade::{NoUpgrades, UpgradeProvider};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    f64_to_fixed64(v)
}

// ===========================================================================
// Configs
// ===========================================================================

/// Default config with overlays that never trigger.
pub fn quiet_config() -> SessionConfig {
    SessionConfig {
        overlay_trigger_chance: Fixed64::ZERO,
        ..SessionConfig::default()
    }
}

/// Default config with an overlay check every `every` ms that always fires.
pub fn eager_overlay_config(every: u64) -> SessionConfig {
    SessionConfig {
        overlay_window: MillisRange::new(every, every),
        overlay_trigger_chance: Fixed64::ONE,
        ..SessionConfig::default()
    }
}

// ===========================================================================
// Sessions
// ===========================================================================

/// A started session on the standard catalog with overlays disabled.
pub fn started_session(seed: u64) -> Session {
    started_with(quiet_config(), Box::new(NoUpgrades), seed)
}

pub fn started_with(
    config: SessionConfig,
    upgrades: Box<dyn UpgradeProvider>,
    seed: u64,
) -> Session {
    let mut session = Session::new(Catalog::standard(), config, upgrades, seed);
    session
        .start()
        .expect("standard catalog always starts");
    session
}

pub fn bin(session: &Session, key: &str) -> ReceptacleId {
    session
        .catalog()
        .receptacle_id(key)
        .unwrap_or_else(|| panic!("no receptacle {key}"))
}

/// Replace the active order with `quantity` × `kind` from Whisper.
pub fn open_order(session: &mut Session, kind: ItemKind, quantity: u32, target: Option<ReceptacleId>) {
    let requester = session
        .catalog()
        .requester_id("whisper")
        .expect("standard catalog has whisper");
    session
        .open_order(OrderRequest {
            requester,
            kind,
            quantity,
            target,
        })
        .expect("order opens");
}

/// Place a plain item of `kind` at the start of the lane.
pub fn place(session: &mut Session, kind: ItemKind) -> ItemId {
    let value = session.catalog().item(kind).map_or(0, |d| d.value);
    session
        .place_item(ItemBlueprint::new(kind, kind.key(), value))
        .expect("session is active")
}

pub fn place_fragile(session: &mut Session, kind: ItemKind) -> ItemId {
    let value = session.catalog().item(kind).map_or(0, |d| d.value);
    session
        .place_item(ItemBlueprint::new(kind, kind.key(), value).fragile())
        .expect("session is active")
}
