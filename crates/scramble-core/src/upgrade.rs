//! Persistent player upgrades, seen by the core only through
//! [`UpgradeProvider`]. Purchasing and persistence live outside the core.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::fixed::{f64_to_fixed64, Fixed64};

/// Modifier queries the core makes while scoring and spawning.
/// Implementations are read every time they are needed, never cached.
pub trait UpgradeProvider: std::fmt::Debug {
    /// Points added to the recycle award.
    fn recycle_bonus_value(&self) -> i64;
    /// Scale applied to the fragile extra penalty (1 = full penalty).
    fn fragile_penalty_modifier(&self) -> Fixed64;
    /// Scale applied to the spawn interval (above 1 spawns slower).
    fn base_spawn_interval_multiplier(&self) -> Fixed64;
}

/// A player with nothing installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUpgrades;

impl UpgradeProvider for NoUpgrades {
    fn recycle_bonus_value(&self) -> i64 {
        0
    }

    fn fragile_penalty_modifier(&self) -> Fixed64 {
        Fixed64::ONE
    }

    fn base_spawn_interval_multiplier(&self) -> Fixed64 {
        Fixed64::ONE
    }
}

/// Passive upgrades from the shop catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Upgrade {
    /// Spawn interval ×1.1.
    ConveyorClutch,
    /// +5 on every recycle.
    RecycleEfficiency,
    /// Halves the fragile extra penalty.
    FragileHandling,
}

impl Upgrade {
    pub const ALL: [Upgrade; 3] = [
        Upgrade::ConveyorClutch,
        Upgrade::RecycleEfficiency,
        Upgrade::FragileHandling,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Upgrade::ConveyorClutch => "conveyor_clutch_1",
            Upgrade::RecycleEfficiency => "recycle_efficiency_1",
            Upgrade::FragileHandling => "fragile_handling",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.key() == key)
    }

    pub fn name(self) -> &'static str {
        match self {
            Upgrade::ConveyorClutch => "Conveyor Clutch Mk1",
            Upgrade::RecycleEfficiency => "Recycle Efficiency v1",
            Upgrade::FragileHandling => "Fragile Handling",
        }
    }
}

/// The set of upgrades a player owns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeSet {
    owned: BTreeSet<Upgrade>,
}

impl UpgradeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if it was already owned.
    pub fn install(&mut self, upgrade: Upgrade) -> bool {
        self.owned.insert(upgrade)
    }

    pub fn uninstall(&mut self, upgrade: Upgrade) -> bool {
        self.owned.remove(&upgrade)
    }

    pub fn has(&self, upgrade: Upgrade) -> bool {
        self.owned.contains(&upgrade)
    }

    pub fn iter(&self) -> impl Iterator<Item = Upgrade> + '_ {
        self.owned.iter().copied()
    }
}

impl FromIterator<Upgrade> for UpgradeSet {
    fn from_iter<I: IntoIterator<Item = Upgrade>>(iter: I) -> Self {
        Self {
            owned: iter.into_iter().collect(),
        }
    }
}

impl UpgradeProvider for UpgradeSet {
    fn recycle_bonus_value(&self) -> i64 {
        if self.has(Upgrade::RecycleEfficiency) { 5 } else { 0 }
    }

    fn fragile_penalty_modifier(&self) -> Fixed64 {
        if self.has(Upgrade::FragileHandling) {
            f64_to_fixed64(0.5)
        } else {
            Fixed64::ONE
        }
    }

    fn base_spawn_interval_multiplier(&self) -> Fixed64 {
        if self.has(Upgrade::ConveyorClutch) {
            f64_to_fixed64(1.1)
        } else {
            Fixed64::ONE
        }
    }
}
