//! Item kinds and the live items that ride the conveyor.

use serde::{Deserialize, Serialize};

use crate::catalog::ItemDef;
use crate::config::MillisRange;
use crate::fixed::{f64_to_fixed64, Fixed64, Millis};
use crate::id::ItemId;
use crate::rng::SimRng;

// ---------------------------------------------------------------------------
// Item kinds
// ---------------------------------------------------------------------------

/// The closed set of item categories. Receptacles, orders and requester
/// preferences are all expressed in kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Datachip,
    Biomod,
    #[serde(alias = "hardware_common")]
    Hardware,
    Scrap,
    #[serde(alias = "corrupted_data")]
    Corrupted,
}

impl ItemKind {
    pub const ALL: [ItemKind; 5] = [
        ItemKind::Datachip,
        ItemKind::Biomod,
        ItemKind::Hardware,
        ItemKind::Scrap,
        ItemKind::Corrupted,
    ];

    /// Stable key used in data files and logs.
    pub fn key(self) -> &'static str {
        match self {
            ItemKind::Datachip => "datachip",
            ItemKind::Biomod => "biomod",
            ItemKind::Hardware => "hardware",
            ItemKind::Scrap => "scrap",
            ItemKind::Corrupted => "corrupted",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "datachip" => Some(ItemKind::Datachip),
            "biomod" => Some(ItemKind::Biomod),
            "hardware" | "hardware_common" => Some(ItemKind::Hardware),
            "scrap" => Some(ItemKind::Scrap),
            "corrupted" | "corrupted_data" => Some(ItemKind::Corrupted),
            _ => None,
        }
    }

    /// Junk kinds. They never enter the random spawn pool and earn the
    /// recycle award when dropped into a discard receptacle.
    pub fn is_discardable(self) -> bool {
        matches!(self, ItemKind::Scrap | ItemKind::Corrupted)
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Special properties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialProperty {
    Fragile,
    Volatile,
    Corrupted,
}

/// Countdown attached to a volatile item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volatility {
    pub spawned_at: Millis,
    pub lifespan: Millis,
}

impl Volatility {
    pub fn expires_at(&self) -> Millis {
        self.spawned_at.saturating_add(self.lifespan)
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// A live item. Owned by the conveyor until it is sorted, missed or explodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub name: String,
    pub value: u32,
    pub fragile: bool,
    pub volatility: Option<Volatility>,
    /// 0 for clean items, in [0.5, 1] for corrupted ones.
    pub corruption: Fixed64,
    /// Distance travelled along the lane.
    pub position: Fixed64,
}

impl Item {
    pub fn is_volatile(&self) -> bool {
        self.volatility.is_some()
    }

    pub fn is_corrupted(&self) -> bool {
        self.corruption > Fixed64::ZERO
    }

    /// True once the item's age exceeds its lifespan.
    pub fn has_expired(&self, now: Millis) -> bool {
        self.volatility.is_some_and(|v| now > v.expires_at())
    }
}

/// Everything an item needs except its id, which the conveyor assigns on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemBlueprint {
    pub kind: ItemKind,
    pub name: String,
    pub value: u32,
    pub fragile: bool,
    pub volatility: Option<Volatility>,
    pub corruption: Fixed64,
    pub position: Fixed64,
}

impl ItemBlueprint {
    pub fn new(kind: ItemKind, name: impl Into<String>, value: u32) -> Self {
        Self {
            kind,
            name: name.into(),
            value,
            fragile: false,
            volatility: None,
            corruption: Fixed64::ZERO,
            position: Fixed64::ZERO,
        }
    }

    pub fn fragile(mut self) -> Self {
        self.fragile = true;
        self
    }

    pub fn volatile(mut self, spawned_at: Millis, lifespan: Millis) -> Self {
        self.volatility = Some(Volatility {
            spawned_at,
            lifespan,
        });
        self
    }

    pub fn corrupted(mut self, level: Fixed64) -> Self {
        self.corruption = level;
        self
    }

    pub fn at(mut self, position: Fixed64) -> Self {
        self.position = position;
        self
    }

    pub fn special(&self) -> Option<SpecialProperty> {
        if self.fragile {
            Some(SpecialProperty::Fragile)
        } else if self.volatility.is_some() {
            Some(SpecialProperty::Volatile)
        } else if self.corruption > Fixed64::ZERO {
            Some(SpecialProperty::Corrupted)
        } else {
            None
        }
    }

    pub(crate) fn into_item(self, id: ItemId) -> Item {
        Item {
            id,
            kind: self.kind,
            name: self.name,
            value: self.value,
            fragile: self.fragile,
            volatility: self.volatility,
            corruption: self.corruption,
            position: self.position,
        }
    }
}

/// Roll a fresh item of the given definition.
///
/// With probability `special_chance` the item carries exactly one special
/// property, chosen uniformly among fragile, volatile and corrupted.
pub fn roll_blueprint(
    def: &ItemDef,
    rng: &mut SimRng,
    special_chance: Fixed64,
    now: Millis,
    volatile_lifespan: MillisRange,
) -> ItemBlueprint {
    let name = rng
        .pick(&def.names)
        .cloned()
        .unwrap_or_else(|| def.label.clone());
    let blueprint = ItemBlueprint::new(def.kind, name, def.value);
    if !rng.chance(special_chance) {
        return blueprint;
    }
    match rng.index(3) {
        Some(0) => blueprint.fragile(),
        Some(1) => {
            let lifespan = volatile_lifespan.sample(rng);
            blueprint.volatile(now, lifespan)
        }
        _ => {
            let level = rng.range_fixed(f64_to_fixed64(0.5), Fixed64::ONE);
            blueprint.corrupted(level)
        }
    }
}
