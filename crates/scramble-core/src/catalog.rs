//! Immutable game catalog: item definitions, receptacles, requesters and
//! overlays. Built once through [`CatalogBuilder`] and shared read-only by
//! every component of a session.

use std::collections::{BTreeSet, HashMap};

use tracing::warn;

use crate::fixed::{f64_to_fixed64, Fixed64, Millis};
use crate::id::{OverlayId, ReceptacleId, RequesterId};
use crate::item::ItemKind;
use crate::overlay::OverlayEffect;

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Static data for one item kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDef {
    pub kind: ItemKind,
    pub label: String,
    pub value: u32,
    /// Flavour names; one is drawn per spawned item.
    pub names: Vec<String>,
}

/// A sorting destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Receptacle {
    pub key: String,
    pub label: String,
    pub accepts: BTreeSet<ItemKind>,
    /// Marks the junk destination used for recycling and as routing fallback.
    pub discard: bool,
}

impl Receptacle {
    pub fn accepts(&self, kind: ItemKind) -> bool {
        self.accepts.contains(&kind)
    }
}

/// Inclusive quantity bounds for orders placed by a requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityRange {
    pub min: u32,
    pub max: u32,
}

/// Flavour text a requester draws from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dialogue {
    pub order_prefixes: Vec<String>,
    pub success: Vec<String>,
    pub failure: Vec<String>,
}

/// A requester persona that places orders.
#[derive(Debug, Clone, PartialEq)]
pub struct RequesterProfile {
    pub key: String,
    pub name: String,
    pub description: String,
    pub preferred: Vec<ItemKind>,
    pub quantity: QuantityRange,
    /// Chance that an order-biased spawn carries a special property.
    pub property_chance: Fixed64,
    pub dialogue: Dialogue,
}

/// A timed global modifier the overlay scheduler can trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayDef {
    pub key: String,
    pub name: String,
    pub description: String,
    pub duration: Millis,
    pub min_level: u32,
    pub effect: OverlayEffect,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog defines no item kinds")]
    NoItemKinds,
    #[error("catalog defines no receptacles")]
    NoReceptacles,
    #[error("catalog defines no requesters")]
    NoRequesters,
    #[error("item kind '{0}' defined more than once")]
    DuplicateItemKind(ItemKind),
    #[error("duplicate {section} key '{key}'")]
    DuplicateKey { section: &'static str, key: String },
    #[error("requester '{requester}' has invalid quantity range {min}..={max}")]
    InvalidQuantity { requester: String, min: u32, max: u32 },
    #[error("overlay '{0}' has zero duration")]
    ZeroDuration(String),
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing an immutable [`Catalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    items: Vec<ItemDef>,
    receptacles: Vec<Receptacle>,
    requesters: Vec<RequesterProfile>,
    overlays: Vec<OverlayDef>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_item(&mut self, def: ItemDef) {
        self.items.push(def);
    }

    /// Register a receptacle. Returns its ID.
    pub fn register_receptacle(
        &mut self,
        key: &str,
        label: &str,
        accepts: &[ItemKind],
        discard: bool,
    ) -> ReceptacleId {
        let id = ReceptacleId(self.receptacles.len() as u32);
        self.receptacles.push(Receptacle {
            key: key.to_string(),
            label: label.to_string(),
            accepts: accepts.iter().copied().collect(),
            discard,
        });
        id
    }

    /// Register a requester profile. Returns its ID.
    pub fn register_requester(&mut self, profile: RequesterProfile) -> RequesterId {
        let id = RequesterId(self.requesters.len() as u32);
        self.requesters.push(profile);
        id
    }

    /// Register an overlay definition. Returns its ID.
    pub fn register_overlay(&mut self, def: OverlayDef) -> OverlayId {
        let id = OverlayId(self.overlays.len() as u32);
        self.overlays.push(def);
        id
    }

    pub fn receptacle_id(&self, key: &str) -> Option<ReceptacleId> {
        self.receptacles
            .iter()
            .position(|r| r.key == key)
            .map(|i| ReceptacleId(i as u32))
    }

    /// Validate and freeze the catalog.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        let catalog = Catalog::from_parts(
            self.items,
            self.receptacles,
            self.requesters,
            self.overlays,
        );
        catalog.validate()?;
        Ok(catalog)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Immutable catalog. Frozen after build().
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<ItemDef>,
    spawnable: Vec<ItemKind>,
    receptacles: Vec<Receptacle>,
    receptacle_by_key: HashMap<String, ReceptacleId>,
    requesters: Vec<RequesterProfile>,
    overlays: Vec<OverlayDef>,
}

impl Catalog {
    fn from_parts(
        items: Vec<ItemDef>,
        receptacles: Vec<Receptacle>,
        requesters: Vec<RequesterProfile>,
        overlays: Vec<OverlayDef>,
    ) -> Self {
        let spawnable = items
            .iter()
            .map(|d| d.kind)
            .filter(|k| !k.is_discardable())
            .collect();
        let receptacle_by_key = receptacles
            .iter()
            .enumerate()
            .map(|(i, r)| (r.key.clone(), ReceptacleId(i as u32)))
            .collect();
        Self {
            items,
            spawnable,
            receptacles,
            receptacle_by_key,
            requesters,
            overlays,
        }
    }

    /// Check the structural rules a session relies on.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.items.is_empty() {
            return Err(CatalogError::NoItemKinds);
        }
        if self.receptacles.is_empty() {
            return Err(CatalogError::NoReceptacles);
        }
        if self.requesters.is_empty() {
            return Err(CatalogError::NoRequesters);
        }

        let mut kinds = BTreeSet::new();
        for def in &self.items {
            if !kinds.insert(def.kind) {
                return Err(CatalogError::DuplicateItemKind(def.kind));
            }
        }
        check_unique("receptacle", self.receptacles.iter().map(|r| &r.key))?;
        check_unique("requester", self.requesters.iter().map(|r| &r.key))?;
        check_unique("overlay", self.overlays.iter().map(|o| &o.key))?;

        for r in &self.requesters {
            if r.quantity.min == 0 || r.quantity.min > r.quantity.max {
                return Err(CatalogError::InvalidQuantity {
                    requester: r.key.clone(),
                    min: r.quantity.min,
                    max: r.quantity.max,
                });
            }
        }
        for o in &self.overlays {
            if o.duration == 0 {
                return Err(CatalogError::ZeroDuration(o.key.clone()));
            }
        }
        Ok(())
    }

    // -- items --------------------------------------------------------------

    pub fn item(&self, kind: ItemKind) -> Option<&ItemDef> {
        self.items.iter().find(|d| d.kind == kind)
    }

    pub fn items(&self) -> &[ItemDef] {
        &self.items
    }

    /// Kinds eligible for unbiased random spawns (non-discardable only).
    pub fn spawnable_kinds(&self) -> &[ItemKind] {
        &self.spawnable
    }

    pub fn item_label(&self, kind: ItemKind) -> String {
        self.item(kind)
            .map(|d| d.label.clone())
            .unwrap_or_else(|| kind.key().to_string())
    }

    // -- receptacles --------------------------------------------------------

    pub fn receptacle(&self, id: ReceptacleId) -> Option<&Receptacle> {
        self.receptacles.get(id.0 as usize)
    }

    pub fn receptacle_id(&self, key: &str) -> Option<ReceptacleId> {
        self.receptacle_by_key.get(key).copied()
    }

    pub fn receptacles(&self) -> impl Iterator<Item = (ReceptacleId, &Receptacle)> {
        self.receptacles
            .iter()
            .enumerate()
            .map(|(i, r)| (ReceptacleId(i as u32), r))
    }

    pub fn receptacle_count(&self) -> usize {
        self.receptacles.len()
    }

    pub fn discard_receptacle(&self) -> Option<ReceptacleId> {
        self.receptacles
            .iter()
            .position(|r| r.discard)
            .map(|i| ReceptacleId(i as u32))
    }

    /// The receptacle an order for `kind` should target: the first one that
    /// accepts the kind, else the discard receptacle, else the first one.
    pub fn receptacle_for(&self, kind: ItemKind) -> Option<ReceptacleId> {
        if let Some(i) = self.receptacles.iter().position(|r| r.accepts(kind)) {
            return Some(ReceptacleId(i as u32));
        }
        let fallback = self
            .discard_receptacle()
            .or_else(|| (!self.receptacles.is_empty()).then_some(ReceptacleId(0)));
        warn!(kind = %kind, ?fallback, "No receptacle accepts kind, using fallback");
        fallback
    }

    // -- requesters ---------------------------------------------------------

    pub fn requester(&self, id: RequesterId) -> Option<&RequesterProfile> {
        self.requesters.get(id.0 as usize)
    }

    pub fn requester_id(&self, key: &str) -> Option<RequesterId> {
        self.requesters
            .iter()
            .position(|r| r.key == key)
            .map(|i| RequesterId(i as u32))
    }

    pub fn requester_count(&self) -> usize {
        self.requesters.len()
    }

    // -- overlays -----------------------------------------------------------

    pub fn overlay(&self, id: OverlayId) -> Option<&OverlayDef> {
        self.overlays.get(id.0 as usize)
    }

    pub fn overlay_id(&self, key: &str) -> Option<OverlayId> {
        self.overlays
            .iter()
            .position(|o| o.key == key)
            .map(|i| OverlayId(i as u32))
    }

    /// Overlays eligible at the given difficulty level.
    pub fn overlays_for_level(&self, level: u32) -> Vec<OverlayId> {
        self.overlays
            .iter()
            .enumerate()
            .filter(|(_, o)| o.min_level <= level)
            .map(|(i, _)| OverlayId(i as u32))
            .collect()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    /// The stock catalog the game ships with.
    pub fn standard() -> Catalog {
        let mut b = CatalogBuilder::new();
        for def in standard_items() {
            b.register_item(def);
        }
        b.register_receptacle(
            "bin-tech",
            "TECH",
            &[ItemKind::Datachip, ItemKind::Hardware],
            false,
        );
        b.register_receptacle("bin-bio", "BIO", &[ItemKind::Biomod], false);
        b.register_receptacle(
            "bin-discard",
            "DISCARD",
            &[ItemKind::Scrap, ItemKind::Corrupted],
            true,
        );
        for profile in standard_requesters() {
            b.register_requester(profile);
        }
        for def in standard_overlays() {
            b.register_overlay(def);
        }
        Catalog::from_parts(b.items, b.receptacles, b.requesters, b.overlays)
    }
}

fn check_unique<'a>(
    section: &'static str,
    keys: impl Iterator<Item = &'a String>,
) -> Result<(), CatalogError> {
    let mut seen = BTreeSet::new();
    for key in keys {
        if !seen.insert(key.as_str()) {
            return Err(CatalogError::DuplicateKey {
                section,
                key: key.clone(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stock content
// ---------------------------------------------------------------------------

fn strings(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

fn standard_items() -> Vec<ItemDef> {
    let def = |kind, label: &str, value, names: &[&str]| ItemDef {
        kind,
        label: label.to_string(),
        value,
        names: strings(names),
    };
    vec![
        def(
            ItemKind::Datachip,
            "Datachip",
            50,
            &["K-Corp Datastick", "Ronin InfoShingle", "ZetaArch Logchip"],
        ),
        def(
            ItemKind::Biomod,
            "Biomod",
            75,
            &["Adreno-Boost V2", "Cyto-Regen Patch", "Neural Lace Shard"],
        ),
        def(
            ItemKind::Hardware,
            "Hardware",
            40,
            &["Positronic Relay", "Scavenged Gyro", "Mk3 Servo"],
        ),
        def(
            ItemKind::Scrap,
            "Scrap",
            5,
            &["Bent Plasteel", "Frayed Wiring", "Cracked Casing"],
        ),
        def(
            ItemKind::Corrupted,
            "Corrupted Data",
            10,
            &["Glitched Memory Unit", "Fragmented AI Core", "Null-Sector Data"],
        ),
    ]
}

fn standard_requesters() -> Vec<RequesterProfile> {
    vec![
        RequesterProfile {
            key: "whisper".to_string(),
            name: "Whisper".to_string(),
            description: "Deals in quick, often illicit data transfers. Low pay, low risk, but very impatient.".to_string(),
            preferred: vec![ItemKind::Datachip, ItemKind::Corrupted],
            quantity: QuantityRange { min: 1, max: 3 },
            property_chance: f64_to_fixed64(0.05),
            dialogue: Dialogue {
                order_prefixes: strings(&[
                    "Psst, Runner. Got a quick job:",
                    "Urgent intercept: Need you to sort this data packet:",
                    "Whisper here. Handle this on the quiet:",
                    "Priority transmission for your eyes only:",
                ]),
                success: strings(&[
                    "Good work. Payment wired.",
                    "Clean sort. As expected.",
                    "You're useful. For now.",
                ]),
                failure: strings(&[
                    "Sloppy! That's on your tab.",
                    "You trying to get me zeroed?",
                    "Find another line of work.",
                ]),
            },
        },
        RequesterProfile {
            key: "doc_nyx".to_string(),
            name: "Doc Nyx".to_string(),
            description: "An enigmatic bio-hacker always in need of 'ethically sourced' biomods and samples. Pays well for pristine goods.".to_string(),
            preferred: vec![ItemKind::Biomod],
            quantity: QuantityRange { min: 1, max: 2 },
            property_chance: f64_to_fixed64(0.25),
            dialogue: Dialogue {
                order_prefixes: strings(&[
                    "Doc Nyx requisition: The following biologicals are required for project Chimera:",
                    "Runner, my research demands fresh samples. Sort these:",
                    "A delicate procedure needs specific components. Handle with care:",
                    "Procure these biomods. Discretion is paramount, quality even more so.",
                ]),
                success: strings(&[
                    "Acceptable. The organic matrix is stable.",
                    "Excellent. These will advance my work significantly.",
                    "Your efficiency is noted, Runner.",
                ]),
                failure: strings(&[
                    "Contaminated! This is useless!",
                    "You call this careful handling? Incompetent!",
                    "My 'patients' are disappointed.",
                ]),
            },
        },
        RequesterProfile {
            key: "socket".to_string(),
            name: "Socket".to_string(),
            description: "A gruff tech-scavenger and hardware broker. Always looking for specific parts, doesn't care much for condition.".to_string(),
            preferred: vec![ItemKind::Hardware, ItemKind::Scrap],
            quantity: QuantityRange { min: 2, max: 5 },
            property_chance: f64_to_fixed64(0.10),
            dialogue: Dialogue {
                order_prefixes: strings(&[
                    "Socket needs parts, Runner. Get these to my drop:",
                    "Got a buyer lined up for this hardware. Don't mess it up:",
                    "This rig won't build itself. I need these components, stat:",
                    "Found a schematic for a new toy. Requires these bits and pieces:",
                ]),
                success: strings(&[
                    "Solid work. Parts are good.",
                    "Heh, not bad, Runner. This'll fetch a good price.",
                    "Another successful transaction.",
                ]),
                failure: strings(&[
                    "Wrong parts! You blind or just stupid?",
                    "This is junk! Not the junk I asked for!",
                    "My client's gonna be pissed... and so am I.",
                ]),
            },
        },
    ]
}

fn standard_overlays() -> Vec<OverlayDef> {
    let def = |key: &str, name: &str, description: &str, secs: Millis, min_level, effect| {
        OverlayDef {
            key: key.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            duration: secs * 1000,
            min_level,
            effect,
        }
    };
    vec![
        def(
            "conveyor_surge",
            "Conveyor Surge",
            "Power fluctuations cause the conveyor to speed up erratically!",
            10,
            2,
            OverlayEffect::ConveyorSpeed(f64_to_fixed64(1.5)),
        ),
        def(
            "conveyor_lag",
            "Conveyor Lag",
            "The conveyor belt is jammed and slows to a crawl.",
            20,
            1,
            OverlayEffect::ConveyorSpeed(f64_to_fixed64(0.5)),
        ),
        def(
            "rush_order",
            "Rush Order",
            "A high-priority client is paying extra for every completed order.",
            30,
            1,
            OverlayEffect::OrderBonus(50),
        ),
        def(
            "supply_flood",
            "Supply Flood",
            "A dump truck of salvage hits the intake. Items arrive faster.",
            12,
            3,
            OverlayEffect::SpawnInterval(f64_to_fixed64(0.6)),
        ),
        def(
            "sensor_glitch",
            "Sensor Glitch",
            "Item scanners are malfunctioning! Item types may be obscured.",
            7,
            3,
            OverlayEffect::SensorGlitch,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_builder() -> CatalogBuilder {
        let mut b = CatalogBuilder::new();
        b.register_item(ItemDef {
            kind: ItemKind::Datachip,
            label: "Datachip".to_string(),
            value: 50,
            names: vec![],
        });
        b.register_receptacle("tech", "TECH", &[ItemKind::Datachip], false);
        b.register_requester(RequesterProfile {
            key: "whisper".to_string(),
            name: "Whisper".to_string(),
            description: String::new(),
            preferred: vec![ItemKind::Datachip],
            quantity: QuantityRange { min: 1, max: 2 },
            property_chance: Fixed64::ZERO,
            dialogue: Dialogue::default(),
        });
        b
    }

    #[test]
    fn standard_catalog_is_valid() {
        let catalog = Catalog::standard();
        catalog.validate().unwrap();
        assert_eq!(catalog.items().len(), 5);
        assert_eq!(catalog.receptacle_count(), 3);
        assert_eq!(catalog.requester_count(), 3);
        assert_eq!(catalog.overlay_count(), 5);
    }

    #[test]
    fn spawn_pool_excludes_junk() {
        let catalog = Catalog::standard();
        assert_eq!(
            catalog.spawnable_kinds(),
            &[ItemKind::Datachip, ItemKind::Biomod, ItemKind::Hardware]
        );
    }

    #[test]
    fn receptacle_routing() {
        let catalog = Catalog::standard();
        let tech = catalog.receptacle_id("bin-tech").unwrap();
        let bio = catalog.receptacle_id("bin-bio").unwrap();
        let discard = catalog.receptacle_id("bin-discard").unwrap();
        assert_eq!(catalog.receptacle_for(ItemKind::Datachip), Some(tech));
        assert_eq!(catalog.receptacle_for(ItemKind::Hardware), Some(tech));
        assert_eq!(catalog.receptacle_for(ItemKind::Biomod), Some(bio));
        assert_eq!(catalog.receptacle_for(ItemKind::Scrap), Some(discard));
        assert_eq!(catalog.discard_receptacle(), Some(discard));
    }

    #[test]
    fn unroutable_kind_falls_back_to_discard_then_first() {
        let mut b = minimal_builder();
        b.register_item(ItemDef {
            kind: ItemKind::Biomod,
            label: "Biomod".to_string(),
            value: 75,
            names: vec![],
        });
        let catalog = b.build().unwrap();
        assert_eq!(catalog.receptacle_for(ItemKind::Biomod), Some(ReceptacleId(0)));

        let mut b = minimal_builder();
        let bin = b.register_receptacle("junk", "JUNK", &[], true);
        let catalog = b.build().unwrap();
        assert_eq!(catalog.receptacle_for(ItemKind::Biomod), Some(bin));
    }

    #[test]
    fn overlays_filtered_by_level() {
        let catalog = Catalog::standard();
        let level1: Vec<_> = catalog
            .overlays_for_level(1)
            .into_iter()
            .filter_map(|id| catalog.overlay(id).map(|o| o.key.as_str()))
            .collect();
        assert_eq!(level1, vec!["conveyor_lag", "rush_order"]);
        assert_eq!(catalog.overlays_for_level(3).len(), 5);
    }

    #[test]
    fn empty_builder_fails() {
        let err = CatalogBuilder::new().build().unwrap_err();
        assert_eq!(err, CatalogError::NoItemKinds);
    }

    #[test]
    fn missing_requesters_fails() {
        let mut b = CatalogBuilder::new();
        b.register_item(ItemDef {
            kind: ItemKind::Scrap,
            label: "Scrap".to_string(),
            value: 5,
            names: vec![],
        });
        b.register_receptacle("discard", "DISCARD", &[ItemKind::Scrap], true);
        assert_eq!(b.build().unwrap_err(), CatalogError::NoRequesters);
    }

    #[test]
    fn duplicate_receptacle_key_fails() {
        let mut b = minimal_builder();
        b.register_receptacle("tech", "TECH 2", &[], false);
        match b.build() {
            Err(CatalogError::DuplicateKey { section, key }) => {
                assert_eq!(section, "receptacle");
                assert_eq!(key, "tech");
            }
            other => panic!("expected DuplicateKey, got: {other:?}"),
        }
    }

    #[test]
    fn invalid_quantity_range_fails() {
        let mut b = minimal_builder();
        b.register_requester(RequesterProfile {
            key: "greedy".to_string(),
            name: "Greedy".to_string(),
            description: String::new(),
            preferred: vec![],
            quantity: QuantityRange { min: 4, max: 2 },
            property_chance: Fixed64::ZERO,
            dialogue: Dialogue::default(),
        });
        let err = b.build().unwrap_err();
        assert!(matches!(err, CatalogError::InvalidQuantity { min: 4, max: 2, .. }));
        assert!(err.to_string().contains("greedy"), "got: {err}");
    }

    #[test]
    fn lookups_for_unknown_ids_return_none() {
        let catalog = Catalog::standard();
        assert!(catalog.receptacle(ReceptacleId(99)).is_none());
        assert!(catalog.requester(RequesterId(99)).is_none());
        assert!(catalog.overlay(OverlayId(99)).is_none());
        assert!(catalog.receptacle_id("bin-nope").is_none());
    }
}
