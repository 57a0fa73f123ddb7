//! The conveyor: spawns items on a randomized timer, moves them along the
//! lane, and reports the ones that fall off the end or explode.
//!
//! Spawns are biased toward the active order's kind; otherwise a kind is
//! drawn uniformly from the catalog's non-discardable pool. Within one
//! [`Conveyor::advance`] an item is reported at most once: the lane-end
//! check runs before the volatility check.

use slotmap::SlotMap;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::config::{MillisRange, SessionConfig};
use crate::fixed::{f64_to_fixed64, millis_to_secs, scale_millis, Fixed64, Millis};
use crate::id::ItemId;
use crate::item::{roll_blueprint, Item, ItemBlueprint, ItemKind};
use crate::rng::SimRng;

/// Lowest effective speed or spawn-interval multiplier.
fn min_multiplier() -> Fixed64 {
    f64_to_fixed64(0.1)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("item {0:?} is not on the conveyor")]
    ItemNotFound(ItemId),
}

/// What the active order still needs, as seen by the spawner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderDemand {
    pub kind: ItemKind,
    pub remaining: u32,
    pub property_chance: Fixed64,
}

/// Everything a transport step reads from the rest of the session.
#[derive(Debug, Clone, Copy)]
pub struct TransportEnv<'a> {
    pub catalog: &'a Catalog,
    pub demand: Option<OrderDemand>,
    pub order_bias: Fixed64,
    pub special_chance: Fixed64,
    pub volatile_lifespan: MillisRange,
    /// Difficulty, upgrade and overlay multipliers combined.
    pub spawn_interval_multiplier: Fixed64,
    pub speed_multiplier: Fixed64,
    pub now: Millis,
}

/// Result of one conveyor step.
#[derive(Debug, Default)]
pub struct TransportReport {
    pub spawned: Vec<ItemId>,
    pub missed: Vec<Item>,
    pub exploded: Vec<Item>,
}

#[derive(Debug, Clone)]
pub struct Conveyor {
    items: SlotMap<ItemId, Item>,
    lane_length: Fixed64,
    base_speed: Fixed64,
    spawn_window: MillisRange,
    spawn_elapsed: Millis,
    spawn_deadline: Millis,
    spawned_total: u64,
}

impl Conveyor {
    pub fn new(config: &SessionConfig, rng: &mut SimRng) -> Self {
        let mut conveyor = Self {
            items: SlotMap::with_key(),
            lane_length: config.lane_length,
            base_speed: config.conveyor_speed,
            spawn_window: config.spawn_window,
            spawn_elapsed: 0,
            spawn_deadline: 0,
            spawned_total: 0,
        };
        conveyor.reset(rng, Fixed64::ONE);
        conveyor
    }

    /// Remove every item and restart the spawn timer.
    pub fn reset(&mut self, rng: &mut SimRng, interval_multiplier: Fixed64) {
        self.items.clear();
        self.spawn_elapsed = 0;
        self.spawn_deadline = self.draw_deadline(rng, interval_multiplier);
    }

    fn draw_deadline(&self, rng: &mut SimRng, multiplier: Fixed64) -> Millis {
        let base = self.spawn_window.sample(rng);
        scale_millis(base, multiplier.max(min_multiplier())).max(1)
    }

    /// Advance the lane by `dt`: spawn if the timer elapsed, then move every
    /// item and collect the ones that left the lane or exploded.
    pub fn advance(&mut self, dt: Millis, env: &TransportEnv<'_>, rng: &mut SimRng) -> TransportReport {
        let mut report = TransportReport::default();

        self.spawn_elapsed = self.spawn_elapsed.saturating_add(dt);
        if self.spawn_elapsed >= self.spawn_deadline {
            self.spawn_elapsed = 0;
            self.spawn_deadline = self.draw_deadline(rng, env.spawn_interval_multiplier);
            if let Some(id) = self.spawn(env, rng) {
                report.spawned.push(id);
            }
        }

        let speed = self.base_speed * env.speed_multiplier.max(min_multiplier());
        let step = speed * millis_to_secs(dt);
        let mut missed = Vec::new();
        let mut exploded = Vec::new();
        for (id, item) in &mut self.items {
            item.position += step;
            if item.position > self.lane_length {
                missed.push(id);
            } else if item.has_expired(env.now) {
                exploded.push(id);
            }
        }
        report.missed = missed.into_iter().filter_map(|id| self.items.remove(id)).collect();
        report.exploded = exploded.into_iter().filter_map(|id| self.items.remove(id)).collect();
        report
    }

    /// Spawn one item, biased toward the active order.
    pub fn spawn(&mut self, env: &TransportEnv<'_>, rng: &mut SimRng) -> Option<ItemId> {
        if let Some(demand) = env.demand.filter(|d| d.remaining > 0) {
            let bias = (env.order_bias + env.special_chance).min(Fixed64::ONE);
            if rng.chance(bias) {
                let chance = env.special_chance.max(demand.property_chance);
                return self.spawn_with_chance(demand.kind, chance, env, rng);
            }
        }
        let Some(&kind) = rng.pick(env.catalog.spawnable_kinds()) else {
            warn!("Spawn pool is empty, skipping spawn");
            return None;
        };
        self.spawn_with_chance(kind, env.special_chance, env, rng)
    }

    /// Spawn a specific kind regardless of the pool or the active order.
    pub fn spawn_kind(
        &mut self,
        kind: ItemKind,
        env: &TransportEnv<'_>,
        rng: &mut SimRng,
    ) -> Option<ItemId> {
        self.spawn_with_chance(kind, env.special_chance, env, rng)
    }

    fn spawn_with_chance(
        &mut self,
        kind: ItemKind,
        special_chance: Fixed64,
        env: &TransportEnv<'_>,
        rng: &mut SimRng,
    ) -> Option<ItemId> {
        let Some(def) = env.catalog.item(kind) else {
            warn!(kind = %kind, "No item definition for kind, skipping spawn");
            return None;
        };
        let blueprint = roll_blueprint(def, rng, special_chance, env.now, env.volatile_lifespan);
        let special = blueprint.special();
        let id = self.place(blueprint);
        debug!(kind = %kind, ?special, at = env.now, "Item spawned");
        Some(id)
    }

    /// Put a fully specified item on the lane.
    pub fn place(&mut self, blueprint: ItemBlueprint) -> ItemId {
        self.spawned_total += 1;
        self.items.insert_with_key(|id| blueprint.into_item(id))
    }

    /// Take an item off the lane.
    pub fn remove(&mut self, id: ItemId) -> Result<Item, TransportError> {
        self.items.remove(id).ok_or(TransportError::ItemNotFound(id))
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn lane_length(&self) -> Fixed64 {
        self.lane_length
    }

    pub fn spawned_total(&self) -> u64 {
        self.spawned_total
    }

    pub fn time_to_next_spawn(&self) -> Millis {
        self.spawn_deadline.saturating_sub(self.spawn_elapsed)
    }
}
