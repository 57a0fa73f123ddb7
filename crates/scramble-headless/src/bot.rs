//! A scripted player. Watches the lane, waits out its reaction time, then
//! drops the item nearest the end of the lane.

use std::collections::{HashMap, HashSet};

use scramble_core::fixed::{f64_to_fixed64, Fixed64, Millis};
use scramble_core::id::{ItemId, ReceptacleId};
use scramble_core::item::Item;
use scramble_core::overlay::OverlayEffect;
use scramble_core::rng::SimRng;
use scramble_core::session::Session;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
pub struct BotConfig {
    /// Probability of choosing the right receptacle.
    pub accuracy: Fixed64,
    /// Time an item must be visible before the bot acts on it.
    pub reaction: Millis,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            accuracy: f64_to_fixed64(0.85),
            reaction: 600,
        }
    }
}

#[derive(Debug)]
pub struct SortBot {
    config: BotConfig,
    rng: SimRng,
    seen: HashMap<ItemId, Millis>,
    submitted: HashSet<ItemId>,
    drops: u32,
}

impl SortBot {
    pub fn new(config: BotConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SimRng::new(seed),
            seen: HashMap::new(),
            submitted: HashSet::new(),
            drops: 0,
        }
    }

    pub fn drops(&self) -> u32 {
        self.drops
    }

    /// Look at the session and queue at most one drop.
    pub fn act(&mut self, session: &mut Session) -> Option<(ItemId, ReceptacleId)> {
        let now = session.now();
        let on_lane: HashSet<ItemId> = session.conveyor().items().map(|i| i.id).collect();
        self.seen.retain(|id, _| on_lane.contains(id));
        self.submitted.retain(|id| on_lane.contains(id));
        for id in &on_lane {
            self.seen.entry(*id).or_insert(now);
        }

        let item = session
            .conveyor()
            .items()
            .filter(|i| !self.submitted.contains(&i.id))
            .filter(|i| {
                self.seen
                    .get(&i.id)
                    .is_some_and(|t| now.saturating_sub(*t) >= self.config.reaction)
            })
            .max_by_key(|i| i.position)?
            .clone();

        let receptacle = self.choose(session, &item)?;
        session.submit_sort(item.id, receptacle).ok()?;
        self.submitted.insert(item.id);
        self.drops += 1;
        trace!(item = ?item.id, kind = %item.kind, ?receptacle, "bot drop");
        Some((item.id, receptacle))
    }

    fn choose(&mut self, session: &Session, item: &Item) -> Option<ReceptacleId> {
        let catalog = session.catalog();
        let correct = match session.active_order() {
            Some(order) if order.kind == item.kind => Some(order.target),
            _ => catalog.receptacle_for(item.kind),
        }?;

        // Scrambled sensors make the bot guess twice as often.
        let glitched = session
            .active_overlay()
            .is_some_and(|a| a.effect == OverlayEffect::SensorGlitch);
        let accuracy = if glitched {
            self.config.accuracy / Fixed64::from_num(2)
        } else {
            self.config.accuracy
        };
        if self.rng.chance(accuracy) {
            return Some(correct);
        }

        let others: Vec<ReceptacleId> = catalog
            .receptacles()
            .map(|(id, _)| id)
            .filter(|id| *id != correct)
            .collect();
        Some(self.rng.pick(&others).copied().unwrap_or(correct))
    }
}
