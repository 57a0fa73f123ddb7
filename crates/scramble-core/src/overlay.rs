//! Timed global overlays: random, level-gated modifiers that start after a
//! randomized idle window and expire after their fixed duration.
//!
//! Effects are applied by setting the affected modifier and reverted by
//! restoring its neutral value, so an end always exactly undoes its start.
//! At most one overlay is active at a time.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::MillisRange;
use crate::fixed::{Fixed64, Millis};
use crate::id::OverlayId;
use crate::rng::SimRng;

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayEffect {
    /// Multiplies conveyor speed.
    ConveyorSpeed(Fixed64),
    /// Multiplies the spawn interval.
    SpawnInterval(Fixed64),
    /// Extra points added to each completed order's reward.
    OrderBonus(i64),
    /// Presentation obscures item identities. No simulation effect.
    SensorGlitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectPhase {
    Start,
    End,
}

/// Global modifiers the overlay effects write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayModifiers {
    pub conveyor_speed: Fixed64,
    pub spawn_interval: Fixed64,
    pub order_bonus: i64,
    pub sensor_glitch: bool,
}

impl Default for OverlayModifiers {
    fn default() -> Self {
        Self {
            conveyor_speed: Fixed64::ONE,
            spawn_interval: Fixed64::ONE,
            order_bonus: 0,
            sensor_glitch: false,
        }
    }
}

impl OverlayModifiers {
    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }
}

/// Apply the start or end of an effect.
pub fn apply_effect(effect: OverlayEffect, phase: EffectPhase, mods: &mut OverlayModifiers) {
    let neutral = OverlayModifiers::default();
    let starting = phase == EffectPhase::Start;
    match effect {
        OverlayEffect::ConveyorSpeed(m) => {
            mods.conveyor_speed = if starting { m } else { neutral.conveyor_speed };
        }
        OverlayEffect::SpawnInterval(m) => {
            mods.spawn_interval = if starting { m } else { neutral.spawn_interval };
        }
        OverlayEffect::OrderBonus(points) => {
            mods.order_bonus = if starting { points } else { neutral.order_bonus };
        }
        OverlayEffect::SensorGlitch => {
            mods.sensor_glitch = starting;
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveOverlay {
    pub overlay: OverlayId,
    pub effect: OverlayEffect,
    pub started_at: Millis,
    pub duration: Millis,
    pub elapsed: Millis,
}

impl ActiveOverlay {
    pub fn remaining(&self) -> Millis {
        self.duration.saturating_sub(self.elapsed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle { elapsed: Millis, threshold: Millis },
    Active(ActiveOverlay),
}

/// What happened during an [`OverlayScheduler::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayTransition {
    Started(ActiveOverlay),
    Ended(OverlayId),
}

#[derive(Debug, Clone)]
pub struct OverlayScheduler {
    phase: Phase,
    window: MillisRange,
    trigger_chance: Fixed64,
    modifiers: OverlayModifiers,
}

impl OverlayScheduler {
    pub fn new(window: MillisRange, trigger_chance: Fixed64, rng: &mut SimRng) -> Self {
        Self {
            phase: Phase::Idle {
                elapsed: 0,
                threshold: window.sample(rng),
            },
            window,
            trigger_chance,
            modifiers: OverlayModifiers::default(),
        }
    }

    /// Return to idle with a freshly drawn threshold. Any active overlay is
    /// ended first.
    pub fn reset(&mut self, rng: &mut SimRng) -> Option<OverlayId> {
        let ended = self.force_end();
        self.phase = Phase::Idle {
            elapsed: 0,
            threshold: self.window.sample(rng),
        };
        ended
    }

    pub fn modifiers(&self) -> &OverlayModifiers {
        &self.modifiers
    }

    pub fn active(&self) -> Option<&ActiveOverlay> {
        match &self.phase {
            Phase::Active(active) => Some(active),
            Phase::Idle { .. } => None,
        }
    }

    /// Time left until the next trigger check, while idle.
    pub fn time_to_check(&self) -> Option<Millis> {
        match self.phase {
            Phase::Idle { elapsed, threshold } => Some(threshold.saturating_sub(elapsed)),
            Phase::Active(_) => None,
        }
    }

    /// Advance the overlay clock by `dt`.
    pub fn advance(
        &mut self,
        dt: Millis,
        level: u32,
        catalog: &Catalog,
        rng: &mut SimRng,
        now: Millis,
    ) -> Option<OverlayTransition> {
        match &mut self.phase {
            Phase::Active(active) => {
                active.elapsed = active.elapsed.saturating_add(dt);
                if active.elapsed < active.duration {
                    return None;
                }
                let ended = self.force_end();
                self.phase = Phase::Idle {
                    elapsed: 0,
                    threshold: self.window.sample(rng),
                };
                ended.map(OverlayTransition::Ended)
            }
            Phase::Idle { elapsed, threshold } => {
                *elapsed = elapsed.saturating_add(dt);
                if *elapsed < *threshold {
                    return None;
                }
                self.try_trigger(level, catalog, rng, now)
            }
        }
    }

    fn try_trigger(
        &mut self,
        level: u32,
        catalog: &Catalog,
        rng: &mut SimRng,
        now: Millis,
    ) -> Option<OverlayTransition> {
        let idle = Phase::Idle {
            elapsed: 0,
            threshold: self.window.sample(rng),
        };
        let candidates = catalog.overlays_for_level(level);
        if candidates.is_empty() {
            debug!(level, "No overlay eligible at this level");
            self.phase = idle;
            return None;
        }
        if !rng.chance(self.trigger_chance) {
            debug!(level, "Overlay check did not trigger");
            self.phase = idle;
            return None;
        }
        let picked = rng
            .pick(&candidates)
            .copied()
            .and_then(|id| catalog.overlay(id).map(|def| (id, def)));
        let Some((id, def)) = picked else {
            self.phase = idle;
            return None;
        };

        let active = ActiveOverlay {
            overlay: id,
            effect: def.effect,
            started_at: now,
            duration: def.duration,
            elapsed: 0,
        };
        apply_effect(def.effect, EffectPhase::Start, &mut self.modifiers);
        self.phase = Phase::Active(active);
        info!(overlay = %def.key, duration = def.duration, "Overlay started");
        Some(OverlayTransition::Started(active))
    }

    /// End the active overlay now, if any. The end effect runs exactly once.
    /// The next check waits a full window.
    pub fn force_end(&mut self) -> Option<OverlayId> {
        let Phase::Active(active) = self.phase else {
            return None;
        };
        apply_effect(active.effect, EffectPhase::End, &mut self.modifiers);
        self.phase = Phase::Idle {
            elapsed: 0,
            threshold: self.window.max,
        };
        info!(overlay = active.overlay.0, "Overlay ended");
        Some(active.overlay)
    }
}
