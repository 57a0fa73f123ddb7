//! Adaptive difficulty: a level in [1, MAX_LEVEL] driven by success and
//! failure streaks, with a per-level parameter table read by the transport
//! and order components.

use tracing::{debug, info};

use crate::config::IncorrectSortPolicy;
use crate::event::Event;
use crate::fixed::{permille, Fixed64};

pub const MIN_LEVEL: u32 = 1;
pub const MAX_LEVEL: u32 = 10;
/// Consecutive successes needed to level up.
pub const SUCCESS_THRESHOLD: u32 = 3;
/// Consecutive failures needed to level down.
pub const FAILURE_THRESHOLD: u32 = 2;

// ---------------------------------------------------------------------------
// Parameter table
// ---------------------------------------------------------------------------

struct LevelRow {
    order_complexity: u32,
    min_item_value: u32,
    spawn_rate_permille: i64,
    special_chance_permille: i64,
}

const fn row(c: u32, v: u32, spawn: i64, special: i64) -> LevelRow {
    LevelRow {
        order_complexity: c,
        min_item_value: v,
        spawn_rate_permille: spawn,
        special_chance_permille: special,
    }
}

const TABLE: [LevelRow; MAX_LEVEL as usize] = [
    row(1, 10, 1000, 50),
    row(1, 20, 950, 100),
    row(2, 25, 900, 150),
    row(2, 30, 870, 175),
    row(2, 35, 840, 200),
    row(2, 38, 810, 225),
    row(3, 40, 780, 250),
    row(3, 44, 750, 280),
    row(3, 47, 725, 315),
    row(3, 50, 700, 350),
];

/// Tuning values for one difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyParams {
    pub order_complexity: u32,
    pub min_item_value: u32,
    /// Multiplier on the spawn interval; below 1 spawns faster.
    pub spawn_rate_modifier: Fixed64,
    pub special_item_chance: Fixed64,
}

impl DifficultyParams {
    /// Parameters for `level`. Levels outside the table use level 1.
    pub fn for_level(level: u32) -> Self {
        let row = level
            .checked_sub(1)
            .and_then(|i| TABLE.get(i as usize))
            .unwrap_or(&TABLE[0]);
        Self {
            order_complexity: row.order_complexity,
            min_item_value: row.min_item_value,
            spawn_rate_modifier: permille(row.spawn_rate_permille),
            special_item_chance: permille(row.special_chance_permille),
        }
    }
}

/// Order-facing projection of the current parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderParameters {
    pub max_items_in_order: u32,
    pub min_rarity: u32,
}

/// Transport-facing projection of the current parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportParameters {
    pub spawn_interval_modifier: Fixed64,
    pub special_item_chance: Fixed64,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyState {
    pub level: u32,
    pub success_streak: u32,
    pub failure_streak: u32,
}

impl Default for DifficultyState {
    fn default() -> Self {
        Self {
            level: MIN_LEVEL,
            success_streak: 0,
            failure_streak: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub from: u32,
    pub to: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DifficultyController {
    state: DifficultyState,
    policy: IncorrectSortPolicy,
    incorrect_sorts: u32,
    missed_items: u32,
}

impl DifficultyController {
    pub fn new(policy: IncorrectSortPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Back to level 1 with empty streaks and counters.
    pub fn reset(&mut self) {
        self.state = DifficultyState::default();
        self.incorrect_sorts = 0;
        self.missed_items = 0;
    }

    pub fn level(&self) -> u32 {
        self.state.level
    }

    pub fn state(&self) -> DifficultyState {
        self.state
    }

    pub fn incorrect_sorts(&self) -> u32 {
        self.incorrect_sorts
    }

    pub fn missed_items(&self) -> u32 {
        self.missed_items
    }

    /// Record a successful order.
    pub fn notify_success(&mut self) -> Option<LevelChange> {
        self.state.success_streak += 1;
        self.state.failure_streak = 0;
        if self.state.success_streak < SUCCESS_THRESHOLD {
            return None;
        }
        self.state.success_streak = 0;
        self.shift_level(1)
    }

    /// Record a failed order.
    pub fn notify_failure(&mut self) -> Option<LevelChange> {
        self.state.failure_streak += 1;
        self.state.success_streak = 0;
        if self.state.failure_streak < FAILURE_THRESHOLD {
            return None;
        }
        self.state.failure_streak = 0;
        self.shift_level(-1)
    }

    pub fn notify_incorrect_sort(&mut self) -> Option<LevelChange> {
        self.incorrect_sorts += 1;
        debug!(total = self.incorrect_sorts, "Incorrect sort observed");
        match self.policy {
            IncorrectSortPolicy::Ignore => None,
            IncorrectSortPolicy::CountAsFailure => self.notify_failure(),
        }
    }

    pub fn notify_item_missed(&mut self) -> Option<LevelChange> {
        self.missed_items += 1;
        debug!(total = self.missed_items, "Missed item observed");
        match self.policy {
            IncorrectSortPolicy::Ignore => None,
            IncorrectSortPolicy::CountAsFailure => self.notify_failure(),
        }
    }

    fn shift_level(&mut self, step: i32) -> Option<LevelChange> {
        let from = self.state.level;
        let to = from
            .saturating_add_signed(step)
            .clamp(MIN_LEVEL, MAX_LEVEL);
        if to == from {
            debug!(level = from, "Difficulty already at bound");
            return None;
        }
        self.state.level = to;
        info!(from, to, "Difficulty level changed");
        Some(LevelChange { from, to })
    }

    /// React to a domain event. Order outcomes move the streaks; incorrect
    /// sorts, misses and explosions go through the configured policy.
    pub fn observe(&mut self, event: &Event) -> Option<LevelChange> {
        match event {
            Event::OrderCompleted { .. } => self.notify_success(),
            Event::OrderFailed { .. } => self.notify_failure(),
            Event::ItemSorted { verdict, .. } if !verdict.is_accepted() => {
                self.notify_incorrect_sort()
            }
            Event::ItemMissed { .. } | Event::ItemExploded { .. } => self.notify_item_missed(),
            _ => None,
        }
    }

    pub fn current_parameters(&self) -> DifficultyParams {
        DifficultyParams::for_level(self.state.level)
    }

    pub fn order_parameters(&self) -> OrderParameters {
        let params = self.current_parameters();
        OrderParameters {
            max_items_in_order: params.order_complexity * 2,
            min_rarity: self.state.level,
        }
    }

    pub fn transport_parameters(&self) -> TransportParameters {
        let params = self.current_parameters();
        TransportParameters {
            spawn_interval_modifier: params.spawn_rate_modifier,
            special_item_chance: params.special_item_chance,
        }
    }
}
