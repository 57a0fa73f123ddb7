//! Session tuning knobs. Defaults reproduce the stock game.

use crate::fixed::{f64_to_fixed64, Fixed64, Millis};
use crate::rng::SimRng;

/// Inclusive window of durations, sampled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MillisRange {
    pub min: Millis,
    pub max: Millis,
}

impl MillisRange {
    pub fn new(min: Millis, max: Millis) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    pub fn sample(&self, rng: &mut SimRng) -> Millis {
        rng.range_millis(self.min, self.max)
    }
}

/// How incorrect sorts and missed items feed the difficulty controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IncorrectSortPolicy {
    /// Counted in diagnostics only. Streaks move on order outcomes alone.
    #[default]
    Ignore,
    /// Treated like a failed order.
    CountAsFailure,
}

/// Point values for every scoring rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub correct_sort: i64,
    pub order_item_bonus: i64,
    pub incorrect_sort: i64,
    pub wrong_bin_for_order: i64,
    pub off_order_sort: i64,
    /// Scaled by the upgrade fragile modifier and rounded.
    pub fragile_extra: i64,
    /// Replaces `correct_sort` when junk lands in a discard receptacle.
    pub recycle_award: i64,
    pub missed_item: i64,
    pub exploded_item: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            correct_sort: 25,
            order_item_bonus: 50,
            incorrect_sort: -15,
            wrong_bin_for_order: -5,
            off_order_sort: -5,
            fragile_extra: 25,
            recycle_award: 10,
            missed_item: -10,
            exploded_item: -30,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Minimum accumulated frame time before a step runs.
    pub tick_duration: Millis,
    pub session_length: Millis,
    /// Items past this position are missed.
    pub lane_length: Fixed64,
    /// Units per second at neutral modifiers.
    pub conveyor_speed: Fixed64,
    pub spawn_window: MillisRange,
    /// Base probability that a spawn is biased toward the active order.
    pub order_bias: Fixed64,
    pub volatile_lifespan: MillisRange,
    pub order_complete_delay: Millis,
    pub order_fail_delay: Millis,
    pub overlay_window: MillisRange,
    pub overlay_trigger_chance: Fixed64,
    pub feedback_duration: Millis,
    pub scoring: ScoringConfig,
    pub incorrect_sort_policy: IncorrectSortPolicy,
    pub event_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_duration: 33,
            session_length: 120_000,
            lane_length: Fixed64::from_num(800),
            conveyor_speed: Fixed64::from_num(50),
            spawn_window: MillisRange::new(2000, 4000),
            order_bias: f64_to_fixed64(0.6),
            volatile_lifespan: MillisRange::new(6000, 10_000),
            order_complete_delay: 1500,
            order_fail_delay: 2000,
            overlay_window: MillisRange::new(20_000, 45_000),
            overlay_trigger_chance: f64_to_fixed64(0.35),
            feedback_duration: 3000,
            scoring: ScoringConfig::default(),
            incorrect_sort_policy: IncorrectSortPolicy::Ignore,
            event_history: 256,
        }
    }
}
