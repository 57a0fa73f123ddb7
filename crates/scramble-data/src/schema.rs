//! Serde data file structs for catalog content and session tuning.
//!
//! These structs define the on-disk format. Item kinds are referenced by
//! name and resolved by the loader; numeric tuning is written as `f64` and
//! converted to fixed-point on load.

use serde::Deserialize;

use scramble_core::config::{IncorrectSortPolicy, MillisRange, ScoringConfig, SessionConfig};
use scramble_core::fixed::fixed64_to_f64;

// ===========================================================================
// Items and receptacles
// ===========================================================================

/// An item kind definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    /// Kind name, e.g. `"datachip"` or `"hardware_common"`.
    pub kind: String,
    pub label: String,
    pub value: u32,
    #[serde(default)]
    pub names: Vec<String>,
}

/// A receptacle definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceptacleData {
    pub key: String,
    pub label: String,
    pub accepts: Vec<String>,
    #[serde(default)]
    pub discard: bool,
}

// ===========================================================================
// Requesters
// ===========================================================================

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QuantityData {
    pub min: u32,
    pub max: u32,
}

/// A requester profile in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct RequesterData {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub preferred: Vec<String>,
    pub quantity: QuantityData,
    #[serde(default)]
    pub property_chance: f64,
    #[serde(default)]
    pub order_prefixes: Vec<String>,
    #[serde(default)]
    pub success_lines: Vec<String>,
    #[serde(default)]
    pub failure_lines: Vec<String>,
}

// ===========================================================================
// Overlays
// ===========================================================================

/// An overlay effect in a data file.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectData {
    ConveyorSpeed(f64),
    SpawnInterval(f64),
    OrderBonus(i64),
    SensorGlitch,
}

/// An overlay definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct OverlayData {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub duration_ms: u64,
    #[serde(default = "default_min_level")]
    pub min_level: u32,
    pub effect: EffectData,
}

fn default_min_level() -> u32 {
    1
}

// ===========================================================================
// Session tuning
// ===========================================================================

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyData {
    #[default]
    Ignore,
    CountAsFailure,
}

/// Scoring constants. Omitted fields keep the stock values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringData {
    pub correct_sort: i64,
    pub order_item_bonus: i64,
    pub incorrect_sort: i64,
    pub wrong_bin_for_order: i64,
    pub off_order_sort: i64,
    pub fragile_extra: i64,
    pub recycle_award: i64,
    pub missed_item: i64,
    pub exploded_item: i64,
}

impl Default for ScoringData {
    fn default() -> Self {
        let s = ScoringConfig::default();
        Self {
            correct_sort: s.correct_sort,
            order_item_bonus: s.order_item_bonus,
            incorrect_sort: s.incorrect_sort,
            wrong_bin_for_order: s.wrong_bin_for_order,
            off_order_sort: s.off_order_sort,
            fragile_extra: s.fragile_extra,
            recycle_award: s.recycle_award,
            missed_item: s.missed_item,
            exploded_item: s.exploded_item,
        }
    }
}

impl From<&ScoringData> for ScoringConfig {
    fn from(d: &ScoringData) -> Self {
        ScoringConfig {
            correct_sort: d.correct_sort,
            order_item_bonus: d.order_item_bonus,
            incorrect_sort: d.incorrect_sort,
            wrong_bin_for_order: d.wrong_bin_for_order,
            off_order_sort: d.off_order_sort,
            fragile_extra: d.fragile_extra,
            recycle_award: d.recycle_award,
            missed_item: d.missed_item,
            exploded_item: d.exploded_item,
        }
    }
}

/// Session tuning. Every field is optional; omitted fields keep the stock
/// values. Windows are `[min, max]` pairs in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionData {
    pub tick_ms: u64,
    pub session_length_ms: u64,
    pub lane_length: f64,
    pub conveyor_speed: f64,
    pub spawn_window_ms: (u64, u64),
    pub order_bias: f64,
    pub volatile_lifespan_ms: (u64, u64),
    pub order_complete_delay_ms: u64,
    pub order_fail_delay_ms: u64,
    pub overlay_window_ms: (u64, u64),
    pub overlay_trigger_chance: f64,
    pub feedback_ms: u64,
    pub event_history: usize,
    pub incorrect_sort_policy: PolicyData,
    pub scoring: ScoringData,
}

impl Default for SessionData {
    fn default() -> Self {
        let c = SessionConfig::default();
        Self {
            tick_ms: c.tick_duration,
            session_length_ms: c.session_length,
            lane_length: fixed64_to_f64(c.lane_length),
            conveyor_speed: fixed64_to_f64(c.conveyor_speed),
            spawn_window_ms: (c.spawn_window.min, c.spawn_window.max),
            order_bias: fixed64_to_f64(c.order_bias),
            volatile_lifespan_ms: (c.volatile_lifespan.min, c.volatile_lifespan.max),
            order_complete_delay_ms: c.order_complete_delay,
            order_fail_delay_ms: c.order_fail_delay,
            overlay_window_ms: (c.overlay_window.min, c.overlay_window.max),
            overlay_trigger_chance: fixed64_to_f64(c.overlay_trigger_chance),
            feedback_ms: c.feedback_duration,
            event_history: c.event_history,
            incorrect_sort_policy: PolicyData::Ignore,
            scoring: ScoringData::default(),
        }
    }
}

impl From<PolicyData> for IncorrectSortPolicy {
    fn from(p: PolicyData) -> Self {
        match p {
            PolicyData::Ignore => IncorrectSortPolicy::Ignore,
            PolicyData::CountAsFailure => IncorrectSortPolicy::CountAsFailure,
        }
    }
}

pub(crate) fn window((min, max): (u64, u64)) -> MillisRange {
    MillisRange::new(min, max)
}

// ===========================================================================
// TOML wrappers
// ===========================================================================

/// TOML files hold lists under a top-level key, e.g. `[[items]]`.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlItems {
    pub items: Vec<ItemData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlRequesters {
    pub requesters: Vec<RequesterData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_defaults_match_core() {
        let data = SessionData::default();
        let core = SessionConfig::default();
        assert_eq!(data.tick_ms, core.tick_duration);
        assert_eq!(data.spawn_window_ms, (2000, 4000));
        assert!((data.order_bias - 0.6).abs() < 1e-6);
        assert_eq!(ScoringConfig::from(&data.scoring), core.scoring);
    }

    #[test]
    fn partial_session_keeps_defaults() {
        let data: SessionData = toml::from_str(
            r#"
session_length_ms = 60000
incorrect_sort_policy = "count_as_failure"

[scoring]
correct_sort = 30
"#,
        )
        .unwrap();
        assert_eq!(data.session_length_ms, 60_000);
        assert_eq!(data.tick_ms, 33);
        assert!(matches!(data.incorrect_sort_policy, PolicyData::CountAsFailure));
        assert_eq!(data.scoring.correct_sort, 30);
        assert_eq!(data.scoring.order_item_bonus, 50);
    }

    #[test]
    fn effect_forms() {
        let ron_effect: EffectData = ron::from_str("conveyor_speed(1.5)").unwrap();
        assert!(matches!(ron_effect, EffectData::ConveyorSpeed(v) if (v - 1.5).abs() < 1e-9));
        let json_effect: EffectData = serde_json::from_str(r#"{"order_bonus": 50}"#).unwrap();
        assert!(matches!(json_effect, EffectData::OrderBonus(50)));
        let unit: EffectData = serde_json::from_str(r#""sensor_glitch""#).unwrap();
        assert!(matches!(unit, EffectData::SensorGlitch));
    }

    #[test]
    fn overlay_min_level_defaults_to_one() {
        let o: OverlayData = ron::from_str(
            r#"(key: "lag", name: "Lag", duration_ms: 1000, effect: conveyor_speed(0.5))"#,
        )
        .unwrap();
        assert_eq!(o.min_level, 1);
        assert!(o.description.is_empty());
    }
}
