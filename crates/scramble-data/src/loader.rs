//! Resolution pipeline: reads data files, resolves kind references, builds
//! the catalog and session config.
//!
//! A data directory holds `items`, `receptacles` and `requesters` (required)
//! plus `overlays` and `session` (optional). Each may be RON, TOML or JSON,
//! chosen by extension.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use scramble_core::catalog::{
    Catalog, CatalogBuilder, CatalogError, Dialogue, ItemDef, OverlayDef, QuantityRange,
    RequesterProfile,
};
use scramble_core::config::SessionConfig;
use scramble_core::fixed::f64_to_fixed64;
use scramble_core::item::ItemKind;
use scramble_core::overlay::OverlayEffect;

use crate::schema::{
    window, EffectData, ItemData, OverlayData, ReceptacleData, RequesterData, SessionData,
};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A value is outside its allowed range.
    #[error("invalid {field} in {file}: {detail}")]
    InvalidValue {
        file: PathBuf,
        field: &'static str,
        detail: String,
    },

    /// The assembled catalog failed structural validation.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(#[from] CatalogError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Find `{base_name}.ron`, `.toml` or `.json` in `dir`.
///
/// Returns `Ok(None)` if none exists and `ConflictingFormats` if more than
/// one does.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = &found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing.clone(),
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. TOML cannot hold a bare top-level array, so TOML
/// files keep the list under `toml_key` (`[[items]]`); RON and JSON files
/// are the list itself.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }
    let content = std::fs::read_to_string(path)?;
    let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
    let array = table
        .get(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
        .clone();
    array
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(path, e))
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Resolve an item kind name, accepting the legacy aliases.
pub fn resolve_name(name: &str, file: &Path) -> Result<ItemKind, DataLoadError> {
    ItemKind::from_key(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind: "item kind",
    })
}

fn resolve_kinds(names: &[String], file: &Path) -> Result<Vec<ItemKind>, DataLoadError> {
    names.iter().map(|n| resolve_name(n, file)).collect()
}

/// Record `name`, or fail with `DuplicateName` if it was already seen.
pub fn check_duplicate<V>(
    seen: &mut HashMap<String, V>,
    name: &str,
    value: V,
    file: &Path,
) -> Result<(), DataLoadError> {
    if seen.contains_key(name) {
        return Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        });
    }
    seen.insert(name.to_string(), value);
    Ok(())
}

fn probability(v: f64, field: &'static str, file: &Path) -> Result<f64, DataLoadError> {
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(DataLoadError::InvalidValue {
            file: file.to_path_buf(),
            field,
            detail: format!("{v} is not in [0, 1]"),
        })
    }
}

fn positive(v: f64, field: &'static str, file: &Path) -> Result<f64, DataLoadError> {
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(DataLoadError::InvalidValue {
            file: file.to_path_buf(),
            field,
            detail: format!("{v} must be positive"),
        })
    }
}

// ===========================================================================
// Sections
// ===========================================================================

fn load_items(b: &mut CatalogBuilder, path: &Path) -> Result<(), DataLoadError> {
    let items: Vec<ItemData> = deserialize_list(path, "items")?;
    let mut seen = HashMap::new();
    for data in items {
        let kind = resolve_name(&data.kind, path)?;
        check_duplicate(&mut seen, kind.key(), (), path)?;
        b.register_item(ItemDef {
            kind,
            label: data.label,
            value: data.value,
            names: data.names,
        });
    }
    debug!(count = seen.len(), file = %path.display(), "loaded items");
    Ok(())
}

fn load_receptacles(b: &mut CatalogBuilder, path: &Path) -> Result<(), DataLoadError> {
    let receptacles: Vec<ReceptacleData> = deserialize_list(path, "receptacles")?;
    let mut seen = HashMap::new();
    for data in receptacles {
        let accepts = resolve_kinds(&data.accepts, path)?;
        let id = b.register_receptacle(&data.key, &data.label, &accepts, data.discard);
        check_duplicate(&mut seen, &data.key, id, path)?;
    }
    debug!(count = seen.len(), file = %path.display(), "loaded receptacles");
    Ok(())
}

fn load_requesters(b: &mut CatalogBuilder, path: &Path) -> Result<(), DataLoadError> {
    let requesters: Vec<RequesterData> = deserialize_list(path, "requesters")?;
    let mut seen = HashMap::new();
    for data in requesters {
        let preferred = resolve_kinds(&data.preferred, path)?;
        let chance = probability(data.property_chance, "property_chance", path)?;
        let id = b.register_requester(RequesterProfile {
            key: data.key.clone(),
            name: data.name,
            description: data.description,
            preferred,
            quantity: QuantityRange {
                min: data.quantity.min,
                max: data.quantity.max,
            },
            property_chance: f64_to_fixed64(chance),
            dialogue: Dialogue {
                order_prefixes: data.order_prefixes,
                success: data.success_lines,
                failure: data.failure_lines,
            },
        });
        check_duplicate(&mut seen, &data.key, id, path)?;
    }
    debug!(count = seen.len(), file = %path.display(), "loaded requesters");
    Ok(())
}

fn effect(data: EffectData, path: &Path) -> Result<OverlayEffect, DataLoadError> {
    Ok(match data {
        EffectData::ConveyorSpeed(m) => {
            OverlayEffect::ConveyorSpeed(f64_to_fixed64(positive(m, "conveyor_speed", path)?))
        }
        EffectData::SpawnInterval(m) => {
            OverlayEffect::SpawnInterval(f64_to_fixed64(positive(m, "spawn_interval", path)?))
        }
        EffectData::OrderBonus(points) => OverlayEffect::OrderBonus(points),
        EffectData::SensorGlitch => OverlayEffect::SensorGlitch,
    })
}

fn load_overlays(b: &mut CatalogBuilder, path: &Path) -> Result<(), DataLoadError> {
    let overlays: Vec<OverlayData> = deserialize_list(path, "overlays")?;
    let mut seen = HashMap::new();
    for data in overlays {
        let effect = effect(data.effect, path)?;
        let id = b.register_overlay(OverlayDef {
            key: data.key.clone(),
            name: data.name,
            description: data.description,
            duration: data.duration_ms,
            min_level: data.min_level,
            effect,
        });
        check_duplicate(&mut seen, &data.key, id, path)?;
    }
    debug!(count = seen.len(), file = %path.display(), "loaded overlays");
    Ok(())
}

/// Convert session tuning into a [`SessionConfig`], checking ranges.
pub fn session_config(data: &SessionData, path: &Path) -> Result<SessionConfig, DataLoadError> {
    if data.tick_ms == 0 {
        return Err(DataLoadError::InvalidValue {
            file: path.to_path_buf(),
            field: "tick_ms",
            detail: "must be at least 1".to_string(),
        });
    }
    if data.session_length_ms == 0 {
        return Err(DataLoadError::InvalidValue {
            file: path.to_path_buf(),
            field: "session_length_ms",
            detail: "must be at least 1".to_string(),
        });
    }
    Ok(SessionConfig {
        tick_duration: data.tick_ms,
        session_length: data.session_length_ms,
        lane_length: f64_to_fixed64(positive(data.lane_length, "lane_length", path)?),
        conveyor_speed: f64_to_fixed64(positive(data.conveyor_speed, "conveyor_speed", path)?),
        spawn_window: window(data.spawn_window_ms),
        order_bias: f64_to_fixed64(probability(data.order_bias, "order_bias", path)?),
        volatile_lifespan: window(data.volatile_lifespan_ms),
        order_complete_delay: data.order_complete_delay_ms,
        order_fail_delay: data.order_fail_delay_ms,
        overlay_window: window(data.overlay_window_ms),
        overlay_trigger_chance: f64_to_fixed64(probability(
            data.overlay_trigger_chance,
            "overlay_trigger_chance",
            path,
        )?),
        feedback_duration: data.feedback_ms,
        scoring: (&data.scoring).into(),
        incorrect_sort_policy: data.incorrect_sort_policy.into(),
        event_history: data.event_history,
    })
}

// ===========================================================================
// Entry point
// ===========================================================================

/// Everything a session needs from a data directory.
#[derive(Debug, Clone)]
pub struct GameData {
    pub catalog: Catalog,
    pub config: SessionConfig,
}

/// Load and validate a data directory.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    let mut builder = CatalogBuilder::new();
    load_items(&mut builder, &require_data_file(dir, "items")?)?;
    load_receptacles(&mut builder, &require_data_file(dir, "receptacles")?)?;
    load_requesters(&mut builder, &require_data_file(dir, "requesters")?)?;
    if let Some(path) = find_data_file(dir, "overlays")? {
        load_overlays(&mut builder, &path)?;
    }

    let config = match find_data_file(dir, "session")? {
        Some(path) => {
            let data: SessionData = deserialize_file(&path)?;
            session_config(&data, &path)?
        }
        None => SessionConfig::default(),
    };

    let catalog = builder.build()?;
    info!(
        dir = %dir.display(),
        items = catalog.items().len(),
        receptacles = catalog.receptacle_count(),
        requesters = catalog.requester_count(),
        overlays = catalog.overlay_count(),
        "game data loaded"
    );
    Ok(GameData { catalog, config })
}

// ===========================================================================
// Tests
// ===========================================================================
