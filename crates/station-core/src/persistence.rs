//! Save/Load functionality for persisting station state
//!
//! A [`SaveSnapshot`] is a plain serde record keyed by content names, so a
//! save survives content changes: unknown names are dropped on restore and
//! new entities start fresh. Snapshots are encoded with bincode for the
//! regular save and with serde_json for human-readable exports.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use station_logic::config::{ConfigError, StationConfig};
use station_logic::content::Content;
use station_logic::game_state::GameState;
use station_logic::population::MIN_POPULATION;
use station_logic::progression::{LayeredProgress, Progress};
use station_logic::requirements::RequirementBook;

use crate::attributes::compute_attributes;
use crate::engine::StationEngine;
use crate::state::{BossState, StationState};

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of every mutable field of the station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSnapshot {
    /// Save format version
    pub version: u32,
    pub game_state: GameState,
    pub tick_count: u64,
    pub cycles: f64,
    pub total_cycles: f64,
    pub population: f64,
    pub stored_energy: f64,
    pub rebirth_one_count: u32,
    pub rebirth_two_count: u32,
    pub boss: BossState,
    /// Operation progress by operation name
    pub operations: BTreeMap<String, Progress>,
    pub grid_strength: Progress,
    /// Battle progress by battle name
    pub battles: BTreeMap<String, LayeredProgress>,
    pub active_battles: Vec<String>,
    pub enabled_modules: Vec<String>,
    /// Selected operation by component name
    pub selected_operations: BTreeMap<String, String>,
    pub point_of_interest: String,
    /// Requirement latches by key
    pub requirements: BTreeMap<String, bool>,
}

/// What a restore had to leave out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Saved names the current content no longer knows.
    pub dropped: Vec<String>,
}

impl RestoreReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }

    fn drop_name(&mut self, kind: &str, name: &str) {
        log::info!("Dropping saved {} '{}': not in content", kind, name);
        self.dropped.push(name.to_string());
    }
}

/// Errors that can occur during save/load
#[derive(Debug)]
pub enum SaveError {
    Io(std::io::Error),
    Bincode(Box<bincode::ErrorKind>),
    Json(serde_json::Error),
    VersionMismatch { expected: u32, found: u32 },
    /// Decoded fine but holds values no game could produce.
    Corrupt(String),
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for SaveError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SaveError::Bincode(e)
    }
}

impl From<serde_json::Error> for SaveError {
    fn from(e: serde_json::Error) -> Self {
        SaveError::Json(e)
    }
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::Io(e) => write!(f, "IO error: {}", e),
            SaveError::Bincode(e) => write!(f, "Serialization error: {}", e),
            SaveError::Json(e) => write!(f, "JSON error: {}", e),
            SaveError::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Save version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            SaveError::Corrupt(what) => write!(f, "Corrupt save: {}", what),
        }
    }
}

impl std::error::Error for SaveError {}

fn check_version(snapshot: SaveSnapshot) -> Result<SaveSnapshot, SaveError> {
    if snapshot.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: snapshot.version,
        });
    }
    Ok(snapshot)
}

pub fn encode_binary(snapshot: &SaveSnapshot) -> Result<Vec<u8>, SaveError> {
    Ok(bincode::serialize(snapshot)?)
}

pub fn decode_binary(bytes: &[u8]) -> Result<SaveSnapshot, SaveError> {
    check_version(bincode::deserialize(bytes)?)
}

pub fn encode_json(snapshot: &SaveSnapshot) -> Result<String, SaveError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

pub fn decode_json(text: &str) -> Result<SaveSnapshot, SaveError> {
    check_version(serde_json::from_str(text)?)
}

fn amount(what: &str, value: f64) -> Result<f64, SaveError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SaveError::Corrupt(format!("{what} is {value}")))
    }
}

fn check_progress(name: &str, xp: f64) -> Result<(), SaveError> {
    amount(&format!("xp of {name}"), xp).map(|_| ())
}

fn check_boss(content: &Content, config: &StationConfig, boss: BossState) -> Result<BossState, SaveError> {
    let battles = content.regular_battles().count();
    if boss.battles_won as usize > battles {
        return Err(SaveError::Corrupt(format!(
            "boss pulled closer by {} battles, only {} exist",
            boss.battles_won, battles
        )));
    }
    if boss.covered_distance > config.boss_starting_distance {
        return Err(SaveError::Corrupt(format!(
            "boss covered {} of {} steps",
            boss.covered_distance, config.boss_starting_distance
        )));
    }
    Ok(boss)
}

impl StationEngine {
    /// Capture every mutable field.
    pub fn serialize(&self) -> SaveSnapshot {
        let content = &self.content;
        let state = &self.state;
        SaveSnapshot {
            version: SAVE_VERSION,
            game_state: state.game_state,
            tick_count: self.tick_count,
            cycles: state.cycles,
            total_cycles: state.total_cycles,
            population: state.population,
            stored_energy: state.stored_energy,
            rebirth_one_count: state.rebirth_one_count,
            rebirth_two_count: state.rebirth_two_count,
            boss: state.boss,
            operations: content
                .operations
                .iter()
                .zip(&state.operations)
                .map(|(op, progress)| (op.name.clone(), *progress))
                .collect(),
            grid_strength: state.grid_strength,
            battles: content
                .battles
                .iter()
                .zip(&state.battles)
                .map(|(battle, progress)| (battle.name.clone(), *progress))
                .collect(),
            active_battles: state
                .active_battles
                .iter()
                .map(|id| content.battle(*id).name.clone())
                .collect(),
            enabled_modules: state
                .activation
                .enabled_modules()
                .map(|id| content.module(id).name.clone())
                .collect(),
            selected_operations: state
                .activation
                .selections()
                .map(|(component, op)| {
                    (
                        content.component(component).name.clone(),
                        content.operation(op).name.clone(),
                    )
                })
                .collect(),
            point_of_interest: content
                .point_of_interest(state.point_of_interest)
                .name
                .clone(),
            requirements: self
                .requirements
                .latches()
                .map(|(key, done)| (key.to_string(), done))
                .collect(),
        }
    }

    /// Replace the current state with a snapshot.
    ///
    /// Everything is validated and rebuilt on the side first; on error the
    /// engine is left untouched.
    pub fn restore(&mut self, snapshot: SaveSnapshot) -> Result<RestoreReport, SaveError> {
        let snapshot = check_version(snapshot)?;
        let content = Arc::clone(&self.content);
        let mut report = RestoreReport::default();
        let mut state = StationState::new(&content, &self.config);

        state.game_state = snapshot.game_state;
        state.cycles = amount("cycles", snapshot.cycles)?;
        state.total_cycles = amount("total cycles", snapshot.total_cycles)?;
        state.population = amount("population", snapshot.population)?.max(MIN_POPULATION);
        state.stored_energy = amount("stored energy", snapshot.stored_energy)?;
        state.rebirth_one_count = snapshot.rebirth_one_count;
        state.rebirth_two_count = snapshot.rebirth_two_count;
        state.boss = check_boss(&content, &self.config, snapshot.boss)?;

        check_progress(&content.grid_strength.name, snapshot.grid_strength.xp)?;
        state.grid_strength = snapshot.grid_strength;

        for (name, progress) in &snapshot.operations {
            check_progress(name, progress.xp)?;
            match content.operation_id(name) {
                Some(id) => state.operations[id.0] = *progress,
                None => report.drop_name("operation", name),
            }
        }
        for (name, progress) in &snapshot.battles {
            check_progress(name, progress.xp)?;
            match content.battle_id(name) {
                Some(id) => state.battles[id.0] = *progress,
                None => report.drop_name("battle", name),
            }
        }
        for name in &snapshot.active_battles {
            match content.battle_id(name) {
                Some(id) if !state.is_battle_done(&content, id) => {
                    state.active_battles.insert(id);
                }
                Some(_) => {}
                None => report.drop_name("battle", name),
            }
        }

        let mut enabled = Vec::new();
        for name in &snapshot.enabled_modules {
            match content.module_id(name) {
                Some(id) => enabled.push(id),
                None => report.drop_name("module", name),
            }
        }
        let mut selections = Vec::new();
        for (component_name, op_name) in &snapshot.selected_operations {
            let component = content.component_id(component_name);
            let op = content.operation_id(op_name);
            match (component, op) {
                (Some(c), Some(o)) if content.operation(o).component == c => selections.push((c, o)),
                (None, _) => report.drop_name("component", component_name),
                _ => report.drop_name("operation", op_name),
            }
        }
        state.activation.restore(enabled, selections);

        match content.point_of_interest_id(&snapshot.point_of_interest) {
            Some(id) => state.point_of_interest = id,
            None => report.drop_name("point of interest", &snapshot.point_of_interest),
        }

        let mut requirements = RequirementBook::new(content.requirements.clone());
        for (key, done) in &snapshot.requirements {
            if !requirements.restore_latch(key, *done) {
                report.drop_name("requirement", key);
            }
        }

        self.attributes = compute_attributes(&content, &state);
        self.state = state;
        self.requirements = requirements;
        self.tick_count = snapshot.tick_count;
        self.events.clear();
        log::info!(
            "Restored station at {:.1} cycles ({} names dropped)",
            self.state.cycles,
            report.dropped.len()
        );
        Ok(report)
    }

    /// Save the complete station to a writer
    pub fn save<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        bincode::serialize_into(writer, &self.serialize())?;
        Ok(())
    }

    /// Load a station from a reader
    pub fn load<R: Read>(&mut self, reader: R) -> Result<RestoreReport, SaveError> {
        let snapshot: SaveSnapshot = bincode::deserialize_from(reader)?;
        self.restore(snapshot)
    }
}

/// Build an engine from saved bytes, starting fresh if they cannot be used.
pub fn load_or_fresh(
    content: Arc<Content>,
    config: StationConfig,
    bytes: &[u8],
) -> Result<StationEngine, ConfigError> {
    let mut engine = StationEngine::new(content, config)?;
    let restored = decode_binary(bytes).and_then(|snapshot| engine.restore(snapshot));
    if let Err(e) = restored {
        log::warn!("Discarding unusable save, starting fresh: {}", e);
    }
    Ok(engine)
}

/// Destination for periodic saves.
pub trait SaveSink {
    fn persist(&mut self, snapshot: &SaveSnapshot) -> Result<(), SaveError>;
}

/// Keeps the encoded saves in memory.
#[derive(Debug, Default)]
pub struct MemorySaveSink {
    pub saves: Vec<Vec<u8>>,
}

impl MemorySaveSink {
    pub fn latest(&self) -> Option<&[u8]> {
        self.saves.last().map(Vec::as_slice)
    }
}

impl SaveSink for MemorySaveSink {
    fn persist(&mut self, snapshot: &SaveSnapshot) -> Result<(), SaveError> {
        self.saves.push(encode_binary(snapshot)?);
        Ok(())
    }
}

/// Writes bincode saves to a file, replacing it through a temporary file.
#[derive(Debug, Clone)]
pub struct FileSaveSink {
    path: PathBuf,
}

impl FileSaveSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn read(&self) -> Result<SaveSnapshot, SaveError> {
        decode_binary(&fs::read(&self.path)?)
    }
}

impl SaveSink for FileSaveSink {
    fn persist(&mut self, snapshot: &SaveSnapshot) -> Result<(), SaveError> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(fs::File::create(&tmp)?);
            bincode::serialize_into(&mut writer, snapshot)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &str = include_str!("../../../data/station_content.json");

    fn content() -> Arc<Content> {
        Arc::new(Content::from_json(CONTENT).unwrap())
    }

    fn played_engine() -> StationEngine {
        let mut engine = StationEngine::new(content(), StationConfig::default()).unwrap();
        engine.finish_intro().unwrap();
        engine.state.grid_strength.level = 2;
        engine.update();
        engine.toggle_module("Furnace").unwrap();
        engine.toggle_battle("Astrogoblins10").unwrap();
        for _ in 0..300 {
            engine.update();
        }
        engine
    }

    #[test]
    fn test_save_load_roundtrip() {
        let engine = played_engine();

        let mut save_buffer = Vec::new();
        engine.save(&mut save_buffer).expect("Save failed");

        let mut loaded = StationEngine::new(content(), StationConfig::default()).unwrap();
        let report = loaded.load(&save_buffer[..]).expect("Load failed");

        assert!(report.is_clean());
        assert_eq!(loaded.state(), engine.state());
        assert_eq!(loaded.tick_count(), engine.tick_count());
        assert_eq!(loaded.attributes(), engine.attributes());
        assert!(loaded.is_unlocked("Fundamentals"));
    }

    #[test]
    fn test_json_roundtrip() {
        let engine = played_engine();
        let text = encode_json(&engine.serialize()).unwrap();
        assert!(text.contains("\"StandbyGenerator\""));

        let mut loaded = StationEngine::new(content(), StationConfig::default()).unwrap();
        loaded.restore(decode_json(&text).unwrap()).unwrap();
        let (a, b) = (loaded.state(), engine.state());
        assert_eq!(a.activation, b.activation);
        assert_eq!(a.active_battles, b.active_battles);
        assert_eq!(a.grid_strength.level, b.grid_strength.level);
        assert!((a.cycles - b.cycles).abs() < 1e-9);
        for (x, y) in a.operations.iter().zip(&b.operations) {
            assert_eq!(x.level, y.level);
        }
    }

    #[test]
    fn test_unknown_names_dropped() {
        let engine = played_engine();
        let mut snapshot = engine.serialize();
        snapshot
            .operations
            .insert("RetiredOperation".into(), Progress::default());
        snapshot.requirements.insert("OldUnlock".into(), true);
        snapshot.point_of_interest = "Atlantis".into();

        let mut loaded = StationEngine::new(content(), StationConfig::default()).unwrap();
        let report = loaded.restore(snapshot).unwrap();
        assert_eq!(report.dropped.len(), 3);
        assert!(report.dropped.contains(&"RetiredOperation".to_string()));
        // Falls back to the default point of interest.
        assert_eq!(
            loaded.state().point_of_interest,
            loaded.content().default_point_of_interest
        );
    }

    #[test]
    fn test_missing_entities_start_fresh() {
        let engine = played_engine();
        let mut snapshot = engine.serialize();
        snapshot.operations.remove("Garbage");

        let mut loaded = StationEngine::new(content(), StationConfig::default()).unwrap();
        loaded.restore(snapshot).unwrap();
        assert_eq!(loaded.operation_level("Garbage"), Some(0));
    }

    #[test]
    fn test_corrupt_values_rejected() {
        let engine = played_engine();
        let mut snapshot = engine.serialize();
        snapshot.population = f64::NAN;

        let mut other = StationEngine::new(content(), StationConfig::default()).unwrap();
        let before = other.state().clone();
        assert!(matches!(
            other.restore(snapshot),
            Err(SaveError::Corrupt(_))
        ));
        assert_eq!(other.state(), &before);
    }

    #[test]
    fn test_impossible_boss_counters_rejected() {
        let engine = played_engine();
        let mut other = StationEngine::new(content(), StationConfig::default()).unwrap();
        let before = other.state().clone();

        let mut snapshot = engine.serialize();
        snapshot.boss = BossState {
            available: true,
            covered_distance: 0,
            battles_won: u32::MAX,
        };
        assert!(matches!(other.restore(snapshot), Err(SaveError::Corrupt(_))));

        let mut snapshot = engine.serialize();
        snapshot.boss.covered_distance = other.config().boss_starting_distance + 1;
        assert!(matches!(other.restore(snapshot), Err(SaveError::Corrupt(_))));
        assert_eq!(other.state(), &before);

        let bytes = encode_binary(&SaveSnapshot {
            boss: BossState {
                available: true,
                covered_distance: 0,
                battles_won: u32::MAX,
            },
            ..engine.serialize()
        })
        .unwrap();
        let fresh = load_or_fresh(content(), StationConfig::default(), &bytes).unwrap();
        assert_eq!(fresh.game_state(), GameState::New);
    }

    #[test]
    fn test_huge_cycles_keep_ticking() {
        let engine = played_engine();
        let mut snapshot = engine.serialize();
        snapshot.game_state = GameState::Playing;
        snapshot.cycles = 1e300;
        snapshot.boss = BossState {
            available: true,
            covered_distance: 0,
            battles_won: 0,
        };

        let mut loaded = StationEngine::new(content(), StationConfig::default()).unwrap();
        loaded.restore(snapshot).unwrap();
        loaded.update();
        assert_eq!(loaded.boss_distance(), 0);
        assert_eq!(
            loaded.state().boss.covered_distance,
            loaded.config().boss_starting_distance
        );
        assert_eq!(loaded.game_state(), GameState::BossFightIntro);
    }

    #[test]
    fn test_version_mismatch() {
        let engine = played_engine();
        let mut snapshot = engine.serialize();
        snapshot.version = SAVE_VERSION + 1;
        let bytes = encode_binary(&snapshot).unwrap();
        assert!(matches!(
            decode_binary(&bytes),
            Err(SaveError::VersionMismatch { found, .. }) if found == SAVE_VERSION + 1
        ));
    }

    #[test]
    fn test_load_or_fresh_recovers_from_garbage() {
        let engine = load_or_fresh(content(), StationConfig::default(), b"not a save").unwrap();
        assert_eq!(engine.game_state(), GameState::New);
        assert_eq!(engine.tick_count(), 0);

        let played = played_engine();
        let bytes = encode_binary(&played.serialize()).unwrap();
        let engine = load_or_fresh(content(), StationConfig::default(), &bytes).unwrap();
        assert_eq!(engine.state(), played.state());
    }

    #[test]
    fn test_file_sink_replaces_save() {
        let path = std::env::temp_dir().join(format!("station-save-{}.bin", std::process::id()));
        let mut sink = FileSaveSink::new(path.clone());
        let engine = played_engine();

        sink.persist(&engine.serialize()).unwrap();
        sink.persist(&engine.serialize()).unwrap();
        assert_eq!(sink.read().unwrap(), engine.serialize());
        assert!(!path.with_extension("tmp").exists());
        let _ = fs::remove_file(&path);
    }
}
