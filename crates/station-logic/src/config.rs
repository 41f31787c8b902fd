//! Engine settings.
//!
//! These are timing and pacing parameters, not content: the content file
//! describes *what* exists on the station, the config describes how fast the
//! simulation runs. Both are injected into the engine.
//!
//! ```
//! use station_logic::config::{validate_config, StationConfig};
//!
//! let config = StationConfig::default();
//! assert!(validate_config(&config).is_empty());
//! assert_eq!(config.speed_factor(), 0.2);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Ticks per real-time second.
    pub ticks_per_second: u32,
    /// Simulated seconds per real second.
    pub game_speed: f64,
    /// Cycles until the boss appears.
    pub lifespan_cycles: f64,
    /// Cycles of overtime per step the boss approaches.
    pub boss_approach_interval: f64,
    /// Steps between the boss and the station when it appears.
    pub boss_starting_distance: u32,
    pub starting_population: f64,
    /// Population lost per unit of heat per second, as a fraction.
    pub heat_decay: f64,
    /// Real-time milliseconds between saves.
    pub save_interval_ms: u64,
    /// Pending events kept before the oldest are dropped.
    pub event_queue_capacity: usize,
    /// Upper bound on ticks run for one elapsed-time advance.
    pub max_catch_up_ticks: u32,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 20,
            game_speed: 4.0,
            lifespan_cycles: 500.0,
            boss_approach_interval: 50.0,
            boss_starting_distance: 10,
            starting_population: 1.0,
            heat_decay: 0.01,
            save_interval_ms: 3000,
            event_queue_capacity: 256,
            max_catch_up_ticks: 20 * 60,
        }
    }
}

impl StationConfig {
    /// `game_speed / ticks_per_second`: how much one tick advances.
    pub fn speed_factor(&self) -> f64 {
        self.game_speed / self.ticks_per_second as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// At least one tick per second is needed.
    ZeroTickRate,
    /// Game speed must be positive and finite.
    InvalidGameSpeed(f64),
    InvalidLifespan(f64),
    InvalidApproachInterval(f64),
    /// Population starts below the floor of 1.
    PopulationTooSmall(f64),
    InvalidHeatDecay(f64),
    ZeroSaveInterval,
    ZeroEventCapacity,
    ZeroCatchUpTicks,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroTickRate => write!(f, "ticks_per_second must be at least 1"),
            ConfigError::InvalidGameSpeed(v) => write!(f, "invalid game speed {v}"),
            ConfigError::InvalidLifespan(v) => write!(f, "invalid lifespan {v}"),
            ConfigError::InvalidApproachInterval(v) => {
                write!(f, "invalid boss approach interval {v}")
            }
            ConfigError::PopulationTooSmall(v) => write!(f, "starting population {v} is below 1"),
            ConfigError::InvalidHeatDecay(v) => write!(f, "invalid heat decay {v}"),
            ConfigError::ZeroSaveInterval => write!(f, "save interval must be positive"),
            ConfigError::ZeroEventCapacity => write!(f, "event queue capacity must be positive"),
            ConfigError::ZeroCatchUpTicks => write!(f, "max catch-up ticks must be positive"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Validate a config, returning all errors found.
pub fn validate_config(config: &StationConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if config.ticks_per_second == 0 {
        errors.push(ConfigError::ZeroTickRate);
    }
    if !positive(config.game_speed) {
        errors.push(ConfigError::InvalidGameSpeed(config.game_speed));
    }
    if !positive(config.lifespan_cycles) {
        errors.push(ConfigError::InvalidLifespan(config.lifespan_cycles));
    }
    if !positive(config.boss_approach_interval) {
        errors.push(ConfigError::InvalidApproachInterval(
            config.boss_approach_interval,
        ));
    }
    if !(config.starting_population.is_finite() && config.starting_population >= 1.0) {
        errors.push(ConfigError::PopulationTooSmall(config.starting_population));
    }
    if !config.heat_decay.is_finite() || config.heat_decay < 0.0 {
        errors.push(ConfigError::InvalidHeatDecay(config.heat_decay));
    }
    if config.save_interval_ms == 0 {
        errors.push(ConfigError::ZeroSaveInterval);
    }
    if config.event_queue_capacity == 0 {
        errors.push(ConfigError::ZeroEventCapacity);
    }
    if config.max_catch_up_ticks == 0 {
        errors.push(ConfigError::ZeroCatchUpTicks);
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&StationConfig::default()).is_empty());
    }

    #[test]
    fn test_collects_all_errors() {
        let config = StationConfig {
            ticks_per_second: 0,
            game_speed: f64::NAN,
            starting_population: 0.5,
            event_queue_capacity: 0,
            ..StationConfig::default()
        };
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ConfigError::ZeroTickRate));
        assert!(errors.contains(&ConfigError::PopulationTooSmall(0.5)));
        assert!(errors.contains(&ConfigError::ZeroEventCapacity));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: StationConfig = serde_json::from_str(r#"{"game_speed": 8.0}"#).unwrap();
        assert_eq!(config.game_speed, 8.0);
        assert_eq!(config.ticks_per_second, 20);
    }
}
