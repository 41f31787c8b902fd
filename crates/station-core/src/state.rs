//! Mutable station state owned by the engine.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use station_logic::config::StationConfig;
use station_logic::content::{BattleId, Content, EntityRef, PointOfInterestId};
use station_logic::game_state::GameState;
use station_logic::grid::Activation;
use station_logic::progression::{LayeredProgress, Progress};

/// Boss approach bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BossState {
    /// Lifespan reached; the boss is on its way.
    pub available: bool,
    /// Steps covered through elapsed overtime.
    pub covered_distance: u32,
    /// Steps pulled closer by battles won while it approaches.
    pub battles_won: u32,
}

/// Everything that changes while playing. Indexed by content ids.
#[derive(Debug, Clone, PartialEq)]
pub struct StationState {
    pub game_state: GameState,
    pub operations: Vec<Progress>,
    pub grid_strength: Progress,
    pub battles: Vec<LayeredProgress>,
    pub active_battles: BTreeSet<BattleId>,
    pub activation: Activation,
    pub point_of_interest: PointOfInterestId,
    /// Cycles in the current playthrough.
    pub cycles: f64,
    /// Cycles across all playthroughs.
    pub total_cycles: f64,
    pub population: f64,
    pub stored_energy: f64,
    pub rebirth_one_count: u32,
    pub rebirth_two_count: u32,
    pub boss: BossState,
}

impl StationState {
    pub fn new(content: &Content, config: &StationConfig) -> Self {
        Self {
            game_state: GameState::New,
            operations: vec![Progress::default(); content.operations.len()],
            grid_strength: Progress::default(),
            battles: content
                .battles
                .iter()
                .map(|b| LayeredProgress::fresh(b.base_max_xp))
                .collect(),
            active_battles: BTreeSet::new(),
            activation: Activation::defaults(content),
            point_of_interest: content.default_point_of_interest,
            cycles: 0.0,
            total_cycles: 0.0,
            population: config.starting_population,
            stored_energy: 0.0,
            rebirth_one_count: 0,
            rebirth_two_count: 0,
            boss: BossState::default(),
        }
    }

    /// Grid capacity is the grid strength level.
    pub fn grid_capacity(&self) -> u32 {
        self.grid_strength.level
    }

    pub fn is_battle_done(&self, content: &Content, id: BattleId) -> bool {
        self.battles[id.0].is_done(content.battle(id).layers)
    }

    pub fn boss_distance(&self, config: &StationConfig) -> u32 {
        config
            .boss_starting_distance
            .saturating_sub(self.boss.covered_distance.saturating_add(self.boss.battles_won))
    }

    /// Layers cleared across every battle of a faction.
    pub fn faction_levels_defeated(&self, content: &Content, faction: &str) -> u32 {
        let Some(faction) = content.faction_id(faction) else {
            return 0;
        };
        content
            .battles
            .iter()
            .zip(&self.battles)
            .filter(|(battle, _)| battle.faction == faction)
            .map(|(_, progress)| progress.level)
            .sum()
    }

    /// Level of any named progression entity.
    pub fn task_level(&self, content: &Content, name: &str) -> Option<u32> {
        match content.lookup(name)? {
            EntityRef::GridStrength => Some(self.grid_strength.level),
            EntityRef::Operation(id) => Some(self.operations[id.0].level),
            EntityRef::Battle(id) => Some(self.battles[id.0].level),
            _ => None,
        }
    }
}
