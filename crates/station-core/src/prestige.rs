//! Prestige: end the playthrough and start over with permanent bonuses.
//!
//! Two tiers exist. A rebirth keeps the best level of every progression
//! as `max_level`, which feeds the max-level xp bonus. A transcend forgets
//! it. Both reset everything else a playthrough builds up, except the
//! requirement latches that are permanent or on the content's allow-list.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use station_logic::game_state::GameState;
use station_logic::grid::Activation;
use station_logic::progression::MaxLevelBehavior;

use crate::attributes::compute_attributes;
use crate::engine::{CommandError, StationEngine};
use crate::events::StationEvent;
use crate::state::BossState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrestigeTier {
    Rebirth,
    Transcend,
}

impl PrestigeTier {
    pub fn max_level_behavior(self) -> MaxLevelBehavior {
        match self {
            PrestigeTier::Rebirth => MaxLevelBehavior::UpdateMaxLevel,
            PrestigeTier::Transcend => MaxLevelBehavior::ResetMaxLevel,
        }
    }
}

impl StationEngine {
    /// Reset the playthrough. Only allowed in states that permit prestige.
    pub fn request_prestige(&mut self, tier: PrestigeTier) -> Result<(), CommandError> {
        let current = self.state.game_state;
        if !current.flags().can_prestige {
            return Err(CommandError::NotPlayable(current));
        }

        match tier {
            PrestigeTier::Rebirth => self.state.rebirth_one_count += 1,
            PrestigeTier::Transcend => self.state.rebirth_two_count += 1,
        }

        let behavior = tier.max_level_behavior();
        let content = Arc::clone(&self.content);
        for progress in &mut self.state.operations {
            progress.reset(behavior);
        }
        self.state.grid_strength.reset(behavior);
        for (progress, battle) in self.state.battles.iter_mut().zip(&content.battles) {
            progress.reset(behavior, battle.base_max_xp);
        }
        self.state.active_battles.clear();
        self.requirements.reset(&content.permanent_unlocks);

        self.state.activation = Activation::defaults(&content);
        self.state.point_of_interest = content.default_point_of_interest;
        self.state.cycles = 0.0;
        self.state.population = self.config.starting_population;
        self.state.stored_energy = 0.0;
        self.state.boss = BossState::default();

        self.transition(GameState::New)?;
        self.attributes = compute_attributes(&content, &self.state);

        log::info!(
            "{:?} complete (rebirths: {}, transcends: {})",
            tier,
            self.state.rebirth_one_count,
            self.state.rebirth_two_count
        );
        self.events.push(StationEvent::NewGameStarted {
            rebirth_one_count: self.state.rebirth_one_count,
            rebirth_two_count: self.state.rebirth_two_count,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use station_logic::config::StationConfig;
    use station_logic::content::Content;

    const CONTENT: &str = include_str!("../../../data/station_content.json");

    fn engine() -> StationEngine {
        let content = Arc::new(Content::from_json(CONTENT).unwrap());
        let mut e = StationEngine::new(content, StationConfig::default()).unwrap();
        e.finish_intro().unwrap();
        e
    }

    #[test]
    fn test_rebirth_keeps_max_level() {
        let mut e = engine();
        let standby = e.content().operation_id("StandbyGenerator").unwrap();
        e.state.operations[standby.0].level = 7;
        e.state.grid_strength.level = 3;

        e.request_prestige(PrestigeTier::Rebirth).unwrap();

        let progress = e.state().operations[standby.0];
        assert_eq!(progress.level, 0);
        assert_eq!(progress.max_level, 7);
        assert_eq!(e.state().grid_strength.max_level, 3);
        assert_eq!(e.state().rebirth_one_count, 1);
        assert_eq!(e.game_state(), GameState::New);
        // 10 * 1.7 max level bonus * 1.05 industry bonus
        assert_eq!(e.operation_xp_gain("StandbyGenerator"), Some(18.0));
    }

    #[test]
    fn test_max_level_never_drops_on_rebirth() {
        let mut e = engine();
        let standby = e.content().operation_id("StandbyGenerator").unwrap();
        e.state.operations[standby.0].level = 7;
        e.request_prestige(PrestigeTier::Rebirth).unwrap();
        e.finish_intro().unwrap();
        e.state.operations[standby.0].level = 2;
        e.request_prestige(PrestigeTier::Rebirth).unwrap();
        assert_eq!(e.state().operations[standby.0].max_level, 7);
    }

    #[test]
    fn test_transcend_forgets_max_level() {
        let mut e = engine();
        let standby = e.content().operation_id("StandbyGenerator").unwrap();
        e.state.operations[standby.0].level = 7;
        e.request_prestige(PrestigeTier::Rebirth).unwrap();
        assert_eq!(
            e.request_prestige(PrestigeTier::Transcend),
            Err(CommandError::NotPlayable(GameState::New))
        );
        e.finish_intro().unwrap();
        e.request_prestige(PrestigeTier::Transcend).unwrap();
        assert_eq!(e.state().operations[standby.0].max_level, 0);
        assert_eq!(e.state().rebirth_two_count, 1);
    }

    #[test]
    fn test_prestige_resets_playthrough() {
        let mut e = engine();
        e.state.grid_strength.level = 2;
        e.update();
        e.toggle_module("Furnace").unwrap();
        e.toggle_battle("Astrogoblins10").unwrap();
        e.state.cycles = 120.0;
        e.state.total_cycles = 120.0;
        e.state.population = 40.0;
        e.state.stored_energy = 9.0;
        e.state.boss.available = true;

        e.request_prestige(PrestigeTier::Rebirth).unwrap();

        let state = e.state();
        assert_eq!(state.cycles, 0.0);
        assert_eq!(state.total_cycles, 120.0);
        assert_eq!(state.population, 1.0);
        assert_eq!(state.stored_energy, 0.0);
        assert!(state.active_battles.is_empty());
        assert!(!state.boss.available);
        assert_eq!(state.activation, Activation::defaults(e.content()));
        let goblins = e.content().battle_id("Astrogoblins10").unwrap();
        assert_eq!(state.battles[goblins.0].xp, 50.0);
    }

    #[test]
    fn test_prestige_rejected_during_boss_fight() {
        let mut e = engine();
        e.state.boss.available = true;
        e.engage_boss().unwrap();
        assert_eq!(
            e.request_prestige(PrestigeTier::Rebirth),
            Err(CommandError::NotPlayable(GameState::BossFightIntro))
        );
        e.start_boss_fight().unwrap();
        assert!(e.request_prestige(PrestigeTier::Rebirth).is_err());
        assert_eq!(e.state().rebirth_one_count, 0);
    }

    #[test]
    fn test_prestige_after_death() {
        let mut e = engine();
        e.state.boss.available = true;
        e.engage_boss().unwrap();
        e.start_boss_fight().unwrap();
        e.state.population = 1.0;
        e.update();
        assert_eq!(e.game_state(), GameState::Dead);
        e.request_prestige(PrestigeTier::Rebirth).unwrap();
        let events = e.drain_events();
        assert_eq!(
            events.last(),
            Some(&StationEvent::NewGameStarted {
                rebirth_one_count: 1,
                rebirth_two_count: 0
            })
        );
    }

    #[test]
    fn test_permanent_unlocks_survive() {
        let mut e = engine();
        e.state.grid_strength.level = 2;
        e.state.cycles = 60.0;
        e.update();
        assert!(e.is_unlocked("StationLog"));
        assert!(e.is_unlocked("Fundamentals"));

        e.request_prestige(PrestigeTier::Rebirth).unwrap();
        assert!(e.is_unlocked("StationLog"));
        assert!(!e.is_unlocked("Fundamentals"));
    }
}
