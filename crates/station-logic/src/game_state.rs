//! Game state machine.
//!
//! Each state carries a fixed set of capability flags which the engine
//! consults instead of matching on states directly.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameState {
    #[default]
    New,
    Playing,
    Paused,
    BossFightIntro,
    BossFight,
    Dead,
    BossDefeated,
}

/// What is allowed while in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateFlags {
    pub time_progressing: bool,
    pub tasks_progressing: bool,
    pub attributes_updated: bool,
    pub can_change_activation: bool,
    pub can_prestige: bool,
}

impl GameState {
    pub const ALL: [GameState; 7] = [
        GameState::New,
        GameState::Playing,
        GameState::Paused,
        GameState::BossFightIntro,
        GameState::BossFight,
        GameState::Dead,
        GameState::BossDefeated,
    ];

    pub fn flags(self) -> StateFlags {
        let (time, tasks, attributes, activation, prestige) = match self {
            GameState::New => (false, false, false, true, false),
            GameState::Playing => (true, true, true, true, true),
            GameState::Paused => (false, false, false, true, true),
            GameState::BossFightIntro => (false, false, false, false, false),
            GameState::BossFight => (true, true, true, false, false),
            GameState::Dead => (false, false, false, false, true),
            GameState::BossDefeated => (false, false, false, false, true),
        };
        StateFlags {
            time_progressing: time,
            tasks_progressing: tasks,
            attributes_updated: attributes,
            can_change_activation: activation,
            can_prestige: prestige,
        }
    }

    pub fn can_transition_to(self, next: GameState) -> bool {
        use GameState::*;
        match (self, next) {
            (New, Playing) => true,
            (Playing, Paused) | (Paused, Playing) => true,
            (Playing, BossFightIntro) | (Paused, BossFightIntro) => true,
            (BossFightIntro, BossFight) => true,
            (BossFight, Dead) | (BossFight, BossDefeated) => true,
            (from, New) => from.flags().can_prestige,
            _ => false,
        }
    }

    pub fn transition(self, next: GameState) -> Result<GameState, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError { from: self, to: next })
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameState::New => "New",
            GameState::Playing => "Playing",
            GameState::Paused => "Paused",
            GameState::BossFightIntro => "Boss Fight Intro",
            GameState::BossFight => "Boss Fight",
            GameState::Dead => "Dead",
            GameState::BossDefeated => "Boss Defeated",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: GameState,
    pub to: GameState,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot go from {} to {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}
