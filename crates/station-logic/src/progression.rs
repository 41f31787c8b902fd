//! Leveling: xp curve, level-up accounting and xp multipliers.
//!
//! Two shapes of progress exist:
//! - [`Progress`] counts xp up toward `max_xp`; used by operations and the
//!   grid strength.
//! - [`LayeredProgress`] counts xp down; each emptied layer increments
//!   `level` until the layer limit is reached. Used by battles and the boss.

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeKind;

/// Default xp gained per second before multipliers.
pub const BASE_XP_GAIN: f64 = 10.0;

/// Exponent in the population speed bonus.
pub const POPULATION_SPEED_EXPONENT: f64 = 1.869;

/// `round(base * (level + 1) * 1.01^level)`
pub fn max_xp_for(base_max_xp: f64, level: u32) -> f64 {
    (base_max_xp * (level as f64 + 1.0) * 1.01_f64.powi(level as i32)).round()
}

/// Kind of entity reported in level-change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgressionKind {
    Operation,
    GridStrength,
    Battle,
}

/// Level transition produced by a single xp update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelChange {
    pub previous_level: u32,
    pub next_level: u32,
}

/// How `max_level` is treated when a playthrough ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxLevelBehavior {
    /// Keep the best level reached across playthroughs.
    UpdateMaxLevel,
    /// Forget the best level.
    ResetMaxLevel,
}

/// Mutable progress of an operation or the grid strength.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub level: u32,
    /// Highest level reached in earlier playthroughs.
    pub max_level: u32,
    pub xp: f64,
}

impl Progress {
    pub fn max_xp(&self, base_max_xp: f64) -> f64 {
        max_xp_for(base_max_xp, self.level)
    }

    /// Add xp, leveling up as often as the total allows.
    pub fn increase_xp(&mut self, amount: f64, base_max_xp: f64) -> Option<LevelChange> {
        self.xp += amount;
        if self.xp >= self.max_xp(base_max_xp) {
            self.level_up(base_max_xp)
        } else {
            None
        }
    }

    /// Consume surplus xp into levels. `base_max_xp` must be positive.
    pub fn level_up(&mut self, base_max_xp: f64) -> Option<LevelChange> {
        let previous_level = self.level;
        let mut excess = self.xp - self.max_xp(base_max_xp);
        while excess >= 0.0 {
            self.level += 1;
            excess -= self.max_xp(base_max_xp);
        }
        self.xp = self.max_xp(base_max_xp) + excess;

        (self.level > previous_level).then_some(LevelChange {
            previous_level,
            next_level: self.level,
        })
    }

    pub fn reset(&mut self, behavior: MaxLevelBehavior) {
        match behavior {
            MaxLevelBehavior::UpdateMaxLevel => self.max_level = self.max_level.max(self.level),
            MaxLevelBehavior::ResetMaxLevel => self.max_level = 0,
        }
        self.level = 0;
        self.xp = 0.0;
    }
}

/// Number of layers a [`LayeredProgress`] has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerLimit {
    Finite(u32),
    Unlimited,
}

impl LayerLimit {
    pub fn reached(self, level: u32) -> bool {
        match self {
            LayerLimit::Finite(n) => level >= n,
            LayerLimit::Unlimited => false,
        }
    }
}

/// Progress that counts down through layers (battles).
///
/// `xp` is what remains of the current layer. `level` is the number of
/// layers already cleared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayeredProgress {
    pub level: u32,
    pub max_level: u32,
    pub xp: f64,
}

impl LayeredProgress {
    /// A fresh battle with its first layer full.
    pub fn fresh(base_max_xp: f64) -> Self {
        Self {
            level: 0,
            max_level: 0,
            xp: max_xp_for(base_max_xp, 0),
        }
    }

    pub fn max_xp(&self, base_max_xp: f64) -> f64 {
        max_xp_for(base_max_xp, self.level)
    }

    pub fn is_done(&self, limit: LayerLimit) -> bool {
        limit.reached(self.level)
    }

    /// Layers still standing, for display.
    pub fn remaining_layers(&self, limit: LayerLimit) -> Option<u32> {
        match limit {
            LayerLimit::Finite(n) => Some(n.saturating_sub(self.level)),
            LayerLimit::Unlimited => None,
        }
    }

    /// Remove xp from the current layer, clearing as many layers as the
    /// amount covers. No effect once done.
    pub fn regress(
        &mut self,
        amount: f64,
        base_max_xp: f64,
        limit: LayerLimit,
    ) -> Option<LevelChange> {
        if self.is_done(limit) {
            return None;
        }
        let previous_level = self.level;
        self.xp -= amount;
        while self.xp <= 0.0 {
            self.level += 1;
            if self.is_done(limit) {
                self.xp = 0.0;
                break;
            }
            self.xp += self.max_xp(base_max_xp);
        }

        (self.level > previous_level).then_some(LevelChange {
            previous_level,
            next_level: self.level,
        })
    }

    pub fn reset(&mut self, behavior: MaxLevelBehavior, base_max_xp: f64) {
        match behavior {
            MaxLevelBehavior::UpdateMaxLevel => self.max_level = self.max_level.max(self.level),
            MaxLevelBehavior::ResetMaxLevel => self.max_level = 0,
        }
        self.level = 0;
        self.xp = max_xp_for(base_max_xp, 0);
    }
}

/// Read access to game state needed by multipliers.
pub trait MultiplierContext {
    fn attribute(&self, kind: AttributeKind) -> f64;
}

/// Named xp multiplier, resolved against live state each time it is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum XpMultiplier {
    /// `1 + max_level / 10`
    MaxLevelBonus,
    /// `1 + log10(level + 1)`
    LevelBonus,
    /// `max(1, round(population)^(1/1.869))`
    PopulationSpeed,
    /// `1 + value(attribute) * per_point`
    #[serde(rename_all = "camelCase")]
    AttributeBonus {
        attribute: AttributeKind,
        per_point: f64,
    },
    Constant { factor: f64 },
}

impl XpMultiplier {
    pub fn resolve<C: MultiplierContext + ?Sized>(
        &self,
        level: u32,
        max_level: u32,
        ctx: &C,
    ) -> f64 {
        match self {
            XpMultiplier::MaxLevelBonus => 1.0 + max_level as f64 / 10.0,
            XpMultiplier::LevelBonus => 1.0 + (level as f64 + 1.0).log10(),
            XpMultiplier::PopulationSpeed => {
                population_speed(ctx.attribute(AttributeKind::Population))
            }
            XpMultiplier::AttributeBonus {
                attribute,
                per_point,
            } => 1.0 + ctx.attribute(*attribute) * per_point,
            XpMultiplier::Constant { factor } => *factor,
        }
    }
}

/// `max(1, round(population)^(1/1.869))`
pub fn population_speed(population: f64) -> f64 {
    population
        .round()
        .powf(1.0 / POPULATION_SPEED_EXPONENT)
        .max(1.0)
}

/// `round(base * Π multipliers)`
pub fn apply_multipliers<'a, C: MultiplierContext + ?Sized>(
    base: f64,
    multipliers: impl IntoIterator<Item = &'a XpMultiplier>,
    level: u32,
    max_level: u32,
    ctx: &C,
) -> f64 {
    let factor: f64 = multipliers
        .into_iter()
        .map(|m| m.resolve(level, max_level, ctx))
        .product();
    (base * factor).round()
}

/// Where the base xp gain comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum XpSource {
    Fixed { amount: f64 },
    Attribute { attribute: AttributeKind },
}

impl Default for XpSource {
    fn default() -> Self {
        XpSource::Fixed {
            amount: BASE_XP_GAIN,
        }
    }
}

impl XpSource {
    pub fn base<C: MultiplierContext + ?Sized>(&self, ctx: &C) -> f64 {
        match self {
            XpSource::Fixed { amount } => *amount,
            XpSource::Attribute { attribute } => ctx.attribute(*attribute),
        }
    }
}
