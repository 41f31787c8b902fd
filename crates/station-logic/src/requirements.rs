//! Unlock requirements.
//!
//! A [`Requirement`] is a conjunction of [`Condition`]s plus a completion
//! latch. Once all conditions hold the latch is set and stays set until a
//! prestige reset, even if the conditions later stop holding (a level is
//! lost, stored energy is spent).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeKind;

/// Resources tracked outside the attribute snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoredResource {
    Energy,
}

/// A single unlock condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Condition {
    /// A named progression entity reached `level`.
    TaskLevel { task: String, level: u32 },
    /// At least `amount` of a stored resource.
    StoredResource {
        resource: StoredResource,
        amount: f64,
    },
    /// The current playthrough lasted `cycles`.
    Age { cycles: f64 },
    /// Battle layers defeated across a faction.
    FactionLevel { faction: String, levels: u32 },
    /// An attribute is at or above `value`.
    AttributeValue { attribute: AttributeKind, value: f64 },
}

/// Read-only view of the game used to evaluate conditions.
pub trait RequirementContext {
    /// Level of a named operation, battle, or the grid strength.
    fn task_level(&self, task: &str) -> Option<u32>;
    fn stored_resource(&self, resource: StoredResource) -> f64;
    fn elapsed_cycles(&self) -> f64;
    fn faction_levels_defeated(&self, faction: &str) -> u32;
    fn attribute(&self, attribute: AttributeKind) -> f64;
}

impl Condition {
    pub fn holds<C: RequirementContext + ?Sized>(&self, ctx: &C) -> bool {
        match self {
            Condition::TaskLevel { task, level } => {
                ctx.task_level(task).is_some_and(|current| current >= *level)
            }
            Condition::StoredResource { resource, amount } => {
                ctx.stored_resource(*resource) >= *amount
            }
            Condition::Age { cycles } => ctx.elapsed_cycles() >= *cycles,
            Condition::FactionLevel { faction, levels } => {
                ctx.faction_levels_defeated(faction) >= *levels
            }
            Condition::AttributeValue { attribute, value } => ctx.attribute(*attribute) >= *value,
        }
    }
}

/// Whether a latch survives prestige.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequirementScope {
    #[default]
    Playthrough,
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub key: String,
    pub scope: RequirementScope,
    pub conditions: Vec<Condition>,
    completed: bool,
}

impl Requirement {
    pub fn new(key: impl Into<String>, scope: RequirementScope, conditions: Vec<Condition>) -> Self {
        Self {
            key: key.into(),
            scope,
            conditions,
            completed: false,
        }
    }

    /// Latched, or all conditions hold now (which sets the latch).
    pub fn is_completed<C: RequirementContext + ?Sized>(&mut self, ctx: &C) -> bool {
        if self.completed {
            return true;
        }
        if self.conditions.iter().all(|c| c.holds(ctx)) {
            self.completed = true;
        }
        self.completed
    }

    pub fn is_latched(&self) -> bool {
        self.completed
    }

    /// Conditions that do not hold right now, for display.
    pub fn unfulfilled<'a, C: RequirementContext + ?Sized>(&'a self, ctx: &C) -> Vec<&'a Condition> {
        self.conditions.iter().filter(|c| !c.holds(ctx)).collect()
    }

    /// Clear the latch unless the requirement is permanent.
    pub fn reset(&mut self, allow_list: &[String]) {
        let keep = self.scope == RequirementScope::Permanent || allow_list.contains(&self.key);
        if !keep {
            self.completed = false;
        }
    }

    pub fn restore_latch(&mut self, completed: bool) {
        self.completed = completed;
    }
}

/// Index of a requirement inside a [`RequirementBook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequirementId(pub usize);

/// Result of walking a sequential unlock chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStatus {
    /// Number of leading entries that are unlocked.
    pub available: usize,
    /// Index of the first locked entry, if any.
    pub blocked_at: Option<usize>,
}

impl ChainStatus {
    pub fn is_available(&self, index: usize) -> bool {
        index < self.available
    }
}

/// Every requirement of the loaded content, with their latches.
#[derive(Debug, Clone, Default)]
pub struct RequirementBook {
    requirements: Vec<Requirement>,
    by_key: HashMap<String, RequirementId>,
}

impl RequirementBook {
    pub fn new(requirements: Vec<Requirement>) -> Self {
        let by_key = requirements
            .iter()
            .enumerate()
            .map(|(i, r)| (r.key.clone(), RequirementId(i)))
            .collect();
        Self {
            requirements,
            by_key,
        }
    }

    pub fn get(&self, id: RequirementId) -> &Requirement {
        &self.requirements[id.0]
    }

    pub fn id(&self, key: &str) -> Option<RequirementId> {
        self.by_key.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn is_completed<C: RequirementContext + ?Sized>(&mut self, id: RequirementId, ctx: &C) -> bool {
        self.requirements[id.0].is_completed(ctx)
    }

    /// An optional gate: `None` is always open.
    pub fn gate_open<C: RequirementContext + ?Sized>(
        &mut self,
        gate: Option<RequirementId>,
        ctx: &C,
    ) -> bool {
        gate.map_or(true, |id| self.is_completed(id, ctx))
    }

    pub fn is_latched(&self, gate: Option<RequirementId>) -> bool {
        gate.map_or(true, |id| self.requirements[id.0].is_latched())
    }

    /// Evaluate every requirement; returns how many latched just now.
    pub fn evaluate_all<C: RequirementContext + ?Sized>(&mut self, ctx: &C) -> usize {
        self.requirements
            .iter_mut()
            .filter(|r| !r.is_latched())
            .map(|r| r.is_completed(ctx))
            .filter(|done| *done)
            .count()
    }

    /// Walk a chain in order. Only the first incomplete gate is evaluated;
    /// everything after it is blocked.
    pub fn unlock_chain<C: RequirementContext + ?Sized>(
        &mut self,
        gates: &[Option<RequirementId>],
        ctx: &C,
    ) -> ChainStatus {
        for (index, gate) in gates.iter().enumerate() {
            if !self.gate_open(*gate, ctx) {
                return ChainStatus {
                    available: index,
                    blocked_at: Some(index),
                };
            }
        }
        ChainStatus {
            available: gates.len(),
            blocked_at: None,
        }
    }

    /// Clear playthrough latches, keeping permanent ones and the allow-list.
    pub fn reset(&mut self, allow_list: &[String]) {
        for requirement in &mut self.requirements {
            requirement.reset(allow_list);
        }
    }

    pub fn latches(&self) -> impl Iterator<Item = (&str, bool)> {
        self.requirements
            .iter()
            .map(|r| (r.key.as_str(), r.is_latched()))
    }

    /// Restore a saved latch. Returns false for unknown keys.
    pub fn restore_latch(&mut self, key: &str, completed: bool) -> bool {
        match self.by_key.get(key) {
            Some(id) => {
                self.requirements[id.0].restore_latch(completed);
                true
            }
            None => false,
        }
    }
}
