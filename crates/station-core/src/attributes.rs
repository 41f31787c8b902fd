//! Attribute snapshot computation.
//!
//! The producer set is rebuilt from state on every call: counted-active
//! operations at their level, active unfinished battles' threat at level 1,
//! won battles' rewards at level 1. The selected point of interest is always
//! added and supplies the modifiers.

use station_logic::attributes::{AttributeKind, Attributes};
use station_logic::content::Content;
use station_logic::effects::{total_value, EffectHolder, EffectSource};
use station_logic::game_state::GameState;
use station_logic::population::heat;
use station_logic::progression::MultiplierContext;
use station_logic::requirements::{RequirementContext, StoredResource};

use crate::state::StationState;

/// Every effect source currently contributing.
pub fn producers<'a>(content: &'a Content, state: &StationState) -> Vec<EffectSource<'a>> {
    let mut sources: Vec<EffectSource<'a>> = state
        .activation
        .active_operations(content)
        .map(|id| content.operation(id).source(state.operations[id.0].level as f64))
        .collect();

    for (i, battle) in content.battles.iter().enumerate() {
        let progress = &state.battles[i];
        if progress.is_done(battle.layers) {
            sources.push(battle.reward_source());
        } else if state.active_battles.iter().any(|id| id.0 == i) {
            sources.push(battle.source(1.0));
        }
    }
    sources
}

/// Total of an effect-based attribute.
pub fn attribute_total(content: &Content, state: &StationState, kind: AttributeKind) -> f64 {
    let sources = producers(content, state);
    effect_total(content, state, kind, &sources)
}

fn effect_total(
    content: &Content,
    state: &StationState,
    kind: AttributeKind,
    sources: &[EffectSource<'_>],
) -> f64 {
    let poi = content.point_of_interest(state.point_of_interest);
    total_value(
        &content.effect_types,
        content.attribute_types(kind),
        sources,
        &poi.source(1.0),
        &poi.modifiers,
    )
}

/// Recompute every attribute from scratch.
pub fn compute_attributes(content: &Content, state: &StationState) -> Attributes {
    let sources = producers(content, state);
    let mut attributes = Attributes::default();
    for kind in AttributeKind::EFFECT_BASED {
        attributes.set(kind, effect_total(content, state, kind, &sources));
    }

    attributes.grid_load = state.activation.grid_load(content) as f64;
    attributes.grid_strength = state.grid_capacity() as f64;
    attributes.population = state.population;
    attributes.heat = heat(
        attributes.danger,
        attributes.military,
        state.game_state == GameState::BossFight,
    );
    attributes
}

/// Read-only view for requirement and multiplier evaluation.
pub struct StationView<'a> {
    pub content: &'a Content,
    pub state: &'a StationState,
    pub attributes: &'a Attributes,
}

impl<'a> StationView<'a> {
    pub fn new(content: &'a Content, state: &'a StationState, attributes: &'a Attributes) -> Self {
        Self {
            content,
            state,
            attributes,
        }
    }
}

impl RequirementContext for StationView<'_> {
    fn task_level(&self, task: &str) -> Option<u32> {
        self.state.task_level(self.content, task)
    }

    fn stored_resource(&self, resource: StoredResource) -> f64 {
        match resource {
            StoredResource::Energy => self.state.stored_energy,
        }
    }

    fn elapsed_cycles(&self) -> f64 {
        self.state.cycles
    }

    fn faction_levels_defeated(&self, faction: &str) -> u32 {
        self.state.faction_levels_defeated(self.content, faction)
    }

    fn attribute(&self, attribute: AttributeKind) -> f64 {
        self.attributes.get(attribute)
    }
}

impl MultiplierContext for StationView<'_> {
    fn attribute(&self, kind: AttributeKind) -> f64 {
        self.attributes.get(kind)
    }
}
