//! Station engine - owns all mutable state and runs the tick.

use std::fmt;
use std::iter;
use std::sync::Arc;

use station_logic::attributes::{AttributeKind, Attributes};
use station_logic::config::{validate_config, ConfigError, StationConfig};
use station_logic::content::{BattleId, Content, ModuleId, OperationId, PointOfInterestId};
use station_logic::effects::describe;
use station_logic::game_state::{GameState, TransitionError};
use station_logic::grid::GridError;
use station_logic::population::{is_wiped_out, next_population, population_delta};
use station_logic::progression::{
    apply_multipliers, ProgressionKind, XpMultiplier, XpSource, BASE_XP_GAIN,
};
use station_logic::requirements::RequirementBook;

use crate::attributes::{compute_attributes, StationView};
use crate::events::{EventQueue, EventSink, StationEvent};
use crate::state::StationState;

/// Rejected player command. The engine is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    UnknownName { kind: &'static str, name: String },
    NotInComponent { component: String, operation: String },
    /// The current game state does not allow the command.
    NotPlayable(GameState),
    /// Requirement not met yet.
    Locked(String),
    CapacityExceeded { required: u32, capacity: u32 },
    InvalidTransition(TransitionError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::UnknownName { kind, name } => write!(f, "unknown {kind} '{name}'"),
            CommandError::NotInComponent {
                component,
                operation,
            } => write!(f, "'{operation}' is not part of '{component}'"),
            CommandError::NotPlayable(state) => write!(f, "not allowed while {state}"),
            CommandError::Locked(name) => write!(f, "'{name}' is still locked"),
            CommandError::CapacityExceeded { required, capacity } => {
                write!(f, "grid load {required} exceeds grid strength {capacity}")
            }
            CommandError::InvalidTransition(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<TransitionError> for CommandError {
    fn from(e: TransitionError) -> Self {
        CommandError::InvalidTransition(e)
    }
}

/// Who a registered xp multiplier applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiplierTarget {
    AllOperations,
    Operation(String),
    GridStrength,
    Battles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResolvedTarget {
    AllOperations,
    Operation(OperationId),
    GridStrength,
    Battles,
}

/// Main station engine
///
/// A single writer: every command takes `&mut self` and runs between ticks.
/// Wrap the engine in one `Mutex` if it has to be shared across threads.
pub struct StationEngine {
    pub(crate) content: Arc<Content>,
    pub(crate) config: StationConfig,
    pub(crate) state: StationState,
    pub(crate) requirements: RequirementBook,
    pub(crate) attributes: Attributes,
    pub(crate) extra_multipliers: Vec<(ResolvedTarget, XpMultiplier)>,
    pub(crate) events: EventQueue,
    pub(crate) tick_count: u64,
}

impl StationEngine {
    /// Create a fresh station. Fails on the first config error.
    pub fn new(content: Arc<Content>, config: StationConfig) -> Result<Self, ConfigError> {
        let errors = validate_config(&config);
        if let Some(first) = errors.first() {
            for error in &errors {
                log::warn!("Invalid station config: {}", error);
            }
            return Err(first.clone());
        }

        let state = StationState::new(&content, &config);
        let attributes = compute_attributes(&content, &state);
        log::info!(
            "Station ready: {} operations, {} modules, {} battles, {} requirements",
            content.operations.len(),
            content.modules.len(),
            content.battles.len(),
            content.requirements.len()
        );
        Ok(Self {
            requirements: RequirementBook::new(content.requirements.clone()),
            events: EventQueue::new(config.event_queue_capacity),
            content,
            config,
            state,
            attributes,
            extra_multipliers: Vec::new(),
            tick_count: 0,
        })
    }

    // ── Tick ───────────────────────────────────────────────────────────

    /// Advance the simulation by one tick.
    pub fn update(&mut self) {
        self.tick_count += 1;

        self.increase_date();
        self.update_boss_distance();
        self.progress_operations();
        self.progress_battles();
        self.update_population();

        self.attributes = compute_attributes(&self.content, &self.state);
        let view = StationView::new(&self.content, &self.state, &self.attributes);
        let latched = self.requirements.evaluate_all(&view);
        if latched > 0 {
            log::debug!("{} requirements completed on tick {}", latched, self.tick_count);
        }
    }

    fn increase_date(&mut self) {
        if !self.state.game_state.flags().time_progressing {
            return;
        }
        let increase = self.config.speed_factor();
        self.state.cycles += increase;
        self.state.total_cycles += increase;

        if self.content.boss.is_some()
            && !self.state.boss.available
            && self.state.cycles >= self.config.lifespan_cycles
        {
            self.state.boss.available = true;
            log::info!("Boss appeared after {:.1} cycles", self.state.cycles);
            if let Err(e) = self.transition(GameState::Paused) {
                log::debug!("Boss appeared without pausing: {}", e);
            }
            self.events.push(StationEvent::BossAppeared);
        }
    }

    fn update_boss_distance(&mut self) {
        if self.state.game_state != GameState::Playing || !self.state.boss.available {
            return;
        }
        let overtime = (self.state.cycles - self.config.lifespan_cycles).max(0.0);
        let steps = (overtime / self.config.boss_approach_interval).floor() as u32;
        self.state.boss.covered_distance = steps.min(self.config.boss_starting_distance);

        if self.state.boss_distance(&self.config) == 0 {
            log::info!("Boss arrived");
            if let Err(e) = self.transition(GameState::BossFightIntro) {
                log::warn!("Boss arrival failed: {}", e);
            }
        }
    }

    fn progress_operations(&mut self) {
        if !self.state.game_state.flags().tasks_progressing {
            return;
        }
        let content = Arc::clone(&self.content);
        let attributes = compute_attributes(&content, &self.state);
        let speed = self.config.speed_factor();

        let active: Vec<OperationId> = self.state.activation.active_operations(&content).collect();
        for id in active {
            let gain = self.operation_xp_gain_with(id, &attributes);
            let op = content.operation(id);
            if let Some(change) = self.state.operations[id.0].increase_xp(gain * speed, op.base_max_xp) {
                self.events.push(StationEvent::level_changed(
                    ProgressionKind::Operation,
                    &op.name,
                    change,
                ));
            }
        }

        self.state.stored_energy += attributes.energy.max(0.0) * speed;
        let gain = self.grid_strength_xp_gain_with(&attributes);
        let grid = &content.grid_strength;
        if let Some(change) = self.state.grid_strength.increase_xp(gain * speed, grid.base_max_xp) {
            log::debug!("Grid strength {} -> {}", change.previous_level, change.next_level);
            self.events.push(StationEvent::level_changed(
                ProgressionKind::GridStrength,
                &grid.name,
                change,
            ));
        }
    }

    fn progress_battles(&mut self) {
        if !self.state.game_state.flags().tasks_progressing {
            return;
        }
        let content = Arc::clone(&self.content);
        let attributes = compute_attributes(&content, &self.state);
        let speed = self.config.speed_factor();

        let active: Vec<BattleId> = self.state.active_battles.iter().copied().collect();
        for id in active {
            let battle = content.battle(id);
            if self.state.is_battle_done(&content, id) {
                continue;
            }
            let gain = self.battle_xp_gain_with(id, &attributes);
            let progress = &mut self.state.battles[id.0];
            if let Some(change) = progress.regress(gain * speed, battle.base_max_xp, battle.layers) {
                self.events.push(StationEvent::level_changed(
                    ProgressionKind::Battle,
                    &battle.name,
                    change,
                ));
            }
            if !self.state.is_battle_done(&content, id) {
                continue;
            }

            self.state.active_battles.remove(&id);
            log::info!("Battle {} won", battle.name);
            self.events.push(StationEvent::BattleCompleted {
                name: battle.name.clone(),
            });
            if battle.is_boss {
                if let Err(e) = self.transition(GameState::BossDefeated) {
                    log::warn!("Boss defeated outside the fight: {}", e);
                }
            } else if self.state.game_state == GameState::Playing && self.state.boss.available {
                self.state.boss.battles_won += 1;
            }
        }
    }

    fn update_population(&mut self) {
        let current = self.state.game_state;
        if !current.flags().attributes_updated {
            return;
        }
        let attributes = compute_attributes(&self.content, &self.state);
        let boss_fight = current == GameState::BossFight;
        let delta = population_delta(
            attributes.growth,
            self.state.population,
            attributes.heat,
            self.config.heat_decay,
            boss_fight,
        );
        self.state.population =
            next_population(self.state.population, delta, self.config.speed_factor());

        if boss_fight && is_wiped_out(self.state.population) {
            log::info!("Station lost to the boss");
            if let Err(e) = self.transition(GameState::Dead) {
                log::warn!("Could not end the fight: {}", e);
            }
        }
    }

    pub(crate) fn transition(&mut self, next: GameState) -> Result<(), TransitionError> {
        let previous = self.state.game_state;
        self.state.game_state = previous.transition(next)?;
        log::info!("Game state {} -> {}", previous, next);
        self.events.push(StationEvent::StateChanged { previous, next });
        Ok(())
    }

    // ── Xp gains ───────────────────────────────────────────────────────

    fn extra_multipliers_for(&self, wanted: ResolvedTarget) -> impl Iterator<Item = &XpMultiplier> {
        self.extra_multipliers
            .iter()
            .filter(move |(target, _)| {
                *target == wanted
                    || (*target == ResolvedTarget::AllOperations
                        && matches!(wanted, ResolvedTarget::Operation(_)))
            })
            .map(|(_, m)| m)
    }

    fn operation_xp_gain_with(&self, id: OperationId, attributes: &Attributes) -> f64 {
        let view = StationView::new(&self.content, &self.state, attributes);
        let op = self.content.operation(id);
        let progress = &self.state.operations[id.0];
        let chain = iter::once(&XpMultiplier::MaxLevelBonus)
            .chain(&self.content.operation_xp_multipliers)
            .chain(&op.xp_multipliers)
            .chain(self.extra_multipliers_for(ResolvedTarget::Operation(id)));
        apply_multipliers(BASE_XP_GAIN, chain, progress.level, progress.max_level, &view)
    }

    fn grid_strength_xp_gain_with(&self, attributes: &Attributes) -> f64 {
        let view = StationView::new(&self.content, &self.state, attributes);
        let progress = &self.state.grid_strength;
        let source = XpSource::Attribute {
            attribute: AttributeKind::Energy,
        };
        let chain = iter::once(&XpMultiplier::MaxLevelBonus)
            .chain(&self.content.grid_strength.xp_multipliers)
            .chain(self.extra_multipliers_for(ResolvedTarget::GridStrength));
        apply_multipliers(source.base(&view), chain, progress.level, progress.max_level, &view)
            .max(0.0)
    }

    fn battle_xp_gain_with(&self, id: BattleId, attributes: &Attributes) -> f64 {
        let view = StationView::new(&self.content, &self.state, attributes);
        let progress = &self.state.battles[id.0];
        let chain = iter::once(&XpMultiplier::MaxLevelBonus)
            .chain(&self.content.battle_xp_multipliers)
            .chain(self.extra_multipliers_for(ResolvedTarget::Battles));
        apply_multipliers(BASE_XP_GAIN, chain, progress.level, progress.max_level, &view)
    }

    /// Xp per second an operation would gain right now.
    pub fn operation_xp_gain(&self, name: &str) -> Option<f64> {
        let id = self.content.operation_id(name)?;
        Some(self.operation_xp_gain_with(id, &self.attributes))
    }

    /// Xp per second the grid strength gains right now.
    pub fn grid_strength_xp_gain(&self) -> f64 {
        self.grid_strength_xp_gain_with(&self.attributes)
    }

    pub fn battle_xp_gain(&self, name: &str) -> Option<f64> {
        let id = self.content.battle_id(name)?;
        Some(self.battle_xp_gain_with(id, &self.attributes))
    }

    // ── Unlock checks ──────────────────────────────────────────────────

    fn operation_unlocked(&mut self, id: OperationId) -> bool {
        let content = Arc::clone(&self.content);
        let op = content.operation(id);
        if !self.module_unlocked(op.module) {
            return false;
        }
        let component = content.component(op.component);
        let gates: Vec<_> = component
            .operations
            .iter()
            .map(|o| content.operation(*o).requirement)
            .collect();
        let view = StationView::new(&content, &self.state, &self.attributes);
        let status = self.requirements.unlock_chain(&gates, &view);
        component
            .operations
            .iter()
            .position(|o| *o == id)
            .is_some_and(|index| status.is_available(index))
    }

    fn module_unlocked(&mut self, id: ModuleId) -> bool {
        let content = Arc::clone(&self.content);
        let Some(category) = content.module(id).category else {
            return true;
        };
        let gates: Vec<_> = content.categories.iter().map(|c| c.requirement).collect();
        let view = StationView::new(&content, &self.state, &self.attributes);
        self.requirements
            .unlock_chain(&gates, &view)
            .is_available(category.0)
    }

    fn point_of_interest_unlocked(&mut self, id: PointOfInterestId) -> bool {
        let content = Arc::clone(&self.content);
        let poi = content.point_of_interest(id);
        let view = StationView::new(&content, &self.state, &self.attributes);
        let Some(sector_id) = poi.sector else {
            return self.requirements.gate_open(poi.requirement, &view);
        };

        let sector_gates: Vec<_> = content.sectors.iter().map(|s| s.requirement).collect();
        if !self
            .requirements
            .unlock_chain(&sector_gates, &view)
            .is_available(sector_id.0)
        {
            return false;
        }
        let sector = &content.sectors[sector_id.0];
        let gates: Vec<_> = sector
            .points_of_interest
            .iter()
            .map(|p| content.point_of_interest(*p).requirement)
            .collect();
        let status = self.requirements.unlock_chain(&gates, &view);
        sector
            .points_of_interest
            .iter()
            .position(|p| *p == id)
            .is_some_and(|index| status.is_available(index))
    }

    /// Number of battles that may be shown at once.
    pub fn battle_slots(&mut self) -> usize {
        let content = Arc::clone(&self.content);
        let gates: Vec<_> = content.battle_slots.iter().map(|id| Some(*id)).collect();
        let view = StationView::new(&content, &self.state, &self.attributes);
        1 + self.requirements.unlock_chain(&gates, &view).available
    }

    /// Unfinished regular battles within the visible slots, in content order.
    pub fn visible_battles(&mut self) -> Vec<BattleId> {
        let slots = self.battle_slots();
        self.content
            .regular_battles()
            .filter(|(id, _)| !self.state.is_battle_done(&self.content, *id))
            .map(|(id, _)| id)
            .take(slots)
            .collect()
    }

    // ── Commands ───────────────────────────────────────────────────────

    fn require_activation_changes(&self) -> Result<(), CommandError> {
        let current = self.state.game_state;
        if current.flags().can_change_activation {
            Ok(())
        } else {
            log::debug!("Activation change rejected while {}", current);
            Err(CommandError::NotPlayable(current))
        }
    }

    /// Select an operation in its component, subject to grid capacity.
    pub fn activate_operation(&mut self, component: &str, operation: &str) -> Result<(), CommandError> {
        self.require_activation_changes()?;
        let component_id = self.content.component_id(component).ok_or_else(|| {
            CommandError::UnknownName {
                kind: "component",
                name: component.to_string(),
            }
        })?;
        let operation_id = self.content.operation_id(operation).ok_or_else(|| {
            CommandError::UnknownName {
                kind: "operation",
                name: operation.to_string(),
            }
        })?;
        if self.content.operation(operation_id).component != component_id {
            return Err(CommandError::NotInComponent {
                component: component.to_string(),
                operation: operation.to_string(),
            });
        }
        if !self.operation_unlocked(operation_id) {
            log::debug!("Operation {} is locked", operation);
            return Err(CommandError::Locked(operation.to_string()));
        }

        let capacity = self.state.grid_capacity();
        let content = Arc::clone(&self.content);
        self.state
            .activation
            .activate_operation(&content, component_id, operation_id, capacity)
            .map_err(|e| grid_error(e, component, operation))?;
        self.attributes = compute_attributes(&content, &self.state);
        log::debug!("Activated {} in {}", operation, component);
        Ok(())
    }

    /// Enable or disable a module. Returns whether it is now enabled.
    pub fn toggle_module(&mut self, module: &str) -> Result<bool, CommandError> {
        self.require_activation_changes()?;
        let id = self.content.module_id(module).ok_or_else(|| CommandError::UnknownName {
            kind: "module",
            name: module.to_string(),
        })?;
        let enabling = !self.state.activation.is_module_enabled(id);
        if enabling && !self.module_unlocked(id) {
            return Err(CommandError::Locked(module.to_string()));
        }

        let capacity = self.state.grid_capacity();
        let content = Arc::clone(&self.content);
        let enabled = self
            .state
            .activation
            .toggle_module(&content, id, capacity)
            .map_err(|e| grid_error(e, module, module))?;
        self.attributes = compute_attributes(&content, &self.state);
        log::debug!("Module {} enabled: {}", module, enabled);
        Ok(enabled)
    }

    pub fn set_point_of_interest(&mut self, name: &str) -> Result<(), CommandError> {
        self.require_activation_changes()?;
        let id = self
            .content
            .point_of_interest_id(name)
            .ok_or_else(|| CommandError::UnknownName {
                kind: "point of interest",
                name: name.to_string(),
            })?;
        if !self.point_of_interest_unlocked(id) {
            return Err(CommandError::Locked(name.to_string()));
        }
        self.state.point_of_interest = id;
        self.attributes = compute_attributes(&self.content, &self.state);
        log::debug!("Point of interest set to {}", name);
        Ok(())
    }

    /// Start or stop fighting a battle. Returns whether it is now active.
    pub fn toggle_battle(&mut self, name: &str) -> Result<bool, CommandError> {
        self.require_activation_changes()?;
        let id = self
            .content
            .battle_id(name)
            .filter(|id| !self.content.battle(*id).is_boss)
            .ok_or_else(|| CommandError::UnknownName {
                kind: "battle",
                name: name.to_string(),
            })?;
        if self.state.active_battles.remove(&id) {
            self.attributes = compute_attributes(&self.content, &self.state);
            return Ok(false);
        }
        if !self.visible_battles().contains(&id) {
            return Err(CommandError::Locked(name.to_string()));
        }
        self.state.active_battles.insert(id);
        self.attributes = compute_attributes(&self.content, &self.state);
        log::debug!("Engaging battle {}", name);
        Ok(true)
    }

    /// Playing ↔ Paused.
    pub fn toggle_pause(&mut self) -> Result<GameState, CommandError> {
        let next = match self.state.game_state {
            GameState::Playing => GameState::Paused,
            GameState::Paused => GameState::Playing,
            other => return Err(CommandError::NotPlayable(other)),
        };
        self.transition(next)?;
        Ok(next)
    }

    /// Leave the intro of a new playthrough.
    pub fn finish_intro(&mut self) -> Result<(), CommandError> {
        self.transition(GameState::Playing)?;
        Ok(())
    }

    /// Meet the approaching boss before it arrives on its own.
    pub fn engage_boss(&mut self) -> Result<(), CommandError> {
        if !self.state.boss.available {
            return Err(CommandError::Locked("boss".to_string()));
        }
        self.transition(GameState::BossFightIntro)?;
        Ok(())
    }

    /// Start the boss fight after its intro.
    pub fn start_boss_fight(&mut self) -> Result<(), CommandError> {
        let boss = self.content.boss.ok_or_else(|| CommandError::UnknownName {
            kind: "battle",
            name: "boss".to_string(),
        })?;
        self.transition(GameState::BossFight)?;
        self.state.active_battles.clear();
        self.state.active_battles.insert(boss);
        self.attributes = compute_attributes(&self.content, &self.state);
        Ok(())
    }

    /// Add an xp multiplier at runtime. Not persisted.
    pub fn register_xp_multiplier(
        &mut self,
        target: MultiplierTarget,
        multiplier: XpMultiplier,
    ) -> Result<(), CommandError> {
        let resolved = match target {
            MultiplierTarget::AllOperations => ResolvedTarget::AllOperations,
            MultiplierTarget::GridStrength => ResolvedTarget::GridStrength,
            MultiplierTarget::Battles => ResolvedTarget::Battles,
            MultiplierTarget::Operation(name) => {
                let id = self
                    .content
                    .operation_id(&name)
                    .ok_or(CommandError::UnknownName {
                        kind: "operation",
                        name,
                    })?;
                ResolvedTarget::Operation(id)
            }
        };
        self.extra_multipliers.push((resolved, multiplier));
        Ok(())
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn state(&self) -> &StationState {
        &self.state
    }

    pub fn game_state(&self) -> GameState {
        self.state.game_state
    }

    /// Attribute snapshot from the last tick or command.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn requirements(&self) -> &RequirementBook {
        &self.requirements
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn grid_load(&self) -> u32 {
        self.state.activation.grid_load(&self.content)
    }

    pub fn grid_capacity(&self) -> u32 {
        self.state.grid_capacity()
    }

    pub fn boss_distance(&self) -> u32 {
        self.state.boss_distance(&self.config)
    }

    pub fn is_operation_active(&self, name: &str) -> bool {
        self.content
            .operation_id(name)
            .is_some_and(|id| self.state.activation.is_operation_active(&self.content, id))
    }

    pub fn selected_operation(&self, component: &str) -> Option<&str> {
        let component = self.content.component_id(component)?;
        self.state
            .activation
            .selected_operation(component)
            .map(|id| self.content.operation(id).name.as_str())
    }

    pub fn operation_level(&self, name: &str) -> Option<u32> {
        self.content
            .operation_id(name)
            .map(|id| self.state.operations[id.0].level)
    }

    /// Effect text of an operation at its current level.
    pub fn describe_operation(&self, name: &str) -> Option<String> {
        let id = self.content.operation_id(name)?;
        let op = self.content.operation(id);
        let poi = self.content.point_of_interest(self.state.point_of_interest);
        Some(describe(
            &self.content.effect_types,
            &op.name,
            &op.effects,
            self.state.operations[id.0].level as f64,
            &poi.modifiers,
        ))
    }

    pub fn is_unlocked(&self, key: &str) -> bool {
        self.requirements
            .id(key)
            .is_some_and(|id| self.requirements.get(id).is_latched())
    }

    // ── Events ─────────────────────────────────────────────────────────

    pub fn drain_events(&mut self) -> Vec<StationEvent> {
        self.events.drain()
    }

    pub fn dispatch_events<S: EventSink + ?Sized>(&mut self, sink: &mut S) {
        self.events.dispatch(sink);
    }

    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }
}

fn grid_error(e: GridError, component: &str, operation: &str) -> CommandError {
    match e {
        GridError::CapacityExceeded { required, capacity } => {
            CommandError::CapacityExceeded { required, capacity }
        }
        GridError::NotInComponent { .. } => CommandError::NotInComponent {
            component: component.to_string(),
            operation: operation.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &str = include_str!("../../../data/station_content.json");

    fn engine() -> StationEngine {
        let content = Arc::new(Content::from_json(CONTENT).unwrap());
        StationEngine::new(content, StationConfig::default()).unwrap()
    }

    fn playing() -> StationEngine {
        let mut e = engine();
        e.finish_intro().unwrap();
        e.drain_events();
        e
    }

    #[test]
    fn test_new_engine_waits_in_intro() {
        let mut e = engine();
        assert_eq!(e.game_state(), GameState::New);
        e.update();
        assert_eq!(e.state().cycles, 0.0);
        assert_eq!(e.operation_level("StandbyGenerator"), Some(0));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let content = Arc::new(Content::from_json(CONTENT).unwrap());
        let config = StationConfig {
            ticks_per_second: 0,
            ..StationConfig::default()
        };
        assert_eq!(
            StationEngine::new(content, config).err(),
            Some(ConfigError::ZeroTickRate)
        );
    }

    #[test]
    fn test_tick_advances_cycles_and_xp() {
        let mut e = playing();
        e.update();
        assert!((e.state().cycles - 0.2).abs() < 1e-9);
        let standby = e.content().operation_id("StandbyGenerator").unwrap();
        assert!(e.state().operations[standby.0].xp > 0.0);
    }

    /// One operation gaining exactly 15 xp per second.
    fn fixed_gain_engine() -> StationEngine {
        let json = serde_json::json!({
            "effectTypes": [{"name": "Energy", "operator": "+", "description": "Energy"}],
            "attributes": {"energy": ["Energy"]},
            "gridStrength": {"name": "GridStrength", "title": "Grid Strength", "maxXp": 100},
            "operations": [
                {"name": "Standby", "title": "Standby", "maxXp": 100, "gridLoad": 0,
                 "effects": [{"effectType": "Energy", "baseValue": 0.5}]}
            ],
            "components": [{"name": "Capsule", "title": "Capsule", "operations": ["Standby"]}],
            "modules": [{"name": "Core", "title": "Core", "components": ["Capsule"]}],
            "pointsOfInterest": [{"name": "Home", "title": "Home", "effects": []}],
            "defaultModules": ["Core"],
            "defaultPointOfInterest": "Home",
            "operationXpMultipliers": [{"kind": "constant", "factor": 1.5}]
        });
        let content = Arc::new(Content::from_json(&json.to_string()).unwrap());
        let mut e = StationEngine::new(content, StationConfig::default()).unwrap();
        e.finish_intro().unwrap();
        e.drain_events();
        e
    }

    #[test]
    fn test_xp_per_tick_scaled_by_speed() {
        let mut e = fixed_gain_engine();
        let standby = e.content().operation_id("Standby").unwrap();
        assert_eq!(e.operation_xp_gain("Standby"), Some(15.0));

        // 15 xp/s at game speed 4 and 20 ticks/s
        e.update();
        assert!((e.state().operations[standby.0].xp - 3.0).abs() < 1e-9);

        for _ in 0..32 {
            e.update();
        }
        assert!((e.state().operations[standby.0].xp - 99.0).abs() < 1e-9);
        assert_eq!(e.operation_level("Standby"), Some(0));

        e.update();
        let level_changes: Vec<StationEvent> = e
            .drain_events()
            .into_iter()
            .filter(|ev| matches!(ev, StationEvent::LevelChanged { kind: ProgressionKind::Operation, .. }))
            .collect();
        assert_eq!(
            level_changes,
            vec![StationEvent::LevelChanged {
                kind: ProgressionKind::Operation,
                name: "Standby".into(),
                previous_level: 0,
                next_level: 1,
            }]
        );
        let progress = e.state().operations[standby.0];
        assert_eq!(progress.level, 1);
        assert_eq!(progress.max_xp(e.content().operation(standby).base_max_xp), 202.0);
        assert!((progress.xp - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_standby_generator_levels_and_emits_event() {
        let mut e = playing();
        for _ in 0..200 {
            e.update();
        }
        assert!(e.operation_level("StandbyGenerator").unwrap() >= 1);
        let events = e.drain_events();
        assert!(events.iter().any(|ev| matches!(
            ev,
            StationEvent::LevelChanged { kind: ProgressionKind::Operation, name, .. } if name == "StandbyGenerator"
        )));
    }

    #[test]
    fn test_locked_operation_rejected() {
        let mut e = playing();
        let err = e.activate_operation("RescueCapsule", "KungFuManual");
        assert_eq!(err, Err(CommandError::Locked("KungFuManual".into())));
        assert_eq!(e.selected_operation("RescueCapsule"), Some("StandbyGenerator"));
    }

    #[test]
    fn test_capacity_checked_on_activation() {
        let mut e = playing();
        // Unlock the chain without capacity.
        e.state.grid_strength.level = 1;
        e.update();
        e.state.grid_strength.level = 0;
        let err = e.activate_operation("RescueCapsule", "PocketLaboratory");
        assert_eq!(
            err,
            Err(CommandError::CapacityExceeded {
                required: 1,
                capacity: 0
            })
        );

        e.state.grid_strength.level = 1;
        e.activate_operation("RescueCapsule", "PocketLaboratory").unwrap();
        assert!(e.is_operation_active("PocketLaboratory"));
        assert!(!e.is_operation_active("StandbyGenerator"));
        assert_eq!(e.grid_load(), 1);
    }

    #[test]
    fn test_wrong_component() {
        let mut e = playing();
        assert!(matches!(
            e.activate_operation("Fuel", "StandbyGenerator"),
            Err(CommandError::NotInComponent { .. })
        ));
        assert!(matches!(
            e.activate_operation("Nope", "StandbyGenerator"),
            Err(CommandError::UnknownName { kind: "component", .. })
        ));
    }

    #[test]
    fn test_module_category_gate() {
        let mut e = playing();
        assert_eq!(e.toggle_module("Furnace"), Err(CommandError::Locked("Furnace".into())));
        e.state.grid_strength.level = 2;
        e.update();
        assert_eq!(e.toggle_module("Furnace"), Ok(true));
        assert!(e.is_operation_active("Garbage"));
        assert_eq!(e.toggle_module("Furnace"), Ok(false));
    }

    #[test]
    fn test_pause_stops_progress() {
        let mut e = playing();
        assert_eq!(e.toggle_pause(), Ok(GameState::Paused));
        let before = e.state().cycles;
        e.update();
        assert_eq!(e.state().cycles, before);
        assert_eq!(e.toggle_pause(), Ok(GameState::Playing));
        let events = e.drain_events();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_toggle_pause_rejected_in_intro() {
        let mut e = engine();
        assert_eq!(e.toggle_pause(), Err(CommandError::NotPlayable(GameState::New)));
    }

    #[test]
    fn test_point_of_interest_gates() {
        let mut e = playing();
        assert_eq!(
            e.set_point_of_interest("VideoGameLand"),
            Err(CommandError::Locked("VideoGameLand".into()))
        );
        e.set_point_of_interest("FunkySector").unwrap();

        let elite = e.content().operation_id("EliteForce").unwrap();
        e.state.operations[elite.0].level = 100;
        e.update();
        e.set_point_of_interest("VideoGameLand").unwrap();
        assert_eq!(e.attributes().danger, 25.0);
        // Gurkenland still needs the Astral Sharks.
        assert!(e.set_point_of_interest("Gurkenland").is_err());
    }

    #[test]
    fn test_battles_visible_by_research() {
        let mut e = playing();
        assert_eq!(e.battle_slots(), 1);
        assert_eq!(e.toggle_battle("Astrogoblins10"), Ok(true));
        assert_eq!(e.attributes().danger, 20.0);
        assert_eq!(
            e.toggle_battle("CometCrawlers10"),
            Err(CommandError::Locked("CometCrawlers10".into()))
        );
        assert_eq!(e.toggle_battle("Astrogoblins10"), Ok(false));
    }

    #[test]
    fn test_battle_completes_and_rewards() {
        let mut e = playing();
        e.toggle_battle("Astrogoblins10").unwrap();
        let id = e.content().battle_id("Astrogoblins10").unwrap();
        e.state.battles[id.0].level = 9;
        e.state.battles[id.0].xp = 0.5;
        e.update();
        assert!(e.state().is_battle_done(e.content(), id));
        assert!(e.state().active_battles.is_empty());
        assert_eq!(e.attributes().research, 2.0);
        let events = e.drain_events();
        assert!(events.contains(&StationEvent::BattleCompleted {
            name: "Astrogoblins10".into()
        }));
    }

    #[test]
    fn test_boss_appears_after_lifespan() {
        let mut e = playing();
        e.state.cycles = e.config().lifespan_cycles - 0.1;
        e.update();
        assert_eq!(e.game_state(), GameState::Paused);
        assert!(e.state().boss.available);
        let events = e.drain_events();
        assert!(events.contains(&StationEvent::BossAppeared));
    }

    #[test]
    fn test_boss_approaches_and_arrives() {
        let mut e = playing();
        e.state.cycles = e.config().lifespan_cycles - 0.1;
        e.update();
        e.toggle_pause().unwrap();
        assert_eq!(e.boss_distance(), 10);

        e.state.cycles += e.config().boss_approach_interval * 3.0;
        e.update();
        assert_eq!(e.boss_distance(), 7);

        e.state.boss.battles_won = 7;
        e.update();
        assert_eq!(e.game_state(), GameState::BossFightIntro);
    }

    #[test]
    fn test_boss_fight_lifecycle() {
        let mut e = playing();
        assert!(e.engage_boss().is_err());
        e.state.boss.available = true;
        e.engage_boss().unwrap();
        assert_eq!(e.game_state(), GameState::BossFightIntro);
        assert!(e.toggle_module("ISASM").is_err());
        e.start_boss_fight().unwrap();
        assert_eq!(e.game_state(), GameState::BossFight);

        let boss = e.content().boss.unwrap();
        assert!(e.state().active_battles.contains(&boss));
        // Boss threat counts while fighting.
        assert_eq!(e.attributes().danger, 1010.0);

        e.state.battles[boss.0].level = 4;
        e.state.battles[boss.0].xp = 0.1;
        e.update();
        assert_eq!(e.game_state(), GameState::BossDefeated);
    }

    #[test]
    fn test_boss_fight_can_kill_station() {
        let mut e = playing();
        e.state.boss.available = true;
        e.engage_boss().unwrap();
        e.start_boss_fight().unwrap();
        e.state.population = 1.2;
        e.update();
        assert_eq!(e.game_state(), GameState::Dead);
        assert!(e.state().population >= 1.0);
    }

    #[test]
    fn test_registered_multiplier_applies() {
        let mut e = playing();
        // 10 * 1.05 industry bonus, rounded
        assert_eq!(e.operation_xp_gain("StandbyGenerator"), Some(11.0));
        e.register_xp_multiplier(
            MultiplierTarget::Operation("StandbyGenerator".into()),
            XpMultiplier::Constant { factor: 2.0 },
        )
        .unwrap();
        assert_eq!(e.operation_xp_gain("StandbyGenerator"), Some(21.0));
        assert_eq!(e.operation_xp_gain("Garbage"), Some(11.0));
        assert!(e
            .register_xp_multiplier(
                MultiplierTarget::Operation("Nope".into()),
                XpMultiplier::LevelBonus
            )
            .is_err());
    }

    #[test]
    fn test_describe_operation_uses_point_of_interest() {
        let mut e = playing();
        let diesel = e.content().operation_id("Diesel").unwrap();
        e.state.operations[diesel.0].level = 1;
        assert_eq!(
            e.describe_operation("Diesel").as_deref(),
            Some("+5.00 Research, +5.00 Energy")
        );
    }
}
