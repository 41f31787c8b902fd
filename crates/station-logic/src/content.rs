//! Station content: the static catalogue of everything that can exist.
//!
//! Content is authored as JSON ([`ContentDefinition`]) and resolved once into
//! [`Content`], where every cross-reference is an index and every effect type
//! a registered [`EffectTypeId`]. Resolution fails on the first authoring
//! defect (unknown effect type, dangling reference, duplicate name), so the
//! engine can treat content as well-formed from then on.
//!
//! Names are unique across all entity kinds; saves and requirements refer to
//! entities by name.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeKind;
use crate::effects::{
    EffectDefinition, EffectHolder, EffectSource, EffectTypeId, EffectTypeRegistry, Modifier,
    Operator,
};
use crate::progression::{LayerLimit, XpMultiplier};
use crate::requirements::{Condition, Requirement, RequirementId, RequirementScope};

// ── Authored definitions ──

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDefinition {
    pub effect_types: Vec<EffectTypeSpec>,
    pub attributes: AttributeSpec,
    pub grid_strength: GridStrengthSpec,
    pub operations: Vec<OperationSpec>,
    pub components: Vec<ComponentSpec>,
    pub modules: Vec<ModuleSpec>,
    #[serde(default)]
    pub module_categories: Vec<CategorySpec>,
    #[serde(default)]
    pub factions: Vec<FactionSpec>,
    #[serde(default)]
    pub battles: Vec<BattleSpec>,
    #[serde(default)]
    pub boss: Option<BossSpec>,
    /// Each entry unlocks one more visible battle.
    #[serde(default)]
    pub battle_slots: Vec<GateSpec>,
    pub points_of_interest: Vec<PointOfInterestSpec>,
    #[serde(default)]
    pub sectors: Vec<SectorSpec>,
    pub default_modules: Vec<String>,
    pub default_point_of_interest: String,
    /// Multipliers applied to every operation after the max-level bonus.
    #[serde(default)]
    pub operation_xp_multipliers: Vec<XpMultiplier>,
    /// Multipliers applied to every battle after the max-level bonus.
    #[serde(default)]
    pub battle_xp_multipliers: Vec<XpMultiplier>,
    /// Requirement keys whose latch survives prestige.
    #[serde(default)]
    pub permanent_unlocks: Vec<String>,
    /// Named gates for front-end features.
    #[serde(default)]
    pub unlocks: Vec<UnlockSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectTypeSpec {
    pub name: String,
    pub operator: Operator,
    pub description: String,
}

/// Effect type names summed into each attribute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeSpec {
    pub danger: Vec<String>,
    pub energy: Vec<String>,
    pub growth: Vec<String>,
    pub industry: Vec<String>,
    pub military: Vec<String>,
    pub research: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectSpec {
    pub effect_type: String,
    pub base_value: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateSpec {
    #[serde(default)]
    pub scope: RequirementScope,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridStrengthSpec {
    pub name: String,
    pub title: String,
    pub max_xp: f64,
    #[serde(default)]
    pub xp_multipliers: Vec<XpMultiplier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSpec {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub max_xp: f64,
    pub grid_load: u32,
    pub effects: Vec<EffectSpec>,
    #[serde(default)]
    pub requirements: Option<GateSpec>,
    #[serde(default)]
    pub xp_multipliers: Vec<XpMultiplier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    pub title: String,
    pub operations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    pub title: String,
    pub components: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    pub title: String,
    pub modules: Vec<String>,
    #[serde(default)]
    pub requirements: Option<GateSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactionSpec {
    pub name: String,
    pub title: String,
    pub max_xp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleSpec {
    pub name: String,
    pub title: String,
    pub faction: String,
    pub target_level: u32,
    pub effects: Vec<EffectSpec>,
    #[serde(default)]
    pub rewards: Vec<EffectSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BossSpec {
    pub name: String,
    pub title: String,
    pub faction: String,
    /// `None` for a boss that never runs out of layers.
    #[serde(default)]
    pub layers: Option<u32>,
    pub effects: Vec<EffectSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierSpec {
    pub modifies: Vec<String>,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointOfInterestSpec {
    pub name: String,
    pub title: String,
    pub effects: Vec<EffectSpec>,
    #[serde(default)]
    pub modifiers: Vec<ModifierSpec>,
    #[serde(default)]
    pub requirements: Option<GateSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorSpec {
    pub name: String,
    pub title: String,
    pub points_of_interest: Vec<String>,
    #[serde(default)]
    pub requirements: Option<GateSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockSpec {
    pub name: String,
    #[serde(flatten)]
    pub gate: GateSpec,
}

// ── Errors ──

/// Content authoring defect. Fatal at load.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentError {
    Parse(String),
    DuplicateEffectType(String),
    UnknownEffectType { owner: String, name: String },
    DuplicateName(String),
    UnknownReference {
        owner: String,
        kind: &'static str,
        name: String,
    },
    /// An operation or component listed by more than one parent.
    MultipleParents { child: String, first: String, second: String },
    /// An operation or component no parent lists.
    Orphan(String),
    EmptyComponent(String),
    InvalidMaxXp { name: String, value: f64 },
    NoPointsOfInterest,
    /// More effect types than an [`EffectTypeId`](crate::effects::EffectTypeId) can address.
    TooManyEffectTypes(usize),
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentError::Parse(e) => write!(f, "content parse error: {e}"),
            ContentError::DuplicateEffectType(name) => {
                write!(f, "effect type '{name}' registered twice")
            }
            ContentError::UnknownEffectType { owner, name } => {
                write!(f, "'{owner}' uses unknown effect type '{name}'")
            }
            ContentError::DuplicateName(name) => write!(f, "name '{name}' is used twice"),
            ContentError::UnknownReference { owner, kind, name } => {
                write!(f, "'{owner}' references unknown {kind} '{name}'")
            }
            ContentError::MultipleParents {
                child,
                first,
                second,
            } => write!(f, "'{child}' is listed by both '{first}' and '{second}'"),
            ContentError::Orphan(name) => write!(f, "'{name}' is not listed by any parent"),
            ContentError::EmptyComponent(name) => write!(f, "component '{name}' has no operations"),
            ContentError::InvalidMaxXp { name, value } => {
                write!(f, "'{name}' has invalid max xp {value}")
            }
            ContentError::NoPointsOfInterest => write!(f, "content defines no points of interest"),
            ContentError::TooManyEffectTypes(count) => {
                write!(f, "effect type limit of {count} reached")
            }
        }
    }
}

impl std::error::Error for ContentError {}

impl From<serde_json::Error> for ContentError {
    fn from(e: serde_json::Error) -> Self {
        ContentError::Parse(e.to_string())
    }
}

// ── Resolved content ──

macro_rules! content_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            pub struct $name(pub usize);
        )*
    };
}

content_id!(
    /// Index into [`Content::operations`].
    OperationId,
    ComponentId,
    ModuleId,
    CategoryId,
    FactionId,
    /// Index into [`Content::battles`]; includes the boss.
    BattleId,
    PointOfInterestId,
    SectorId,
);

/// What a content name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    GridStrength,
    Operation(OperationId),
    Component(ComponentId),
    Module(ModuleId),
    Category(CategoryId),
    Faction(FactionId),
    Battle(BattleId),
    PointOfInterest(PointOfInterestId),
    Sector(SectorId),
    Unlock(RequirementId),
}

#[derive(Debug, Clone)]
pub struct GridStrengthDef {
    pub name: String,
    pub title: String,
    pub base_max_xp: f64,
    pub xp_multipliers: Vec<XpMultiplier>,
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub name: String,
    pub title: String,
    pub description: String,
    pub base_max_xp: f64,
    pub grid_load: u32,
    pub effects: Vec<EffectDefinition>,
    pub requirement: Option<RequirementId>,
    pub xp_multipliers: Vec<XpMultiplier>,
    pub component: ComponentId,
    pub module: ModuleId,
}

#[derive(Debug, Clone)]
pub struct Component {
    pub name: String,
    pub title: String,
    pub operations: Vec<OperationId>,
    pub module: ModuleId,
}

#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub title: String,
    pub components: Vec<ComponentId>,
    pub category: Option<CategoryId>,
}

#[derive(Debug, Clone)]
pub struct ModuleCategory {
    pub name: String,
    pub title: String,
    pub modules: Vec<ModuleId>,
    pub requirement: Option<RequirementId>,
}

#[derive(Debug, Clone)]
pub struct Faction {
    pub name: String,
    pub title: String,
    pub base_max_xp: f64,
}

#[derive(Debug, Clone)]
pub struct Battle {
    pub name: String,
    pub title: String,
    pub faction: FactionId,
    /// Copied from the faction.
    pub base_max_xp: f64,
    pub layers: LayerLimit,
    /// Threat while the battle is being fought.
    pub effects: Vec<EffectDefinition>,
    /// Permanent bonus once the battle is won.
    pub rewards: Vec<EffectDefinition>,
    pub is_boss: bool,
}

impl Battle {
    pub fn reward_source(&self) -> EffectSource<'_> {
        EffectSource::new(&self.name, &self.rewards, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct PointOfInterest {
    pub name: String,
    pub title: String,
    pub effects: Vec<EffectDefinition>,
    pub modifiers: Vec<Modifier>,
    pub requirement: Option<RequirementId>,
    pub sector: Option<SectorId>,
}

#[derive(Debug, Clone)]
pub struct Sector {
    pub name: String,
    pub title: String,
    pub points_of_interest: Vec<PointOfInterestId>,
    pub requirement: Option<RequirementId>,
}

impl EffectHolder for Operation {
    fn holder_name(&self) -> &str {
        &self.name
    }
    fn effects(&self) -> &[EffectDefinition] {
        &self.effects
    }
}

impl EffectHolder for Battle {
    fn holder_name(&self) -> &str {
        &self.name
    }
    fn effects(&self) -> &[EffectDefinition] {
        &self.effects
    }
}

impl EffectHolder for PointOfInterest {
    fn holder_name(&self) -> &str {
        &self.name
    }
    fn effects(&self) -> &[EffectDefinition] {
        &self.effects
    }
}

/// Resolved, validated content.
#[derive(Debug, Clone)]
pub struct Content {
    pub effect_types: EffectTypeRegistry,
    attribute_types: HashMap<AttributeKind, Vec<EffectTypeId>>,
    pub grid_strength: GridStrengthDef,
    pub operations: Vec<Operation>,
    pub components: Vec<Component>,
    pub modules: Vec<Module>,
    pub categories: Vec<ModuleCategory>,
    pub factions: Vec<Faction>,
    pub battles: Vec<Battle>,
    pub boss: Option<BattleId>,
    pub battle_slots: Vec<RequirementId>,
    pub points_of_interest: Vec<PointOfInterest>,
    pub sectors: Vec<Sector>,
    pub default_modules: Vec<ModuleId>,
    pub default_point_of_interest: PointOfInterestId,
    pub operation_xp_multipliers: Vec<XpMultiplier>,
    pub battle_xp_multipliers: Vec<XpMultiplier>,
    pub permanent_unlocks: Vec<String>,
    pub unlocks: Vec<RequirementId>,
    /// Blueprint for a fresh requirement book.
    pub requirements: Vec<Requirement>,
    names: HashMap<String, EntityRef>,
}

impl Content {
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let definition: ContentDefinition = serde_json::from_str(json)?;
        Self::from_definition(definition)
    }

    pub fn from_definition(def: ContentDefinition) -> Result<Self, ContentError> {
        let content = Resolver::default().resolve(def)?;
        log::debug!(
            "Resolved content: {} effect types, {} operations, {} battles, {} requirements",
            content.effect_types.len(),
            content.operations.len(),
            content.battles.len(),
            content.requirements.len()
        );
        Ok(content)
    }

    pub fn lookup(&self, name: &str) -> Option<EntityRef> {
        self.names.get(name).copied()
    }

    /// Effect types that make up an attribute. Empty for derived attributes.
    pub fn attribute_types(&self, kind: AttributeKind) -> &[EffectTypeId] {
        self.attribute_types
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn operation(&self, id: OperationId) -> &Operation {
        &self.operations[id.0]
    }

    pub fn component(&self, id: ComponentId) -> &Component {
        &self.components[id.0]
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    pub fn battle(&self, id: BattleId) -> &Battle {
        &self.battles[id.0]
    }

    pub fn point_of_interest(&self, id: PointOfInterestId) -> &PointOfInterest {
        &self.points_of_interest[id.0]
    }

    pub fn operation_id(&self, name: &str) -> Option<OperationId> {
        match self.lookup(name) {
            Some(EntityRef::Operation(id)) => Some(id),
            _ => None,
        }
    }

    pub fn component_id(&self, name: &str) -> Option<ComponentId> {
        match self.lookup(name) {
            Some(EntityRef::Component(id)) => Some(id),
            _ => None,
        }
    }

    pub fn module_id(&self, name: &str) -> Option<ModuleId> {
        match self.lookup(name) {
            Some(EntityRef::Module(id)) => Some(id),
            _ => None,
        }
    }

    pub fn battle_id(&self, name: &str) -> Option<BattleId> {
        match self.lookup(name) {
            Some(EntityRef::Battle(id)) => Some(id),
            _ => None,
        }
    }

    pub fn point_of_interest_id(&self, name: &str) -> Option<PointOfInterestId> {
        match self.lookup(name) {
            Some(EntityRef::PointOfInterest(id)) => Some(id),
            _ => None,
        }
    }

    pub fn faction_id(&self, name: &str) -> Option<FactionId> {
        match self.lookup(name) {
            Some(EntityRef::Faction(id)) => Some(id),
            _ => None,
        }
    }

    /// Battles other than the boss, in content order.
    pub fn regular_battles(&self) -> impl Iterator<Item = (BattleId, &Battle)> {
        self.battles
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_boss)
            .map(|(i, b)| (BattleId(i), b))
    }
}

/// Builds [`Content`] from a definition, collecting names as it goes.
#[derive(Default)]
struct Resolver {
    registry: EffectTypeRegistry,
    names: HashMap<String, EntityRef>,
    requirements: Vec<Requirement>,
    requirement_keys: HashMap<String, RequirementId>,
}

impl Resolver {
    fn claim(&mut self, name: &str, entity: EntityRef) -> Result<(), ContentError> {
        if self.names.insert(name.to_string(), entity).is_some() {
            return Err(ContentError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn effects(&self, owner: &str, specs: &[EffectSpec]) -> Result<Vec<EffectDefinition>, ContentError> {
        specs
            .iter()
            .map(|entry| {
                Ok(EffectDefinition {
                    effect_type: self.registry.resolve(owner, &entry.effect_type)?,
                    base_value: entry.base_value,
                })
            })
            .collect()
    }

    fn gate(&mut self, key: &str, gate: Option<&GateSpec>) -> Result<Option<RequirementId>, ContentError> {
        let Some(gate) = gate else {
            return Ok(None);
        };
        if self.requirement_keys.contains_key(key) {
            return Err(ContentError::DuplicateName(key.to_string()));
        }
        let id = RequirementId(self.requirements.len());
        self.requirements
            .push(Requirement::new(key, gate.scope, gate.conditions.clone()));
        self.requirement_keys.insert(key.to_string(), id);
        Ok(Some(id))
    }

    fn reference<T>(
        &self,
        owner: &str,
        kind: &'static str,
        name: &str,
        pick: impl Fn(EntityRef) -> Option<T>,
    ) -> Result<T, ContentError> {
        self.names
            .get(name)
            .copied()
            .and_then(pick)
            .ok_or_else(|| ContentError::UnknownReference {
                owner: owner.to_string(),
                kind,
                name: name.to_string(),
            })
    }

    fn resolve(mut self, def: ContentDefinition) -> Result<Content, ContentError> {
        for entry in &def.effect_types {
            self.registry
                .register(entry.name.clone(), entry.operator, entry.description.clone())?;
        }

        let mut attribute_types = HashMap::new();
        for (kind, names) in [
            (AttributeKind::Danger, &def.attributes.danger),
            (AttributeKind::Energy, &def.attributes.energy),
            (AttributeKind::Growth, &def.attributes.growth),
            (AttributeKind::Industry, &def.attributes.industry),
            (AttributeKind::Military, &def.attributes.military),
            (AttributeKind::Research, &def.attributes.research),
        ] {
            let ids = names
                .iter()
                .map(|n| self.registry.resolve(kind.label(), n))
                .collect::<Result<Vec<_>, _>>()?;
            attribute_types.insert(kind, ids);
        }

        check_max_xp(&def.grid_strength.name, def.grid_strength.max_xp)?;
        self.claim(&def.grid_strength.name, EntityRef::GridStrength)?;
        let grid_strength = GridStrengthDef {
            name: def.grid_strength.name.clone(),
            title: def.grid_strength.title.clone(),
            base_max_xp: def.grid_strength.max_xp,
            xp_multipliers: def.grid_strength.xp_multipliers.clone(),
        };

        // Operations first; parents are patched in once components resolve.
        let mut operations = Vec::with_capacity(def.operations.len());
        for (i, spec) in def.operations.iter().enumerate() {
            check_max_xp(&spec.name, spec.max_xp)?;
            self.claim(&spec.name, EntityRef::Operation(OperationId(i)))?;
            operations.push(Operation {
                name: spec.name.clone(),
                title: spec.title.clone(),
                description: spec.description.clone(),
                base_max_xp: spec.max_xp,
                grid_load: spec.grid_load,
                effects: self.effects(&spec.name, &spec.effects)?,
                requirement: self.gate(&spec.name, spec.requirements.as_ref())?,
                xp_multipliers: spec.xp_multipliers.clone(),
                component: ComponentId(usize::MAX),
                module: ModuleId(usize::MAX),
            });
        }

        let mut operation_parent: Vec<Option<ComponentId>> = vec![None; operations.len()];
        let mut components = Vec::with_capacity(def.components.len());
        for (i, spec) in def.components.iter().enumerate() {
            let id = ComponentId(i);
            self.claim(&spec.name, EntityRef::Component(id))?;
            if spec.operations.is_empty() {
                return Err(ContentError::EmptyComponent(spec.name.clone()));
            }
            let mut ops = Vec::with_capacity(spec.operations.len());
            for op_name in &spec.operations {
                let op = self.reference(&spec.name, "operation", op_name, |e| match e {
                    EntityRef::Operation(id) => Some(id),
                    _ => None,
                })?;
                if let Some(first) = operation_parent[op.0] {
                    return Err(ContentError::MultipleParents {
                        child: op_name.clone(),
                        first: def.components[first.0].name.clone(),
                        second: spec.name.clone(),
                    });
                }
                operation_parent[op.0] = Some(id);
                operations[op.0].component = id;
                ops.push(op);
            }
            components.push(Component {
                name: spec.name.clone(),
                title: spec.title.clone(),
                operations: ops,
                module: ModuleId(usize::MAX),
            });
        }
        if let Some(orphan) = operation_parent.iter().position(Option::is_none) {
            return Err(ContentError::Orphan(operations[orphan].name.clone()));
        }

        let mut component_parent: Vec<Option<ModuleId>> = vec![None; components.len()];
        let mut modules = Vec::with_capacity(def.modules.len());
        for (i, spec) in def.modules.iter().enumerate() {
            let id = ModuleId(i);
            self.claim(&spec.name, EntityRef::Module(id))?;
            let mut comps = Vec::with_capacity(spec.components.len());
            for comp_name in &spec.components {
                let comp = self.reference(&spec.name, "component", comp_name, |e| match e {
                    EntityRef::Component(id) => Some(id),
                    _ => None,
                })?;
                if let Some(first) = component_parent[comp.0] {
                    return Err(ContentError::MultipleParents {
                        child: comp_name.clone(),
                        first: def.modules[first.0].name.clone(),
                        second: spec.name.clone(),
                    });
                }
                component_parent[comp.0] = Some(id);
                components[comp.0].module = id;
                for op in &components[comp.0].operations {
                    operations[op.0].module = id;
                }
                comps.push(comp);
            }
            modules.push(Module {
                name: spec.name.clone(),
                title: spec.title.clone(),
                components: comps,
                category: None,
            });
        }
        if let Some(orphan) = component_parent.iter().position(Option::is_none) {
            return Err(ContentError::Orphan(components[orphan].name.clone()));
        }

        let mut categories = Vec::with_capacity(def.module_categories.len());
        for (i, spec) in def.module_categories.iter().enumerate() {
            let id = CategoryId(i);
            self.claim(&spec.name, EntityRef::Category(id))?;
            let mut members = Vec::with_capacity(spec.modules.len());
            for module_name in &spec.modules {
                let module = self.reference(&spec.name, "module", module_name, |e| match e {
                    EntityRef::Module(id) => Some(id),
                    _ => None,
                })?;
                if let Some(first) = modules[module.0].category {
                    return Err(ContentError::MultipleParents {
                        child: module_name.clone(),
                        first: def.module_categories[first.0].name.clone(),
                        second: spec.name.clone(),
                    });
                }
                modules[module.0].category = Some(id);
                members.push(module);
            }
            categories.push(ModuleCategory {
                name: spec.name.clone(),
                title: spec.title.clone(),
                modules: members,
                requirement: self.gate(&spec.name, spec.requirements.as_ref())?,
            });
        }

        let mut factions = Vec::with_capacity(def.factions.len());
        for (i, spec) in def.factions.iter().enumerate() {
            check_max_xp(&spec.name, spec.max_xp)?;
            self.claim(&spec.name, EntityRef::Faction(FactionId(i)))?;
            factions.push(Faction {
                name: spec.name.clone(),
                title: spec.title.clone(),
                base_max_xp: spec.max_xp,
            });
        }

        let mut battles = Vec::with_capacity(def.battles.len() + 1);
        for spec in &def.battles {
            let id = BattleId(battles.len());
            self.claim(&spec.name, EntityRef::Battle(id))?;
            let faction = self.faction(&spec.name, &spec.faction)?;
            battles.push(Battle {
                name: spec.name.clone(),
                title: spec.title.clone(),
                faction,
                base_max_xp: factions[faction.0].base_max_xp,
                layers: LayerLimit::Finite(spec.target_level),
                effects: self.effects(&spec.name, &spec.effects)?,
                rewards: self.effects(&spec.name, &spec.rewards)?,
                is_boss: false,
            });
        }
        let boss = match &def.boss {
            Some(spec) => {
                let id = BattleId(battles.len());
                self.claim(&spec.name, EntityRef::Battle(id))?;
                let faction = self.faction(&spec.name, &spec.faction)?;
                battles.push(Battle {
                    name: spec.name.clone(),
                    title: spec.title.clone(),
                    faction,
                    base_max_xp: factions[faction.0].base_max_xp,
                    layers: spec.layers.map_or(LayerLimit::Unlimited, LayerLimit::Finite),
                    effects: self.effects(&spec.name, &spec.effects)?,
                    rewards: Vec::new(),
                    is_boss: true,
                });
                Some(id)
            }
            None => None,
        };

        let mut battle_slots = Vec::with_capacity(def.battle_slots.len());
        for (i, gate) in def.battle_slots.iter().enumerate() {
            let key = format!("battleSlot{}", i + 1);
            if let Some(id) = self.gate(&key, Some(gate))? {
                battle_slots.push(id);
            }
        }

        if def.points_of_interest.is_empty() {
            return Err(ContentError::NoPointsOfInterest);
        }
        let mut points_of_interest = Vec::with_capacity(def.points_of_interest.len());
        for (i, spec) in def.points_of_interest.iter().enumerate() {
            self.claim(&spec.name, EntityRef::PointOfInterest(PointOfInterestId(i)))?;
            let effects = self.effects(&spec.name, &spec.effects)?;
            let requirement = self.gate(&spec.name, spec.requirements.as_ref())?;
            points_of_interest.push(PointOfInterest {
                name: spec.name.clone(),
                title: spec.title.clone(),
                effects,
                modifiers: Vec::new(),
                requirement,
                sector: None,
            });
        }
        // Modifiers may name holders declared anywhere, so resolve them last.
        for (i, spec) in def.points_of_interest.iter().enumerate() {
            let modifiers = spec
                .modifiers
                .iter()
                .map(|m| self.modifier(&spec.name, m))
                .collect::<Result<Vec<_>, _>>()?;
            points_of_interest[i].modifiers = modifiers;
        }

        let mut sectors = Vec::with_capacity(def.sectors.len());
        for (i, spec) in def.sectors.iter().enumerate() {
            let id = SectorId(i);
            self.claim(&spec.name, EntityRef::Sector(id))?;
            let mut members = Vec::with_capacity(spec.points_of_interest.len());
            for poi_name in &spec.points_of_interest {
                let poi = self.reference(&spec.name, "point of interest", poi_name, |e| match e {
                    EntityRef::PointOfInterest(id) => Some(id),
                    _ => None,
                })?;
                if let Some(first) = points_of_interest[poi.0].sector {
                    return Err(ContentError::MultipleParents {
                        child: poi_name.clone(),
                        first: def.sectors[first.0].name.clone(),
                        second: spec.name.clone(),
                    });
                }
                points_of_interest[poi.0].sector = Some(id);
                members.push(poi);
            }
            sectors.push(Sector {
                name: spec.name.clone(),
                title: spec.title.clone(),
                points_of_interest: members,
                requirement: self.gate(&spec.name, spec.requirements.as_ref())?,
            });
        }

        let mut unlocks = Vec::with_capacity(def.unlocks.len());
        for spec in &def.unlocks {
            if let Some(id) = self.gate(&spec.name, Some(&spec.gate))? {
                self.claim(&spec.name, EntityRef::Unlock(id))?;
                unlocks.push(id);
            }
        }

        let default_modules = def
            .default_modules
            .iter()
            .map(|name| {
                self.reference("defaultModules", "module", name, |e| match e {
                    EntityRef::Module(id) => Some(id),
                    _ => None,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let default_point_of_interest = self.reference(
            "defaultPointOfInterest",
            "point of interest",
            &def.default_point_of_interest,
            |e| match e {
                EntityRef::PointOfInterest(id) => Some(id),
                _ => None,
            },
        )?;

        if let Some(key) = def
            .permanent_unlocks
            .iter()
            .find(|key| !self.requirement_keys.contains_key(key.as_str()))
        {
            return Err(ContentError::UnknownReference {
                owner: "permanentUnlocks".to_string(),
                kind: "requirement",
                name: key.clone(),
            });
        }

        for requirement in &self.requirements {
            for condition in &requirement.conditions {
                self.check_condition(&requirement.key, condition)?;
            }
        }

        Ok(Content {
            effect_types: self.registry,
            attribute_types,
            grid_strength,
            operations,
            components,
            modules,
            categories,
            factions,
            battles,
            boss,
            battle_slots,
            points_of_interest,
            sectors,
            default_modules,
            default_point_of_interest,
            operation_xp_multipliers: def.operation_xp_multipliers,
            battle_xp_multipliers: def.battle_xp_multipliers,
            permanent_unlocks: def.permanent_unlocks,
            unlocks,
            requirements: self.requirements,
            names: self.names,
        })
    }

    fn faction(&self, owner: &str, name: &str) -> Result<FactionId, ContentError> {
        self.reference(owner, "faction", name, |e| match e {
            EntityRef::Faction(id) => Some(id),
            _ => None,
        })
    }

    fn modifier(&self, owner: &str, spec: &ModifierSpec) -> Result<Modifier, ContentError> {
        for holder in &spec.modifies {
            self.reference(owner, "effect holder", holder, |e| match e {
                EntityRef::Operation(_) | EntityRef::Battle(_) => Some(()),
                _ => None,
            })?;
        }
        Ok(Modifier {
            modifies: spec.modifies.clone(),
            from: self.registry.resolve(owner, &spec.from)?,
            to: self.registry.resolve(owner, &spec.to)?,
        })
    }

    fn check_condition(&self, owner: &str, condition: &Condition) -> Result<(), ContentError> {
        match condition {
            Condition::TaskLevel { task, .. } => self
                .reference(owner, "task", task, |e| match e {
                    EntityRef::GridStrength | EntityRef::Operation(_) | EntityRef::Battle(_) => {
                        Some(())
                    }
                    _ => None,
                }),
            Condition::FactionLevel { faction, .. } => self.faction(owner, faction).map(|_| ()),
            Condition::StoredResource { .. }
            | Condition::Age { .. }
            | Condition::AttributeValue { .. } => Ok(()),
        }
    }
}

fn check_max_xp(name: &str, value: f64) -> Result<(), ContentError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ContentError::InvalidMaxXp {
            name: name.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> serde_json::Value {
        serde_json::json!({
            "effectTypes": [
                {"name": "Danger", "operator": "+", "description": "Danger"},
                {"name": "Energy", "operator": "+", "description": "Energy"},
                {"name": "Growth", "operator": "x", "description": "Growth"},
                {"name": "Research", "operator": "+", "description": "Research"}
            ],
            "attributes": {"danger": ["Danger"], "energy": ["Energy"], "growth": ["Growth"], "research": ["Research"]},
            "gridStrength": {"name": "GridStrength", "title": "Grid Strength", "maxXp": 100},
            "operations": [
                {"name": "Standby", "title": "Standby", "maxXp": 100, "gridLoad": 0,
                 "effects": [{"effectType": "Energy", "baseValue": 0.5}]},
                {"name": "Lab", "title": "Lab", "maxXp": 100, "gridLoad": 1,
                 "effects": [{"effectType": "Growth", "baseValue": 0.1}],
                 "requirements": {"conditions": [{"type": "attributeValue", "attribute": "gridStrength", "value": 1}]}}
            ],
            "components": [{"name": "Capsule", "title": "Capsule", "operations": ["Standby", "Lab"]}],
            "modules": [{"name": "Core", "title": "Core", "components": ["Capsule"]}],
            "pointsOfInterest": [
                {"name": "Home", "title": "Home", "effects": [{"effectType": "Danger", "baseValue": 10}],
                 "modifiers": [{"modifies": ["Lab"], "from": "Growth", "to": "Research"}]}
            ],
            "defaultModules": ["Core"],
            "defaultPointOfInterest": "Home"
        })
    }

    fn resolve(value: serde_json::Value) -> Result<Content, ContentError> {
        Content::from_json(&value.to_string())
    }

    #[test]
    fn test_minimal_resolves() {
        let content = resolve(minimal()).unwrap();
        let lab = content.operation_id("Lab").unwrap();
        let capsule = content.component_id("Capsule").unwrap();
        assert_eq!(content.operation(lab).component, capsule);
        assert_eq!(content.operation(lab).module, content.module_id("Core").unwrap());
        assert!(content.operation(lab).requirement.is_some());
        assert_eq!(content.requirements.len(), 1);
        assert!(content.attribute_types(AttributeKind::Military).is_empty());
        assert_eq!(content.attribute_types(AttributeKind::Danger).len(), 1);
        assert_eq!(content.lookup("GridStrength"), Some(EntityRef::GridStrength));
    }

    #[test]
    fn test_unknown_effect_type() {
        let mut v = minimal();
        v["operations"][0]["effects"][0]["effectType"] = "Mana".into();
        assert_eq!(
            resolve(v).unwrap_err(),
            ContentError::UnknownEffectType {
                owner: "Standby".into(),
                name: "Mana".into()
            }
        );
    }

    #[test]
    fn test_dangling_modifier_holder() {
        let mut v = minimal();
        v["pointsOfInterest"][0]["modifiers"][0]["modifies"] = serde_json::json!(["Ghost"]);
        assert!(matches!(
            resolve(v).unwrap_err(),
            ContentError::UnknownReference { kind: "effect holder", .. }
        ));
    }

    #[test]
    fn test_duplicate_names_across_kinds() {
        let mut v = minimal();
        v["modules"][0]["name"] = "Lab".into();
        assert_eq!(resolve(v).unwrap_err(), ContentError::DuplicateName("Lab".into()));
    }

    #[test]
    fn test_operation_in_two_components() {
        let mut v = minimal();
        v["components"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({"name": "Other", "title": "Other", "operations": ["Lab"]}));
        v["modules"][0]["components"] = serde_json::json!(["Capsule", "Other"]);
        assert!(matches!(
            resolve(v).unwrap_err(),
            ContentError::MultipleParents { .. }
        ));
    }

    #[test]
    fn test_orphan_operation() {
        let mut v = minimal();
        v["components"][0]["operations"] = serde_json::json!(["Standby"]);
        assert_eq!(resolve(v).unwrap_err(), ContentError::Orphan("Lab".into()));
    }

    #[test]
    fn test_zero_max_xp_rejected() {
        let mut v = minimal();
        v["operations"][1]["maxXp"] = 0.into();
        assert!(matches!(
            resolve(v).unwrap_err(),
            ContentError::InvalidMaxXp { .. }
        ));
    }

    #[test]
    fn test_unknown_default_point_of_interest() {
        let mut v = minimal();
        v["defaultPointOfInterest"] = "Nowhere".into();
        assert!(matches!(
            resolve(v).unwrap_err(),
            ContentError::UnknownReference { kind: "point of interest", .. }
        ));
    }

    #[test]
    fn test_unknown_permanent_unlock() {
        let mut v = minimal();
        v["permanentUnlocks"] = serde_json::json!(["Lab"]);
        assert!(resolve(v.clone()).is_ok());

        v["permanentUnlocks"] = serde_json::json!(["Lab", "Labb"]);
        match resolve(v).unwrap_err() {
            ContentError::UnknownReference { owner, kind, name } => {
                assert_eq!(owner, "permanentUnlocks");
                assert_eq!(kind, "requirement");
                assert_eq!(name, "Labb");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_task_condition_must_name_task() {
        let mut v = minimal();
        v["operations"][1]["requirements"]["conditions"] =
            serde_json::json!([{"type": "taskLevel", "task": "Core", "level": 3}]);
        assert!(matches!(
            resolve(v).unwrap_err(),
            ContentError::UnknownReference { kind: "task", .. }
        ));
    }

    #[test]
    fn test_boss_and_battle_slots() {
        let mut v = minimal();
        v["factions"] = serde_json::json!([{"name": "Goblins", "title": "Goblins", "maxXp": 50}]);
        v["battles"] = serde_json::json!([
            {"name": "Goblins10", "title": "Wimpy", "faction": "Goblins", "targetLevel": 10,
             "effects": [{"effectType": "Danger", "baseValue": 10}],
             "rewards": [{"effectType": "Research", "baseValue": 2}]}
        ]);
        v["boss"] = serde_json::json!({"name": "Destroyer", "title": "Destroyer", "faction": "Goblins",
            "layers": 5, "effects": [{"effectType": "Danger", "baseValue": 100}]});
        v["battleSlots"] = serde_json::json!([
            {"conditions": [{"type": "attributeValue", "attribute": "research", "value": 10}]}
        ]);
        let content = resolve(v).unwrap();
        let boss = content.boss.unwrap();
        assert!(content.battle(boss).is_boss);
        assert_eq!(content.battle(boss).layers, LayerLimit::Finite(5));
        assert_eq!(content.regular_battles().count(), 1);
        assert_eq!(content.battle_slots.len(), 1);
        assert_eq!(content.battle(BattleId(0)).base_max_xp, 50.0);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            Content::from_json("{not json").unwrap_err(),
            ContentError::Parse(_)
        ));
    }
}
