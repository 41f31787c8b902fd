//! Effect types and the effect combination algebra.
//!
//! Every producer on the station (operations, battles, the selected point of
//! interest) declares a list of [`EffectDefinition`]s. Each definition targets
//! one registered [`EffectType`], which is either additive (`+`, identity 0)
//! or multiplicative (`x`, identity 1).
//!
//! Totals across several effect types follow one asymmetric rule: additive
//! partials are summed, multiplicative partials are multiplied, and the two
//! are multiplied together, unless no additive type was requested at all, in
//! which case the multiplicative product is returned directly.
//!
//! ```
//! use station_logic::effects::{combine_totals, EffectTypeRegistry, Operator};
//!
//! let mut registry = EffectTypeRegistry::new();
//! let growth = registry.register("Growth", Operator::Multiply, "Growth").unwrap();
//!
//! // Only multiplicative types requested: no implicit multiplication with 0.
//! let total = combine_totals(&registry, &[growth], |_| 2.5);
//! assert_eq!(total, 2.5);
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content::ContentError;

/// How values of an effect type are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "x")]
    Multiply,
}

impl Operator {
    /// Neutral element: 0 for `+`, 1 for `x`.
    pub fn identity(self) -> f64 {
        match self {
            Operator::Add => 0.0,
            Operator::Multiply => 1.0,
        }
    }

    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            Operator::Add => a + b,
            Operator::Multiply => a * b,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Multiply => "x",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Opaque handle minted by an [`EffectTypeRegistry`].
///
/// Effect types are compared by handle, never by their contents: `Energy`
/// and `EnergyFactor` share a description but are distinct dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EffectTypeId(pub u16);

/// A registered, immutable effect dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectType {
    pub name: String,
    pub operator: Operator,
    pub description: String,
}

impl EffectType {
    pub fn default_value(&self) -> f64 {
        self.operator.identity()
    }

    pub fn combine(&self, a: f64, b: f64) -> f64 {
        self.operator.combine(a, b)
    }
}

/// Append-only registry of effect types.
#[derive(Debug, Clone, Default)]
pub struct EffectTypeRegistry {
    types: Vec<EffectType>,
    by_name: HashMap<String, EffectTypeId>,
}

impl EffectTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new effect type. Names must be unique.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        operator: Operator,
        description: impl Into<String>,
    ) -> Result<EffectTypeId, ContentError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(ContentError::DuplicateEffectType(name));
        }
        let id = u16::try_from(self.types.len())
            .map(EffectTypeId)
            .map_err(|_| ContentError::TooManyEffectTypes(self.types.len()))?;
        self.by_name.insert(name.clone(), id);
        self.types.push(EffectType {
            name,
            operator,
            description: description.into(),
        });
        Ok(id)
    }

    /// Get a registered type. Ids are only minted by this registry.
    pub fn get(&self, id: EffectTypeId) -> &EffectType {
        &self.types[id.0 as usize]
    }

    pub fn lookup(&self, name: &str) -> Option<EffectTypeId> {
        self.by_name.get(name).copied()
    }

    /// Resolve a name from content, reporting which entity referenced it.
    pub fn resolve(&self, owner: &str, name: &str) -> Result<EffectTypeId, ContentError> {
        self.lookup(name)
            .ok_or_else(|| ContentError::UnknownEffectType {
                owner: owner.to_string(),
                name: name.to_string(),
            })
    }

    pub fn operator(&self, id: EffectTypeId) -> Operator {
        self.get(id).operator
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EffectTypeId, &EffectType)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, t)| (EffectTypeId(i as u16), t))
    }
}

/// Static effect declaration attached to a holder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectDefinition {
    pub effect_type: EffectTypeId,
    pub base_value: f64,
}

/// Remaps one effect type to another for specific holders.
///
/// Modifiers belong to a point of interest and only apply while it is the
/// selected one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    /// Names of the holders whose effects are remapped.
    pub modifies: Vec<String>,
    pub from: EffectTypeId,
    pub to: EffectTypeId,
}

impl Modifier {
    pub fn applies_to(&self, holder: &str, effect_type: EffectTypeId) -> bool {
        self.from == effect_type && self.modifies.iter().any(|h| h == holder)
    }
}

/// A producer as seen by the aggregation: its name, effects and level.
#[derive(Debug, Clone, Copy)]
pub struct EffectSource<'a> {
    pub holder: &'a str,
    pub effects: &'a [EffectDefinition],
    pub level: f64,
}

impl<'a> EffectSource<'a> {
    pub fn new(holder: &'a str, effects: &'a [EffectDefinition], level: f64) -> Self {
        Self {
            holder,
            effects,
            level,
        }
    }

    pub fn effect(
        &self,
        registry: &EffectTypeRegistry,
        effect_type: EffectTypeId,
        modifiers: &[Modifier],
    ) -> f64 {
        effect_value(
            registry,
            self.holder,
            effect_type,
            self.effects,
            self.level,
            modifiers,
        )
    }
}

/// Content entity that declares effects.
pub trait EffectHolder {
    fn holder_name(&self) -> &str;
    fn effects(&self) -> &[EffectDefinition];

    fn source(&self, level: f64) -> EffectSource<'_> {
        EffectSource::new(self.holder_name(), self.effects(), level)
    }
}

/// `identity + base_value * level`, for both operators.
pub fn calculate_effect_value(effect_type: &EffectType, base_value: f64, level: f64) -> f64 {
    effect_type.default_value() + base_value * level
}

/// The type an effect actually contributes to once modifiers are applied.
///
/// Only the first matching modifier is used.
pub fn actual_effect_type(
    holder: &str,
    effect: &EffectDefinition,
    modifiers: &[Modifier],
) -> EffectTypeId {
    modifiers
        .iter()
        .find(|m| m.applies_to(holder, effect.effect_type))
        .map_or(effect.effect_type, |m| m.to)
}

/// Value a holder contributes to `effect_type`, or the type's identity if it
/// declares nothing that resolves to it.
pub fn effect_value(
    registry: &EffectTypeRegistry,
    holder: &str,
    effect_type: EffectTypeId,
    effects: &[EffectDefinition],
    level: f64,
    modifiers: &[Modifier],
) -> f64 {
    let target = registry.get(effect_type);
    effects
        .iter()
        .find(|effect| actual_effect_type(holder, effect, modifiers) == effect_type)
        .map_or(target.default_value(), |effect| {
            calculate_effect_value(target, effect.base_value, level)
        })
}

/// Human-readable effect list, e.g. `"+5.00 Industry, x1.50 Growth"`.
pub fn describe(
    registry: &EffectTypeRegistry,
    holder: &str,
    effects: &[EffectDefinition],
    level: f64,
    modifiers: &[Modifier],
) -> String {
    effects
        .iter()
        .map(|effect| {
            let actual = registry.get(actual_effect_type(holder, effect, modifiers));
            format!(
                "{}{:.2} {}",
                actual.operator,
                calculate_effect_value(actual, effect.base_value, level),
                actual.description
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Like [`describe`], skipping effects declared with `exception`.
pub fn describe_except(
    registry: &EffectTypeRegistry,
    holder: &str,
    effects: &[EffectDefinition],
    level: f64,
    modifiers: &[Modifier],
    exception: EffectTypeId,
) -> String {
    let kept: Vec<EffectDefinition> = effects
        .iter()
        .filter(|effect| effect.effect_type != exception)
        .copied()
        .collect();
    describe(registry, holder, &kept, level, modifiers)
}

/// Total of one effect type: identity combined with every producer, then the
/// point of interest.
pub fn single_total(
    registry: &EffectTypeRegistry,
    effect_type: EffectTypeId,
    producers: &[EffectSource<'_>],
    point_of_interest: &EffectSource<'_>,
    modifiers: &[Modifier],
) -> f64 {
    let ty = registry.get(effect_type);
    let produced = producers.iter().fold(ty.default_value(), |acc, source| {
        ty.combine(acc, source.effect(registry, effect_type, modifiers))
    });
    ty.combine(
        produced,
        point_of_interest.effect(registry, effect_type, modifiers),
    )
}

/// Reduce several effect types into one number.
///
/// Additive types are summed (seed 0), multiplicative types multiplied
/// (seed 1), and the partials multiplied together. With no additive types the
/// multiplicative product is returned as is.
pub fn combine_totals(
    registry: &EffectTypeRegistry,
    effect_types: &[EffectTypeId],
    mut single: impl FnMut(EffectTypeId) -> f64,
) -> f64 {
    let mut base = 0.0;
    let mut factor = 1.0;
    let mut additive_count = 0;
    for &id in effect_types {
        match registry.operator(id) {
            Operator::Add => {
                additive_count += 1;
                base += single(id);
            }
            Operator::Multiply => factor *= single(id),
        }
    }

    if additive_count == 0 {
        return factor;
    }
    base * factor
}

/// [`combine_totals`] over [`single_total`].
pub fn total_value(
    registry: &EffectTypeRegistry,
    effect_types: &[EffectTypeId],
    producers: &[EffectSource<'_>],
    point_of_interest: &EffectSource<'_>,
    modifiers: &[Modifier],
) -> f64 {
    combine_totals(registry, effect_types, |id| {
        single_total(registry, id, producers, point_of_interest, modifiers)
    })
}
