//! Derived station attributes.
//!
//! Attributes are never stored authoritatively: they are recomputed from the
//! active producers every tick and kept as a read-only snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every attribute the station exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeKind {
    Danger,
    Energy,
    GridLoad,
    GridStrength,
    Growth,
    Heat,
    Industry,
    Military,
    Population,
    Research,
}

impl AttributeKind {
    /// Attributes computed as a total over effect types.
    pub const EFFECT_BASED: [AttributeKind; 6] = [
        AttributeKind::Danger,
        AttributeKind::Energy,
        AttributeKind::Growth,
        AttributeKind::Industry,
        AttributeKind::Military,
        AttributeKind::Research,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AttributeKind::Danger => "Danger",
            AttributeKind::Energy => "Energy",
            AttributeKind::GridLoad => "Grid Load",
            AttributeKind::GridStrength => "Grid Strength",
            AttributeKind::Growth => "Growth",
            AttributeKind::Heat => "Heat",
            AttributeKind::Industry => "Industry",
            AttributeKind::Military => "Military",
            AttributeKind::Population => "Population",
            AttributeKind::Research => "Research",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of all attribute values after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Attributes {
    pub danger: f64,
    pub energy: f64,
    pub grid_load: f64,
    pub grid_strength: f64,
    pub growth: f64,
    pub heat: f64,
    pub industry: f64,
    pub military: f64,
    pub population: f64,
    pub research: f64,
}

impl Attributes {
    pub fn get(&self, kind: AttributeKind) -> f64 {
        match kind {
            AttributeKind::Danger => self.danger,
            AttributeKind::Energy => self.energy,
            AttributeKind::GridLoad => self.grid_load,
            AttributeKind::GridStrength => self.grid_strength,
            AttributeKind::Growth => self.growth,
            AttributeKind::Heat => self.heat,
            AttributeKind::Industry => self.industry,
            AttributeKind::Military => self.military,
            AttributeKind::Population => self.population,
            AttributeKind::Research => self.research,
        }
    }

    pub fn set(&mut self, kind: AttributeKind, value: f64) {
        let slot = match kind {
            AttributeKind::Danger => &mut self.danger,
            AttributeKind::Energy => &mut self.energy,
            AttributeKind::GridLoad => &mut self.grid_load,
            AttributeKind::GridStrength => &mut self.grid_strength,
            AttributeKind::Growth => &mut self.growth,
            AttributeKind::Heat => &mut self.heat,
            AttributeKind::Industry => &mut self.industry,
            AttributeKind::Military => &mut self.military,
            AttributeKind::Population => &mut self.population,
            AttributeKind::Research => &mut self.research,
        };
        *slot = value;
    }
}
