//! Module and operation activation under the grid capacity.
//!
//! Each component has exactly one selected operation. An operation is
//! *counted-active* (produces effects, loads the grid, gains xp) when it is
//! selected and its module is enabled. Capacity is only checked when
//! something is switched on; a later drop in capacity never switches anything
//! off.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::content::{ComponentId, Content, ModuleId, OperationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridError {
    /// Load after the change would exceed the capacity.
    CapacityExceeded { required: u32, capacity: u32 },
    /// The operation does not belong to the component.
    NotInComponent {
        component: ComponentId,
        operation: OperationId,
    },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::CapacityExceeded { required, capacity } => {
                write!(f, "grid load {required} exceeds capacity {capacity}")
            }
            GridError::NotInComponent {
                component,
                operation,
            } => write!(
                f,
                "operation {} is not part of component {}",
                operation.0, component.0
            ),
        }
    }
}

impl std::error::Error for GridError {}

/// Which modules are enabled and which operation each component runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    enabled_modules: BTreeSet<ModuleId>,
    selected: BTreeMap<ComponentId, OperationId>,
}

impl Activation {
    /// Default modules enabled, every component on its first operation.
    pub fn defaults(content: &Content) -> Self {
        let selected = content
            .components
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.operations.first().map(|op| (ComponentId(i), *op)))
            .collect();
        Self {
            enabled_modules: content.default_modules.iter().copied().collect(),
            selected,
        }
    }

    pub fn is_module_enabled(&self, module: ModuleId) -> bool {
        self.enabled_modules.contains(&module)
    }

    pub fn enabled_modules(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.enabled_modules.iter().copied()
    }

    pub fn selected_operation(&self, component: ComponentId) -> Option<OperationId> {
        self.selected.get(&component).copied()
    }

    pub fn selections(&self) -> impl Iterator<Item = (ComponentId, OperationId)> + '_ {
        self.selected.iter().map(|(c, o)| (*c, *o))
    }

    pub fn is_operation_active(&self, content: &Content, operation: OperationId) -> bool {
        let op = content.operation(operation);
        self.is_module_enabled(op.module) && self.selected_operation(op.component) == Some(operation)
    }

    /// Counted-active operations, in component order.
    pub fn active_operations<'a>(
        &'a self,
        content: &'a Content,
    ) -> impl Iterator<Item = OperationId> + 'a {
        self.selected
            .iter()
            .filter(|(component, _)| {
                self.is_module_enabled(content.component(**component).module)
            })
            .map(|(_, op)| *op)
    }

    pub fn grid_load(&self, content: &Content) -> u32 {
        self.active_operations(content)
            .map(|op| content.operation(op).grid_load)
            .sum()
    }

    /// Load the module would add if it were enabled.
    pub fn module_load(&self, content: &Content, module: ModuleId) -> u32 {
        content
            .module(module)
            .components
            .iter()
            .filter_map(|c| self.selected_operation(*c))
            .map(|op| content.operation(op).grid_load)
            .sum()
    }

    /// Select `operation` in `component`, replacing the sibling selection.
    ///
    /// Admitted iff `load - sibling + operation ≤ capacity`, where the
    /// sibling only counts while its module is enabled.
    pub fn activate_operation(
        &mut self,
        content: &Content,
        component: ComponentId,
        operation: OperationId,
        capacity: u32,
    ) -> Result<(), GridError> {
        let op = content.operation(operation);
        if op.component != component {
            return Err(GridError::NotInComponent {
                component,
                operation,
            });
        }
        if self.selected_operation(component) == Some(operation) {
            return Ok(());
        }

        let sibling_load = match self.selected_operation(component) {
            Some(sibling) if self.is_operation_active(content, sibling) => {
                content.operation(sibling).grid_load
            }
            _ => 0,
        };
        let required = self.grid_load(content) - sibling_load + op.grid_load;
        if required > capacity {
            return Err(GridError::CapacityExceeded { required, capacity });
        }

        self.selected.insert(component, operation);
        Ok(())
    }

    /// Enable or disable a module. Enabling is admission-checked.
    pub fn set_module_enabled(
        &mut self,
        content: &Content,
        module: ModuleId,
        enabled: bool,
        capacity: u32,
    ) -> Result<(), GridError> {
        if enabled == self.is_module_enabled(module) {
            return Ok(());
        }
        if !enabled {
            self.enabled_modules.remove(&module);
            return Ok(());
        }

        let required = self.grid_load(content) + self.module_load(content, module);
        if required > capacity {
            return Err(GridError::CapacityExceeded { required, capacity });
        }
        self.enabled_modules.insert(module);
        Ok(())
    }

    /// Flip a module; returns whether it is now enabled.
    pub fn toggle_module(
        &mut self,
        content: &Content,
        module: ModuleId,
        capacity: u32,
    ) -> Result<bool, GridError> {
        let enabled = !self.is_module_enabled(module);
        self.set_module_enabled(content, module, enabled, capacity)?;
        Ok(enabled)
    }

    /// Put back a saved selection without admission checks.
    pub fn restore(
        &mut self,
        enabled_modules: impl IntoIterator<Item = ModuleId>,
        selections: impl IntoIterator<Item = (ComponentId, OperationId)>,
    ) {
        self.enabled_modules = enabled_modules.into_iter().collect();
        for (component, operation) in selections {
            self.selected.insert(component, operation);
        }
    }
}
