//! Data models for blueprints and manufacturing setups

use std::collections::HashMap;
use std::time::Duration;

use clap::ValueEnum;

pub type TypeId = u32;
pub type CharacterId = u64;
pub type SkillId = u32;

/// Sentinel carried by the tree root
pub const INVALID_TYPE_ID: TypeId = 0;

pub const MAX_MATERIAL_EFFICIENCY: u8 = 10;
pub const MAX_TIME_EFFICIENCY: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialInfo {
    pub material_type_id: TypeId,
    pub quantity: u64, // per run, before efficiency
}

/// Blueprint data for one product type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManufacturingInfo {
    pub materials: Vec<MaterialInfo>,
    pub quantity_produced: u64,
    pub base_time: Duration,
}

impl ManufacturingInfo {
    /// Info for something that cannot be manufactured
    pub fn raw() -> Self {
        Self {
            materials: Vec::new(),
            quantity_produced: 1,
            base_time: Duration::ZERO,
        }
    }

    pub fn is_manufacturable(&self) -> bool {
        !self.materials.is_empty()
    }
}

impl Default for ManufacturingInfo {
    fn default() -> Self {
        Self::raw()
    }
}

/// Where a required material comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum InventorySource {
    /// Decompose into sub-materials and manufacture
    Build,
    /// Acquire externally; the node is a leaf
    #[default]
    Buy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeSettings {
    pub source: InventorySource,
    pub material_efficiency: u8,
    pub time_efficiency: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSettings {
    pub quantity: u64,
    pub runs: Option<u32>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            quantity: 1,
            runs: None,
        }
    }
}

/// Desired outputs and per-type overrides, edited by the caller
#[derive(Debug, Clone, Default)]
pub struct ManufacturingSetup {
    outputs: Vec<TypeId>,
    output_settings: HashMap<TypeId, OutputSettings>,
    type_settings: HashMap<TypeId, TypeSettings>,
}

impl ManufacturingSetup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the output selection, keeping first-seen order and dropping duplicates
    pub fn set_output_types<I>(&mut self, types: I)
    where
        I: IntoIterator<Item = TypeId>,
    {
        self.outputs.clear();
        for type_id in types {
            if !self.outputs.contains(&type_id) {
                self.outputs.push(type_id);
            }
        }
        let outputs = &self.outputs;
        self.output_settings.retain(|type_id, _| outputs.contains(type_id));
    }

    pub fn add_output(&mut self, type_id: TypeId, quantity: u64) {
        if !self.outputs.contains(&type_id) {
            self.outputs.push(type_id);
        }
        self.output_settings.entry(type_id).or_default().quantity = quantity;
    }

    pub fn output_types(&self) -> &[TypeId] {
        &self.outputs
    }

    pub fn is_output(&self, type_id: TypeId) -> bool {
        self.outputs.contains(&type_id)
    }

    pub fn output_settings(&self, type_id: TypeId) -> OutputSettings {
        self.output_settings.get(&type_id).copied().unwrap_or_default()
    }

    pub fn type_settings(&self, type_id: TypeId) -> TypeSettings {
        self.type_settings.get(&type_id).copied().unwrap_or_default()
    }

    pub fn set_quantity(&mut self, type_id: TypeId, quantity: u64) {
        self.output_settings.entry(type_id).or_default().quantity = quantity;
    }

    pub fn set_runs(&mut self, type_id: TypeId, runs: u32) {
        self.output_settings.entry(type_id).or_default().runs = Some(runs);
    }

    pub fn set_source(&mut self, type_id: TypeId, source: InventorySource) {
        self.type_settings.entry(type_id).or_default().source = source;
    }

    pub fn set_material_efficiency(&mut self, type_id: TypeId, value: u8) {
        self.type_settings.entry(type_id).or_default().material_efficiency =
            value.min(MAX_MATERIAL_EFFICIENCY);
    }

    pub fn set_time_efficiency(&mut self, type_id: TypeId, value: u8) {
        self.type_settings.entry(type_id).or_default().time_efficiency =
            value.min(MAX_TIME_EFFICIENCY);
    }

    /// Source used for a node of this type; outputs are always built
    pub fn effective_source(&self, type_id: TypeId) -> InventorySource {
        if self.is_output(type_id) {
            InventorySource::Build
        } else {
            self.type_settings(type_id).source
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_order_is_preserved_without_duplicates() {
        let mut setup = ManufacturingSetup::new();
        setup.set_output_types([3, 1, 3, 2]);
        assert_eq!(setup.output_types(), &[3, 1, 2]);
    }

    #[test]
    fn test_dropping_an_output_forgets_its_settings() {
        let mut setup = ManufacturingSetup::new();
        setup.add_output(5, 40);
        setup.set_output_types([6]);
        setup.set_output_types([5, 6]);
        assert_eq!(setup.output_settings(5), OutputSettings::default());
    }

    #[test]
    fn test_efficiency_is_clamped() {
        let mut setup = ManufacturingSetup::new();
        setup.set_material_efficiency(1, 50);
        setup.set_time_efficiency(1, 50);
        assert_eq!(setup.type_settings(1).material_efficiency, MAX_MATERIAL_EFFICIENCY);
        assert_eq!(setup.type_settings(1).time_efficiency, MAX_TIME_EFFICIENCY);
    }

    #[test]
    fn test_outputs_are_always_built() {
        let mut setup = ManufacturingSetup::new();
        setup.add_output(7, 1);
        setup.set_source(7, InventorySource::Buy);
        assert_eq!(setup.effective_source(7), InventorySource::Build);
        assert_eq!(setup.effective_source(8), InventorySource::Buy);
    }
}
