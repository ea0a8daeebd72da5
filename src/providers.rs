//! Data sources consumed by the manufacturing model
//!
//! The model only reads already-resolved data through these traits. The
//! in-memory implementations are filled from the database once per command.

use std::collections::HashMap;

use crate::error::SkillLookupError;
use crate::industry::ManufacturingSkills;
use crate::models::{CharacterId, ManufacturingInfo, TypeId};

pub trait ManufacturingInfoProvider {
    /// Per-run materials, output and base time. Unknown types are raw.
    fn manufacturing_info(&self, type_id: TypeId) -> ManufacturingInfo;
}

pub trait AssetProvider {
    /// On-hand quantity, zero when nothing is stored
    fn asset_quantity(&self, type_id: TypeId) -> u64;
}

pub trait SkillSource {
    fn manufacturing_skills(&self, character: CharacterId)
    -> Result<ManufacturingSkills, SkillLookupError>;
}

/// Blueprints and type names
#[derive(Debug, Clone, Default)]
pub struct BlueprintCatalog {
    blueprints: HashMap<TypeId, ManufacturingInfo>,
    names: HashMap<TypeId, String>,
}

impl BlueprintCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_name(mut self, type_id: TypeId, name: &str) -> Self {
        self.insert_name(type_id, name.to_string());
        self
    }

    #[cfg(test)]
    pub fn with_blueprint(
        mut self,
        product: TypeId,
        quantity_produced: u64,
        base_time: std::time::Duration,
        materials: &[(TypeId, u64)],
    ) -> Self {
        let materials = materials
            .iter()
            .map(|&(material_type_id, quantity)| crate::models::MaterialInfo {
                material_type_id,
                quantity,
            })
            .collect();
        self.insert_blueprint(
            product,
            ManufacturingInfo {
                materials,
                quantity_produced,
                base_time,
            },
        );
        self
    }

    pub fn insert_name(&mut self, type_id: TypeId, name: String) {
        self.names.insert(type_id, name);
    }

    pub fn insert_blueprint(&mut self, product: TypeId, info: ManufacturingInfo) {
        self.blueprints.insert(product, info);
    }

    pub fn name(&self, type_id: TypeId) -> Option<&str> {
        self.names.get(&type_id).map(String::as_str)
    }

    /// Name for display, falling back to the id
    pub fn display_name(&self, type_id: TypeId) -> String {
        self.name(type_id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Type #{}", type_id))
    }

    /// Case-insensitive exact name match
    pub fn find_by_name(&self, name: &str) -> Vec<TypeId> {
        let mut found: Vec<TypeId> = self
            .names
            .iter()
            .filter(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(&id, _)| id)
            .collect();
        found.sort_unstable();
        found
    }

    pub fn blueprint_count(&self) -> usize {
        self.blueprints.len()
    }
}

impl ManufacturingInfoProvider for BlueprintCatalog {
    fn manufacturing_info(&self, type_id: TypeId) -> ManufacturingInfo {
        self.blueprints
            .get(&type_id)
            .cloned()
            .unwrap_or_else(ManufacturingInfo::raw)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssetSnapshot {
    quantities: HashMap<TypeId, u64>,
}

impl AssetSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_quantity(mut self, type_id: TypeId, quantity: u64) -> Self {
        self.set_quantity(type_id, quantity);
        self
    }

    pub fn set_quantity(&mut self, type_id: TypeId, quantity: u64) {
        self.quantities.insert(type_id, quantity);
    }
}

impl AssetProvider for AssetSnapshot {
    fn asset_quantity(&self, type_id: TypeId) -> u64 {
        self.quantities.get(&type_id).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CharacterSkills {
    characters: HashMap<CharacterId, ManufacturingSkills>,
}

impl CharacterSkills {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_character(mut self, character: CharacterId, skills: ManufacturingSkills) -> Self {
        self.insert(character, skills);
        self
    }

    pub fn insert(&mut self, character: CharacterId, skills: ManufacturingSkills) {
        self.characters.insert(character, skills);
    }
}

impl SkillSource for CharacterSkills {
    fn manufacturing_skills(
        &self,
        character: CharacterId,
    ) -> Result<ManufacturingSkills, SkillLookupError> {
        self.characters
            .get(&character)
            .cloned()
            .ok_or(SkillLookupError::CharacterNotFound(character))
    }
}
