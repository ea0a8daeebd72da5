//! Error types for the storage and command line layers

use thiserror::Error;

use crate::models::CharacterId;

#[derive(Error, Debug)]
pub enum SkillLookupError {
    #[error("character {0} not found")]
    CharacterNotFound(CharacterId),
}

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("type name '{name}' matches {count} types, use the type id")]
    AmbiguousType { name: String, count: usize },
}
