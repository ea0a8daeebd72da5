//! Database schema and operations

use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::error::LookupError;
use crate::industry::ManufacturingSkills;
use crate::models::{CharacterId, ManufacturingInfo, MaterialInfo, SkillId, TypeId};
use crate::providers::{AssetSnapshot, BlueprintCatalog, CharacterSkills};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS types (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );

        -- One blueprint per product type
        CREATE TABLE IF NOT EXISTS blueprints (
            product_type_id INTEGER PRIMARY KEY,
            quantity_produced INTEGER NOT NULL DEFAULT 1,
            base_time_s INTEGER NOT NULL
        );

        -- Materials per run; position keeps the in-game order
        CREATE TABLE IF NOT EXISTS blueprint_materials (
            product_type_id INTEGER NOT NULL,
            material_type_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (product_type_id, material_type_id)
        );

        CREATE TABLE IF NOT EXISTS assets (
            type_id INTEGER PRIMARY KEY,
            quantity INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS characters (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS character_skills (
            character_id INTEGER NOT NULL,
            skill_id INTEGER NOT NULL,
            level INTEGER NOT NULL,
            PRIMARY KEY (character_id, skill_id)
        );

        CREATE INDEX IF NOT EXISTS idx_types_name ON types(name COLLATE NOCASE);
        "#,
    )?;
    Ok(())
}

pub fn upsert_type(conn: &Connection, type_id: TypeId, name: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO types (id, name) VALUES (?1, ?2)",
        (type_id, name),
    )?;
    Ok(())
}

/// Insert or replace a blueprint together with its materials
pub fn upsert_blueprint(
    conn: &Connection,
    product: TypeId,
    info: &ManufacturingInfo,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO blueprints (product_type_id, quantity_produced, base_time_s)
         VALUES (?1, ?2, ?3)",
        (product, info.quantity_produced, info.base_time.as_secs()),
    )?;
    conn.execute(
        "DELETE FROM blueprint_materials WHERE product_type_id = ?1",
        [product],
    )?;
    for (position, material) in info.materials.iter().enumerate() {
        conn.execute(
            "INSERT INTO blueprint_materials (product_type_id, material_type_id, quantity, position)
             VALUES (?1, ?2, ?3, ?4)",
            (product, material.material_type_id, material.quantity, position),
        )?;
    }
    Ok(())
}

pub fn set_asset_quantity(conn: &Connection, type_id: TypeId, quantity: u64) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO assets (type_id, quantity) VALUES (?1, ?2)",
        (type_id, quantity),
    )?;
    Ok(())
}

pub fn add_asset_quantity(conn: &Connection, type_id: TypeId, quantity: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO assets (type_id, quantity) VALUES (?1, ?2)
         ON CONFLICT(type_id) DO UPDATE SET quantity = quantity + excluded.quantity",
        (type_id, quantity),
    )?;
    Ok(())
}

pub fn clear_assets(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM assets", [])?;
    Ok(())
}

pub fn upsert_character(conn: &Connection, character: CharacterId, name: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO characters (id, name) VALUES (?1, ?2)",
        (character, name),
    )?;
    Ok(())
}

pub fn set_skill_level(
    conn: &Connection,
    character: CharacterId,
    skill: SkillId,
    level: u8,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO character_skills (character_id, skill_id, level)
         VALUES (?1, ?2, ?3)",
        (character, skill, level),
    )?;
    Ok(())
}

/// Clear blueprint, type and asset data (for reloading)
pub fn clear_static_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM blueprint_materials;
        DELETE FROM blueprints;
        DELETE FROM types;
        DELETE FROM assets;
        "#,
    )?;
    Ok(())
}

/// Load every blueprint and type name
pub fn load_catalog(conn: &Connection) -> Result<BlueprintCatalog> {
    let mut catalog = BlueprintCatalog::new();

    let mut stmt = conn.prepare("SELECT id, name FROM types")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, TypeId>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (type_id, name) = row?;
        catalog.insert_name(type_id, name);
    }

    let mut stmt = conn.prepare(
        "SELECT product_type_id, quantity_produced, base_time_s FROM blueprints",
    )?;
    let blueprints = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, TypeId>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for (product, quantity_produced, base_time_s) in blueprints {
        let materials = get_materials(conn, product)
            .with_context(|| format!("Failed to load materials of type {}", product))?;
        catalog.insert_blueprint(
            product,
            ManufacturingInfo {
                materials,
                quantity_produced,
                base_time: Duration::from_secs(base_time_s),
            },
        );
    }

    Ok(catalog)
}

/// Materials of one blueprint in stored order
pub fn get_materials(conn: &Connection, product: TypeId) -> Result<Vec<MaterialInfo>> {
    let mut stmt = conn.prepare(
        "SELECT material_type_id, quantity
         FROM blueprint_materials
         WHERE product_type_id = ?1
         ORDER BY position",
    )?;

    let rows = stmt.query_map([product], |row| {
        Ok(MaterialInfo {
            material_type_id: row.get(0)?,
            quantity: row.get(1)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn load_assets(conn: &Connection) -> Result<AssetSnapshot> {
    let mut stmt = conn.prepare("SELECT type_id, quantity FROM assets")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, TypeId>(0)?, row.get::<_, u64>(1)?)))?;

    let mut assets = AssetSnapshot::new();
    for row in rows {
        let (type_id, quantity) = row?;
        assets.set_quantity(type_id, quantity);
    }
    Ok(assets)
}

/// Skills of every known character; characters without skills get an empty set
pub fn load_skills(conn: &Connection) -> Result<CharacterSkills> {
    let mut skills = CharacterSkills::new();

    let mut stmt = conn.prepare("SELECT id FROM characters")?;
    let characters = stmt
        .query_map([], |row| row.get::<_, CharacterId>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT skill_id, level FROM character_skills WHERE character_id = ?1",
    )?;
    for character in characters {
        let mut character_skills = ManufacturingSkills::new();
        let rows = stmt.query_map([character], |row| {
            Ok((row.get::<_, SkillId>(0)?, row.get::<_, u8>(1)?))
        })?;
        for row in rows {
            let (skill, level) = row?;
            character_skills.set_level(skill, level);
        }
        skills.insert(character, character_skills);
    }

    Ok(skills)
}

/// Manufacturable types with their output per run and base time
pub fn list_blueprints(conn: &Connection) -> Result<Vec<(TypeId, String, u64, u64)>> {
    let mut stmt = conn.prepare(
        "SELECT b.product_type_id, COALESCE(t.name, ''), b.quantity_produced, b.base_time_s
         FROM blueprints b
         LEFT JOIN types t ON t.id = b.product_type_id
         ORDER BY t.name",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Resolve a command line argument that is either a type id or a type name
pub fn resolve_type(conn: &Connection, argument: &str) -> Result<TypeId> {
    if let Ok(type_id) = argument.parse::<TypeId>() {
        return Ok(type_id);
    }

    find_type_by_name(conn, argument)?
        .ok_or_else(|| LookupError::UnknownType(argument.to_string()).into())
}

/// Case-insensitive exact name lookup
pub fn find_type_by_name(conn: &Connection, name: &str) -> Result<Option<TypeId>> {
    let mut stmt = conn.prepare("SELECT id FROM types WHERE name = ?1 COLLATE NOCASE")?;
    let matches = stmt
        .query_map([name], |row| row.get::<_, TypeId>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    match matches.as_slice() {
        [] => Ok(None),
        [type_id] => Ok(Some(*type_id)),
        _ => Err(LookupError::AmbiguousType {
            name: name.to_string(),
            count: matches.len(),
        }
        .into()),
    }
}

pub fn type_name(conn: &Connection, type_id: TypeId) -> Result<Option<String>> {
    let name = conn
        .query_row("SELECT name FROM types WHERE id = ?1", [type_id], |row| row.get(0))
        .optional()?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::industry::INDUSTRY_SKILL;
    use crate::providers::{AssetProvider, ManufacturingInfoProvider, SkillSource};

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_blueprint_round_trip_keeps_material_order() {
        let conn = open();
        let info = ManufacturingInfo {
            materials: vec![
                MaterialInfo { material_type_id: 36, quantity: 5 },
                MaterialInfo { material_type_id: 34, quantity: 100 },
                MaterialInfo { material_type_id: 35, quantity: 20 },
            ],
            quantity_produced: 1,
            base_time: Duration::from_secs(6000),
        };
        upsert_blueprint(&conn, 587, &info).unwrap();

        let catalog = load_catalog(&conn).unwrap();
        assert_eq!(catalog.manufacturing_info(587), info);
        assert!(!catalog.manufacturing_info(34).is_manufacturable());
    }

    #[test]
    fn test_upsert_blueprint_replaces_materials() {
        let conn = open();
        let mut info = ManufacturingInfo {
            materials: vec![MaterialInfo { material_type_id: 34, quantity: 1 }],
            quantity_produced: 1,
            base_time: Duration::from_secs(60),
        };
        upsert_blueprint(&conn, 1, &info).unwrap();
        info.materials = vec![MaterialInfo { material_type_id: 35, quantity: 2 }];
        upsert_blueprint(&conn, 1, &info).unwrap();

        assert_eq!(get_materials(&conn, 1).unwrap(), info.materials);
    }

    #[test]
    fn test_assets_accumulate() {
        let conn = open();
        add_asset_quantity(&conn, 34, 100).unwrap();
        add_asset_quantity(&conn, 34, 50).unwrap();
        set_asset_quantity(&conn, 35, 7).unwrap();

        let assets = load_assets(&conn).unwrap();
        assert_eq!(assets.asset_quantity(34), 150);
        assert_eq!(assets.asset_quantity(35), 7);

        clear_assets(&conn).unwrap();
        assert_eq!(load_assets(&conn).unwrap().asset_quantity(34), 0);
    }

    #[test]
    fn test_skills_per_character() {
        let conn = open();
        upsert_character(&conn, 1, "Builder").unwrap();
        upsert_character(&conn, 2, "Alt").unwrap();
        set_skill_level(&conn, 1, INDUSTRY_SKILL, 4).unwrap();

        let skills = load_skills(&conn).unwrap();
        assert_eq!(skills.manufacturing_skills(1).unwrap().level(INDUSTRY_SKILL), 4);
        assert_eq!(skills.manufacturing_skills(2).unwrap().level(INDUSTRY_SKILL), 0);
        assert!(skills.manufacturing_skills(3).is_err());
    }

    #[test]
    fn test_resolve_type() {
        let conn = open();
        upsert_type(&conn, 34, "Tritanium").unwrap();
        upsert_type(&conn, 1000, "Twin").unwrap();
        upsert_type(&conn, 1001, "twin").unwrap();

        assert_eq!(resolve_type(&conn, "34").unwrap(), 34);
        assert_eq!(resolve_type(&conn, "tritanium").unwrap(), 34);
        assert_eq!(resolve_type(&conn, "555").unwrap(), 555);

        let error = resolve_type(&conn, "Nope").unwrap_err();
        assert!(matches!(
            error.downcast_ref::<LookupError>(),
            Some(LookupError::UnknownType(_))
        ));
        let error = resolve_type(&conn, "TWIN").unwrap_err();
        assert!(matches!(
            error.downcast_ref::<LookupError>(),
            Some(LookupError::AmbiguousType { count: 2, .. })
        ));
        assert_eq!(type_name(&conn, 34).unwrap().as_deref(), Some("Tritanium"));
        assert_eq!(type_name(&conn, 35).unwrap(), None);
    }

    #[test]
    fn test_list_blueprints() {
        let conn = open();
        upsert_type(&conn, 2, "Beta").unwrap();
        upsert_type(&conn, 1, "Alpha").unwrap();
        let info = ManufacturingInfo {
            materials: vec![MaterialInfo { material_type_id: 34, quantity: 1 }],
            quantity_produced: 10,
            base_time: Duration::from_secs(60),
        };
        upsert_blueprint(&conn, 2, &info).unwrap();
        upsert_blueprint(&conn, 1, &info).unwrap();

        let blueprints = list_blueprints(&conn).unwrap();
        assert_eq!(
            blueprints,
            vec![
                (1, "Alpha".to_string(), 10, 60),
                (2, "Beta".to_string(), 10, 60)
            ]
        );
    }
}
