//! Asset list import
//!
//! Reads the text copied from the in-game asset window: one item per line,
//! tab separated, name first and quantity second. The quantity column uses
//! thousands separators and is empty for single unstackable items.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::Connection;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::models::TypeId;
use crate::providers::BlueprintCatalog;

/// One parsed export line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLine {
    pub name: String,
    pub quantity: u64,
}

/// Import statistics
#[derive(Debug, Default)]
pub struct ImportStats {
    pub files_scanned: usize,
    pub lines_parsed: usize,
    pub types_imported: usize,
    pub units_imported: u64,
    pub unknown_names: Vec<String>,
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Import Statistics:")?;
        writeln!(f, "  Files scanned: {}", self.files_scanned)?;
        writeln!(f, "  Lines parsed: {}", self.lines_parsed)?;
        writeln!(f, "  Types imported: {}", self.types_imported)?;
        writeln!(f, "  Units imported: {}", self.units_imported)?;

        if !self.unknown_names.is_empty() {
            writeln!(f, "  Unknown items ({}):", self.unknown_names.len())?;
            for name in self.unknown_names.iter().take(10) {
                writeln!(f, "    - {}", name)?;
            }
            if self.unknown_names.len() > 10 {
                writeln!(f, "    ... and {} more", self.unknown_names.len() - 10)?;
            }
        }

        Ok(())
    }
}

/// Collect `*.txt` exports below a directory, or the path itself if it is a file
pub fn find_export_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Parse the lines of one export; lines without a name are skipped
pub fn parse_export(content: &str) -> Result<Vec<AssetLine>> {
    // name<TAB>quantity, quantity may carry separators or be empty
    let line_re = Regex::new(r"^([^\t]+?)\s*\t\s*([\d,.' ]*)(?:\t|$)")?;

    let mut lines = Vec::new();
    for raw in content.lines() {
        let Some(cap) = line_re.captures(raw) else {
            continue;
        };

        let name = cap[1].trim().to_string();
        if name.is_empty() {
            continue;
        }

        let digits: String = cap[2].chars().filter(char::is_ascii_digit).collect();
        let quantity = if digits.is_empty() {
            1
        } else {
            match digits.parse::<u64>() {
                Ok(quantity) => quantity,
                Err(_) => {
                    warn!("Quantity out of range for {}: {}", name, &cap[2]);
                    continue;
                }
            }
        };

        lines.push(AssetLine { name, quantity });
    }

    Ok(lines)
}

/// Sum the quantities of every line per known type
fn resolve_lines(
    lines: &[AssetLine],
    catalog: &BlueprintCatalog,
    totals: &mut HashMap<TypeId, u64>,
    stats: &mut ImportStats,
) {
    for line in lines {
        match catalog.find_by_name(&line.name).as_slice() {
            [type_id] => {
                *totals.entry(*type_id).or_default() += line.quantity;
            }
            [] => {
                if !stats.unknown_names.contains(&line.name) {
                    stats.unknown_names.push(line.name.clone());
                }
            }
            matches => {
                warn!("{} matches {} types, skipped", line.name, matches.len());
            }
        }
    }
}

/// Import all exports found at `path`, adding to the stored quantities
pub fn import_to_database(
    conn: &Connection,
    path: &Path,
    catalog: &BlueprintCatalog,
) -> Result<ImportStats> {
    let files = find_export_files(path)?;
    info!("Found {} asset export files", files.len());

    let mut stats = ImportStats::default();
    let mut totals: HashMap<TypeId, u64> = HashMap::new();

    for file in &files {
        let content = fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let lines = parse_export(&content)?;
        debug!("{}: {} lines", file.display(), lines.len());

        stats.files_scanned += 1;
        stats.lines_parsed += lines.len();
        resolve_lines(&lines, catalog, &mut totals, &mut stats);
    }

    for (type_id, quantity) in &totals {
        db::add_asset_quantity(conn, *type_id, *quantity)
            .with_context(|| format!("Failed to store asset {}", type_id))?;
        stats.units_imported += quantity;
    }
    stats.types_imported = totals.len();

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::AssetProvider;

    const EXPORT: &str = "Tritanium\t1,234,567\tMineral\tMaterial\t\t12,345.67 m3\n\
                          Pyerite\t500\tMineral\tMaterial\t\t5 m3\n\
                          Rifter\t\tFrigate\tShip\t\t27,289 m3\n\
                          \n\
                          Tritanium\t33\tMineral\tMaterial\t\t0.33 m3\n";

    fn catalog() -> BlueprintCatalog {
        BlueprintCatalog::new()
            .with_name(34, "Tritanium")
            .with_name(35, "Pyerite")
            .with_name(587, "Rifter")
    }

    #[test]
    fn test_parse_export_lines() {
        let lines = parse_export(EXPORT).unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            AssetLine {
                name: "Tritanium".to_string(),
                quantity: 1_234_567
            }
        );
        // unstackable items have no quantity
        assert_eq!(lines[2].quantity, 1);
    }

    #[test]
    fn test_parse_skips_lines_without_tabs() {
        let lines = parse_export("just some text\nTritanium\t10\n").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 10);
    }

    #[test]
    fn test_import_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hangar.txt"), EXPORT).unwrap();
        fs::create_dir(dir.path().join("station")).unwrap();
        fs::write(
            dir.path().join("station").join("more.txt"),
            "Pyerite\t100\nMystery Box\t1\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.md"), "Pyerite\t9999\n").unwrap();

        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();

        let stats = import_to_database(&conn, dir.path(), &catalog()).unwrap();
        assert_eq!(stats.files_scanned, 2);
        assert_eq!(stats.types_imported, 3);
        assert_eq!(stats.unknown_names, vec!["Mystery Box".to_string()]);

        let assets = db::load_assets(&conn).unwrap();
        assert_eq!(assets.asset_quantity(34), 1_234_600);
        assert_eq!(assets.asset_quantity(35), 600);
        assert_eq!(assets.asset_quantity(587), 1);
    }

    #[test]
    fn test_import_single_file_adds_to_existing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("export.txt");
        fs::write(&file, "Pyerite\t5\n").unwrap();

        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        db::set_asset_quantity(&conn, 35, 10).unwrap();

        import_to_database(&conn, &file, &catalog()).unwrap();
        assert_eq!(db::load_assets(&conn).unwrap().asset_quantity(35), 15);
    }
}
