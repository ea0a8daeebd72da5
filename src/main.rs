//! Command line front end for the manufacturing resolver

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use tracing::debug;

use eve_industry_calculator::calculator::ManufacturingSetupModel;
use eve_industry_calculator::industry::{
    ADVANCED_INDUSTRY_SKILL, EfficiencyContext, FacilitySize, FacilityType, INDUSTRY_SKILL,
    MaterialFloor, RigType, SecurityStatus,
};
use eve_industry_calculator::models::{
    CharacterId, InventorySource, ManufacturingInfo, ManufacturingSetup, MaterialInfo, SkillId,
    TypeId,
};
use eve_industry_calculator::providers::ManufacturingInfoProvider;
use eve_industry_calculator::{db, import, logging, report};

#[derive(Parser)]
#[command(name = "eve-industry-calculator")]
#[command(about = "Manufacturing dependency resolver for EVE Online")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "eve_industry.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Load sample blueprints, assets and skills
    LoadSample,

    /// List all blueprints in the database
    ListBlueprints,

    /// Show the materials of one blueprint
    Blueprint {
        /// Product type id or name
        product: String,
    },

    /// Set the on-hand quantity of a type
    SetAsset {
        /// Type id or name
        item: String,
        quantity: u64,
    },

    /// Import asset list exports from a file or directory
    ImportAssets {
        /// Export file, or directory searched for *.txt files
        path: PathBuf,

        /// Clear stored assets before importing
        #[arg(long)]
        clear: bool,
    },

    /// Store a character skill level
    SetSkill {
        character: CharacterId,
        skill: SkillId,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=5))]
        level: u8,
    },

    /// Resolve the manufacturing tree for one or more products
    Plan(PlanArgs),
}

#[derive(Args)]
struct PlanArgs {
    /// Products to manufacture (type ids or names)
    #[arg(required = true)]
    products: Vec<String>,

    /// Desired quantity of every product
    #[arg(short, long, default_value_t = 1)]
    quantity: u64,

    /// Run count override for every product
    #[arg(long)]
    runs: Option<u32>,

    /// Material efficiency of the product blueprints
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=10))]
    me: u8,

    /// Time efficiency of the product blueprints
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=20))]
    te: u8,

    /// Build this material instead of buying it (repeatable)
    #[arg(long = "build")]
    build: Vec<String>,

    /// Material efficiency for one type, as TYPE=LEVEL (repeatable)
    #[arg(long = "me-for", value_parser = parse_type_setting)]
    me_for: Vec<(String, u8)>,

    /// Time efficiency for one type, as TYPE=LEVEL (repeatable)
    #[arg(long = "te-for", value_parser = parse_type_setting)]
    te_for: Vec<(String, u8)>,

    /// Character whose skills apply
    #[arg(long)]
    character: Option<CharacterId>,

    #[arg(long, value_enum, default_value_t)]
    facility: FacilityType,

    #[arg(long, value_enum, default_value_t)]
    security: SecurityStatus,

    #[arg(long, value_enum, default_value_t)]
    material_rig: RigType,

    #[arg(long, value_enum, default_value_t)]
    time_rig: RigType,

    #[arg(long, value_enum, default_value_t)]
    size: FacilitySize,

    #[arg(long, value_enum, default_value_t)]
    material_floor: MaterialFloor,

    /// Print the full tree
    #[arg(short, long)]
    verbose: bool,
}

fn parse_type_setting(value: &str) -> Result<(String, u8), String> {
    let (item, level) = value
        .rsplit_once('=')
        .ok_or_else(|| format!("expected TYPE=LEVEL, got '{}'", value))?;
    let level = level
        .trim()
        .parse::<u8>()
        .map_err(|e| format!("invalid level '{}': {}", level, e))?;
    Ok((item.trim().to_string(), level))
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }

        Commands::ListBlueprints => {
            let blueprints = db::list_blueprints(&conn)?;
            if blueprints.is_empty() {
                println!("No blueprints in database. Run 'load-sample' first.");
            } else {
                println!("{:>8} {:<32} {:>8} {:>12}", "Type", "Product", "Per run", "Base time");
                println!("{}", "-".repeat(63));
                for (type_id, name, produced, base_time_s) in blueprints {
                    println!(
                        "{:>8} {:<32} {:>8} {:>12}",
                        type_id,
                        name,
                        produced,
                        report::format_duration(Duration::from_secs(base_time_s))
                    );
                }
            }
        }

        Commands::Blueprint { product } => {
            let type_id = db::resolve_type(&conn, &product)?;
            let catalog = db::load_catalog(&conn)?;
            let info = catalog.manufacturing_info(type_id);

            if !info.is_manufacturable() {
                println!("{} has no blueprint", catalog.display_name(type_id));
            } else {
                println!("Blueprint: {}", catalog.display_name(type_id));
                println!("  Type ID: {}", type_id);
                println!("  Produced per run: {}", info.quantity_produced);
                println!("  Base time: {}", report::format_duration(info.base_time));
                println!("  Materials:");
                for material in &info.materials {
                    println!(
                        "    {} x{}",
                        catalog.display_name(material.material_type_id),
                        material.quantity
                    );
                }
            }
        }

        Commands::SetAsset { item, quantity } => {
            let type_id = db::resolve_type(&conn, &item)?;
            db::set_asset_quantity(&conn, type_id, quantity)?;
            let name = db::type_name(&conn, type_id)?.unwrap_or(item);
            println!("Stored {} x{}", name, quantity);
        }

        Commands::ImportAssets { path, clear } => {
            if clear {
                println!("Clearing existing assets...");
                db::clear_assets(&conn)?;
            }

            let catalog = db::load_catalog(&conn)?;
            let stats = import::import_to_database(&conn, &path, &catalog)?;
            println!("\n{}", stats);
        }

        Commands::SetSkill {
            character,
            skill,
            level,
        } => {
            db::set_skill_level(&conn, character, skill, level)?;
            println!("Character {} skill {} set to level {}", character, skill, level);
        }

        Commands::Plan(args) => plan(&conn, args)?,
    }

    Ok(())
}

fn plan(conn: &Connection, args: PlanArgs) -> Result<()> {
    let catalog = db::load_catalog(conn).context("Failed to load blueprints")?;
    let assets = db::load_assets(conn).context("Failed to load assets")?;
    let skills = db::load_skills(conn).context("Failed to load skills")?;

    let products = resolve_all(conn, &args.products)?;
    let build = resolve_all(conn, &args.build)?;
    let me_for = resolve_settings(conn, &args.me_for)?;
    let te_for = resolve_settings(conn, &args.te_for)?;

    let mut setup = ManufacturingSetup::new();
    for &type_id in &products {
        setup.add_output(type_id, args.quantity);
    }

    let mut model = ManufacturingSetupModel::new(setup, &catalog, &assets, &skills);
    model.set_efficiency(EfficiencyContext {
        facility_type: args.facility,
        security_status: args.security,
        material_rig: args.material_rig,
        time_rig: args.time_rig,
        facility_size: args.size,
        material_floor: args.material_floor,
    });
    if let Some(character) = args.character {
        model.set_character(character);
    }
    model.refresh_data();

    for &type_id in &products {
        if let Some(runs) = args.runs {
            model.set_runs(type_id, runs);
        }
        model.set_material_efficiency(type_id, args.me);
        model.set_time_efficiency(type_id, args.te);
    }
    for &type_id in &build {
        model.set_source(type_id, InventorySource::Build);
    }
    for &(type_id, level) in &me_for {
        model.set_material_efficiency(type_id, level);
    }
    for &(type_id, level) in &te_for {
        model.set_time_efficiency(type_id, level);
    }

    let changes = model.take_changes();
    debug!(changes = changes.len(), "Plan resolved");

    let name = |type_id: TypeId| catalog.display_name(type_id);
    if args.verbose {
        println!("Manufacturing tree:\n");
        println!("{}", report::format_tree(&model, name));
    }

    let summary = report::summarize(&model, name);
    println!("{}", summary);

    Ok(())
}

fn resolve_all(conn: &Connection, arguments: &[String]) -> Result<Vec<TypeId>> {
    arguments
        .iter()
        .map(|argument| db::resolve_type(conn, argument))
        .collect()
}

fn resolve_settings(conn: &Connection, settings: &[(String, u8)]) -> Result<Vec<(TypeId, u8)>> {
    settings
        .iter()
        .map(|(argument, level)| Ok((db::resolve_type(conn, argument)?, *level)))
        .collect()
}

/// Load a small sample of EVE blueprints for testing without a data dump
fn load_sample_data(conn: &Connection) -> Result<()> {
    db::clear_static_data(conn)?;

    let types: &[(TypeId, &str)] = &[
        (34, "Tritanium"),
        (35, "Pyerite"),
        (36, "Mexallon"),
        (37, "Isogen"),
        (38, "Nocxium"),
        (39, "Zydrine"),
        (40, "Megacyte"),
        (11399, "Morphite"),
        (2454, "Hobgoblin I"),
        (2456, "Hobgoblin II"),
        (11478, "R.A.M.- Robotics"),
        (587, "Rifter"),
    ];
    for &(type_id, name) in types {
        db::upsert_type(conn, type_id, name)?;
    }

    let blueprint = |quantity_produced: u64, base_time_s: u64, materials: &[(TypeId, u64)]| {
        ManufacturingInfo {
            materials: materials
                .iter()
                .map(|&(material_type_id, quantity)| MaterialInfo {
                    material_type_id,
                    quantity,
                })
                .collect(),
            quantity_produced,
            base_time: Duration::from_secs(base_time_s),
        }
    };

    // Rifter: minerals only
    db::upsert_blueprint(
        conn,
        587,
        &blueprint(1, 6000, &[(34, 32000), (35, 6000), (36, 2500), (37, 500)]),
    )?;

    // Hobgoblin I
    db::upsert_blueprint(
        conn,
        2454,
        &blueprint(1, 600, &[(34, 2500), (35, 400), (36, 100)]),
    )?;

    // R.A.M.- Robotics, 100 units per run
    db::upsert_blueprint(
        conn,
        11478,
        &blueprint(100, 1200, &[(34, 556), (35, 444), (36, 222), (37, 82), (38, 36)]),
    )?;

    // Hobgoblin II: invention product built on top of Hobgoblin I
    db::upsert_blueprint(
        conn,
        2456,
        &blueprint(
            1,
            3000,
            &[(2454, 1), (11399, 2), (11478, 1), (39, 3), (40, 1)],
        ),
    )?;

    db::set_asset_quantity(conn, 34, 10_000)?;
    db::set_asset_quantity(conn, 2454, 2)?;

    db::upsert_character(conn, 1, "Sample Builder")?;
    db::set_skill_level(conn, 1, INDUSTRY_SKILL, 5)?;
    db::set_skill_level(conn, 1, ADVANCED_INDUSTRY_SKILL, 3)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eve_industry_calculator::providers::AssetProvider;

    #[test]
    fn test_parse_type_setting() {
        assert_eq!(
            parse_type_setting("Hobgoblin I=10"),
            Ok(("Hobgoblin I".to_string(), 10))
        );
        assert!(parse_type_setting("Hobgoblin I").is_err());
        assert!(parse_type_setting("587=ten").is_err());
    }

    #[test]
    fn test_cli_parses_plan() {
        let cli = Cli::try_parse_from([
            "eve-industry-calculator",
            "plan",
            "Hobgoblin II",
            "--quantity",
            "10",
            "--build",
            "Hobgoblin I",
            "--me-for",
            "2454=10",
            "--facility",
            "engineering-complex",
            "--material-rig",
            "t2",
        ])
        .unwrap();

        let Commands::Plan(args) = cli.command else {
            panic!("expected plan");
        };
        assert_eq!(args.products, vec!["Hobgoblin II".to_string()]);
        assert_eq!(args.quantity, 10);
        assert_eq!(args.build, vec!["Hobgoblin I".to_string()]);
        assert_eq!(args.me_for, vec![("2454".to_string(), 10)]);
        assert_eq!(args.facility, FacilityType::EngineeringComplex);
        assert_eq!(args.material_rig, RigType::T2);
        assert_eq!(args.time_rig, RigType::None);
    }

    #[test]
    fn test_cli_rejects_out_of_range_efficiency() {
        let parse = |flag: &str, value: &str| {
            Cli::try_parse_from(["eve-industry-calculator", "plan", "587", flag, value])
        };
        assert!(parse("--me", "11").is_err());
        assert!(parse("--te", "20").is_ok());
        assert!(parse("--te", "21").is_err());
    }

    #[test]
    fn test_sample_data_plans_hobgoblin() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        load_sample_data(&conn).unwrap();

        let catalog = db::load_catalog(&conn).unwrap();
        let assets = db::load_assets(&conn).unwrap();
        let skills = db::load_skills(&conn).unwrap();
        assert_eq!(catalog.blueprint_count(), 4);
        assert_eq!(assets.asset_quantity(2454), 2);

        let mut setup = ManufacturingSetup::new();
        setup.add_output(2456, 5);
        let mut model = ManufacturingSetupModel::new(setup, &catalog, &assets, &skills);
        model.refresh_data();
        model.set_source(2454, InventorySource::Build);

        let summary = report::summarize(&model, |id| catalog.display_name(id));
        // two Hobgoblin I come from stock, three are built
        assert!(summary.build_steps.contains(&("Hobgoblin I".to_string(), 3)));
        assert!(summary.assets_used.contains(&("Hobgoblin I".to_string(), 2)));
        assert!(summary.materials_to_acquire.contains(&("Morphite".to_string(), 10)));
    }
}
