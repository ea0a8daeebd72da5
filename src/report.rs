//! Text output for a resolved manufacturing tree

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::calculator::ManufacturingSetupModel;
use crate::models::TypeId;
use crate::tree::{NodePath, TreeNode};

/// Render a duration as `1d 02:03:04`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / 86_400;
    let hours = total % 86_400 / 3600;
    let minutes = total % 3600 / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Format the tree as an indented listing
pub fn format_tree<N>(model: &ManufacturingSetupModel<'_>, name: N) -> String
where
    N: Fn(TypeId) -> String,
{
    let mut output = String::new();
    model.root().walk(&NodePath::root(), &mut |path, node| {
        if path.is_root() {
            return;
        }
        let prefix = "  ".repeat(path.depth() - 1);
        output.push_str(&format_node(model, node, &prefix, &name));
    });
    output
}

fn format_node<N>(
    model: &ManufacturingSetupModel<'_>,
    node: &TreeNode,
    prefix: &str,
    name: &N,
) -> String
where
    N: Fn(TypeId) -> String,
{
    let type_name = name(node.type_id());
    let stock = if node.assets_taken() > 0 {
        format!(", {} from stock", node.assets_taken())
    } else {
        String::new()
    };

    if node.is_build() {
        let settings = model.setup().type_settings(node.type_id());
        format!(
            "{}{} x{}{} - build {} run(s), ME {} TE {}, {}\n",
            prefix,
            type_name,
            node.effective_quantity_required(),
            stock,
            node.runs(),
            settings.material_efficiency,
            settings.time_efficiency,
            format_duration(node.effective_time())
        )
    } else {
        format!(
            "{}{} x{}{} - acquire\n",
            prefix,
            type_name,
            node.effective_quantity_required(),
            stock
        )
    }
}

/// Totals over the whole tree
#[derive(Debug)]
pub struct PlanSummary {
    pub outputs: Vec<(String, u64, u32)>,
    pub build_steps: Vec<(String, u32)>,
    pub materials_to_acquire: Vec<(String, u64)>,
    pub assets_used: Vec<(String, u64)>,
    pub total_time: Duration,
}

pub fn summarize<N>(model: &ManufacturingSetupModel<'_>, name: N) -> PlanSummary
where
    N: Fn(TypeId) -> String,
{
    let mut build_steps: BTreeMap<String, u32> = BTreeMap::new();
    let mut materials: BTreeMap<String, u64> = BTreeMap::new();
    let mut assets_used: BTreeMap<String, u64> = BTreeMap::new();

    model.root().walk(&NodePath::root(), &mut |path, node| {
        if path.is_root() {
            return;
        }

        let type_name = name(node.type_id());
        if node.assets_taken() > 0 {
            *assets_used.entry(type_name.clone()).or_default() += node.assets_taken();
        }

        if node.is_build() {
            *build_steps.entry(type_name).or_default() += node.runs();
        } else if node.effective_quantity_required() > 0 {
            *materials.entry(type_name).or_default() += node.effective_quantity_required();
        }
    });

    let outputs = model
        .root()
        .children()
        .iter()
        .map(|node| (name(node.type_id()), node.quantity_required(), node.runs()))
        .collect();

    PlanSummary {
        outputs,
        build_steps: build_steps.into_iter().filter(|(_, runs)| *runs > 0).collect(),
        materials_to_acquire: materials.into_iter().collect(),
        assets_used: assets_used.into_iter().collect(),
        total_time: model.total_time(),
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Manufacturing Summary ===")?;
        for (name, quantity, runs) in &self.outputs {
            writeln!(f, "Output: {} x{} ({} run(s))", name, quantity, runs)?;
        }
        writeln!(f)?;

        writeln!(f, "Build steps:")?;
        for (name, runs) in &self.build_steps {
            writeln!(f, "  {} run(s) of {}", runs, name)?;
        }
        writeln!(f)?;

        writeln!(f, "Materials to acquire:")?;
        for (name, quantity) in &self.materials_to_acquire {
            writeln!(f, "  {} x{}", name, quantity)?;
        }
        writeln!(f)?;

        if !self.assets_used.is_empty() {
            writeln!(f, "Taken from stock:")?;
            for (name, quantity) in &self.assets_used {
                writeln!(f, "  {} x{}", name, quantity)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Total time: {}", format_duration(self.total_time))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InventorySource, ManufacturingSetup};
    use crate::providers::{AssetSnapshot, BlueprintCatalog, CharacterSkills};

    const TRITANIUM: TypeId = 34;
    const PYERITE: TypeId = 35;
    const PART: TypeId = 400;
    const FRIGATE: TypeId = 600;

    fn catalog() -> BlueprintCatalog {
        BlueprintCatalog::new()
            .with_name(TRITANIUM, "Tritanium")
            .with_name(PYERITE, "Pyerite")
            .with_name(PART, "Part")
            .with_name(FRIGATE, "Frigate")
            .with_blueprint(PART, 1, Duration::from_secs(60), &[(TRITANIUM, 3)])
            .with_blueprint(
                FRIGATE,
                1,
                Duration::from_secs(3600),
                &[(PART, 2), (TRITANIUM, 10), (PYERITE, 4)],
            )
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(59)), "00:00:59");
        assert_eq!(format_duration(Duration::from_secs(3723)), "01:02:03");
        assert_eq!(format_duration(Duration::from_secs(90_061)), "1d 01:01:01");
    }

    #[test]
    fn test_summary_aggregates_materials() {
        let catalog = catalog();
        let assets = AssetSnapshot::new().with_quantity(PYERITE, 4);
        let skills = CharacterSkills::new();

        let mut setup = ManufacturingSetup::new();
        setup.add_output(FRIGATE, 2);
        setup.set_source(PART, InventorySource::Build);

        let mut model = ManufacturingSetupModel::new(setup, &catalog, &assets, &skills);
        model.refresh_data();

        let summary = summarize(&model, |id| catalog.display_name(id));
        assert_eq!(summary.outputs, vec![("Frigate".to_string(), 2, 2)]);
        // 4 parts need 12, plus 20 directly
        assert_eq!(
            summary.materials_to_acquire,
            vec![("Pyerite".to_string(), 4), ("Tritanium".to_string(), 32)]
        );
        assert_eq!(summary.build_steps, vec![("Frigate".to_string(), 2), ("Part".to_string(), 4)]);
        assert_eq!(summary.assets_used, vec![("Pyerite".to_string(), 4)]);
        assert_eq!(summary.total_time, Duration::from_secs(7440));

        let text = summary.to_string();
        assert!(text.contains("Total time: 02:04:00"));
        assert!(text.contains("Taken from stock:"));
    }

    #[test]
    fn test_tree_listing_is_indented() {
        let catalog = catalog();
        let assets = AssetSnapshot::new();
        let skills = CharacterSkills::new();

        let mut setup = ManufacturingSetup::new();
        setup.add_output(FRIGATE, 1);
        setup.set_source(PART, InventorySource::Build);

        let mut model = ManufacturingSetupModel::new(setup, &catalog, &assets, &skills);
        model.refresh_data();

        let listing = format_tree(&model, |id| catalog.display_name(id));
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("Frigate x1 - build 1 run(s)"));
        assert!(lines[1].starts_with("  Part x2 - build 2 run(s)"));
        assert_eq!(lines[2], "    Tritanium x6 - acquire");
        assert_eq!(lines[4], "  Pyerite x4 - acquire");
    }
}
