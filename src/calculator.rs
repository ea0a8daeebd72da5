//! Manufacturing setup model
//!
//! Expands the selected outputs into a tree of intermediate and raw
//! materials, reconciles it with on-hand stock and keeps derived
//! quantities and times current while settings are edited.
//!
//! Structure and evaluation are separate steps. [`ManufacturingSetupModel::rebuild_structure`]
//! recreates every node; [`ManufacturingSetupModel::reevaluate`] only
//! recomputes quantities, runs and times.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::assets::{AssetLedger, AssetQuantity};
use crate::changes::{ModelChange, QUANTITY_ROLES, Role, RoleValue};
use crate::industry::{
    self, EfficiencyContext, FacilitySize, FacilityType, ManufacturingSkills, MaterialFloor,
    RigType, SecurityStatus,
};
use crate::models::{CharacterId, InventorySource, ManufacturingSetup, TypeId};
use crate::providers::{AssetProvider, ManufacturingInfoProvider, SkillSource};
use crate::tree::{NodePath, NodeValues, TreeNode, TypeItemIndex};

const MAX_DEPTH: usize = 20; // Prevent runaway expansion

/// Which part of the tree a re-evaluation covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationScope {
    All,
    Type(TypeId),
}

pub struct ManufacturingSetupModel<'a> {
    setup: ManufacturingSetup,
    info_provider: &'a dyn ManufacturingInfoProvider,
    asset_provider: &'a dyn AssetProvider,
    skill_source: &'a dyn SkillSource,
    root: TreeNode,
    type_items: TypeItemIndex,
    assets: AssetLedger,
    efficiency: EfficiencyContext,
    character: Option<CharacterId>,
    skills: ManufacturingSkills,
    changes: Vec<ModelChange>,
}

impl<'a> ManufacturingSetupModel<'a> {
    pub fn new(
        setup: ManufacturingSetup,
        info_provider: &'a dyn ManufacturingInfoProvider,
        asset_provider: &'a dyn AssetProvider,
        skill_source: &'a dyn SkillSource,
    ) -> Self {
        Self {
            setup,
            info_provider,
            asset_provider,
            skill_source,
            root: TreeNode::root(),
            type_items: TypeItemIndex::new(),
            assets: AssetLedger::new(),
            efficiency: EfficiencyContext::default(),
            character: None,
            skills: ManufacturingSkills::default(),
            changes: Vec::new(),
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn node(&self, path: &NodePath) -> Option<&TreeNode> {
        self.root.get(path)
    }

    pub fn row_count(&self, parent: &NodePath) -> usize {
        self.root.get(parent).map_or(0, TreeNode::child_count)
    }

    pub fn index(&self, parent: &NodePath, row: usize) -> Option<NodePath> {
        let path = parent.child(row);
        self.root.get(&path).map(|_| path)
    }

    pub fn parent(&self, path: &NodePath) -> Option<NodePath> {
        path.parent()
    }

    pub fn nodes_of_type(&self, type_id: TypeId) -> &[NodePath] {
        self.type_items.nodes(type_id)
    }

    pub fn type_items(&self) -> &TypeItemIndex {
        &self.type_items
    }

    pub fn asset_quantity(&self, type_id: TypeId) -> Option<AssetQuantity> {
        self.assets.get(type_id)
    }

    pub fn setup(&self) -> &ManufacturingSetup {
        &self.setup
    }

    /// Direct access for output selection; call [`Self::refresh_data`] afterwards
    pub fn setup_mut(&mut self) -> &mut ManufacturingSetup {
        &mut self.setup
    }

    pub fn efficiency(&self) -> &EfficiencyContext {
        &self.efficiency
    }

    pub fn character(&self) -> Option<CharacterId> {
        self.character
    }

    /// Notifications queued since the last call
    pub fn take_changes(&mut self) -> Vec<ModelChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn data(&self, path: &NodePath, role: Role) -> Option<RoleValue> {
        if path.is_root() {
            return None;
        }

        let node = self.root.get(path)?;
        let type_id = node.type_id();
        let settings = self.setup.type_settings(type_id);

        let value = match role {
            Role::Name | Role::TypeId => RoleValue::TypeId(type_id),
            Role::QuantityProduced => RoleValue::Quantity(node.quantity_produced()),
            Role::QuantityRequired => RoleValue::Quantity(node.effective_quantity_required()),
            Role::Source => RoleValue::Source(self.setup.effective_source(type_id)),
            Role::Time => RoleValue::Time(node.effective_time()),
            Role::Runs => RoleValue::Runs(node.runs()),
            Role::MaterialEfficiency => RoleValue::Efficiency(settings.material_efficiency),
            Role::TimeEfficiency => RoleValue::Efficiency(settings.time_efficiency),
        };
        Some(value)
    }

    /// Critical path time of the slowest output
    pub fn total_time(&self) -> Duration {
        self.root.effective_time()
    }

    pub fn set_output_types<I>(&mut self, types: I)
    where
        I: IntoIterator<Item = TypeId>,
    {
        self.setup.set_output_types(types);
        self.refresh_data();
    }

    pub fn refresh_data(&mut self) {
        self.rebuild_structure();
    }

    /// Discard the tree and expand every output again
    pub fn rebuild_structure(&mut self) {
        self.root.clear_children();

        let expander = Expander {
            provider: self.info_provider,
            setup: &self.setup,
        };
        for &type_id in self.setup.output_types() {
            self.root.append_child(expander.output_item(type_id));
        }

        self.type_items.rebuild(&self.root);
        self.assets
            .snapshot(self.type_items.type_ids(), self.asset_provider);
        self.evaluate_all();

        info!(
            outputs = self.root.child_count(),
            nodes = self.type_items.node_count(),
            types = self.type_items.type_count(),
            "Rebuilt manufacturing tree"
        );
        self.changes.push(ModelChange::Reset);
    }

    /// Recompute derived values without touching the structure
    pub fn reevaluate(&mut self, scope: EvaluationScope) {
        match scope {
            EvaluationScope::All => {
                self.evaluate_all();
                self.changes.push(ModelChange::AllDataChanged {
                    roles: QUANTITY_ROLES.to_vec(),
                });
            }
            EvaluationScope::Type(type_id) => {
                let pending = self.prepare_change(type_id);
                self.finish_change(pending, None);
            }
        }
    }

    /// Reload stock for every type in the tree and allocate it again
    pub fn refresh_assets(&mut self) {
        self.assets
            .snapshot(self.type_items.type_ids(), self.asset_provider);
        self.evaluate_all();

        info!(types = self.assets.len(), "Refreshed assets");
        self.changes.push(ModelChange::AllDataChanged {
            roles: QUANTITY_ROLES.to_vec(),
        });
    }

    pub fn set_source(&mut self, type_id: TypeId, source: InventorySource) {
        if self.setup.type_settings(type_id).source == source {
            return;
        }

        if self.setup.is_output(type_id) {
            // outputs keep building whatever is stored for them
            self.setup.set_source(type_id, source);
            debug!(type_id, ?source, "Inventory source stored, effective source unchanged");
            return;
        }

        let pending = self.prepare_change(type_id);
        self.setup.set_source(type_id, source);
        debug!(type_id, ?source, "Inventory source changed");

        let seeds = outermost(self.type_items.nodes(type_id));
        let expander = Expander {
            provider: self.info_provider,
            setup: &self.setup,
        };

        let mut restructured = false;
        for seed in &seeds {
            // outputs are always built
            if seed.depth() < 2 {
                continue;
            }

            let mut lineage = lineage_of(&self.root, seed);
            let cyclic = lineage
                .split_last()
                .is_some_and(|(_, above)| above.contains(&type_id));
            let Some(item) = self.root.get_mut(seed) else {
                continue;
            };

            let removed = item.clear_children();
            if removed > 0 {
                restructured = true;
                self.changes.push(ModelChange::RowsRemoved {
                    parent: seed.clone(),
                    first: 0,
                    last: removed - 1,
                });
            }

            if expander.should_build(item) && !cyclic {
                expander.fill_children(item, &mut lineage);
            }

            let inserted = item.child_count();
            if inserted > 0 {
                restructured = true;
                self.changes.push(ModelChange::RowsInserted {
                    parent: seed.clone(),
                    first: 0,
                    last: inserted - 1,
                });
            }
        }

        if restructured {
            self.type_items.rebuild(&self.root);
            let type_items = &self.type_items;
            self.assets.retain(|indexed| type_items.contains(indexed));
            for indexed in type_items.type_ids() {
                self.assets.ensure(indexed, self.asset_provider);
            }
        }

        self.finish_change(pending, Some(Role::Source));
    }

    /// Run override for an output
    pub fn set_runs(&mut self, type_id: TypeId, runs: u32) {
        if !self.setup.is_output(type_id) {
            debug!(type_id, "Ignoring run override for a type that is not an output");
            return;
        }

        let pending = self.prepare_change(type_id);
        self.setup.set_runs(type_id, runs);
        debug!(type_id, runs, "Runs changed");
        self.finish_change(pending, Some(Role::Runs));
    }

    pub fn set_material_efficiency(&mut self, type_id: TypeId, value: u8) {
        let pending = self.prepare_change(type_id);
        self.setup.set_material_efficiency(type_id, value);
        debug!(type_id, value, "Material efficiency changed");
        self.finish_change(pending, Some(Role::MaterialEfficiency));
    }

    pub fn set_time_efficiency(&mut self, type_id: TypeId, value: u8) {
        let pending = self.prepare_change(type_id);
        self.setup.set_time_efficiency(type_id, value);
        debug!(type_id, value, "Time efficiency changed");
        self.finish_change(pending, Some(Role::TimeEfficiency));
    }

    pub fn set_character(&mut self, character: CharacterId) {
        self.character = Some(character);
        self.skills = match self.skill_source.manufacturing_skills(character) {
            Ok(skills) => skills,
            Err(error) => {
                warn!(character, %error, "Cannot load manufacturing skills, assuming none");
                ManufacturingSkills::default()
            }
        };

        self.evaluate_all();
        self.changes.push(ModelChange::AllDataChanged {
            roles: vec![Role::Time],
        });
    }

    pub fn set_efficiency(&mut self, efficiency: EfficiencyContext) {
        self.update_efficiency(|ctx| *ctx = efficiency);
    }

    pub fn set_facility_type(&mut self, facility_type: FacilityType) {
        self.update_efficiency(|ctx| ctx.facility_type = facility_type);
    }

    pub fn set_security_status(&mut self, security_status: SecurityStatus) {
        self.update_efficiency(|ctx| ctx.security_status = security_status);
    }

    pub fn set_material_rig_type(&mut self, rig: RigType) {
        self.update_efficiency(|ctx| ctx.material_rig = rig);
    }

    pub fn set_time_rig_type(&mut self, rig: RigType) {
        self.update_efficiency(|ctx| ctx.time_rig = rig);
    }

    pub fn set_facility_size(&mut self, size: FacilitySize) {
        self.update_efficiency(|ctx| ctx.facility_size = size);
    }

    pub fn set_material_floor(&mut self, floor: MaterialFloor) {
        self.update_efficiency(|ctx| ctx.material_floor = floor);
    }

    fn update_efficiency<F>(&mut self, update: F)
    where
        F: FnOnce(&mut EfficiencyContext),
    {
        update(&mut self.efficiency);
        debug!(efficiency = ?self.efficiency, "Efficiency context changed");

        self.evaluate_all();
        self.changes.push(ModelChange::AllDataChanged {
            roles: QUANTITY_ROLES.to_vec(),
        });
    }

    /// Full pass in allocation order, starting from a refilled ledger
    fn evaluate_all(&mut self) {
        self.assets.reset();

        let evaluator = Evaluator {
            setup: &self.setup,
            efficiency: &self.efficiency,
            skills: &self.skills,
        };
        for item in self.root.children_mut() {
            evaluator.evaluate_output(item, &mut self.assets);
        }
        self.root.refresh_effective_time();
    }

    /// Re-evaluate one node and everything below it using its parent's current runs
    fn evaluate_subtree(&mut self, path: &NodePath) {
        let parent = path
            .parent()
            .filter(|parent| !parent.is_root())
            .and_then(|parent| self.root.get(&parent))
            .map(|parent| (parent.type_id(), parent.runs()));

        let evaluator = Evaluator {
            setup: &self.setup,
            efficiency: &self.efficiency,
            skills: &self.skills,
        };
        let Some(item) = self.root.get_mut(path) else {
            return;
        };

        match parent {
            Some((parent_type_id, parent_runs)) => {
                evaluator.evaluate_material(item, parent_type_id, parent_runs, &mut self.assets)
            }
            None => evaluator.evaluate_output(item, &mut self.assets),
        }
    }

    /// Ancestors' own times are unaffected, only their critical paths
    fn refresh_ancestor_times(&mut self, seeds: &[NodePath]) {
        let ancestors: BTreeSet<NodePath> =
            seeds.iter().flat_map(|seed| seed.ancestors()).collect();
        let mut ancestors: Vec<NodePath> = ancestors.into_iter().collect();
        ancestors.sort_by_key(|path| Reverse(path.depth()));

        for path in &ancestors {
            if let Some(node) = self.root.get_mut(path) {
                node.refresh_effective_time();
            }
        }
    }

    fn prepare_change(&self, type_id: TypeId) -> PendingChange {
        let seeds = self.type_items.nodes(type_id);
        let ordered = self.holds_stock(seeds);
        let before = if ordered {
            self.collect_values(&[NodePath::root()])
        } else {
            self.collect_values(seeds)
        };

        PendingChange {
            type_id,
            ordered,
            before,
        }
    }

    fn finish_change(&mut self, pending: PendingChange, edited: Option<Role>) {
        let type_id = pending.type_id;
        let seeds = self.type_items.nodes(type_id).to_vec();
        let widened = !pending.ordered && self.holds_stock(&seeds);

        if pending.ordered || widened {
            // stock below the edit can shift to or from later branches
            debug!(type_id, "Stock involved, running ordered evaluation");
            self.evaluate_all();
        } else {
            debug!(type_id, nodes = seeds.len(), "Running targeted evaluation");
            for seed in &seeds {
                self.evaluate_subtree(seed);
            }
            self.refresh_ancestor_times(&seeds);
        }

        let after = if pending.ordered {
            self.collect_values(&[NodePath::root()])
        } else {
            self.collect_values(&seeds)
        };

        let mut changed: BTreeMap<NodePath, BTreeSet<Role>> = BTreeMap::new();
        for (path, values) in &after {
            if path.is_root() {
                continue;
            }
            if let Some(previous) = pending.before.get(path) {
                let roles = previous.changed_roles(values);
                if !roles.is_empty() {
                    changed.entry(path.clone()).or_default().extend(roles);
                }
            }
        }
        if let Some(role) = edited {
            for seed in &seeds {
                changed.entry(seed.clone()).or_default().insert(role);
            }
        }

        for (node, roles) in changed {
            self.changes.push(ModelChange::DataChanged {
                node,
                roles: roles.into_iter().collect(),
            });
        }
        if widened {
            self.changes.push(ModelChange::AllDataChanged {
                roles: QUANTITY_ROLES.to_vec(),
            });
        }
    }

    fn holds_stock(&self, seeds: &[NodePath]) -> bool {
        let mut stocked = false;
        for seed in seeds {
            if let Some(node) = self.root.get(seed) {
                node.walk(seed, &mut |_, node| {
                    stocked |= self.assets.has_stock(node.type_id());
                });
            }
        }
        stocked
    }

    /// Values of the seeds' subtrees and of their ancestors
    fn collect_values(&self, seeds: &[NodePath]) -> HashMap<NodePath, NodeValues> {
        let mut values = HashMap::new();
        for seed in seeds {
            if let Some(node) = self.root.get(seed) {
                node.walk(seed, &mut |path, node| {
                    values.insert(path.clone(), node.values());
                });
            }
            for ancestor in seed.ancestors() {
                if let Some(node) = self.root.get(&ancestor) {
                    values.insert(ancestor, node.values());
                }
            }
        }
        values
    }
}

struct PendingChange {
    type_id: TypeId,
    ordered: bool,
    before: HashMap<NodePath, NodeValues>,
}

/// Creates nodes from blueprint data
struct Expander<'s> {
    provider: &'s dyn ManufacturingInfoProvider,
    setup: &'s ManufacturingSetup,
}

impl Expander<'_> {
    fn output_item(&self, type_id: TypeId) -> TreeNode {
        let settings = self.setup.output_settings(type_id);
        let mut item = TreeNode::new(
            type_id,
            settings.quantity,
            self.provider.manufacturing_info(type_id),
        );
        self.fill_children(&mut item, &mut vec![type_id]);
        item
    }

    /// `lineage` holds the types from the output down to `item`
    fn fill_children(&self, item: &mut TreeNode, lineage: &mut Vec<TypeId>) {
        if lineage.len() > MAX_DEPTH {
            warn!(
                type_id = item.type_id(),
                depth = lineage.len(),
                "Maximum expansion depth exceeded, treating as raw material"
            );
            return;
        }

        let children: Vec<TreeNode> = item
            .manufacturing_info()
            .materials
            .iter()
            .map(|material| {
                let mut child = TreeNode::new(
                    material.material_type_id,
                    material.quantity,
                    self.provider.manufacturing_info(material.material_type_id),
                );

                if self.should_build(&child) {
                    if lineage.contains(&child.type_id()) {
                        warn!(
                            type_id = child.type_id(),
                            "Material requires itself, treating as raw material"
                        );
                    } else {
                        lineage.push(child.type_id());
                        self.fill_children(&mut child, lineage);
                        lineage.pop();
                    }
                }
                child
            })
            .collect();

        for child in children {
            item.append_child(child);
        }
    }

    fn should_build(&self, item: &TreeNode) -> bool {
        item.manufacturing_info().is_manufacturable()
            && self.setup.effective_source(item.type_id()) == InventorySource::Build
    }
}

/// Computes quantities, stock, runs and times top-down
struct Evaluator<'s> {
    setup: &'s ManufacturingSetup,
    efficiency: &'s EfficiencyContext,
    skills: &'s ManufacturingSkills,
}

impl Evaluator<'_> {
    fn evaluate_output(&self, item: &mut TreeNode, ledger: &mut AssetLedger) {
        let settings = self.setup.output_settings(item.type_id());
        self.evaluate(item, settings.quantity, settings.runs, ledger);
    }

    fn evaluate_material(
        &self,
        item: &mut TreeNode,
        parent_type_id: TypeId,
        parent_runs: u32,
        ledger: &mut AssetLedger,
    ) {
        let material_efficiency = self.setup.type_settings(parent_type_id).material_efficiency;
        let required = industry::required_quantity(
            parent_runs,
            item.quantity_per_run(),
            self.efficiency.material_modifier(material_efficiency),
            self.efficiency.material_floor,
        );
        self.evaluate(item, required, None, ledger);
    }

    fn evaluate(
        &self,
        item: &mut TreeNode,
        required: u64,
        runs_override: Option<u32>,
        ledger: &mut AssetLedger,
    ) {
        let taken = ledger.take(item.type_id(), required);
        let runs = match runs_override {
            Some(runs) => runs,
            None if item.is_build() => {
                industry::runs_for(required - taken, item.quantity_produced())
            }
            None => 1,
        };
        item.set_quantities(required, taken, runs);

        let type_id = item.type_id();
        for child in item.children_mut() {
            self.evaluate_material(child, type_id, runs, ledger);
        }

        let time = self.time_to_manufacture(item);
        item.set_time_to_manufacture(time);
        item.refresh_effective_time();
    }

    fn time_to_manufacture(&self, item: &TreeNode) -> Duration {
        if !item.is_build() {
            return Duration::ZERO;
        }

        let time_efficiency = self.setup.type_settings(item.type_id()).time_efficiency;
        industry::time_to_manufacture(
            item.manufacturing_info().base_time,
            item.runs(),
            self.efficiency.time_modifier(time_efficiency, self.skills),
        )
    }
}

/// Types from the output down to `path`, inclusive
fn lineage_of(root: &TreeNode, path: &NodePath) -> Vec<TypeId> {
    let mut lineage = Vec::with_capacity(path.depth());
    let mut node = root;
    for &row in path.rows() {
        match node.child(row) {
            Some(child) => {
                lineage.push(child.type_id());
                node = child;
            }
            None => break,
        }
    }
    lineage
}

/// Drops paths nested below another path of the set
fn outermost(paths: &[NodePath]) -> Vec<NodePath> {
    paths
        .iter()
        .filter(|path| !paths.iter().any(|other| path.is_descendant_of(other)))
        .cloned()
        .collect()
}
