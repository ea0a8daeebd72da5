//! Manufacturing dependency tree
//!
//! Parents own their children. Nodes are addressed by [`NodePath`], the row
//! of each step from the root, and [`TypeItemIndex`] maps a type to every
//! path where it appears.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::changes::Role;
use crate::models::{INVALID_TYPE_ID, ManufacturingInfo, TypeId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_rows(rows: &[usize]) -> Self {
        Self(rows.to_vec())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn rows(&self) -> &[usize] {
        &self.0
    }

    /// 0 for the root, 1 for outputs
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn row(&self) -> Option<usize> {
        self.0.last().copied()
    }

    pub fn child(&self, row: usize) -> Self {
        let mut rows = self.0.clone();
        rows.push(row);
        Self(rows)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rows) = self.0.split_last()?;
        Some(Self(rows.to_vec()))
    }

    /// Parent, grandparent and so on, ending with the root
    pub fn ancestors(&self) -> impl Iterator<Item = NodePath> + '_ {
        (0..self.0.len())
            .rev()
            .map(move |len| Self(self.0[..len].to_vec()))
    }

    pub fn is_descendant_of(&self, other: &NodePath) -> bool {
        self.0.len() > other.0.len() && self.0.starts_with(&other.0)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for row in &self.0 {
            write!(f, "/{}", row)?;
        }
        Ok(())
    }
}

/// One output or material requirement
#[derive(Debug, Clone)]
pub struct TreeNode {
    type_id: TypeId,
    quantity_per_run: u64,
    info: ManufacturingInfo,
    quantity_required: u64,
    assets_taken: u64,
    runs: u32,
    time_to_manufacture: Duration,
    effective_time: Duration,
    children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn root() -> Self {
        Self::new(INVALID_TYPE_ID, 0, ManufacturingInfo::raw())
    }

    /// `quantity_per_run` is the blueprint entry of the parent, or the
    /// desired quantity for an output
    pub fn new(type_id: TypeId, quantity_per_run: u64, info: ManufacturingInfo) -> Self {
        Self {
            type_id,
            quantity_per_run,
            info,
            quantity_required: 0,
            assets_taken: 0,
            runs: 1,
            time_to_manufacture: Duration::ZERO,
            effective_time: Duration::ZERO,
            children: Vec::new(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn quantity_per_run(&self) -> u64 {
        self.quantity_per_run
    }

    pub fn manufacturing_info(&self) -> &ManufacturingInfo {
        &self.info
    }

    pub fn quantity_produced(&self) -> u64 {
        self.info.quantity_produced.max(1)
    }

    /// Units needed by the parent before stock is applied
    pub fn quantity_required(&self) -> u64 {
        self.quantity_required
    }

    pub fn assets_taken(&self) -> u64 {
        self.assets_taken
    }

    /// Units still missing after stock
    pub fn effective_quantity_required(&self) -> u64 {
        self.quantity_required.saturating_sub(self.assets_taken)
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }

    /// A node is built when it has been expanded into materials
    pub fn is_build(&self) -> bool {
        !self.children.is_empty()
    }

    /// This node's own job time
    pub fn time_to_manufacture(&self) -> Duration {
        self.time_to_manufacture
    }

    /// Own time plus the slowest build below it
    pub fn effective_time(&self) -> Duration {
        self.effective_time
    }

    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [TreeNode] {
        &mut self.children
    }

    pub fn child(&self, row: usize) -> Option<&TreeNode> {
        self.children.get(row)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn append_child(&mut self, child: TreeNode) {
        self.children.push(child);
    }

    /// Drops all children and returns how many there were
    pub fn clear_children(&mut self) -> usize {
        let count = self.children.len();
        self.children.clear();
        count
    }

    pub fn get(&self, path: &NodePath) -> Option<&TreeNode> {
        path.rows()
            .iter()
            .try_fold(self, |node, &row| node.children.get(row))
    }

    pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut TreeNode> {
        path.rows()
            .iter()
            .try_fold(self, |node, &row| node.children.get_mut(row))
    }

    pub(crate) fn set_quantities(&mut self, quantity_required: u64, assets_taken: u64, runs: u32) {
        self.quantity_required = quantity_required;
        self.assets_taken = assets_taken;
        self.runs = runs;
    }

    pub(crate) fn set_time_to_manufacture(&mut self, time: Duration) {
        self.time_to_manufacture = time;
    }

    /// Recompute the critical path from this node's own time and its children
    pub(crate) fn refresh_effective_time(&mut self) {
        let slowest_child = self
            .children
            .iter()
            .filter(|child| child.is_build())
            .map(TreeNode::effective_time)
            .max()
            .unwrap_or(Duration::ZERO);
        self.effective_time = self.time_to_manufacture + slowest_child;
    }

    /// Depth-first, parent before children, children in row order
    pub fn walk<F>(&self, path: &NodePath, visit: &mut F)
    where
        F: FnMut(&NodePath, &TreeNode),
    {
        visit(path, self);
        for (row, child) in self.children.iter().enumerate() {
            child.walk(&path.child(row), visit);
        }
    }

    pub(crate) fn values(&self) -> NodeValues {
        NodeValues {
            quantity_required: self.effective_quantity_required(),
            runs: self.runs,
            effective_time: self.effective_time,
        }
    }
}

/// Derived attributes compared before and after an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeValues {
    quantity_required: u64,
    runs: u32,
    effective_time: Duration,
}

impl NodeValues {
    pub(crate) fn changed_roles(&self, other: &NodeValues) -> Vec<Role> {
        let mut roles = Vec::new();
        if self.quantity_required != other.quantity_required {
            roles.push(Role::QuantityRequired);
        }
        if self.runs != other.runs {
            roles.push(Role::Runs);
        }
        if self.effective_time != other.effective_time {
            roles.push(Role::Time);
        }
        roles
    }
}

/// Every tree position of each type
#[derive(Debug, Clone, Default)]
pub struct TypeItemIndex {
    items: HashMap<TypeId, Vec<NodePath>>,
}

impl TypeItemIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-index the whole tree below `root`
    pub fn rebuild(&mut self, root: &TreeNode) {
        self.items.clear();
        for (row, child) in root.children().iter().enumerate() {
            child.walk(&NodePath::root().child(row), &mut |path, node| {
                self.items
                    .entry(node.type_id())
                    .or_default()
                    .push(path.clone());
            });
        }
    }

    /// Positions in tree order
    pub fn nodes(&self, type_id: TypeId) -> &[NodePath] {
        self.items.get(&type_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.items.contains_key(&type_id)
    }

    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.items.keys().copied()
    }

    pub fn type_count(&self) -> usize {
        self.items.len()
    }

    pub fn node_count(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }
}
