//! Change notifications for a view layer

use std::time::Duration;

use crate::models::{InventorySource, TypeId};
use crate::tree::NodePath;

/// Attribute of a node that a view can display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Name,
    TypeId,
    QuantityProduced,
    QuantityRequired,
    Source,
    Time,
    Runs,
    MaterialEfficiency,
    TimeEfficiency,
}

/// Roles derived from quantities and stock
pub const QUANTITY_ROLES: [Role; 3] = [Role::QuantityRequired, Role::Runs, Role::Time];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleValue {
    /// Name lookups are keyed by type id
    TypeId(TypeId),
    Quantity(u64),
    Source(InventorySource),
    Time(Duration),
    Runs(u32),
    Efficiency(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChange {
    /// The whole tree was rebuilt
    Reset,
    RowsRemoved {
        parent: NodePath,
        first: usize,
        last: usize,
    },
    RowsInserted {
        parent: NodePath,
        first: usize,
        last: usize,
    },
    DataChanged {
        node: NodePath,
        roles: Vec<Role>,
    },
    /// Every node may have changed these roles
    AllDataChanged {
        roles: Vec<Role>,
    },
}
