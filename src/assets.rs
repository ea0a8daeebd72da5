//! Shared pool of on-hand materials
//!
//! Every node draws from the same ledger, so stock claimed by one branch
//! is not available to the branches evaluated after it.

use std::collections::HashMap;

use crate::models::TypeId;
use crate::providers::AssetProvider;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetQuantity {
    pub initial: u64,
    pub current: u64,
}

#[derive(Debug, Clone, Default)]
pub struct AssetLedger {
    quantities: HashMap<TypeId, AssetQuantity>,
}

impl AssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim up to `max_wanted` units, returning how many were granted
    pub fn take(&mut self, type_id: TypeId, max_wanted: u64) -> u64 {
        let entry = self.quantities.entry(type_id).or_default();
        let taken = max_wanted.min(entry.current);
        entry.current -= taken;
        taken
    }

    /// Replace the ledger with fresh quantities for `types`
    pub fn snapshot<I>(&mut self, types: I, provider: &dyn AssetProvider)
    where
        I: IntoIterator<Item = TypeId>,
    {
        self.quantities.clear();
        for type_id in types {
            self.insert_from(type_id, provider);
        }
    }

    /// Load a type not seen before; returns the loaded initial quantity
    pub fn ensure(&mut self, type_id: TypeId, provider: &dyn AssetProvider) -> u64 {
        if let Some(quantity) = self.quantities.get(&type_id) {
            return quantity.initial;
        }
        self.insert_from(type_id, provider)
    }

    fn insert_from(&mut self, type_id: TypeId, provider: &dyn AssetProvider) -> u64 {
        let initial = provider.asset_quantity(type_id);
        self.quantities.insert(
            type_id,
            AssetQuantity {
                initial,
                current: initial,
            },
        );
        initial
    }

    /// Drop entries for types the tree no longer contains
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(TypeId) -> bool,
    {
        self.quantities.retain(|&type_id, _| keep(type_id));
    }

    /// Return every claimed unit to the pool
    pub fn reset(&mut self) {
        for quantity in self.quantities.values_mut() {
            quantity.current = quantity.initial;
        }
    }

    pub fn get(&self, type_id: TypeId) -> Option<AssetQuantity> {
        self.quantities.get(&type_id).copied()
    }

    pub fn has_stock(&self, type_id: TypeId) -> bool {
        self.quantities
            .get(&type_id)
            .is_some_and(|quantity| quantity.initial > 0)
    }

    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::AssetSnapshot;

    const TRITANIUM: TypeId = 34;
    const PYERITE: TypeId = 35;

    #[test]
    fn test_take_is_capped_by_stock() {
        let provider = AssetSnapshot::new().with_quantity(TRITANIUM, 20);
        let mut ledger = AssetLedger::new();
        ledger.snapshot([TRITANIUM], &provider);

        assert_eq!(ledger.take(TRITANIUM, 15), 15);
        assert_eq!(ledger.take(TRITANIUM, 15), 5);
        assert_eq!(ledger.take(TRITANIUM, 15), 0);
        assert_eq!(
            ledger.get(TRITANIUM),
            Some(AssetQuantity {
                initial: 20,
                current: 0
            })
        );
    }

    #[test]
    fn test_take_unknown_type_creates_empty_entry() {
        let mut ledger = AssetLedger::new();
        assert_eq!(ledger.take(PYERITE, 10), 0);
        assert_eq!(ledger.get(PYERITE), Some(AssetQuantity::default()));
    }

    #[test]
    fn test_reset_restores_initial() {
        let provider = AssetSnapshot::new().with_quantity(TRITANIUM, 20);
        let mut ledger = AssetLedger::new();
        ledger.snapshot([TRITANIUM], &provider);
        ledger.take(TRITANIUM, 12);
        ledger.reset();
        assert_eq!(ledger.get(TRITANIUM).map(|q| q.current), Some(20));
    }

    #[test]
    fn test_snapshot_drops_stale_types() {
        let provider = AssetSnapshot::new()
            .with_quantity(TRITANIUM, 20)
            .with_quantity(PYERITE, 3);
        let mut ledger = AssetLedger::new();
        ledger.snapshot([TRITANIUM, PYERITE], &provider);
        ledger.snapshot([PYERITE], &provider);
        assert_eq!(ledger.len(), 1);
        assert!(!ledger.has_stock(TRITANIUM));
        assert!(ledger.has_stock(PYERITE));
    }

    #[test]
    fn test_ensure_keeps_existing_entries() {
        let provider = AssetSnapshot::new().with_quantity(TRITANIUM, 20);
        let mut ledger = AssetLedger::new();
        ledger.snapshot([TRITANIUM], &provider);
        ledger.take(TRITANIUM, 5);

        assert_eq!(ledger.ensure(TRITANIUM, &provider), 20);
        assert_eq!(ledger.get(TRITANIUM).map(|q| q.current), Some(15));
        assert_eq!(ledger.ensure(PYERITE, &provider), 0);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_retain_drops_unlisted_types() {
        let provider = AssetSnapshot::new()
            .with_quantity(TRITANIUM, 20)
            .with_quantity(PYERITE, 3);
        let mut ledger = AssetLedger::new();
        ledger.snapshot([TRITANIUM, PYERITE], &provider);
        ledger.take(TRITANIUM, 5);

        ledger.retain(|type_id| type_id == TRITANIUM);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(PYERITE), None);
        assert_eq!(ledger.get(TRITANIUM).map(|q| q.current), Some(15));
    }
}
