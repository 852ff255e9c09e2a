//! Counts of the entity kinds a player may place

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entities::EntityTag;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantity {
    Countable(u32),
    Infinite,
}

impl Quantity {
    pub fn is_available(&self) -> bool {
        !matches!(self, Quantity::Countable(0))
    }
}

/// One entry of an [`Inventory`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub tag: EntityTag,
    pub quantity: Quantity,
}

/// Available entity kinds and how many of each remain
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    items: BTreeMap<EntityTag, InventoryItem>,
    #[serde(default)]
    frozen: bool,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inventory used while authoring a level: every kind, unlimited
    pub fn building() -> Self {
        let mut inventory = Self::new();
        for tag in EntityTag::ALL {
            inventory.set(tag, Quantity::Infinite);
        }
        inventory.make_unmodifiable();
        inventory
    }

    /// Builder form of [`Inventory::set`]
    pub fn with_item(mut self, tag: EntityTag, quantity: Quantity) -> Self {
        self.set(tag, quantity);
        self
    }

    /// Set the quantity of a kind; ignored once the inventory is frozen
    pub fn set(&mut self, tag: EntityTag, quantity: Quantity) -> bool {
        if self.frozen {
            log::warn!("inventory is unmodifiable, ignoring {} quantity change", tag);
            return false;
        }
        self.items.insert(tag, InventoryItem { tag, quantity });
        true
    }

    /// Take one item of a kind
    ///
    /// Always succeeds for an infinite item; fails for an unknown kind or a
    /// count of zero.
    pub fn pick(&mut self, tag: EntityTag) -> bool {
        match self.items.get_mut(&tag).map(|item| &mut item.quantity) {
            Some(Quantity::Infinite) => true,
            Some(Quantity::Countable(n)) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }

    /// Give one item of a kind back, creating the entry if needed
    pub fn put(&mut self, tag: EntityTag) {
        let item = self.items.entry(tag).or_insert(InventoryItem {
            tag,
            quantity: Quantity::Countable(0),
        });
        if let Quantity::Countable(n) = &mut item.quantity {
            *n += 1;
        }
    }

    /// Remaining count of a kind; `u32::MAX` for infinite items
    pub fn quantity(&self, tag: EntityTag) -> u32 {
        match self.items.get(&tag).map(|item| item.quantity) {
            Some(Quantity::Countable(n)) => n,
            Some(Quantity::Infinite) => u32::MAX,
            None => 0,
        }
    }

    /// Items that can still be picked
    pub fn items(&self) -> Vec<InventoryItem> {
        self.items
            .values()
            .filter(|item| item.quantity.is_available())
            .copied()
            .collect()
    }

    pub fn is_modifiable(&self) -> bool {
        !self.frozen
    }

    /// Freeze the configured quantities
    pub fn make_unmodifiable(&mut self) {
        self.frozen = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_decrements_until_empty() {
        let mut inventory = Inventory::new().with_item(EntityTag::Domino, Quantity::Countable(2));
        assert!(inventory.pick(EntityTag::Domino));
        assert!(inventory.pick(EntityTag::Domino));
        assert!(!inventory.pick(EntityTag::Domino));
        assert_eq!(inventory.quantity(EntityTag::Domino), 0);
        assert!(inventory.items().is_empty());
    }

    #[test]
    fn test_infinite_never_runs_out() {
        let mut inventory = Inventory::new().with_item(EntityTag::Rope, Quantity::Infinite);
        for _ in 0..100 {
            assert!(inventory.pick(EntityTag::Rope));
        }
        assert_eq!(inventory.quantity(EntityTag::Rope), u32::MAX);
        inventory.put(EntityTag::Rope);
        assert_eq!(inventory.quantity(EntityTag::Rope), u32::MAX);
    }

    #[test]
    fn test_put_creates_missing_item() {
        let mut inventory = Inventory::new();
        assert_eq!(inventory.quantity(EntityTag::Spring), 0);
        assert!(!inventory.pick(EntityTag::Spring));
        inventory.put(EntityTag::Spring);
        assert_eq!(inventory.quantity(EntityTag::Spring), 1);
        assert_eq!(
            inventory.items(),
            vec![InventoryItem {
                tag: EntityTag::Spring,
                quantity: Quantity::Countable(1)
            }]
        );
    }

    #[test]
    fn test_frozen_inventory_keeps_quantities() {
        let mut inventory = Inventory::new().with_item(EntityTag::Lever, Quantity::Countable(1));
        inventory.make_unmodifiable();
        assert!(!inventory.is_modifiable());
        assert!(!inventory.set(EntityTag::Lever, Quantity::Infinite));
        assert_eq!(inventory.quantity(EntityTag::Lever), 1);
        assert!(inventory.pick(EntityTag::Lever));
    }

    #[test]
    fn test_building_inventory_is_unlimited() {
        let mut inventory = Inventory::building();
        for tag in EntityTag::ALL {
            assert!(inventory.pick(tag));
        }
        assert_eq!(inventory.items().len(), EntityTag::ALL.len());
    }
}
