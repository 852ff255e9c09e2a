//! Tracking of which entities are currently touching
//!
//! The tracker stores unordered pairs of entity keys. A pair is normalized on
//! construction so `{A, B}` and `{B, A}` are the same value, which makes the
//! set hold at most one entry per touching couple. Self pairs `{A, A}` are
//! recorded when two bodies of one entity touch, but they never count as an
//! overlap between distinct entities.

use std::collections::BTreeSet;

use crate::dynamic_world::EntityKey;

/// Unordered pair of entities in contact
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollidingPair {
    first: EntityKey,
    second: EntityKey,
}

impl CollidingPair {
    pub fn new(a: EntityKey, b: EntityKey) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    pub fn first(&self) -> EntityKey {
        self.first
    }

    pub fn second(&self) -> EntityKey {
        self.second
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.first == key || self.second == key
    }

    /// The partner of `key` in this pair
    pub fn other(&self, key: EntityKey) -> Option<EntityKey> {
        if self.first == key {
            Some(self.second)
        } else if self.second == key {
            Some(self.first)
        } else {
            None
        }
    }

    /// Both sides are the same entity
    pub fn is_self(&self) -> bool {
        self.first == self.second
    }
}

/// Set of colliding pairs, unique per unordered couple
#[derive(Debug, Default, Clone)]
pub struct CollisionPairTracker {
    pairs: BTreeSet<CollidingPair>,
}

impl CollisionPairTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pair; returns false if it was already tracked
    pub fn insert(&mut self, a: EntityKey, b: EntityKey) -> bool {
        self.pairs.insert(CollidingPair::new(a, b))
    }

    /// Forget a pair; returns false if it was not tracked
    pub fn remove(&mut self, a: EntityKey, b: EntityKey) -> bool {
        self.pairs.remove(&CollidingPair::new(a, b))
    }

    pub fn contains(&self, a: EntityKey, b: EntityKey) -> bool {
        self.pairs.contains(&CollidingPair::new(a, b))
    }

    /// Drop every pair involving `key`
    pub fn remove_entity(&mut self, key: EntityKey) -> usize {
        let before = self.pairs.len();
        self.pairs.retain(|pair| !pair.contains(key));
        before - self.pairs.len()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollidingPair> + '_ {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pairs made of two different entities
    pub fn distinct(&self) -> impl Iterator<Item = &CollidingPair> + '_ {
        self.pairs.iter().filter(|pair| !pair.is_self())
    }

    pub fn has_distinct(&self) -> bool {
        self.distinct().next().is_some()
    }

    /// Remove every pair for which `still_touching` returns false
    ///
    /// Returns the removed pairs in order.
    pub fn sweep(&mut self, mut still_touching: impl FnMut(&CollidingPair) -> bool) -> Vec<CollidingPair> {
        let lost: Vec<CollidingPair> = self.pairs.iter().filter(|p| !still_touching(p)).copied().collect();
        for pair in &lost {
            self.pairs.remove(pair);
        }
        lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<EntityKey> {
        let mut map: SlotMap<EntityKey, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn test_pair_is_unordered() {
        let k = keys(2);
        assert_eq!(CollidingPair::new(k[0], k[1]), CollidingPair::new(k[1], k[0]));
        assert_eq!(CollidingPair::new(k[1], k[0]).other(k[0]), Some(k[1]));
    }

    #[test]
    fn test_insert_is_unique() {
        let k = keys(2);
        let mut tracker = CollisionPairTracker::new();
        assert!(tracker.insert(k[0], k[1]));
        assert!(!tracker.insert(k[1], k[0]));
        assert_eq!(tracker.len(), 1);
        assert!(tracker.contains(k[1], k[0]));
    }

    #[test]
    fn test_self_pairs_are_not_distinct() {
        let k = keys(2);
        let mut tracker = CollisionPairTracker::new();
        tracker.insert(k[0], k[0]);
        assert_eq!(tracker.len(), 1);
        assert!(!tracker.has_distinct());

        tracker.insert(k[0], k[1]);
        assert!(tracker.has_distinct());
    }

    #[test]
    fn test_remove_entity() {
        let k = keys(3);
        let mut tracker = CollisionPairTracker::new();
        tracker.insert(k[0], k[1]);
        tracker.insert(k[2], k[0]);
        tracker.insert(k[1], k[2]);

        assert_eq!(tracker.remove_entity(k[0]), 2);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.contains(k[1], k[2]));
    }

    #[test]
    fn test_sweep_returns_lost_pairs() {
        let k = keys(3);
        let mut tracker = CollisionPairTracker::new();
        tracker.insert(k[0], k[1]);
        tracker.insert(k[1], k[2]);

        let lost = tracker.sweep(|pair| !pair.contains(k[2]));
        assert_eq!(lost, vec![CollidingPair::new(k[1], k[2])]);
        assert_eq!(tracker.len(), 1);
    }
}
