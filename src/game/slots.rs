//! Sparse slot arena keyed by small player indices

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sparse mapping from slot index to entry, iterated in slot order.
///
/// Slots keep their identity across removals, so a player at slot 3 stays at
/// slot 3 when slot 1 leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slots<T> {
    entries: BTreeMap<usize, T>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> Slots<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: usize) -> Option<&T> {
        self.entries.get(&slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.entries.get_mut(&slot)
    }

    pub fn contains(&self, slot: usize) -> bool {
        self.entries.contains_key(&slot)
    }

    /// Put an entry at `slot`, returning whatever was there
    pub fn insert(&mut self, slot: usize, value: T) -> Option<T> {
        self.entries.insert(slot, value)
    }

    /// Put an entry at `slot` and hand back a reference to it
    pub fn replace(&mut self, slot: usize, value: T) -> &mut T {
        match self.entries.entry(slot) {
            Entry::Occupied(mut entry) => {
                entry.insert(value);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(value),
        }
    }

    pub fn remove(&mut self, slot: usize) -> Option<T> {
        self.entries.remove(&slot)
    }

    /// Entry at `slot`, created with `make` if the slot is empty
    pub fn get_or_insert_with(&mut self, slot: usize, make: impl FnOnce() -> T) -> &mut T {
        self.entries.entry(slot).or_insert_with(make)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.entries.iter().map(|(slot, value)| (*slot, value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.entries.iter_mut().map(|(slot, value)| (*slot, value))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    /// Occupied slots in ascending order
    pub fn slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }
}
