use std::collections::HashMap;

use crate::association::PoolEntry;
use crate::geo::GeoPoint;

/// A pooled contact stamped with the engine clock at arrival
#[derive(Debug, Clone)]
pub(crate) struct Received<T> {
    pub contact: T,
    pub at_ms: u64,
}

impl<T: PoolEntry> PoolEntry for Received<T> {
    fn key(&self) -> &str {
        self.contact.key()
    }

    fn position(&self) -> GeoPoint {
        self.contact.position()
    }
}

/// Keyed collection that iterates in first-insertion order.
///
/// Replacing the value under an existing key keeps its position, so
/// association scans and published track lists stay stable across updates.
#[derive(Debug, Clone)]
pub(crate) struct OrderedPool<T> {
    entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> Default for OrderedPool<T> {
    fn default() -> Self {
        OrderedPool {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> OrderedPool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns true when the key is new.
    pub fn upsert(&mut self, key: &str, value: T) -> bool {
        match self.index.get(key) {
            Some(&i) => {
                self.entries[i].1 = value;
                false
            }
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), value));
                true
            }
        }
    }

    /// Mutable access to the value under `key`, inserting `make()` first
    /// when the key is new
    pub fn get_or_insert_with<F>(&mut self, key: &str, make: F) -> &mut T
    where
        F: FnOnce() -> T,
    {
        let i = match self.index.get(key) {
            Some(&i) => i,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), make()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[i].1
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn remove(&mut self, key: &str) -> Option<T> {
        let i = self.index.remove(key)?;
        let (_, value) = self.entries.remove(i);
        self.reindex(i);
        Some(value)
    }

    /// Remove every entry for which `remove` returns true, handing them back
    /// in pool order.
    pub fn drain_where<F>(&mut self, mut remove: F) -> Vec<(String, T)>
    where
        F: FnMut(&T) -> bool,
    {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.entries.len());
        for (key, value) in self.entries.drain(..) {
            if remove(&value) {
                removed.push((key, value));
            } else {
                kept.push((key, value));
            }
        }
        self.entries = kept;
        if !removed.is_empty() {
            self.index.clear();
            self.reindex(0);
        }
        removed
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn reindex(&mut self, from: usize) {
        for (i, (key, _)) in self.entries.iter().enumerate().skip(from) {
            self.index.insert(key.clone(), i);
        }
    }
}
