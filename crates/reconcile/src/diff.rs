//! Collection diffing.
//!
//! [`diff`] partitions two unordered collections into added and removed
//! elements by a string signature. [`keyed_diff`] additionally reports
//! elements present on both sides whose content changed.

use std::collections::{HashMap, HashSet};

/// Elements only in the new collection, and only in the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDelta<T> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
}

impl<T> CollectionDelta<T> {
    /// Check if nothing was added or removed
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Map both sides, e.g. from records to their backend IDs
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> CollectionDelta<U> {
        CollectionDelta {
            added: self.added.into_iter().map(&mut f).collect(),
            removed: self.removed.into_iter().map(f).collect(),
        }
    }
}

impl<T> Default for CollectionDelta<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
        }
    }
}

/// A keyed diff: adds, removes, and `(old, new)` pairs that changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedDelta<T> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
    pub updated: Vec<(T, T)>,
}

impl<T> KeyedDelta<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

impl<T> Default for KeyedDelta<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            updated: Vec::new(),
        }
    }
}

/// Index by signature, keeping first-seen order. A later duplicate replaces
/// the earlier element in its slot.
fn index<'a, T>(items: &'a [T], signature: &impl Fn(&T) -> String) -> Vec<(String, &'a T)> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(items.len());
    let mut indexed: Vec<(String, &T)> = Vec::with_capacity(items.len());
    for item in items {
        let key = signature(item);
        match slots.get(&key) {
            Some(&slot) => indexed[slot].1 = item,
            None => {
                slots.insert(key.clone(), indexed.len());
                indexed.push((key, item));
            }
        }
    }
    indexed
}

/// Compute the elements added to and removed from a collection.
///
/// Elements whose signature appears on both sides are in neither bucket,
/// even if other fields differ. Pick a signature that is unique within one
/// collection, or spurious adds and removes follow.
pub fn diff<T: Clone>(old: &[T], new: &[T], signature: impl Fn(&T) -> String) -> CollectionDelta<T> {
    let old_index = index(old, &signature);
    let new_index = index(new, &signature);
    let old_keys: HashSet<&str> = old_index.iter().map(|(key, _)| key.as_str()).collect();
    let new_keys: HashSet<&str> = new_index.iter().map(|(key, _)| key.as_str()).collect();

    CollectionDelta {
        added: new_index
            .iter()
            .filter(|(key, _)| !old_keys.contains(key.as_str()))
            .map(|(_, item)| (*item).clone())
            .collect(),
        removed: old_index
            .iter()
            .filter(|(key, _)| !new_keys.contains(key.as_str()))
            .map(|(_, item)| (*item).clone())
            .collect(),
    }
}

/// Diff plain strings by their own value.
pub fn diff_values(old: &[String], new: &[String]) -> CollectionDelta<String> {
    diff(old, new, String::clone)
}

/// Compute a keyed diff.
///
/// `key` selects the business key; `changed` decides whether two elements
/// with the same key differ in content.
pub fn keyed_diff<T: Clone>(
    old: &[T],
    new: &[T],
    key: impl Fn(&T) -> String,
    changed: impl Fn(&T, &T) -> bool,
) -> KeyedDelta<T> {
    let old_index = index(old, &key);
    let new_index = index(new, &key);
    let old_map: HashMap<&str, &T> = old_index.iter().map(|(k, item)| (k.as_str(), *item)).collect();
    let new_keys: HashSet<&str> = new_index.iter().map(|(k, _)| k.as_str()).collect();

    let mut delta = KeyedDelta::default();
    for (k, item) in &new_index {
        match old_map.get(k.as_str()) {
            None => delta.added.push((*item).clone()),
            Some(previous) if changed(previous, item) => {
                delta.updated.push(((*previous).clone(), (*item).clone()));
            }
            Some(_) => {}
        }
    }
    delta.removed = old_index
        .iter()
        .filter(|(k, _)| !new_keys.contains(k.as_str()))
        .map(|(_, item)| (*item).clone())
        .collect();
    delta
}
