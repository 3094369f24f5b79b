//! Insertion-ordered map with O(1) key lookup.
//!
//! Values are kept in a `Vec` in caller-controlled order; a side index maps
//! each key to its current position. The key of a value is derived by the
//! extractor supplied at construction, so a value can never be stored under a
//! key that disagrees with its own contents.
//!
//! Invariants:
//! - `index.len() == values.len()`.
//! - For every position `i`, `index[key_of(&values[i])] == i`.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

#[derive(Clone)]
pub struct OrderedMap<K, V> {
    values: Vec<V>,
    index: HashMap<K, usize>,
    key_of: fn(&V) -> K,
}

impl<K, V> OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(key_of: fn(&V) -> K) -> Self {
        Self {
            values: Vec::new(),
            index: HashMap::new(),
            key_of,
        }
    }

    /// Build a map from `values` in the given order.
    ///
    /// Later values replace earlier ones with the same key, following the
    /// same rules as [`OrderedMap::append`].
    pub fn from_values(key_of: fn(&V) -> K, values: impl IntoIterator<Item = V>) -> Self {
        let mut map = Self::new(key_of);
        for value in values {
            map.append(value);
        }
        map
    }

    /// Append `value` at the end.
    ///
    /// If the key is already present the old entry is removed first, so the
    /// value always lands at the end and the size grows by at most one.
    pub fn append(&mut self, value: V) {
        let key = (self.key_of)(&value);
        if let Some(&idx) = self.index.get(&key) {
            self.values.remove(idx);
            self.reindex_from(idx);
        }
        self.index.insert(key, self.values.len());
        self.values.push(value);
    }

    pub fn find(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&idx| &self.values[idx])
    }

    /// Mutable lookup. Callers must not change the value's key.
    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = *self.index.get(key)?;
        let value = &mut self.values[idx];
        debug_assert!((self.key_of)(value) == *key);
        Some(value)
    }

    pub fn find_idx(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn has(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn at(&self, idx: usize) -> Option<&V> {
        self.values.get(idx)
    }

    pub fn remove_by_key(&mut self, key: &K) -> Option<V> {
        let idx = self.index.remove(key)?;
        let value = self.values.remove(idx);
        self.reindex_from(idx);
        Some(value)
    }

    pub fn remove_by_idx(&mut self, idx: usize) -> Option<V> {
        if idx >= self.values.len() {
            return None;
        }
        let value = self.values.remove(idx);
        self.index.remove(&(self.key_of)(&value));
        self.reindex_from(idx);
        Some(value)
    }

    /// Move the element at `from` up to position `to`.
    ///
    /// Elements previously at `[to, from)` move one slot toward `from`; every
    /// other element keeps its position. Returns `false` and leaves the map
    /// untouched when `from` is out of bounds or `to > from`.
    pub fn shift_upward(&mut self, from: usize, to: usize) -> bool {
        debug_assert!(from >= to, "shift_upward expects from >= to, got [{from}, {to}]");
        if from >= self.values.len() || to > from {
            return false;
        }
        self.values[to..=from].rotate_right(1);
        for idx in to..=from {
            let key = (self.key_of)(&self.values[idx]);
            self.index.insert(key, idx);
        }
        true
    }

    /// Transform every value in current order without mutating the map.
    pub fn map<T>(&self, f: impl FnMut(&V) -> T) -> Vec<T> {
        self.values.iter().map(f).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.values.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.values.iter().map(self.key_of)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[V] {
        &self.values
    }

    fn reindex_from(&mut self, start: usize) {
        for idx in start..self.values.len() {
            let key = (self.key_of)(&self.values[idx]);
            self.index.insert(key, idx);
        }
    }
}

impl<'a, K, V> IntoIterator for &'a OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    type Item = &'a V;
    type IntoIter = std::slice::Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V: fmt::Debug> fmt::Debug for OrderedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Value {
        id: &'static str,
        val: i32,
    }

    fn key(v: &Value) -> &'static str {
        v.id
    }

    fn v(id: &'static str, val: i32) -> Value {
        Value { id, val }
    }

    fn ids(m: &OrderedMap<&'static str, Value>) -> Vec<&'static str> {
        m.keys().collect()
    }

    #[test]
    fn lookup_after_construction() {
        let m = OrderedMap::from_values(key, [v("a", 23), v("xy", 100)]);
        assert_eq!(m.len(), 2);
        assert!(m.has(&"a"));
        assert_eq!(m.find(&"xy").map(|v| v.val), Some(100));
        assert_eq!(m.at(0).map(|v| v.val), Some(23));
        assert_eq!(m.at(2), None);
        assert_eq!(m.find_idx(&"xy"), Some(1));
        assert_eq!(m.find_idx(&"zz"), None);
    }

    #[test]
    fn append_replaces_and_moves_to_end() {
        let mut m = OrderedMap::from_values(key, [v("a", 1), v("b", 2), v("c", 3)]);
        m.append(v("a", 10));
        assert_eq!(ids(&m), ["b", "c", "a"]);
        assert_eq!(m.len(), 3);
        assert_eq!(m.find(&"a"), Some(&v("a", 10)));
        assert_eq!(m.find_idx(&"b"), Some(0));
        assert_eq!(m.find_idx(&"a"), Some(2));
    }

    #[test]
    fn remove_by_idx_then_key_keeps_tail_order() {
        let mut m = OrderedMap::from_values(
            key,
            [v("A", 0), v("B", 1), v("C", 2), v("D", 3), v("E", 4)],
        );
        assert_eq!(m.remove_by_idx(0), Some(v("A", 0)));
        assert_eq!(m.remove_by_key(&"B"), Some(v("B", 1)));
        assert_eq!(ids(&m), ["C", "D", "E"]);
        assert_eq!(m.find_idx(&"E"), Some(2));
        assert!(!m.has(&"A"));
        assert!(!m.has(&"B"));
    }

    #[test]
    fn removing_missing_entries_is_reported() {
        let mut m = OrderedMap::from_values(key, [v("a", 1)]);
        assert_eq!(m.remove_by_key(&"nope"), None);
        assert_eq!(m.remove_by_idx(3), None);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn shift_upward_moves_one_element() {
        let mut m = OrderedMap::from_values(
            key,
            [v("A", 0), v("B", 1), v("C", 2), v("D", 3), v("E", 4)],
        );
        assert!(m.shift_upward(4, 1));
        assert_eq!(ids(&m), ["A", "E", "B", "C", "D"]);
        for (idx, id) in ["A", "E", "B", "C", "D"].iter().enumerate() {
            assert_eq!(m.find_idx(id), Some(idx));
        }
    }

    #[test]
    fn shift_upward_to_same_slot_is_identity() {
        let mut m = OrderedMap::from_values(key, [v("a", 1), v("b", 2)]);
        assert!(m.shift_upward(1, 1));
        assert_eq!(ids(&m), ["a", "b"]);
    }

    #[test]
    fn shift_upward_out_of_bounds_is_rejected() {
        let mut m = OrderedMap::from_values(key, [v("a", 1), v("b", 2)]);
        assert!(!m.shift_upward(5, 0));
        assert_eq!(ids(&m), ["a", "b"]);
    }

    #[test]
    fn mixed_sequence() {
        let arr = [v("a", 23), v("xy", 100)];
        let mut m = OrderedMap::from_values(key, arr.clone());
        m.append(v("bc", 345));
        m.remove_by_idx(0);
        m.remove_by_key(&"xy");
        assert_eq!(m.len(), 1);
        assert_eq!(m.at(0).map(|v| v.val), Some(345));

        m.append(arr[0].clone());
        m.append(arr[1].clone());
        m.append(v("bc", 123));
        m.append(v("cd", 234));
        m.append(v("de", 367));
        m.shift_upward(4, 1);
        assert_eq!(
            m.map(|v| (v.id, v.val)),
            [("a", 23), ("de", 367), ("xy", 100), ("bc", 123), ("cd", 234)]
        );
    }
}
