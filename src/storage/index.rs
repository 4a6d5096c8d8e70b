//! BTreeMap-based index structures
//!
//! Indexes use `BTreeMap<IndexKey, Vec<IndexKey>>`: indexed value to the
//! primary keys of the documents carrying it. Primary keys are kept sorted
//! ascending so that entries sharing a value scan in identity order.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

use serde_json::Value;

use super::scan::KeyRange;
use crate::lang::value::compare_values;

/// Index key wrapping a JSON value.
///
/// Ordered by the engine-wide value order, so an index scan visits values
/// in the same order the sort stage would emit them.
#[derive(Debug, Clone)]
pub struct IndexKey(pub Value);

impl IndexKey {
    /// Create a key from a JSON value
    pub fn from_json(value: &Value) -> Self {
        IndexKey(value.clone())
    }

    /// The wrapped value
    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_values(&self.0, &other.0)
    }
}

/// Converts a key range into BTreeMap bounds
pub(crate) fn range_bounds(range: &KeyRange) -> (Bound<IndexKey>, Bound<IndexKey>) {
    let lower = match &range.lower {
        Some(b) if b.inclusive => Bound::Included(IndexKey::from_json(&b.value)),
        Some(b) => Bound::Excluded(IndexKey::from_json(&b.value)),
        None => Bound::Unbounded,
    };
    let upper = match &range.upper {
        Some(b) if b.inclusive => Bound::Included(IndexKey::from_json(&b.value)),
        Some(b) => Bound::Excluded(IndexKey::from_json(&b.value)),
        None => Bound::Unbounded,
    };
    (lower, upper)
}

/// A single field index
#[derive(Debug, Default)]
pub struct IndexTree {
    tree: BTreeMap<IndexKey, Vec<IndexKey>>,
}

impl IndexTree {
    /// Creates a new empty index tree
    pub fn new() -> Self {
        Self {
            tree: BTreeMap::new(),
        }
    }

    /// Insert a primary key under an indexed value.
    ///
    /// Maintains sorted ascending order.
    pub fn insert(&mut self, key: IndexKey, primary: IndexKey) {
        let primaries = self.tree.entry(key).or_default();
        match primaries.binary_search(&primary) {
            Ok(_) => {}
            Err(pos) => primaries.insert(pos, primary),
        }
    }

    /// Remove a primary key from an indexed value.
    ///
    /// If the value has no more primary keys, removes the value entirely.
    pub fn remove(&mut self, key: &IndexKey, primary: &IndexKey) {
        if let Some(primaries) = self.tree.get_mut(key) {
            if let Ok(pos) = primaries.binary_search(primary) {
                primaries.remove(pos);
            }
            if primaries.is_empty() {
                self.tree.remove(key);
            }
        }
    }

    /// Lists `(value, primary)` pairs inside a range, ascending.
    ///
    /// Values of a different type than the range bounds are skipped.
    pub fn scan(&self, range: &KeyRange) -> Vec<(IndexKey, IndexKey)> {
        let mut result = Vec::new();
        if range.is_empty() {
            return result;
        }
        for (key, primaries) in self.tree.range(range_bounds(range)) {
            if !range.contains(key.value()) {
                continue;
            }
            for primary in primaries {
                result.push((key.clone(), primary.clone()));
            }
        }
        result
    }

    /// Returns the number of distinct values
    pub fn key_count(&self) -> usize {
        self.tree.len()
    }

    /// Returns the total number of entries
    pub fn entry_count(&self) -> usize {
        self.tree.values().map(|v| v.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(v: Value) -> IndexKey {
        IndexKey(v)
    }

    #[test]
    fn test_key_ordering() {
        let keys = vec![
            key(json!(null)),
            key(json!(false)),
            key(json!(true)),
            key(json!(-100)),
            key(json!(0.5)),
            key(json!(100)),
            key(json!("aaa")),
            key(json!("zzz")),
        ];

        for i in 1..keys.len() {
            assert!(keys[i - 1] < keys[i], "Keys should be ordered");
        }
        assert_eq!(key(json!(1)), key(json!(1.0)));
    }

    #[test]
    fn test_insert_remove() {
        let mut tree = IndexTree::new();
        tree.insert(key(json!("alice")), key(json!(2)));
        tree.insert(key(json!("alice")), key(json!(1)));
        tree.insert(key(json!("alice")), key(json!(1)));
        tree.insert(key(json!("bob")), key(json!(3)));

        assert_eq!(tree.key_count(), 2);
        assert_eq!(tree.entry_count(), 3);

        tree.remove(&key(json!("bob")), &key(json!(3)));
        assert_eq!(tree.key_count(), 1);
    }

    #[test]
    fn test_scan_orders_and_filters_by_type() {
        let mut tree = IndexTree::new();
        tree.insert(key(json!(5)), key(json!(1)));
        tree.insert(key(json!(1)), key(json!(2)));
        tree.insert(key(json!(3)), key(json!(4)));
        tree.insert(key(json!(3)), key(json!(3)));
        tree.insert(key(json!(null)), key(json!(5)));
        tree.insert(key(json!("3")), key(json!(6)));

        let below = tree.scan(&KeyRange::below(json!(5), false));
        let primaries: Vec<Value> = below.into_iter().map(|(_, p)| p.0).collect();
        assert_eq!(primaries, vec![json!(2), json!(3), json!(4)]);

        let exact = tree.scan(&KeyRange::only(json!(3)));
        assert_eq!(exact.len(), 2);

        let all = tree.scan(&KeyRange::all());
        assert_eq!(all.len(), 6);
    }
}
