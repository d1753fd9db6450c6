//! Persistent keyed snapshots.
//!
//! A `Snapshot` is never mutated in place: `set` returns a new snapshot that
//! shares every untouched key and value with its predecessor. Only the index
//! of `Arc` pointers is copied; nothing behind them is reallocated by a write
//! to a different key.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub struct Snapshot<V> {
    entries: Arc<BTreeMap<Arc<str>, Arc<V>>>,
}

impl<V> Snapshot<V> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key).map(Arc::as_ref)
    }

    /// Shared handle to a value; stays valid after later writes.
    pub fn get_shared(&self, key: &str) -> Option<Arc<V>> {
        self.entries.get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Replace one key, returning the new snapshot.
    pub fn set(&self, key: impl Into<Arc<str>>, value: V) -> Self {
        let mut entries = (*self.entries).clone();
        entries.insert(key.into(), Arc::new(value));
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Drop one key, returning the new snapshot.
    pub fn remove(&self, key: &str) -> Self {
        if !self.has(key) {
            return self.clone();
        }
        let mut entries = (*self.entries).clone();
        entries.remove(key);
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| &**k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (&**k, v.as_ref()))
    }

    /// Whether both snapshots hold the very same allocation for `key`.
    pub fn shares_value_with(&self, other: &Snapshot<V>, key: &str) -> bool {
        match (self.entries.get(key), other.entries.get(key)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<V> Clone for Snapshot<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<V> Default for Snapshot<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for Snapshot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_leaves_previous_snapshot_untouched() {
        let empty: Snapshot<u32> = Snapshot::new();
        let one = empty.set("a", 1);

        assert!(!empty.has("a"));
        assert_eq!(one.get("a"), Some(&1));
        assert_eq!(empty.len(), 0);
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn set_shares_untouched_values() {
        let base = Snapshot::new().set("a", vec![1, 2, 3]).set("b", vec![4]);
        let held = base.get_shared("a").unwrap();

        let next = base.set("b", vec![5]);

        assert!(next.shares_value_with(&base, "a"));
        assert!(!next.shares_value_with(&base, "b"));
        assert!(Arc::ptr_eq(&held, &next.get_shared("a").unwrap()));
        assert_eq!(base.get("b"), Some(&vec![4]));
        assert_eq!(next.get("b"), Some(&vec![5]));
    }

    #[test]
    fn remove_returns_new_snapshot() {
        let base = Snapshot::new().set("a", 1).set("b", 2);
        let next = base.remove("a");

        assert!(base.has("a"));
        assert!(!next.has("a"));
        assert!(next.shares_value_with(&base, "b"));
        assert_eq!(next.remove("missing").len(), 1);
    }

    #[test]
    fn set_shares_untouched_keys() {
        let base = Snapshot::new().set("a", 1).set("b", 2);
        let next = base.set("b", 3);

        let key = |snap: &Snapshot<i32>, name: &str| {
            snap.keys().find(|k| *k == name).map(str::as_ptr).unwrap()
        };
        assert_eq!(key(&base, "a"), key(&next, "a"));
    }

    #[test]
    fn keys_are_sorted() {
        let snap = Snapshot::new().set("b", ()).set("a", ());
        assert_eq!(snap.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
