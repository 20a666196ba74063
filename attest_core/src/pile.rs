use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;

/// A lock-guarded keyed table that remembers insertion order.
///
/// Reads take the shared lock and may run alongside each other; every
/// mutation takes the exclusive lock. Map and order index live under the
/// same lock so they can never be observed out of step.
#[derive(Debug)]
pub struct Pile<K, V> {
    inner: RwLock<PileInner<K, V>>,
}

#[derive(Debug)]
struct PileInner<K, V> {
    // Map for direct key-based access
    items: HashMap<K, V>,
    // Keys in insertion order
    order: Vec<K>,
}

impl<K, V> Pile<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(PileInner {
                items: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Insert an item unless the key is already present.
    ///
    /// Returns `false`, leaving the existing item untouched, on a collision.
    pub fn insert_new(&self, key: K, item: V) -> bool {
        let mut inner = self.inner.write();
        if inner.items.contains_key(&key) {
            return false;
        }
        inner.order.push(key.clone());
        inner.items.insert(key, item);
        true
    }

    /// Get an item by key
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.inner.read().items.get(key).cloned()
    }

    /// Check if the pile contains an item with the given key
    pub fn contains(&self, key: &K) -> bool {
        self.inner.read().items.contains_key(key)
    }

    /// Remove an item by key. Absent keys are a no-op.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.write();
        let item = inner.items.remove(key)?;
        inner.order.retain(|k| k != key);
        Some(item)
    }

    /// Mutate an existing item in place, returning `None` if it is absent.
    pub fn update<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.inner.write().items.get_mut(key).map(f)
    }

    /// Mutate the item under `key`, or create it if it is absent.
    ///
    /// Returns the resulting item and whether it was created.
    pub fn upsert_with(
        &self,
        key: K,
        create: impl FnOnce() -> V,
        modify: impl FnOnce(&mut V),
    ) -> (V, bool)
    where
        V: Clone,
    {
        let mut inner = self.inner.write();
        if let Some(item) = inner.items.get_mut(&key) {
            modify(item);
            return (item.clone(), false);
        }
        let item = create();
        inner.order.push(key.clone());
        inner.items.insert(key, item.clone());
        (item, true)
    }

    /// Get all items in insertion order
    pub fn get_ordered(&self) -> Vec<V>
    where
        V: Clone,
    {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|k| inner.items.get(k).cloned())
            .collect()
    }

    /// Items matching the predicate, in insertion order
    pub fn filter<F>(&self, predicate: F) -> Vec<V>
    where
        V: Clone,
        F: Fn(&V) -> bool,
    {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|k| inner.items.get(k).filter(|item| predicate(item)).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for Pile<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
