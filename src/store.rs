//! Id-addressed entity storage.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::{Index, IndexMut};

/// An entity held in an [Arena], which knows its own key.
pub trait Keyed {
    type Key: Copy + Eq + Hash + Debug;

    fn key(&self) -> Self::Key;
}

/// A dense collection of entities addressed by key.
///
/// Entities are kept in insertion order, and a key-to-slot map provides
/// constant time lookup. The map is rebuilt whenever entities are removed.
/// Indexing with a key that is not present panics.
#[derive(Clone, Debug)]
pub struct Arena<K, T> {
    items: Vec<T>,
    index: HashMap<K, usize>,
}

impl<K, T> Default for Arena<K, T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K, T> Arena<K, T>
where
    K: Copy + Eq + Hash + Debug,
    T: Keyed<Key = K>,
{
    /// Creates an empty arena.
    pub fn new() -> Self {
        Default::default()
    }

    /// The number of entities.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends an entity. Returns `false`, leaving the arena unchanged,
    /// if an entity with the same key is already present.
    pub fn insert(&mut self, item: T) -> bool {
        let key = item.key();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.items.len());
        self.items.push(item);
        true
    }

    /// Removes the entity with the given key, preserving the order of the rest.
    pub fn remove(&mut self, key: K) -> Option<T> {
        let slot = self.index.get(&key).copied()?;
        let item = self.items.remove(slot);
        self.rebuild_index();
        Some(item)
    }

    /// Keeps only the entities for which `f` returns true.
    pub fn retain(&mut self, f: impl FnMut(&T) -> bool) {
        let len = self.items.len();
        self.items.retain(f);
        if self.items.len() != len {
            self.rebuild_index();
        }
    }

    /// Removes all entities.
    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    /// Whether an entity with the given key exists.
    pub fn contains(&self, key: K) -> bool {
        self.index.contains_key(&key)
    }

    /// Gets a reference to the entity with the given key.
    pub fn get(&self, key: K) -> Option<&T> {
        self.index.get(&key).map(|slot| &self.items[*slot])
    }

    /// The insertion-order position of the entity with the given key.
    pub fn slot(&self, key: K) -> Option<usize> {
        self.index.get(&key).copied()
    }

    /// Iterates over the entities in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Mutably iterates over the entities in insertion order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    /// Iterates over the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.items.iter().map(|item| item.key())
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(slot, item)| (item.key(), slot))
            .collect();
    }
}

impl<K, T> Index<K> for Arena<K, T>
where
    K: Copy + Eq + Hash + Debug,
    T: Keyed<Key = K>,
{
    type Output = T;

    fn index(&self, key: K) -> &T {
        match self.get(key) {
            Some(item) => item,
            None => panic!("No {} with ID {:?}", short_type_name::<T>(), key),
        }
    }
}

impl<K, T> IndexMut<K> for Arena<K, T>
where
    K: Copy + Eq + Hash + Debug,
    T: Keyed<Key = K>,
{
    fn index_mut(&mut self, key: K) -> &mut T {
        match self.index.get(&key) {
            Some(slot) => &mut self.items[*slot],
            None => panic!("No {} with ID {:?}", short_type_name::<T>(), key),
        }
    }
}

impl<'a, K, T> IntoIterator for &'a Arena<K, T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

fn short_type_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}
