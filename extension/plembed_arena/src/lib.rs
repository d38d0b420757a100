//! [`Arena`] stores items of type `T` behind typed, generation-checked
//! [`Key`]s.
//!
//! Every key remembers the generation of the arena at the time it was issued.
//! [`Arena::drain`] empties the arena and advances its generation, so keys
//! issued before the drain can never observe an item inserted after it, even
//! when indices collide.

use std::{collections::HashMap, fmt::Debug, marker::PhantomData};

#[cfg(any(test, feature = "arbitrary"))]
pub mod arbitrary;

/// Identifies one entry of an [`Arena`] of `T` within one generation.
pub struct Key<T: ?Sized> {
    index: u64,
    generation: u64,

    _marker: PhantomData<Box<T>>,
}

impl<T: ?Sized> Key<T> {
    /// Creates a key from its raw parts.
    #[must_use]
    pub const fn new(index: u64, generation: u64) -> Self {
        Self { index, generation, _marker: PhantomData }
    }

    /// Returns the slot index of the [`Key`].
    #[must_use]
    pub const fn index(&self) -> u64 { self.index }

    /// Returns the arena generation the [`Key`] was issued in.
    #[must_use]
    pub const fn generation(&self) -> u64 { self.generation }
}

unsafe impl<T: ?Sized> Send for Key<T> {}
unsafe impl<T: ?Sized> Sync for Key<T> {}

impl<T: ?Sized> Debug for Key<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({}@{})", self.index, self.generation)
    }
}

impl<T: ?Sized> Clone for Key<T> {
    fn clone(&self) -> Self { *self }
}

impl<T: ?Sized> Copy for Key<T> {}

impl<T: ?Sized> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T: ?Sized> Eq for Key<T> {}

impl<T: ?Sized> PartialOrd for Key<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Ord for Key<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.generation, self.index).cmp(&(other.generation, other.index))
    }
}

impl<T: ?Sized> std::hash::Hash for Key<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

/// A collection of items of type `T` referenced by [`Key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arena<T> {
    generation: u64,
    next_index: u64,
    items: HashMap<u64, T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { generation: 0, next_index: 0, items: HashMap::new() }
    }
}

impl<T> Arena<T> {
    /// Creates a new empty [`Arena`].
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Returns the current generation.
    #[must_use]
    pub const fn generation(&self) -> u64 { self.generation }

    /// Returns the number of items in the [`Arena`].
    #[must_use]
    pub fn len(&self) -> usize { self.items.len() }

    /// Returns `true` if the [`Arena`] contains no items.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Inserts a new item and returns its key.
    pub fn insert(&mut self, item: T) -> Key<T> {
        let index = self.next_index;
        self.next_index = self.next_index.wrapping_add(1);

        assert!(self.items.insert(index, item).is_none());

        Key::new(index, self.generation)
    }

    /// Returns a reference to the item with the given key, or `None` if the
    /// key was issued in another generation or its item was removed.
    #[must_use]
    pub fn get(&self, key: Key<T>) -> Option<&T> {
        if key.generation != self.generation {
            return None;
        }

        self.items.get(&key.index)
    }

    /// Checks if the [`Arena`] holds a live item for the given key.
    #[must_use]
    pub fn contains_key(&self, key: Key<T>) -> bool { self.get(key).is_some() }

    /// Removes the item with the given key and returns it.
    pub fn remove(&mut self, key: Key<T>) -> Option<T> {
        if key.generation != self.generation {
            return None;
        }

        self.items.remove(&key.index)
    }

    /// Removes every item and advances the generation, invalidating all keys
    /// issued so far.
    ///
    /// The items are returned rather than dropped in place so the caller can
    /// decide where their destructors run.
    pub fn drain(&mut self) -> Vec<T> {
        self.generation = self.generation.wrapping_add(1);
        self.next_index = 0;

        self.items.drain().map(|(_, item)| item).collect()
    }
}

#[cfg(test)]
mod tests;
