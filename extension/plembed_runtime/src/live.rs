//! The live-objects set.
//!
//! Everything the runtime creates during a transaction that must outlive a
//! single call but not the transaction is owned here. Caches hold
//! generation-checked [`LiveKey`]s into the set; clearing the set at the
//! transaction boundary advances its generation, so every key issued before
//! the boundary stops resolving at once.

use std::sync::Arc;

use enum_as_inner::EnumAsInner;
use plembed_arena::{Arena, Key};

use crate::{
    descriptor::{TupleDescriptor, TypeDescriptor},
    procedure::Procedure,
};

/// One object owned by the [`LiveObjects`] set.
#[derive(Debug, Clone, EnumAsInner)]
pub enum LiveObject<O> {
    /// A resolved procedure.
    Procedure(Arc<Procedure>),

    /// The namespace a procedure's body executed in.
    Module(O),

    /// A polymorphism-specialized type.
    Descriptor(Arc<TypeDescriptor>),

    /// A polymorphism-specialized parameter list.
    TupleDescriptor(Arc<TupleDescriptor>),

    /// The trigger-data wrapper handed to a trigger handler.
    TriggerData(O),

    /// The result iterator of a value-per-call set-returning call.
    Continuation(O),

    /// The `send` method of a stateful procedure's state object.
    State(O),
}

/// A handle into the [`LiveObjects`] set.
pub type LiveKey<O> = Key<LiveObject<O>>;

/// A reference a cache keeps to a live object.
#[derive(Debug, Clone)]
pub enum Anchor<O> {
    /// Owned by the [`LiveObjects`] set; stops resolving at the next
    /// transaction boundary.
    Live(LiveKey<O>),

    /// Owned by the cache itself; always resolves.
    Pinned(LiveObject<O>),
}

/// The set of objects living until the end of the current transaction.
#[derive(Debug)]
pub struct LiveObjects<O> {
    arena: Arena<LiveObject<O>>,
}

impl<O> Default for LiveObjects<O> {
    fn default() -> Self { Self { arena: Arena::new() } }
}

impl<O> LiveObjects<O> {
    /// Takes ownership of `object` and returns its key.
    pub fn register(&mut self, object: LiveObject<O>) -> LiveKey<O> {
        self.arena.insert(object)
    }

    /// Returns the object behind `key`, if it is still live.
    #[must_use]
    pub fn get(&self, key: LiveKey<O>) -> Option<&LiveObject<O>> {
        self.arena.get(key)
    }

    /// Returns `true` if `key` still resolves.
    #[must_use]
    pub fn contains(&self, key: LiveKey<O>) -> bool {
        self.arena.contains_key(key)
    }

    /// Returns `true` if the anchor still resolves.
    #[must_use]
    pub fn anchors(&self, anchor: &Anchor<O>) -> bool {
        match anchor {
            Anchor::Live(key) => self.arena.contains_key(*key),
            Anchor::Pinned(_) => true,
        }
    }

    /// Removes one object ahead of the transaction boundary.
    pub fn discard(&mut self, key: LiveKey<O>) -> Option<LiveObject<O>> {
        self.arena.remove(key)
    }

    /// Returns the number of live objects.
    #[must_use]
    pub fn len(&self) -> usize { self.arena.len() }

    /// Returns `true` if nothing is live.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.arena.is_empty() }

    /// Returns the current generation.
    #[must_use]
    pub const fn generation(&self) -> u64 { self.arena.generation() }

    /// Empties the set and invalidates every key issued so far.
    ///
    /// The objects are returned so that their destructors, which may run
    /// interpreted finalizers, execute after the caller releases the set.
    pub fn drain(&mut self) -> Vec<LiveObject<O>> { self.arena.drain() }
}

impl<O: Clone> LiveObjects<O> {
    /// Resolves an anchor to a copy of its object.
    #[must_use]
    pub fn resolve(&self, anchor: &Anchor<O>) -> Option<LiveObject<O>> {
        match anchor {
            Anchor::Live(key) => self.arena.get(*key).cloned(),
            Anchor::Pinned(object) => Some(object.clone()),
        }
    }
}
