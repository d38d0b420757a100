//! The per-call info cache, the module registry and the polymorphism cache.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use getset::{CopyGetters, Getters};
use log::debug;
use parking_lot::Mutex;

use crate::{
    descriptor::{PseudoType, TupleDescriptor, TypeDescriptor, TypeId},
    epoch::Epoch,
    live::{Anchor, LiveKey, LiveObject, LiveObjects},
    procedure::{Procedure, ProcedureId},
    trigger::TriggerData,
};

/// The slot holding a stateful procedure's continuation, shared between the
/// cache and the execution frames using it.
pub type ContinuationSlot<O> = Arc<Mutex<Option<Anchor<O>>>>;

/// Everything resolved for one invocation handle, valid for one epoch.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct CallCache<O> {
    /// The epoch the cache was filled in.
    #[get_copy = "pub"]
    epoch_stamp: Epoch,

    /// The resolved procedure.
    #[get = "pub"]
    procedure: Anchor<O>,

    /// The module the procedure's body executed in.
    #[get = "pub"]
    module: Anchor<O>,

    /// Parameter shape, specialized when generic.
    #[get = "pub"]
    input: Arc<TupleDescriptor>,

    /// Result type, specialized when generic.
    #[get = "pub"]
    output: Arc<TypeDescriptor>,

    /// Live keys of the specialized descriptors.
    #[get = "pub"]
    specialized: Vec<LiveKey<O>>,

    /// State of a stateful procedure.
    #[get = "pub"]
    continuation: ContinuationSlot<O>,

    /// Mode-specific shadow state: the value-per-call iterator, or the
    /// trigger relation's row type.
    #[get = "pub"]
    internal: Option<Anchor<O>>,

    /// The trigger-data wrapper and the trigger definition it was built
    /// from.
    #[get = "pub"]
    trigger_data: Option<(TriggerData, LiveKey<O>)>,
}

/// A cache snapshot with every anchor resolved.
#[derive(Debug, Clone)]
pub struct Resolved<O> {
    /// The procedure.
    pub procedure: Arc<Procedure>,

    /// Its module.
    pub module: O,

    /// Parameter shape.
    pub input: Arc<TupleDescriptor>,

    /// Result type.
    pub output: Arc<TypeDescriptor>,

    /// Continuation slot of the cache.
    pub continuation: ContinuationSlot<O>,
}

impl<O: Clone> CallCache<O> {
    /// Creates a cache stamped with `epoch_stamp`.
    #[must_use]
    pub fn new(
        epoch_stamp: Epoch,
        procedure: Anchor<O>,
        module: Anchor<O>,
        input: Arc<TupleDescriptor>,
        output: Arc<TypeDescriptor>,
    ) -> Self {
        Self {
            epoch_stamp,
            procedure,
            module,
            input,
            output,
            specialized: Vec::new(),
            continuation: Arc::new(Mutex::new(None)),
            internal: None,
            trigger_data: None,
        }
    }

    pub(crate) fn with_specialized(
        mut self,
        specialized: Vec<LiveKey<O>>,
    ) -> Self {
        self.specialized = specialized;
        self
    }

    pub(crate) fn set_internal(&mut self, internal: Option<Anchor<O>>) {
        self.internal = internal;
    }

    pub(crate) fn set_trigger_data(
        &mut self,
        trigger_data: Option<(TriggerData, LiveKey<O>)>,
    ) {
        self.trigger_data = trigger_data;
    }

    /// Returns `true` if the cache may be used in `current` without refresh:
    /// the stamp admits the epoch and every anchor still resolves.
    #[must_use]
    pub fn is_fresh(&self, current: Epoch, live: &LiveObjects<O>) -> bool {
        self.epoch_stamp.admits(current)
            && live.anchors(&self.procedure)
            && live.anchors(&self.module)
            && self.specialized.iter().all(|key| live.contains(*key))
    }

    /// Resolves every anchor, or returns `None` if any is gone.
    #[must_use]
    pub fn resolve(&self, live: &LiveObjects<O>) -> Option<Resolved<O>> {
        let procedure = live.resolve(&self.procedure)?.into_procedure().ok()?;
        let module = live.resolve(&self.module)?.into_module().ok()?;

        Some(Resolved {
            procedure,
            module,
            input: self.input.clone(),
            output: self.output.clone(),
            continuation: self.continuation.clone(),
        })
    }
}

/// A procedure loaded into the module registry.
#[derive(Debug, Clone)]
pub struct RegistryEntry<O> {
    /// The procedure.
    pub procedure: Arc<Procedure>,

    /// Its module, executed exactly once.
    pub module: O,
}

/// Procedures whose module has been executed, by identifier.
///
/// Entries survive transaction boundaries; they are checked for currency
/// before reuse.
#[derive(Debug)]
pub struct Registry<O> {
    entries: HashMap<ProcedureId, RegistryEntry<O>>,
}

impl<O> Default for Registry<O> {
    fn default() -> Self { Self { entries: HashMap::new() } }
}

impl<O: Clone> Registry<O> {
    /// Returns the entry of `id`.
    #[must_use]
    pub fn get(&self, id: ProcedureId) -> Option<RegistryEntry<O>> {
        self.entries.get(&id).cloned()
    }

    /// Adds or replaces the entry of its procedure.
    pub fn insert(&mut self, entry: RegistryEntry<O>) {
        self.entries.insert(entry.procedure.id(), entry);
    }

    /// Removes the entry of `id`.
    pub fn remove(&mut self, id: ProcedureId) -> Option<RegistryEntry<O>> {
        self.entries.remove(&id)
    }

    /// Returns `true` if `id` is loaded.
    #[must_use]
    pub fn contains(&self, id: ProcedureId) -> bool {
        self.entries.contains_key(&id)
    }
}

/// Specialized descriptors keyed by generic placeholder and target type,
/// bounded to a fixed capacity with first-in first-out eviction.
#[derive(Debug)]
pub struct PolymorphCache {
    capacity: usize,
    entries: HashMap<(PseudoType, TypeId), Arc<TypeDescriptor>>,
    order: VecDeque<(PseudoType, TypeId)>,
}

impl PolymorphCache {
    /// Creates an empty cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Returns the number of cached descriptors.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Returns the cached specialization.
    #[must_use]
    pub fn get(
        &self,
        generic: PseudoType,
        target: TypeId,
    ) -> Option<Arc<TypeDescriptor>> {
        self.entries.get(&(generic, target)).cloned()
    }

    /// Forgets a specialization that is no longer current.
    pub fn evict(&mut self, generic: PseudoType, target: TypeId) {
        if self.entries.remove(&(generic, target)).is_some() {
            self.order.retain(|key| *key != (generic, target));
        }
    }

    /// Caches a specialization, evicting the oldest entry when full.
    pub fn insert(
        &mut self,
        generic: PseudoType,
        target: TypeId,
        descriptor: Arc<TypeDescriptor>,
    ) {
        if self.entries.insert((generic, target), descriptor).is_some() {
            return;
        }

        self.order.push_back((generic, target));

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                debug!("polymorph cache evicted {oldest:?}");
                self.entries.remove(&oldest);
            }
        }
    }
}

/// Builds a live anchor for a procedure and its module, registering both.
pub(crate) fn anchor_entry<O: Clone>(
    live: &mut LiveObjects<O>,
    entry: &RegistryEntry<O>,
) -> (Anchor<O>, Anchor<O>) {
    let procedure =
        live.register(LiveObject::Procedure(entry.procedure.clone()));
    let module = live.register(LiveObject::Module(entry.module.clone()));

    (Anchor::Live(procedure), Anchor::Live(module))
}

#[cfg(test)]
mod tests;
