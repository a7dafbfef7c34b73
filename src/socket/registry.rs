use crate::base::kind::TransportKind;
use crate::socket::slot::Slot;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Maps target keys to the live slot for that key.
///
/// One registry exists per deduplicating transport kind. Lookup, insert and
/// remove for one key are atomic with respect to each other.
pub struct Registry {
    kind: TransportKind,
    slots: DashMap<String, Arc<Slot>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl Registry {
    pub fn new(kind: TransportKind) -> Self {
        Self { kind, slots: DashMap::new() }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn lookup(&self, key: &str) -> Option<Arc<Slot>> {
        self.slots.get(key).map(|slot| Arc::clone(slot.value()))
    }

    /// Register `slot` under `key`. Fails with the slot already there.
    pub fn insert(&self, key: &str, slot: Arc<Slot>) -> Result<(), Arc<Slot>> {
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(existing) => Err(Arc::clone(existing.get())),
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
                Ok(())
            }
        }
    }

    /// Return the slot for `key`, creating and registering one with `create`
    /// if there is none. The flag is `true` when `create` ran.
    ///
    /// `create` runs while the key's shard is locked; it must not touch this
    /// registry.
    pub fn get_or_insert_with(
        &self,
        key: &str,
        create: impl FnOnce() -> Arc<Slot>,
    ) -> (Arc<Slot>, bool) {
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(existing) => (Arc::clone(existing.get()), false),
            Entry::Vacant(vacant) => {
                let slot = create();
                vacant.insert(Arc::clone(&slot));
                (slot, true)
            }
        }
    }

    /// Remove whatever is registered under `key`. No-op if absent.
    pub fn remove(&self, key: &str) -> Option<Arc<Slot>> {
        self.slots.remove(key).map(|(_, slot)| slot)
    }

    /// Remove `slot` only if it is still the one registered under its key.
    pub fn remove_slot(&self, slot: &Slot) -> bool {
        self.slots
            .remove_if(slot.key(), |_, current| std::ptr::eq(Arc::as_ptr(current), slot))
            .is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every registered slot at this instant. Iterate this, never the live map,
    /// when the loop body may remove entries.
    pub fn snapshot(&self) -> Vec<Arc<Slot>> {
        self.slots.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.slots.iter().map(|entry| entry.key().clone()).collect()
    }
}
