//! Root registration
//!
//! A root is a heap-owned slot holding a cell pointer on behalf of
//! some external owner. Roots are keyed by their handle, not by the
//! cell they currently point at, because the collector rewrites the
//! pointer whenever the cell moves.
//!
//! Owners that are dropped without access to the heap, typically
//! external values held in cells, register through [`OwnedRoot`]
//! instead.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use indexmap::IndexMap;

use super::alloc::CellPtr;

/// Handle to a registered root
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootId(u64);

/// Roots whose owners have been dropped, waiting to be deregistered
type ReleaseQueue = RefCell<Vec<RootId>>;

/// A root held by a value that cannot reach the heap when it is
/// dropped, such as an external value stored in a cell
///
/// Dropping the handle queues the root for removal; the heap
/// deregisters queued roots at the start and end of each collection.
#[derive(Debug)]
pub struct OwnedRoot {
    id: RootId,
    queue: Weak<ReleaseQueue>,
}

impl OwnedRoot {
    pub fn id(&self) -> RootId {
        self.id
    }
}

impl Drop for OwnedRoot {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.upgrade() {
            queue.borrow_mut().push(self.id);
        }
    }
}

/// The registered roots
#[derive(Default, Debug)]
pub struct RootSet {
    slots: IndexMap<RootId, CellPtr>,
    next: u64,
    released: Rc<ReleaseQueue>,
}

impl RootSet {
    pub fn new() -> Self {
        RootSet::default()
    }

    /// Register `ptr` and return a handle to read it back after
    /// collections
    pub fn add(&mut self, ptr: CellPtr) -> RootId {
        let id = RootId(self.next);
        self.next += 1;
        self.slots.insert(id, ptr);
        id
    }

    /// Register `ptr` on behalf of an owner that will release it by
    /// dropping the returned handle
    pub fn add_owned(&mut self, ptr: CellPtr) -> OwnedRoot {
        OwnedRoot {
            id: self.add(ptr),
            queue: Rc::downgrade(&self.released),
        }
    }

    /// Deregister every root whose owner has been dropped, returning
    /// how many were removed
    pub fn remove_released(&mut self) -> usize {
        let released = std::mem::take(&mut *self.released.borrow_mut());
        released
            .into_iter()
            .filter(|id| self.slots.shift_remove(id).is_some())
            .count()
    }

    /// Deregister a root. Unknown handles are ignored.
    pub fn remove(&mut self, id: RootId) -> Option<CellPtr> {
        self.slots.shift_remove(&id)
    }

    /// Current pointer held by the root
    pub fn get(&self, id: RootId) -> Option<CellPtr> {
        self.slots.get(&id).copied()
    }

    /// Point an existing root somewhere else. Returns false for an
    /// unknown handle.
    pub fn set(&mut self, id: RootId, ptr: CellPtr) -> bool {
        match self.slots.get_mut(&id) {
            Some(slot) => {
                *slot = ptr;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: RootId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Pointers held by all roots, for tracing
    pub fn pointers(&self) -> impl Iterator<Item = CellPtr> + '_ {
        self.slots.values().copied()
    }

    /// Pointers held by all roots, for fixup
    pub fn pointers_mut(&mut self) -> impl Iterator<Item = &mut CellPtr> + '_ {
        self.slots.values_mut()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_add_and_remove() {
        let mut roots = RootSet::new();
        let a = roots.add(CellPtr::young(0, 1));
        let b = roots.add(CellPtr::young(0, 1));
        assert_ne!(a, b, "each registration is a distinct location");
        assert_eq!(roots.len(), 2);

        assert_eq!(roots.remove(a), Some(CellPtr::young(0, 1)));
        assert!(!roots.contains(a));
        assert_eq!(roots.len(), 1);
    }

    #[test]
    pub fn test_removing_unknown_root_is_noop() {
        let mut roots = RootSet::new();
        let a = roots.add(CellPtr::old(0));
        roots.remove(a);
        assert_eq!(roots.remove(a), None);
        assert!(roots.is_empty());
    }

    #[test]
    pub fn test_set_is_idempotent() {
        let mut roots = RootSet::new();
        let a = roots.add(CellPtr::old(0));
        assert!(roots.set(a, CellPtr::old(5)));
        assert!(roots.set(a, CellPtr::old(5)));
        assert_eq!(roots.get(a), Some(CellPtr::old(5)));
        assert_eq!(roots.len(), 1);

        roots.remove(a);
        assert!(!roots.set(a, CellPtr::old(1)));
        assert_eq!(roots.get(a), None);
    }

    #[test]
    pub fn test_owned_root_released_on_drop() {
        let mut roots = RootSet::new();
        let kept = roots.add(CellPtr::old(0));
        let owned = roots.add_owned(CellPtr::old(1));
        let id = owned.id();
        assert_eq!(roots.get(id), Some(CellPtr::old(1)));
        assert_eq!(roots.remove_released(), 0);

        drop(owned);
        assert!(roots.contains(id), "removal waits for the heap");
        assert_eq!(roots.remove_released(), 1);
        assert!(!roots.contains(id));
        assert!(roots.contains(kept));
        assert_eq!(roots.remove_released(), 0);
    }

    #[test]
    pub fn test_owned_root_removed_explicitly_then_dropped() {
        let mut roots = RootSet::new();
        let owned = roots.add_owned(CellPtr::old(1));
        roots.remove(owned.id());
        drop(owned);
        assert_eq!(roots.remove_released(), 0);
        assert!(roots.is_empty());
    }

    #[test]
    pub fn test_owned_root_outliving_set() {
        let owned = {
            let mut roots = RootSet::new();
            roots.add_owned(CellPtr::old(1))
        };
        drop(owned);
    }

    #[test]
    pub fn test_fixup_through_pointers_mut() {
        let mut roots = RootSet::new();
        let a = roots.add(CellPtr::young(0, 0));
        for ptr in roots.pointers_mut() {
            *ptr = CellPtr::young(1, 7);
        }
        assert_eq!(roots.get(a), Some(CellPtr::young(1, 7)));
    }
}
