//! The generational cell heap
//!
//! Two equally sized young buffers (one active, one kept empty as the
//! copy target) and a larger old buffer. New cells are bump allocated
//! from the active young buffer; exhausting it triggers a young
//! collection, which may in turn compact the old generation.

use std::{
    fmt::Debug,
    ops::{Index, IndexMut},
};

use log::{trace, warn};
use thiserror::Error;

use super::{
    alloc::{Allocator, CellPtr, Space},
    cell::Cell,
    collect,
    relocate::RelocationMap,
    roots::{OwnedRoot, RootId, RootSet},
    settings::{HeapSettings, SettingsError},
    stats::{CollectionReport, CollectionStats, HeapStats},
};

/// Heap-level errors
#[derive(Debug, Error)]
pub enum HeapError {
    /// Zero cells, or more than a young buffer can ever hold
    #[error("invalid allocation size: requested {requested} cells, young generation holds at most {max}")]
    InvalidAllocationSize { requested: usize, max: usize },
    /// Still not enough room after a young collection
    #[error("young generation exhausted: requested {requested} cells but only {available} free after collection")]
    YoungGenerationExhausted { requested: usize, available: usize },
    /// Promotion would overflow the old generation, which cannot grow
    #[error("heap exhausted: old generation cannot hold {live} live cells plus {promoting} promotions (capacity {capacity})")]
    OldGenerationExhausted {
        live: usize,
        promoting: usize,
        capacity: usize,
    },
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// A cell heap with its root set
pub struct Heap {
    pub(super) settings: HeapSettings,
    /// The two young semispaces
    pub(super) young: [Vec<Cell>; 2],
    /// Index of the active young semispace
    pub(super) current: u8,
    pub(super) old: Vec<Cell>,
    pub(super) roots: RootSet,
    /// Only populated during a collection
    pub(super) relocations: RelocationMap,
    pub(super) stats: CollectionStats,
}

impl Default for Heap {
    fn default() -> Self {
        Heap::build(HeapSettings::default())
    }
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    /// Create a heap with explicit sizing
    pub fn with_settings(settings: HeapSettings) -> Result<Self, HeapError> {
        settings.validate()?;
        Ok(Heap::build(settings))
    }

    fn build(settings: HeapSettings) -> Self {
        Heap {
            young: [
                Vec::with_capacity(settings.young_capacity),
                Vec::with_capacity(settings.young_capacity),
            ],
            current: 0,
            old: Vec::with_capacity(settings.old_capacity),
            roots: RootSet::new(),
            relocations: RelocationMap::new(),
            stats: CollectionStats::default(),
            settings,
        }
    }

    pub fn settings(&self) -> &HeapSettings {
        &self.settings
    }

    /// Space that new cells are allocated into
    pub fn active_space(&self) -> Space {
        Space::Young(self.current)
    }

    /// Free cells left in the active young buffer
    pub fn young_free(&self) -> usize {
        self.settings.young_capacity - self.young[self.current as usize].len()
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            young_used: self.young[self.current as usize].len(),
            young_capacity: self.settings.young_capacity,
            old_used: self.old.len(),
            old_capacity: self.settings.old_capacity,
            roots: self.roots.len(),
        }
    }

    pub fn collection_stats(&self) -> &CollectionStats {
        &self.stats
    }

    /// Run a young collection now
    pub fn collect(&mut self) -> Result<CollectionReport, HeapError> {
        collect::collect(self)
    }

    // Roots

    /// Keep `ptr` (and everything reachable from it) alive across
    /// collections. Read the possibly relocated pointer back with
    /// [`Heap::root`].
    pub fn add_root(&mut self, ptr: CellPtr) -> RootId {
        self.roots.add(ptr)
    }

    /// As [`Heap::add_root`], for an owner such as an external value
    /// that releases the root by being dropped
    pub fn add_owned_root(&mut self, ptr: CellPtr) -> OwnedRoot {
        self.roots.add_owned(ptr)
    }

    /// Stop treating a root as live. Unknown handles are ignored.
    pub fn remove_root(&mut self, id: RootId) {
        self.roots.remove(id);
    }

    pub fn root(&self, id: RootId) -> Option<CellPtr> {
        self.roots.get(id)
    }

    /// Repoint an existing root. Returns false if `id` is not registered.
    pub fn set_root(&mut self, id: RootId, ptr: CellPtr) -> bool {
        self.roots.set(id, ptr)
    }

    pub fn roots(&self) -> &RootSet {
        &self.roots
    }

    // Cell access

    pub fn get(&self, ptr: CellPtr) -> Option<&Cell> {
        match ptr.space() {
            Space::Young(s) if s == self.current => self.young[s as usize].get(ptr.index()),
            Space::Young(_) => None,
            Space::Old => self.old.get(ptr.index()),
        }
    }

    pub fn get_mut(&mut self, ptr: CellPtr) -> Option<&mut Cell> {
        match ptr.space() {
            Space::Young(s) if s == self.current => self.young[s as usize].get_mut(ptr.index()),
            Space::Young(_) => None,
            Space::Old => self.old.get_mut(ptr.index()),
        }
    }

    /// Whether `ptr` is within the current bounds of the active young
    /// buffer or the old generation
    ///
    /// This is a bounds check only. The young buffers swap roles on
    /// every collection, so a pointer kept from two collections ago
    /// names the active buffer again and is valid if its index is in
    /// range, even though it now refers to a different cell.
    pub fn is_valid(&self, ptr: CellPtr) -> bool {
        self.get(ptr).is_some()
    }

    /// Walk a cdr-linked chain starting at `head`
    ///
    /// Stops at the first cell whose cdr is not a cell pointer. A cyclic
    /// chain never ends.
    pub fn list_iter(&self, head: CellPtr) -> ListIter<'_> {
        ListIter {
            heap: self,
            next: Some(head),
        }
    }
}

impl Allocator for Heap {
    fn allocate(&mut self, count: usize) -> Result<CellPtr, HeapError> {
        let max = self.settings.young_capacity;
        if count == 0 || count > max {
            return Err(HeapError::InvalidAllocationSize {
                requested: count,
                max,
            });
        }

        if self.young_free() < count {
            trace!("young generation full, collecting to allocate {} cells", count);
            self.collect()?;

            let available = self.young_free();
            if available < count {
                let err = HeapError::YoungGenerationExhausted {
                    requested: count,
                    available,
                };
                warn!("{}", err);
                return Err(err);
            }
        }

        let space = self.active_space();
        let buffer = &mut self.young[self.current as usize];
        let start = buffer.len();
        buffer.resize_with(start + count, Cell::default);
        Ok(CellPtr::new(space, start))
    }

    fn allocate_list(&mut self, count: usize) -> Result<CellPtr, HeapError> {
        let head = self.allocate(count)?;
        let buffer = &mut self.young[self.current as usize];
        for i in 0..count - 1 {
            buffer[head.index() + i].set_cdr(head.offset(i + 1));
        }
        Ok(head)
    }
}

impl Index<CellPtr> for Heap {
    type Output = Cell;

    fn index(&self, ptr: CellPtr) -> &Cell {
        match self.get(ptr) {
            Some(cell) => cell,
            None => panic!("dangling cell pointer {:?}", ptr),
        }
    }
}

impl IndexMut<CellPtr> for Heap {
    fn index_mut(&mut self, ptr: CellPtr) -> &mut Cell {
        match self.get_mut(ptr) {
            Some(cell) => cell,
            None => panic!("dangling cell pointer {:?}", ptr),
        }
    }
}

/// Iterator over the cells of a cdr-linked chain
pub struct ListIter<'heap> {
    heap: &'heap Heap,
    next: Option<CellPtr>,
}

impl Iterator for ListIter<'_> {
    type Item = CellPtr;

    fn next(&mut self) -> Option<CellPtr> {
        let ptr = self.next.take()?;
        let cell = self.heap.get(ptr)?;
        self.next = cell.cdr::<CellPtr>().copied();
        Some(ptr)
    }
}

impl Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.stats())?;
        for (i, cell) in self.young[self.current as usize].iter().enumerate() {
            writeln!(f, "(Yg) {:6} {:?}", i, cell)?;
        }
        for (i, cell) in self.old.iter().enumerate() {
            writeln!(f, "(Od) {:6} {:?}", i, cell)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::memory::cell::SlotTag;

    fn small_heap() -> Heap {
        Heap::with_settings(
            HeapSettings::default()
                .with_young_capacity(16)
                .with_old_capacity(64),
        )
        .unwrap()
    }

    #[test]
    pub fn test_allocate_fresh_cells() {
        let mut heap = small_heap();
        let p = heap.allocate(3).unwrap();
        for i in 0..3 {
            let cell = &heap[p.offset(i)];
            assert!(cell.car_is_nil());
            assert!(cell.cdr_is_nil());
        }
        assert_eq!(heap.stats().young_used, 3);
        assert_eq!(heap.young_free(), 13);
    }

    #[test]
    pub fn test_allocations_are_contiguous() {
        let mut heap = small_heap();
        let a = heap.allocate(2).unwrap();
        let b = heap.allocate(1).unwrap();
        assert_eq!(b, a.offset(2));
    }

    #[test]
    pub fn test_invalid_sizes() {
        let mut heap = small_heap();
        assert!(matches!(
            heap.allocate(0),
            Err(HeapError::InvalidAllocationSize { requested: 0, .. })
        ));
        assert!(matches!(
            heap.allocate(17),
            Err(HeapError::InvalidAllocationSize {
                requested: 17,
                max: 16
            })
        ));
        assert!(heap.allocate(16).is_ok());
    }

    #[test]
    pub fn test_allocate_list_links_cells() {
        let mut heap = small_heap();
        let head = heap.allocate_list(4).unwrap();
        let cells: Vec<_> = heap.list_iter(head).collect();
        assert_eq!(cells.len(), 4);
        for (i, ptr) in cells.iter().enumerate() {
            assert_eq!(*ptr, head.offset(i));
        }
        assert!(heap[head.offset(3)].cdr_is_nil());
        assert_eq!(heap[head].cdr_tag(), SlotTag::CellRef);
    }

    #[test]
    pub fn test_single_cell_list() {
        let mut heap = small_heap();
        let head = heap.allocate_list(1).unwrap();
        assert!(heap[head].cdr_is_nil());
        assert_eq!(heap.list_iter(head).count(), 1);
    }

    #[test]
    pub fn test_exhaustion_triggers_collection() {
        let mut heap = small_heap();
        for _ in 0..10 {
            heap.allocate(5).unwrap();
        }
        assert!(heap.collection_stats().young_collections > 0);
        assert!(heap.stats().young_used <= 16);
    }

    #[test]
    pub fn test_young_exhausted_when_roots_fill_buffer() {
        let mut heap = Heap::with_settings(
            HeapSettings::default()
                .with_young_capacity(8)
                .with_promotion_threshold(3),
        )
        .unwrap();
        let head = heap.allocate_list(8).unwrap();
        heap.add_root(head);

        // all eight cells are reachable and too young to promote
        assert!(matches!(
            heap.allocate(1),
            Err(HeapError::YoungGenerationExhausted { requested: 1, .. })
        ));
    }

    #[test]
    pub fn test_stale_pointer_is_invalid() {
        let mut heap = small_heap();
        let p = heap.allocate(1).unwrap();
        assert!(heap.is_valid(p));
        heap.collect().unwrap();
        assert!(!heap.is_valid(p));
        assert!(heap.get(p).is_none());
    }

    #[test]
    pub fn test_validity_is_a_bounds_check() {
        let mut heap = small_heap();
        let stale = heap.allocate(1).unwrap();
        heap.collect().unwrap();
        heap.collect().unwrap();
        assert_eq!(heap.active_space(), stale.space());
        assert!(!heap.is_valid(stale));

        let fresh = heap.allocate(1).unwrap();
        assert_eq!(fresh, stale);
        assert!(heap.is_valid(stale));
    }

    #[test]
    #[should_panic(expected = "dangling cell pointer")]
    pub fn test_index_panics_on_dangling() {
        let heap = small_heap();
        let _ = &heap[CellPtr::old(3)];
    }

    #[test]
    pub fn test_bad_settings_rejected() {
        let result = Heap::with_settings(HeapSettings::default().with_young_capacity(0));
        assert!(matches!(result, Err(HeapError::Settings(_))));
    }

    #[test]
    pub fn test_debug_dump() {
        let mut heap = small_heap();
        let p = heap.allocate(1).unwrap();
        heap[p].set_car(5);
        let dump = format!("{:?}", heap);
        assert!(dump.contains("(Yg)"));
        assert!(dump.contains("Int(5)"));
    }
}
