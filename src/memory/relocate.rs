//! Relocation map
//!
//! Built while cells are moved during a collection and consulted while
//! every reachable pointer is fixed up. Cleared at the start of each
//! pass.

use std::collections::HashMap;

use super::{alloc::CellPtr, cell::Slot};

#[derive(Default, Debug)]
pub struct RelocationMap {
    moves: HashMap<CellPtr, CellPtr>,
}

impl RelocationMap {
    pub fn new() -> Self {
        RelocationMap::default()
    }

    /// Record that the cell at `from` now lives at `to`
    pub fn record(&mut self, from: CellPtr, to: CellPtr) {
        let previous = self.moves.insert(from, to);
        debug_assert!(previous.is_none(), "cell {:?} moved twice", from);
    }

    /// New location of `ptr`, or `ptr` itself if it did not move
    pub fn resolve(&self, ptr: CellPtr) -> CellPtr {
        self.moves.get(&ptr).copied().unwrap_or(ptr)
    }

    /// Rewrite a pointer in place
    pub fn fix(&self, ptr: &mut CellPtr) {
        *ptr = self.resolve(*ptr);
    }

    /// Rewrite the pointer held in a slot, if any
    pub fn fix_slot(&self, slot: &mut Slot) {
        if let Some(ptr) = slot.cell_ref_mut() {
            self.fix(ptr);
        }
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn clear(&mut self) {
        self.moves.clear();
    }
}
