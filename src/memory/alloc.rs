//! Cell addressing and the allocator interface
//!
//! Cells are addressed by which buffer they live in and their index
//! within it. A `CellPtr` stays valid only until the next collection
//! that touches its buffer; pointers held in roots and in live cells
//! are rewritten by the collector, anything else goes stale.

use std::fmt;

use super::heap::HeapError;

/// The buffer a cell lives in
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Space {
    /// One of the two young semispaces
    Young(u8),
    /// The old generation
    Old,
}

/// Logical address of a cell
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct CellPtr {
    space: Space,
    index: u32,
}

impl CellPtr {
    pub fn new(space: Space, index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize);
        CellPtr {
            space,
            index: index as u32,
        }
    }

    pub fn young(semispace: u8, index: usize) -> Self {
        debug_assert!(semispace < 2);
        CellPtr::new(Space::Young(semispace), index)
    }

    pub fn old(index: usize) -> Self {
        CellPtr::new(Space::Old, index)
    }

    pub fn space(self) -> Space {
        self.space
    }

    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn is_old(self) -> bool {
        self.space == Space::Old
    }

    /// Pointer to the cell `n` places further on in the same block
    pub fn offset(self, n: usize) -> CellPtr {
        CellPtr::new(self.space, self.index() + n)
    }
}

impl fmt::Debug for CellPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.space {
            Space::Young(s) => write!(f, "y{}:{}", s, self.index),
            Space::Old => write!(f, "o:{}", self.index),
        }
    }
}

/// Source of fresh cells
pub trait Allocator {
    /// Allocate `count` contiguous `Nil`/`Nil` cells
    fn allocate(&mut self, count: usize) -> Result<CellPtr, HeapError>;

    /// Allocate `count` contiguous cells chained through their cdr
    fn allocate_list(&mut self, count: usize) -> Result<CellPtr, HeapError>;
}
