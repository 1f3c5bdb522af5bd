//! A heap of LISP cons cells with a generational copying collector
//! and a mark-compact old generation.
pub mod driver;
pub mod memory;

pub use memory::{
    alloc::{Allocator, CellPtr, Space},
    cell::{Cell, CellFlags, Slot, SlotTag},
    heap::{Heap, HeapError},
    roots::{OwnedRoot, RootId},
    settings::HeapSettings,
    stats::{CollectionReport, CollectionStats, HeapStats},
    symbol::{SymbolId, SymbolPool},
    value::{ExternalValue, ValueRef},
};
