//! Old generation compaction
//!
//! Two cursors walk towards each other over the marked old buffer: the
//! lower one stops at dead cells, the upper one at live cells, and the
//! pair is swapped. When they meet every live cell sits below the
//! meeting point and everything above it is dropped.
//!
//! Live cells keep their mark flags; the caller clears them once
//! pointers have been fixed up.

use super::{alloc::CellPtr, cell::Cell, relocate::RelocationMap};

/// Compact `cells` in place, recording every move. Returns the number
/// of dead cells discarded.
pub fn compact(cells: &mut Vec<Cell>, relocations: &mut RelocationMap) -> usize {
    let before = cells.len();
    let mut bottom = 0;
    let mut top = before;

    loop {
        while bottom != top && !cells[top - 1].is_marked() {
            top -= 1;
        }
        while bottom != top && cells[bottom].is_marked() {
            bottom += 1;
        }
        if bottom == top {
            break;
        }

        top -= 1;
        cells.swap(bottom, top);
        relocations.record(CellPtr::old(top), CellPtr::old(bottom));
    }

    cells.truncate(bottom);
    before - bottom
}

/// Number of marked cells
pub fn live_count(cells: &[Cell]) -> usize {
    cells.iter().filter(|c| c.is_marked()).count()
}
