//! Mark phase
//!
//! Traces from the roots through car and cdr pointers, setting the
//! mark flag on every reachable cell in both generations. Each cell is
//! queued at most once so cycles terminate.

use std::collections::VecDeque;

use log::trace;

use super::{alloc::CellPtr, heap::Heap};

/// Reachable cells found by a mark pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MarkSummary {
    pub young: usize,
    pub old: usize,
}

impl MarkSummary {
    pub fn total(&self) -> usize {
        self.young + self.old
    }
}

/// Mark everything reachable from the roots
pub fn mark(heap: &mut Heap) -> MarkSummary {
    let mut summary = MarkSummary::default();
    let mut queue: VecDeque<CellPtr> = heap.roots.pointers().collect();

    while let Some(ptr) = queue.pop_front() {
        let cell = match heap.get_mut(ptr) {
            Some(cell) => cell,
            None => {
                trace!("ignoring dangling pointer {:?} during mark", ptr);
                continue;
            }
        };

        if cell.mark() {
            if ptr.is_old() {
                summary.old += 1;
            } else {
                summary.young += 1;
            }
            queue.extend(cell.references());
        }
    }

    trace!(
        "marked {} young and {} old cells from {} roots",
        summary.young,
        summary.old,
        heap.roots.len()
    );
    summary
}

/// Clear every mark flag, abandoning a collection
pub fn unmark_all(heap: &mut Heap) {
    let active = heap.current as usize;
    for cell in heap.young[active].iter_mut().chain(heap.old.iter_mut()) {
        cell.unmark();
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::memory::{alloc::Allocator, settings::HeapSettings};

    fn heap() -> Heap {
        Heap::with_settings(HeapSettings::default().with_young_capacity(32)).unwrap()
    }

    #[test]
    pub fn test_unrooted_cells_stay_unmarked() {
        let mut heap = heap();
        let p = heap.allocate(4).unwrap();
        let summary = mark(&mut heap);
        assert_eq!(summary, MarkSummary::default());
        assert!(!heap[p].is_marked());
    }

    #[test]
    pub fn test_marks_through_car_and_cdr() {
        let mut heap = heap();
        let list = heap.allocate_list(3).unwrap();
        let side = heap.allocate(1).unwrap();
        let garbage = heap.allocate(1).unwrap();
        heap[list.offset(1)].set_car(side);
        heap.add_root(list);

        let summary = mark(&mut heap);
        assert_eq!(summary.young, 4);
        assert_eq!(summary.old, 0);
        assert!(heap[side].is_marked());
        assert!(!heap[garbage].is_marked());
    }

    #[test]
    pub fn test_cycles_terminate() {
        let mut heap = heap();
        let a = heap.allocate(2).unwrap();
        let b = a.offset(1);
        heap[a].set_cdr(b);
        heap[b].set_cdr(a);
        heap[a].set_car(a);
        heap.add_root(a);
        heap.add_root(b);

        assert_eq!(mark(&mut heap).total(), 2);
    }

    #[test]
    pub fn test_unmark_all() {
        let mut heap = heap();
        let p = heap.allocate_list(5).unwrap();
        heap.add_root(p);
        mark(&mut heap);
        unmark_all(&mut heap);
        assert!(heap.list_iter(p).all(|c| !heap[c].is_marked()));
    }
}
