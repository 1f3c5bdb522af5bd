//! Young generation collection
//!
//! Marks from the roots, compacts the old generation when it is over
//! its high-water mark, then copies every marked young cell either into
//! the other young buffer or (once old enough) into the old generation.
//! All pointers held in roots and live cells are then rewritten through
//! the relocation map and the buffers swap roles.

use std::time::Instant;

use log::{debug, trace, warn};

use super::{
    alloc::CellPtr,
    cell::CellFlags,
    compact::{compact, live_count},
    heap::{Heap, HeapError},
    mark::{mark, unmark_all},
    stats::CollectionReport,
};

pub fn collect(heap: &mut Heap) -> Result<CollectionReport, HeapError> {
    let start = Instant::now();
    let active = heap.current as usize;
    let target = 1 - active;
    debug_assert!(heap.young[target].is_empty());

    let released = heap.roots.remove_released();
    if released > 0 {
        trace!("{} owned roots released", released);
    }

    trace!("mark phase");
    let marked = mark(heap);
    heap.relocations.clear();

    let threshold = heap.settings.promotion_threshold;
    let promoting = heap.young[active]
        .iter()
        .filter(|c| c.is_marked() && c.flags().age() + 1 >= threshold)
        .count();

    // Compact when over the high-water mark, or when that is the only
    // way to make room for this cycle's promotions.
    let capacity = heap.settings.old_capacity;
    let compact_old = heap.old.len() > heap.settings.old_high_water
        || heap.old.len() + promoting > capacity;

    let live_old = if compact_old {
        live_count(&heap.old)
    } else {
        heap.old.len()
    };

    if live_old + promoting > capacity {
        unmark_all(heap);
        heap.stats.record_failure();
        let err = HeapError::OldGenerationExhausted {
            live: live_old,
            promoting,
            capacity,
        };
        warn!("{}", err);
        return Err(err);
    }

    let mut report = CollectionReport::default();

    if compact_old {
        trace!(
            "compacting old generation: {} cells, {} live",
            heap.old.len(),
            live_old
        );
        report.old_collected = true;
        report.old_reclaimed = compact(&mut heap.old, &mut heap.relocations);
    }

    trace!("copy phase");
    let mut dead = std::mem::take(&mut heap.young[active]);
    for (index, cell) in dead.iter_mut().enumerate() {
        if !cell.is_marked() {
            continue;
        }

        let mut moved = cell.take();
        moved.unmark();
        let survivals = moved.flags().age() + 1;
        let aged = moved.flags().aged();
        *moved.flags_mut() = aged;

        let from = CellPtr::young(active as u8, index);
        let to = if survivals >= threshold {
            moved.flags_mut().insert(CellFlags::PROMOTED);
            heap.old.push(moved);
            report.promoted += 1;
            CellPtr::old(heap.old.len() - 1)
        } else {
            let live = &mut heap.young[target];
            live.push(moved);
            report.survivors += 1;
            CellPtr::young(target as u8, live.len() - 1)
        };
        heap.relocations.record(from, to);
    }
    report.reclaimed = dead.len() - marked.young;

    trace!("fixup phase: {} relocations", heap.relocations.len());
    for ptr in heap.roots.pointers_mut() {
        heap.relocations.fix(ptr);
    }
    for cell in heap.young[target].iter_mut() {
        for slot in cell.slots_mut() {
            heap.relocations.fix_slot(slot);
        }
    }
    for cell in heap.old.iter_mut() {
        cell.unmark();
        for slot in cell.slots_mut() {
            heap.relocations.fix_slot(slot);
        }
    }
    heap.relocations.clear();

    // Dropping the garbage left in the dead buffer releases anything it
    // owned; the allocation itself is kept for reuse.
    dead.clear();
    heap.young[active] = dead;
    heap.current = target as u8;
    heap.roots.remove_released();

    heap.stats.record(&report);
    heap.stats.record_time(start.elapsed());

    debug!(
        "young collection: {} survived, {} promoted, {} reclaimed{}",
        report.survivors,
        report.promoted,
        report.reclaimed,
        if report.old_collected {
            format!(" (old compacted, {} reclaimed)", report.old_reclaimed)
        } else {
            String::new()
        }
    );

    Ok(report)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::memory::{alloc::Allocator, settings::HeapSettings};

    fn heap(threshold: u8) -> Heap {
        Heap::with_settings(
            HeapSettings::default()
                .with_young_capacity(64)
                .with_old_capacity(32)
                .with_promotion_threshold(threshold),
        )
        .unwrap()
    }

    #[test]
    pub fn test_empty_collection() {
        let mut heap = heap(2);
        let report = heap.collect().unwrap();
        assert_eq!(report, CollectionReport::default());
        assert_eq!(heap.collection_stats().young_collections, 1);
    }

    #[test]
    pub fn test_garbage_reclaimed_and_survivors_copied() {
        let mut heap = heap(2);
        let keep = heap.allocate_list(3).unwrap();
        heap.allocate(10).unwrap();
        heap[keep].set_car(11);
        let root = heap.add_root(keep);

        let report = heap.collect().unwrap();
        assert_eq!(report.survivors, 3);
        assert_eq!(report.reclaimed, 10);
        assert_eq!(heap.stats().young_used, 3);

        let moved = heap.root(root).unwrap();
        assert_ne!(moved, keep);
        assert_eq!(heap[moved].car::<i32>(), Some(&11));
        assert_eq!(heap.list_iter(moved).count(), 3);
        assert!(heap
            .list_iter(moved)
            .all(|p| heap[p].flags() == CellFlags::SURVIVOR1));
    }

    #[test]
    pub fn test_promotion_on_threshold() {
        let mut heap = heap(2);
        let p = heap.allocate(1).unwrap();
        let root = heap.add_root(p);

        let first = heap.collect().unwrap();
        assert_eq!(first.promoted, 0);
        assert!(!heap.root(root).unwrap().is_old());

        let second = heap.collect().unwrap();
        assert_eq!(second.promoted, 1);
        let promoted = heap.root(root).unwrap();
        assert!(promoted.is_old());
        assert!(heap[promoted].flags().contains(CellFlags::PROMOTED));
        assert!(!heap[promoted].is_marked());
    }

    #[test]
    pub fn test_three_step_ladder() {
        let mut heap = heap(3);
        let root = {
            let p = heap.allocate(1).unwrap();
            heap.add_root(p)
        };
        heap.collect().unwrap();
        heap.collect().unwrap();
        assert!(!heap.root(root).unwrap().is_old());
        assert_eq!(
            heap[heap.root(root).unwrap()].flags(),
            CellFlags::SURVIVOR2
        );
        heap.collect().unwrap();
        assert!(heap.root(root).unwrap().is_old());
    }

    #[test]
    pub fn test_old_to_young_pointer_fixed() {
        let mut heap = heap(1);
        let parent = heap.allocate(1).unwrap();
        let root = heap.add_root(parent);
        heap.collect().unwrap();
        let parent = heap.root(root).unwrap();
        assert!(parent.is_old());

        let child = heap.allocate(1).unwrap();
        heap[child].set_car(99);
        heap[parent].set_car(child);

        // threshold 1 promotes the child too; its pointer must follow
        heap.collect().unwrap();
        let child = *heap[parent].car::<CellPtr>().unwrap();
        assert!(child.is_old());
        assert_eq!(heap[child].car::<i32>(), Some(&99));
    }

    #[test]
    pub fn test_compaction_over_high_water() {
        let mut heap = Heap::with_settings(
            HeapSettings::default()
                .with_young_capacity(16)
                .with_old_capacity(16)
                .with_old_high_water(4)
                .with_promotion_threshold(1),
        )
        .unwrap();

        let keep = heap.allocate(1).unwrap();
        heap[keep].set_car(7);
        let root = heap.add_root(keep);
        let temp = heap.allocate(5).unwrap();
        let temps: Vec<_> = (0..5).map(|i| heap.add_root(temp.offset(i))).collect();
        heap.collect().unwrap();
        assert_eq!(heap.stats().old_used, 6);

        for id in temps {
            heap.remove_root(id);
        }
        let report = heap.collect().unwrap();
        assert!(report.old_collected);
        assert_eq!(report.old_reclaimed, 5);
        assert_eq!(heap.stats().old_used, 1);
        assert_eq!(heap[heap.root(root).unwrap()].car::<i32>(), Some(&7));
    }

    #[test]
    pub fn test_old_exhaustion_changes_nothing() {
        let mut heap = Heap::with_settings(
            HeapSettings::default()
                .with_young_capacity(16)
                .with_old_capacity(4)
                .with_promotion_threshold(1),
        )
        .unwrap();

        let list = heap.allocate_list(6).unwrap();
        let root = heap.add_root(list);

        let result = heap.collect();
        assert!(matches!(
            result,
            Err(HeapError::OldGenerationExhausted {
                live: 0,
                promoting: 6,
                capacity: 4
            })
        ));
        assert_eq!(heap.root(root), Some(list));
        assert_eq!(heap.list_iter(list).count(), 6);
        assert!(heap.list_iter(list).all(|p| !heap[p].is_marked()));
        assert_eq!(heap.stats().old_used, 0);
        assert_eq!(heap.collection_stats().failed_collections, 1);
        assert_eq!(heap.collection_stats().young_collections, 0);
    }
}
