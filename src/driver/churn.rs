//! Allocation churn against a rooted structure
//!
//! Builds the demo structure, then allocates many short lists. Most
//! become garbage immediately; every `retain_every`th list is pushed
//! onto a rooted chain so that it survives, ages and is promoted. With
//! a retain window the chain is periodically abandoned, leaving dead
//! cells in the old generation for compaction to reclaim.

use std::time::Instant;

use log::{debug, info};

use crate::memory::{
    alloc::{Allocator, CellPtr},
    heap::Heap,
    roots::RootId,
    symbol::SymbolPool,
};

use super::{demo::Demo, error::DriverError, options::ConsheapOptions, statistics::Statistics};

/// Run the whole exercise, verifying the heap at the end
pub fn run(opts: &ConsheapOptions, statistics: &mut Statistics) -> Result<(), DriverError> {
    let mut heap = Heap::with_settings(opts.heap_settings()?)?;
    let mut symbols = SymbolPool::new();

    let t = Instant::now();
    let demo = Demo::build(&mut heap, &mut symbols)?;
    statistics.timings_mut().record("build", t.elapsed());

    let t = Instant::now();
    let mut chain = RetainedChain::default();
    for i in 0..opts.iterations {
        let list = fill_list(&mut heap, opts.list_length, i)?;
        let keep = opts.retain_every > 0 && (i + 1) % opts.retain_every == 0;
        if keep {
            chain.push(&mut heap, list, i)?;
            if opts.retain_window > 0 && chain.len() >= opts.retain_window {
                debug!("abandoning retained chain of {} lists", chain.len());
                chain.release(&mut heap);
            }
        }
        statistics.add_list(keep);
    }
    statistics.timings_mut().record("churn", t.elapsed());

    let t = Instant::now();
    demo.verify(&heap)?;
    chain.verify(&heap, opts.list_length)?;
    statistics.timings_mut().record("verify", t.elapsed());

    info!(
        "{} lists allocated, {} retained, {} young collections",
        statistics.lists_allocated(),
        chain.len(),
        heap.collection_stats().young_collections
    );

    statistics.capture(&heap);
    if opts.dump_heap {
        eprintln!("Heap after run:\n\n{:?}", &heap);
    }

    chain.release(&mut heap);
    demo.release(&mut heap);
    Ok(())
}

/// Allocate a list of `length` cells holding integers, the last one
/// being `iteration`
pub fn fill_list(
    heap: &mut Heap,
    length: usize,
    iteration: usize,
) -> Result<CellPtr, DriverError> {
    let head = heap.allocate_list(length)?;
    for j in 0..length - 1 {
        heap[head.offset(j)].set_car(scatter(iteration, j));
    }
    heap[head.offset(length - 1)].set_car(iteration as i32);
    Ok(head)
}

/// Cheap deterministic filler in `0..=iteration`
fn scatter(iteration: usize, position: usize) -> i32 {
    (iteration.wrapping_mul(7919).wrapping_add(position * 31) % (iteration + 1)) as i32
}

/// Retained lists, newest first, each hung off the car of a spine cell
#[derive(Default)]
pub struct RetainedChain {
    root: Option<RootId>,
    /// Iteration numbers of the retained lists, oldest first
    iterations: Vec<usize>,
}

impl RetainedChain {
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    pub fn head(&self, heap: &Heap) -> Option<CellPtr> {
        self.root.and_then(|id| heap.root(id))
    }

    /// Hang `list` off a new spine cell at the front of the chain
    pub fn push(
        &mut self,
        heap: &mut Heap,
        list: CellPtr,
        iteration: usize,
    ) -> Result<(), DriverError> {
        // the spine allocation may collect, so hold the list meanwhile
        let pending = heap.add_root(list);
        let spine = heap.allocate(1);
        let list = heap.root(pending);
        heap.remove_root(pending);
        let (spine, list) = (spine?, list.ok_or_else(|| lost("pending list"))?);

        heap[spine].set_car(list);
        if let Some(previous) = self.head(heap) {
            heap[spine].set_cdr(previous);
        }

        match self.root {
            Some(id) => {
                heap.set_root(id, spine);
            }
            None => self.root = Some(heap.add_root(spine)),
        }
        self.iterations.push(iteration);
        Ok(())
    }

    /// Check the chain holds exactly the retained lists, intact
    pub fn verify(&self, heap: &Heap, list_length: usize) -> Result<(), DriverError> {
        let spines: Vec<_> = match self.head(heap) {
            Some(head) => heap.list_iter(head).collect(),
            None => vec![],
        };
        if spines.len() != self.iterations.len() {
            return Err(DriverError::Corrupted(format!(
                "retained chain has {} lists, expected {}",
                spines.len(),
                self.iterations.len()
            )));
        }

        for (spine, iteration) in spines.iter().zip(self.iterations.iter().rev()) {
            let list = heap[*spine]
                .car::<CellPtr>()
                .copied()
                .ok_or_else(|| lost("retained list"))?;
            let cells: Vec<_> = heap.list_iter(list).collect();
            if cells.len() != list_length {
                return Err(DriverError::Corrupted(format!(
                    "retained list {} has {} cells, expected {}",
                    iteration,
                    cells.len(),
                    list_length
                )));
            }
            for (j, cell) in cells.iter().enumerate() {
                let expected = if j + 1 == list_length {
                    *iteration as i32
                } else {
                    scatter(*iteration, j)
                };
                if heap[*cell].car::<i32>() != Some(&expected) {
                    return Err(DriverError::Corrupted(format!(
                        "retained list {} changed at position {}",
                        iteration, j
                    )));
                }
            }
        }
        Ok(())
    }

    /// Unroot the chain, leaving it as garbage
    pub fn release(&mut self, heap: &mut Heap) {
        if let Some(id) = self.root.take() {
            heap.remove_root(id);
        }
        self.iterations.clear();
    }
}

fn lost(what: &str) -> DriverError {
    DriverError::Corrupted(format!("{} lost across collection", what))
}
