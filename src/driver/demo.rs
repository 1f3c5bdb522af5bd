//! A small rooted structure mixing every kind of payload
//!
//! Three separate allocations are linked into one five element list
//! `(hello 1 <file> 3.2 "world")`. The last cell of the third
//! allocation holds a second file value but nothing points at it, so
//! the first collection reclaims it and releases the value.

use log::debug;

use crate::memory::{
    alloc::{Allocator, CellPtr},
    cell::SlotTag,
    heap::Heap,
    roots::RootId,
    symbol::{SymbolId, SymbolPool},
    value::{ExternalValue, ValueRef},
};

use super::error::DriverError;

/// A stand-in for an open file handle
pub struct FileValue {
    path: String,
}

impl FileValue {
    pub fn new<T: AsRef<str>>(path: T) -> Self {
        debug!("creating file value for {}", path.as_ref());
        FileValue {
            path: path.as_ref().to_string(),
        }
    }
}

impl ExternalValue for FileValue {
    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileValue {
    fn drop(&mut self) {
        debug!("destroying file value for {}", self.path);
    }
}

/// Handles needed to check the structure later
pub struct Demo {
    roots: [RootId; 3],
    hello: SymbolId,
    /// Reachable from the list
    pub linked: ValueRef,
    /// Only held by an unreachable cell
    pub orphan: ValueRef,
}

impl Demo {
    /// Allocate and root the structure
    pub fn build(heap: &mut Heap, symbols: &mut SymbolPool) -> Result<Demo, DriverError> {
        let hello = symbols.intern("hello");
        let linked = ValueRef::new(FileValue::new("linked.dat"));
        let orphan = ValueRef::new(FileValue::new("orphan.dat"));

        let a = heap.allocate(1)?;
        let ra = heap.add_root(a);
        let b = heap.allocate(2)?;
        let rb = heap.add_root(b);
        // keep the second cell reachable if the next allocation collects
        heap[b].set_cdr(b.offset(1));
        let c = heap.allocate(3)?;
        let rc = heap.add_root(c);

        // earlier allocations may have moved
        let (a, b) = (root_ptr(heap, ra)?, root_ptr(heap, rb)?);
        let b1 = heap[b]
            .cdr::<CellPtr>()
            .copied()
            .ok_or_else(|| corrupted("demo link lost during build"))?;

        heap[a].set_car(hello);
        heap[a].set_cdr(b);
        heap[b].set_car(1);
        heap[b1].set_car(linked.clone());
        heap[b1].set_cdr(c);
        heap[c].set_car(3.2f64);
        heap[c].set_cdr(c.offset(1));
        heap[c.offset(1)].set_car("world");
        heap[c.offset(1)].set_cdr_nil();
        heap[c.offset(2)].set_car(orphan.clone());
        heap[c.offset(2)].set_cdr_nil();

        Ok(Demo {
            roots: [ra, rb, rc],
            hello,
            linked,
            orphan,
        })
    }

    pub fn head(&self, heap: &Heap) -> Option<CellPtr> {
        heap.root(self.roots[0])
    }

    /// Check every payload survived intact
    pub fn verify(&self, heap: &Heap) -> Result<(), DriverError> {
        let head = self
            .head(heap)
            .ok_or_else(|| corrupted("demo root missing"))?;
        let cells: Vec<_> = heap.list_iter(head).collect();
        if cells.len() != 5 {
            return Err(corrupted(format!(
                "demo list has {} cells, expected 5",
                cells.len()
            )));
        }

        let tags: Vec<_> = cells.iter().map(|p| heap[*p].car_tag()).collect();
        let expected = [
            SlotTag::Symbol,
            SlotTag::Int,
            SlotTag::ValueRef,
            SlotTag::Double,
            SlotTag::String,
        ];
        if tags != expected {
            return Err(corrupted(format!("demo list tags {:?}", tags)));
        }

        let intact = heap[cells[0]].car::<SymbolId>() == Some(&self.hello)
            && heap[cells[1]].car::<i32>() == Some(&1)
            && heap[cells[2]]
                .car::<ValueRef>()
                .map_or(false, |v| v.ptr_eq(&self.linked))
            && heap[cells[3]].car::<f64>() == Some(&3.2)
            && heap[cells[4]].car::<str>() == Some("world");
        if !intact {
            return Err(corrupted("demo list payloads changed"));
        }

        // the second and third roots must still point into the list
        for (id, expected) in self.roots[1..].iter().zip([cells[1], cells[3]]) {
            if heap.root(*id) != Some(expected) {
                return Err(corrupted("demo root not relocated with its cell"));
            }
        }

        if self.linked.ref_count() != 2 {
            return Err(corrupted(format!(
                "linked file value has {} references",
                self.linked.ref_count()
            )));
        }
        Ok(())
    }

    pub fn release(self, heap: &mut Heap) {
        for id in self.roots {
            heap.remove_root(id);
        }
    }
}

fn root_ptr(heap: &Heap, id: RootId) -> Result<CellPtr, DriverError> {
    heap.root(id)
        .ok_or_else(|| corrupted(format!("root {:?} vanished", id)))
}

fn corrupted<T: Into<String>>(message: T) -> DriverError {
    DriverError::Corrupted(message.into())
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::memory::settings::HeapSettings;

    #[test]
    pub fn test_demo_survives_collections() {
        let mut heap = Heap::new();
        let mut symbols = SymbolPool::new();
        let demo = Demo::build(&mut heap, &mut symbols).unwrap();
        demo.verify(&heap).unwrap();
        assert_eq!(demo.orphan.ref_count(), 2);

        for _ in 0..4 {
            heap.collect().unwrap();
            demo.verify(&heap).unwrap();
        }
        assert_eq!(demo.orphan.ref_count(), 1);
        assert_eq!(symbols.resolve(demo.hello), Some("hello"));
    }

    #[test]
    pub fn test_demo_built_across_collection() {
        let mut heap =
            Heap::with_settings(HeapSettings::default().with_young_capacity(8)).unwrap();
        heap.allocate(4).unwrap();
        let mut symbols = SymbolPool::new();
        let demo = Demo::build(&mut heap, &mut symbols).unwrap();
        assert_eq!(heap.collection_stats().young_collections, 1);
        demo.verify(&heap).unwrap();
    }

    #[test]
    pub fn test_broken_structure_detected() {
        let mut heap = Heap::new();
        let mut symbols = SymbolPool::new();
        let demo = Demo::build(&mut heap, &mut symbols).unwrap();
        let head = demo.head(&heap).unwrap();
        heap[head].set_cdr_nil();
        assert!(matches!(
            demo.verify(&heap),
            Err(DriverError::Corrupted(_))
        ));
    }
}
