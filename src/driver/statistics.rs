//! Capture and report statistics for a driver run

use std::{fmt::Display, time::Duration};

use indexmap::IndexMap;

use crate::memory::{
    heap::Heap,
    stats::{CollectionStats, HeapStats},
};

#[derive(Default, Debug)]
pub struct Timings {
    timings: IndexMap<String, Duration>,
}

impl Timings {
    pub fn record<T: AsRef<str>>(&mut self, name: T, elapsed: Duration) {
        self.timings.insert(name.as_ref().to_string(), elapsed);
    }

    pub fn get(&self, name: &str) -> Option<Duration> {
        self.timings.get(name).copied()
    }
}

impl Display for Timings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self.timings.keys().map(|k| k.len()).max().unwrap_or(0) + 1;

        for (k, v) in &self.timings {
            writeln!(f, "{:width$}: {:14.9}s", k, v.as_secs_f64(), width = width)?;
        }
        Ok(())
    }
}

/// The statistics captured during a run
#[derive(Default, Debug)]
pub struct Statistics {
    lists_allocated: u64,
    lists_retained: u64,
    occupancy: Option<HeapStats>,
    collections: CollectionStats,
    timings: Timings,
}

impl Statistics {
    pub fn add_list(&mut self, retained: bool) {
        self.lists_allocated += 1;
        if retained {
            self.lists_retained += 1;
        }
    }

    pub fn lists_allocated(&self) -> u64 {
        self.lists_allocated
    }

    pub fn lists_retained(&self) -> u64 {
        self.lists_retained
    }

    /// Snapshot the heap's occupancy and collection counters
    pub fn capture(&mut self, heap: &Heap) {
        self.occupancy = Some(heap.stats());
        self.collections = heap.collection_stats().clone();
    }

    pub fn collections(&self) -> &CollectionStats {
        &self.collections
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn timings_mut(&mut self) -> &mut Timings {
        &mut self.timings
    }
}

impl Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Lists          : {:10}", self.lists_allocated)?;
        writeln!(f, "Retained       : {:10}", self.lists_retained)?;
        if let Some(occupancy) = &self.occupancy {
            write!(f, "{}", occupancy)?;
        }
        writeln!(f)?;
        writeln!(f, "{}", self.collections)?;
        writeln!(f, "{}", self.timings)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_display_includes_sections() {
        let mut stats = Statistics::default();
        stats.add_list(true);
        stats.add_list(false);
        stats.capture(&Heap::new());
        stats.timings_mut().record("churn", Duration::from_millis(3));

        let text = format!("{}", stats);
        assert!(text.contains("Lists          :          2"));
        assert!(text.contains("Retained       :          1"));
        assert!(text.contains("Young GCs"));
        assert!(text.contains("churn"));
    }

    #[test]
    pub fn test_empty_timings_display() {
        assert_eq!(format!("{}", Timings::default()), "");
    }
}
