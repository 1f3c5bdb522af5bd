//! Heap occupancy and collection counters

use std::{fmt::Display, time::Duration};

/// Snapshot of heap occupancy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Cells in use in the active young buffer
    pub young_used: usize,
    /// Capacity of each young buffer
    pub young_capacity: usize,
    /// Cells in the old generation
    pub old_used: usize,
    /// Capacity of the old generation
    pub old_capacity: usize,
    /// Registered roots
    pub roots: usize,
}

/// Outcome of a single young collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    /// Cells copied into the live young buffer
    pub survivors: usize,
    /// Cells moved into the old generation
    pub promoted: usize,
    /// Young cells left behind as garbage
    pub reclaimed: usize,
    /// Whether the old generation was compacted in this pass
    pub old_collected: bool,
    /// Old cells discarded by compaction
    pub old_reclaimed: usize,
}

/// Totals since the heap was created
#[derive(Debug, Clone, Default)]
pub struct CollectionStats {
    pub young_collections: u64,
    pub old_collections: u64,
    pub cells_copied: u64,
    pub cells_promoted: u64,
    pub cells_reclaimed: u64,
    pub old_cells_reclaimed: u64,
    /// Collections abandoned because the old generation was full
    pub failed_collections: u64,
    pub total_gc_time: Duration,
    pub last_collection_time: Option<Duration>,
}

impl CollectionStats {
    pub fn record(&mut self, report: &CollectionReport) {
        self.young_collections += 1;
        if report.old_collected {
            self.old_collections += 1;
        }
        self.cells_copied += report.survivors as u64;
        self.cells_promoted += report.promoted as u64;
        self.cells_reclaimed += report.reclaimed as u64;
        self.old_cells_reclaimed += report.old_reclaimed as u64;
    }

    /// Timings are only gathered in debug builds or with the
    /// `gc-telemetry` feature
    pub fn record_time(&mut self, elapsed: Duration) {
        #[cfg(any(debug_assertions, feature = "gc-telemetry"))]
        {
            self.total_gc_time += elapsed;
            self.last_collection_time = Some(elapsed);
        }

        #[cfg(not(any(debug_assertions, feature = "gc-telemetry")))]
        {
            let _ = elapsed;
        }
    }

    pub fn record_failure(&mut self) {
        self.failed_collections += 1;
    }
}

impl Display for HeapStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Young          : {:10} / {:10}",
            self.young_used, self.young_capacity
        )?;
        writeln!(
            f,
            "Old            : {:10} / {:10}",
            self.old_used, self.old_capacity
        )?;
        writeln!(f, "Roots          : {:10}", self.roots)
    }
}

impl Display for CollectionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Young GCs      : {:10}", self.young_collections)?;
        writeln!(f, "Old GCs        : {:10}", self.old_collections)?;
        writeln!(f, "Failed GCs     : {:10}", self.failed_collections)?;
        writeln!(f, "Copied         : {:10}", self.cells_copied)?;
        writeln!(f, "Promoted       : {:10}", self.cells_promoted)?;
        writeln!(f, "Reclaimed      : {:10}", self.cells_reclaimed)?;
        writeln!(f, "Old reclaimed  : {:10}", self.old_cells_reclaimed)?;
        writeln!(
            f,
            "GC time        : {:14.9}s",
            self.total_gc_time.as_secs_f64()
        )
    }
}
