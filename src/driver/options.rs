//! Command line argument handling

use std::{fs, path::PathBuf};

use structopt::StructOpt;

use crate::memory::settings::HeapSettings;

use super::error::DriverError;

/// Exercise the generational cons cell heap
#[derive(StructOpt, Debug, Clone)]
#[structopt(name = "consheap")]
pub struct ConsheapOptions {
    /// Number of throwaway lists to allocate
    #[structopt(short = "n", long = "iterations", default_value = "2000")]
    pub iterations: usize,

    /// Cells in each allocated list
    #[structopt(short = "l", long = "list-length", default_value = "20")]
    pub list_length: usize,

    /// Keep every Nth list alive in a rooted chain (0 keeps none)
    #[structopt(short = "r", long = "retain-every", default_value = "0")]
    pub retain_every: usize,

    /// Drop the retained chain whenever it reaches this many lists
    /// (0 never drops it)
    #[structopt(short = "w", long = "retain-window", default_value = "0")]
    pub retain_window: usize,

    /// TOML file of heap settings
    #[structopt(short = "c", long = "config", parse(from_os_str))]
    pub config: Option<PathBuf>,

    /// Cells per young semispace
    #[structopt(long = "young-capacity")]
    pub young_capacity: Option<usize>,

    /// Cells in the old generation
    #[structopt(long = "old-capacity")]
    pub old_capacity: Option<usize>,

    /// Old generation occupancy that triggers compaction
    #[structopt(long = "old-high-water")]
    pub old_high_water: Option<usize>,

    /// Young collections survived before promotion (1 to 3)
    #[structopt(long = "promotion-threshold")]
    pub promotion_threshold: Option<u8>,

    /// Print metrics to stderr before exiting
    #[structopt(short = "S", long = "statistics")]
    pub statistics: bool,

    /// Dump heap contents to stderr before exiting
    #[structopt(long = "dump-heap")]
    pub dump_heap: bool,
}

impl ConsheapOptions {
    /// Heap settings from the config file (if any) overridden by
    /// command line flags
    ///
    /// An explicit high-water mark, from either source, survives an
    /// `--old-capacity` override; otherwise the mark follows the new
    /// capacity.
    pub fn heap_settings(&self) -> Result<HeapSettings, DriverError> {
        let (mut settings, mut high_water) = match &self.config {
            Some(path) => {
                HeapSettings::from_toml_with_high_water(&fs::read_to_string(path)?)?
            }
            None => (HeapSettings::default(), None),
        };

        if let Some(cells) = self.young_capacity {
            settings = settings.with_young_capacity(cells);
        }
        if let Some(cells) = self.old_capacity {
            settings = settings.with_old_capacity(cells);
        }
        if self.old_high_water.is_some() {
            high_water = self.old_high_water;
        }
        if let Some(cells) = high_water {
            settings = settings.with_old_high_water(cells);
        }
        if let Some(survivals) = self.promotion_threshold {
            settings = settings.with_promotion_threshold(survivals);
        }

        settings.validate()?;
        Ok(settings)
    }
}
