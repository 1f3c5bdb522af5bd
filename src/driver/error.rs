//! Overall high-level error type for the consheap driver
use crate::memory::{heap::HeapError, settings::SettingsError};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Heap(#[from] HeapError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("heap verification failed: {0}")]
    Corrupted(String),
}

impl DriverError {
    /// Process exit code to report this error with
    pub fn exit_code(&self) -> i32 {
        match self {
            DriverError::Corrupted(_) => 1,
            _ => 2,
        }
    }
}
