//! Command line driver exercising the heap
pub mod churn;
pub mod demo;
pub mod error;
pub mod options;
pub mod statistics;
