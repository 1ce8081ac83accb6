//! Output module for reporting on a run
//!
//! This module handles:
//! - Recording statistics over delivered navigation results
//! - Printing a run summary

pub mod stats;

pub use stats::{print_statistics, RunStatistics};
