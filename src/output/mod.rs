//! Output module for reporting task results
//!
//! This module handles:
//! - Loading per-task statistics from storage
//! - Printing them for the command line

pub mod stats;

pub use stats::{load_statistics, print_statistics, TaskStatistics};
