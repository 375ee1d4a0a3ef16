//! Statistics generation from the result database
//!
//! This module provides functionality for extracting and displaying
//! per-task statistics from the storage layer.

use crate::storage::{ResultType, Storage, TaskRecord};
use crate::Result;
use std::collections::HashMap;

/// Number of invalid URLs listed by [`print_statistics`]
const TOP_INVALID: usize = 20;

/// Statistics for one crawl task
#[derive(Debug, Clone)]
pub struct TaskStatistics {
    pub task: TaskRecord,

    /// Result rows by type (one row per URL and referencing page)
    pub results_by_type: HashMap<ResultType, u64>,

    /// Invalid result rows
    pub invalid_results: u64,

    /// Result rows pointing off the seed host
    pub external_results: u64,

    /// Distinct URLs checked
    pub distinct_urls: u64,

    /// `(url, status, referencing pages)` for every invalid URL, most referenced first
    pub invalid_urls: Vec<(String, u16, u64)>,
}

impl TaskStatistics {
    /// Total result rows across all types
    pub fn total_results(&self) -> u64 {
        self.results_by_type.values().sum()
    }
}

/// Loads statistics for a task from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `task_id` - Task to summarize
///
/// # Returns
///
/// * `Ok(TaskStatistics)` - Successfully loaded statistics
/// * `Err(LinkrotError)` - The task does not exist or a query failed
pub fn load_statistics(storage: &dyn Storage, task_id: i64) -> Result<TaskStatistics> {
    let task = storage.get_task(task_id)?;

    Ok(TaskStatistics {
        task,
        results_by_type: storage.count_results_by_type(task_id)?,
        invalid_results: storage.count_invalid_results(task_id)?,
        external_results: storage.count_external_results(task_id)?,
        distinct_urls: storage.count_distinct_urls(task_id)?,
        invalid_urls: storage.get_invalid_urls(task_id)?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &TaskStatistics) {
    let task = &stats.task;
    println!("=== Task {} Statistics ===\n", task.id);

    println!("Task:");
    println!("  Name: {}", task.name);
    println!("  Status: {}", task.status);
    println!("  Started: {}", task.start_time.to_rfc3339());
    match task.end_time {
        Some(end) => {
            println!("  Finished: {}", end.to_rfc3339());
            println!("  Duration: {}s", (end - task.start_time).num_seconds());
        }
        None => println!("  Finished: -"),
    }
    println!("  Checked: {}", task.total_links);
    println!("  Invalid: {}", task.invalid_links);
    println!();

    println!("Results:");
    println!("  Total rows: {}", stats.total_results());
    for result_type in [ResultType::Link, ResultType::Source] {
        let count = stats.results_by_type.get(&result_type).copied().unwrap_or(0);
        println!("  {}: {}", result_type.to_db_string(), count);
    }
    println!("  Distinct URLs: {}", stats.distinct_urls);
    println!("  External rows: {}", stats.external_results);
    println!("  Invalid rows: {}", stats.invalid_results);
    println!();

    if !stats.invalid_urls.is_empty() {
        println!("Invalid URLs ({}):", stats.invalid_urls.len());
        for (url, status, references) in stats.invalid_urls.iter().take(TOP_INVALID) {
            println!("  [{}] {} ({} reference(s))", status, url, references);
        }
        if stats.invalid_urls.len() > TOP_INVALID {
            println!("  ... and {} more", stats.invalid_urls.len() - TOP_INVALID);
        }
        println!();
    }

    let valid_rate = if stats.total_results() > 0 {
        let valid = stats.total_results() - stats.invalid_results;
        (valid as f64 / stats.total_results() as f64) * 100.0
    } else {
        0.0
    };
    println!("Valid Rate: {:.1}%", valid_rate);
}
