//! Storage traits and error types
//!
//! This module defines the persistence interface the crawler writes
//! through, and its error type.

use crate::storage::{LinkCheckResult, ResultType, TaskRecord};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage handle shared between the service and its crawl workers
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Trait for storage backend implementations
///
/// The crawler only ever writes new tasks, appends results and performs a
/// single finalizing update per task.
pub trait Storage {
    // ===== Task Management =====

    /// Creates a new task in the `RUNNING` state
    ///
    /// # Arguments
    ///
    /// * `name` - Human readable task name
    /// * `config` - Free-form configuration blob stored alongside the task
    ///
    /// # Returns
    ///
    /// The ID of the newly created task
    fn create_task(&mut self, name: &str, config: &str) -> StorageResult<i64>;

    /// Gets a task by ID
    fn get_task(&self, task_id: i64) -> StorageResult<TaskRecord>;

    /// Writes the task's status, end time and counters
    fn save_task(&mut self, task: &TaskRecord) -> StorageResult<()>;

    // ===== Results =====

    /// Appends one result row
    fn save_result(&mut self, result: &LinkCheckResult) -> StorageResult<()>;

    /// Appends a batch of result rows atomically
    fn save_results(&mut self, results: &[LinkCheckResult]) -> StorageResult<()>;

    /// Gets every result recorded for a task, in insertion order
    fn results_for_task(&self, task_id: i64) -> StorageResult<Vec<LinkCheckResult>>;

    // ===== Statistics =====

    /// Counts result rows for a task by type
    fn count_results_by_type(&self, task_id: i64) -> StorageResult<HashMap<ResultType, u64>>;

    /// Counts invalid result rows for a task
    fn count_invalid_results(&self, task_id: i64) -> StorageResult<u64>;

    /// Counts external result rows for a task
    fn count_external_results(&self, task_id: i64) -> StorageResult<u64>;

    /// Counts distinct URLs checked for a task
    fn count_distinct_urls(&self, task_id: i64) -> StorageResult<u64>;

    /// Gets `(url, status, referencing page count)` for every invalid URL of a task
    fn get_invalid_urls(&self, task_id: i64) -> StorageResult<Vec<(String, u16, u64)>>;
}
