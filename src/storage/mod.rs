//! Storage module for persisting crawl tasks and link check results
//!
//! This module handles all database operations for the auditor, including:
//! - SQLite database initialization and schema management
//! - Task creation and the single finalizing write
//! - Result persistence, one row per (url, referencing page) pair
//! - Read helpers used for statistics

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{SharedStorage, Storage, StorageError, StorageResult};

use crate::state::TaskStatus;
use crate::{LinkrotError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(LinkrotError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Classification of a checked URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResultType {
    /// Fetched in HTML mode (a page)
    Link,
    /// Fetched with the lightweight client (an embedded resource)
    Source,
}

impl ResultType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Link => "LINK",
            Self::Source => "SOURCE",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "LINK" => Some(Self::Link),
            "SOURCE" => Some(Self::Source),
            _ => None,
        }
    }
}

/// Persisted outcome of checking one URL from one referencing page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkCheckResult {
    pub task_id: i64,
    pub url: String,
    /// Page that referenced this URL; `None` only for the seed
    pub parent_url: Option<String>,
    pub result_type: ResultType,
    /// Host differs from the seed host
    pub external: bool,
    pub response_status: u16,
    /// `200 <= response_status < 400`
    pub valid: bool,
    /// Outer HTML of elements matched by the content selector
    pub extracted_data: Option<String>,
    pub check_time: DateTime<Utc>,
    /// Fetch duration in milliseconds, `-1` when timing is unknown
    pub check_duration_ms: i64,
}

impl LinkCheckResult {
    /// Returns true if a status code counts as reachable
    pub fn is_valid_status(status: u16) -> bool {
        (200..400).contains(&status)
    }

    /// Returns a copy re-attached to a different referencing page
    pub fn with_parent(&self, parent_url: &str) -> Self {
        Self {
            parent_url: Some(parent_url.to_string()),
            ..self.clone()
        }
    }
}

/// Represents a crawl task
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: i64,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_status")]
    pub status: TaskStatus,
    pub total_links: u64,
    pub invalid_links: u64,
    /// Free-form JSON describing how the task was requested
    pub config: String,
}

impl TaskRecord {
    /// Moves the task to its terminal state and records the final counters
    ///
    /// # Errors
    ///
    /// Returns `LinkrotError::InvalidTransition` if the task is already
    /// terminal or `status` is not a terminal status. The record is left
    /// untouched in that case.
    pub fn finish(&mut self, status: TaskStatus, total: u64, invalid: u64) -> Result<()> {
        if !self.status.can_transition_to(status) {
            return Err(LinkrotError::InvalidTransition {
                from: self.status,
                to: status,
            });
        }

        self.status = status;
        self.total_links = total;
        self.invalid_links = invalid;
        self.end_time = Some(Utc::now());
        Ok(())
    }
}

fn serialize_status<S: serde::Serializer>(
    status: &TaskStatus,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(status.to_db_string())
}
