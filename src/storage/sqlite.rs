//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::TaskStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{LinkCheckResult, ResultType, TaskRecord};
use crate::LinkrotError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const RESULT_COLUMNS: &str = "task_id, url, parent_url, type, is_external, response_status, \
     is_valid, extracted_data, check_time, check_duration_ms";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(LinkrotError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, LinkrotError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, LinkrotError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Parses an RFC 3339 column into a UTC timestamp
fn parse_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn corrupt(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(StorageError::Corrupt(message)),
    )
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    let start: String = row.get(2)?;
    let end: Option<String> = row.get(3)?;
    let status: String = row.get(4)?;

    Ok(TaskRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        start_time: parse_time(2, &start)?,
        end_time: end.as_deref().map(|e| parse_time(3, e)).transpose()?,
        status: TaskStatus::from_db_string(&status)
            .ok_or_else(|| corrupt(4, format!("unknown task status '{}'", status)))?,
        total_links: row.get::<_, i64>(5)?.max(0) as u64,
        invalid_links: row.get::<_, i64>(6)?.max(0) as u64,
        config: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<LinkCheckResult> {
    let kind: String = row.get(3)?;
    let check_time: String = row.get(8)?;

    Ok(LinkCheckResult {
        task_id: row.get(0)?,
        url: row.get(1)?,
        parent_url: row.get(2)?,
        result_type: ResultType::from_db_string(&kind)
            .ok_or_else(|| corrupt(3, format!("unknown result type '{}'", kind)))?,
        external: row.get(4)?,
        response_status: row.get(5)?,
        valid: row.get(6)?,
        extracted_data: row.get(7)?,
        check_time: parse_time(8, &check_time)?,
        check_duration_ms: row.get(9)?,
    })
}

fn insert_result(conn: &Connection, result: &LinkCheckResult) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "INSERT INTO link_check_result ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            RESULT_COLUMNS
        ),
        params![
            result.task_id,
            result.url,
            result.parent_url,
            result.result_type.to_db_string(),
            result.external,
            result.response_status,
            result.valid,
            result.extracted_data,
            result.check_time.to_rfc3339(),
            result.check_duration_ms,
        ],
    )
}

impl Storage for SqliteStorage {
    // ===== Task Management =====

    fn create_task(&mut self, name: &str, config: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO link_check_task (task_name, start_time, status, config) VALUES (?1, ?2, ?3, ?4)",
            params![name, now, TaskStatus::Running.to_db_string(), config],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_task(&self, task_id: i64) -> StorageResult<TaskRecord> {
        self.conn
            .query_row(
                "SELECT id, task_name, start_time, end_time, status, total_links, invalid_links, config
                 FROM link_check_task WHERE id = ?1",
                params![task_id],
                task_from_row,
            )
            .optional()?
            .ok_or(StorageError::TaskNotFound(task_id))
    }

    fn save_task(&mut self, task: &TaskRecord) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE link_check_task
             SET task_name = ?1, end_time = ?2, status = ?3, total_links = ?4, invalid_links = ?5, config = ?6
             WHERE id = ?7",
            params![
                task.name,
                task.end_time.map(|t| t.to_rfc3339()),
                task.status.to_db_string(),
                task.total_links as i64,
                task.invalid_links as i64,
                task.config,
                task.id,
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::TaskNotFound(task.id));
        }
        Ok(())
    }

    // ===== Results =====

    fn save_result(&mut self, result: &LinkCheckResult) -> StorageResult<()> {
        insert_result(&self.conn, result)?;
        Ok(())
    }

    fn save_results(&mut self, results: &[LinkCheckResult]) -> StorageResult<()> {
        if results.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        for result in results {
            insert_result(&tx, result)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn results_for_task(&self, task_id: i64) -> StorageResult<Vec<LinkCheckResult>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM link_check_result WHERE task_id = ?1 ORDER BY id",
            RESULT_COLUMNS
        ))?;

        let results = stmt
            .query_map(params![task_id], result_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(results)
    }

    // ===== Statistics =====

    fn count_results_by_type(&self, task_id: i64) -> StorageResult<HashMap<ResultType, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT type, COUNT(*) FROM link_check_result WHERE task_id = ?1 GROUP BY type",
        )?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map(params![task_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (kind, count) = row?;
            if let Some(kind) = ResultType::from_db_string(&kind) {
                counts.insert(kind, count as u64);
            }
        }

        Ok(counts)
    }

    fn count_invalid_results(&self, task_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM link_check_result WHERE task_id = ?1 AND is_valid = 0",
            params![task_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_external_results(&self, task_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM link_check_result WHERE task_id = ?1 AND is_external = 1",
            params![task_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_distinct_urls(&self, task_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT url) FROM link_check_result WHERE task_id = ?1",
            params![task_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_invalid_urls(&self, task_id: i64) -> StorageResult<Vec<(String, u16, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, MAX(response_status), COUNT(*) FROM link_check_result
             WHERE task_id = ?1 AND is_valid = 0
             GROUP BY url ORDER BY COUNT(*) DESC, url",
        )?;

        let rows = stmt
            .query_map(params![task_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u16>(1)?,
                    row.get::<_, i64>(2)? as u64,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(task_id: i64, url: &str, status: u16) -> LinkCheckResult {
        LinkCheckResult {
            task_id,
            url: url.to_string(),
            parent_url: Some("https://example.com/".to_string()),
            result_type: ResultType::Source,
            external: false,
            response_status: status,
            valid: LinkCheckResult::is_valid_status(status),
            extracted_data: None,
            check_time: Utc::now(),
            check_duration_ms: 42,
        }
    }

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteStorage::new_in_memory().is_ok());
    }

    #[test]
    fn test_create_and_get_task() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let task_id = storage.create_task("nightly", r#"{"seed":"x"}"#).unwrap();
        assert!(task_id > 0);

        let task = storage.get_task(task_id).unwrap();
        assert_eq!(task.name, "nightly");
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.config, r#"{"seed":"x"}"#);
        assert!(task.end_time.is_none());
    }

    #[test]
    fn test_get_missing_task() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_task(99),
            Err(StorageError::TaskNotFound(99))
        ));
    }

    #[test]
    fn test_save_task_finalizes() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let task_id = storage.create_task("t", "").unwrap();

        let mut task = storage.get_task(task_id).unwrap();
        task.finish(TaskStatus::Failed, 7, 3).unwrap();
        storage.save_task(&task).unwrap();

        let loaded = storage.get_task(task_id).unwrap();
        assert_eq!(loaded.status, TaskStatus::Failed);
        assert_eq!(loaded.total_links, 7);
        assert_eq!(loaded.invalid_links, 3);
        assert!(loaded.end_time.is_some());
    }

    #[test]
    fn test_save_task_unknown_id() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let task_id = storage.create_task("t", "").unwrap();
        let mut task = storage.get_task(task_id).unwrap();
        task.id = 1234;
        assert!(storage.save_task(&task).is_err());
    }

    #[test]
    fn test_results_roundtrip_in_order() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let task_id = storage.create_task("t", "").unwrap();

        let mut first = sample_result(task_id, "https://example.com/", 200);
        first.parent_url = None;
        first.result_type = ResultType::Link;
        first.extracted_data = Some("<h1>Hi</h1>".to_string());
        storage.save_result(&first).unwrap();
        storage
            .save_results(&[
                sample_result(task_id, "https://example.com/a.png", 404),
                sample_result(task_id, "https://example.com/b.css", 200),
            ])
            .unwrap();

        let loaded = storage.results_for_task(task_id).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].parent_url, None);
        assert_eq!(loaded[0].result_type, ResultType::Link);
        assert_eq!(loaded[0].extracted_data.as_deref(), Some("<h1>Hi</h1>"));
        assert_eq!(loaded[1].url, "https://example.com/a.png");
        assert!(!loaded[1].valid);
        assert_eq!(loaded[2].response_status, 200);
    }

    #[test]
    fn test_results_scoped_by_task() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let a = storage.create_task("a", "").unwrap();
        let b = storage.create_task("b", "").unwrap();
        storage.save_result(&sample_result(a, "https://example.com/x", 200)).unwrap();

        assert_eq!(storage.results_for_task(a).unwrap().len(), 1);
        assert!(storage.results_for_task(b).unwrap().is_empty());
    }

    #[test]
    fn test_statistics_queries() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let task_id = storage.create_task("t", "").unwrap();

        let mut external = sample_result(task_id, "https://other.org/", 200);
        external.external = true;
        external.result_type = ResultType::Link;

        storage
            .save_results(&[
                external,
                sample_result(task_id, "https://example.com/gone.png", 404),
                sample_result(task_id, "https://example.com/gone.png", 404),
                sample_result(task_id, "https://example.com/ok.css", 200),
            ])
            .unwrap();

        let by_type = storage.count_results_by_type(task_id).unwrap();
        assert_eq!(by_type.get(&ResultType::Link), Some(&1));
        assert_eq!(by_type.get(&ResultType::Source), Some(&3));
        assert_eq!(storage.count_invalid_results(task_id).unwrap(), 2);
        assert_eq!(storage.count_external_results(task_id).unwrap(), 1);
        assert_eq!(storage.count_distinct_urls(task_id).unwrap(), 3);

        let invalid = storage.get_invalid_urls(task_id).unwrap();
        assert_eq!(
            invalid,
            vec![("https://example.com/gone.png".to_string(), 404, 2)]
        );
    }

    #[test]
    fn test_on_disk_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkrot.db");

        let task_id = {
            let mut storage = SqliteStorage::new(&path).unwrap();
            storage.create_task("persisted", "").unwrap()
        };

        let storage = SqliteStorage::new(&path).unwrap();
        assert_eq!(storage.get_task(task_id).unwrap().name, "persisted");
    }
}
