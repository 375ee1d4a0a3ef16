//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Sumi-Linkrot database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl task
CREATE TABLE IF NOT EXISTS link_check_task (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_name TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    status TEXT NOT NULL,
    total_links INTEGER NOT NULL DEFAULT 0,
    invalid_links INTEGER NOT NULL DEFAULT 0,
    config TEXT
);

-- One row per (url, referencing page) observed by a task
CREATE TABLE IF NOT EXISTS link_check_result (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL REFERENCES link_check_task(id),
    url TEXT NOT NULL,
    parent_url TEXT,
    type TEXT NOT NULL,
    is_external INTEGER NOT NULL,
    response_status INTEGER NOT NULL,
    is_valid INTEGER NOT NULL,
    extracted_data TEXT,
    check_time TEXT NOT NULL,
    check_duration_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_result_task ON link_check_result(task_id);
CREATE INDEX IF NOT EXISTS idx_result_url ON link_check_result(url);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
