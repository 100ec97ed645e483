//! Database schema for the results store

use rusqlite::Connection;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per finished job
CREATE TABLE IF NOT EXISTS job_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_name TEXT NOT NULL,
    label TEXT NOT NULL,
    total INTEGER,
    error_message TEXT,
    error_origin TEXT,
    reported_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_job_results_name ON job_results(job_name);
CREATE INDEX IF NOT EXISTS idx_job_results_reported ON job_results(reported_at);
"#;

/// Creates all tables if they don't exist yet
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
