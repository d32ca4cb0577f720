//! Database migrations for fitqueue.
//!
//! Each migration is a function that upgrades the schema by one version.
//! Migrations are run automatically when the database is opened.

use rusqlite::Connection;

use crate::error::QueueError;

/// Current schema version.
const CURRENT_VERSION: i32 = 2;

/// Get the current schema version from the database.
///
/// Returns 0 if no version has been set (new database).
pub fn get_version(conn: &Connection) -> Result<i32, QueueError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| QueueError::Database(format!("Failed to get schema version: {e}")))
}

fn set_version(conn: &Connection, version: i32) -> Result<(), QueueError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| QueueError::Database(format!("Failed to set schema version: {e}")))
}

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<(), QueueError> {
    let current = get_version(conn)?;

    if current > CURRENT_VERSION {
        return Err(QueueError::Database(format!(
            "Database schema version {current} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    for version in (current + 1)..=CURRENT_VERSION {
        run_migration(conn, version)?;
        set_version(conn, version)?;
    }

    Ok(())
}

fn run_migration(conn: &Connection, version: i32) -> Result<(), QueueError> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(QueueError::Database(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: request queue.
///
/// `AUTOINCREMENT` keeps ids from ever being reused, even after the queue is
/// cleared, because the id doubles as the idempotency key. `enqueued_at` is
/// stored as unix milliseconds.
fn migrate_v1(conn: &Connection) -> Result<(), QueueError> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS request_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            method TEXT NOT NULL,
            url TEXT NOT NULL,
            payload TEXT,
            headers TEXT NOT NULL DEFAULT '{}',
            enqueued_at INTEGER NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL,
            last_attempt TEXT,
            last_error TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_request_queue_enqueued
        ON request_queue(enqueued_at, id);
        ",
    )
    .map_err(|e| QueueError::Database(format!("Migration v1 failed: {e}")))
}

/// Migration v2: flush lease.
///
/// A single row names the flusher currently allowed to replay the queue, so
/// separate processes sharing the database never flush at the same time.
fn migrate_v2(conn: &Connection) -> Result<(), QueueError> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS flush_lease (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            owner TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        );
        ",
    )
    .map_err(|e| QueueError::Database(format!("Migration v2 failed: {e}")))
}
