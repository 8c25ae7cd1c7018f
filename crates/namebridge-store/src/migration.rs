//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_secs()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Name entries, one per resource
        CREATE TABLE entries (
            resource BLOB PRIMARY KEY,        -- 32 bytes, label hash with version bytes cleared
            label TEXT NOT NULL,              -- normalized label
            token_version INTEGER NOT NULL,
            owner BLOB NOT NULL,              -- 20 bytes
            expiry INTEGER NOT NULL,
            record BLOB NOT NULL              -- CBOR-encoded Entry
        );

        -- Role grants per (resource, account)
        CREATE TABLE roles (
            resource BLOB NOT NULL,
            account BLOB NOT NULL,
            bitmap INTEGER NOT NULL,
            PRIMARY KEY (resource, account)
        );

        -- Holder counters per resource
        CREATE TABLE role_counts (
            resource BLOB PRIMARY KEY,
            counts BLOB NOT NULL              -- CBOR-encoded RoleCounts
        );

        -- Operator approvals
        CREATE TABLE operators (
            owner BLOB NOT NULL,
            operator BLOB NOT NULL,
            PRIMARY KEY (owner, operator)
        );

        -- Append-only event log
        CREATE TABLE events (
            log_index INTEGER PRIMARY KEY,    -- 0-based position in the log
            token_id BLOB,                    -- 32 bytes, nullable for role/approval events
            record BLOB NOT NULL              -- CBOR-encoded Event
        );

        CREATE INDEX idx_entries_owner ON entries(owner);
        CREATE INDEX idx_entries_expiry ON entries(expiry);
        CREATE INDEX idx_events_token ON events(token_id);
        "#,
    )?;

    Ok(())
}

/// Migration v2: per-resource ejection counters for the bridge.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE bridge_sequences (
            resource BLOB PRIMARY KEY,
            seq INTEGER NOT NULL              -- ejections sent for this resource
        );
        "#,
    )?;

    Ok(())
}

/// Get current time in seconds.
fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
