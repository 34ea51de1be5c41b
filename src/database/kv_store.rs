//! Key-value access to the `kv_store` table.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::database::DatabaseError;

/// Reads the value stored under `key`, if any.
pub fn get_value(conn: &Connection, key: &str) -> Result<Option<String>, DatabaseError> {
    let value = conn
        .query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Inserts or replaces the value stored under `key`.
pub fn put_value(conn: &Connection, key: &str, value: &str) -> Result<(), DatabaseError> {
    conn.execute(
        r#"
        INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        (key, value, Utc::now().to_rfc3339()),
    )?;
    Ok(())
}
