//! Database schema definitions for Darshan.
//!
//! Contains SQL statements for creating and managing database tables.

/// SQL statement to create the migrations tracking table.
pub const CREATE_MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// SQL statement to create the key-value table used for small persisted state
/// such as the favorites list.
pub const CREATE_KV_STORE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
