//! Database module for Darshan.
//!
//! Provides SQLite connection management and migrations.
//! The database is stored at `~/.darshan/darshan.db` unless configured otherwise.

pub mod kv_store;
pub mod migrations;
pub mod schema;

use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::database::migrations::run_migrations;

pub use kv_store::{get_value, put_value};

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Failed to create database directory: {0}")]
    DirectoryCreation(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Returns the default path to the database file (~/.darshan/darshan.db).
pub fn get_database_path() -> PathBuf {
    crate::config::get_data_dir().join("darshan.db")
}

/// Opens (creating if needed) the database at `path` and runs migrations.
pub fn open(path: &Path) -> Result<Connection, DatabaseError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
            tracing::info!("Created database directory at {:?}", dir);
        }
    }

    tracing::info!("Database path: {:?}", path);

    let mut conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    run_migrations(&mut conn)?;

    Ok(conn)
}

/// Opens a migrated in-memory database.
pub fn open_in_memory() -> Result<Connection, DatabaseError> {
    let mut conn = Connection::open_in_memory()?;
    run_migrations(&mut conn)?;
    Ok(conn)
}
