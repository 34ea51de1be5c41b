//! Favorite verses
//!
//! The favorites list is loaded once at startup and written back through a
//! `Persistence` implementation after every change.

use crate::database::{self, DatabaseError};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::collections::BTreeSet;

/// Storage key for the favorites list
pub const FAVORITES_KEY: &str = "gita_favorites";

/// Load/save of the favorites list
pub trait Persistence: Send {
    fn load(&self) -> Result<Vec<String>, PersistenceError>;
    fn save(&self, verse_ids: &[String]) -> Result<(), PersistenceError>;
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Stored favorites are not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// Favorites stored as a JSON array in the `kv_store` table
pub struct SqlitePersistence {
    conn: Mutex<Connection>,
}

impl SqlitePersistence {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl Persistence for SqlitePersistence {
    fn load(&self) -> Result<Vec<String>, PersistenceError> {
        let conn = self.conn.lock();
        match database::get_value(&conn, FAVORITES_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, verse_ids: &[String]) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(verse_ids)?;
        let conn = self.conn.lock();
        database::put_value(&conn, FAVORITES_KEY, &json)?;
        Ok(())
    }
}

/// In-memory persistence, used when the database is unavailable and in tests
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    stored: Mutex<Vec<String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<String>) -> Self {
        Self {
            stored: Mutex::new(entries),
        }
    }

    /// What was last saved
    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().clone()
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.stored.lock().clone())
    }

    fn save(&self, verse_ids: &[String]) -> Result<(), PersistenceError> {
        *self.stored.lock() = verse_ids.to_vec();
        Ok(())
    }
}

/// Favorites manager
pub struct Favorites {
    ids: BTreeSet<String>,
    store: Box<dyn Persistence>,
}

impl Favorites {
    /// Load favorites; an unreadable store starts empty
    pub fn load(store: Box<dyn Persistence>) -> Self {
        let ids = match store.load() {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                tracing::warn!("Failed to load favorites, starting empty: {}", e);
                BTreeSet::new()
            }
        };
        tracing::info!("Loaded {} favorites", ids.len());
        Self { ids, store }
    }

    pub fn contains(&self, verse_id: &str) -> bool {
        self.ids.contains(verse_id)
    }

    /// Add or remove a verse; returns whether it is now a favorite
    pub fn toggle(&mut self, verse_id: &str) -> bool {
        let added = if self.ids.remove(verse_id) {
            false
        } else {
            self.ids.insert(verse_id.to_string());
            true
        };
        self.persist();
        added
    }

    /// Favorite verse ids in sorted order
    pub fn list(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.list()) {
            tracing::warn!("Failed to save favorites: {}", e);
        }
    }
}
