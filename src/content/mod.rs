//! Scripture content store
//!
//! Holds the ordered chapters and verses walked by the navigator. The store is
//! loaded once at startup (from the bundled dataset or a configured file),
//! validated, and never mutated afterwards.

pub mod search;

pub use search::{search, SearchHit, MAX_SEARCH_RESULTS};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Dataset compiled into the binary, used when no content path is configured
const BUNDLED_DATASET: &str = include_str!("../../data/gita.json");

/// A single verse (sloka)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    /// Stable identifier, e.g. "2.47"
    pub verse: String,
    /// Source-language text
    pub sanskrit: String,
    /// Romanised form
    pub transliteration: String,
    /// Translated meaning
    pub meaning: String,
    /// Practical lesson drawn from the verse
    pub lesson: String,
}

/// A chapter with its introductory metadata and ordered verses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter ordinal as printed (1-based)
    pub id: u32,
    /// Display name
    pub name: String,
    /// Short gloss of the name
    pub meaning: String,
    /// Summary narrated on the overview slide
    pub summary: String,
    #[serde(default)]
    pub themes: Vec<String>,
    /// Verse id highlighted on the overview slide
    #[serde(default)]
    pub featured_verse: String,
    #[serde(rename = "slokas", alias = "verses")]
    pub verses: Vec<Verse>,
}

impl Chapter {
    /// Index of the last verse in this chapter
    pub fn last_verse_index(&self) -> usize {
        self.verses.len().saturating_sub(1)
    }
}

/// Content loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Failed to read content file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse content: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Content contains no chapters")]
    Empty,

    #[error("Chapter {0} contains no verses")]
    EmptyChapter(u32),

    #[error("Verse id '{0}' appears more than once")]
    DuplicateVerse(String),
}

/// Read-only store of chapters
#[derive(Debug, Clone)]
pub struct ContentStore {
    chapters: Vec<Chapter>,
}

impl ContentStore {
    /// Build a store from chapters, rejecting data the navigator cannot walk
    pub fn new(chapters: Vec<Chapter>) -> Result<Self, ContentError> {
        if chapters.is_empty() {
            return Err(ContentError::Empty);
        }

        let mut seen = HashSet::new();
        for chapter in &chapters {
            if chapter.verses.is_empty() {
                return Err(ContentError::EmptyChapter(chapter.id));
            }
            for verse in &chapter.verses {
                if !seen.insert(verse.verse.as_str()) {
                    return Err(ContentError::DuplicateVerse(verse.verse.clone()));
                }
            }
        }

        Ok(Self { chapters })
    }

    /// Parse a JSON array of chapters
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let chapters: Vec<Chapter> = serde_json::from_str(json)?;
        Self::new(chapters)
    }

    /// Load a JSON dataset from disk
    pub fn load(path: &Path) -> Result<Self, ContentError> {
        let contents = std::fs::read_to_string(path)?;
        let store = Self::from_json(&contents)?;
        tracing::info!(
            "Loaded {} chapters from {}",
            store.chapter_count(),
            path.display()
        );
        Ok(store)
    }

    /// Load the dataset compiled into the binary
    pub fn bundled() -> Result<Self, ContentError> {
        Self::from_json(BUNDLED_DATASET)
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn chapter(&self, index: usize) -> Option<&Chapter> {
        self.chapters.get(index)
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Number of verses in a chapter (0 if the chapter does not exist)
    pub fn verse_count(&self, chapter: usize) -> usize {
        self.chapter(chapter).map(|c| c.verses.len()).unwrap_or(0)
    }

    pub fn verse(&self, chapter: usize, verse: usize) -> Option<&Verse> {
        self.chapter(chapter).and_then(|c| c.verses.get(verse))
    }

    pub fn last_chapter_index(&self) -> usize {
        self.chapters.len() - 1
    }

    /// Find the (chapter, verse) indices of a verse id
    pub fn locate(&self, verse_id: &str) -> Option<(usize, usize)> {
        self.chapters.iter().enumerate().find_map(|(ch_idx, ch)| {
            ch.verses
                .iter()
                .position(|v| v.verse == verse_id)
                .map(|v_idx| (ch_idx, v_idx))
        })
    }
}

/// Build a synthetic store with the given verse counts per chapter (test helper)
#[cfg(test)]
pub(crate) fn sample_store(verse_counts: &[usize]) -> ContentStore {
    let chapters = verse_counts
        .iter()
        .enumerate()
        .map(|(ch_idx, &count)| {
            let id = ch_idx as u32 + 1;
            Chapter {
                id,
                name: format!("Chapter {}", id),
                meaning: format!("Meaning {}", id),
                summary: format!("Summary of chapter {}", id),
                themes: vec!["theme".to_string()],
                featured_verse: format!("{}.1", id),
                verses: (1..=count)
                    .map(|n| Verse {
                        verse: format!("{}.{}", id, n),
                        sanskrit: format!("sanskrit {}.{}", id, n),
                        transliteration: format!("translit {}.{}", id, n),
                        meaning: format!("meaning {}.{}", id, n),
                        lesson: format!("lesson {}.{}", id, n),
                    })
                    .collect(),
            }
        })
        .collect();

    ContentStore::new(chapters).expect("sample store must be valid")
}
