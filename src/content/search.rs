//! Verse search used by the search overlay

use super::ContentStore;
use serde::Serialize;

/// Maximum number of hits returned for a query
pub const MAX_SEARCH_RESULTS: usize = 50;

/// A verse matching a search query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub chapter_index: usize,
    pub verse_index: usize,
    pub verse_id: String,
    pub chapter_name: String,
}

/// Search verses by id, meaning, lesson and transliteration
///
/// The verse id is matched verbatim (so "2.4" finds "2.47"); the text fields
/// are matched case-insensitively. Results follow chapter then verse order.
pub fn search(store: &ContentStore, query: &str) -> Vec<SearchHit> {
    if query.trim().is_empty() {
        return Vec::new();
    }

    let needle = query.to_lowercase();

    store
        .chapters()
        .iter()
        .enumerate()
        .flat_map(|(ch_idx, chapter)| {
            chapter
                .verses
                .iter()
                .enumerate()
                .map(move |(v_idx, verse)| (ch_idx, v_idx, chapter, verse))
        })
        .filter(|(_, _, _, verse)| {
            verse.verse.contains(query)
                || verse.meaning.to_lowercase().contains(&needle)
                || verse.lesson.to_lowercase().contains(&needle)
                || verse.transliteration.to_lowercase().contains(&needle)
        })
        .take(MAX_SEARCH_RESULTS)
        .map(|(chapter_index, verse_index, chapter, verse)| SearchHit {
            chapter_index,
            verse_index,
            verse_id: verse.verse.clone(),
            chapter_name: chapter.name.clone(),
        })
        .collect()
}
