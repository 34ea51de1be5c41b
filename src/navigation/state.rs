//! Navigation state machine
//!
//! Defines the slide positions and the transitions between them. Positions are
//! a tagged enum so a verse index only exists while a verse is on screen.

use crate::content::ContentStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The kind of slide being shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// Opening slide
    #[default]
    Title,
    /// Chapter introduction
    Overview,
    /// A single verse
    VerseDetail,
    /// Closing slide after the last verse
    Conclusion,
}

impl View {
    /// Returns a human-readable description of the view
    pub fn description(&self) -> &'static str {
        match self {
            View::Title => "Title",
            View::Overview => "Chapter overview",
            View::VerseDetail => "Verse",
            View::Conclusion => "Conclusion",
        }
    }
}

/// Current position in the chapter/verse hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Position {
    #[default]
    Title,
    Overview {
        chapter: usize,
    },
    Verse {
        chapter: usize,
        verse: usize,
    },
    Conclusion,
}

impl Position {
    pub fn view(&self) -> View {
        match self {
            Position::Title => View::Title,
            Position::Overview { .. } => View::Overview,
            Position::Verse { .. } => View::VerseDetail,
            Position::Conclusion => View::Conclusion,
        }
    }

    /// Verse index, present only while a verse is shown
    pub fn verse_index(&self) -> Option<usize> {
        match self {
            Position::Verse { verse, .. } => Some(*verse),
            _ => None,
        }
    }

    /// Verse index with the `-1` sentinel used outside verse slides
    pub fn verse_ordinal(&self) -> i64 {
        self.verse_index().map(|v| v as i64).unwrap_or(-1)
    }
}

/// Events that drive navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationEvent {
    /// Move forward one slide
    Advance,
    /// Move back one slide
    Retreat,
    /// Direct selection from the chapter grid or a search result
    JumpTo {
        chapter: usize,
        verse: Option<usize>,
    },
    /// Back to the opening slide
    ReturnToTitle,
}

/// Why a transition happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    NextVerse,
    NextChapter,
    EnterChapter,
    Begin,
    Finished,
    Restart,
    PreviousVerse,
    PreviousChapter,
    ChapterIntro,
    BackToTitle,
    ReviewLastVerse,
    AlreadyAtStart,
    Selection,
}

/// Result of a navigation transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionResult {
    pub previous: Position,
    pub position: Position,
    pub reason: TransitionReason,
}

impl TransitionResult {
    /// Whether the position actually changed
    pub fn moved(&self) -> bool {
        self.previous != self.position
    }
}

/// Navigation errors (only reachable through unvalidated jump targets)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("Chapter index {index} out of range (chapters: {count})")]
    ChapterOutOfRange { index: usize, count: usize },

    #[error("Verse index {index} out of range for chapter {chapter} (verses: {count})")]
    VerseOutOfRange {
        chapter: usize,
        index: usize,
        count: usize,
    },
}

/// Navigation state machine over a content store
pub struct Navigator {
    content: Arc<ContentStore>,
    position: Position,
}

impl Navigator {
    /// Creates a navigator on the title slide
    pub fn new(content: Arc<ContentStore>) -> Self {
        Self {
            content,
            position: Position::Title,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn view(&self) -> View {
        self.position.view()
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    /// Chapter index; the title reports the first chapter and the
    /// conclusion reports the last
    pub fn chapter_index(&self) -> usize {
        match self.position {
            Position::Title => 0,
            Position::Overview { chapter } | Position::Verse { chapter, .. } => chapter,
            Position::Conclusion => self.content.last_chapter_index(),
        }
    }

    pub fn verse_index(&self) -> Option<usize> {
        self.position.verse_index()
    }

    /// Process an event and apply the resulting transition
    pub fn process_event(
        &mut self,
        event: NavigationEvent,
    ) -> Result<TransitionResult, NavigationError> {
        let result = self.plan(event)?;
        self.apply(result);
        Ok(result)
    }

    /// Commit a transition computed by `plan`
    pub fn apply(&mut self, result: TransitionResult) {
        debug_assert_eq!(result.previous, self.position);
        self.position = result.position;

        if result.moved() {
            tracing::info!(
                "Navigation transition: {:?} -> {:?} (reason: {:?})",
                result.previous,
                result.position,
                result.reason
            );
        }
    }

    pub fn advance(&mut self) -> TransitionResult {
        self.step(NavigationEvent::Advance)
    }

    pub fn retreat(&mut self) -> TransitionResult {
        self.step(NavigationEvent::Retreat)
    }

    pub fn jump_to(
        &mut self,
        chapter: usize,
        verse: Option<usize>,
    ) -> Result<TransitionResult, NavigationError> {
        self.process_event(NavigationEvent::JumpTo { chapter, verse })
    }

    pub fn return_to_title(&mut self) -> TransitionResult {
        self.step(NavigationEvent::ReturnToTitle)
    }

    /// Apply an event that cannot fail (everything except `JumpTo`)
    fn step(&mut self, event: NavigationEvent) -> TransitionResult {
        debug_assert!(!matches!(event, NavigationEvent::JumpTo { .. }));
        let unchanged = TransitionResult {
            previous: self.position,
            position: self.position,
            reason: TransitionReason::AlreadyAtStart,
        };
        self.process_event(event).unwrap_or(unchanged)
    }

    /// Compute the transition for an event without applying it
    pub fn plan(&self, event: NavigationEvent) -> Result<TransitionResult, NavigationError> {
        let content = &self.content;
        let last_chapter = content.last_chapter_index();

        let (position, reason) = match (self.position, event) {
            // Forward
            (Position::Title, NavigationEvent::Advance) => {
                (Position::Overview { chapter: 0 }, TransitionReason::Begin)
            }
            (Position::Overview { chapter }, NavigationEvent::Advance) => (
                Position::Verse { chapter, verse: 0 },
                TransitionReason::EnterChapter,
            ),
            (Position::Verse { chapter, verse }, NavigationEvent::Advance) => {
                if verse + 1 < content.verse_count(chapter) {
                    (
                        Position::Verse {
                            chapter,
                            verse: verse + 1,
                        },
                        TransitionReason::NextVerse,
                    )
                } else if chapter < last_chapter {
                    (
                        Position::Overview {
                            chapter: chapter + 1,
                        },
                        TransitionReason::NextChapter,
                    )
                } else {
                    (Position::Conclusion, TransitionReason::Finished)
                }
            }
            (Position::Conclusion, NavigationEvent::Advance) => {
                (Position::Title, TransitionReason::Restart)
            }

            // Backward
            (Position::Title, NavigationEvent::Retreat) => {
                (Position::Title, TransitionReason::AlreadyAtStart)
            }
            (Position::Overview { chapter }, NavigationEvent::Retreat) => {
                if chapter > 0 {
                    let previous = chapter - 1;
                    (
                        Position::Verse {
                            chapter: previous,
                            verse: content.verse_count(previous).saturating_sub(1),
                        },
                        TransitionReason::PreviousChapter,
                    )
                } else {
                    (Position::Title, TransitionReason::BackToTitle)
                }
            }
            (Position::Verse { chapter, verse }, NavigationEvent::Retreat) => {
                if verse > 0 {
                    (
                        Position::Verse {
                            chapter,
                            verse: verse - 1,
                        },
                        TransitionReason::PreviousVerse,
                    )
                } else {
                    (
                        Position::Overview { chapter },
                        TransitionReason::ChapterIntro,
                    )
                }
            }
            (Position::Conclusion, NavigationEvent::Retreat) => (
                Position::Verse {
                    chapter: last_chapter,
                    verse: content.verse_count(last_chapter).saturating_sub(1),
                },
                TransitionReason::ReviewLastVerse,
            ),

            // Direct selection
            (_, NavigationEvent::JumpTo { chapter, verse }) => {
                let count = content.chapter_count();
                if chapter >= count {
                    return Err(NavigationError::ChapterOutOfRange {
                        index: chapter,
                        count,
                    });
                }
                let position = match verse {
                    Some(verse) => {
                        let verses = content.verse_count(chapter);
                        if verse >= verses {
                            return Err(NavigationError::VerseOutOfRange {
                                chapter,
                                index: verse,
                                count: verses,
                            });
                        }
                        Position::Verse { chapter, verse }
                    }
                    None => Position::Overview { chapter },
                };
                (position, TransitionReason::Selection)
            }

            (_, NavigationEvent::ReturnToTitle) => (Position::Title, TransitionReason::BackToTitle),
        };

        Ok(TransitionResult {
            previous: self.position,
            position,
            reason,
        })
    }
}
