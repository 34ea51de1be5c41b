//! Narration prompt templates, voices and request keys

use crate::config::VoiceConfig;
use crate::content::{Chapter, Verse};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opening slide heading
pub const MAIN_HEADING: &str = "THE ETERNAL SONG";
/// Opening slide tagline
pub const MAIN_DESCRIPTION: &str =
    "\"The Divine discourse on duty, spiritual realization, and the nature of the Supreme.\"";
/// Closing slide heading
pub const CONCLUSION_HEADING: &str = "HARI AUM";
/// Closing slide text
pub const CONCLUSION_TEXT: &str =
    "\"The wisdom of the Lord is eternal. May your soul remain anchored in the Truth.\"";

/// One of the three narrations given to every verse, in playback order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NarrationPhase {
    /// Source-language recitation
    #[default]
    Recitation,
    /// Translated meaning
    Meaning,
    /// Practical lesson
    Insight,
}

impl NarrationPhase {
    pub const ALL: [NarrationPhase; 3] = [
        NarrationPhase::Recitation,
        NarrationPhase::Meaning,
        NarrationPhase::Insight,
    ];

    /// 0, 1 or 2
    pub fn index(self) -> u8 {
        match self {
            NarrationPhase::Recitation => 0,
            NarrationPhase::Meaning => 1,
            NarrationPhase::Insight => 2,
        }
    }

    /// The following phase, or None after Insight
    pub fn next(self) -> Option<NarrationPhase> {
        match self {
            NarrationPhase::Recitation => Some(NarrationPhase::Meaning),
            NarrationPhase::Meaning => Some(NarrationPhase::Insight),
            NarrationPhase::Insight => None,
        }
    }

    /// Name used in request keys and shell commands
    pub fn field(self) -> &'static str {
        match self {
            NarrationPhase::Recitation => "sanskrit",
            NarrationPhase::Meaning => "meaning",
            NarrationPhase::Insight => "lesson",
        }
    }

    /// Parse a shell argument ("sanskrit", "meaning", "lesson" or 0-2)
    pub fn parse(s: &str) -> Option<NarrationPhase> {
        match s.trim().to_lowercase().as_str() {
            "sanskrit" | "recitation" | "0" => Some(NarrationPhase::Recitation),
            "meaning" | "1" => Some(NarrationPhase::Meaning),
            "lesson" | "insight" | "2" => Some(NarrationPhase::Insight),
            _ => None,
        }
    }

    /// Verse text narrated in this phase
    pub fn text(self, verse: &Verse) -> &str {
        match self {
            NarrationPhase::Recitation => &verse.sanskrit,
            NarrationPhase::Meaning => &verse.meaning,
            NarrationPhase::Insight => &verse.lesson,
        }
    }

    pub fn voice(self, voices: &VoiceConfig) -> String {
        match self {
            NarrationPhase::Recitation => voices.sanskrit.clone(),
            NarrationPhase::Meaning => voices.meaning.clone(),
            NarrationPhase::Insight => voices.lesson.clone(),
        }
    }

    /// Full prompt for this phase of a verse
    pub fn prompt(self, verse: &Verse) -> String {
        let text = self.text(verse);
        match self {
            NarrationPhase::Recitation => format!(
                "Recite this sacred Sanskrit verse from the Bhagavad Gita with divine resonance, \
                 clarity, and precise traditional pronunciation. Slow enough for meditation: {}",
                text
            ),
            NarrationPhase::Meaning => format!(
                "Read this English meaning of a Bhagavad Gita verse in a serene, wise, and deeply \
                 devotional voice. Emphasize the profound spiritual truth: {}",
                text
            ),
            NarrationPhase::Insight => format!(
                "Read this practical spiritual life lesson with a wise, encouraging, and deeply \
                 calm tone. Connect the ancient wisdom to modern life: {}",
                text
            ),
        }
    }
}

impl fmt::Display for NarrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// Prompt for free-standing slide text
pub fn general_prompt(text: &str) -> String {
    format!(
        "Read this text in a serene, wise, and deeply calm devotional tone: {}",
        text
    )
}

/// Prompt introducing a chapter on its overview slide
pub fn overview_prompt(chapter: &Chapter) -> String {
    format!(
        "Narrate the introduction to this chapter named {}, which means {}. Summary: {}",
        chapter.name, chapter.meaning, chapter.summary
    )
}

pub fn title_prompt() -> String {
    general_prompt(&format!("{}. {}", MAIN_HEADING, MAIN_DESCRIPTION))
}

pub fn conclusion_prompt() -> String {
    general_prompt(&format!("{}. {}", CONCLUSION_HEADING, CONCLUSION_TEXT))
}

/// Identity of one utterance; equal keys toggle each other off
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn verse(verse_id: &str, phase: NarrationPhase) -> Self {
        Self(format!("speech_{}_{}", verse_id, phase.field()))
    }

    pub fn title() -> Self {
        Self("speech_title_speech".to_string())
    }

    pub fn overview(chapter_id: u32) -> Self {
        Self(format!("speech_chapter_{}_overview", chapter_id))
    }

    pub fn conclusion() -> Self {
        Self("speech_conclusion_speech".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
