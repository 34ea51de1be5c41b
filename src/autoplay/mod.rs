//! Autoplay sequencer
//!
//! Hands-free traversal: every verse is narrated in three phases
//! (recitation, meaning, insight) before moving on, and every other slide
//! waits out the slide timer. The sequencer only decides what should happen
//! next; the app controller carries it out and reports completions back.

pub mod timer;

pub use timer::{SlideTimer, TimerFired};

use crate::audio::Ticket;
use crate::narration::NarrationPhase;
use crate::navigation::View;
use serde::Serialize;

/// What the controller should do for autoplay right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayAction {
    /// Speak this phase of the current verse, with completion notification
    Narrate(NarrationPhase),
    /// Start the slide timer
    ArmSlideTimer,
}

/// Result of a narration completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Narrate the next phase of the same verse
    NextPhase(NarrationPhase),
    /// All three phases done; advance to the next slide
    AdvanceVerse,
    /// Not the request autoplay is waiting on
    Ignored,
}

/// Autoplay state exposed in snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct AutoplayStatus {
    pub enabled: bool,
    pub phase: NarrationPhase,
    pub busy: bool,
}

#[derive(Debug, Default)]
pub struct Autoplay {
    enabled: bool,
    phase: NarrationPhase,
    /// Ticket of the outstanding narration; `Some` means busy
    in_flight: Option<Ticket>,
}

impl Autoplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn phase(&self) -> NarrationPhase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn status(&self) -> AutoplayStatus {
        AutoplayStatus {
            enabled: self.enabled,
            phase: self.phase,
            busy: self.is_busy(),
        }
    }

    pub fn enable(&mut self) {
        if !self.enabled {
            tracing::info!("Autoplay enabled");
        }
        self.enabled = true;
    }

    /// Turn autoplay off and forget progress on the current verse
    pub fn disable(&mut self) {
        if self.enabled {
            tracing::info!("Autoplay disabled");
        }
        self.enabled = false;
        self.reset_progress();
    }

    /// Back to the first phase, nothing in flight (every navigation)
    pub fn reset_progress(&mut self) {
        self.phase = NarrationPhase::Recitation;
        self.in_flight = None;
    }

    /// Decide the next step for the current view
    ///
    /// Nothing happens while disabled, while a narration is outstanding, or
    /// (on verses) while another utterance still holds the audio channel.
    pub fn next_action(
        &self,
        view: View,
        audio_idle: bool,
        timer_armed: bool,
    ) -> Option<AutoplayAction> {
        if !self.enabled || self.is_busy() {
            return None;
        }

        match view {
            View::VerseDetail if audio_idle => Some(AutoplayAction::Narrate(self.phase)),
            View::VerseDetail => None,
            View::Title | View::Overview | View::Conclusion if !timer_armed => {
                Some(AutoplayAction::ArmSlideTimer)
            }
            _ => None,
        }
    }

    /// Record the narration request issued for the current phase
    pub fn mark_in_flight(&mut self, ticket: Ticket) {
        tracing::debug!(
            "Autoplay narrating {} (ticket {})",
            self.phase,
            ticket
        );
        self.in_flight = Some(ticket);
    }

    /// Handle a narration completion
    pub fn on_phase_complete(&mut self, ticket: Ticket) -> PhaseOutcome {
        if !self.enabled || self.in_flight != Some(ticket) {
            return PhaseOutcome::Ignored;
        }

        self.in_flight = None;
        match self.phase.next() {
            Some(next) => {
                self.phase = next;
                PhaseOutcome::NextPhase(next)
            }
            None => PhaseOutcome::AdvanceVerse,
        }
    }
}
