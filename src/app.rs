//! Application controller
//!
//! The single event loop of the reader. It owns the navigator, the audio
//! channel, the autoplay sequencer, the slide timer, favorites and the overlay
//! flags. User commands, audio channel events and timer firings are handled
//! one at a time; after each one autoplay gets a chance to react and a fresh
//! `Snapshot` is published for the presentation layer.

use crate::audio::{
    AudioChannel, AudioOutput, ChannelEvent, ChannelSettings, SpeakOutcome, SpeechRequest,
};
use crate::autoplay::{
    Autoplay, AutoplayAction, AutoplayStatus, PhaseOutcome, SlideTimer, TimerFired,
};
use crate::config::{Config, VoiceConfig};
use crate::content::{self, ContentStore, SearchHit};
use crate::favorites::Favorites;
use crate::narration::prompts::{conclusion_prompt, overview_prompt, title_prompt};
use crate::narration::{NarrationPhase, NarrationProvider, RequestKey};
use crate::navigation::{NavigationEvent, Navigator, Position, TransitionReason, View};
use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// What a Listen control should narrate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenTarget {
    /// One phase of the verse on screen (the featured verse on an overview)
    Phase(NarrationPhase),
    /// The slide's own text: title, chapter overview or conclusion
    Slide,
}

/// User controls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Advance,
    Retreat,
    JumpTo { chapter: usize, verse: Option<usize> },
    ReturnToTitle,
    ToggleAutoplay,
    Listen(ListenTarget),
    StopAudio,
    ToggleFavorite,
    OpenGrid,
    OpenSearch,
    CloseOverlays,
    Search(String),
    ToggleFocus,
    Shutdown,
}

/// Presentation state published after every handled message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub view: View,
    pub position: Position,
    pub chapter_index: usize,
    pub verse_ordinal: i64,
    pub chapter_count: usize,
    pub verse_count: usize,
    pub chapter_name: String,
    pub verse_id: Option<String>,
    pub autoplay: AutoplayStatus,
    pub active_key: Option<RequestKey>,
    pub audio_loading: bool,
    pub grid_open: bool,
    pub search_open: bool,
    pub focus_mode: bool,
    pub search_query: String,
    pub search_results: Vec<SearchHit>,
    pub is_favorite: bool,
    pub favorite_count: usize,
}

impl Snapshot {
    /// Footer progress text: `"3 / 47"` on a verse, `INTRO` elsewhere
    pub fn progress_label(&self) -> String {
        if self.verse_ordinal >= 0 {
            format!("{} / {}", self.verse_ordinal + 1, self.verse_count)
        } else {
            "INTRO".to_string()
        }
    }
}

/// Messages arriving from spawned tasks
#[derive(Debug)]
pub enum Inbound {
    Audio(ChannelEvent),
    Timer(TimerFired),
}

/// Receiving ends of the audio and timer channels
pub struct AppInbox {
    audio: mpsc::UnboundedReceiver<ChannelEvent>,
    timer: mpsc::UnboundedReceiver<TimerFired>,
}

impl AppInbox {
    /// Next message from either source (cancel safe)
    pub async fn recv(&mut self) -> Option<Inbound> {
        tokio::select! {
            Some(event) = self.audio.recv() => Some(Inbound::Audio(event)),
            Some(fired) = self.timer.recv() => Some(Inbound::Timer(fired)),
            else => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Overlays {
    grid: bool,
    search: bool,
    focus: bool,
}

pub struct App {
    navigator: Navigator,
    channel: AudioChannel,
    autoplay: Autoplay,
    timer: SlideTimer,
    favorites: Favorites,
    voices: VoiceConfig,
    overlays: Overlays,
    search_query: String,
    search_results: Vec<SearchHit>,
    snapshots: watch::Sender<Snapshot>,
}

impl App {
    /// Wire up the controller; the inbox must be polled by `run` (or a test)
    pub fn new(
        content: Arc<ContentStore>,
        provider: Arc<dyn NarrationProvider>,
        output: Arc<dyn AudioOutput>,
        favorites: Favorites,
        config: &Config,
    ) -> (Self, AppInbox) {
        let (channel, audio) =
            AudioChannel::new(provider, output, ChannelSettings::from(&config.playback));
        let (timer, timer_rx) =
            SlideTimer::new(Duration::from_millis(config.playback.slide_delay_ms));

        let app = Self {
            navigator: Navigator::new(content),
            channel,
            autoplay: Autoplay::new(),
            timer,
            favorites,
            voices: config.voices.clone(),
            overlays: Overlays::default(),
            search_query: String::new(),
            search_results: Vec::new(),
            snapshots: watch::channel(Snapshot::placeholder()).0,
        };
        app.snapshots.send_replace(app.snapshot());

        let inbox = AppInbox {
            audio,
            timer: timer_rx,
        };
        (app, inbox)
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    pub fn position(&self) -> Position {
        self.navigator.position()
    }

    pub fn autoplay(&self) -> &Autoplay {
        &self.autoplay
    }

    pub fn channel(&self) -> &AudioChannel {
        &self.channel
    }

    /// Event loop; returns after `Shutdown` or when every command sender is gone
    pub async fn run(
        mut self,
        mut inbox: AppInbox,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        tracing::info!("Reader started at {:?}", self.navigator.position());

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        tracing::info!("Command channel closed");
                        break;
                    };
                    if self.handle_command(command).is_break() {
                        break;
                    }
                }
                Some(inbound) = inbox.recv() => self.handle_inbound(inbound),
            }
        }

        self.shutdown();
    }

    /// Apply one user command
    pub fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        tracing::debug!("Command: {:?}", command);

        match command {
            Command::Advance => {
                self.navigate(NavigationEvent::Advance);
            }
            Command::Retreat => {
                self.navigate(NavigationEvent::Retreat);
            }
            Command::ReturnToTitle => {
                self.navigate(NavigationEvent::ReturnToTitle);
            }
            Command::JumpTo { chapter, verse } => {
                if self.navigate(NavigationEvent::JumpTo { chapter, verse }) {
                    self.autoplay.disable();
                    self.overlays.grid = false;
                    self.overlays.search = false;
                }
            }
            Command::ToggleAutoplay => {
                if self.autoplay.is_enabled() {
                    self.stop_autoplay();
                } else {
                    self.autoplay.enable();
                }
            }
            Command::Listen(target) => self.listen(target),
            Command::StopAudio => self.stop_autoplay(),
            Command::ToggleFavorite => self.toggle_favorite(),
            Command::OpenGrid => {
                self.overlays.grid = true;
                self.overlays.search = false;
            }
            Command::OpenSearch => {
                self.overlays.search = true;
                self.overlays.grid = false;
            }
            Command::CloseOverlays => {
                self.overlays.grid = false;
                self.overlays.search = false;
            }
            Command::Search(query) => {
                self.search_results = content::search(self.navigator.content(), &query);
                tracing::debug!("Search {:?}: {} hits", query, self.search_results.len());
                self.search_query = query;
                self.overlays.search = true;
                self.overlays.grid = false;
            }
            Command::ToggleFocus => self.overlays.focus = !self.overlays.focus,
            Command::Shutdown => return ControlFlow::Break(()),
        }

        self.settle();
        ControlFlow::Continue(())
    }

    /// Apply one message from the audio channel or the slide timer
    pub fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Audio(event) => self.handle_audio_event(event),
            Inbound::Timer(fired) => self.handle_timer(fired),
        }
        self.settle();
    }

    fn handle_audio_event(&mut self, event: ChannelEvent) {
        let Some(completion) = self.channel.handle_event(event) else {
            return;
        };

        match self.autoplay.on_phase_complete(completion.ticket) {
            PhaseOutcome::NextPhase(phase) => {
                tracing::debug!("{} complete, next phase {}", completion.key, phase);
            }
            PhaseOutcome::AdvanceVerse => {
                self.navigate(NavigationEvent::Advance);
            }
            PhaseOutcome::Ignored => {}
        }
    }

    fn handle_timer(&mut self, fired: TimerFired) {
        if self.timer.accept(fired) && self.autoplay.is_enabled() {
            self.navigate(NavigationEvent::Advance);
        }
    }

    /// Let autoplay react to the current state, then publish
    fn settle(&mut self) {
        self.react();
        self.snapshots.send_replace(self.snapshot());
    }

    fn react(&mut self) {
        let action = self.autoplay.next_action(
            self.navigator.view(),
            self.channel.is_idle(),
            self.timer.is_armed(),
        );

        match action {
            Some(AutoplayAction::ArmSlideTimer) => self.timer.arm(),
            Some(AutoplayAction::Narrate(phase)) => {
                let Some(request) = self.verse_request(phase, true) else {
                    tracing::warn!("Autoplay has no verse to narrate at {:?}", self.position());
                    return;
                };
                match self.channel.speak(request) {
                    SpeakOutcome::Started(ticket) => self.autoplay.mark_in_flight(ticket),
                    SpeakOutcome::Toggled(key) => {
                        tracing::warn!("Autoplay request {} toggled an active session", key);
                    }
                }
            }
            None => {}
        }
    }

    /// Run a navigation event with its side effects; false if rejected
    fn navigate(&mut self, event: NavigationEvent) -> bool {
        let result = match self.navigator.plan(event) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Ignoring navigation {:?}: {}", event, e);
                return false;
            }
        };

        self.channel.stop();
        self.autoplay.reset_progress();
        self.timer.cancel();
        self.navigator.apply(result);

        if result.moved() && result.reason == TransitionReason::Finished {
            self.autoplay.disable();
        }
        true
    }

    /// Turn autoplay off and silence everything
    fn stop_autoplay(&mut self) {
        self.autoplay.disable();
        self.timer.cancel();
        self.channel.stop();
    }

    fn listen(&mut self, target: ListenTarget) {
        if self.autoplay.is_enabled() {
            tracing::info!("Manual listen takes over from autoplay");
            self.autoplay.disable();
            self.timer.cancel();
        }

        let request = match target {
            ListenTarget::Phase(phase) => self.verse_request(phase, false),
            ListenTarget::Slide => self.slide_request(),
        };

        match request {
            Some(request) => {
                self.channel.speak(request);
            }
            None => tracing::info!(
                "Nothing to narrate for {:?} at {:?}",
                target,
                self.position()
            ),
        }
    }

    /// Narration of one phase of the current verse, or of the featured verse
    /// on an overview slide
    fn verse_request(&self, phase: NarrationPhase, notify: bool) -> Option<SpeechRequest> {
        let content = self.navigator.content();
        let verse = match self.navigator.position() {
            Position::Verse { chapter, verse } => content.verse(chapter, verse)?,
            Position::Overview { chapter } => {
                let chapter = content.chapter(chapter)?;
                chapter
                    .verses
                    .iter()
                    .find(|v| v.verse == chapter.featured_verse)
                    .or_else(|| chapter.verses.first())?
            }
            Position::Title | Position::Conclusion => return None,
        };

        Some(SpeechRequest {
            key: RequestKey::verse(&verse.verse, phase),
            prompt: phase.prompt(verse),
            voice: phase.voice(&self.voices),
            notify,
        })
    }

    fn slide_request(&self) -> Option<SpeechRequest> {
        let (key, prompt) = match self.navigator.position() {
            Position::Title => (RequestKey::title(), title_prompt()),
            Position::Overview { chapter } => {
                let chapter = self.navigator.content().chapter(chapter)?;
                (RequestKey::overview(chapter.id), overview_prompt(chapter))
            }
            Position::Conclusion => (RequestKey::conclusion(), conclusion_prompt()),
            Position::Verse { .. } => return self.verse_request(NarrationPhase::Recitation, false),
        };

        Some(SpeechRequest {
            key,
            prompt,
            voice: self.voices.ui.clone(),
            notify: false,
        })
    }

    fn toggle_favorite(&mut self) {
        let Some(verse_id) = self.current_verse_id() else {
            tracing::debug!("No verse on screen to favorite");
            return;
        };
        let added = self.favorites.toggle(&verse_id);
        tracing::info!(
            "{} {} favorites",
            verse_id,
            if added { "added to" } else { "removed from" }
        );
    }

    fn current_verse_id(&self) -> Option<String> {
        match self.navigator.position() {
            Position::Verse { chapter, verse } => self
                .navigator
                .content()
                .verse(chapter, verse)
                .map(|v| v.verse.clone()),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let position = self.navigator.position();
        let chapter_index = self.navigator.chapter_index();
        let content = self.navigator.content();
        let verse_id = self.current_verse_id();

        Snapshot {
            view: position.view(),
            position,
            chapter_index,
            verse_ordinal: position.verse_ordinal(),
            chapter_count: content.chapter_count(),
            verse_count: content.verse_count(chapter_index),
            chapter_name: content
                .chapter(chapter_index)
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            is_favorite: verse_id
                .as_deref()
                .is_some_and(|id| self.favorites.contains(id)),
            verse_id,
            autoplay: self.autoplay.status(),
            active_key: self.channel.active_key().cloned(),
            audio_loading: self.channel.is_loading(),
            grid_open: self.overlays.grid,
            search_open: self.overlays.search,
            focus_mode: self.overlays.focus,
            search_query: self.search_query.clone(),
            search_results: self.search_results.clone(),
            favorite_count: self.favorites.len(),
        }
    }

    fn shutdown(&mut self) {
        self.timer.cancel();
        self.channel.stop();
        tracing::info!("Reader stopped");
    }
}

impl Snapshot {
    fn placeholder() -> Self {
        Self {
            view: View::Title,
            position: Position::Title,
            chapter_index: 0,
            verse_ordinal: -1,
            chapter_count: 0,
            verse_count: 0,
            chapter_name: String::new(),
            verse_id: None,
            autoplay: AutoplayStatus::default(),
            active_key: None,
            audio_loading: false,
            grid_open: false,
            search_open: false,
            focus_mode: false,
            search_query: String::new(),
            search_results: Vec::new(),
            is_favorite: false,
            favorite_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SimulatedOutput;
    use crate::content::sample_store;
    use crate::favorites::MemoryPersistence;
    use crate::narration::testing::ScriptedProvider;
    use tokio::time::Instant;

    fn app_with(provider: ScriptedProvider, verse_counts: &[usize]) -> (App, AppInbox) {
        let provider = Arc::new(provider);
        App::new(
            Arc::new(sample_store(verse_counts)),
            provider,
            Arc::new(SimulatedOutput::new()),
            Favorites::load(Box::new(MemoryPersistence::new())),
            &Config::default(),
        )
    }

    async fn pump(app: &mut App, inbox: &mut AppInbox) {
        let inbound = inbox.recv().await.unwrap();
        app.handle_inbound(inbound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autoplay_walks_three_phases_then_advances() {
        let (mut app, mut inbox) = app_with(ScriptedProvider::silent(), &[3]);
        let _ = app.handle_command(Command::JumpTo {
            chapter: 0,
            verse: Some(0),
        });
        let _ = app.handle_command(Command::ToggleAutoplay);

        assert!(app.autoplay().is_busy());
        assert_eq!(app.autoplay().phase(), NarrationPhase::Recitation);

        pump(&mut app, &mut inbox).await;
        assert_eq!(app.autoplay().phase(), NarrationPhase::Meaning);
        pump(&mut app, &mut inbox).await;
        assert_eq!(app.autoplay().phase(), NarrationPhase::Insight);
        pump(&mut app, &mut inbox).await;

        assert_eq!(app.position(), Position::Verse { chapter: 0, verse: 1 });
        assert_eq!(app.autoplay().phase(), NarrationPhase::Recitation);
        assert!(app.autoplay().is_enabled());
        // The next verse is already being narrated
        assert!(app.autoplay().is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_autoplay_waits_for_playback_and_pause() {
        let (mut app, mut inbox) =
            app_with(ScriptedProvider::with_audio(Duration::from_secs(2)), &[2]);
        let _ = app.handle_command(Command::JumpTo {
            chapter: 0,
            verse: Some(0),
        });
        let _ = app.handle_command(Command::ToggleAutoplay);
        let start = Instant::now();

        // started, ended, finished
        for _ in 0..3 {
            pump(&mut app, &mut inbox).await;
        }

        assert_eq!(app.autoplay().phase(), NarrationPhase::Meaning);
        assert!(start.elapsed() >= Duration::from_millis(3500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_autoplay_stops_at_conclusion() {
        let (mut app, mut inbox) = app_with(ScriptedProvider::silent(), &[1, 2]);
        let _ = app.handle_command(Command::JumpTo {
            chapter: 1,
            verse: Some(1),
        });
        let _ = app.handle_command(Command::ToggleAutoplay);

        for _ in 0..3 {
            pump(&mut app, &mut inbox).await;
        }

        assert_eq!(app.position(), Position::Conclusion);
        assert!(!app.autoplay().is_enabled());
        assert!(app.channel().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_navigation_resets_phase_mid_verse() {
        let (mut app, mut inbox) =
            app_with(ScriptedProvider::with_audio(Duration::from_secs(2)), &[3]);
        let _ = app.handle_command(Command::JumpTo {
            chapter: 0,
            verse: Some(1),
        });
        let _ = app.handle_command(Command::ToggleAutoplay);

        while app.autoplay().phase() != NarrationPhase::Meaning {
            pump(&mut app, &mut inbox).await;
        }
        let stale = app.channel().current_ticket().unwrap();
        assert!(app.autoplay().is_busy());

        let _ = app.handle_command(Command::Retreat);

        // Autoplay stays on and restarts the previous verse from recitation
        assert_eq!(app.position(), Position::Verse { chapter: 0, verse: 0 });
        assert!(app.autoplay().is_enabled());
        assert_eq!(app.autoplay().phase(), NarrationPhase::Recitation);
        assert!(app.autoplay().is_busy());
        let fresh = app.channel().current_ticket().unwrap();
        assert!(fresh > stale);
        assert_eq!(
            app.snapshot().active_key.as_ref().map(RequestKey::as_str),
            Some("speech_1.1_sanskrit")
        );

        // Only the fresh request moves the phase on, after its full playback and pause
        let retreated_at = Instant::now();
        while app.autoplay().phase() == NarrationPhase::Recitation {
            pump(&mut app, &mut inbox).await;
        }
        assert_eq!(app.autoplay().phase(), NarrationPhase::Meaning);
        assert_eq!(app.position(), Position::Verse { chapter: 0, verse: 0 });
        assert_eq!(retreated_at.elapsed(), Duration::from_millis(3500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_autoplay_traverses_every_slide() {
        let (mut app, mut inbox) = app_with(ScriptedProvider::silent(), &[2, 1]);
        let _ = app.handle_command(Command::ToggleAutoplay);

        let mut visited = vec![app.position()];
        while app.autoplay().is_enabled() {
            pump(&mut app, &mut inbox).await;
            if visited.last() != Some(&app.position()) {
                visited.push(app.position());
            }
        }

        assert_eq!(
            visited,
            vec![
                Position::Title,
                Position::Overview { chapter: 0 },
                Position::Verse { chapter: 0, verse: 0 },
                Position::Verse { chapter: 0, verse: 1 },
                Position::Overview { chapter: 1 },
                Position::Verse { chapter: 1, verse: 0 },
                Position::Conclusion,
            ]
        );
        assert!(app.channel().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slide_timer_advances_title() {
        let (mut app, mut inbox) = app_with(ScriptedProvider::silent(), &[2]);
        let start = Instant::now();
        let _ = app.handle_command(Command::ToggleAutoplay);

        pump(&mut app, &mut inbox).await;

        assert_eq!(app.position(), Position::Overview { chapter: 0 });
        assert_eq!(start.elapsed(), Duration::from_millis(7000));
        assert!(app.autoplay().is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_navigation_cancels_slide_timer() {
        let (mut app, mut inbox) = app_with(ScriptedProvider::silent(), &[2, 2]);
        let _ = app.handle_command(Command::ToggleAutoplay);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let _ = app.handle_command(Command::Advance);
        assert_eq!(app.position(), Position::Overview { chapter: 0 });

        // The old arm is cancelled; the new one fires a full delay later
        let moved_at = Instant::now();
        pump(&mut app, &mut inbox).await;
        assert_eq!(app.position(), Position::Verse { chapter: 0, verse: 0 });
        assert_eq!(moved_at.elapsed(), Duration::from_millis(7000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_during_narration_drops_stale_events() {
        let provider = ScriptedProvider::with_audio(Duration::from_secs(1))
            .delayed(Duration::from_secs(3));
        let (mut app, mut inbox) = app_with(provider, &[3]);
        let _ = app.handle_command(Command::JumpTo {
            chapter: 0,
            verse: Some(0),
        });

        let _ = app.handle_command(Command::Listen(ListenTarget::Phase(NarrationPhase::Meaning)));
        assert_eq!(
            app.snapshot().active_key.as_ref().map(RequestKey::as_str),
            Some("speech_1.1_meaning")
        );
        assert!(app.snapshot().audio_loading);

        let _ = app.handle_command(Command::Advance);
        assert!(app.channel().is_idle());
        assert_eq!(app.snapshot().active_key, None);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(tokio::time::timeout(Duration::from_millis(10), inbox.recv())
            .await
            .is_err());
        assert!(app.channel().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_listen_same_key_toggles_off() {
        let provider = ScriptedProvider::with_audio(Duration::from_secs(1))
            .delayed(Duration::from_secs(2));
        let (mut app, _inbox) = app_with(provider, &[3]);

        let _ = app.handle_command(Command::Listen(ListenTarget::Slide));
        assert_eq!(
            app.snapshot().active_key.as_ref().map(RequestKey::as_str),
            Some("speech_title_speech")
        );

        let _ = app.handle_command(Command::Listen(ListenTarget::Slide));
        assert!(app.channel().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_listen_disables_autoplay() {
        let provider = ScriptedProvider::silent().delayed(Duration::from_secs(2));
        let (mut app, _inbox) = app_with(provider, &[3]);
        let _ = app.handle_command(Command::JumpTo {
            chapter: 0,
            verse: Some(0),
        });
        let _ = app.handle_command(Command::ToggleAutoplay);
        assert!(app.autoplay().is_busy());

        let _ = app.handle_command(Command::Listen(ListenTarget::Phase(NarrationPhase::Insight)));

        assert!(!app.autoplay().is_enabled());
        assert_eq!(
            app.snapshot().active_key.as_ref().map(RequestKey::as_str),
            Some("speech_1.1_lesson")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_overview_listen_uses_featured_verse() {
        let (mut app, _inbox) = app_with(
            ScriptedProvider::silent().delayed(Duration::from_secs(1)),
            &[3],
        );
        let _ = app.handle_command(Command::Advance);

        let _ = app.handle_command(Command::Listen(ListenTarget::Phase(
            NarrationPhase::Recitation,
        )));
        let key = app.snapshot().active_key.unwrap();
        assert!(key.as_str().starts_with("speech_1."));
        assert!(key.as_str().ends_with("_sanskrit"));

        let _ = app.handle_command(Command::Listen(ListenTarget::Slide));
        assert_eq!(
            app.snapshot().active_key.as_ref().map(RequestKey::as_str),
            Some("speech_chapter_1_overview")
        );
    }

    #[tokio::test]
    async fn test_jump_disables_autoplay_and_closes_overlays() {
        let (mut app, _inbox) = app_with(ScriptedProvider::silent(), &[2, 2]);
        let _ = app.handle_command(Command::ToggleAutoplay);
        let _ = app.handle_command(Command::OpenGrid);
        assert!(app.snapshot().grid_open);

        let _ = app.handle_command(Command::JumpTo {
            chapter: 1,
            verse: None,
        });

        let snapshot = app.snapshot();
        assert_eq!(snapshot.position, Position::Overview { chapter: 1 });
        assert!(!snapshot.grid_open);
        assert!(!snapshot.autoplay.enabled);
    }

    #[tokio::test]
    async fn test_invalid_jump_is_ignored() {
        let (mut app, _inbox) = app_with(ScriptedProvider::silent(), &[2]);
        let _ = app.handle_command(Command::ToggleAutoplay);

        let _ = app.handle_command(Command::JumpTo {
            chapter: 4,
            verse: None,
        });
        let _ = app.handle_command(Command::JumpTo {
            chapter: 0,
            verse: Some(9),
        });

        assert_eq!(app.position(), Position::Title);
        assert!(app.autoplay().is_enabled());
    }

    #[tokio::test]
    async fn test_stop_audio_exits_autoplay() {
        let (mut app, _inbox) = app_with(ScriptedProvider::silent(), &[2]);
        let _ = app.handle_command(Command::ToggleAutoplay);
        assert!(app.autoplay().is_enabled());

        let _ = app.handle_command(Command::StopAudio);
        assert!(!app.autoplay().is_enabled());
        assert!(app.channel().is_idle());
    }

    #[tokio::test]
    async fn test_toggle_favorite_only_on_verses() {
        let (mut app, _inbox) = app_with(ScriptedProvider::silent(), &[2]);
        let _ = app.handle_command(Command::ToggleFavorite);
        assert_eq!(app.snapshot().favorite_count, 0);

        let _ = app.handle_command(Command::JumpTo {
            chapter: 0,
            verse: Some(1),
        });
        let _ = app.handle_command(Command::ToggleFavorite);

        let snapshot = app.snapshot();
        assert!(snapshot.is_favorite);
        assert_eq!(snapshot.favorite_count, 1);
        assert_eq!(snapshot.verse_id.as_deref(), Some("1.2"));
    }

    #[tokio::test]
    async fn test_search_opens_overlay_with_results() {
        let (mut app, _inbox) = app_with(ScriptedProvider::silent(), &[3, 3]);
        let _ = app.handle_command(Command::OpenGrid);

        let _ = app.handle_command(Command::Search("2.".to_string()));

        let snapshot = app.snapshot();
        assert!(snapshot.search_open);
        assert!(!snapshot.grid_open);
        assert_eq!(snapshot.search_results.len(), 3);
        assert_eq!(snapshot.search_results[0].verse_id, "2.1");
    }

    #[tokio::test]
    async fn test_progress_label() {
        let (mut app, _inbox) = app_with(ScriptedProvider::silent(), &[3]);
        assert_eq!(app.snapshot().progress_label(), "INTRO");

        let _ = app.handle_command(Command::JumpTo {
            chapter: 0,
            verse: Some(2),
        });
        assert_eq!(app.snapshot().progress_label(), "3 / 3");
    }

    #[tokio::test]
    async fn test_snapshots_are_published() {
        let (mut app, _inbox) = app_with(ScriptedProvider::silent(), &[2]);
        let mut rx = app.subscribe();
        assert_eq!(rx.borrow_and_update().view, View::Title);

        let _ = app.handle_command(Command::Advance);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().view, View::Overview);
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let (app, inbox) = app_with(ScriptedProvider::silent(), &[2]);
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Command::Advance).unwrap();
        tx.send(Command::Shutdown).unwrap();

        tokio::time::timeout(Duration::from_secs(1), app.run(inbox, rx))
            .await
            .unwrap();
    }
}
