//! Single-voice audio channel
//!
//! At most one utterance is loading or playing at any time. Each `speak`
//! call gets a ticket and a cancellation token; the spawned session task
//! reports back over an mpsc channel, and events carrying an old ticket are
//! dropped so a late response can never play over a newer one.

use super::decode::decode_pcm16_base64;
use super::output::{AudioError, AudioOutput, PlaybackHandle};
use crate::config::PlaybackConfig;
use crate::narration::{NarrationProvider, RequestKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Monotonic id of one `speak` call
pub type Ticket = u64;

/// One utterance to synthesize and play
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub key: RequestKey,
    pub prompt: String,
    pub voice: String,
    /// Deliver a `Completion` when the utterance is over
    pub notify: bool,
}

/// What `speak` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// A new session was started
    Started(Ticket),
    /// The same key was already active; it was stopped instead
    Toggled(RequestKey),
}

/// How an utterance ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Audio played to the end
    Played,
    /// The provider returned no audio
    NoAudio,
    /// Synthesis, decoding or playback failed
    Failed(String),
}

/// Messages from session tasks back to the channel owner
#[derive(Debug)]
pub enum ChannelEvent {
    PlaybackStarted {
        ticket: Ticket,
        handle: PlaybackHandle,
    },
    PlaybackEnded {
        ticket: Ticket,
    },
    Finished {
        ticket: Ticket,
        outcome: SpeechOutcome,
    },
}

impl ChannelEvent {
    pub fn ticket(&self) -> Ticket {
        match self {
            ChannelEvent::PlaybackStarted { ticket, .. }
            | ChannelEvent::PlaybackEnded { ticket }
            | ChannelEvent::Finished { ticket, .. } => *ticket,
        }
    }
}

/// Delivered for finished `notify` requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub ticket: Ticket,
    pub key: RequestKey,
    pub outcome: SpeechOutcome,
}

/// Payload format and pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSettings {
    pub sample_rate: u32,
    pub channels: usize,
    /// Pause between the end of playback and the completion
    pub contemplative_pause: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self::from(&PlaybackConfig::default())
    }
}

impl From<&PlaybackConfig> for ChannelSettings {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels.max(1) as usize,
            contemplative_pause: Duration::from_millis(config.contemplative_pause_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Waiting on synthesis
    Loading,
    /// Audio is playing
    Playing,
    /// Playback ended; waiting out the contemplative pause
    Settling,
}

#[derive(Debug)]
struct Session {
    ticket: Ticket,
    key: RequestKey,
    notify: bool,
    state: SessionState,
    cancel: CancellationToken,
    handle: Option<PlaybackHandle>,
}

/// The single narration voice
pub struct AudioChannel {
    provider: Arc<dyn NarrationProvider>,
    output: Arc<dyn AudioOutput>,
    settings: ChannelSettings,
    events: mpsc::UnboundedSender<ChannelEvent>,
    next_ticket: Ticket,
    session: Option<Session>,
}

impl AudioChannel {
    /// Create a channel; session events arrive on the returned receiver and
    /// must be passed to `handle_event`
    pub fn new(
        provider: Arc<dyn NarrationProvider>,
        output: Arc<dyn AudioOutput>,
        settings: ChannelSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        tracing::info!(
            "Audio channel ready (provider: {}, output: {})",
            provider.name(),
            output.name()
        );
        (
            Self {
                provider,
                output,
                settings,
                events: tx,
                next_ticket: 1,
                session: None,
            },
            rx,
        )
    }

    /// Key currently loading or playing (cleared once playback ends)
    pub fn active_key(&self) -> Option<&RequestKey> {
        self.session
            .as_ref()
            .filter(|s| s.state != SessionState::Settling)
            .map(|s| &s.key)
    }

    /// True while synthesis is outstanding
    pub fn is_loading(&self) -> bool {
        matches!(
            self.session.as_ref().map(|s| s.state),
            Some(SessionState::Loading)
        )
    }

    /// No session at all, including the post-playback pause
    pub fn is_idle(&self) -> bool {
        self.session.is_none()
    }

    /// Ticket of the current session
    pub fn current_ticket(&self) -> Option<Ticket> {
        self.session.as_ref().map(|s| s.ticket)
    }

    /// Start an utterance, or stop it if the same key is already active
    pub fn speak(&mut self, request: SpeechRequest) -> SpeakOutcome {
        if self.active_key() == Some(&request.key) {
            tracing::info!("Toggling off active speech {}", request.key);
            self.stop();
            return SpeakOutcome::Toggled(request.key);
        }

        self.stop();

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let cancel = CancellationToken::new();

        tracing::info!("Speech {} started (ticket {})", request.key, ticket);

        let task = SessionTask {
            ticket,
            prompt: request.prompt,
            voice: request.voice,
            notify: request.notify,
            provider: self.provider.clone(),
            output: self.output.clone(),
            settings: self.settings,
            cancel: cancel.clone(),
            events: self.events.clone(),
        };
        tokio::spawn(task.run());

        self.session = Some(Session {
            ticket,
            key: request.key,
            notify: request.notify,
            state: SessionState::Loading,
            cancel,
            handle: None,
        });

        SpeakOutcome::Started(ticket)
    }

    /// Stop whatever is loading, playing or settling. Idempotent.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        session.cancel.cancel();
        if let Some(handle) = session.handle {
            stop_handle(&handle);
        }

        tracing::info!(
            "Speech {} stopped (ticket {}, {:?})",
            session.key,
            session.ticket,
            session.state
        );
    }

    /// Apply a session event; returns the completion for finished `notify` requests
    pub fn handle_event(&mut self, event: ChannelEvent) -> Option<Completion> {
        let current = self.current_ticket();
        if current != Some(event.ticket()) {
            tracing::debug!(
                "Dropping stale audio event for ticket {} (current: {:?})",
                event.ticket(),
                current
            );
            if let ChannelEvent::PlaybackStarted { handle, .. } = event {
                stop_handle(&handle);
            }
            return None;
        }

        match event {
            ChannelEvent::PlaybackStarted { handle, .. } => {
                if let Some(session) = self.session.as_mut() {
                    session.state = SessionState::Playing;
                    session.handle = Some(handle);
                }
                None
            }
            ChannelEvent::PlaybackEnded { .. } => {
                if let Some(session) = self.session.as_mut() {
                    session.state = SessionState::Settling;
                    session.handle = None;
                }
                None
            }
            ChannelEvent::Finished { outcome, .. } => {
                let session = self.session.take()?;
                tracing::debug!("Speech {} finished: {:?}", session.key, outcome);
                session.notify.then(|| Completion {
                    ticket: session.ticket,
                    key: session.key,
                    outcome,
                })
            }
        }
    }
}

/// Halt a handle; "already finished" is expected and ignored
fn stop_handle(handle: &PlaybackHandle) {
    match handle.stop() {
        Ok(()) | Err(AudioError::AlreadyFinished) => {}
        Err(e) => tracing::warn!("Failed to stop playback: {}", e),
    }
}

/// Everything a spawned session needs
struct SessionTask {
    ticket: Ticket,
    prompt: String,
    voice: String,
    notify: bool,
    provider: Arc<dyn NarrationProvider>,
    output: Arc<dyn AudioOutput>,
    settings: ChannelSettings,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl SessionTask {
    async fn run(self) {
        let ticket = self.ticket;
        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => return,
            outcome = self.play() => outcome,
        };

        let Some(outcome) = outcome else {
            return;
        };
        let _ = self.events.send(ChannelEvent::Finished { ticket, outcome });
    }

    /// Synthesize, decode and play; None when cancelled mid-pause
    async fn play(&self) -> Option<SpeechOutcome> {
        let payload = match self.provider.synthesize(&self.prompt, &self.voice).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::info!("Narration provider returned no audio");
                return Some(SpeechOutcome::NoAudio);
            }
            Err(e) => {
                tracing::warn!("Narration failed: {}", e);
                return Some(SpeechOutcome::Failed(e.to_string()));
            }
        };

        let buffer = match decode_pcm16_base64(
            &payload,
            self.settings.sample_rate,
            self.settings.channels,
        ) {
            Ok(buffer) if buffer.is_empty() => return Some(SpeechOutcome::NoAudio),
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::warn!("Failed to decode narration audio: {}", e);
                return Some(SpeechOutcome::Failed(e.to_string()));
            }
        };

        let handle = match self.output.play(buffer) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("Failed to start playback: {}", e);
                return Some(SpeechOutcome::Failed(e.to_string()));
            }
        };

        // Stop our own playback if the session is cancelled from here on
        let guard = StopOnDrop(handle.clone());

        let _ = self.events.send(ChannelEvent::PlaybackStarted {
            ticket: self.ticket,
            handle: handle.clone(),
        });
        handle.finished().await;
        drop(guard);

        let _ = self
            .events
            .send(ChannelEvent::PlaybackEnded { ticket: self.ticket });

        if self.notify {
            tokio::time::sleep(self.settings.contemplative_pause).await;
        }

        Some(SpeechOutcome::Played)
    }
}

/// Stops playback when the session future is dropped mid-playback
struct StopOnDrop(PlaybackHandle);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        if !self.0.is_finished() {
            stop_handle(&self.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::SimulatedOutput;
    use crate::narration::testing::ScriptedProvider;
    use crate::narration::NarrationPhase;
    use tokio::time::Instant;

    fn request(key: RequestKey, notify: bool) -> SpeechRequest {
        SpeechRequest {
            key,
            prompt: "prompt".to_string(),
            voice: "Kore".to_string(),
            notify,
        }
    }

    fn verse_key(phase: NarrationPhase) -> RequestKey {
        RequestKey::verse("2.47", phase)
    }

    fn channel(
        provider: Arc<ScriptedProvider>,
    ) -> (AudioChannel, mpsc::UnboundedReceiver<ChannelEvent>) {
        AudioChannel::new(
            provider,
            Arc::new(SimulatedOutput::new()),
            ChannelSettings::default(),
        )
    }

    /// Feed events to the channel until a completion comes out
    async fn next_completion(
        channel: &mut AudioChannel,
        rx: &mut mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> Completion {
        loop {
            let event = rx.recv().await.unwrap();
            if let Some(completion) = channel.handle_event(event) {
                return completion;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_payload_completes_immediately() {
        let provider = Arc::new(ScriptedProvider::silent());
        let (mut channel, mut rx) = channel(provider.clone());
        let start = Instant::now();

        let outcome = channel.speak(request(verse_key(NarrationPhase::Meaning), true));
        assert!(matches!(outcome, SpeakOutcome::Started(1)));
        assert_eq!(
            channel.active_key(),
            Some(&verse_key(NarrationPhase::Meaning))
        );

        let completion = next_completion(&mut channel, &mut rx).await;
        assert_eq!(completion.outcome, SpeechOutcome::NoAudio);
        assert_eq!(completion.key, verse_key(NarrationPhase::Meaning));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(channel.active_key().is_none());
        assert!(channel.is_idle());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_failure_completes_immediately() {
        let provider = Arc::new(ScriptedProvider::failing());
        let (mut channel, mut rx) = channel(provider);
        let start = Instant::now();

        channel.speak(request(RequestKey::title(), true));
        let completion = next_completion(&mut channel, &mut rx).await;

        assert!(matches!(completion.outcome, SpeechOutcome::Failed(_)));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(channel.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_payload_is_a_failure() {
        let provider = Arc::new(ScriptedProvider::with_payload("%%%not-base64%%%"));
        let (mut channel, mut rx) = channel(provider);

        channel.speak(request(RequestKey::title(), true));
        let completion = next_completion(&mut channel, &mut rx).await;
        assert!(matches!(completion.outcome, SpeechOutcome::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_played_audio_completes_after_pause() {
        // 2 seconds of 24kHz mono audio
        let provider = Arc::new(ScriptedProvider::with_audio(Duration::from_secs(2)));
        let (mut channel, mut rx) = channel(provider);
        let start = Instant::now();

        channel.speak(request(verse_key(NarrationPhase::Recitation), true));

        // Playback starts and ends before the completion
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ChannelEvent::PlaybackStarted { .. }));
        assert!(channel.handle_event(event).is_none());
        assert!(channel.active_key().is_some());

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ChannelEvent::PlaybackEnded { .. }));
        assert!(channel.handle_event(event).is_none());
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        // Key clears at the end of playback, the session lingers for the pause
        assert!(channel.active_key().is_none());
        assert!(!channel.is_idle());

        let completion = next_completion(&mut channel, &mut rx).await;
        assert_eq!(completion.outcome, SpeechOutcome::Played);
        assert_eq!(start.elapsed(), Duration::from_millis(3500));
        assert!(channel.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_toggles_off() {
        let provider = Arc::new(ScriptedProvider::with_audio(Duration::from_secs(5)));
        let (mut channel, mut rx) = channel(provider.clone());
        let key = verse_key(NarrationPhase::Recitation);

        assert!(matches!(
            channel.speak(request(key.clone(), false)),
            SpeakOutcome::Started(_)
        ));
        assert_eq!(
            channel.speak(request(key.clone(), false)),
            SpeakOutcome::Toggled(key)
        );
        assert!(channel.is_idle());
        assert!(provider.calls() <= 1);

        // Whatever the cancelled task managed to send is stale
        tokio::time::sleep(Duration::from_secs(10)).await;
        while let Ok(event) = rx.try_recv() {
            assert!(channel.handle_event(event).is_none());
        }
        assert!(channel.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_key_replaces_active_session() {
        let provider = Arc::new(
            ScriptedProvider::with_audio(Duration::from_secs(5)).delayed(Duration::from_millis(500)),
        );
        let (mut channel, mut rx) = channel(provider);

        let first = channel.speak(request(verse_key(NarrationPhase::Recitation), true));
        let second = channel.speak(request(verse_key(NarrationPhase::Meaning), true));
        assert_eq!(first, SpeakOutcome::Started(1));
        assert_eq!(second, SpeakOutcome::Started(2));
        assert_eq!(
            channel.active_key(),
            Some(&verse_key(NarrationPhase::Meaning))
        );

        let completion = next_completion(&mut channel, &mut rx).await;
        assert_eq!(completion.ticket, 2);
        assert_eq!(completion.key, verse_key(NarrationPhase::Meaning));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_pause_suppresses_completion() {
        let provider = Arc::new(ScriptedProvider::with_audio(Duration::from_secs(1)));
        let (mut channel, mut rx) = channel(provider);

        channel.speak(request(RequestKey::conclusion(), true));
        for _ in 0..2 {
            let event = rx.recv().await.unwrap();
            assert!(channel.handle_event(event).is_none());
        }

        // Now settling
        channel.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        while let Ok(event) = rx.try_recv() {
            assert!(channel.handle_event(event).is_none());
        }
        assert!(channel.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_event_ignored() {
        let provider = Arc::new(ScriptedProvider::silent());
        let (mut channel, _rx) = channel(provider);

        channel.speak(request(RequestKey::title(), true));
        let stale = ChannelEvent::Finished {
            ticket: 99,
            outcome: SpeechOutcome::Played,
        };
        assert!(channel.handle_event(stale).is_none());
        assert!(channel.active_key().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let provider = Arc::new(ScriptedProvider::silent());
        let (mut channel, _rx) = channel(provider);

        channel.stop();
        channel.speak(request(RequestKey::title(), false));
        channel.stop();
        channel.stop();
        assert!(channel.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_notify_no_completion_is_delivered() {
        let provider = Arc::new(ScriptedProvider::silent());
        let (mut channel, mut rx) = channel(provider);

        channel.speak(request(RequestKey::title(), false));
        let event = rx.recv().await.unwrap();
        assert!(channel.handle_event(event).is_none());
        assert!(channel.is_idle());
    }
}
