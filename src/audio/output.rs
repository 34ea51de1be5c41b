//! Playback sinks
//!
//! `AudioOutput` starts playback of a decoded buffer and returns a
//! `PlaybackHandle` that can stop it early or be awaited until it ends.
//! `SimulatedOutput` plays nothing and just waits out the buffer duration,
//! which is what runs in headless environments and under tests.

use super::decode::PcmBuffer;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Audio output errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("No audio output device available")]
    NoDevice,

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Playback already finished")]
    AlreadyFinished,
}

/// Handle to one playing buffer
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

/// Sender half used by output implementations to signal the end of playback
#[derive(Debug)]
pub struct PlaybackCompletion {
    done: watch::Sender<bool>,
}

impl PlaybackCompletion {
    pub fn complete(self) {
        let _ = self.done.send(true);
    }
}

impl PlaybackHandle {
    /// Create a handle and the completion side that the output signals
    pub fn new() -> (Self, PlaybackCompletion) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancel: CancellationToken::new(),
                done: rx,
            },
            PlaybackCompletion { done: tx },
        )
    }

    /// Token the output watches to stop early
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        *self.done.borrow()
    }

    /// Stop playback
    ///
    /// Returns `AlreadyFinished` if the buffer played out (or was stopped)
    /// before this call; callers treat that as harmless.
    pub fn stop(&self) -> Result<(), AudioError> {
        if self.is_finished() || self.cancel.is_cancelled() {
            return Err(AudioError::AlreadyFinished);
        }
        self.cancel.cancel();
        Ok(())
    }

    /// Wait until playback ends (naturally or because it was stopped)
    pub async fn finished(&self) {
        let mut done = self.done.clone();
        // A dropped sender also means the output is gone
        let _ = done.wait_for(|finished| *finished).await;
    }
}

/// A sink that can play decoded narration
pub trait AudioOutput: Send + Sync {
    /// Start playing a buffer; returns immediately
    fn play(&self, buffer: PcmBuffer) -> Result<PlaybackHandle, AudioError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Output that sleeps for the buffer's duration instead of playing it
#[derive(Debug, Default, Clone)]
pub struct SimulatedOutput;

impl SimulatedOutput {
    pub fn new() -> Self {
        Self
    }
}

impl AudioOutput for SimulatedOutput {
    fn play(&self, buffer: PcmBuffer) -> Result<PlaybackHandle, AudioError> {
        let (handle, completion) = PlaybackHandle::new();
        let cancel = handle.cancel_token();
        let duration: Duration = buffer.duration();

        tracing::debug!("Simulated playback of {:?}", duration);

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = cancel.cancelled() => {
                    tracing::debug!("Simulated playback stopped early");
                }
            }
            completion.complete();
        });

        Ok(handle)
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
