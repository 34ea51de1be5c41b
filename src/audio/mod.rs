//! Audio subsystem for Darshan
//!
//! Decodes narration payloads, plays them through an `AudioOutput`, and
//! serialises utterances through the single-voice `AudioChannel`.

pub mod channel;
pub mod decode;
#[cfg(feature = "speaker")]
pub mod device;
pub mod format;
pub mod output;

pub use channel::{
    AudioChannel, ChannelEvent, ChannelSettings, Completion, SpeakOutcome, SpeechOutcome,
    SpeechRequest, Ticket,
};
pub use decode::{decode_pcm16, decode_pcm16_base64, DecodeError, PcmBuffer};
#[cfg(feature = "speaker")]
pub use device::SpeakerOutput;
pub use format::AudioConverter;
pub use output::{AudioError, AudioOutput, PlaybackHandle, SimulatedOutput};

use crate::config::OutputKind;
use std::sync::Arc;

/// Build the configured output, falling back to simulation when the speaker
/// is unavailable
pub fn create_output(kind: OutputKind) -> Arc<dyn AudioOutput> {
    match kind {
        OutputKind::Simulated => Arc::new(SimulatedOutput::new()),
        OutputKind::Speaker => speaker_or_simulated(),
    }
}

#[cfg(feature = "speaker")]
fn speaker_or_simulated() -> Arc<dyn AudioOutput> {
    match SpeakerOutput::new() {
        Ok(speaker) => Arc::new(speaker),
        Err(e) => {
            tracing::warn!("Speaker output unavailable, using simulated output: {}", e);
            Arc::new(SimulatedOutput::new())
        }
    }
}

#[cfg(not(feature = "speaker"))]
fn speaker_or_simulated() -> Arc<dyn AudioOutput> {
    tracing::warn!("Built without the `speaker` feature, using simulated output");
    Arc::new(SimulatedOutput::new())
}
