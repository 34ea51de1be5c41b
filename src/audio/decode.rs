//! Narration payload decoding
//!
//! The narration service returns base64-encoded raw PCM: signed 16-bit
//! little-endian samples, interleaved when there is more than one channel.
//! No container header is present.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::time::Duration;

/// Decoded audio, one sample vector per channel
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl PcmBuffer {
    /// Number of frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Playback length at the buffer's sample rate
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }

    /// Build a silent buffer of the given length (used for tests and the silent provider)
    pub fn silence(sample_rate: u32, channels: usize, duration: Duration) -> Self {
        let frames = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        Self {
            sample_rate,
            channels: vec![vec![0.0; frames]; channels.max(1)],
        }
    }
}

/// Payload decoding errors
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Channel count must be at least 1")]
    NoChannels,
}

/// Decode a base64 payload into a PCM buffer
pub fn decode_pcm16_base64(
    payload: &str,
    sample_rate: u32,
    channels: usize,
) -> Result<PcmBuffer, DecodeError> {
    let bytes = STANDARD.decode(payload.trim())?;
    decode_pcm16(&bytes, sample_rate, channels)
}

/// Decode raw little-endian 16-bit PCM
///
/// A trailing odd byte is ignored, as is any partial frame at the end.
/// Samples are scaled by 1/32768 so the output lies in [-1.0, 1.0).
pub fn decode_pcm16(
    bytes: &[u8],
    sample_rate: u32,
    channels: usize,
) -> Result<PcmBuffer, DecodeError> {
    if channels == 0 {
        return Err(DecodeError::NoChannels);
    }

    let samples = bytes.len() / 2;
    let frames = samples / channels;
    let mut out = vec![Vec::with_capacity(frames); channels];

    for (i, pair) in bytes.chunks_exact(2).take(frames * channels).enumerate() {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        out[i % channels].push(sample as f32 / 32768.0);
    }

    Ok(PcmBuffer {
        sample_rate,
        channels: out,
    })
}
