//! Sample rate conversion using the rubato resampler
//!
//! Narration arrives at the service rate (24kHz); output devices usually run
//! at 44.1kHz or 48kHz. Channel layout mapping also lives here.

use super::decode::PcmBuffer;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Frames fed to the resampler per call
const RESAMPLE_CHUNK_SIZE: usize = 1024;

/// Resampler for planar (per-channel) audio
pub struct AudioConverter {
    resampler: SincFixedIn<f32>,
    channels: usize,
    chunk_size: usize,
    ratio: f64,
}

impl AudioConverter {
    /// Create a new audio converter
    ///
    /// # Arguments
    /// * `source_rate` - Source sample rate (e.g., 24000)
    /// * `target_rate` - Target sample rate (e.g., 48000)
    /// * `channels` - Number of channels processed in parallel
    /// * `chunk_size` - Size of input chunks in frames (e.g., 1024)
    pub fn new(
        source_rate: u32,
        target_rate: u32,
        channels: usize,
        chunk_size: usize,
    ) -> Result<Self, rubato::ResamplerConstructionError> {
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let ratio = target_rate as f64 / source_rate as f64;
        let resampler = SincFixedIn::new(
            ratio,
            2.0, // max_resample_ratio_relative
            params,
            chunk_size,
            channels.max(1),
        )?;

        Ok(Self {
            resampler,
            channels: channels.max(1),
            chunk_size,
            ratio,
        })
    }

    /// Get the required input size for processing
    pub fn input_frames_next(&self) -> usize {
        self.resampler.input_frames_next()
    }

    /// Resample one chunk of planar audio
    pub fn process(&mut self, input: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, rubato::ResampleError> {
        self.resampler.process(input, None)
    }

    /// Resample a whole buffer, zero-padding the final chunk and trimming the
    /// output to the expected length
    pub fn process_all(&mut self, input: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, ResampleFailure> {
        if input.len() != self.channels {
            return Err(ResampleFailure::ChannelMismatch {
                expected: self.channels,
                actual: input.len(),
            });
        }

        let frames = input.first().map(Vec::len).unwrap_or(0);
        let expected = (frames as f64 * self.ratio).round() as usize;
        let mut output = vec![Vec::with_capacity(expected); self.channels];

        let delay = self.resampler.output_delay();
        let mut offset = 0;
        // Keep feeding (with silence past the end) until the resampler delay is flushed
        while output[0].len() < expected + delay {
            let mut chunk = vec![vec![0.0f32; self.chunk_size]; self.channels];
            if offset < frames {
                let end = (offset + self.chunk_size).min(frames);
                for (dst, src) in chunk.iter_mut().zip(input) {
                    dst[..end - offset].copy_from_slice(&src[offset..end]);
                }
            }
            offset += self.chunk_size;

            let resampled = self.process(&chunk)?;
            for (dst, src) in output.iter_mut().zip(resampled) {
                dst.extend(src);
            }
        }

        for channel in &mut output {
            channel.drain(..delay.min(channel.len()));
            channel.resize(expected, 0.0);
        }

        Ok(output)
    }
}

/// Errors from whole-buffer resampling
#[derive(Debug, thiserror::Error)]
pub enum ResampleFailure {
    #[error("Failed to create resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    #[error("Resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),

    #[error("Expected {expected} channels, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
}

/// Resample a decoded buffer to the target rate (no-op when rates match)
pub fn resample(buffer: &PcmBuffer, target_rate: u32) -> Result<PcmBuffer, ResampleFailure> {
    if buffer.sample_rate == target_rate || buffer.is_empty() {
        return Ok(PcmBuffer {
            sample_rate: target_rate,
            channels: buffer.channels.clone(),
        });
    }

    let mut converter = AudioConverter::new(
        buffer.sample_rate,
        target_rate,
        buffer.channel_count(),
        RESAMPLE_CHUNK_SIZE,
    )?;
    let channels = converter.process_all(&buffer.channels)?;

    tracing::debug!(
        "Resampled {} frames at {}Hz to {} frames at {}Hz",
        buffer.frame_count(),
        buffer.sample_rate,
        channels.first().map(Vec::len).unwrap_or(0),
        target_rate
    );

    Ok(PcmBuffer {
        sample_rate: target_rate,
        channels,
    })
}

/// Interleave planar audio for a device with `device_channels` outputs
///
/// Mono input is duplicated to every device channel; extra source channels
/// beyond the device's count are dropped.
pub fn interleave_for_device(buffer: &PcmBuffer, device_channels: usize) -> Vec<f32> {
    let frames = buffer.frame_count();
    let source_channels = buffer.channel_count();
    let mut out = Vec::with_capacity(frames * device_channels);

    for frame in 0..frames {
        for ch in 0..device_channels {
            let src = if source_channels == 1 {
                0
            } else {
                ch.min(source_channels - 1)
            };
            out.push(buffer.channels[src][frame]);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converter_new() {
        let converter = AudioConverter::new(24000, 48000, 1, 1024);
        assert!(converter.is_ok());
    }

    #[test]
    fn test_same_rate_is_passthrough() {
        let buffer = PcmBuffer {
            sample_rate: 24_000,
            channels: vec![vec![0.1, 0.2, 0.3]],
        };
        let out = resample(&buffer, 24_000).unwrap();
        assert_eq!(out, buffer);
    }

    #[test]
    fn test_upsample_doubles_length() {
        let samples: Vec<f32> = (0..2400).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let buffer = PcmBuffer {
            sample_rate: 24_000,
            channels: vec![samples],
        };

        let out = resample(&buffer, 48_000).unwrap();
        assert_eq!(out.sample_rate, 48_000);
        assert_eq!(out.frame_count(), 4800);
        assert!(out.channels[0].iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn test_resampling_produces_output() {
        let mut converter = AudioConverter::new(24000, 48000, 1, 1024).unwrap();
        let chunk = vec![(0..1024).map(|i| (i as f32 * 0.001).sin()).collect::<Vec<f32>>()];

        let mut total_output = 0;
        for _ in 0..10 {
            let output = converter.process(&chunk).unwrap();
            total_output += output[0].len();
        }

        // 10 chunks of 1024 frames at 2x, minus resampler buffering
        assert!(
            total_output > 15000,
            "Expected > 15000 samples, got {}",
            total_output
        );
    }

    #[test]
    fn test_channel_mismatch_rejected() {
        let mut converter = AudioConverter::new(24000, 48000, 2, 256).unwrap();
        let result = converter.process_all(&[vec![0.0; 10]]);
        assert!(matches!(
            result,
            Err(ResampleFailure::ChannelMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_interleave_duplicates_mono() {
        let buffer = PcmBuffer {
            sample_rate: 48_000,
            channels: vec![vec![0.1, 0.2]],
        };
        assert_eq!(interleave_for_device(&buffer, 2), vec![0.1, 0.1, 0.2, 0.2]);
        assert_eq!(interleave_for_device(&buffer, 1), vec![0.1, 0.2]);
    }

    #[test]
    fn test_interleave_stereo() {
        let buffer = PcmBuffer {
            sample_rate: 48_000,
            channels: vec![vec![0.1, 0.2], vec![-0.1, -0.2]],
        };
        assert_eq!(
            interleave_for_device(&buffer, 2),
            vec![0.1, -0.1, 0.2, -0.2]
        );
    }
}
