//! Speaker output using cpal
//!
//! cpal streams are not `Send`, so each playback runs on its own thread that
//! owns the stream, feeds it from a shared sample queue and polls the cancel
//! token until the queue drains.

use super::decode::PcmBuffer;
use super::format::{interleave_for_device, resample};
use super::output::{AudioError, AudioOutput, PlaybackHandle};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// How often the playback thread checks for cancellation and drain
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Extra time allowed after the queue drains so the device buffer empties
const DRAIN_TAIL: Duration = Duration::from_millis(150);

/// Get the display name for a device
///
/// Uses `description()` as the primary method (cpal 0.17+), with `name()` as fallback.
pub fn get_device_display_name(device: &cpal::Device) -> String {
    device
        .description()
        .map(|desc| desc.name().to_string())
        .unwrap_or_else(|_| {
            #[allow(deprecated)]
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        })
}

/// Get the default output device
pub fn get_default_output_device() -> Option<cpal::Device> {
    let host = cpal::default_host();
    tracing::info!("CPAL host: {}", host.id().name());
    host.default_output_device()
}

/// Plays narration through the default output device
#[derive(Debug, Default, Clone)]
pub struct SpeakerOutput;

impl SpeakerOutput {
    /// Check a device exists up front so startup can fall back to simulation
    pub fn new() -> Result<Self, AudioError> {
        let device = get_default_output_device().ok_or(AudioError::NoDevice)?;
        let name = get_device_display_name(&device);
        match device.default_output_config() {
            Ok(config) => tracing::info!(
                "Using output device: '{}', {}Hz, {}ch, format={:?}",
                name,
                config.sample_rate(),
                config.channels(),
                config.sample_format()
            ),
            Err(e) => tracing::warn!("Output device '{}' has no default config: {}", name, e),
        }
        Ok(Self)
    }
}

impl AudioOutput for SpeakerOutput {
    fn play(&self, buffer: PcmBuffer) -> Result<PlaybackHandle, AudioError> {
        let device = get_default_output_device().ok_or(AudioError::NoDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::Device(e.to_string()))?;

        // cpal 0.17 returns u32 directly
        let device_rate = supported.sample_rate();
        let device_channels = supported.channels() as usize;

        let resampled =
            resample(&buffer, device_rate).map_err(|e| AudioError::Device(e.to_string()))?;
        let samples: VecDeque<f32> = interleave_for_device(&resampled, device_channels).into();
        let queue = Arc::new(Mutex::new(samples));

        let (handle, completion) = PlaybackHandle::new();
        let cancel = handle.cancel_token();
        let config: cpal::StreamConfig = supported.into();

        std::thread::Builder::new()
            .name("darshan-playback".into())
            .spawn(move || {
                let callback_queue = queue.clone();
                let stream = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut queue = callback_queue.lock();
                        for slot in data.iter_mut() {
                            *slot = queue.pop_front().unwrap_or(0.0);
                        }
                    },
                    |err| {
                        tracing::error!("Audio output stream error: {}", err);
                    },
                    None,
                );

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            tracing::error!("Failed to start output stream: {}", e);
                        } else {
                            while !cancel.is_cancelled() && !queue.lock().is_empty() {
                                std::thread::sleep(POLL_INTERVAL);
                            }
                            if !cancel.is_cancelled() {
                                std::thread::sleep(DRAIN_TAIL);
                            }
                        }
                        drop(stream);
                    }
                    Err(e) => tracing::error!("Failed to build output stream: {}", e),
                }

                completion.complete();
            })
            .map_err(|e| AudioError::Device(format!("Failed to spawn playback thread: {}", e)))?;

        Ok(handle)
    }

    fn name(&self) -> &'static str {
        "speaker"
    }
}
