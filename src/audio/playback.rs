//! Audio playback to speakers

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// How often a blocking play checks its stop flag
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(20);

/// Plays mono f32 audio on the default output device
///
/// Streams are built per call. Audio whose rate the device cannot run is
/// resampled to the device's default rate first.
#[derive(Debug, Clone)]
pub struct AudioPlayback {
    default_config: StreamConfig,
}

impl AudioPlayback {
    /// Probe the default output device
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceUnavailable` if there is no output device
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::DeviceUnavailable("no output device available".to_string()))?;

        let default_config: StreamConfig = device
            .default_output_config()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .into();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = default_config.sample_rate.0,
            channels = default_config.channels,
            "audio playback initialized"
        );

        Ok(Self { default_config })
    }

    /// Play samples, blocking until done or until `stop` is set
    ///
    /// Returns `true` if the audio played to the end.
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built
    pub fn play(&self, samples: &[f32], sample_rate: u32, stop: &AtomicBool) -> Result<bool> {
        if samples.is_empty() {
            return Ok(true);
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::DeviceUnavailable("no output device".to_string()))?;

        let config = self.config_for(&device, sample_rate);
        let output: Arc<[f32]> = if config.sample_rate.0 == sample_rate {
            samples.into()
        } else {
            resample(samples, sample_rate, config.sample_rate.0)?.into()
        };

        let channels = usize::from(config.channels);
        let position = Arc::new(AtomicUsize::new(0));
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let callback_samples = Arc::clone(&output);
        let callback_position = Arc::clone(&position);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = callback_position.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let sample = callback_samples.get(pos).copied().unwrap_or(0.0);
                        frame.fill(sample);
                        pos += 1;
                    }
                    callback_position.store(pos, Ordering::Relaxed);
                    if pos >= callback_samples.len() {
                        let _ = done_tx.send(());
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = (output.len() as u64 * 1000) / u64::from(config.sample_rate.0);
        let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

        let completed = loop {
            if stop.load(Ordering::Acquire) {
                break false;
            }
            match done_rx.recv_timeout(STOP_CHECK_INTERVAL) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break true,
                Err(mpsc::RecvTimeoutError::Timeout) if Instant::now() > deadline => {
                    tracing::warn!("playback did not signal completion in time");
                    break true;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }
        };

        drop(stream);
        tracing::debug!(
            samples = output.len(),
            played = position.load(Ordering::Relaxed).min(output.len()),
            completed,
            "playback finished"
        );

        Ok(completed)
    }

    /// Stream config at `sample_rate` if the device supports it, else the default
    fn config_for(&self, device: &cpal::Device, sample_rate: u32) -> StreamConfig {
        let rate = SampleRate(sample_rate);
        device
            .supported_output_configs()
            .ok()
            .and_then(|mut configs| {
                configs.find(|c| {
                    c.channels() <= 2 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
                })
            })
            .map_or_else(
                || self.default_config.clone(),
                |c| c.with_sample_rate(rate).config(),
            )
    }
}

/// Resample mono audio using rubato
#[allow(clippy::cast_possible_truncation)]
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    let chunk_size = 1024;
    let sub_chunks = 2;

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, sub_chunks, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let mut input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    // Pad the tail so the last partial chunk is not dropped
    let remainder = input.len() % chunk_size;
    if remainder != 0 {
        input.resize(input.len() + chunk_size - remainder, 0.0);
    }

    let mut output = Vec::with_capacity(input.len() * to_rate as usize / from_rate as usize);
    for chunk in input.chunks(chunk_size) {
        let result = resampler
            .process(&[chunk], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    tracing::trace!(from_rate, to_rate, "resampled playback audio");
    Ok(output.iter().map(|&s| s as f32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_changes_length_by_ratio() {
        let samples = vec![0.0_f32; 22050];
        let out = resample(&samples, 22050, 44100).unwrap();
        // Output is within one chunk of twice the input
        assert!(out.len() >= 44100 - 2048 && out.len() <= 44100 + 2048);
    }
}
