//! Microphone capture from the default input device

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use super::{AudioSource, FrameStream};
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// How long a read waits for the device before giving up
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens capture streams on the default input device
///
/// Only the negotiated config is kept. The device handle is reacquired per
/// stream, so the source is shareable across threads.
#[derive(Debug, Clone)]
pub struct CpalSource {
    config: StreamConfig,
}

impl CpalSource {
    /// Probe the default input device for a 16kHz config
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceUnavailable` if there is no usable input device
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no input device available".to_string()))?;

        let supports_rate = |c: &cpal::SupportedStreamConfigRange| {
            c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        };

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .find(|c| c.channels() == 1 && supports_rate(c))
            .or_else(|| {
                // Fallback: stereo, downmixed in the callback
                device
                    .supported_input_configs()
                    .ok()?
                    .find(|c| c.channels() == 2 && supports_rate(c))
            })
            .ok_or_else(|| {
                Error::DeviceUnavailable("no suitable input config found".to_string())
            })?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self { config })
    }
}

impl AudioSource for CpalSource {
    fn open(&self) -> Result<Box<dyn FrameStream + '_>> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no input device".to_string()))?;

        let channels = usize::from(self.config.channels);
        let (tx, rx) = mpsc::channel::<Vec<f32>>();

        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = if channels > 1 {
                        downmix(data, channels)
                    } else {
                        data.to_vec()
                    };
                    // Receiver gone means the stream is being torn down
                    let _ = tx.send(mono);
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        tracing::trace!("capture stream opened");

        Ok(Box::new(CpalStream {
            _stream: stream,
            rx,
            pending: Vec::new(),
        }))
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// A live capture stream; the device closes when this is dropped
struct CpalStream {
    _stream: Stream,
    rx: Receiver<Vec<f32>>,
    pending: Vec<f32>,
}

impl FrameStream for CpalStream {
    fn read_frame(&mut self, len: usize) -> Result<Vec<f32>> {
        while self.pending.len() < len {
            match self.rx.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(Error::Audio("timed out waiting for input".to_string()));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::DeviceUnavailable("input stream closed".to_string()));
                }
            }
        }

        Ok(self.pending.drain(..len).collect())
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        tracing::trace!("capture stream closed");
    }
}

/// Average interleaved channels into mono
#[allow(clippy::cast_precision_loss)]
fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo() {
        let mono = downmix(&[0.2, 0.4, -1.0, 1.0], 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!(mono[1].abs() < 1e-6);
    }

    #[test]
    fn test_wav_header_and_length() {
        let samples = vec![0.0_f32; 1600];
        let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header + 2 bytes per sample
        assert_eq!(wav.len(), 44 + 1600 * 2);

        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
    }
}
