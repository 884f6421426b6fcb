//! Audio capture, recording and playback
//!
//! Microphone access goes through [`AudioSource`], which opens a fresh
//! [`FrameStream`] per use. A stream is closed when dropped, so a recorder
//! or a background listener never leaves the device open past its own
//! lifetime.

mod capture;
mod playback;
mod recorder;

use std::time::Duration;

use crate::Result;

pub use capture::{CpalSource, SAMPLE_RATE, samples_to_wav};
pub use playback::AudioPlayback;
pub use recorder::{FRAME_SIZE, SourceRecorder, mean_volume};

/// A source of mono f32 samples
pub trait AudioSource: Send + Sync {
    /// Open a capture stream; it stays open until dropped
    ///
    /// # Errors
    ///
    /// Returns error if the input device cannot be opened
    fn open(&self) -> Result<Box<dyn FrameStream + '_>>;

    /// Sample rate of every stream opened from this source
    fn sample_rate(&self) -> u32;
}

/// An open capture stream
pub trait FrameStream {
    /// Block until `len` samples are available and return them
    ///
    /// # Errors
    ///
    /// Returns error if the stream fails or stalls
    fn read_frame(&mut self, len: usize) -> Result<Vec<f32>>;
}

/// Captured audio
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recording {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Recording {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of the recording
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// Records utterances from the microphone
pub trait AudioRecorder: Send + Sync {
    /// Record for a fixed duration
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened or read
    fn record(&self, duration: Duration) -> Result<Recording>;

    /// Record until `silence_duration` of continuous silence, or `max_duration`
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened or read
    fn record_until_silence(
        &self,
        max_duration: Duration,
        silence_threshold: f32,
        silence_duration: Duration,
    ) -> Result<Recording>;
}
