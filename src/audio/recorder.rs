//! Fixed-length and silence-terminated recording

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{AudioRecorder, AudioSource, FrameStream, Recording};
use crate::Result;

/// Samples per chunk when measuring volume
pub const FRAME_SIZE: usize = 1024;

/// Records from any [`AudioSource`]
///
/// The stream is opened per call and closed before returning. Setting the
/// cancel flag ends a capture at the next chunk boundary.
#[derive(Clone)]
pub struct SourceRecorder {
    source: Arc<dyn AudioSource>,
    cancel: Arc<AtomicBool>,
}

impl SourceRecorder {
    #[must_use]
    pub fn new(source: Arc<dyn AudioSource>) -> Self {
        Self {
            source,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop capturing whenever `cancel` is set
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn chunks_for(&self, duration: Duration) -> usize {
        let samples = duration.as_secs_f64() * f64::from(self.source.sample_rate());
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let chunks = (samples / FRAME_SIZE as f64).ceil() as usize;
        chunks
    }
}

impl AudioRecorder for SourceRecorder {
    fn record(&self, duration: Duration) -> Result<Recording> {
        let sample_rate = self.source.sample_rate();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let total = (duration.as_secs_f64() * f64::from(sample_rate)) as usize;

        let mut stream = self.source.open()?;
        let mut samples = Vec::with_capacity(total);

        while samples.len() < total && !self.cancelled() {
            let want = FRAME_SIZE.min(total - samples.len());
            samples.extend(stream.read_frame(want)?);
        }

        tracing::debug!(samples = samples.len(), sample_rate, "recorded fixed clip");
        Ok(Recording {
            samples,
            sample_rate,
        })
    }

    fn record_until_silence(
        &self,
        max_duration: Duration,
        silence_threshold: f32,
        silence_duration: Duration,
    ) -> Result<Recording> {
        let sample_rate = self.source.sample_rate();
        let max_chunks = self.chunks_for(max_duration);
        let silence_chunks = self.chunks_for(silence_duration).max(1);

        let mut stream = self.source.open()?;
        let mut samples = Vec::new();
        let mut silent_run = 0;
        let mut heard_speech = false;

        for _ in 0..max_chunks {
            if self.cancelled() {
                tracing::debug!("recording cancelled");
                heard_speech = false;
                break;
            }
            let chunk = stream.read_frame(FRAME_SIZE)?;

            if mean_volume(&chunk) < silence_threshold {
                silent_run += 1;
            } else {
                silent_run = 0;
                heard_speech = true;
            }
            samples.extend(chunk);

            if silent_run >= silence_chunks {
                break;
            }
        }

        tracing::debug!(samples = samples.len(), heard_speech, "recording ended");

        // All-silent or cancelled capture counts as no input
        if !heard_speech {
            samples.clear();
        }

        Ok(Recording {
            samples,
            sample_rate,
        })
    }
}

/// Mean absolute amplitude of a chunk
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_volume(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32
}
