//! Wake word detection
//!
//! Local energy gating finds speech segments; each segment is transcribed
//! and checked for the wake phrase.

use std::sync::{Arc, Mutex, PoisonError};

use super::{SpeechRecognizer, WakeWordDetector};

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to transcribe (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration to consider end of utterance (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// Continuous speech is transcribed once it reaches this length
const MAX_SEGMENT_SAMPLES: usize = 48_000; // 3 seconds

/// Segmentation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Idle,
    /// Detected potential speech, accumulating
    Listening,
}

#[derive(Debug)]
struct Segmenter {
    state: DetectorState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl Segmenter {
    const fn new() -> Self {
        Self {
            state: DetectorState::Idle,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Feed samples; returns a finished speech segment, if any
    fn process(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            DetectorState::Idle => {
                if is_speech {
                    self.state = DetectorState::Listening;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected, listening");
                }
                None
            }
            DetectorState::Listening => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                let ended = self.silence_counter > SILENCE_SAMPLES;
                if (ended || self.speech_buffer.len() >= MAX_SEGMENT_SAMPLES)
                    && self.speech_buffer.len() > MIN_SPEECH_SAMPLES
                {
                    tracing::debug!(samples = self.speech_buffer.len(), "speech segment complete");
                    let segment = std::mem::take(&mut self.speech_buffer);
                    self.reset();
                    return Some(segment);
                }

                if self.silence_counter > SILENCE_SAMPLES * 2 {
                    tracing::trace!("timeout - resetting");
                    self.reset();
                }
                None
            }
        }
    }

    fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }
}

/// Wake word detector that transcribes speech segments
///
/// Short frames are segmented by energy. A frame of at least one second is
/// treated as a complete clip and checked directly.
pub struct TranscriptWakeWord {
    wake_words: Vec<String>,
    recognizer: Arc<dyn SpeechRecognizer>,
    segmenter: Mutex<Segmenter>,
}

impl TranscriptWakeWord {
    /// Create a detector for one or more wake phrases
    #[must_use]
    pub fn new(wake_words: Vec<String>, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        let normalized: Vec<String> = wake_words
            .into_iter()
            .map(|w| w.to_lowercase().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();

        tracing::debug!(wake_words = ?normalized, "wake word detector initialized");

        Self {
            wake_words: normalized,
            recognizer,
            segmenter: Mutex::new(Segmenter::new()),
        }
    }

    /// Check if transcribed text contains a wake word
    #[must_use]
    pub fn check_wake_word(&self, transcript: &str) -> bool {
        let normalized = transcript.to_lowercase();

        self.wake_words.iter().any(|wake_word| {
            let found = normalized.contains(wake_word.as_str());
            if found {
                tracing::info!(wake_word, transcript, "wake word detected");
            }
            found
        })
    }

    /// Get the configured wake words
    #[must_use]
    pub fn wake_words(&self) -> &[String] {
        &self.wake_words
    }

    /// Current segmentation state
    #[must_use]
    pub fn state(&self) -> DetectorState {
        self.segmenter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    fn transcribe_and_check(&self, samples: &[f32], sample_rate: u32) -> bool {
        match self.recognizer.recognize(samples, sample_rate) {
            Ok(transcript) => {
                tracing::trace!(transcript, "wake word candidate");
                self.check_wake_word(&transcript)
            }
            Err(e) => {
                tracing::warn!(error = %e, "wake word transcription failed");
                false
            }
        }
    }
}

impl WakeWordDetector for TranscriptWakeWord {
    fn detect(&self, frame: &[f32], sample_rate: u32) -> bool {
        if frame.len() >= sample_rate as usize {
            if calculate_energy(frame) <= ENERGY_THRESHOLD {
                return false;
            }
            return self.transcribe_and_check(frame, sample_rate);
        }

        let segment = self
            .segmenter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .process(frame);

        segment.is_some_and(|segment| self.transcribe_and_check(&segment, sample_rate))
    }

    fn reset(&self) {
        self.segmenter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
