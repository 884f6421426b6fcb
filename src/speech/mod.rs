//! Speech input and output
//!
//! Three collaborator seams drive the assistant's voice:
//! - [`WakeWordDetector`] decides whether a frame of audio contains the wake phrase
//! - [`SpeechRecognizer`] turns a recording into text
//! - [`TextToSpeech`] speaks text and can be stopped from another thread
//!
//! [`InterruptibleSpeaker`] combines them so long replies can be cut off by
//! saying the wake word.

mod interrupt;
mod sentences;
mod stt;
mod tts;
mod wake_word;

pub use interrupt::{InterruptibleSpeaker, SHORT_TEXT_CHARS, SpeechOutcome, SpeechState};
pub use sentences::split_into_sentences;
pub use stt::WhisperRecognizer;
pub use tts::EspeakTts;
pub use wake_word::{DetectorState, TranscriptWakeWord};

use crate::Result;

/// Detects the wake phrase in audio frames
///
/// Implementations may keep internal segmentation state, so a detector is
/// fed from one listener at a time.
pub trait WakeWordDetector: Send + Sync {
    /// Whether the wake phrase was heard; internal failures count as `false`
    fn detect(&self, frame: &[f32], sample_rate: u32) -> bool;

    /// Drop any buffered audio
    fn reset(&self) {}
}

/// Converts recorded speech to text
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe mono samples; an empty string means no speech was recognized
    ///
    /// # Errors
    ///
    /// Returns error if the recognizer cannot be reached or fails
    fn recognize(&self, samples: &[f32], sample_rate: u32) -> Result<String>;
}

/// Speaks text aloud
pub trait TextToSpeech: Send + Sync {
    /// Speak `text`, blocking until playback finishes or [`Self::stop`] is called
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    fn speak(&self, text: &str) -> Result<()>;

    /// Stop in-flight playback; safe to call at any time from any thread
    fn stop(&self);
}
