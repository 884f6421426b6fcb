//! Interruptible speech output
//!
//! Long replies are spoken chunk by chunk while an auxiliary listener
//! thread watches the microphone for the wake word. Detection sets a
//! per-call interruption signal and stops playback; the speaking thread
//! checks the signal around every chunk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use super::{TextToSpeech, WakeWordDetector, split_into_sentences};
use crate::Result;
use crate::audio::{AudioSource, FRAME_SIZE, FrameStream};

/// Text shorter than this is spoken in one go, without a listener
pub const SHORT_TEXT_CHARS: usize = 100;

/// How a `speak` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    Completed,
    Interrupted,
}

impl SpeechOutcome {
    #[must_use]
    pub const fn was_interrupted(self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Lifecycle of the most recent utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechState {
    #[default]
    Idle,
    Speaking,
    Completed,
    Interrupted,
}

/// Speaks replies and lets the wake word cut them off
///
/// `speak` calls are serialized: a new call first stops whatever is
/// playing, then waits for the previous call to unwind.
pub struct InterruptibleSpeaker {
    tts: Arc<dyn TextToSpeech>,
    detector: Arc<dyn WakeWordDetector>,
    source: Arc<dyn AudioSource>,
    state: Mutex<SpeechState>,
    /// Interruption signal of the in-flight call
    active: Mutex<Option<Arc<AtomicBool>>>,
    turn: Mutex<()>,
}

impl InterruptibleSpeaker {
    #[must_use]
    pub fn new(
        tts: Arc<dyn TextToSpeech>,
        detector: Arc<dyn WakeWordDetector>,
        source: Arc<dyn AudioSource>,
    ) -> Self {
        Self {
            tts,
            detector,
            source,
            state: Mutex::new(SpeechState::Idle),
            active: Mutex::new(None),
            turn: Mutex::new(()),
        }
    }

    /// Speak `text`, returning whether it was interrupted
    ///
    /// The listener thread, if any, has exited by the time this returns.
    ///
    /// # Errors
    ///
    /// Returns error if the text-to-speech engine fails
    pub fn speak(&self, text: &str) -> Result<SpeechOutcome> {
        self.stop();
        let _turn = lock(&self.turn);

        if text.chars().count() < SHORT_TEXT_CHARS {
            self.set_state(SpeechState::Speaking);
            let result = self.tts.speak(text);
            self.set_state(SpeechState::Completed);
            result?;
            return Ok(SpeechOutcome::Completed);
        }

        let chunks = split_into_sentences(text);
        let signal = Arc::new(AtomicBool::new(false));
        *lock(&self.active) = Some(Arc::clone(&signal));
        self.set_state(SpeechState::Speaking);

        let done = AtomicBool::new(false);
        let result = thread::scope(|scope| {
            let listener = scope.spawn(|| self.listen(&signal, &done));

            let result = self.speak_chunks(&chunks, &signal);

            done.store(true, Ordering::Release);
            if listener.join().is_err() {
                tracing::error!("interrupt listener panicked");
            }
            result
        });

        lock(&self.active).take();
        self.detector.reset();

        let outcome = result?;
        self.set_state(match outcome {
            SpeechOutcome::Completed => SpeechState::Completed,
            SpeechOutcome::Interrupted => SpeechState::Interrupted,
        });
        Ok(outcome)
    }

    /// Stop any in-flight speech and its listener; idempotent
    pub fn stop(&self) {
        if let Some(signal) = lock(&self.active).as_ref() {
            signal.store(true, Ordering::Release);
        }
        self.tts.stop();
    }

    /// Whether a `speak` call is currently playing audio
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        *lock(&self.state) == SpeechState::Speaking
    }

    /// State of the most recent utterance
    #[must_use]
    pub fn state(&self) -> SpeechState {
        *lock(&self.state)
    }

    fn speak_chunks(&self, chunks: &[String], signal: &AtomicBool) -> Result<SpeechOutcome> {
        let total = chunks.len();

        for (index, chunk) in chunks.iter().enumerate() {
            if signal.load(Ordering::Acquire) {
                return Ok(SpeechOutcome::Interrupted);
            }

            tracing::debug!(part = index + 1, total, "speaking chunk");
            self.tts.speak(chunk)?;

            if signal.load(Ordering::Acquire) {
                self.tts.stop();
                tracing::info!(part = index + 1, total, "speech interrupted");
                return Ok(SpeechOutcome::Interrupted);
            }
        }

        Ok(SpeechOutcome::Completed)
    }

    /// Watch the microphone until speech ends or the wake word is heard
    fn listen(&self, signal: &AtomicBool, done: &AtomicBool) {
        let mut stream = match self.source.open() {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "interrupt listener could not open microphone");
                return;
            }
        };
        let sample_rate = self.source.sample_rate();

        tracing::debug!("interrupt listener started");
        while !done.load(Ordering::Acquire) && !signal.load(Ordering::Acquire) {
            let frame = match stream.read_frame(FRAME_SIZE) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, "interrupt listener read failed");
                    break;
                }
            };

            if self.detector.detect(&frame, sample_rate) {
                tracing::info!("wake word heard during speech");
                signal.store(true, Ordering::Release);
                self.tts.stop();
                break;
            }
        }
        tracing::debug!("interrupt listener stopped");
    }

    fn set_state(&self, state: SpeechState) {
        *lock(&self.state) = state;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
