//! Session orchestrator
//!
//! Drives the wake -> record -> route -> respond cycle. Conversational
//! follow-ups and interruptions are handled by an explicit loop, so a long
//! conversation never grows the call stack.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::control::{ControlAction, SHUTDOWN_REPLY, handle_control};
use super::state::{Phase, SessionState};
use crate::ai::{AiBackend, QueryRequest};
use crate::audio::{AudioRecorder, Recording};
use crate::commands::{CommandRouter, RouteKind, contains_question};
use crate::config::Config;
use crate::conversation::{ContextMessage, Role};
use crate::speech::{InterruptibleSpeaker, SpeechOutcome, SpeechRecognizer, WakeWordDetector};
use crate::{Error, Result};

/// System prompt for top-level questions
pub const QUERY_SYSTEM_PROMPT: &str = "You are a local AI assistant. Answer questions using only \
     your training data. Be helpful, friendly, and concise.";

/// System prompt for conversational follow-ups
pub const CONVERSATION_SYSTEM_PROMPT: &str = "You are having a friendly conversation. Respond \
     naturally and keep the conversation flowing. Feel free to ask follow-up questions or share \
     related thoughts. Be engaging and personable.";

const ACKNOWLEDGEMENT: &str = "Yes?";
const NO_INPUT_REPLY: &str = "I didn't hear anything";
const UNRECOGNIZED_REPLY: &str = "I couldn't understand that";
const TURN_FAILED_REPLY: &str = "Sorry, I had trouble processing that";

/// Tunables the orchestrator reads on every turn
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub wake_word: String,
    pub shutdown_phrase: String,
    pub history_timeout_secs: u64,
    pub wake_clip: Duration,
    pub silence_threshold: f32,
    pub silence_duration: Duration,
    pub device_retries: u32,
    /// Pause between device retries
    pub retry_delay: Duration,
    pub model: Option<String>,
}

impl SessionSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            wake_word: config.wake_word.clone(),
            shutdown_phrase: config.shutdown_phrase.clone(),
            history_timeout_secs: config.history_timeout_secs,
            wake_clip: config.audio.wake_clip,
            silence_threshold: config.audio.silence_threshold,
            silence_duration: config.audio.silence_duration,
            device_retries: config.audio.device_retries,
            retry_delay: Duration::from_secs(1),
            model: config.ai.model.clone(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// External collaborators the session drives
pub struct Collaborators {
    pub recorder: Arc<dyn AudioRecorder>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub detector: Arc<dyn WakeWordDetector>,
    pub speaker: Arc<InterruptibleSpeaker>,
    pub backend: Box<dyn AiBackend>,
}

/// How one turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnOutcome {
    /// Reply spoken in full; `asked` when it posed a question
    Spoken { asked: bool },
    /// The wake word cut the reply off
    Interrupted,
    /// Nothing usable was heard
    NoInput,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnKind {
    Command,
    FollowUp,
}

/// A running assistant session
pub struct Session {
    state: SessionState,
    router: CommandRouter,
    collaborators: Collaborators,
    settings: SessionSettings,
    shutdown: Arc<AtomicBool>,
}

impl Session {
    #[must_use]
    pub fn new(
        state: SessionState,
        router: CommandRouter,
        collaborators: Collaborators,
        settings: SessionSettings,
    ) -> Self {
        Self {
            state,
            router,
            collaborators,
            settings,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally created shutdown flag, e.g. one the recorder also watches
    #[must_use]
    pub fn with_shutdown_handle(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Flag that ends the session when set from another thread
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Speaker used for every reply; stop it to cut off playback on shutdown
    #[must_use]
    pub fn speaker(&self) -> Arc<InterruptibleSpeaker> {
        Arc::clone(&self.collaborators.speaker)
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Greeting naming the backend, profile and available memory
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn welcome_message(&self) -> String {
        let profile = self.state.profile();
        let status = self.state.resources.memory_status();
        format!(
            "Welcome. Ziggy is ready to assist you, connected to {} in {} mode with {:.1} \
             gigabytes available.",
            self.collaborators.backend.name(),
            profile.name,
            status.available as f64 / 1024.0,
        )
    }

    /// Run until shutdown
    ///
    /// # Errors
    ///
    /// Returns error only when the audio device cannot be acquired
    pub fn run(&mut self) -> Result<()> {
        tracing::info!(
            wake_word = %self.settings.wake_word,
            shutdown_phrase = %self.settings.shutdown_phrase,
            backend = self.collaborators.backend.name(),
            "session started"
        );
        self.say(&self.welcome_message());

        while !self.shutdown_requested() {
            match self.wait_for_wake() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return self.fail(e),
            }

            match self.handle_interaction() {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return self.fail(e),
                Err(e) => {
                    tracing::error!(error = %e, "interaction failed");
                    self.say(TURN_FAILED_REPLY);
                    self.state.end_interaction();
                }
            }
        }

        self.state.stop();
        tracing::info!(turns = self.state.turns(), "session ended");
        Ok(())
    }

    fn fail(&mut self, error: Error) -> Result<()> {
        self.state.stop();
        tracing::error!(error = %error, "session cannot continue");
        Err(error)
    }

    /// Record wake clips until the wake word is heard
    ///
    /// Returns `false` if shutdown was requested first.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceUnavailable` once retries are exhausted
    pub fn wait_for_wake(&mut self) -> Result<bool> {
        self.state.set_phase(Phase::Listening);
        tracing::debug!(wake_word = %self.settings.wake_word, "listening for wake word");

        while !self.shutdown_requested() {
            let clip = self.with_device_retries(|recorder| recorder.record(self.settings.wake_clip))?;
            if self
                .collaborators
                .detector
                .detect(&clip.samples, clip.sample_rate)
            {
                tracing::info!("wake word detected");
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Handle everything between one wake word and the return to listening
    ///
    /// # Errors
    ///
    /// Returns error if the audio device fails beyond its retry budget
    pub fn handle_interaction(&mut self) -> Result<()> {
        self.state.begin_interaction();

        'interaction: loop {
            if self.shutdown_requested() {
                break;
            }
            self.state.conversation.exit_conversational_mode();
            if self
                .state
                .conversation
                .should_clear_history(self.settings.history_timeout_secs)
            {
                self.state.conversation.clear(None);
                tracing::info!("cleared conversation history (timeout)");
            }

            self.say(ACKNOWLEDGEMENT);

            match self.run_turn(TurnKind::Command)? {
                TurnOutcome::Interrupted => {
                    tracing::info!("reply interrupted, taking a new command");
                    continue 'interaction;
                }
                TurnOutcome::Shutdown | TurnOutcome::NoInput | TurnOutcome::Spoken { asked: false } => {
                    break 'interaction;
                }
                TurnOutcome::Spoken { asked: true } => {}
            }

            while self.state.conversation.is_conversational_mode() && !self.shutdown_requested() {
                match self.run_turn(TurnKind::FollowUp)? {
                    TurnOutcome::Interrupted => continue 'interaction,
                    TurnOutcome::Shutdown => break 'interaction,
                    TurnOutcome::Spoken { .. } | TurnOutcome::NoInput => {}
                }
            }
            break;
        }

        self.state.end_interaction();
        Ok(())
    }

    /// Record, understand and answer one utterance
    fn run_turn(&mut self, kind: TurnKind) -> Result<TurnOutcome> {
        let profile = self.state.profile();
        let max_secs = match kind {
            TurnKind::Command => profile.recording_command_secs,
            TurnKind::FollowUp => profile.recording_conversational_secs,
        };

        self.state.set_phase(Phase::Recording);
        let recording = self.record_utterance(Duration::from_secs(max_secs))?;
        if self.shutdown_requested() {
            return Ok(TurnOutcome::Shutdown);
        }
        if recording.is_empty() {
            if kind == TurnKind::FollowUp {
                tracing::debug!("no follow-up heard, leaving conversational mode");
                self.state.conversation.exit_conversational_mode();
            } else {
                self.say(NO_INPUT_REPLY);
            }
            return Ok(TurnOutcome::NoInput);
        }

        self.state.set_phase(Phase::Processing);
        let text = self.recognize(&recording);
        if text.is_empty() {
            self.say(UNRECOGNIZED_REPLY);
            return Ok(TurnOutcome::NoInput);
        }
        tracing::info!(text = %text, ?kind, "heard");

        let response = match handle_control(
            &text,
            &self.settings.shutdown_phrase,
            &mut self.state.resources,
            &mut self.state.conversation,
        ) {
            Some(ControlAction::Shutdown) => {
                self.say(SHUTDOWN_REPLY);
                self.shutdown.store(true, Ordering::Release);
                return Ok(TurnOutcome::Shutdown);
            }
            Some(ControlAction::Reply(reply)) => reply,
            None if kind == TurnKind::FollowUp => self.ask_ai(&text, CONVERSATION_SYSTEM_PROMPT),
            None => {
                let (route, result) = self.router.route(&text);
                tracing::debug!(%route, command_type = %result.command_type, "routed");
                match route {
                    RouteKind::Local => result.response,
                    RouteKind::Ai => self.ask_ai(&text, QUERY_SYSTEM_PROMPT),
                }
            }
        };

        self.state.set_phase(Phase::Responding);
        match self.collaborators.speaker.speak(&response) {
            // stop() from a shutdown also surfaces as an interruption
            Ok(SpeechOutcome::Interrupted) if self.shutdown_requested() => {
                return Ok(TurnOutcome::Shutdown);
            }
            Ok(SpeechOutcome::Interrupted) => return Ok(TurnOutcome::Interrupted),
            Ok(SpeechOutcome::Completed) => {}
            Err(e) => {
                tracing::warn!(error = %e, "failed to speak reply");
                self.state.conversation.exit_conversational_mode();
                return Ok(TurnOutcome::Spoken { asked: false });
            }
        }

        let asked = contains_question(&response);
        if asked {
            tracing::debug!("reply asks a question");
            self.state.conversation.enter_conversational_mode();
        } else {
            self.state.conversation.exit_conversational_mode();
        }
        Ok(TurnOutcome::Spoken { asked })
    }

    fn record_utterance(&self, max_duration: Duration) -> Result<Recording> {
        let threshold = self.settings.silence_threshold;
        let silence = self.settings.silence_duration;
        tracing::debug!(max_secs = max_duration.as_secs(), "recording utterance");

        self.with_device_retries(|recorder| {
            recorder.record_until_silence(max_duration, threshold, silence)
        })
    }

    fn recognize(&self, recording: &Recording) -> String {
        match self
            .collaborators
            .recognizer
            .recognize(&recording.samples, recording.sample_rate)
        {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "speech recognition failed");
                String::new()
            }
        }
    }

    /// Query the backend with the conversation context
    ///
    /// Only successful exchanges are added to history.
    fn ask_ai(&mut self, text: &str, system_prompt: &str) -> String {
        let profile = self.state.profile();
        let context = self
            .state
            .conversation
            .context(profile.context_tokens, None);

        let mut messages = Vec::with_capacity(context.messages.len() + 1);
        messages.push(ContextMessage {
            role: Role::System,
            content: system_prompt.to_string(),
        });
        messages.extend(context.messages);

        let request = QueryRequest::new(text)
            .with_model(self.settings.model.as_deref())
            .with_context(&messages)
            .with_max_tokens(profile.response_tokens);

        tracing::debug!(context_tokens = context.token_count, "querying AI backend");
        let response = self.collaborators.backend.query(&request);

        let error = if response.is_error() {
            response.error
        } else if response.content.trim().is_empty() {
            Some("No response from model".to_string())
        } else {
            None
        };
        if let Some(error) = error {
            tracing::warn!(error = %error, "AI query failed");
            return format!("{TURN_FAILED_REPLY}: {error}");
        }

        let metadata = serde_json::json!({
            "model": response.model,
            "tokens_used": response.tokens_used,
        });
        self.state.conversation.append(Role::User, text, None);
        self.state
            .conversation
            .append_with_metadata(Role::Assistant, response.content.trim(), Some(metadata), None);

        response.content.trim().to_string()
    }

    /// Speak a short system message; failures are logged
    fn say(&self, text: &str) {
        if let Err(e) = self.collaborators.speaker.speak(text) {
            tracing::warn!(error = %e, text, "failed to speak");
        }
    }

    fn with_device_retries<T>(
        &self,
        op: impl Fn(&dyn AudioRecorder) -> Result<T>,
    ) -> Result<T> {
        retry_device(self.settings.device_retries, self.settings.retry_delay, || {
            op(self.collaborators.recorder.as_ref())
        })
    }
}

/// Run a device operation, retrying audio failures up to `attempts` times
///
/// # Errors
///
/// Returns `Error::DeviceUnavailable` once every attempt has failed with an
/// audio error; other errors are returned immediately
pub fn retry_device<T>(
    attempts: u32,
    delay: Duration,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let attempts = attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(Error::Audio(msg) | Error::DeviceUnavailable(msg)) => {
                if attempt >= attempts {
                    return Err(Error::DeviceUnavailable(format!(
                        "{msg} (after {attempt} attempts)"
                    )));
                }
                tracing::warn!(attempt, attempts, error = %msg, "audio device error, retrying");
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_retry_device_recovers() {
        let calls = Cell::new(0);
        let result = retry_device(3, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(Error::Audio("busy".to_string()))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_retry_device_gives_up_as_fatal() {
        let result: Result<()> =
            retry_device(2, Duration::ZERO, || Err(Error::Audio("no mic".to_string())));
        let err = result.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("after 2 attempts"));
    }

    #[test]
    fn test_retry_device_passes_other_errors_through() {
        let calls = Cell::new(0);
        let result: Result<()> = retry_device(5, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            Err(Error::Stt("down".to_string()))
        });
        assert!(matches!(result, Err(Error::Stt(_))));
        assert_eq!(calls.get(), 1);
    }
}
