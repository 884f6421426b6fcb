//! Shared test utilities
//!
//! Scripted stand-ins for audio, speech and AI collaborators. None of them
//! touch hardware or the network.

#![allow(dead_code, unused_imports)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use ziggy_voice::ai::{AiBackend, AiModel, AiResponse, QueryRequest};
use ziggy_voice::audio::{AudioRecorder, AudioSource, FrameStream, Recording, SAMPLE_RATE};
use ziggy_voice::commands::CommandRouter;
use ziggy_voice::conversation::ContextMessage;
use ziggy_voice::resources::{ProfileKind, ResourceManager};
use ziggy_voice::session::{Collaborators, SessionSettings};
use ziggy_voice::speech::{InterruptibleSpeaker, SpeechRecognizer, TextToSpeech, WakeWordDetector};
use ziggy_voice::{Error, Result, Session, SessionState};

/// Upper bound on any wait inside a fake, so a broken test fails instead of hanging
const FAKE_WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Generate sine wave audio samples
pub fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// One second of audible speech-like audio
pub fn speech_recording() -> Recording {
    Recording {
        samples: generate_sine_samples(220.0, 1.0, 0.3),
        sample_rate: SAMPLE_RATE,
    }
}

/// Microphone that yields silence and counts open streams
#[derive(Default)]
pub struct FakeSource {
    open_streams: Arc<AtomicUsize>,
    opened_total: AtomicUsize,
    fail_open: bool,
}

impl FakeSource {
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// Streams currently open
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Streams opened since creation
    pub fn opened_total(&self) -> usize {
        self.opened_total.load(Ordering::SeqCst)
    }
}

impl AudioSource for FakeSource {
    fn open(&self) -> Result<Box<dyn FrameStream + '_>> {
        if self.fail_open {
            return Err(Error::DeviceUnavailable("fake microphone unplugged".to_string()));
        }
        self.opened_total.fetch_add(1, Ordering::SeqCst);
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            open_streams: Arc::clone(&self.open_streams),
        }))
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

struct FakeStream {
    open_streams: Arc<AtomicUsize>,
}

impl FrameStream for FakeStream {
    fn read_frame(&mut self, len: usize) -> Result<Vec<f32>> {
        std::thread::sleep(Duration::from_millis(1));
        Ok(vec![0.0; len])
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

/// TTS that records what it was asked to say
///
/// Text containing the blocking needle plays until `stop` is called, and
/// arms the shared trigger when it starts.
#[derive(Default)]
pub struct ScriptedTts {
    spoken: Mutex<Vec<String>>,
    block_on: Option<String>,
    stopped: Mutex<bool>,
    resume: Condvar,
    trigger: Arc<AtomicBool>,
    stop_calls: AtomicUsize,
}

impl ScriptedTts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block on text containing `needle` and arm `trigger` when it starts
    pub fn blocking_on(needle: &str, trigger: Arc<AtomicBool>) -> Self {
        Self {
            block_on: Some(needle.to_string()),
            trigger,
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl TextToSpeech for ScriptedTts {
    fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());

        let blocks = self
            .block_on
            .as_deref()
            .is_some_and(|needle| text.contains(needle));
        if !blocks {
            return Ok(());
        }

        let mut stopped = self.stopped.lock().unwrap();
        *stopped = false;
        self.trigger.store(true, Ordering::SeqCst);

        let (stopped, timeout) = self
            .resume
            .wait_timeout_while(stopped, FAKE_WAIT_LIMIT, |stopped| !*stopped)
            .unwrap();
        assert!(!timeout.timed_out(), "blocking chunk was never stopped");
        drop(stopped);
        Ok(())
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        *self.stopped.lock().unwrap() = true;
        self.resume.notify_all();
    }
}

/// Detector that fires once after its trigger is armed
#[derive(Default)]
pub struct TriggerDetector {
    armed: Arc<AtomicBool>,
    calls: AtomicUsize,
}

impl TriggerDetector {
    pub fn new(armed: Arc<AtomicBool>) -> Self {
        Self {
            armed,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WakeWordDetector for TriggerDetector {
    fn detect(&self, _frame: &[f32], _sample_rate: u32) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.armed.swap(false, Ordering::SeqCst)
    }
}

/// Detector that fires on every wake clip (one second or longer) only
pub struct ClipDetector;

impl WakeWordDetector for ClipDetector {
    fn detect(&self, frame: &[f32], sample_rate: u32) -> bool {
        frame.len() >= sample_rate as usize
    }
}

/// Recorder returning scripted utterances
#[derive(Default)]
pub struct ScriptedRecorder {
    utterances: Mutex<VecDeque<Recording>>,
    failing: bool,
    calls: AtomicUsize,
}

impl ScriptedRecorder {
    pub fn new(utterances: Vec<Recording>) -> Self {
        Self {
            utterances: Mutex::new(utterances.into()),
            ..Self::default()
        }
    }

    /// Every call fails as if the microphone were missing
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AudioRecorder for ScriptedRecorder {
    fn record(&self, _duration: Duration) -> Result<Recording> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(Error::Audio("no input device".to_string()));
        }
        Ok(speech_recording())
    }

    fn record_until_silence(
        &self,
        _max_duration: Duration,
        _silence_threshold: f32,
        _silence_duration: Duration,
    ) -> Result<Recording> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(Error::Audio("no input device".to_string()));
        }
        Ok(self.utterances.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// Recognizer returning scripted transcripts, then empty text
#[derive(Default)]
pub struct ScriptedRecognizer {
    transcripts: Mutex<VecDeque<String>>,
}

impl ScriptedRecognizer {
    pub fn new(transcripts: &[&str]) -> Self {
        Self {
            transcripts: Mutex::new(transcripts.iter().map(ToString::to_string).collect()),
        }
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn recognize(&self, _samples: &[f32], _sample_rate: u32) -> Result<String> {
        Ok(self.transcripts.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// A query as the backend saw it
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub prompt: String,
    pub context: Vec<ContextMessage>,
    pub max_tokens: Option<usize>,
}

/// Backend replying from a script and recording every query
#[derive(Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<AiResponse>>,
    queries: Arc<Mutex<Vec<RecordedQuery>>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<AiResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            queries: Arc::default(),
        }
    }

    pub fn queries(&self) -> Arc<Mutex<Vec<RecordedQuery>>> {
        Arc::clone(&self.queries)
    }
}

impl AiBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn url(&self) -> &str {
        "memory://scripted"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn list_models(&self) -> Result<Vec<AiModel>> {
        Ok(vec![AiModel {
            name: "scripted-1".to_string(),
            size: None,
            context_length: None,
        }])
    }

    fn query(&self, request: &QueryRequest<'_>) -> AiResponse {
        self.queries.lock().unwrap().push(RecordedQuery {
            prompt: request.prompt.to_string(),
            context: request.context.to_vec(),
            max_tokens: request.max_tokens,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| failure("no scripted response"))
    }
}

/// Successful backend reply
pub fn reply(content: &str) -> AiResponse {
    AiResponse {
        content: content.to_string(),
        model: "scripted-1".to_string(),
        tokens_used: Some(10),
        error: None,
    }
}

/// Failed backend reply
pub fn failure(error: &str) -> AiResponse {
    AiResponse {
        model: "scripted-1".to_string(),
        error: Some(error.to_string()),
        ..AiResponse::default()
    }
}

/// A session wired to fakes, with handles for inspection
pub struct Harness {
    pub session: Session,
    pub tts: Arc<ScriptedTts>,
    pub source: Arc<FakeSource>,
    pub recorder: Arc<ScriptedRecorder>,
    pub queries: Arc<Mutex<Vec<RecordedQuery>>>,
}

impl Harness {
    pub fn spoken(&self) -> Vec<String> {
        self.tts.spoken()
    }

    pub fn queries(&self) -> Vec<RecordedQuery> {
        self.queries.lock().unwrap().clone()
    }
}

/// Builder for [`Harness`]
pub struct HarnessBuilder {
    transcripts: Vec<String>,
    recordings: Option<Vec<Recording>>,
    responses: Vec<AiResponse>,
    tts: Option<ScriptedTts>,
    detector: Option<Arc<dyn WakeWordDetector>>,
    recorder: Option<ScriptedRecorder>,
    profile: ProfileKind,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            transcripts: Vec::new(),
            recordings: None,
            responses: Vec::new(),
            tts: None,
            detector: None,
            recorder: None,
            profile: ProfileKind::Minimal,
        }
    }

    /// What the user says, one transcript per recording
    pub fn transcripts(mut self, transcripts: &[&str]) -> Self {
        self.transcripts = transcripts.iter().map(ToString::to_string).collect();
        self
    }

    /// Override the recordings (defaults to one per transcript)
    pub fn recordings(mut self, recordings: Vec<Recording>) -> Self {
        self.recordings = Some(recordings);
        self
    }

    pub fn responses(mut self, responses: Vec<AiResponse>) -> Self {
        self.responses = responses;
        self
    }

    pub fn tts(mut self, tts: ScriptedTts) -> Self {
        self.tts = Some(tts);
        self
    }

    pub fn detector(mut self, detector: Arc<dyn WakeWordDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn recorder(mut self, recorder: ScriptedRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn profile(mut self, profile: ProfileKind) -> Self {
        self.profile = profile;
        self
    }

    pub fn build(self) -> Harness {
        let recordings = self
            .recordings
            .unwrap_or_else(|| self.transcripts.iter().map(|_| speech_recording()).collect());
        let transcripts: Vec<&str> = self.transcripts.iter().map(String::as_str).collect();

        let tts = Arc::new(self.tts.unwrap_or_default());
        let source = Arc::new(FakeSource::default());
        let detector: Arc<dyn WakeWordDetector> = match self.detector {
            Some(detector) => detector,
            None => Arc::new(TriggerDetector::default()),
        };
        let recorder = Arc::new(
            self.recorder
                .unwrap_or_else(|| ScriptedRecorder::new(recordings)),
        );
        let backend = ScriptedBackend::new(self.responses);
        let queries = backend.queries();

        let tts_dyn: Arc<dyn TextToSpeech> = tts.clone();
        let source_dyn: Arc<dyn AudioSource> = source.clone();
        let speaker = Arc::new(InterruptibleSpeaker::new(
            tts_dyn,
            Arc::clone(&detector),
            source_dyn,
        ));

        let collaborators = Collaborators {
            recorder: recorder.clone(),
            recognizer: Arc::new(ScriptedRecognizer::new(&transcripts)),
            detector,
            speaker,
            backend: Box::new(backend),
        };

        let settings = SessionSettings {
            retry_delay: Duration::ZERO,
            device_retries: 2,
            ..SessionSettings::default()
        };

        let session = Session::new(
            SessionState::new(ResourceManager::new(self.profile, 4000)),
            CommandRouter::with_default_handlers(),
            collaborators,
            settings,
        );

        Harness {
            session,
            tts,
            source,
            recorder,
            queries,
        }
    }
}
