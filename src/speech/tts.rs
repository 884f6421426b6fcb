//! Text-to-speech with the local espeak engine

use std::io::{Cursor, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::TextToSpeech;
use crate::audio::AudioPlayback;
use crate::{Error, Result};

/// Synthesizes speech with `espeak --stdout` and plays it on the speakers
///
/// `stop` kills a running synthesis and halts playback, from any thread.
pub struct EspeakTts {
    binary: String,
    voice: String,
    speed: u32,
    playback: AudioPlayback,
    child: Mutex<Option<Child>>,
    stop_flag: AtomicBool,
}

impl EspeakTts {
    /// Create a TTS engine using `binary` (normally `espeak` or `espeak-ng`)
    ///
    /// # Errors
    ///
    /// Returns error if the binary is not installed
    pub fn new(
        binary: impl Into<String>,
        voice: impl Into<String>,
        speed: u32,
        playback: AudioPlayback,
    ) -> Result<Self> {
        let binary = binary.into();
        let path = which::which(&binary)
            .map_err(|e| Error::Tts(format!("{binary} not found: {e}")))?;

        tracing::debug!(binary = %path.display(), speed, "espeak TTS initialized");

        Ok(Self {
            binary,
            voice: voice.into(),
            speed,
            playback,
            child: Mutex::new(None),
            stop_flag: AtomicBool::new(false),
        })
    }

    /// Run espeak and collect its WAV output
    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.binary)
            .arg("--stdout")
            .args(["-v", &self.voice])
            .args(["-s", &self.speed.to_string()])
            .arg(text)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Tts(format!("failed to start {}: {e}", self.binary)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Tts("espeak stdout unavailable".to_string()))?;
        *self.child.lock().unwrap_or_else(PoisonError::into_inner) = Some(child);

        // A kill from `stop` closes the pipe and ends this read
        let mut wav = Vec::new();
        let read = stdout.read_to_end(&mut wav);

        let child = self
            .child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut child) = child {
            let status = child.wait()?;
            if !status.success() && !self.stop_flag.load(Ordering::Acquire) {
                return Err(Error::Tts(format!("{} exited with {status}", self.binary)));
            }
        }
        read?;

        Ok(wav)
    }
}

impl TextToSpeech for EspeakTts {
    fn speak(&self, text: &str) -> Result<()> {
        self.stop_flag.store(false, Ordering::Release);
        tracing::debug!(chars = text.len(), "synthesizing speech");

        let wav = self.synthesize(text)?;
        if self.stop_flag.load(Ordering::Acquire) || wav.is_empty() {
            return Ok(());
        }

        let (samples, sample_rate) = decode_wav(&wav)?;
        let completed = self.playback.play(&samples, sample_rate, &self.stop_flag)?;

        tracing::debug!(completed, "speech playback done");
        Ok(())
    }

    fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);

        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(child) = child.as_mut() {
            if let Err(e) = child.kill() {
                tracing::trace!(error = %e, "espeak already exited");
            }
        }
    }
}

/// Decode espeak WAV output to mono f32 samples
///
/// espeak writes a streaming header with a placeholder length, so decoding
/// stops quietly at the end of the data.
fn decode_wav(wav: &[u8]) -> Result<(Vec<f32>, u32)> {
    let reader = hound::WavReader::new(Cursor::new(wav))
        .map_err(|e| Error::Tts(format!("invalid WAV from espeak: {e}")))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = reader
        .into_samples::<i16>()
        .map_while(std::result::Result::ok)
        .map(|s| f32::from(s) / 32768.0)
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let samples = if channels > 1 {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        interleaved
    };

    Ok((samples, spec.sample_rate))
}
