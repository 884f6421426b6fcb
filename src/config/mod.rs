//! Configuration management
//!
//! Every setting resolves as environment variable > TOML file > default.

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ai::{BackendKind, BackendSettings};

pub use file::{ZiggyConfigFile, config_file_path, load_config_file, load_config_file_from};

const DEFAULT_WAKE_WORD: &str = "ziggy";
const DEFAULT_SHUTDOWN_PHRASE: &str = "take a break";
const DEFAULT_HISTORY_TIMEOUT_SECS: u64 = 300;

/// Assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Wake phrase, lowercase
    pub wake_word: String,

    /// Phrase that ends the session, lowercase
    pub shutdown_phrase: String,

    /// Clear history after this much idle time between top-level turns
    pub history_timeout_secs: u64,

    /// Forced profile name; auto-selected when unset
    pub profile: Option<String>,

    pub audio: AudioConfig,

    pub ai: AiConfig,

    pub stt: SttConfig,

    pub tts: TtsConfig,
}

/// Recording configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Mean absolute amplitude under which a chunk counts as silence
    pub silence_threshold: f32,

    /// Continuous silence that ends a recording
    pub silence_duration: Duration,

    /// Length of each clip checked for the wake word
    pub wake_clip: Duration,

    /// Attempts to open the microphone before the session gives up
    pub device_retries: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 0.01,
            silence_duration: Duration::from_secs(1),
            wake_clip: Duration::from_secs(2),
            device_retries: 3,
        }
    }
}

/// AI backend configuration
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub backend: BackendKind,
    pub ollama_url: String,
    pub msty_url: String,
    /// Model name; the backend's first model when unset
    pub model: Option<String>,
    pub timeout: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            ollama_url: "http://localhost:11434".to_string(),
            msty_url: "http://localhost:10002".to_string(),
            model: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl AiConfig {
    /// Settings for backend detection
    #[must_use]
    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            kind: self.backend,
            ollama_url: self.ollama_url.clone(),
            msty_url: self.msty_url.clone(),
            timeout: self.timeout,
        }
    }
}

/// Speech recognition configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub url: String,
    pub model: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/v1".to_string(),
            model: "whisper-1".to_string(),
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub voice: String,
    /// Words per minute
    pub speed: u32,
    pub binary: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            voice: "en".to_string(),
            speed: 150,
            binary: "espeak".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_sources(ZiggyConfigFile::default(), |_| None)
    }
}

impl Config {
    /// Load configuration from the environment and the standard config file
    #[must_use]
    pub fn load() -> Self {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    #[must_use]
    pub fn from_sources(fc: ZiggyConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let audio_defaults = AudioConfig::default();
        let audio = AudioConfig {
            silence_threshold: fc
                .audio
                .silence_threshold
                .unwrap_or(audio_defaults.silence_threshold),
            silence_duration: fc
                .audio
                .silence_duration_secs
                .and_then(secs)
                .unwrap_or(audio_defaults.silence_duration),
            wake_clip: fc
                .audio
                .wake_clip_secs
                .and_then(secs)
                .unwrap_or(audio_defaults.wake_clip),
            device_retries: fc
                .audio
                .device_retries
                .unwrap_or(audio_defaults.device_retries)
                .max(1),
        };

        let ai_defaults = AiConfig::default();
        let ai = AiConfig {
            backend: parse_env(&env, "ZIGGY_AI_BACKEND")
                .or(fc.ai.backend)
                .unwrap_or(ai_defaults.backend),
            ollama_url: env("ZIGGY_OLLAMA_URL")
                .or(fc.ai.ollama_url)
                .unwrap_or(ai_defaults.ollama_url),
            msty_url: env("ZIGGY_MSTY_URL")
                .or(fc.ai.msty_url)
                .unwrap_or(ai_defaults.msty_url),
            model: env("ZIGGY_MODEL").or(fc.ai.model).filter(|m| !m.is_empty()),
            timeout: fc
                .ai
                .timeout_secs
                .map_or(ai_defaults.timeout, Duration::from_secs),
        };

        let stt_defaults = SttConfig::default();
        let stt = SttConfig {
            url: env("ZIGGY_STT_URL")
                .or(fc.stt.url)
                .unwrap_or(stt_defaults.url),
            model: fc.stt.model.unwrap_or(stt_defaults.model),
        };

        let tts_defaults = TtsConfig::default();
        let tts = TtsConfig {
            voice: env("ZIGGY_TTS_VOICE")
                .or(fc.tts.voice)
                .unwrap_or(tts_defaults.voice),
            speed: fc.tts.speed.unwrap_or(tts_defaults.speed),
            binary: fc.tts.binary.unwrap_or(tts_defaults.binary),
        };

        Self {
            wake_word: env("ZIGGY_WAKE_WORD")
                .or(fc.wake_word)
                .map_or_else(|| DEFAULT_WAKE_WORD.to_string(), |w| w.trim().to_lowercase()),
            shutdown_phrase: env("ZIGGY_SHUTDOWN_PHRASE")
                .or(fc.shutdown_phrase)
                .map_or_else(
                    || DEFAULT_SHUTDOWN_PHRASE.to_string(),
                    |p| p.trim().to_lowercase(),
                ),
            history_timeout_secs: parse_env(&env, "ZIGGY_HISTORY_TIMEOUT_SECS")
                .or(fc.history_timeout_secs)
                .unwrap_or(DEFAULT_HISTORY_TIMEOUT_SECS),
            profile: env("ZIGGY_PROFILE").or(fc.profile).filter(|p| !p.trim().is_empty()),
            audio,
            ai,
            stt,
            tts,
        }
    }

    /// Where the config file is read from
    #[must_use]
    pub fn file_path() -> Option<PathBuf> {
        config_file_path()
    }
}

fn parse_env<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = env(key)?;
    let parsed = value.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!(key, value = %value, "ignoring invalid environment value");
    }
    parsed
}

/// Positive, finite seconds as a `Duration`
fn secs(value: f32) -> Option<Duration> {
    (value.is_finite() && value > 0.0).then(|| Duration::from_secs_f32(value))
}
