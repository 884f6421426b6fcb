//! TOML configuration file loading
//!
//! Supports `~/.config/ziggy/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ai::BackendKind;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ZiggyConfigFile {
    /// Phrase that wakes the assistant (e.g. "ziggy")
    pub wake_word: Option<String>,

    /// Phrase that ends the session
    pub shutdown_phrase: Option<String>,

    /// Idle seconds after which history is cleared
    pub history_timeout_secs: Option<u64>,

    /// Forced resource profile name
    pub profile: Option<String>,

    #[serde(default)]
    pub audio: AudioFileConfig,

    #[serde(default)]
    pub ai: AiFileConfig,

    #[serde(default)]
    pub stt: SttFileConfig,

    #[serde(default)]
    pub tts: TtsFileConfig,
}

/// Recording configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    pub silence_threshold: Option<f32>,
    pub silence_duration_secs: Option<f32>,
    /// Length of each clip checked for the wake word
    pub wake_clip_secs: Option<f32>,
    /// Attempts to open the microphone before giving up
    pub device_retries: Option<u32>,
}

/// AI backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct AiFileConfig {
    pub backend: Option<BackendKind>,
    pub ollama_url: Option<String>,
    pub msty_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Speech recognition configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// OpenAI-compatible base URL (e.g. "http://localhost:8080/v1")
    pub url: Option<String>,
    pub model: Option<String>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    pub voice: Option<String>,
    /// Words per minute
    pub speed: Option<u32>,
    pub binary: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ZiggyConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ZiggyConfigFile {
    config_file_path().map_or_else(ZiggyConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or invalid files yield defaults.
pub fn load_config_file_from(path: &Path) -> ZiggyConfigFile {
    if !path.exists() {
        return ZiggyConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ZiggyConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ZiggyConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/ziggy/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("ziggy").join("config.toml"))
}
