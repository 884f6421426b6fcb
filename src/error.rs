//! Error types for the voice assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio error (recoverable, e.g. a single failed read)
    #[error("audio error: {0}")]
    Audio(String),

    /// Audio device could not be opened after bounded retries
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Wake word detection error
    #[error("wake word error: {0}")]
    WakeWord(String),

    /// AI backend error
    #[error("backend error: {0}")]
    Backend(String),

    /// Unknown resource profile name
    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the session cannot continue after this error
    ///
    /// Only audio device acquisition failure is fatal; everything else is
    /// recovered by returning to wake-word listening.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_device_failure_is_fatal() {
        assert!(Error::DeviceUnavailable("no mic".to_string()).is_fatal());
        assert!(!Error::Audio("read failed".to_string()).is_fatal());
        assert!(!Error::Backend("timeout".to_string()).is_fatal());
        assert!(!Error::UnknownProfile("xyz".to_string()).is_fatal());
    }
}
