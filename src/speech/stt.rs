//! Speech-to-text via a local Whisper-compatible server

use std::time::Duration;

use super::SpeechRecognizer;
use crate::audio::samples_to_wav;
use crate::{Error, Result};

/// Response from the `/audio/transcriptions` endpoint
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes speech with an OpenAI-compatible transcription endpoint
/// running on the local machine
pub struct WhisperRecognizer {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

impl WhisperRecognizer {
    /// Create a recognizer for `base_url` (e.g. `http://localhost:8080/v1`)
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }
}

impl SpeechRecognizer for WhisperRecognizer {
    fn recognize(&self, samples: &[f32], sample_rate: u32) -> Result<String> {
        if samples.is_empty() {
            return Ok(String::new());
        }

        let audio = samples_to_wav(samples, sample_rate)?;
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::blocking::multipart::Form::new()
            .part(
                "file",
                reqwest::blocking::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json()?;
        let transcript = result.text.trim().to_string();

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let stt =
            WhisperRecognizer::new("http://localhost:8080/v1/", "whisper-1", Duration::from_secs(5))
                .unwrap();
        assert_eq!(stt.endpoint(), "http://localhost:8080/v1/audio/transcriptions");
    }

    #[test]
    fn test_empty_audio_skips_request() {
        let stt = WhisperRecognizer::new("http://127.0.0.1:9", "whisper-1", Duration::from_secs(1))
            .unwrap();
        assert_eq!(stt.recognize(&[], 16000).unwrap(), "");
    }
}
