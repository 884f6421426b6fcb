//! Generative AI backends
//!
//! Backends are local model servers reached over HTTP. A query never
//! returns `Err`: transport and API failures come back in
//! [`AiResponse::error`] so the caller can apologise and keep going.

mod ollama;
mod openai;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::conversation::ContextMessage;
use crate::{Error, Result};

pub use ollama::OllamaBackend;
pub use openai::OpenAiCompatBackend;

/// Error reported when a backend lists no models
pub const NO_MODELS_ERROR: &str = "No models available";

/// Timeout for availability probes
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// A model offered by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiModel {
    pub name: String,
    /// Human-readable size on disk, if reported
    pub size: Option<String>,
    pub context_length: Option<u64>,
}

/// Result of a backend query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiResponse {
    pub content: String,
    pub model: String,
    pub tokens_used: Option<u64>,
    pub error: Option<String>,
}

impl AiResponse {
    fn failed(model: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Whether the query failed
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }
}

/// A query against a backend
#[derive(Debug, Clone, Copy)]
pub struct QueryRequest<'a> {
    pub prompt: &'a str,
    /// Model to use; the backend's first model when unset
    pub model: Option<&'a str>,
    /// Prior messages, oldest first
    pub context: &'a [ContextMessage],
    /// Reply length cap, in tokens
    pub max_tokens: Option<usize>,
}

impl<'a> QueryRequest<'a> {
    #[must_use]
    pub const fn new(prompt: &'a str) -> Self {
        Self {
            prompt,
            model: None,
            context: &[],
            max_tokens: None,
        }
    }

    #[must_use]
    pub const fn with_model(mut self, model: Option<&'a str>) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub const fn with_context(mut self, context: &'a [ContextMessage]) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A generative model server
pub trait AiBackend: Send + Sync {
    /// Display name ("Ollama", "Msty")
    fn name(&self) -> &str;

    /// Base URL of the server
    fn url(&self) -> &str;

    /// Whether the server is up and is the kind this backend speaks to
    fn is_available(&self) -> bool;

    /// Models the server offers
    ///
    /// # Errors
    ///
    /// Returns error if the server cannot be reached or replies badly
    fn list_models(&self) -> Result<Vec<AiModel>>;

    /// Run a chat query; failures are reported in [`AiResponse::error`]
    fn query(&self, request: &QueryRequest<'_>) -> AiResponse;
}

/// Which backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Probe Msty, then Ollama
    #[default]
    Auto,
    Ollama,
    Msty,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Ollama => "ollama",
            Self::Msty => "msty",
        })
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "ollama" => Ok(Self::Ollama),
            "msty" => Ok(Self::Msty),
            other => Err(Error::Config(format!("unknown AI backend: {other}"))),
        }
    }
}

/// Where to find backends
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub kind: BackendKind,
    pub ollama_url: String,
    pub msty_url: String,
    pub timeout: Duration,
}

/// Find a running backend
///
/// `Auto` probes Msty first, then Ollama. Returns `None` if nothing answers.
///
/// # Errors
///
/// Returns error if an HTTP client cannot be built
pub fn detect_backend(settings: &BackendSettings) -> Result<Option<Box<dyn AiBackend>>> {
    let mut candidates: Vec<Box<dyn AiBackend>> = Vec::new();

    if matches!(settings.kind, BackendKind::Auto | BackendKind::Msty) {
        candidates.push(Box::new(OpenAiCompatBackend::msty(
            &settings.msty_url,
            settings.timeout,
        )?));
    }
    if matches!(settings.kind, BackendKind::Auto | BackendKind::Ollama) {
        candidates.push(Box::new(OllamaBackend::new(
            &settings.ollama_url,
            settings.timeout,
        )?));
    }

    for backend in candidates {
        if backend.is_available() {
            tracing::info!(backend = backend.name(), url = backend.url(), "AI backend detected");
            return Ok(Some(backend));
        }
        tracing::debug!(backend = backend.name(), url = backend.url(), "AI backend not available");
    }

    Ok(None)
}

/// Pick the requested model, or the first one the backend lists
fn resolve_model(
    backend: &dyn AiBackend,
    requested: Option<&str>,
) -> std::result::Result<String, String> {
    if let Some(model) = requested.filter(|m| !m.is_empty()) {
        return Ok(model.to_string());
    }

    let models = backend.list_models().map_err(|e| e.to_string())?;
    models
        .into_iter()
        .next()
        .map(|m| m.name)
        .ok_or_else(|| NO_MODELS_ERROR.to_string())
}

/// Wire-format chat message shared by both APIs
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Context followed by the user prompt
fn chat_messages(request: &QueryRequest<'_>) -> Vec<ChatMessage> {
    request
        .context
        .iter()
        .map(|m| ChatMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        })
        .chain(std::iter::once(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.to_string(),
        }))
        .collect()
}

fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder().timeout(timeout).build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;

    #[test]
    fn test_chat_messages_append_prompt_last() {
        let context = [
            ContextMessage {
                role: Role::System,
                content: "be brief".to_string(),
            },
            ContextMessage {
                role: Role::Assistant,
                content: "hi".to_string(),
            },
        ];
        let request = QueryRequest::new("what now").with_context(&context);
        let messages = chat_messages(&request);

        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "assistant", "user"]);
        assert_eq!(messages[2].content, "what now");
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("Ollama".parse::<BackendKind>().unwrap(), BackendKind::Ollama);
        assert_eq!("auto".parse::<BackendKind>().unwrap(), BackendKind::Auto);
        assert!("gpt".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_response_error_flag() {
        assert!(AiResponse::failed("m", NO_MODELS_ERROR).is_error());
        assert!(!AiResponse::default().is_error());
    }
}
