//! Ollama native API (`/api/tags`, `/api/chat`)

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{
    AiBackend, AiModel, AiResponse, ChatMessage, PROBE_TIMEOUT, QueryRequest, chat_messages,
    http_client, resolve_model,
};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

impl ChatResponse {
    fn tokens_used(&self) -> Option<u64> {
        match (self.prompt_eval_count, self.eval_count) {
            (None, None) => None,
            (prompt, eval) => Some(prompt.unwrap_or(0) + eval.unwrap_or(0)),
        }
    }
}

/// Client for a local Ollama server
pub struct OllamaBackend {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl OllamaBackend {
    /// Create a client for `base_url` (e.g. `http://localhost:11434`)
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn tags(&self, timeout: Option<Duration>) -> Result<TagsResponse> {
        let mut request = self.client.get(format!("{}/api/tags", self.base_url));
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Backend(format!("API error: {status}")));
        }
        Ok(response.json()?)
    }

    fn chat(&self, model: &str, request: &QueryRequest<'_>) -> Result<ChatResponse> {
        let body = ChatRequest {
            model: model.to_string(),
            messages: chat_messages(request),
            stream: false,
            options: request
                .max_tokens
                .map(|num_predict| ChatOptions { num_predict }),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Backend(format!("API error: {status}")));
        }
        Ok(response.json()?)
    }
}

impl AiBackend for OllamaBackend {
    fn name(&self) -> &str {
        "Ollama"
    }

    fn url(&self) -> &str {
        &self.base_url
    }

    fn is_available(&self) -> bool {
        match self.tags(Some(PROBE_TIMEOUT)) {
            Ok(_) => true,
            Err(e) => {
                tracing::trace!(error = %e, "Ollama probe failed");
                false
            }
        }
    }

    fn list_models(&self) -> Result<Vec<AiModel>> {
        let tags = self.tags(None)?;
        Ok(tags
            .models
            .into_iter()
            .map(|m| AiModel {
                name: m.name,
                size: Some(format_size(m.size)),
                context_length: None,
            })
            .collect())
    }

    fn query(&self, request: &QueryRequest<'_>) -> AiResponse {
        let model = match resolve_model(self, request.model) {
            Ok(model) => model,
            Err(e) => return AiResponse::failed("", e),
        };

        tracing::debug!(model = %model, context = request.context.len(), "querying Ollama");

        match self.chat(&model, request) {
            Ok(response) => {
                let tokens_used = response.tokens_used();
                AiResponse {
                    content: response.message.map(|m| m.content).unwrap_or_default(),
                    model,
                    tokens_used,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, model = %model, "Ollama query failed");
                AiResponse::failed(model, e.to_string())
            }
        }
    }
}

/// Format a byte count as "4.1GB"
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1}{unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1}TB")
}
