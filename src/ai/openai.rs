//! OpenAI-compatible chat API (`/v1/models`, `/v1/chat/completions`), as served by Msty

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{
    AiBackend, AiModel, AiResponse, ChatMessage, PROBE_TIMEOUT, QueryRequest, chat_messages,
    http_client, resolve_model,
};
use crate::{Error, Result};

/// `owned_by` value Ollama reports on its OpenAI-compatible endpoint
const OLLAMA_OWNER: &str = "library";

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    owned_by: Option<String>,
    context_length: Option<u64>,
}

impl ModelList {
    /// A non-empty listing that is not Ollama in disguise
    fn is_native(&self) -> bool {
        self.data
            .first()
            .is_some_and(|m| m.owned_by.as_deref() != Some(OLLAMA_OWNER))
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

/// Client for an OpenAI-compatible local server
pub struct OpenAiCompatBackend {
    client: reqwest::blocking::Client,
    name: String,
    base_url: String,
}

impl OpenAiCompatBackend {
    /// Create a client for a Msty server at `base_url` (e.g. `http://localhost:10002`)
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn msty(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            name: "Msty".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn models(&self, timeout: Option<Duration>) -> Result<ModelList> {
        let mut request = self.client.get(format!("{}/v1/models", self.base_url));
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

    /// Whether the server also answers Ollama's native API
    fn speaks_ollama(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .is_ok_and(|r| r.status().is_success())
    }

    fn complete(&self, model: &str, request: &QueryRequest<'_>) -> Result<CompletionResponse> {
        let body = CompletionRequest {
            model: model.to_string(),
            messages: chat_messages(request),
            stream: false,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Backend(format!("API error: {status}")));
        }
        Ok(response.json()?)
    }
}

impl AiBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.base_url
    }

    fn is_available(&self) -> bool {
        if self.speaks_ollama() {
            tracing::debug!(url = %self.base_url, "server is Ollama, not {}", self.name);
            return false;
        }

        match self.models(Some(PROBE_TIMEOUT)) {
            Ok(list) => list.is_native(),
            Err(e) => {
                tracing::trace!(error = %e, backend = %self.name, "probe failed");
                false
            }
        }
    }

    fn list_models(&self) -> Result<Vec<AiModel>> {
        let list = self.models(None)?;
        Ok(list
            .data
            .into_iter()
            .map(|m| AiModel {
                name: m.id,
                size: None,
                context_length: m.context_length,
            })
            .collect())
    }

    fn query(&self, request: &QueryRequest<'_>) -> AiResponse {
        let model = match resolve_model(self, request.model) {
            Ok(model) => model,
            Err(e) => return AiResponse::failed("", e),
        };

        tracing::debug!(model = %model, backend = %self.name, "querying chat completions");

        match self.complete(&model, request) {
            Ok(response) => {
                let tokens_used = response.usage.and_then(|u| u.total_tokens);
                match response.choices.into_iter().next() {
                    Some(choice) => AiResponse {
                        content: choice.message.content,
                        model,
                        tokens_used,
                        error: None,
                    },
                    None => AiResponse::failed(model, "No response from model"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, model = %model, "chat completion failed");
                AiResponse::failed(model, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_masquerade_is_rejected() {
        let ollama: ModelList = serde_json::from_str(
            r#"{"object":"list","data":[{"id":"llama3","object":"model","owned_by":"library"}]}"#,
        )
        .unwrap();
        assert!(!ollama.is_native());

        let msty: ModelList =
            serde_json::from_str(r#"{"data":[{"id":"gemma2","owned_by":"msty"}]}"#).unwrap();
        assert!(msty.is_native());

        let empty: ModelList = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(!empty.is_native());
    }

    #[test]
    fn test_completion_parsing() {
        let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Sure."}}],
            "usage":{"prompt_tokens":9,"completion_tokens":2,"total_tokens":11}}"#;
        let response: CompletionResponse = serde_json::from_str(body).unwrap();

        assert_eq!(response.choices[0].message.content, "Sure.");
        assert_eq!(response.usage.and_then(|u| u.total_tokens), Some(11));
    }

    #[test]
    fn test_request_omits_unset_max_tokens() {
        let body = CompletionRequest {
            model: "m".to_string(),
            messages: Vec::new(),
            stream: false,
            max_tokens: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["stream"], false);
    }
}
