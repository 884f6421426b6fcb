//! Command routing
//!
//! Utterances are offered to local handlers in registration order; the first
//! handler that accepts one answers it. Anything unclaimed goes to the AI
//! backend.

mod handlers;
mod router;

use std::fmt;

use serde::Serialize;

pub use handlers::{Clock, ConversionHandler, DateHandler, MathHandler, TimeHandler};
pub use router::{CommandRouter, QUESTION_WORDS, contains_question};

/// Command type tag for utterances routed to the AI backend
pub const AI_QUERY_TYPE: &str = "ai_query";

/// Outcome of handling a command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    /// Text to speak back
    pub response: String,
    /// Handler type tag ("time", "math", "ai_query", ...)
    pub command_type: String,
    /// False when the handler could not answer; `response` explains why
    pub success: bool,
    pub metadata: Option<serde_json::Value>,
}

impl CommandResult {
    /// A successful result
    #[must_use]
    pub fn ok(command_type: &str, response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            command_type: command_type.to_string(),
            success: true,
            metadata: None,
        }
    }

    /// A failed result carrying an explanatory response
    #[must_use]
    pub fn failed(command_type: &str, response: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(command_type, response)
        }
    }

    /// Attach metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Where a routed utterance should be answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Answered by a local handler
    Local,
    /// Escalated to the AI backend
    Ai,
}

impl RouteKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Ai => "ai",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deterministic local command handler
pub trait CommandHandler: Send + Sync {
    /// Whether this handler accepts the utterance
    fn can_handle(&self, text: &str) -> bool;

    /// Answer the utterance
    fn handle(&self, text: &str) -> CommandResult;

    /// Type tag reported in results
    fn command_type(&self) -> &'static str;
}
