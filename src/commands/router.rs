//! First-match router and question detection

use super::{AI_QUERY_TYPE, CommandHandler, CommandResult, RouteKind};

/// Leading words that mark a sentence as a question
pub const QUESTION_WORDS: &[&str] = &[
    "what", "where", "when", "why", "how", "who", "which", "whose", "can", "could", "would",
    "should", "will", "do", "does", "did", "is", "are", "was", "were", "am",
];

/// Ordered list of local handlers
#[derive(Default)]
pub struct CommandRouter {
    handlers: Vec<Box<dyn CommandHandler>>,
}

impl CommandRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with the built-in time, date, math and conversion handlers
    #[must_use]
    pub fn with_default_handlers() -> Self {
        let mut router = Self::new();
        router.register(Box::new(super::TimeHandler::new()));
        router.register(Box::new(super::DateHandler::new()));
        router.register(Box::new(super::MathHandler));
        router.register(Box::new(super::ConversionHandler));
        router
    }

    /// Append a handler; earlier registrations win
    pub fn register(&mut self, handler: Box<dyn CommandHandler>) {
        tracing::debug!(command_type = handler.command_type(), "registered handler");
        self.handlers.push(handler);
    }

    /// Number of registered handlers
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route an utterance to the first matching handler, or to the AI
    #[must_use]
    pub fn route(&self, text: &str) -> (RouteKind, CommandResult) {
        if let Some(handler) = self.handlers.iter().find(|h| h.can_handle(text)) {
            let result = handler.handle(text);
            tracing::debug!(
                command_type = %result.command_type,
                success = result.success,
                "handled locally"
            );
            return (RouteKind::Local, result);
        }

        let result = CommandResult::ok(AI_QUERY_TYPE, "")
            .with_metadata(serde_json::json!({ "original_text": text }));
        (RouteKind::Ai, result)
    }
}

/// Whether the text poses a question back to the listener
///
/// True if it contains `?` or any sentence (split on `.` and `!`) opens
/// with an interrogative or auxiliary word. The first word is compared as
/// written, so "What, exactly." does not count.
#[must_use]
pub fn contains_question(text: &str) -> bool {
    if text.contains('?') {
        return true;
    }

    text.to_lowercase()
        .split(['.', '!'])
        .filter_map(|sentence| sentence.split_whitespace().next())
        .any(|word| QUESTION_WORDS.contains(&word))
}
