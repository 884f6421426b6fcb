//! In-memory conversation store
//!
//! Owned and mutated by the session's primary thread only.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tokens::{RESPONSE_RESERVE_TOKENS, estimate_tokens};

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Wire name used by chat APIs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque conversation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationId(Uuid);

impl ConversationId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A stored message; immutable once appended
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

/// A message selected for the AI context window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: Role,
    pub content: String,
}

/// Token-bounded view of a conversation, in chronological order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationContext {
    pub conversation_id: Option<ConversationId>,
    pub messages: Vec<ContextMessage>,
    /// Estimated cost of `messages`
    pub token_count: usize,
}

/// Tracks conversations, the conversational-mode flag and idle time
#[derive(Debug)]
pub struct ConversationManager {
    history_limit: usize,
    conversations: HashMap<ConversationId, Vec<Message>>,
    current: Option<ConversationId>,
    conversational_mode: bool,
    last_interaction: DateTime<Utc>,
}

impl ConversationManager {
    /// Create a manager keeping at most `2 * history_limit` messages per conversation
    #[must_use]
    pub fn new(history_limit: usize) -> Self {
        Self {
            history_limit,
            conversations: HashMap::new(),
            current: None,
            conversational_mode: false,
            last_interaction: Utc::now(),
        }
    }

    /// Start a new conversation and make it current
    pub fn start(&mut self) -> ConversationId {
        let id = ConversationId::new();
        self.conversations.insert(id, Vec::new());
        self.current = Some(id);
        self.last_interaction = Utc::now();

        tracing::debug!(conversation_id = %id, "conversation started");
        id
    }

    /// The current conversation, if one has been started
    #[must_use]
    pub const fn current_id(&self) -> Option<ConversationId> {
        self.current
    }

    /// Append a message, starting a conversation if none is active
    ///
    /// Trims the oldest messages beyond `2 * history_limit`.
    pub fn append(
        &mut self,
        role: Role,
        content: impl Into<String>,
        conversation_id: Option<ConversationId>,
    ) -> ConversationId {
        self.append_with_metadata(role, content, None, conversation_id)
    }

    /// Append a message carrying metadata
    pub fn append_with_metadata(
        &mut self,
        role: Role,
        content: impl Into<String>,
        metadata: Option<serde_json::Value>,
        conversation_id: Option<ConversationId>,
    ) -> ConversationId {
        let id = match conversation_id.or(self.current) {
            Some(id) => id,
            None => self.start(),
        };

        let now = Utc::now();
        let cap = self.message_cap();
        let messages = self.conversations.entry(id).or_default();
        messages.push(Message {
            role,
            content: content.into(),
            created_at: now,
            metadata,
        });
        trim_to(messages, cap);

        self.last_interaction = now;
        id
    }

    /// Select the newest messages whose estimated cost fits in
    /// `max_tokens - RESPONSE_RESERVE_TOKENS`
    #[must_use]
    pub fn context(
        &self,
        max_tokens: usize,
        conversation_id: Option<ConversationId>,
    ) -> ConversationContext {
        let id = conversation_id.or(self.current);
        let Some(messages) = id.and_then(|id| self.conversations.get(&id)) else {
            return ConversationContext {
                conversation_id: id,
                ..ConversationContext::default()
            };
        };

        // No room left after the reply reserve, not even for zero-cost messages
        if max_tokens <= RESPONSE_RESERVE_TOKENS {
            return ConversationContext {
                conversation_id: id,
                ..ConversationContext::default()
            };
        }

        let budget = max_tokens - RESPONSE_RESERVE_TOKENS;
        let mut selected = Vec::new();
        let mut token_count = 0;

        for message in messages.iter().rev() {
            let cost = estimate_tokens(&message.content);
            if token_count + cost > budget {
                break;
            }
            token_count += cost;
            selected.push(ContextMessage {
                role: message.role,
                content: message.content.clone(),
            });
        }
        selected.reverse();

        ConversationContext {
            conversation_id: id,
            messages: selected,
            token_count,
        }
    }

    /// Empty a conversation's messages, keeping its id
    pub fn clear(&mut self, conversation_id: Option<ConversationId>) {
        let Some(id) = conversation_id.or(self.current) else {
            return;
        };

        if let Some(messages) = self.conversations.get_mut(&id) {
            messages.clear();
            tracing::info!(conversation_id = %id, "cleared conversation history");
        }
    }

    /// Messages stored for a conversation
    #[must_use]
    pub fn messages(&self, conversation_id: Option<ConversationId>) -> &[Message] {
        conversation_id
            .or(self.current)
            .and_then(|id| self.conversations.get(&id))
            .map_or(&[], Vec::as_slice)
    }

    /// Number of messages stored for a conversation
    #[must_use]
    pub fn history_len(&self, conversation_id: Option<ConversationId>) -> usize {
        self.messages(conversation_id).len()
    }

    pub fn enter_conversational_mode(&mut self) {
        if !self.conversational_mode {
            self.conversational_mode = true;
            tracing::info!("entering conversational mode");
        }
    }

    pub fn exit_conversational_mode(&mut self) {
        if self.conversational_mode {
            self.conversational_mode = false;
            tracing::info!("exiting conversational mode");
        }
    }

    #[must_use]
    pub const fn is_conversational_mode(&self) -> bool {
        self.conversational_mode
    }

    /// Whether the last interaction is older than `timeout_secs`
    ///
    /// Check before a new top-level interaction, not inside a conversational loop.
    #[must_use]
    pub fn should_clear_history(&self, timeout_secs: u64) -> bool {
        self.should_clear_history_at(Utc::now(), timeout_secs)
    }

    /// Same as [`Self::should_clear_history`] against an explicit clock reading
    #[must_use]
    pub fn should_clear_history_at(&self, now: DateTime<Utc>, timeout_secs: u64) -> bool {
        let Some(timeout) = i64::try_from(timeout_secs)
            .ok()
            .and_then(Duration::try_seconds)
        else {
            return false;
        };
        now.signed_duration_since(self.last_interaction) > timeout
    }

    /// Timestamp of the last append or conversation start
    #[must_use]
    pub const fn last_interaction(&self) -> DateTime<Utc> {
        self.last_interaction
    }

    #[must_use]
    pub const fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Change the limit and trim every conversation to the new cap
    pub fn update_history_limit(&mut self, history_limit: usize) {
        self.history_limit = history_limit;
        let cap = self.message_cap();

        for messages in self.conversations.values_mut() {
            trim_to(messages, cap);
        }

        tracing::debug!(history_limit, "history limit updated");
    }

    /// One-line description of the current conversation
    #[must_use]
    pub fn summary(&self) -> String {
        let Some(messages) = self.current.and_then(|id| self.conversations.get(&id)) else {
            return "No active conversation".to_string();
        };

        if messages.is_empty() {
            return "No messages in current conversation".to_string();
        }

        let users = messages.iter().filter(|m| m.role == Role::User).count();
        let assistants = messages.iter().filter(|m| m.role == Role::Assistant).count();

        format!("Current conversation: {users} user messages, {assistants} assistant responses")
    }

    const fn message_cap(&self) -> usize {
        self.history_limit.saturating_mul(2)
    }
}

/// Drop the oldest messages beyond `cap`
fn trim_to(messages: &mut Vec<Message>, cap: usize) {
    if messages.len() > cap {
        let excess = messages.len() - cap;
        messages.drain(..excess);
    }
}
