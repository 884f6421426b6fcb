//! Conversation history and token-bounded context windows

mod manager;
mod tokens;

pub use manager::{
    ContextMessage, ConversationContext, ConversationId, ConversationManager, Message, Role,
};
pub use tokens::{RESPONSE_RESERVE_TOKENS, estimate_tokens};
