//! Session control phrases
//!
//! Checked before routing: shutdown, conversation reset and resource
//! profile commands.

use std::sync::LazyLock;

use regex::Regex;

use crate::conversation::ConversationManager;
use crate::resources::ResourceManager;

pub const SHUTDOWN_REPLY: &str = "Okay, bye!";
pub const RESET_REPLY: &str = "Starting fresh. What would you like to talk about?";
pub const UNKNOWN_PROFILE_REPLY: &str = "Sorry, I don't recognize that profile. \
     Available profiles are minimal, standard, and performance.";

const RESET_PHRASES: [&str; 4] = ["new conversation", "start over", "clear history", "fresh start"];

static SWITCH_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:switch(?:ed)? to|change to|use|set|enable)\b").expect("valid regex")
});

static PROFILE_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:mode|profile)\b").expect("valid regex"));

static FILLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:mode|profile|the|a)\b|[^\w\s]").expect("valid regex"));

static STATUS_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:what|which|current) profile\b").expect("valid regex")
});

static LIST_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:what|available|list) profiles\b").expect("valid regex")
});

/// What a control phrase asks the session to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    /// Say goodbye and end the session
    Shutdown,
    /// Speak this reply instead of routing the utterance
    Reply(String),
}

/// Handle a control phrase, if `text` is one
///
/// A successful profile switch pushes the new history limit into the
/// conversation manager before returning.
pub fn handle_control(
    text: &str,
    shutdown_phrase: &str,
    resources: &mut ResourceManager,
    conversation: &mut ConversationManager,
) -> Option<ControlAction> {
    let lower = text.to_lowercase();

    if !shutdown_phrase.is_empty() && lower.contains(shutdown_phrase) {
        tracing::info!("shutdown phrase heard");
        return Some(ControlAction::Shutdown);
    }

    if RESET_PHRASES.iter().any(|p| lower.contains(p)) {
        conversation.clear(None);
        tracing::info!("cleared conversation history (user requested)");
        return Some(ControlAction::Reply(RESET_REPLY.to_string()));
    }

    if let Some(name) = requested_profile(&lower) {
        let reply = match resources.switch_profile(&name) {
            Ok(profile) => {
                conversation.update_history_limit(profile.history_limit);
                format!("Switched to {} profile. {}", profile.name, profile.description)
            }
            Err(e) => {
                tracing::info!(error = %e, "profile switch rejected");
                UNKNOWN_PROFILE_REPLY.to_string()
            }
        };
        return Some(ControlAction::Reply(reply));
    }

    if STATUS_QUERY.is_match(&lower) {
        return Some(ControlAction::Reply(resources.profile_info()));
    }

    if LIST_QUERY.is_match(&lower) {
        return Some(ControlAction::Reply(resources.list_profiles()));
    }

    None
}

/// Profile name from "switch to gaming mode", "use the performance profile", ...
fn requested_profile(lower: &str) -> Option<String> {
    if !PROFILE_KEYWORD.is_match(lower) {
        return None;
    }

    let trigger = SWITCH_TRIGGER.find_iter(lower).last()?;
    let rest = &lower[trigger.end()..];
    let name = FILLER.replace_all(rest, " ");
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");

    (!name.is_empty()).then_some(name)
}
