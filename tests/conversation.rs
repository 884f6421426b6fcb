//! Conversation history tests
//!
//! Cap, context-window and idle-timeout behaviour of the conversation
//! manager.

use chrono::{Duration, Utc};
use ziggy_voice::conversation::{
    ConversationManager, RESPONSE_RESERVE_TOKENS, Role, estimate_tokens,
};

/// Deterministic message of varying length
fn message(i: usize) -> String {
    format!("message {i} {}", "word ".repeat(i % 7 * 9))
}

#[test]
fn test_cap_holds_for_any_append_sequence() {
    for limit in 1..=5 {
        for count in 0..=30 {
            let mut manager = ConversationManager::new(limit);
            for i in 0..count {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                manager.append(role, format!("m{i}"), None);
            }

            let messages = manager.messages(None);
            let expected = count.min(2 * limit);
            assert_eq!(messages.len(), expected, "limit {limit}, count {count}");

            let first_kept = count - expected;
            for (offset, m) in messages.iter().enumerate() {
                assert_eq!(m.content, format!("m{}", first_kept + offset));
            }
        }
    }
}

#[test]
fn test_context_is_bounded_and_tight() {
    let mut manager = ConversationManager::new(100);
    for i in 0..60 {
        manager.append(Role::User, message(i), None);
    }
    let all = manager.messages(None).to_vec();

    for max_tokens in [0, 1999, 2000, 2005, 2050, 2200, 2500, 3000, 8000] {
        let context = manager.context(max_tokens, None);
        let budget = max_tokens.saturating_sub(RESPONSE_RESERVE_TOKENS);

        let cost: usize = context
            .messages
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum();
        assert_eq!(cost, context.token_count);
        assert!(cost <= budget, "max_tokens {max_tokens}");

        // selection is a suffix of history in chronological order
        let skipped = all.len() - context.messages.len();
        for (m, original) in context.messages.iter().zip(&all[skipped..]) {
            assert_eq!(m.content, original.content);
        }

        // the next older message would not have fit
        if skipped > 0 {
            let next = estimate_tokens(&all[skipped - 1].content);
            assert!(cost + next > budget, "max_tokens {max_tokens} not tight");
        }
    }
}

#[test]
fn test_context_stops_at_first_message_that_does_not_fit() {
    let mut manager = ConversationManager::new(10);
    manager.append(Role::User, "tiny", None);
    manager.append(Role::User, "word ".repeat(200), None);
    manager.append(Role::User, "hello world", None);

    // room for "hello world" (2) but not the 200-word message
    let context = manager.context(RESPONSE_RESERVE_TOKENS + 10, None);
    assert_eq!(context.messages.len(), 1);
    assert_eq!(context.messages[0].content, "hello world");
}

#[test]
fn test_history_timeout() {
    let mut manager = ConversationManager::new(10);
    manager.append(Role::User, "hi", None);
    let last = manager.last_interaction();

    assert!(!manager.should_clear_history_at(last, 300));
    assert!(!manager.should_clear_history_at(last + Duration::seconds(299), 300));
    assert!(!manager.should_clear_history_at(last + Duration::seconds(300), 300));
    assert!(manager.should_clear_history_at(last + Duration::seconds(301), 300));
    assert!(!manager.should_clear_history(300));
    assert!(last <= Utc::now());
}

#[test]
fn test_lowering_limit_trims_existing_history() {
    let mut manager = ConversationManager::new(50);
    for i in 0..40 {
        manager.append(Role::User, format!("m{i}"), None);
    }

    manager.update_history_limit(10);

    let messages = manager.messages(None);
    assert_eq!(messages.len(), 20);
    assert_eq!(messages[0].content, "m20");
    assert_eq!(manager.history_limit(), 10);
}

#[test]
fn test_conversations_are_independent() {
    let mut manager = ConversationManager::new(5);
    let first = manager.start();
    manager.append(Role::User, "first", Some(first));
    let second = manager.start();
    manager.append(Role::User, "second", None);

    assert_eq!(manager.current_id(), Some(second));
    assert_eq!(manager.history_len(Some(first)), 1);
    assert_eq!(manager.messages(Some(first))[0].content, "first");

    manager.clear(Some(first));
    assert_eq!(manager.history_len(Some(first)), 0);
    assert_eq!(manager.history_len(None), 1);
}
