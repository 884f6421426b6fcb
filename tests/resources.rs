//! Resource profile and control phrase tests

use ziggy_voice::conversation::{ConversationManager, Role};
use ziggy_voice::resources::{MemoryProbe, ProfileKind, ResourceManager};
use ziggy_voice::session::{
    ControlAction, RESET_REPLY, UNKNOWN_PROFILE_REPLY, handle_control, resolve_resources,
};

struct FixedProbe(u64);

impl MemoryProbe for FixedProbe {
    fn detect_available_memory_mb(&self) -> u64 {
        self.0
    }
}

fn control(
    text: &str,
    resources: &mut ResourceManager,
    conversation: &mut ConversationManager,
) -> Option<ControlAction> {
    handle_control(text, "take a break", resources, conversation)
}

#[test]
fn test_gaming_alias_selects_minimal() {
    let mut resources = ResourceManager::new(ProfileKind::Performance, 20_000);
    let profile = resources.switch_profile("gaming").unwrap();

    assert_eq!(profile.kind, ProfileKind::Minimal);
    assert_eq!(resources.current().name, "Minimal");
    assert_eq!(resources.current().context_tokens, 8000);
}

#[test]
fn test_unknown_profile_leaves_current_unchanged() {
    let mut resources = ResourceManager::new(ProfileKind::Standard, 10_000);
    let err = resources.switch_profile("unknown-xyz").unwrap_err();

    assert!(err.to_string().contains("unknown-xyz"));
    assert_eq!(resources.current_kind(), ProfileKind::Standard);
}

#[test]
fn test_forced_profile_overrides_auto_select() {
    let resources = resolve_resources(Some("performance"), &FixedProbe(2048));
    assert_eq!(resources.current_kind(), ProfileKind::Performance);

    let resources = resolve_resources(Some("nonsense"), &FixedProbe(2048));
    assert_eq!(resources.current_kind(), ProfileKind::Minimal);

    let resources = resolve_resources(None, &FixedProbe(12_000));
    assert_eq!(resources.current_kind(), ProfileKind::Standard);
}

#[test]
fn test_voice_switch_updates_history_limit() {
    let mut resources = ResourceManager::new(ProfileKind::Performance, 20_000);
    let mut conversation = ConversationManager::new(50);
    for i in 0..60 {
        conversation.append(Role::User, format!("m{i}"), None);
    }

    let action = control("switch to gaming mode", &mut resources, &mut conversation);

    assert_eq!(
        action,
        Some(ControlAction::Reply(
            "Switched to Minimal profile. Low resource usage for gaming or older systems"
                .to_string()
        ))
    );
    assert_eq!(conversation.history_limit(), 10);
    assert_eq!(conversation.history_len(None), 20);
}

#[test]
fn test_voice_switch_to_unknown_profile() {
    let mut resources = ResourceManager::new(ProfileKind::Standard, 10_000);
    let mut conversation = ConversationManager::new(20);

    let action = control("use the turbo profile", &mut resources, &mut conversation);

    assert_eq!(
        action,
        Some(ControlAction::Reply(UNKNOWN_PROFILE_REPLY.to_string()))
    );
    assert_eq!(resources.current_kind(), ProfileKind::Standard);
    assert_eq!(conversation.history_limit(), 20);
}

#[test]
fn test_profile_queries() {
    let mut resources = ResourceManager::new(ProfileKind::Standard, 10_000);
    let mut conversation = ConversationManager::new(20);

    let Some(ControlAction::Reply(status)) =
        control("which profile are you using", &mut resources, &mut conversation)
    else {
        panic!("expected a status reply");
    };
    assert!(status.starts_with("Running in Standard mode"));

    let Some(ControlAction::Reply(listing)) =
        control("what profiles are there", &mut resources, &mut conversation)
    else {
        panic!("expected a listing reply");
    };
    assert!(listing.starts_with("Available profiles: "));
    assert!(listing.contains("Standard (current)"));
}

#[test]
fn test_shutdown_and_reset_phrases() {
    let mut resources = ResourceManager::new(ProfileKind::Standard, 10_000);
    let mut conversation = ConversationManager::new(20);
    conversation.append(Role::User, "hello", None);

    assert_eq!(
        control("Okay, take a break", &mut resources, &mut conversation),
        Some(ControlAction::Shutdown)
    );
    assert_eq!(conversation.history_len(None), 1);

    assert_eq!(
        control("can we start over", &mut resources, &mut conversation),
        Some(ControlAction::Reply(RESET_REPLY.to_string()))
    );
    assert_eq!(conversation.history_len(None), 0);

    assert_eq!(
        control("tell me about the moon", &mut resources, &mut conversation),
        None
    );
}
