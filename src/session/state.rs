//! Session state owned by the orchestrator

use crate::conversation::ConversationManager;
use crate::resources::{MemoryProbe, ResourceManager, ResourceProfile};

/// Where the session is within the wake/respond cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for the wake word
    #[default]
    Listening,
    /// Recording the user's utterance
    Recording,
    /// Transcribing, routing or querying the backend
    Processing,
    /// Speaking a reply
    Responding,
    /// Shut down
    Stopped,
}

/// Everything the session mutates from turn to turn
///
/// Owned by the primary thread; the speech listener never touches it.
#[derive(Debug)]
pub struct SessionState {
    pub resources: ResourceManager,
    pub conversation: ConversationManager,
    phase: Phase,
    processing: bool,
    turns: u64,
}

impl SessionState {
    /// Create state whose history limit follows the active profile
    #[must_use]
    pub fn new(resources: ResourceManager) -> Self {
        let conversation = ConversationManager::new(resources.current().history_limit);
        Self {
            resources,
            conversation,
            phase: Phase::Listening,
            processing: false,
            turns: 0,
        }
    }

    /// The active profile, copied so a later switch cannot affect the caller
    #[must_use]
    pub fn profile(&self) -> ResourceProfile {
        *self.resources.current()
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            tracing::trace!(from = ?self.phase, to = ?phase, "session phase");
            self.phase = phase;
        }
    }

    /// Whether the session is still waiting for wake words
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.phase != Phase::Stopped
    }

    /// Whether an interaction is in progress
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        self.processing
    }

    /// Mark the start of an interaction after a wake word
    pub fn begin_interaction(&mut self) {
        self.processing = true;
        self.turns += 1;
        tracing::debug!(turn = self.turns, "interaction started");
    }

    /// Return to wake-word listening
    pub fn end_interaction(&mut self) {
        self.processing = false;
        self.conversation.exit_conversational_mode();
        if self.phase != Phase::Stopped {
            self.set_phase(Phase::Listening);
        }
    }

    /// Number of interactions started so far
    #[must_use]
    pub const fn turns(&self) -> u64 {
        self.turns
    }

    pub fn stop(&mut self) {
        self.processing = false;
        self.set_phase(Phase::Stopped);
    }
}

/// Pick the forced profile, or auto-select from available memory
///
/// An unrecognized forced name is logged and ignored.
pub fn resolve_resources(forced: Option<&str>, probe: &dyn MemoryProbe) -> ResourceManager {
    let mut resources = ResourceManager::auto_select(probe);

    if let Some(name) = forced {
        if let Err(e) = resources.switch_profile(name) {
            tracing::warn!(error = %e, "ignoring configured profile");
        }
    }

    resources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ProfileKind;

    struct Fixed(u64);

    impl MemoryProbe for Fixed {
        fn detect_available_memory_mb(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn test_history_limit_follows_profile() {
        let state = SessionState::new(ResourceManager::new(ProfileKind::Performance, 20_000));
        assert_eq!(state.conversation.history_limit(), 50);
    }

    #[test]
    fn test_forced_profile_overrides_auto() {
        let resources = resolve_resources(Some("max"), &Fixed(4096));
        assert_eq!(resources.current_kind(), ProfileKind::Performance);

        let resources = resolve_resources(Some("bogus"), &Fixed(4096));
        assert_eq!(resources.current_kind(), ProfileKind::Minimal);
    }

    #[test]
    fn test_interaction_lifecycle() {
        let mut state = SessionState::new(ResourceManager::new(ProfileKind::Minimal, 4096));
        state.begin_interaction();
        state.set_phase(Phase::Recording);
        state.conversation.enter_conversational_mode();
        assert!(state.is_processing());

        state.end_interaction();
        assert!(!state.is_processing());
        assert!(!state.conversation.is_conversational_mode());
        assert_eq!(state.phase(), Phase::Listening);

        state.stop();
        assert!(!state.is_listening());
    }
}
