//! Session orchestration
//!
//! [`Session`] owns the [`SessionState`] and drives the collaborators
//! through each wake-word interaction.

mod control;
mod orchestrator;
mod state;

pub use control::{
    ControlAction, RESET_REPLY, SHUTDOWN_REPLY, UNKNOWN_PROFILE_REPLY, handle_control,
};
pub use orchestrator::{
    CONVERSATION_SYSTEM_PROMPT, Collaborators, QUERY_SYSTEM_PROMPT, Session, SessionSettings,
    retry_device,
};
pub use state::{Phase, SessionState, resolve_resources};
