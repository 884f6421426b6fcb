//! Ziggy - local, privacy-preserving voice assistant
//!
//! This library provides the core of the assistant:
//! - Session orchestration (wake word, recording, routing, replies)
//! - Token-bounded conversation history
//! - Local command handlers and AI routing
//! - Interruptible speech output
//! - Resource profiles sized to the available GPU memory
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Session                        │
//! │   wake word → record → route → respond → (follow)   │
//! └───────┬──────────────┬───────────────┬──────────────┘
//!         │              │               │
//! ┌───────▼──────┐ ┌─────▼──────┐ ┌──────▼──────────────┐
//! │ Conversation │ │  Commands  │ │ Interruptible speech│
//! │   history    │ │  + AI      │ │   (TTS + listener)  │
//! └──────────────┘ └────────────┘ └─────────────────────┘
//!         Resource profile parameterizes every turn
//! ```

pub mod ai;
pub mod audio;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod resources;
pub mod session;
pub mod speech;

pub use config::Config;
pub use error::{Error, Result};
pub use session::{Session, SessionState};
