//! Resource profiles
//!
//! Named bundles of token, history and recording limits, selected to match
//! the memory available to the local model.

mod probe;
mod profile;

pub use probe::{DEFAULT_MEMORY_MB, MemoryProbe, SystemProbe};
pub use profile::{MemoryStatus, ProfileKind, ResourceManager, ResourceProfile};
