//! Profile table and the active-profile manager

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

use super::MemoryProbe;

/// Tuning limits for one resource class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceProfile {
    /// Which profile this is
    pub kind: ProfileKind,
    /// Display name ("Minimal")
    pub name: &'static str,
    /// Short spoken description
    pub description: &'static str,
    /// Hardware guidance
    pub requirements: &'static str,
    /// Model context window, in tokens
    pub context_tokens: usize,
    /// Exchanges kept per conversation (messages are capped at twice this)
    pub history_limit: usize,
    /// Token budget for a single reply
    pub response_tokens: usize,
    /// Recording ceiling while in conversational mode, in seconds
    pub recording_conversational_secs: u64,
    /// Recording ceiling for a top-level command, in seconds
    pub recording_command_secs: u64,
}

const MINIMAL: ResourceProfile = ResourceProfile {
    kind: ProfileKind::Minimal,
    name: "Minimal",
    description: "Low resource usage for gaming or older systems",
    requirements: "4-8GB VRAM",
    context_tokens: 8000,
    history_limit: 10,
    response_tokens: 500,
    recording_conversational_secs: 120,
    recording_command_secs: 30,
};

const STANDARD: ResourceProfile = ResourceProfile {
    kind: ProfileKind::Standard,
    name: "Standard",
    description: "Balanced performance for most users",
    requirements: "8-16GB VRAM",
    context_tokens: 16000,
    history_limit: 20,
    response_tokens: 1000,
    recording_conversational_secs: 300,
    recording_command_secs: 60,
};

const PERFORMANCE: ResourceProfile = ResourceProfile {
    kind: ProfileKind::Performance,
    name: "Performance",
    description: "Maximum capabilities for high-end systems",
    requirements: "16+ GB VRAM",
    context_tokens: 32000,
    history_limit: 50,
    response_tokens: 2000,
    recording_conversational_secs: 600,
    recording_command_secs: 120,
};

/// The three fixed profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    Minimal,
    Standard,
    Performance,
}

impl ProfileKind {
    /// All profiles in ascending capability order
    pub const ALL: [Self; 3] = [Self::Minimal, Self::Standard, Self::Performance];

    /// The limits for this profile
    #[must_use]
    pub const fn profile(self) -> &'static ResourceProfile {
        match self {
            Self::Minimal => &MINIMAL,
            Self::Standard => &STANDARD,
            Self::Performance => &PERFORMANCE,
        }
    }

    /// Canonical lowercase identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Standard => "standard",
            Self::Performance => "performance",
        }
    }

    /// Pick a profile for the given amount of available memory
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn for_memory_mb(available_mb: u64) -> Self {
        let gb = available_mb as f64 / 1024.0;
        if gb < 8.0 {
            Self::Minimal
        } else if gb < 16.0 {
            Self::Standard
        } else {
            Self::Performance
        }
    }

    /// Estimated memory the assistant uses under this profile (MB)
    const fn estimated_usage_mb(self) -> u64 {
        match self {
            Self::Minimal => 2000,
            Self::Standard => 4000,
            Self::Performance => 6000,
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = Error;

    /// Case-insensitive name or alias ("gaming", "max", ...)
    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        let kind = match name.as_str() {
            "minimal" | "gaming" | "game" | "low" => Self::Minimal,
            "standard" | "normal" | "balanced" | "default" => Self::Standard,
            "performance" | "fast" | "high" | "max" | "maximum" => Self::Performance,
            _ => return Err(Error::UnknownProfile(s.trim().to_string())),
        };
        Ok(kind)
    }
}

/// Memory usage snapshot, in MB
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryStatus {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f64,
}

/// Holds the active profile
///
/// Exactly one profile is active at a time. Callers read a copy of the
/// profile at the start of each capture or query, so a switch only affects
/// work that starts after it.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    current: ProfileKind,
    available_memory_mb: u64,
}

impl ResourceManager {
    /// Create a manager with an explicit profile and memory figure
    #[must_use]
    pub const fn new(current: ProfileKind, available_memory_mb: u64) -> Self {
        Self {
            current,
            available_memory_mb,
        }
    }

    /// Probe available memory and select a matching profile
    pub fn auto_select(probe: &dyn MemoryProbe) -> Self {
        let available = probe.detect_available_memory_mb();
        let kind = ProfileKind::for_memory_mb(available);

        tracing::info!(profile = %kind, available_mb = available, "auto-selected profile");

        Self::new(kind, available)
    }

    /// The active profile
    #[must_use]
    pub const fn current(&self) -> &'static ResourceProfile {
        self.current.profile()
    }

    /// Kind of the active profile
    #[must_use]
    pub const fn current_kind(&self) -> ProfileKind {
        self.current
    }

    /// Memory reported at selection time (MB)
    #[must_use]
    pub const fn available_memory_mb(&self) -> u64 {
        self.available_memory_mb
    }

    /// Switch to a profile by name or alias
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownProfile` and leaves the active profile
    /// untouched if the name is not recognized
    pub fn switch_profile(&mut self, name: &str) -> Result<&'static ResourceProfile> {
        let kind: ProfileKind = name.parse()?;
        let previous = self.current;
        self.current = kind;

        tracing::info!(from = %previous, to = %kind, "switched profile");
        Ok(kind.profile())
    }

    /// Estimated usage against available memory for the active profile
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn memory_status(&self) -> MemoryStatus {
        let used = self.current.estimated_usage_mb();
        let total = self.available_memory_mb + used;
        let percent = if total > 0 {
            used as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        MemoryStatus {
            total,
            used,
            available: self.available_memory_mb,
            percent,
        }
    }

    /// Spoken description of the active profile
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn profile_info(&self) -> String {
        let profile = self.current();
        let status = self.memory_status();

        format!(
            "Running in {} mode, using {:.1} gigabytes of {:.1} available. \
             Can maintain {} conversation exchanges and record up to {} minutes.",
            profile.name,
            status.used as f64 / 1024.0,
            status.total as f64 / 1024.0,
            profile.history_limit,
            profile.recording_conversational_secs / 60,
        )
    }

    /// Spoken listing of every profile, marking the active one
    #[must_use]
    pub fn list_profiles(&self) -> String {
        let entries: Vec<String> = ProfileKind::ALL
            .iter()
            .map(|&kind| {
                let profile = kind.profile();
                let marker = if kind == self.current { " (current)" } else { "" };
                format!("{}{marker}: {}", profile.name, profile.description)
            })
            .collect();

        format!("Available profiles: {}", entries.join(", "))
    }
}
