//! Platform profiles for the dialogue system.
//!
//! A profile picks the memory budget and scheduler cadence for the machine
//! the game runs on, on top of the base [`GudsConfig`].

use std::path::Path;

use guds_core::GudsConfig;
use guds_core::error::Result;
use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

// ---------------------------------------------------------------------------
// Platform Profiles
// ---------------------------------------------------------------------------

/// Target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformProfile {
    /// Fixed-memory console. Tight budget, slower rotation.
    Console,
    /// Desktop client.
    #[default]
    Desktop,
    /// Headless authority with no audio output.
    DedicatedServer,
}

impl PlatformProfile {
    /// Human-readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Console => "Console: 3 MiB dialogue budget",
            Self::Desktop => "Desktop: 16 MiB dialogue budget",
            Self::DedicatedServer => "Dedicated server: bank tables only, no variety streaming",
        }
    }

    /// Memory budget for resident banks.
    #[must_use]
    pub fn memory_budget_bytes(self) -> u64 {
        match self {
            Self::Console => 3 * MIB,
            Self::Desktop => 16 * MIB,
            Self::DedicatedServer => 64 * MIB,
        }
    }

    /// Seconds between scheduler passes.
    #[must_use]
    pub fn update_interval_secs(self) -> f64 {
        match self {
            Self::Console => 1.0,
            Self::Desktop | Self::DedicatedServer => 0.5,
        }
    }

    /// Whether variety banks stream. Servers only need roots to select.
    #[must_use]
    pub fn streams_varieties(self) -> bool {
        !matches!(self, Self::DedicatedServer)
    }

    /// Overwrite the profile-owned fields of `config`.
    pub fn apply(self, config: &mut GudsConfig) {
        config.streaming.memory_budget_bytes = self.memory_budget_bytes();
        config.streaming.update_interval_secs = self.update_interval_secs();
        config.streaming.enabled = config.streaming.enabled && self.streams_varieties();
    }
}

// ---------------------------------------------------------------------------
// Game Dialogue Configuration
// ---------------------------------------------------------------------------

/// Dialogue settings for one game instance.
#[derive(Debug, Clone)]
pub struct GameDialogueConfig {
    /// Base dialogue configuration, with the profile applied.
    pub guds: GudsConfig,
    /// Platform profile.
    pub profile: PlatformProfile,
    /// Whether this instance is a client mirroring a remote authority.
    pub remote_client: bool,
}

impl GameDialogueConfig {
    /// Defaults for a profile.
    #[must_use]
    pub fn for_profile(profile: PlatformProfile) -> Self {
        let mut guds = GudsConfig::default();
        profile.apply(&mut guds);
        Self {
            guds,
            profile,
            remote_client: false,
        }
    }

    /// Load a TOML file and apply the profile on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path, profile: PlatformProfile) -> Result<Self> {
        let mut guds = GudsConfig::from_file(path)?;
        profile.apply(&mut guds);
        Ok(Self {
            guds,
            profile,
            remote_client: false,
        })
    }

    /// Mark this instance as a client: it mirrors banks but never selects.
    #[must_use]
    pub fn as_remote_client(mut self) -> Self {
        self.remote_client = true;
        self.guds.general.authority = false;
        self
    }
}
