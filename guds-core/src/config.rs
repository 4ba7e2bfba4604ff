//! Configuration for the GUDS dialogue system.
//!
//! Maps directly to `guds.toml`. Every field has a default, so an empty
//! document is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::types::TeamId;

/// Top-level GUDS configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GudsConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Bank streaming and memory budget.
    #[serde(default)]
    pub streaming: StreamingConfig,
    /// Event gating and line selection.
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Priority tiers used to rank bank collections.
    #[serde(default)]
    pub priority: PriorityConfig,
}

impl GudsConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `GudsError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::GudsError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether unscripted dialogue is enabled at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json_logs: bool,
    /// Fixed RNG seed. `None` seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Whether this instance is the authority (server or standalone).
    /// Non-authoritative instances never trigger events.
    #[serde(default = "default_true")]
    pub authority: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: default_log_level(),
            json_logs: false,
            seed: None,
            authority: true,
        }
    }
}

/// Bank streaming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Whether variety banks stream at all. Roots load regardless.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Memory budget for resident banks, in bytes.
    #[serde(default = "default_budget")]
    pub memory_budget_bytes: u64,
    /// Seconds between scheduler passes.
    #[serde(default = "default_1_0")]
    pub update_interval_secs: f64,
    /// Hard cap of varieties per collection.
    #[serde(default = "default_variety_cap")]
    pub variety_bank_cap: usize,
    /// Seconds an orphaned collection survives before it is flushed.
    #[serde(default = "default_30_0")]
    pub orphan_grace_secs: f64,
    /// Seconds between forced variety swaps.
    #[serde(default = "default_60_0")]
    pub variety_swap_interval_secs: f64,
    /// How far above its share a collection may sit before shedding.
    #[serde(default = "default_rebalance_slack")]
    pub rebalance_slack: usize,
    /// Registrations before this world time are deferred to the first tick
    /// after it. Zero disables deferral.
    #[serde(default)]
    pub registration_defer_secs: f64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            memory_budget_bytes: default_budget(),
            update_interval_secs: 1.0,
            variety_bank_cap: default_variety_cap(),
            orphan_grace_secs: 30.0,
            variety_swap_interval_secs: 60.0,
            rebalance_slack: default_rebalance_slack(),
            registration_defer_secs: 0.0,
        }
    }
}

/// Event gating and line selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Scales every event's chance to play. Zero silences all events.
    #[serde(default = "default_1_0_f32")]
    pub global_chance_multiplier: f32,
    /// Treat every pawn as in combat.
    #[serde(default)]
    pub force_in_combat: bool,
    /// Skip chance and interval gating.
    #[serde(default)]
    pub debug_events: bool,
    /// Added to a line's duration before its response fires.
    #[serde(default = "default_0_5")]
    pub response_padding_secs: f64,
    /// Response delay when the line has no audio.
    #[serde(default = "default_2_0")]
    pub response_fallback_secs: f64,
    /// Facing-relative bearing thresholds.
    #[serde(default)]
    pub directional: DirectionalConfig,
    /// Team channel muting.
    #[serde(default)]
    pub exclusive: ExclusiveSpeechConfig,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            global_chance_multiplier: 1.0,
            force_in_combat: false,
            debug_events: false,
            response_padding_secs: 0.5,
            response_fallback_secs: 2.0,
            directional: DirectionalConfig::default(),
            exclusive: ExclusiveSpeechConfig::default(),
        }
    }
}

/// Thresholds of the directional classifier (dot products and sines).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DirectionalConfig {
    /// Horizontal dot below which the target is behind (about 120 degrees).
    #[serde(default = "default_behind_dot")]
    pub behind_dot: f32,
    /// Vertical sine above which the target is above or below.
    #[serde(default = "default_vertical_sin")]
    pub vertical_sin: f32,
    /// Horizontal dot above which the target is straight ahead.
    #[serde(default = "default_ahead_dot")]
    pub ahead_dot: f32,
}

impl Default for DirectionalConfig {
    fn default() -> Self {
        Self {
            behind_dot: default_behind_dot(),
            vertical_sin: default_vertical_sin(),
            ahead_dot: default_ahead_dot(),
        }
    }
}

/// Exclusive-speech channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusiveSpeechConfig {
    /// Mute padding after an unscripted line.
    #[serde(default = "default_0_5")]
    pub guds_extra_secs: f64,
    /// Mute padding after a scripted or critical line.
    #[serde(default = "default_1_5")]
    pub scripted_extra_secs: f64,
    /// Teams whose chatter may overlap; they never mute their channel.
    #[serde(default = "default_overlapping_teams")]
    pub overlapping_teams: Vec<TeamId>,
    /// Teams that are never gated by a channel.
    #[serde(default = "default_unfiltered_teams")]
    pub unfiltered_teams: Vec<TeamId>,
}

impl Default for ExclusiveSpeechConfig {
    fn default() -> Self {
        Self {
            guds_extra_secs: 0.5,
            scripted_extra_secs: 1.5,
            overlapping_teams: default_overlapping_teams(),
            unfiltered_teams: default_unfiltered_teams(),
        }
    }
}

/// Priority tier assignment for collection ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityConfig {
    /// Teams ranked above everyone except the local player.
    #[serde(default = "default_primary_teams")]
    pub primary_teams: Vec<TeamId>,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            primary_teams: default_primary_teams(),
        }
    }
}

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_budget() -> u64 { 4 * 1024 * 1024 }
fn default_variety_cap() -> usize { 6 }
fn default_rebalance_slack() -> usize { 3 }
fn default_behind_dot() -> f32 { -0.5 }
fn default_vertical_sin() -> f32 { 0.25 }
fn default_ahead_dot() -> f32 { 0.94 }
fn default_overlapping_teams() -> Vec<TeamId> { vec![1] }
fn default_unfiltered_teams() -> Vec<TeamId> { vec![255] }
fn default_primary_teams() -> Vec<TeamId> { vec![0, 255] }
fn default_0_5() -> f64 { 0.5 }
fn default_1_0() -> f64 { 1.0 }
fn default_1_0_f32() -> f32 { 1.0 }
fn default_1_5() -> f64 { 1.5 }
fn default_2_0() -> f64 { 2.0 }
fn default_30_0() -> f64 { 30.0 }
fn default_60_0() -> f64 { 60.0 }
