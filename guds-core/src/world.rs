//! Boundary to the surrounding simulation.
//!
//! Speakers, positions, pause state and audio playback belong to the game.
//! The dialogue system reaches them only through [`DialogueWorld`], passed in
//! on every call that needs it.

use vek::Vec3;

use crate::bank::GudLine;
use crate::types::{GameTime, SideAssetId, Speaker, SpeakerId};

/// Priority of a speech request, used by the exclusive-speech channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SpeechPriority {
    /// Unscripted chatter.
    Guds,
    /// Scripted dialogue.
    Scripted,
    /// Critical story lines.
    Critical,
}

/// A line handed to the audio layer.
#[derive(Debug, Clone)]
pub struct SpeechRequest<'a> {
    /// Line to speak.
    pub line: &'a GudLine,
    /// Who the line is addressed to.
    pub addressee: Option<SpeakerId>,
    /// Seconds to wait before speaking.
    pub delay: f64,
    /// Request priority.
    pub priority: SpeechPriority,
}

/// Simulation services the dialogue system consumes.
pub trait DialogueWorld {
    /// Resolve a speaker handle. Stale handles resolve to `None`.
    fn speaker(&self, id: SpeakerId) -> Option<&Speaker>;

    /// Resolve a speaker handle mutably.
    fn speaker_mut(&mut self, id: SpeakerId) -> Option<&mut Speaker>;

    /// All live speakers, in a stable order.
    fn speaker_ids(&self) -> Vec<SpeakerId>;

    /// Line-of-sight trace between two points.
    fn has_line_of_sight(&self, from: Vec3<f32>, to: Vec3<f32>) -> bool {
        let _ = (from, to);
        true
    }

    /// Whether the game is paused.
    fn is_paused(&self) -> bool {
        false
    }

    /// Whether this is a multiplayer session.
    fn is_multiplayer(&self) -> bool {
        false
    }

    /// The locally controlled player, if any.
    fn local_player(&self) -> Option<SpeakerId> {
        None
    }

    /// Hand a line to the audio layer. Returns whether it will be spoken.
    fn speak_line(&mut self, speaker: SpeakerId, request: &SpeechRequest<'_>) -> bool;
}

/// Alive, not muted, and past its personal cooldown.
#[must_use]
pub fn is_speaker_valid(world: &dyn DialogueWorld, id: SpeakerId, now: GameTime) -> bool {
    world.speaker(id).is_some_and(|s| {
        s.alive
            && !s.muted
            && s
                .last_line_time
                .is_none_or(|at| now.since(at) > s.min_time_between_lines)
    })
}

/// Mount a side asset on a speaker. Mounting twice is a no-op.
///
/// Returns whether the asset was newly mounted.
pub fn mount_side_asset(world: &mut dyn DialogueWorld, id: SpeakerId, asset: &SideAssetId) -> bool {
    world
        .speaker_mut(id)
        .is_some_and(|s| s.mounted_side_assets.insert(asset.clone()))
}

/// Unmount a side asset from a speaker.
pub fn unmount_side_asset(
    world: &mut dyn DialogueWorld,
    id: SpeakerId,
    asset: &SideAssetId,
) -> bool {
    world
        .speaker_mut(id)
        .is_some_and(|s| s.mounted_side_assets.remove(asset))
}
