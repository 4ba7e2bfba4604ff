//! Speaker arena: the simulation side of the dialogue world.
//!
//! Speakers live in a generation-checked [`SlotMap`]; a handle to a removed
//! speaker never resolves again, even after its slot is reused. Line of
//! sight is traced against spherical occluders, which is enough for a
//! headless server and for tests.

use guds_core::types::{Speaker, SpeakerId};
use guds_core::world::{DialogueWorld, SpeechPriority, SpeechRequest};
use slotmap::SlotMap;
use tracing::debug;
use vek::Vec3;

/// A sphere that blocks line of sight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occluder {
    /// Centre.
    pub center: Vec3<f32>,
    /// Radius.
    pub radius: f32,
}

impl Occluder {
    /// Build an occluder.
    #[must_use]
    pub fn new(center: Vec3<f32>, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Whether the segment `from..to` passes through the sphere.
    #[must_use]
    pub fn blocks(&self, from: Vec3<f32>, to: Vec3<f32>) -> bool {
        let seg = to - from;
        let len_sq = seg.magnitude_squared();
        let t = if len_sq > f32::EPSILON {
            ((self.center - from).dot(seg) / len_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let closest = from + seg * t;
        (self.center - closest).magnitude_squared() < self.radius * self.radius
    }
}

/// A line the audio layer was asked to play.
#[derive(Debug, Clone, PartialEq)]
pub struct SpokenLine {
    /// Who spoke.
    pub speaker: SpeakerId,
    /// Audio cue, if the line had one.
    pub audio_id: Option<String>,
    /// Who it was addressed to.
    pub addressee: Option<SpeakerId>,
    /// Start delay in seconds.
    pub delay: f64,
    /// Request priority.
    pub priority: SpeechPriority,
}

/// Arena of speakers plus the bits of world state dialogue reads.
#[derive(Debug, Default)]
pub struct SpeakerArena {
    speakers: SlotMap<SpeakerId, Speaker>,
    occluders: Vec<Occluder>,
    paused: bool,
    multiplayer: bool,
    local_player: Option<SpeakerId>,
    spoken: Vec<SpokenLine>,
}

impl SpeakerArena {
    /// Empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a speaker.
    pub fn spawn(&mut self, speaker: Speaker) -> SpeakerId {
        let name = speaker.name.clone();
        let id = self.speakers.insert(speaker);
        debug!(speaker = %name, "speaker spawned");
        id
    }

    /// Remove a speaker. Its handle goes stale immediately; the dialogue
    /// manager notices on its next scheduler pass.
    pub fn despawn(&mut self, id: SpeakerId) -> Option<Speaker> {
        if self.local_player == Some(id) {
            self.local_player = None;
        }
        self.speakers.remove(id)
    }

    /// Resolve a handle.
    #[must_use]
    pub fn get(&self, id: SpeakerId) -> Option<&Speaker> {
        self.speakers.get(id)
    }

    /// Resolve a handle mutably.
    pub fn get_mut(&mut self, id: SpeakerId) -> Option<&mut Speaker> {
        self.speakers.get_mut(id)
    }

    /// Number of live speakers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    /// Whether the arena has no speakers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    /// Add a line-of-sight occluder.
    pub fn add_occluder(&mut self, occluder: Occluder) {
        self.occluders.push(occluder);
    }

    /// Pause or resume.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Mark the session as multiplayer.
    pub fn set_multiplayer(&mut self, multiplayer: bool) {
        self.multiplayer = multiplayer;
    }

    /// Set the locally controlled player.
    pub fn set_local_player(&mut self, id: Option<SpeakerId>) {
        self.local_player = id;
    }

    /// Lines requested so far.
    #[must_use]
    pub fn spoken(&self) -> &[SpokenLine] {
        &self.spoken
    }

    /// Take and clear the spoken log.
    pub fn take_spoken(&mut self) -> Vec<SpokenLine> {
        std::mem::take(&mut self.spoken)
    }
}

impl DialogueWorld for SpeakerArena {
    fn speaker(&self, id: SpeakerId) -> Option<&Speaker> {
        self.speakers.get(id)
    }

    fn speaker_mut(&mut self, id: SpeakerId) -> Option<&mut Speaker> {
        self.speakers.get_mut(id)
    }

    fn speaker_ids(&self) -> Vec<SpeakerId> {
        self.speakers.keys().collect()
    }

    fn has_line_of_sight(&self, from: Vec3<f32>, to: Vec3<f32>) -> bool {
        !self.occluders.iter().any(|o| o.blocks(from, to))
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn is_multiplayer(&self) -> bool {
        self.multiplayer
    }

    fn local_player(&self) -> Option<SpeakerId> {
        self.local_player
    }

    fn speak_line(&mut self, speaker: SpeakerId, request: &SpeechRequest<'_>) -> bool {
        if !self.speakers.contains_key(speaker) {
            return false;
        }
        self.spoken.push(SpokenLine {
            speaker,
            audio_id: request.line.audio_id().map(str::to_string),
            addressee: request.addressee,
            delay: request.delay,
            priority: request.priority,
        });
        true
    }
}
