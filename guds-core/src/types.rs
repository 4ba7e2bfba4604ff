//! Core type definitions shared across the GUDS crates.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use vek::Vec3;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

slotmap::new_key_type! {
    /// Generation-checked handle to a speaker owned by the simulation.
    ///
    /// A handle whose speaker has been removed no longer resolves, which is
    /// how the dialogue system notices vanished speakers.
    pub struct SpeakerId;
}

/// Team number as reported by the simulation.
pub type TeamId = u8;

/// Identifier of a gameplay event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u16);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

/// Index of an action inside a bank's action table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub u16);

impl ActionId {
    /// Position in the action table.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action#{}", self.0)
    }
}

/// Opaque package identifier handed to the load service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(pub String);

impl LoadId {
    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a side asset (facial animation set) mounted on speakers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SideAssetId(pub String);

/// Slot of a bank collection: the root or one of the variety banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BankSlot {
    /// Index 0, always resident once loaded.
    Root,
    /// Variety bank, zero-based among the varieties.
    Variety(usize),
}

impl BankSlot {
    /// Flat slot index (root = 0, varieties from 1).
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Root => 0,
            Self::Variety(v) => v + 1,
        }
    }

    /// Inverse of [`BankSlot::index`].
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Root,
            n => Self::Variety(n - 1),
        }
    }
}

impl fmt::Display for BankSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::Variety(v) => write!(f, "variety {v}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// World time in seconds, supplied by the simulation on every call.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct GameTime(pub f64);

impl GameTime {
    /// Seconds since world start.
    #[must_use]
    pub fn seconds(self) -> f64 {
        self.0
    }

    /// Seconds elapsed since `earlier` (negative if `earlier` is later).
    #[must_use]
    pub fn since(self, earlier: GameTime) -> f64 {
        self.0 - earlier.0
    }

    /// This time shifted forward by `secs`.
    #[must_use]
    pub fn after(self, secs: f64) -> GameTime {
        GameTime(self.0 + secs)
    }
}

// ---------------------------------------------------------------------------
// Roles and world descriptors
// ---------------------------------------------------------------------------

/// Who speaks for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    /// The actor that caused the event.
    Instigator,
    /// The actor the event happened to.
    Recipient,
    /// A nearby teammate of the instigator.
    TeamWitness,
    /// A nearby enemy of the instigator.
    EnemyWitness,
}

impl SpeakerRole {
    /// Whether lines for this role are spoken by an onlooker.
    #[must_use]
    pub fn is_witness(self) -> bool {
        matches!(self, Self::TeamWitness | Self::EnemyWitness)
    }
}

/// Participant of an event a line refers to or is addressed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineRole {
    /// Nobody in particular.
    #[default]
    None,
    /// The event instigator.
    Instigator,
    /// The event recipient.
    Recipient,
    /// The event's referenced actor.
    Referenced,
}

/// Location descriptor computed by the cover system for a cover slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverDescriptor {
    /// In a window.
    InWindow,
    /// In a doorway.
    InDoorway,
    /// Behind a car.
    BehindCar,
    /// Behind a truck.
    BehindTruck,
    /// On a truck.
    OnTruck,
    /// Behind a barrier.
    BehindBarrier,
    /// Behind a column.
    BehindColumn,
    /// Behind a crate.
    BehindCrate,
    /// Behind a wall.
    BehindWall,
    /// Behind a statue.
    BehindStatue,
    /// Behind sandbags.
    BehindSandbags,
}

/// Cover state of an actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cover {
    /// Not in cover.
    #[default]
    Open,
    /// In cover; the descriptor may be unknown.
    InCover(Option<CoverDescriptor>),
}

/// Speaker flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerKind {
    /// A pawn in the world.
    #[default]
    Pawn,
    /// A disembodied voice (radio contact). Never in combat, no position.
    Remote,
}

// ---------------------------------------------------------------------------
// Speaker
// ---------------------------------------------------------------------------

/// Dialogue-facing state of an actor owned by the simulation.
///
/// The dialogue system only ever reaches a speaker through its
/// [`SpeakerId`]; it never keeps one alive.
#[derive(Debug, Clone)]
pub struct Speaker {
    /// Display name, used by the debug surface.
    pub name: String,
    /// Pawn or remote voice.
    pub kind: SpeakerKind,
    /// Team number.
    pub team: TeamId,
    /// World position.
    pub position: Vec3<f32>,
    /// Look or aim direction (unit length).
    pub facing: Vec3<f32>,
    /// Alive or downed-but-not-out.
    pub alive: bool,
    /// Hidden actors are not witnesses.
    pub hidden: bool,
    /// Muted speakers never talk.
    pub muted: bool,
    /// Controlled by a local human player.
    pub locally_controlled: bool,
    /// Combat flag reported by the controller.
    pub in_combat: bool,
    /// Current cover state.
    pub cover: Cover,
    /// Candidate bank names for this character archetype.
    pub bank_pool: Vec<String>,
    /// Bank the speaker is registered against.
    pub bound_bank: Option<String>,
    /// Minimum seconds between any two lines from this speaker.
    pub min_time_between_lines: f64,
    /// Minimum seconds before this speaker repeats an identical line.
    pub line_repeat_min: f64,
    /// When the speaker last spoke.
    pub last_line_time: Option<GameTime>,
    /// Recently spoken audio ids and when.
    pub line_history: HashMap<String, GameTime>,
    /// Side assets currently mounted on this speaker.
    pub mounted_side_assets: BTreeSet<SideAssetId>,
}

impl Speaker {
    /// A live pawn on `team` at the origin facing +X.
    #[must_use]
    pub fn new(name: impl Into<String>, team: TeamId) -> Self {
        Self {
            name: name.into(),
            kind: SpeakerKind::Pawn,
            team,
            position: Vec3::zero(),
            facing: Vec3::unit_x(),
            alive: true,
            hidden: false,
            muted: false,
            locally_controlled: false,
            in_combat: false,
            cover: Cover::Open,
            bank_pool: Vec::new(),
            bound_bank: None,
            min_time_between_lines: 0.0,
            line_repeat_min: 0.0,
            last_line_time: None,
            line_history: HashMap::new(),
            mounted_side_assets: BTreeSet::new(),
        }
    }

    /// Builder: set position.
    #[must_use]
    pub fn at(mut self, position: Vec3<f32>) -> Self {
        self.position = position;
        self
    }

    /// Builder: set the candidate bank names.
    #[must_use]
    pub fn with_banks<I, S>(mut self, banks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bank_pool = banks.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the speaker said `audio_id` within its repeat window.
    #[must_use]
    pub fn recently_said(&self, audio_id: &str, now: GameTime) -> bool {
        self.line_history
            .get(audio_id)
            .is_some_and(|at| now.since(*at) <= self.line_repeat_min)
    }

    /// Record a spoken line, dropping history older than the repeat window.
    pub fn record_line(&mut self, audio_id: Option<&str>, now: GameTime) {
        self.last_line_time = Some(now);
        let window = self.line_repeat_min;
        self.line_history.retain(|_, at| now.since(*at) <= window);
        if let Some(id) = audio_id {
            self.line_history.insert(id.to_string(), now);
        }
    }
}
