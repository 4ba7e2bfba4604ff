//! Event kinds and their static properties.
//!
//! The event table is data, loaded from TOML:
//!
//! ```toml
//! [[events]]
//! id = 1
//! name = "TookDamage"
//! chance_to_play = 0.6
//! min_time_between = 4.0
//! linked_events = [2]
//! roles = { recipient = 3, team_witness = 4 }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GudsError, Result};
use crate::selection::direction::Direction;
use crate::types::{ActionId, CoverDescriptor, Cover, EventId, SpeakerId, SpeakerRole};

/// How an event picks its action and speaker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Role-mapped actions, random role order.
    #[default]
    Normal,
    /// Bearing from instigator to target picks the action.
    Directional,
    /// The target's cover descriptor picks the action.
    LocationDescription,
}

/// Actions per speaking role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleActions {
    /// Spoken by the instigator.
    #[serde(default)]
    pub instigator: Option<ActionId>,
    /// Spoken by the recipient.
    #[serde(default)]
    pub recipient: Option<ActionId>,
    /// Spoken by a teammate of the instigator.
    #[serde(default)]
    pub team_witness: Option<ActionId>,
    /// Spoken by an enemy of the instigator.
    #[serde(default)]
    pub enemy_witness: Option<ActionId>,
}

impl RoleActions {
    /// Action for a role.
    #[must_use]
    pub fn get(&self, role: SpeakerRole) -> Option<ActionId> {
        match role {
            SpeakerRole::Instigator => self.instigator,
            SpeakerRole::Recipient => self.recipient,
            SpeakerRole::TeamWitness => self.team_witness,
            SpeakerRole::EnemyWitness => self.enemy_witness,
        }
    }

    /// Candidate `(role, action)` pairs. A forced role restricts the list to
    /// that role alone.
    #[must_use]
    pub fn candidates(&self, forced: Option<SpeakerRole>) -> Vec<(SpeakerRole, ActionId)> {
        let roles: &[SpeakerRole] = match forced {
            Some(ref role) => std::slice::from_ref(role),
            None => &[
                SpeakerRole::Instigator,
                SpeakerRole::Recipient,
                SpeakerRole::TeamWitness,
                SpeakerRole::EnemyWitness,
            ],
        };
        roles
            .iter()
            .filter_map(|r| self.get(*r).map(|a| (*r, a)))
            .collect()
    }
}

/// Actions per bearing class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionalActions {
    /// Target behind the instigator.
    #[serde(default)]
    pub behind: Option<ActionId>,
    /// Target above.
    #[serde(default)]
    pub above: Option<ActionId>,
    /// Target below.
    #[serde(default)]
    pub below: Option<ActionId>,
    /// Target to the left.
    #[serde(default)]
    pub left: Option<ActionId>,
    /// Target to the right.
    #[serde(default)]
    pub right: Option<ActionId>,
    /// Target straight ahead.
    #[serde(default)]
    pub ahead: Option<ActionId>,
}

impl DirectionalActions {
    /// Action for a bearing class.
    #[must_use]
    pub fn get(&self, direction: Direction) -> Option<ActionId> {
        match direction {
            Direction::Behind => self.behind,
            Direction::Above => self.above,
            Direction::Below => self.below,
            Direction::Left => self.left,
            Direction::Right => self.right,
            Direction::Ahead => self.ahead,
        }
    }
}

/// One cover descriptor mapped to an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverAction {
    /// Descriptor reported by the cover system.
    pub descriptor: CoverDescriptor,
    /// Action describing it.
    pub action: ActionId,
}

/// Actions for the location-description strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationActions {
    /// Target not in cover.
    #[serde(default)]
    pub in_the_open: Option<ActionId>,
    /// Target in cover with a known descriptor.
    #[serde(default)]
    pub cover: Vec<CoverAction>,
}

impl LocationActions {
    /// Action describing where an actor with `cover` is.
    #[must_use]
    pub fn for_cover(&self, cover: Cover) -> Option<ActionId> {
        match cover {
            Cover::Open => self.in_the_open,
            Cover::InCover(None) => None,
            Cover::InCover(Some(descriptor)) => self
                .cover
                .iter()
                .find(|c| c.descriptor == descriptor)
                .map(|c| c.action),
        }
    }
}

/// Static configuration of one event kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventProperties {
    /// Event id.
    pub id: EventId,
    /// Readable name, used by hooks and the debug surface.
    #[serde(default)]
    pub name: String,
    /// Selection strategy.
    #[serde(default)]
    pub strategy: SelectionStrategy,
    /// Role-mapped actions (normal strategy).
    #[serde(default)]
    pub roles: RoleActions,
    /// Bearing-mapped actions (directional strategy).
    #[serde(default)]
    pub directional: DirectionalActions,
    /// Cover-mapped actions (location strategy).
    #[serde(default)]
    pub location: LocationActions,
    /// Restrict the speaker to one role.
    #[serde(default)]
    pub forced_role: Option<SpeakerRole>,
    /// Seconds before this event may play again.
    #[serde(default)]
    pub min_time_between: f64,
    /// Chance to play in single player, 0..=1.
    #[serde(default = "default_chance")]
    pub chance_to_play: f32,
    /// Chance to play in multiplayer. Zero means use `chance_to_play`.
    #[serde(default)]
    pub chance_to_play_mp: f32,
    /// Witness search radius in world units.
    #[serde(default = "default_witness_distance")]
    pub max_witness_distance: f32,
    /// Delay before a witness speaks.
    #[serde(default = "default_observer_delay")]
    pub observer_delay: f64,
    /// Events whose cooldowns refresh together with this one.
    #[serde(default)]
    pub linked_events: Vec<EventId>,
}

impl EventProperties {
    /// Properties with defaults for `id`.
    #[must_use]
    pub fn new(id: EventId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            strategy: SelectionStrategy::Normal,
            roles: RoleActions::default(),
            directional: DirectionalActions::default(),
            location: LocationActions::default(),
            forced_role: None,
            min_time_between: 0.0,
            chance_to_play: default_chance(),
            chance_to_play_mp: 0.0,
            max_witness_distance: default_witness_distance(),
            observer_delay: default_observer_delay(),
            linked_events: Vec::new(),
        }
    }

    /// Chance to play, before the global multiplier.
    #[must_use]
    pub fn chance(&self, multiplayer: bool) -> f32 {
        if multiplayer && self.chance_to_play_mp > 0.0 {
            self.chance_to_play_mp
        } else {
            self.chance_to_play
        }
    }
}

#[derive(Deserialize)]
struct EventTableFile {
    #[serde(default)]
    events: Vec<EventProperties>,
}

/// All event kinds, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    events: BTreeMap<EventId, EventProperties>,
}

impl EventTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table from a TOML string.
    ///
    /// # Errors
    /// Returns `GudsError::Config` if the TOML is invalid or an id repeats.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let file: EventTableFile =
            toml::from_str(toml_str).map_err(|e| GudsError::Config(e.to_string()))?;
        let mut table = Self::new();
        for props in file.events {
            let id = props.id;
            if table.events.insert(id, props).is_some() {
                return Err(GudsError::Config(format!("duplicate {id}")));
            }
        }
        Ok(table)
    }

    /// Load a table from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Builder: add or replace an event.
    #[must_use]
    pub fn with_event(mut self, props: EventProperties) -> Self {
        self.events.insert(props.id, props);
        self
    }

    /// Properties of an event.
    #[must_use]
    pub fn get(&self, id: EventId) -> Option<&EventProperties> {
        self.events.get(&id)
    }

    /// Find an event by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&EventProperties> {
        self.events.values().find(|p| p.name == name)
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// One occurrence of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct GudEvent {
    /// Event kind.
    pub kind: EventId,
    /// Who caused it.
    pub instigator: Option<SpeakerId>,
    /// Who it happened to.
    pub recipient: Option<SpeakerId>,
    /// Who it is about.
    pub referenced: Option<SpeakerId>,
    /// Seconds to wait before resolving the event.
    pub delay: f64,
    /// Reply to a previous line. Replies ignore channel mutes.
    pub is_response: bool,
}

impl GudEvent {
    /// Event with no participants and no delay.
    #[must_use]
    pub fn new(kind: EventId) -> Self {
        Self {
            kind,
            instigator: None,
            recipient: None,
            referenced: None,
            delay: 0.0,
            is_response: false,
        }
    }

    /// Builder: instigator.
    #[must_use]
    pub fn instigated_by(mut self, id: SpeakerId) -> Self {
        self.instigator = Some(id);
        self
    }

    /// Builder: recipient.
    #[must_use]
    pub fn received_by(mut self, id: SpeakerId) -> Self {
        self.recipient = Some(id);
        self
    }

    /// Builder: referenced actor.
    #[must_use]
    pub fn referencing(mut self, id: SpeakerId) -> Self {
        self.referenced = Some(id);
        self
    }

    /// Builder: delay.
    #[must_use]
    pub fn delayed(mut self, secs: f64) -> Self {
        self.delay = secs;
        self
    }
}

fn default_chance() -> f32 { 1.0 }
fn default_witness_distance() -> f32 { 1024.0 }
fn default_observer_delay() -> f64 { 0.5 }
