//! Gameplay hooks.
//!
//! Combat, movement and perception code report occurrences by name; the
//! hooks resolve the name against the event table once and build a
//! [`GudEvent`] with the right roles filled in. Occurrences with no event in
//! the loaded table produce nothing.

use std::collections::HashMap;

use guds_core::events::{EventTable, GudEvent};
use guds_core::types::{EventId, SpeakerId};

/// Names of the occurrences the hooks below report.
pub mod names {
    /// A speaker took damage.
    pub const TOOK_DAMAGE: &str = "TookDamage";
    /// A speaker killed an enemy.
    pub const KILLED_ENEMY: &str = "KilledEnemy";
    /// A teammate went down.
    pub const TEAMMATE_DOWN: &str = "TeammateDown";
    /// A speaker is reloading.
    pub const RELOADING: &str = "Reloading";
    /// An enemy was spotted; the event picks a direction-aware callout.
    pub const ENEMY_SPOTTED: &str = "EnemySpotted";
    /// An enemy took cover; the event describes where.
    pub const ENEMY_IN_COVER: &str = "EnemyInCover";
    /// Idle chatter between teammates.
    pub const IDLE_CHATTER: &str = "IdleChatter";

    pub(super) const ALL: [&str; 7] = [
        TOOK_DAMAGE,
        KILLED_ENEMY,
        TEAMMATE_DOWN,
        RELOADING,
        ENEMY_SPOTTED,
        ENEMY_IN_COVER,
        IDLE_CHATTER,
    ];
}

/// Occurrence name to event id.
#[derive(Debug, Clone, Default)]
pub struct GameplayHooks {
    events: HashMap<String, EventId>,
}

impl GameplayHooks {
    /// Resolve the built-in occurrence names against `table`.
    #[must_use]
    pub fn new(table: &EventTable) -> Self {
        let events = names::ALL
            .iter()
            .filter_map(|name| table.by_name(name).map(|p| ((*name).to_string(), p.id)))
            .collect();
        Self { events }
    }

    /// Also resolve a game-specific occurrence name.
    #[must_use]
    pub fn with_occurrence(mut self, table: &EventTable, name: &str) -> Self {
        if let Some(p) = table.by_name(name) {
            self.events.insert(name.to_string(), p.id);
        }
        self
    }

    /// Event id for an occurrence.
    #[must_use]
    pub fn event(&self, name: &str) -> Option<EventId> {
        self.events.get(name).copied()
    }

    /// Build an event for any occurrence.
    #[must_use]
    pub fn occurrence(
        &self,
        name: &str,
        instigator: Option<SpeakerId>,
        recipient: Option<SpeakerId>,
        referenced: Option<SpeakerId>,
    ) -> Option<GudEvent> {
        let kind = self.event(name)?;
        Some(GudEvent {
            instigator,
            recipient,
            referenced,
            ..GudEvent::new(kind)
        })
    }

    /// `victim` was hit by `attacker`.
    #[must_use]
    pub fn on_damaged(&self, attacker: SpeakerId, victim: SpeakerId) -> Option<GudEvent> {
        self.occurrence(names::TOOK_DAMAGE, Some(attacker), Some(victim), None)
    }

    /// `killer` finished off `victim`.
    #[must_use]
    pub fn on_kill(&self, killer: SpeakerId, victim: SpeakerId) -> Option<GudEvent> {
        self.occurrence(names::KILLED_ENEMY, Some(killer), Some(victim), None)
    }

    /// `downed` went down; `by` is the attacker if known.
    #[must_use]
    pub fn on_teammate_down(&self, downed: SpeakerId, by: Option<SpeakerId>) -> Option<GudEvent> {
        self.occurrence(names::TEAMMATE_DOWN, by, Some(downed), None)
    }

    /// `who` started reloading.
    #[must_use]
    pub fn on_reload(&self, who: SpeakerId) -> Option<GudEvent> {
        self.occurrence(names::RELOADING, Some(who), None, None)
    }

    /// `spotter` saw `enemy`.
    #[must_use]
    pub fn on_enemy_spotted(&self, spotter: SpeakerId, enemy: SpeakerId) -> Option<GudEvent> {
        self.occurrence(names::ENEMY_SPOTTED, Some(spotter), None, Some(enemy))
    }

    /// `enemy` took cover while `observer` watched.
    #[must_use]
    pub fn on_enemy_in_cover(&self, observer: SpeakerId, enemy: SpeakerId) -> Option<GudEvent> {
        self.occurrence(names::ENEMY_IN_COVER, Some(observer), Some(enemy), None)
    }

    /// `talker` has nothing to do; `listener` may reply.
    #[must_use]
    pub fn on_idle(&self, talker: SpeakerId, listener: Option<SpeakerId>) -> Option<GudEvent> {
        self.occurrence(names::IDLE_CHATTER, Some(talker), listener, None)
    }
}
