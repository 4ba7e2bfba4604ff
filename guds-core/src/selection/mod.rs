//! Selection engine: event gating, speaker and action choice, line choice
//! and the exclusive-speech channel.
//!
//! Choosing is read-only: it sees the world through `&dyn DialogueWorld`
//! and the bank store by shared reference. Only [`SelectionEngine::play_line`]
//! touches the world mutably, to hand a line to the audio layer and record
//! it in the speaker's history.
//!
//! "No selection" is an ordinary outcome. Every failure along the way
//! (vanished speaker, missing bank, empty pool, muted channel) ends in
//! silence and a `debug!` line.

pub mod direction;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::bank::GudLine;
use crate::config::SelectionConfig;
use crate::events::{EventProperties, EventTable, GudEvent, SelectionStrategy};
use crate::metrics::GudsCounters;
use crate::store::BankStore;
use crate::types::{
    ActionId, EventId, GameTime, LineRole, SpeakerId, SpeakerKind, SpeakerRole, TeamId,
};
use crate::world::{self, DialogueWorld, SpeechPriority, SpeechRequest};

/// Speaker and action resolved for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Action to voice.
    pub action: ActionId,
    /// Who voices it.
    pub speaker: SpeakerId,
    /// Role the speaker was picked for.
    pub role: SpeakerRole,
}

/// A concrete line ready to be spoken.
#[derive(Debug, Clone, PartialEq)]
pub struct ChosenLine {
    /// Action the line belongs to.
    pub action: ActionId,
    /// Speaker.
    pub speaker: SpeakerId,
    /// Role the speaker was picked for, if chosen through an event.
    pub role: Option<SpeakerRole>,
    /// Index in the speaker's aggregate line table.
    pub line_index: usize,
    /// The line.
    pub line: GudLine,
    /// Actor the line is addressed to.
    pub addressee: Option<SpeakerId>,
    /// Actor the line talks about.
    pub referring_to: Option<SpeakerId>,
}

#[derive(Debug, Clone)]
struct QueuedEvent {
    event: GudEvent,
    due_at: GameTime,
}

/// Resolves gameplay events into spoken lines.
#[derive(Debug)]
pub struct SelectionEngine {
    config: SelectionConfig,
    events: EventTable,
    enabled: bool,
    authority: bool,
    last_played: HashMap<EventId, GameTime>,
    queue: VecDeque<QueuedEvent>,
    /// Muted-until time per team channel.
    channels: HashMap<TeamId, GameTime>,
    counters: Arc<GudsCounters>,
}

impl SelectionEngine {
    /// Engine over an event table.
    #[must_use]
    pub fn new(config: SelectionConfig, events: EventTable, counters: Arc<GudsCounters>) -> Self {
        Self {
            config,
            events,
            enabled: true,
            authority: true,
            last_played: HashMap::new(),
            queue: VecDeque::new(),
            channels: HashMap::new(),
            counters,
        }
    }

    /// Builder: whether this instance may trigger events. Clients never do.
    #[must_use]
    pub fn with_authority(mut self, authority: bool) -> Self {
        self.authority = authority;
        self
    }

    /// Turn the whole engine on or off.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.queue.clear();
        }
    }

    /// The event table.
    #[must_use]
    pub fn events(&self) -> &EventTable {
        &self.events
    }

    /// Selection settings.
    #[must_use]
    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// When an event last played.
    #[must_use]
    pub fn last_played(&self, kind: EventId) -> Option<GameTime> {
        self.last_played.get(&kind).copied()
    }

    /// Events accepted but not yet resolved.
    #[must_use]
    pub fn queued_events(&self) -> usize {
        self.queue.len()
    }

    // -----------------------------------------------------------------------
    // Speaker predicates
    // -----------------------------------------------------------------------

    /// Combat state used for line choice. Remote voices are never in combat;
    /// every pawn is in multiplayer.
    #[must_use]
    pub fn is_in_combat(&self, world: &dyn DialogueWorld, id: SpeakerId) -> bool {
        world.speaker(id).is_some_and(|s| match s.kind {
            SpeakerKind::Remote => false,
            SpeakerKind::Pawn => {
                world.is_multiplayer() || self.config.force_in_combat || s.in_combat
            }
        })
    }

    /// Whether the speaker's loaded bank can voice `action` right now.
    #[must_use]
    pub fn speaker_has_line(
        &self,
        store: &BankStore,
        world: &dyn DialogueWorld,
        id: SpeakerId,
        action: ActionId,
    ) -> bool {
        store
            .bank_for_speaker(world, id)
            .is_some_and(|bank| bank.has_line_for(action, self.is_in_combat(world, id)))
    }

    fn can_speak(
        &self,
        store: &BankStore,
        world: &dyn DialogueWorld,
        id: SpeakerId,
        action: ActionId,
        now: GameTime,
    ) -> bool {
        world::is_speaker_valid(world, id, now) && self.speaker_has_line(store, world, id, action)
    }

    // -----------------------------------------------------------------------
    // Gating
    // -----------------------------------------------------------------------

    /// Gate an event and queue it if accepted.
    ///
    /// Rejections (unknown kind, paused world, failed chance roll, replay
    /// interval not elapsed) drop the event.
    pub fn trigger_event<R: Rng + ?Sized>(
        &mut self,
        world: &dyn DialogueWorld,
        event: GudEvent,
        rng: &mut R,
        now: GameTime,
    ) -> bool {
        if !self.enabled || !self.authority {
            return false;
        }
        let Some(props) = self.events.get(event.kind) else {
            warn!(event = %event.kind, "unknown event triggered");
            GudsCounters::bump(&self.counters.events_rejected);
            return false;
        };
        if world.is_paused() {
            debug!(event = %event.kind, "event dropped, world paused");
            GudsCounters::bump(&self.counters.events_rejected);
            return false;
        }

        if !self.config.debug_events {
            let chance =
                props.chance(world.is_multiplayer()) * self.config.global_chance_multiplier;
            let roll: f32 = rng.gen_range(0.0..1.0);
            if roll >= chance {
                GudsCounters::bump(&self.counters.events_rejected);
                return false;
            }
            if let Some(last) = self.last_played.get(&event.kind) {
                if now.since(*last) < props.min_time_between {
                    debug!(event = %event.kind, "event dropped, replay interval");
                    GudsCounters::bump(&self.counters.events_rejected);
                    return false;
                }
            }
        }

        let due_at = now.after(event.delay.max(0.0));
        self.queue.push_back(QueuedEvent { event, due_at });
        GudsCounters::bump(&self.counters.events_triggered);
        true
    }

    /// Whether a team may start a line. Responses ignore channel mutes.
    #[must_use]
    pub fn is_ok_to_play(&self, team: TeamId, is_response: bool, now: GameTime) -> bool {
        if !self.enabled || self.config.global_chance_multiplier <= 0.0 {
            return false;
        }
        if is_response || self.config.exclusive.unfiltered_teams.contains(&team) {
            return true;
        }
        self.channels.get(&team).is_none_or(|until| now >= *until)
    }

    /// Mute a team's channel while a line of `duration` seconds plays from
    /// `start`. Overlapping and unfiltered teams are never muted.
    pub fn notify_exclusive_speech(
        &mut self,
        team: TeamId,
        start: GameTime,
        duration: f64,
        priority: SpeechPriority,
    ) {
        let cfg = &self.config.exclusive;
        if cfg.overlapping_teams.contains(&team) || cfg.unfiltered_teams.contains(&team) {
            return;
        }
        let extra = match priority {
            SpeechPriority::Guds => cfg.guds_extra_secs,
            SpeechPriority::Scripted | SpeechPriority::Critical => cfg.scripted_extra_secs,
        };
        let until = start.after(duration + extra);
        self.channels
            .entry(team)
            .and_modify(|t| {
                if until > *t {
                    *t = until;
                }
            })
            .or_insert(until);
    }

    // -----------------------------------------------------------------------
    // Choosing
    // -----------------------------------------------------------------------

    /// Resolve an event to a speaker and action, without speaking.
    pub fn choose_action<R: Rng + ?Sized>(
        &self,
        store: &BankStore,
        world: &dyn DialogueWorld,
        event: &GudEvent,
        rng: &mut R,
        now: GameTime,
    ) -> Option<Selection> {
        let props = self.events.get(event.kind)?;
        match props.strategy {
            SelectionStrategy::Normal => self.choose_normal(store, world, event, props, rng, now),
            SelectionStrategy::Directional => {
                self.choose_directional(store, world, event, props, rng, now)
            }
            SelectionStrategy::LocationDescription => {
                self.choose_location(store, world, event, props, rng, now)
            }
        }
    }

    /// Resolve an event all the way to a line, without speaking.
    pub fn choose<R: Rng + ?Sized>(
        &self,
        store: &BankStore,
        world: &dyn DialogueWorld,
        event: &GudEvent,
        rng: &mut R,
        now: GameTime,
    ) -> Option<ChosenLine> {
        let selection = self.choose_action(store, world, event, rng, now)?;
        let (line_index, line) =
            self.choose_line(store, world, selection.action, selection.speaker, rng)?;
        let addressee = match line.addressee {
            LineRole::Instigator => event.instigator,
            LineRole::Recipient => event.recipient,
            LineRole::Referenced | LineRole::None => None,
        };
        let referring_to = match line.referring_to {
            LineRole::Instigator => event.instigator,
            LineRole::Recipient => event.recipient,
            LineRole::Referenced => event.referenced,
            LineRole::None => None,
        };
        Some(ChosenLine {
            action: selection.action,
            speaker: selection.speaker,
            role: Some(selection.role),
            line_index,
            line,
            addressee,
            referring_to,
        })
    }

    /// Pick one line uniformly from the action's pool for the speaker's
    /// combat state.
    pub fn choose_line<R: Rng + ?Sized>(
        &self,
        store: &BankStore,
        world: &dyn DialogueWorld,
        action: ActionId,
        speaker: SpeakerId,
        rng: &mut R,
    ) -> Option<(usize, GudLine)> {
        let bank = store.bank_for_speaker(world, speaker)?;
        let pool = bank.line_pool(action, self.is_in_combat(world, speaker));
        let index = *pool.choose(rng)?;
        let line = bank.line(index)?.clone();
        Some((index, line))
    }

    fn choose_normal<R: Rng + ?Sized>(
        &self,
        store: &BankStore,
        world: &dyn DialogueWorld,
        event: &GudEvent,
        props: &EventProperties,
        rng: &mut R,
        now: GameTime,
    ) -> Option<Selection> {
        let mut candidates = props.roles.candidates(props.forced_role);
        while !candidates.is_empty() {
            let (role, action) = candidates.remove(rng.gen_range(0..candidates.len()));
            let speaker = match role {
                SpeakerRole::Instigator => event
                    .instigator
                    .filter(|id| self.can_speak(store, world, *id, action, now)),
                SpeakerRole::Recipient => event
                    .recipient
                    .filter(|id| self.can_speak(store, world, *id, action, now)),
                SpeakerRole::TeamWitness | SpeakerRole::EnemyWitness => {
                    self.find_witness(store, world, event, props, action, role, true, rng, now)
                }
            };
            if let Some(speaker) = speaker {
                return Some(Selection { action, speaker, role });
            }
        }
        None
    }

    fn choose_directional<R: Rng + ?Sized>(
        &self,
        store: &BankStore,
        world: &dyn DialogueWorld,
        event: &GudEvent,
        props: &EventProperties,
        rng: &mut R,
        now: GameTime,
    ) -> Option<Selection> {
        let instigator = world.speaker(event.instigator?)?;
        let target = world.speaker(event.recipient.or(event.referenced)?)?;
        let thresholds = &self.config.directional;
        let bearing = direction::classify(
            instigator.position,
            instigator.facing,
            target.position,
            thresholds,
        );
        let action = props.directional.get(bearing).or_else(|| {
            let flat = direction::classify_horizontal(
                instigator.position,
                instigator.facing,
                target.position,
                thresholds,
            );
            props.directional.get(flat)
        })?;
        self.resolve_forced(store, world, event, props, action, rng, now)
    }

    fn choose_location<R: Rng + ?Sized>(
        &self,
        store: &BankStore,
        world: &dyn DialogueWorld,
        event: &GudEvent,
        props: &EventProperties,
        rng: &mut R,
        now: GameTime,
    ) -> Option<Selection> {
        world.speaker(event.instigator?)?;
        let target = world.speaker(event.recipient.or(event.referenced)?)?;
        let action = props.location.for_cover(target.cover)?;
        self.resolve_forced(store, world, event, props, action, rng, now)
    }

    /// Speaker for a fixed action: the forced role, team witness by default.
    /// Remote voices are not candidates here.
    #[allow(clippy::too_many_arguments)]
    fn resolve_forced<R: Rng + ?Sized>(
        &self,
        store: &BankStore,
        world: &dyn DialogueWorld,
        event: &GudEvent,
        props: &EventProperties,
        action: ActionId,
        rng: &mut R,
        now: GameTime,
    ) -> Option<Selection> {
        let role = props.forced_role.unwrap_or(SpeakerRole::TeamWitness);
        let speaker = match role {
            SpeakerRole::Instigator => event
                .instigator
                .filter(|id| self.can_speak(store, world, *id, action, now)),
            SpeakerRole::Recipient => event
                .recipient
                .filter(|id| self.can_speak(store, world, *id, action, now)),
            SpeakerRole::TeamWitness | SpeakerRole::EnemyWitness => {
                self.find_witness(store, world, event, props, action, role, false, rng, now)
            }
        }?;
        Some(Selection { action, speaker, role })
    }

    /// Random onlooker that can voice `action`.
    ///
    /// Distance is measured from the instigator, else the recipient, else
    /// the local player, and skipped in multiplayer. Line of sight is traced
    /// from the same anchor. Team membership is judged against the
    /// instigator's team, team 0 when there is no instigator.
    #[allow(clippy::too_many_arguments)]
    fn find_witness<R: Rng + ?Sized>(
        &self,
        store: &BankStore,
        world: &dyn DialogueWorld,
        event: &GudEvent,
        props: &EventProperties,
        action: ActionId,
        role: SpeakerRole,
        include_remote: bool,
        rng: &mut R,
        now: GameTime,
    ) -> Option<SpeakerId> {
        let want_teammate = role == SpeakerRole::TeamWitness;
        let instigator_team = event
            .instigator
            .and_then(|id| world.speaker(id))
            .map_or(0, |s| s.team);
        let anchor = event
            .instigator
            .or(event.recipient)
            .or_else(|| world.local_player())
            .and_then(|id| world.speaker(id))
            .map(|s| s.position);
        let max_dist_sq = props.max_witness_distance * props.max_witness_distance;
        let multiplayer = world.is_multiplayer();

        let mut candidates: Vec<SpeakerId> = world
            .speaker_ids()
            .into_iter()
            .filter(|id| Some(*id) != event.instigator && Some(*id) != event.recipient)
            .filter(|id| {
                let Some(s) = world.speaker(*id) else {
                    return false;
                };
                if (s.team == instigator_team) != want_teammate {
                    return false;
                }
                if !world::is_speaker_valid(world, *id, now) {
                    return false;
                }
                match s.kind {
                    SpeakerKind::Remote => include_remote,
                    SpeakerKind::Pawn => {
                        if s.hidden {
                            return false;
                        }
                        match anchor {
                            Some(a) => {
                                (multiplayer || a.distance_squared(s.position) < max_dist_sq)
                                    && world.has_line_of_sight(a, s.position)
                            }
                            None => multiplayer,
                        }
                    }
                }
            })
            .collect();

        while !candidates.is_empty() {
            let id = candidates.remove(rng.gen_range(0..candidates.len()));
            if self.speaker_has_line(store, world, id, action) {
                return Some(id);
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Playing
    // -----------------------------------------------------------------------

    /// Resolve every queued event that has come due. Returns how many
    /// produced a line.
    pub fn process_due<R: Rng + ?Sized>(
        &mut self,
        store: &BankStore,
        world: &mut dyn DialogueWorld,
        rng: &mut R,
        now: GameTime,
    ) -> usize {
        if self.queue.is_empty() {
            return 0;
        }
        let (due, waiting): (Vec<QueuedEvent>, Vec<QueuedEvent>) =
            self.queue.drain(..).partition(|q| q.due_at <= now);
        self.queue = waiting.into();
        let mut played = 0;
        for queued in due {
            if self.handle_event(store, &mut *world, &queued.event, rng, now) {
                played += 1;
            }
        }
        played
    }

    fn handle_event<R: Rng + ?Sized>(
        &mut self,
        store: &BankStore,
        world: &mut dyn DialogueWorld,
        event: &GudEvent,
        rng: &mut R,
        now: GameTime,
    ) -> bool {
        let (observer_delay, linked) = match self.events.get(event.kind) {
            Some(p) => (p.observer_delay, p.linked_events.clone()),
            None => return false,
        };
        let Some(chosen) = self.choose(store, &*world, event, rng, now) else {
            debug!(event = %event.kind, "no selection");
            return false;
        };
        let Some(team) = world.speaker(chosen.speaker).map(|s| s.team) else {
            return false;
        };
        if !self.is_ok_to_play(team, event.is_response, now) {
            debug!(event = %event.kind, team, "channel muted");
            return false;
        }

        let delay = if chosen.role.is_some_and(SpeakerRole::is_witness) {
            observer_delay
        } else {
            0.0
        };
        if !self.play_line(world, &chosen, delay, SpeechPriority::Guds, rng, now) {
            return false;
        }
        self.last_played.insert(event.kind, now);
        for kind in linked {
            self.last_played.insert(kind, now);
        }
        true
    }

    /// Speak an action's line outside the event pipeline. No chance, replay
    /// interval or channel gating applies.
    #[allow(clippy::too_many_arguments)]
    pub fn play_action_directly<R: Rng + ?Sized>(
        &mut self,
        store: &BankStore,
        world: &mut dyn DialogueWorld,
        action: ActionId,
        speaker: SpeakerId,
        addressee: Option<SpeakerId>,
        referring_to: Option<SpeakerId>,
        rng: &mut R,
        now: GameTime,
    ) -> bool {
        let Some((line_index, line)) = self.choose_line(store, &*world, action, speaker, rng) else {
            debug!(action = %action, "no line for direct action");
            return false;
        };
        let chosen = ChosenLine {
            action,
            speaker,
            role: None,
            line_index,
            line,
            addressee,
            referring_to,
        };
        self.play_line(world, &chosen, 0.0, SpeechPriority::Guds, rng, now)
    }

    /// Hand a line to the audio layer.
    ///
    /// Refuses a line the speaker said within its repeat window. On success
    /// the line is recorded, the team channel is muted, and one of the
    /// line's response events is triggered once the line has finished.
    pub fn play_line<R: Rng + ?Sized>(
        &mut self,
        world: &mut dyn DialogueWorld,
        chosen: &ChosenLine,
        delay: f64,
        priority: SpeechPriority,
        rng: &mut R,
        now: GameTime,
    ) -> bool {
        let speaker = chosen.speaker;
        let audio_id = chosen.line.audio_id();
        let Some(team) = world.speaker(speaker).map(|s| s.team) else {
            debug!("speaker vanished before speaking");
            return false;
        };
        let repeated = audio_id.is_some_and(|id| {
            world
                .speaker(speaker)
                .is_some_and(|s| s.recently_said(id, now))
        });
        if repeated {
            debug!(line = audio_id.unwrap_or_default(), "line said too recently");
            return false;
        }

        let request = SpeechRequest {
            line: &chosen.line,
            addressee: chosen.addressee,
            delay,
            priority,
        };
        if !world.speak_line(speaker, &request) {
            return false;
        }
        let start = now.after(delay);
        if let Some(s) = world.speaker_mut(speaker) {
            s.record_line(audio_id, start);
        }
        GudsCounters::bump(&self.counters.lines_spoken);

        if let Some(audio) = &chosen.line.audio {
            self.notify_exclusive_speech(team, start, f64::from(audio.duration), priority);
        }

        if let Some(kind) = chosen.line.response_events.choose(rng).copied() {
            let after_line = match &chosen.line.audio {
                Some(audio) => f64::from(audio.duration) + self.config.response_padding_secs,
                None => self.config.response_fallback_secs,
            };
            let response = GudEvent {
                kind,
                instigator: Some(speaker),
                recipient: chosen.addressee,
                referenced: chosen.referring_to,
                delay: delay + after_line,
                is_response: true,
            };
            self.trigger_event(&*world, response, rng, now);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use vek::Vec3;

    use super::*;
    use crate::budget::MemoryBudget;
    use crate::loading::CompletionQueue;
    use crate::replication::LocalReplication;
    use crate::testing::{ScriptedLoader, TestWorld, marcus_catalog};
    use crate::types::{Cover, CoverDescriptor, Speaker};

    const EVENTS: &str = r#"
[[events]]
id = 1
name = "Greet"
min_time_between = 10.0
linked_events = [5]
roles = { instigator = 0 }

[[events]]
id = 2
name = "Never"
chance_to_play = 0.0
roles = { instigator = 0 }

[[events]]
id = 3
name = "CombatOnly"
roles = { instigator = 2 }

[[events]]
id = 4
name = "Question"
roles = { instigator = 3 }

[[events]]
id = 5
name = "GreetAgain"
min_time_between = 10.0
roles = { instigator = 0 }

[[events]]
id = 6
name = "Chatter"
roles = { instigator = 0 }

[[events]]
id = 7
name = "Reply"
forced_role = "recipient"
roles = { recipient = 0 }

[[events]]
id = 8
name = "Anyone"
roles = { instigator = 0, recipient = 0, team_witness = 0, enemy_witness = 0 }

[[events]]
id = 9
name = "WitnessOnly"
max_witness_distance = 100.0
roles = { team_witness = 0 }

[[events]]
id = 10
name = "WhereIsHe"
strategy = "directional"
forced_role = "instigator"
directional = { left = 0, ahead = 1 }

[[events]]
id = 11
name = "WhereInCover"
strategy = "location_description"
forced_role = "instigator"
location = { cover = [{ descriptor = "behind_car", action = 0 }] }
"#;

    struct Fixture {
        store: BankStore,
        loader: ScriptedLoader,
        world: TestWorld,
        engine: SelectionEngine,
        rng: StdRng,
    }

    impl Fixture {
        fn new() -> Self {
            let queue = CompletionQueue::new();
            let loader = ScriptedLoader::new(queue.clone());
            let counters = Arc::new(GudsCounters::new());
            let store = BankStore::new(
                Arc::new(marcus_catalog()),
                MemoryBudget::new(1_000_000),
                Box::new(loader.clone()),
                queue,
                Box::new(LocalReplication),
                Arc::clone(&counters),
            );
            let events = EventTable::from_toml(EVENTS).expect("events");
            Self {
                store,
                loader,
                world: TestWorld::default(),
                engine: SelectionEngine::new(SelectionConfig::default(), events, counters),
                rng: StdRng::seed_from_u64(11),
            }
        }

        fn speaker(&mut self, speaker: Speaker) -> SpeakerId {
            let id = self.world.spawn(speaker);
            self.store
                .register_speaker(&mut self.world, id, "Marcus", GameTime(0.0))
                .expect("register");
            while self.loader.complete_all() > 0 {
                self.store.process_completions(&mut self.world, GameTime(0.0));
            }
            id
        }

        fn trigger(&mut self, event: GudEvent, now: f64) -> bool {
            self.engine
                .trigger_event(&self.world, event, &mut self.rng, GameTime(now))
        }

        fn run(&mut self, now: f64) -> usize {
            self.engine
                .process_due(&self.store, &mut self.world, &mut self.rng, GameTime(now))
        }

        fn spoken(&self) -> Vec<String> {
            self.world
                .spoken
                .iter()
                .filter_map(|(_, line)| line.clone())
                .collect()
        }
    }

    #[test]
    fn zero_chance_never_selects() {
        let mut f = Fixture::new();
        let a = f.speaker(Speaker::new("a", 0));
        for i in 0..1000 {
            assert!(!f.trigger(GudEvent::new(EventId(2)).instigated_by(a), f64::from(i)));
        }
        assert_eq!(f.run(1000.0), 0);
        assert!(f.world.spoken.is_empty());
    }

    #[test]
    fn combat_only_action_is_silent_out_of_combat() {
        let mut f = Fixture::new();
        let a = f.speaker(Speaker::new("a", 0));
        let event = GudEvent::new(EventId(3)).instigated_by(a);
        assert!(f.engine.choose(&f.store, &f.world, &event, &mut f.rng, GameTime(0.0)).is_none());
        assert!(f.trigger(event, 0.0));
        assert_eq!(f.run(0.0), 0);

        f.world.speaker_mut(a).expect("a").in_combat = true;
        assert!(f.trigger(GudEvent::new(EventId(3)).instigated_by(a), 1.0));
        assert_eq!(f.run(1.0), 1);
        assert_eq!(f.spoken(), vec!["marcus_combat".to_string()]);
    }

    #[test]
    fn remote_voices_are_never_in_combat() {
        let mut f = Fixture::new();
        let mut radio = Speaker::new("radio", 0);
        radio.kind = SpeakerKind::Remote;
        radio.in_combat = true;
        let r = f.speaker(radio);
        let p = f.speaker(Speaker::new("p", 0));
        assert!(!f.engine.is_in_combat(&f.world, r));
        assert!(!f.engine.is_in_combat(&f.world, p));
        f.world.multiplayer = true;
        assert!(f.engine.is_in_combat(&f.world, p));
        assert!(!f.engine.is_in_combat(&f.world, r));
    }

    #[test]
    fn selection_is_reproducible_for_a_seed() {
        let run = || {
            let mut f = Fixture::new();
            let ids: Vec<SpeakerId> = (0..4)
                .map(|i| f.speaker(Speaker::new(format!("s{i}"), u8::from(i % 2 == 1))))
                .collect();
            let mut rng = StdRng::seed_from_u64(99);
            (0..50)
                .filter_map(|_| {
                    let event = GudEvent::new(EventId(8))
                        .instigated_by(ids[0])
                        .received_by(ids[1]);
                    f.engine
                        .choose(&f.store, &f.world, &event, &mut rng, GameTime(0.0))
                        .map(|c| (c.action, c.speaker, c.line_index))
                })
                .collect::<Vec<_>>()
        };
        let first = run();
        assert_eq!(first.len(), 50);
        assert_eq!(first, run());
    }

    #[test]
    fn response_fires_after_the_line() {
        let mut f = Fixture::new();
        let a = f.speaker(Speaker::new("a", 0));
        let b = f.speaker(Speaker::new("b", 0));
        assert!(f.trigger(GudEvent::new(EventId(4)).instigated_by(a).received_by(b), 0.0));
        assert_eq!(f.run(0.0), 1);
        assert_eq!(f.spoken(), vec!["marcus_question".to_string()]);
        // Question lasts 2.0 s, plus 0.5 s padding.
        assert_eq!(f.engine.queued_events(), 1);
        assert_eq!(f.run(2.0), 0);
        assert_eq!(f.run(2.5), 1);
        assert_eq!(f.world.spoken.last().map(|(s, _)| *s), Some(b));
    }

    #[test]
    fn linked_events_share_a_cooldown() {
        let mut f = Fixture::new();
        let a = f.speaker(Speaker::new("a", 0));
        assert!(f.trigger(GudEvent::new(EventId(1)).instigated_by(a), 0.0));
        assert_eq!(f.run(0.0), 1);
        assert_eq!(f.engine.last_played(EventId(5)), Some(GameTime(0.0)));
        assert!(!f.trigger(GudEvent::new(EventId(5)).instigated_by(a), 1.0));
        assert!(!f.trigger(GudEvent::new(EventId(1)).instigated_by(a), 9.0));
        assert!(f.trigger(GudEvent::new(EventId(5)).instigated_by(a), 11.0));
    }

    #[test]
    fn team_channel_mutes_until_line_ends() {
        let mut f = Fixture::new();
        let a = f.speaker(Speaker::new("a", 0));
        let b = f.speaker(Speaker::new("b", 0));
        assert!(f.trigger(GudEvent::new(EventId(6)).instigated_by(a), 0.0));
        assert_eq!(f.run(0.0), 1);
        // marcus_hello lasts 1.0 s, plus 0.5 s padding.
        assert!(!f.engine.is_ok_to_play(0, false, GameTime(1.0)));
        assert!(f.engine.is_ok_to_play(0, true, GameTime(1.0)));
        assert!(f.trigger(GudEvent::new(EventId(6)).instigated_by(b), 1.0));
        assert_eq!(f.run(1.0), 0);
        assert!(f.trigger(GudEvent::new(EventId(6)).instigated_by(b), 1.5));
        assert_eq!(f.run(1.5), 1);
    }

    #[test]
    fn overlapping_and_unfiltered_teams_never_mute() {
        let mut f = Fixture::new();
        f.engine
            .notify_exclusive_speech(1, GameTime(0.0), 5.0, SpeechPriority::Scripted);
        f.engine
            .notify_exclusive_speech(255, GameTime(0.0), 5.0, SpeechPriority::Scripted);
        assert!(f.engine.is_ok_to_play(1, false, GameTime(1.0)));
        assert!(f.engine.is_ok_to_play(255, false, GameTime(1.0)));
        f.engine
            .notify_exclusive_speech(0, GameTime(0.0), 5.0, SpeechPriority::Scripted);
        assert!(!f.engine.is_ok_to_play(0, false, GameTime(6.0)));
        assert!(f.engine.is_ok_to_play(0, false, GameTime(6.5)));
    }

    #[test]
    fn identical_line_refused_inside_repeat_window() {
        let mut f = Fixture::new();
        let mut speaker = Speaker::new("a", 0);
        speaker.line_repeat_min = 5.0;
        let a = f.speaker(speaker);
        assert!(f.trigger(GudEvent::new(EventId(6)).instigated_by(a), 0.0));
        assert_eq!(f.run(0.0), 1);
        assert!(f.trigger(GudEvent::new(EventId(6)).instigated_by(a), 3.0));
        assert_eq!(f.run(3.0), 0);
        assert!(f.trigger(GudEvent::new(EventId(6)).instigated_by(a), 5.5));
        assert_eq!(f.run(5.5), 1);
    }

    #[test]
    fn witness_needs_sight_distance_and_visibility() {
        let mut f = Fixture::new();
        let a = f.speaker(Speaker::new("a", 0));
        let near = f.speaker(Speaker::new("near", 0).at(Vec3::new(50.0, 0.0, 0.0)));
        f.speaker(Speaker::new("far", 0).at(Vec3::new(500.0, 0.0, 0.0)));
        f.speaker(Speaker::new("enemy", 1).at(Vec3::new(10.0, 0.0, 0.0)));
        let event = GudEvent::new(EventId(9)).instigated_by(a);

        let chosen = f.engine.choose_action(&f.store, &f.world, &event, &mut f.rng, GameTime(0.0));
        assert_eq!(chosen.map(|s| (s.speaker, s.role)), Some((near, SpeakerRole::TeamWitness)));

        f.world.blocked_sight = true;
        assert!(f.engine.choose_action(&f.store, &f.world, &event, &mut f.rng, GameTime(0.0)).is_none());
        f.world.blocked_sight = false;

        f.world.speaker_mut(near).expect("near").hidden = true;
        assert!(f.engine.choose_action(&f.store, &f.world, &event, &mut f.rng, GameTime(0.0)).is_none());

        // Multiplayer drops the distance check.
        f.world.multiplayer = true;
        assert!(f.engine.choose_action(&f.store, &f.world, &event, &mut f.rng, GameTime(0.0)).is_some());
    }

    #[test]
    fn witness_lines_wait_for_observer_delay() {
        let mut f = Fixture::new();
        let a = f.speaker(Speaker::new("a", 0));
        let w = f.speaker(Speaker::new("w", 0).at(Vec3::new(20.0, 0.0, 0.0)));
        assert!(f.trigger(GudEvent::new(EventId(9)).instigated_by(a), 0.0));
        assert_eq!(f.run(0.0), 1);
        let speaker = f.world.speaker(w).expect("w");
        assert_eq!(speaker.last_line_time, Some(GameTime(0.5)));
    }

    #[test]
    fn directional_falls_back_to_horizontal() {
        let mut f = Fixture::new();
        let a = f.speaker(Speaker::new("a", 0));
        let left = f.speaker(Speaker::new("left", 1).at(Vec3::new(0.0, 10.0, 0.0)));
        let high = f.speaker(Speaker::new("high", 1).at(Vec3::new(10.0, 0.0, 8.0)));

        let event = GudEvent::new(EventId(10)).instigated_by(a).received_by(left);
        let sel = f.engine.choose_action(&f.store, &f.world, &event, &mut f.rng, GameTime(0.0));
        assert_eq!(sel.map(|s| (s.action, s.speaker)), Some((ActionId(0), a)));

        // Above has no action, so the bearing falls back to ahead.
        let event = GudEvent::new(EventId(10)).instigated_by(a).referencing(high);
        let sel = f.engine.choose_action(&f.store, &f.world, &event, &mut f.rng, GameTime(0.0));
        assert_eq!(sel.map(|s| s.action), Some(ActionId(1)));
    }

    #[test]
    fn location_maps_cover_descriptor() {
        let mut f = Fixture::new();
        let a = f.speaker(Speaker::new("a", 0));
        let mut target = Speaker::new("t", 1);
        target.cover = Cover::InCover(Some(CoverDescriptor::BehindCar));
        let t = f.speaker(target);
        let event = GudEvent::new(EventId(11)).instigated_by(a).received_by(t);
        assert!(f.engine.choose_action(&f.store, &f.world, &event, &mut f.rng, GameTime(0.0)).is_some());

        f.world.speaker_mut(t).expect("t").cover = Cover::Open;
        assert!(f.engine.choose_action(&f.store, &f.world, &event, &mut f.rng, GameTime(0.0)).is_none());
    }

    #[test]
    fn vanished_and_paused_degrade_to_silence() {
        let mut f = Fixture::new();
        let a = f.speaker(Speaker::new("a", 0));
        f.world.paused = true;
        assert!(!f.trigger(GudEvent::new(EventId(6)).instigated_by(a), 0.0));
        f.world.paused = false;

        assert!(f.trigger(GudEvent::new(EventId(6)).instigated_by(a), 0.0));
        f.world.speakers.remove(a);
        assert_eq!(f.run(0.0), 0);
        assert!(!f.trigger(GudEvent::new(EventId(99)), 0.0));
    }

    #[test]
    fn direct_action_bypasses_gating() {
        let mut f = Fixture::new();
        let a = f.speaker(Speaker::new("a", 0));
        f.engine.notify_exclusive_speech(0, GameTime(0.0), 10.0, SpeechPriority::Critical);
        assert!(f.engine.play_action_directly(
            &f.store,
            &mut f.world,
            ActionId(0),
            a,
            None,
            None,
            &mut f.rng,
            GameTime(1.0),
        ));
        assert_eq!(f.spoken(), vec!["marcus_hello".to_string()]);
    }
}
