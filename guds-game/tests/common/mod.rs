//! Shared session harness for the integration tests.

#![allow(dead_code)]

use guds_core::bank::{AudioCue, BankData, GudAction, GudLine};
use guds_core::catalog::{BankDescriptor, Catalog, CatalogEntry};
use guds_core::config::GudsConfig;
use guds_core::events::EventTable;
use guds_core::loading::CompletionQueue;
use guds_core::scheduler::TickReport;
use guds_core::types::{EventId, GameTime, LineRole, LoadId, Speaker, SpeakerId};
use guds_core::DialogueManager;
use guds_game::{NetReplication, SpeakerArena};
use guds_loader::InMemoryLoadService;

pub const EVENTS: &str = r#"
[[events]]
id = 1
name = "Greet"
roles = { instigator = 0 }

[[events]]
id = 2
name = "Never"
chance_to_play = 0.0
roles = { instigator = 0 }

[[events]]
id = 3
name = "CombatOnly"
roles = { instigator = 1 }

[[events]]
id = 4
name = "Reply"
forced_role = "recipient"
roles = { recipient = 0 }

[[events]]
id = 5
name = "Question"
roles = { instigator = 2 }

[[events]]
id = 6
name = "Chatter"
roles = { instigator = 0, recipient = 0, team_witness = 0 }
"#;

pub const GREET: EventId = EventId(1);
pub const NEVER: EventId = EventId(2);
pub const COMBAT_ONLY: EventId = EventId(3);
pub const QUESTION: EventId = EventId(5);
pub const CHATTER: EventId = EventId(6);

/// A bank with a 1000-byte root and `varieties` varieties of 100 bytes.
pub fn entry(package: &str, varieties: usize) -> CatalogEntry {
    CatalogEntry {
        root: BankDescriptor::new(format!("GUD_{package}"), 1000),
        varieties: (0..varieties)
            .map(|v| BankDescriptor::new(format!("GUD_{package}V{v}"), 100))
            .collect(),
    }
}

pub fn catalog() -> Catalog {
    Catalog::new()
        .with_entry("Marcus", entry("Marcus", 4))
        .with_entry("Grunt", entry("Grunt", 4))
        .with_entry("Dom", entry("Dom", 2))
}

pub fn line(id: &str, duration: f32) -> GudLine {
    GudLine {
        audio: Some(AudioCue {
            id: id.to_string(),
            duration,
        }),
        ..GudLine::default()
    }
}

/// Root content: action 0 greets, action 1 is combat only, action 2 asks
/// the recipient a question that triggers event 4 in reply.
pub fn root_bank(name: &str) -> BankData {
    let lower = name.to_lowercase();
    BankData {
        lines: vec![
            line(&format!("{lower}_hello"), 1.0),
            line(&format!("{lower}_combat"), 1.0),
            GudLine {
                addressee: LineRole::Recipient,
                response_events: vec![EventId(4)],
                ..line(&format!("{lower}_question"), 2.0)
            },
        ],
        actions: vec![
            GudAction {
                lines: vec![0],
                ..GudAction::default()
            },
            GudAction {
                combat_only: vec![1],
                ..GudAction::default()
            },
            GudAction {
                lines: vec![2],
                ..GudAction::default()
            },
        ],
        side_asset: None,
    }
}

pub struct Session {
    pub manager: DialogueManager,
    pub loader: InMemoryLoadService,
    pub net: NetReplication,
    pub arena: SpeakerArena,
    pub now: f64,
}

impl Session {
    pub fn new(config: GudsConfig) -> Self {
        let catalog = catalog();
        let queue = CompletionQueue::new();
        let loader = InMemoryLoadService::new(queue.clone()).with_catalog(&catalog);
        for bank in ["Marcus", "Grunt", "Dom"] {
            loader.insert_bank(LoadId(format!("GUD_{bank}_SF")), root_bank(bank));
        }
        let net = NetReplication::new();
        let events = EventTable::from_toml(EVENTS).expect("events");
        let manager = DialogueManager::new(
            config,
            catalog,
            events,
            Box::new(loader.clone()),
            queue,
            Box::new(net.clone()),
        );
        Self {
            manager,
            loader,
            net,
            arena: SpeakerArena::new(),
            now: 0.0,
        }
    }

    pub fn with_budget(budget: u64, seed: u64) -> Self {
        let mut config = GudsConfig::default();
        config.general.seed = Some(seed);
        config.streaming.memory_budget_bytes = budget;
        Self::new(config)
    }

    pub fn time(&self) -> GameTime {
        GameTime(self.now)
    }

    pub fn spawn(&mut self, speaker: Speaker) -> SpeakerId {
        self.arena.spawn(speaker)
    }

    pub fn register(&mut self, speaker: Speaker, bank: &str) -> SpeakerId {
        let id = self.arena.spawn(speaker);
        let now = self.time();
        assert!(self.manager.register_speaker(&mut self.arena, id, bank, now));
        id
    }

    /// Advance the clock, tick, then let every outstanding load finish so
    /// the next tick applies it.
    pub fn step(&mut self, dt: f64) -> Option<TickReport> {
        self.now += dt;
        let now = self.time();
        let report = self.manager.tick(&mut self.arena, now);
        self.loader.complete_all();
        report
    }

    pub fn settle(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.step(1.0);
        }
    }

    pub fn varieties(&self, bank: &str) -> usize {
        self.manager
            .store()
            .collection(bank)
            .map_or(0, |c| c.loaded_variety_count())
    }

    pub fn total_varieties(&self) -> usize {
        self.manager
            .store()
            .collections()
            .map(|(_, c)| c.loaded_variety_count())
            .sum()
    }

    pub fn spoken_audio(&self) -> Vec<String> {
        self.arena
            .spoken()
            .iter()
            .filter_map(|l| l.audio_id.clone())
            .collect()
    }
}
