//! Test doubles shared by the unit tests of this crate.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::SlotMap;

use crate::bank::{AudioCue, BankData, GudAction, GudLine};
use crate::catalog::{BankDescriptor, Catalog, CatalogEntry, LOCALIZED_SUFFIX};
use crate::loading::{CompletionQueue, LoadCompletion, LoadFailure, LoadService, LoadedPackage};
use crate::replication::{ObserverId, ReplicationBridge};
use crate::types::{EventId, LineRole, LoadId, SideAssetId, Speaker, SpeakerId};
use crate::world::{DialogueWorld, SpeechRequest};

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct TestWorld {
    pub speakers: SlotMap<SpeakerId, Speaker>,
    pub paused: bool,
    pub multiplayer: bool,
    pub local_player: Option<SpeakerId>,
    pub blocked_sight: bool,
    pub spoken: Vec<(SpeakerId, Option<String>)>,
}

impl TestWorld {
    pub fn spawn(&mut self, speaker: Speaker) -> SpeakerId {
        self.speakers.insert(speaker)
    }
}

impl DialogueWorld for TestWorld {
    fn speaker(&self, id: SpeakerId) -> Option<&Speaker> {
        self.speakers.get(id)
    }

    fn speaker_mut(&mut self, id: SpeakerId) -> Option<&mut Speaker> {
        self.speakers.get_mut(id)
    }

    fn speaker_ids(&self) -> Vec<SpeakerId> {
        self.speakers.keys().collect()
    }

    fn has_line_of_sight(&self, _from: vek::Vec3<f32>, _to: vek::Vec3<f32>) -> bool {
        !self.blocked_sight
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
        self.spoken
            .push((speaker, request.line.audio_id().map(str::to_string)));
        true
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LoaderState {
    banks: HashMap<LoadId, BankData>,
    localized: HashSet<LoadId>,
    failing: HashSet<LoadId>,
    outstanding: VecDeque<LoadId>,
    requests: Vec<LoadId>,
}

#[derive(Clone)]
pub(crate) struct ScriptedLoader {
    state: Arc<Mutex<LoaderState>>,
    queue: CompletionQueue,
}

impl ScriptedLoader {
    pub fn new(queue: CompletionQueue) -> Self {
        let mut state = LoaderState::default();
        for (id, data) in marcus_packages() {
            state.banks.insert(LoadId(id.to_string()), data);
        }
        Self {
            state: Arc::new(Mutex::new(state)),
            queue,
        }
    }

    pub fn add_localized(&self, id: &str) {
        self.state.lock().localized.insert(LoadId(id.to_string()));
    }

    pub fn fail(&self, id: &str) {
        self.state.lock().failing.insert(LoadId(id.to_string()));
    }

    pub fn requests(&self) -> Vec<LoadId> {
        self.state.lock().requests.clone()
    }

    pub fn complete_all(&self) -> usize {
        let mut state = self.state.lock();
        let mut done = 0;
        while let Some(id) = state.outstanding.pop_front() {
            let outcome = if state.failing.contains(&id) {
                Err(LoadFailure::new("scripted failure"))
            } else if id.as_str().ends_with(LOCALIZED_SUFFIX) {
                Ok(LoadedPackage::Resources)
            } else {
                Ok(LoadedPackage::Bank(state.banks.get(&id).cloned().unwrap_or_default()))
            };
            self.queue.push(LoadCompletion { load_id: id, outcome });
            done += 1;
        }
        done
    }
}

impl LoadService for ScriptedLoader {
    fn package_exists(&self, load_id: &LoadId) -> bool {
        let state = self.state.lock();
        if load_id.as_str().ends_with(LOCALIZED_SUFFIX) {
            state.localized.contains(load_id)
        } else {
            true
        }
    }

    fn load_async(&mut self, load_id: &LoadId) {
        let mut state = self.state.lock();
        state.requests.push(load_id.clone());
        state.outstanding.push_back(load_id.clone());
    }
}

// ---------------------------------------------------------------------------
// Replication
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BridgeLog {
    loaded: Vec<LoadId>,
    unloaded: Vec<LoadId>,
    synced: Vec<(ObserverId, Vec<LoadId>)>,
}

#[derive(Clone, Default)]
pub(crate) struct RecordingBridge {
    log: Arc<Mutex<BridgeLog>>,
}

impl RecordingBridge {
    pub fn loaded(&self) -> Vec<LoadId> {
        self.log.lock().loaded.clone()
    }

    pub fn unloaded(&self) -> Vec<LoadId> {
        self.log.lock().unloaded.clone()
    }

    pub fn synced(&self) -> Vec<(ObserverId, Vec<LoadId>)> {
        self.log.lock().synced.clone()
    }
}

impl ReplicationBridge for RecordingBridge {
    fn notify_loaded(&mut self, load_id: &LoadId) {
        self.log.lock().loaded.push(load_id.clone());
    }

    fn notify_unloaded(&mut self, load_id: &LoadId) {
        self.log.lock().unloaded.push(load_id.clone());
    }

    fn bulk_sync(&mut self, observer: ObserverId, loaded: &[LoadId]) {
        self.log.lock().synced.push((observer, loaded.to_vec()));
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Marcus: root 1000 bytes, varieties of 200 and 300 bytes.
pub(crate) fn marcus_catalog() -> Catalog {
    Catalog::new().with_entry(
        "Marcus",
        CatalogEntry {
            root: BankDescriptor::new("GUD_Marcus", 1000),
            varieties: vec![
                BankDescriptor::new("GUD_MarcusG1", 200),
                BankDescriptor::new("GUD_MarcusG2", 300),
            ],
        },
    )
}

pub(crate) fn line(id: &str, duration: f32) -> GudLine {
    GudLine {
        audio: Some(AudioCue {
            id: id.to_string(),
            duration,
        }),
        ..GudLine::default()
    }
}

/// Root actions: 0 greet (unconditional), 1 combat/calm split, 2 combat
/// only, 3 greet with a response event 7 addressed to the recipient.
fn marcus_packages() -> Vec<(&'static str, BankData)> {
    let root = BankData {
        lines: vec![
            line("marcus_hello", 1.0),
            line("marcus_combat", 1.5),
            line("marcus_calm", 1.0),
            GudLine {
                addressee: LineRole::Recipient,
                referring_to: LineRole::Instigator,
                response_events: vec![EventId(7)],
                ..line("marcus_question", 2.0)
            },
        ],
        actions: vec![
            GudAction {
                lines: vec![0],
                ..GudAction::default()
            },
            GudAction {
                combat_only: vec![1],
                non_combat_only: vec![2],
                ..GudAction::default()
            },
            GudAction {
                combat_only: vec![1],
                ..GudAction::default()
            },
            GudAction {
                lines: vec![3],
                ..GudAction::default()
            },
        ],
        side_asset: Some(SideAssetId("face_marcus".into())),
    };
    let mut g1 = BankData {
        side_asset: Some(SideAssetId("face_g1".into())),
        ..BankData::default()
    };
    g1.lines.resize_with(5, GudLine::default);
    g1.lines[4] = line("marcus_hello_g1", 1.0);
    g1.actions = vec![GudAction {
        lines: vec![4],
        ..GudAction::default()
    }];
    let mut g2 = BankData {
        side_asset: Some(SideAssetId("face_g2".into())),
        ..BankData::default()
    };
    g2.lines.resize_with(6, GudLine::default);
    g2.lines[5] = line("marcus_hello_g2", 1.0);
    g2.actions = vec![GudAction {
        lines: vec![5],
        ..GudAction::default()
    }];
    vec![
        ("GUD_Marcus_SF", root),
        ("GUD_MarcusG1_SF", g1),
        ("GUD_MarcusG2_SF", g2),
    ]
}
