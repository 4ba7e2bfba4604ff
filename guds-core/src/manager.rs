//! The dialogue manager facade.
//!
//! One [`DialogueManager`] per game session, owned by whatever drives the
//! tick loop and handed the world on every call. Nothing here returns an
//! error to gameplay: failures are logged where they happen and surface as
//! `false` or as silence.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::budget::{MemoryBudget, MemoryReport};
use crate::catalog::Catalog;
use crate::config::GudsConfig;
use crate::events::{EventTable, GudEvent};
use crate::loading::{CompletionQueue, LoadService};
use crate::metrics::{CounterSnapshot, GudsCounters, spans};
use crate::pending::LoadStage;
use crate::replication::{ObserverId, ReplicationBridge};
use crate::scheduler::{StreamingScheduler, TickReport};
use crate::selection::SelectionEngine;
use crate::store::{BankInventory, BankStore};
use crate::types::{ActionId, BankSlot, GameTime, SpeakerId, TeamId};
use crate::world::{self, DialogueWorld, SpeechPriority};

/// Unscripted dialogue for one game session.
pub struct DialogueManager {
    config: GudsConfig,
    store: BankStore,
    scheduler: StreamingScheduler,
    selection: SelectionEngine,
    rng: StdRng,
    counters: Arc<GudsCounters>,
    deferred: Vec<(SpeakerId, String)>,
}

impl DialogueManager {
    /// Build a manager.
    ///
    /// `completions` must be the queue `loader` delivers to.
    #[must_use]
    pub fn new(
        config: GudsConfig,
        catalog: Catalog,
        events: EventTable,
        loader: Box<dyn LoadService>,
        completions: CompletionQueue,
        replication: Box<dyn ReplicationBridge>,
    ) -> Self {
        let counters = Arc::new(GudsCounters::new());
        let store = BankStore::new(
            Arc::new(catalog),
            MemoryBudget::new(config.streaming.memory_budget_bytes),
            loader,
            completions,
            replication,
            Arc::clone(&counters),
        )
        .with_streaming(config.streaming.enabled);
        let scheduler = StreamingScheduler::new(config.streaming.clone(), &config.priority);
        let selection =
            SelectionEngine::new(config.selection.clone(), events, Arc::clone(&counters))
                .with_authority(config.general.authority);
        let rng = config
            .general
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        info!(
            banks = store.catalog().len(),
            budget = config.streaming.memory_budget_bytes,
            authority = config.general.authority,
            "dialogue manager ready"
        );

        Self {
            config,
            store,
            scheduler,
            selection,
            rng,
            counters,
            deferred: Vec::new(),
        }
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &GudsConfig {
        &self.config
    }

    /// The bank store.
    #[must_use]
    pub fn store(&self) -> &BankStore {
        &self.store
    }

    /// The selection engine.
    #[must_use]
    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    /// Counter values.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Turn unscripted dialogue on or off. Loaded banks stay resident.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.general.enabled = enabled;
        self.selection.set_enabled(enabled);
    }

    // -----------------------------------------------------------------------
    // Speaker boundary
    // -----------------------------------------------------------------------

    /// Attach a speaker to a bank. Returns `false` for unknown banks.
    pub fn register_speaker(
        &mut self,
        world: &mut dyn DialogueWorld,
        id: SpeakerId,
        bank_name: &str,
        now: GameTime,
    ) -> bool {
        if !self.config.general.enabled {
            return false;
        }
        if now.seconds() < self.config.streaming.registration_defer_secs {
            if self.store.catalog().get(bank_name).is_none() {
                return false;
            }
            debug!(bank = %bank_name, "registration deferred");
            self.deferred.retain(|(s, _)| *s != id);
            self.deferred.push((id, bank_name.to_string()));
            return true;
        }
        self.store
            .register_speaker(world, id, bank_name, now)
            .is_ok()
    }

    /// Register a speaker against a uniformly chosen bank from its pool.
    pub fn register_speaker_from_pool(
        &mut self,
        world: &mut dyn DialogueWorld,
        id: SpeakerId,
        now: GameTime,
    ) -> bool {
        let Some(bank) = world
            .speaker(id)
            .and_then(|s| s.bank_pool.choose(&mut self.rng).cloned())
        else {
            return false;
        };
        self.register_speaker(world, id, &bank, now)
    }

    /// Detach a speaker. Its collection becomes an orphan if it was the last.
    pub fn unregister_speaker(
        &mut self,
        world: &mut dyn DialogueWorld,
        id: SpeakerId,
        now: GameTime,
    ) -> bool {
        self.deferred.retain(|(s, _)| *s != id);
        self.store.unregister_speaker(world, id, now)
    }

    /// Whether the speaker's loaded bank can voice an action now.
    #[must_use]
    pub fn speaker_has_line(
        &self,
        world: &dyn DialogueWorld,
        id: SpeakerId,
        action: ActionId,
    ) -> bool {
        self.selection.speaker_has_line(&self.store, world, id, action)
    }

    /// Alive, not muted and past its personal cooldown.
    #[must_use]
    pub fn is_speaker_valid(
        &self,
        world: &dyn DialogueWorld,
        id: SpeakerId,
        now: GameTime,
    ) -> bool {
        world::is_speaker_valid(world, id, now)
    }

    // -----------------------------------------------------------------------
    // Gameplay boundary
    // -----------------------------------------------------------------------

    /// Offer an event. Returns whether it passed gating and was queued.
    pub fn trigger_event(
        &mut self,
        world: &dyn DialogueWorld,
        event: GudEvent,
        now: GameTime,
    ) -> bool {
        if !self.config.general.enabled {
            return false;
        }
        self.selection.trigger_event(world, event, &mut self.rng, now)
    }

    /// Speak a line of `action` immediately, bypassing event gating.
    pub fn play_action_directly(
        &mut self,
        world: &mut dyn DialogueWorld,
        action: ActionId,
        speaker: SpeakerId,
        addressee: Option<SpeakerId>,
        referring_to: Option<SpeakerId>,
        now: GameTime,
    ) -> bool {
        self.selection.play_action_directly(
            &self.store,
            world,
            action,
            speaker,
            addressee,
            referring_to,
            &mut self.rng,
            now,
        )
    }

    /// Tell the channel about a scripted line so unscripted chatter keeps
    /// quiet while it plays.
    pub fn notify_exclusive_speech(
        &mut self,
        team: TeamId,
        duration: f64,
        priority: SpeechPriority,
        now: GameTime,
    ) {
        self.selection
            .notify_exclusive_speech(team, now, duration, priority);
    }

    /// Advance the system: apply load completions, run the scheduler when
    /// its interval has elapsed, and resolve due events.
    ///
    /// Returns the scheduler report if a scheduler pass ran.
    pub fn tick(&mut self, world: &mut dyn DialogueWorld, now: GameTime) -> Option<TickReport> {
        let _tick = tracing::debug_span!(spans::TICK).entered();

        if !self.deferred.is_empty()
            && now.seconds() >= self.config.streaming.registration_defer_secs
        {
            for (id, bank) in std::mem::take(&mut self.deferred) {
                if let Err(e) = self.store.register_speaker(world, id, &bank, now) {
                    warn!(bank = %bank, error = %e, "deferred registration failed");
                }
            }
        }

        self.store.process_completions(world, now);

        let report = {
            let _streaming = tracing::debug_span!(spans::STREAMING).entered();
            self.scheduler.tick(&mut self.store, world, &mut self.rng, now)
        };

        if self.config.general.enabled {
            let _selection = tracing::debug_span!(spans::SELECTION).entered();
            self.selection
                .process_due(&self.store, world, &mut self.rng, now);
        }
        report
    }

    // -----------------------------------------------------------------------
    // Replication
    // -----------------------------------------------------------------------

    /// Send the full resident set to a newly connected observer.
    pub fn replicate_all(&mut self, observer: ObserverId) {
        self.store.replicate_all(observer);
    }

    // -----------------------------------------------------------------------
    // Admin / debug surface
    // -----------------------------------------------------------------------

    /// Current memory usage.
    #[must_use]
    pub fn memory_report(&self) -> MemoryReport {
        self.store.memory_report()
    }

    /// Structured inventory of collections and pending loads.
    #[must_use]
    pub fn inventory(&self) -> Vec<BankInventory> {
        self.store.inventory()
    }

    /// Human-readable memory and inventory dump.
    #[must_use]
    pub fn inventory_dump(&self) -> String {
        let report = self.memory_report();
        let mut out = format!(
            "GUDS memory: {} / {} bytes used, {} in flight, {} slots\n",
            report.used, report.budget, report.in_flight, report.loaded_slots
        );
        for bank in self.inventory() {
            let orphan = bank
                .orphaned_at
                .map(|t| format!(", orphaned at {:.1}", t.seconds()))
                .unwrap_or_default();
            out.push_str(&format!("{} ({} speakers{orphan})\n", bank.bank, bank.speakers));
            for slot in &bank.slots {
                out.push_str(&format!(
                    "  {:<10} {:<24} {:>9} bytes  loaded at {:.1}\n",
                    slot.slot.to_string(),
                    slot.load_id.as_str(),
                    slot.approx_size,
                    slot.loaded_at.seconds()
                ));
            }
            if let Some((slot, stage)) = bank.pending {
                let stage = match stage {
                    LoadStage::LoadingLocalized => "loading localized",
                    LoadStage::LoadingBase => "loading base",
                    LoadStage::Failed => "failed",
                };
                out.push_str(&format!("  pending {slot} ({stage})\n"));
            }
        }
        out
    }

    /// Queue every unloaded variety of a bank.
    pub fn force_load_all_varieties(&mut self, bank_name: &str, now: GameTime) -> usize {
        self.store.force_load_all_varieties(bank_name, now)
    }

    /// Unload every variety of a bank.
    pub fn unload_all_varieties(
        &mut self,
        world: &mut dyn DialogueWorld,
        bank_name: &str,
    ) -> usize {
        self.store.unload_all_varieties(world, bank_name)
    }

    /// Flush one bank.
    pub fn flush_bank(&mut self, world: &mut dyn DialogueWorld, bank_name: &str) -> bool {
        self.store.flush_bank(world, bank_name)
    }

    /// Flush every bank.
    pub fn flush_all(&mut self, world: &mut dyn DialogueWorld) -> usize {
        self.store.flush_all(world)
    }

    /// Load `count` random unloaded varieties of a bank. Unless
    /// `keep_existing`, as many of the oldest resident ones go first.
    pub fn load_random_varieties(
        &mut self,
        world: &mut dyn DialogueWorld,
        bank_name: &str,
        count: usize,
        keep_existing: bool,
        now: GameTime,
    ) -> bool {
        self.store
            .load_random_varieties(world, bank_name, count, !keep_existing, &mut self.rng, now)
    }

    /// Load one specific variety.
    pub fn load_variety(&mut self, bank_name: &str, variety: usize, now: GameTime) -> bool {
        self.store
            .request_load(bank_name, BankSlot::Variety(variety), None, now)
    }
}

impl std::fmt::Debug for DialogueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogueManager")
            .field("store", &self.store)
            .field("queued_events", &self.selection.queued_events())
            .field("deferred", &self.deferred.len())
            .finish_non_exhaustive()
    }
}
