//! Bank store: loaded collections, pending loads and the load pipeline.
//!
//! The store is the only owner of collection contents. Collections change
//! in exactly three places: the load-completion handler, variety unload and
//! flush. Everything else reads, or asks for a load through
//! [`BankStore::request_load`], which enforces one pending load per bank
//! name.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::bank::{BankCollection, BankData, LoadedAsset};
use crate::budget::{MemoryBudget, MemoryReport};
use crate::catalog::Catalog;
use crate::error::Result;
use crate::loading::{CompletionQueue, LoadCompletion, LoadService, LoadedPackage};
use crate::metrics::GudsCounters;
use crate::pending::{LoadStage, PendingLoad, PendingLoads};
use crate::replication::{ObserverId, ReplicationBridge};
use crate::types::{BankSlot, GameTime, LoadId, SpeakerId};
use crate::world::{self, DialogueWorld};

/// One resident slot, for inventory dumps.
#[derive(Debug, Clone)]
pub struct SlotInventory {
    /// Slot.
    pub slot: BankSlot,
    /// Package id.
    pub load_id: LoadId,
    /// Approximate bytes.
    pub approx_size: u64,
    /// When it landed.
    pub loaded_at: GameTime,
}

/// One collection, for inventory dumps.
#[derive(Debug, Clone)]
pub struct BankInventory {
    /// Bank name.
    pub bank: String,
    /// Referencing speakers.
    pub speakers: usize,
    /// Orphan stamp.
    pub orphaned_at: Option<GameTime>,
    /// Resident slots.
    pub slots: Vec<SlotInventory>,
    /// Pending slot and stage, if a load is outstanding.
    pub pending: Option<(BankSlot, LoadStage)>,
}

/// Loaded and pending bank state.
pub struct BankStore {
    catalog: Arc<Catalog>,
    collections: BTreeMap<String, BankCollection>,
    pending: PendingLoads,
    budget: MemoryBudget,
    streaming_enabled: bool,
    loader: Box<dyn LoadService>,
    completions: CompletionQueue,
    replication: Box<dyn ReplicationBridge>,
    forced_loads: BTreeMap<String, VecDeque<usize>>,
    counters: Arc<GudsCounters>,
}

impl BankStore {
    /// Build a store around its collaborators.
    ///
    /// `completions` must be the queue `loader` pushes to.
    #[must_use]
    pub fn new(
        catalog: Arc<Catalog>,
        budget: MemoryBudget,
        loader: Box<dyn LoadService>,
        completions: CompletionQueue,
        replication: Box<dyn ReplicationBridge>,
        counters: Arc<GudsCounters>,
    ) -> Self {
        Self {
            catalog,
            collections: BTreeMap::new(),
            pending: PendingLoads::new(),
            budget,
            streaming_enabled: true,
            loader,
            completions,
            replication,
            forced_loads: BTreeMap::new(),
            counters,
        }
    }

    /// Builder: allow or forbid variety streaming.
    #[must_use]
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.streaming_enabled = enabled;
        self
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Collection for a bank, if any.
    #[must_use]
    pub fn collection(&self, bank_name: &str) -> Option<&BankCollection> {
        self.collections.get(bank_name)
    }

    /// All collections in bank-name order.
    pub fn collections(&self) -> impl Iterator<Item = (&str, &BankCollection)> {
        self.collections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Pending loads.
    #[must_use]
    pub fn pending(&self) -> &PendingLoads {
        &self.pending
    }

    /// Current memory usage.
    #[must_use]
    pub fn memory_report(&self) -> MemoryReport {
        self.budget
            .measure(&self.catalog, &self.collections, self.pending.in_flight_bytes())
    }

    /// Slot holds data, or a load for it is in flight.
    #[must_use]
    pub fn is_variety_loaded(&self, bank_name: &str, variety: usize) -> bool {
        let slot = BankSlot::Variety(variety);
        self.collections
            .get(bank_name)
            .is_some_and(|c| c.is_loaded(slot))
            || self.pending.is_loading(bank_name, slot)
    }

    /// Loaded varieties plus a variety load in flight.
    #[must_use]
    pub fn variety_count_with_pending(&self, bank_name: &str) -> usize {
        let loaded = self
            .collections
            .get(bank_name)
            .map_or(0, BankCollection::loaded_variety_count);
        let in_flight = self.pending.get(bank_name).is_some_and(|p| {
            p.is_in_flight() && matches!(p.slot, BankSlot::Variety(_))
        });
        loaded + usize::from(in_flight)
    }

    /// Aggregate bank of the collection a speaker is bound to.
    #[must_use]
    pub fn bank_for_speaker(&self, world: &dyn DialogueWorld, id: SpeakerId) -> Option<&BankData> {
        let bank = world.speaker(id)?.bound_bank.as_deref()?;
        self.collections
            .get(bank)
            .filter(|c| c.has_root())
            .map(BankCollection::aggregate)
    }

    /// Load ids of every resident slot.
    #[must_use]
    pub fn loaded_load_ids(&self) -> Vec<LoadId> {
        let mut ids = Vec::new();
        for (bank, collection) in &self.collections {
            let Some(entry) = self.catalog.get(bank) else {
                continue;
            };
            for (slot, _) in collection.loaded_slots() {
                if let Some(d) = entry.descriptor(slot) {
                    ids.push(d.load_id());
                }
            }
        }
        ids
    }

    /// Inventory of every collection and pending load.
    #[must_use]
    pub fn inventory(&self) -> Vec<BankInventory> {
        let mut out: Vec<BankInventory> = self
            .collections
            .iter()
            .map(|(bank, c)| BankInventory {
                bank: bank.clone(),
                speakers: c.speakers().len(),
                orphaned_at: c.orphaned_at(),
                slots: c
                    .loaded_slots()
                    .filter_map(|(slot, asset)| {
                        let d = self.catalog.get(bank)?.descriptor(slot)?;
                        Some(SlotInventory {
                            slot,
                            load_id: d.load_id(),
                            approx_size: d.approx_size,
                            loaded_at: asset.loaded_at,
                        })
                    })
                    .collect(),
                pending: self.pending.get(bank).map(|p| (p.slot, p.stage)),
            })
            .collect();
        for p in self.pending.iter() {
            if !self.collections.contains_key(&p.bank_name) {
                out.push(BankInventory {
                    bank: p.bank_name.clone(),
                    speakers: p.speakers.len(),
                    orphaned_at: None,
                    slots: Vec::new(),
                    pending: Some((p.slot, p.stage)),
                });
            }
        }
        out.sort_by(|a, b| a.bank.cmp(&b.bank));
        out
    }

    // -----------------------------------------------------------------------
    // Speakers
    // -----------------------------------------------------------------------

    /// Attach a speaker to a bank, loading the root if nothing is resident
    /// or pending for it yet.
    ///
    /// # Errors
    /// Returns `GudsError::CatalogMiss` if the bank is not in the catalog.
    pub fn register_speaker(
        &mut self,
        world: &mut dyn DialogueWorld,
        id: SpeakerId,
        bank_name: &str,
        now: GameTime,
    ) -> Result<()> {
        if let Err(e) = self.catalog.entry(bank_name) {
            warn!(bank = %bank_name, "speaker registered against unknown bank");
            return Err(e);
        }

        let previous = world.speaker(id).and_then(|s| s.bound_bank.clone());
        if previous.as_deref().is_some_and(|b| b != bank_name) {
            self.unregister_speaker(world, id, now);
        }

        if let Some(collection) = self.collections.get_mut(bank_name) {
            collection.add_speaker(id);
            for asset in collection.side_assets() {
                world::mount_side_asset(world, id, &asset);
            }
        } else if self.pending.contains(bank_name) {
            self.pending.add_speaker(bank_name, id);
        } else {
            self.request_load(bank_name, BankSlot::Root, Some(id), now);
        }

        if let Some(speaker) = world.speaker_mut(id) {
            speaker.bound_bank = Some(bank_name.to_string());
        }
        Ok(())
    }

    /// Detach a speaker from whatever it references. Never evicts.
    pub fn unregister_speaker(
        &mut self,
        world: &mut dyn DialogueWorld,
        id: SpeakerId,
        now: GameTime,
    ) -> bool {
        let mut removed = false;
        for collection in self.collections.values_mut() {
            if collection.remove_speaker(id, now) {
                removed = true;
                for asset in collection.side_assets() {
                    world::unmount_side_asset(world, id, &asset);
                }
            }
        }
        self.pending.remove_speaker(id);
        if let Some(speaker) = world.speaker_mut(id) {
            speaker.bound_bank = None;
        }
        removed
    }

    /// Treat speakers that no longer resolve as unregistered, stamp
    /// orphans, and abandon failed loads nobody waits on.
    pub fn prune_vanished(&mut self, world: &dyn DialogueWorld, now: GameTime) {
        for (bank, collection) in &mut self.collections {
            let gone: Vec<SpeakerId> = collection
                .speakers()
                .iter()
                .copied()
                .filter(|s| world.speaker(*s).is_none())
                .collect();
            for id in gone {
                debug!(bank = %bank, "dropping vanished speaker");
                collection.remove_speaker(id, now);
            }
            collection.mark_orphaned(now);
        }
        for bank in self.pending.prune(|s| world.speaker(s).is_some()) {
            debug!(bank = %bank, "abandoned failed load");
        }
    }

    // -----------------------------------------------------------------------
    // Load pipeline
    // -----------------------------------------------------------------------

    /// Issue a load for one slot of a bank.
    ///
    /// Coalesces into an existing pending load for the same slot. Refuses
    /// when the bank already has a different load in flight, when a variety
    /// does not fit the budget, or when no package exists.
    pub fn request_load(
        &mut self,
        bank_name: &str,
        slot: BankSlot,
        speaker: Option<SpeakerId>,
        now: GameTime,
    ) -> bool {
        let Some(entry) = self.catalog.get(bank_name) else {
            warn!(bank = %bank_name, "load requested for bank not in catalog");
            return false;
        };
        let Some(descriptor) = entry.descriptor(slot) else {
            warn!(bank = %bank_name, slot = %slot, "load requested for missing slot");
            return false;
        };

        if let Some(pending) = self.pending.get(bank_name) {
            if pending.slot == slot && pending.is_in_flight() {
                if let Some(id) = speaker {
                    self.pending.add_speaker(bank_name, id);
                }
                return true;
            }
            return false;
        }

        if let BankSlot::Variety(_) = slot {
            if !self.streaming_enabled {
                return false;
            }
            if !self.collections.get(bank_name).is_some_and(BankCollection::has_root) {
                return false;
            }
            if self.collections.get(bank_name).is_some_and(|c| c.is_loaded(slot)) {
                return false;
            }
            let report = self.memory_report();
            if !report.admits(descriptor.approx_size) {
                debug!(
                    bank = %bank_name,
                    slot = %slot,
                    size = descriptor.approx_size,
                    available = report.available(),
                    "variety does not fit"
                );
                return false;
            }
        }

        let localized = descriptor.localized_load_id();
        let base = descriptor.load_id();
        let (stage, load_id) = if self.loader.package_exists(&localized) {
            (LoadStage::LoadingLocalized, localized)
        } else if self.loader.package_exists(&base) {
            (LoadStage::LoadingBase, base)
        } else {
            warn!(bank = %bank_name, load_id = %base, "no package found for bank");
            return false;
        };

        let load = PendingLoad {
            bank_name: bank_name.to_string(),
            slot,
            stage,
            load_id: load_id.clone(),
            speakers: speaker.into_iter().collect(),
            approx_size: descriptor.approx_size,
            requested_at: now,
        };
        if !self.pending.insert(load) {
            return false;
        }
        debug!(bank = %bank_name, slot = %slot, load_id = %load_id, "load issued");
        GudsCounters::bump(&self.counters.loads_issued);
        self.loader.load_async(&load_id);
        true
    }

    /// Apply every completion queued since the last call.
    pub fn process_completions(&mut self, world: &mut dyn DialogueWorld, now: GameTime) -> usize {
        let drained = self.completions.drain();
        let count = drained.len();
        for completion in drained {
            self.on_load_complete(world, completion, now);
        }
        count
    }

    /// Apply one completion. Completions nobody expects are discarded.
    pub fn on_load_complete(
        &mut self,
        world: &mut dyn DialogueWorld,
        completion: LoadCompletion,
        now: GameTime,
    ) {
        let LoadCompletion { load_id, outcome } = completion;
        let Some(pending) = self.pending.find_by_load_id(&load_id) else {
            debug!(load_id = %load_id, "stale completion discarded");
            GudsCounters::bump(&self.counters.stale_completions);
            return;
        };
        let bank = pending.bank_name.clone();
        let slot = pending.slot;
        let stage = pending.stage;

        let package = match outcome {
            Ok(package) => package,
            Err(failure) => {
                warn!(
                    bank = %bank,
                    load_id = %load_id,
                    reason = %failure.reason,
                    "bank load failed"
                );
                GudsCounters::bump(&self.counters.load_failures);
                match slot {
                    BankSlot::Root => self.pending.mark_failed(&bank),
                    BankSlot::Variety(_) => {
                        self.pending.take(&load_id);
                        self.issue_forced(&bank, now);
                    }
                }
                return;
            }
        };

        match stage {
            LoadStage::LoadingLocalized => {
                let base = self
                    .catalog
                    .get(&bank)
                    .and_then(|e| e.descriptor(slot))
                    .map(crate::catalog::BankDescriptor::load_id);
                let Some(base) = base else {
                    self.pending.take(&load_id);
                    return;
                };
                debug!(bank = %bank, load_id = %base, "localized package resident, loading base");
                self.pending.advance_to_base(&bank, base.clone());
                self.loader.load_async(&base);
            }
            LoadStage::LoadingBase => {
                let Some(pending) = self.pending.take(&load_id) else {
                    return;
                };
                let data = match package {
                    LoadedPackage::Bank(data) => data,
                    LoadedPackage::Resources => {
                        warn!(
                            bank = %bank,
                            load_id = %load_id,
                            "base package carried no bank data"
                        );
                        BankData::default()
                    }
                };
                self.install(world, pending, data, &load_id, now);
            }
            LoadStage::Failed => {
                GudsCounters::bump(&self.counters.stale_completions);
            }
        }
    }

    fn install(
        &mut self,
        world: &mut dyn DialogueWorld,
        pending: PendingLoad,
        data: BankData,
        load_id: &LoadId,
        now: GameTime,
    ) {
        let bank = pending.bank_name;
        let slot = match self.catalog.resolve_slot(&bank, load_id) {
            Some(resolved) => {
                if resolved != pending.slot {
                    warn!(bank = %bank, load_id = %load_id, "package resolved to a different slot");
                }
                resolved
            }
            None => pending.slot,
        };

        if matches!(slot, BankSlot::Variety(_))
            && !self.collections.get(&bank).is_some_and(BankCollection::has_root)
        {
            warn!(bank = %bank, slot = %slot, "variety landed without a root, dropped");
            return;
        }

        let slot_count = self.catalog.get(&bank).map_or(1, |e| e.slot_count());
        let collection = self
            .collections
            .entry(bank.clone())
            .or_insert_with(|| BankCollection::new(slot_count));
        collection.insert(slot, LoadedAsset { data, loaded_at: now });
        for id in pending.speakers {
            if world.speaker(id).is_some() {
                collection.add_speaker(id);
            }
        }
        collection.mark_orphaned(now);

        let speakers = collection.speakers().to_vec();
        let assets = collection.side_assets();
        for id in &speakers {
            for asset in &assets {
                world::mount_side_asset(world, *id, asset);
            }
        }

        self.replication.notify_loaded(load_id);
        GudsCounters::bump(&self.counters.loads_completed);
        info!(bank = %bank, slot = %slot, speakers = speakers.len(), "bank resolved");

        self.issue_forced(&bank, now);
    }

    // -----------------------------------------------------------------------
    // Unload / flush
    // -----------------------------------------------------------------------

    /// Unload one variety and unsplice it from the aggregate.
    pub fn unload_variety(
        &mut self,
        world: &mut dyn DialogueWorld,
        bank_name: &str,
        variety: usize,
    ) -> bool {
        let Some(collection) = self.collections.get_mut(bank_name) else {
            return false;
        };
        let Some(asset) = collection.remove_variety(variety) else {
            return false;
        };
        if let Some(side) = asset.data.side_asset {
            if !collection.side_assets().contains(&side) {
                for id in collection.speakers().to_vec() {
                    world::unmount_side_asset(world, id, &side);
                }
            }
        }
        if let Some(d) = self
            .catalog
            .get(bank_name)
            .and_then(|e| e.descriptor(BankSlot::Variety(variety)))
        {
            self.replication.notify_unloaded(&d.load_id());
        }
        GudsCounters::bump(&self.counters.varieties_unloaded);
        debug!(bank = %bank_name, variety, "variety unloaded");
        true
    }

    /// Unload up to `count` varieties, oldest first.
    pub fn unload_oldest_varieties(
        &mut self,
        world: &mut dyn DialogueWorld,
        bank_name: &str,
        count: usize,
    ) -> usize {
        let oldest = self
            .collections
            .get(bank_name)
            .map(BankCollection::varieties_by_age)
            .unwrap_or_default();
        oldest
            .into_iter()
            .take(count)
            .filter(|v| self.unload_variety(world, bank_name, *v))
            .count()
    }

    /// Request `count` random unloaded varieties. With `unload_equal`, the
    /// same number of the oldest resident varieties go first.
    pub fn load_random_varieties<R: Rng + ?Sized>(
        &mut self,
        world: &mut dyn DialogueWorld,
        bank_name: &str,
        count: usize,
        unload_equal: bool,
        rng: &mut R,
        now: GameTime,
    ) -> bool {
        let Some(variety_count) = self.catalog.get(bank_name).map(|e| e.variety_count()) else {
            return false;
        };
        let mut candidates: Vec<usize> = (0..variety_count)
            .filter(|v| !self.is_variety_loaded(bank_name, *v))
            .collect();
        if candidates.is_empty() {
            return false;
        }
        let count = count.min(candidates.len());
        if unload_equal {
            self.unload_oldest_varieties(world, bank_name, count);
        }
        let mut issued = false;
        for _ in 0..count {
            let pick = rng.gen_range(0..candidates.len());
            let variety = candidates.remove(pick);
            issued |= self.request_load(bank_name, BankSlot::Variety(variety), None, now);
        }
        issued
    }

    /// Flush a bank: cancel its pending load, unmount side assets, drop the
    /// collection and notify unload of every resident slot.
    pub fn flush_bank(&mut self, world: &mut dyn DialogueWorld, bank_name: &str) -> bool {
        let cancelled = self.pending.cancel_bank(bank_name).is_some();
        self.forced_loads.remove(bank_name);
        let Some(collection) = self.collections.remove(bank_name) else {
            return cancelled;
        };

        let assets = collection.side_assets();
        for id in collection.speakers() {
            for asset in &assets {
                world::unmount_side_asset(world, *id, asset);
            }
        }
        if let Some(entry) = self.catalog.get(bank_name) {
            for (slot, _) in collection.loaded_slots() {
                if let Some(d) = entry.descriptor(slot) {
                    self.replication.notify_unloaded(&d.load_id());
                }
            }
        }
        GudsCounters::bump(&self.counters.banks_flushed);
        info!(bank = %bank_name, "bank flushed");
        true
    }

    /// Flush every bank.
    pub fn flush_all(&mut self, world: &mut dyn DialogueWorld) -> usize {
        let mut banks: Vec<String> = self.collections.keys().cloned().collect();
        banks.extend(self.pending.iter().map(|p| p.bank_name.clone()));
        banks.sort();
        banks.dedup();
        banks
            .iter()
            .filter(|b| self.flush_bank(world, b))
            .count()
    }

    // -----------------------------------------------------------------------
    // Forced loads (debug surface)
    // -----------------------------------------------------------------------

    /// Queue every unloaded variety of a bank. Loads go out one at a time as
    /// earlier ones land. Returns how many were queued.
    pub fn force_load_all_varieties(&mut self, bank_name: &str, now: GameTime) -> usize {
        let Some(variety_count) = self.catalog.get(bank_name).map(|e| e.variety_count()) else {
            warn!(bank = %bank_name, "force load for bank not in catalog");
            return 0;
        };
        let queue: VecDeque<usize> = (0..variety_count)
            .filter(|v| !self.is_variety_loaded(bank_name, *v))
            .collect();
        let queued = queue.len();
        if queued > 0 {
            self.forced_loads.insert(bank_name.to_string(), queue);
            self.issue_forced(bank_name, now);
        }
        queued
    }

    /// Unload every resident variety of a bank and drop its forced queue.
    pub fn unload_all_varieties(
        &mut self,
        world: &mut dyn DialogueWorld,
        bank_name: &str,
    ) -> usize {
        self.forced_loads.remove(bank_name);
        let loaded = self
            .collections
            .get(bank_name)
            .map(BankCollection::loaded_varieties)
            .unwrap_or_default();
        loaded
            .into_iter()
            .filter(|v| self.unload_variety(world, bank_name, *v))
            .count()
    }

    fn issue_forced(&mut self, bank_name: &str, now: GameTime) {
        if self.pending.contains(bank_name) {
            return;
        }
        let Some(mut queue) = self.forced_loads.remove(bank_name) else {
            return;
        };
        while let Some(variety) = queue.pop_front() {
            if self.is_variety_loaded(bank_name, variety) {
                continue;
            }
            if self.request_load(bank_name, BankSlot::Variety(variety), None, now) {
                break;
            }
        }
        if !queue.is_empty() {
            self.forced_loads.insert(bank_name.to_string(), queue);
        }
    }

    // -----------------------------------------------------------------------
    // Replication
    // -----------------------------------------------------------------------

    /// Send the full resident set to a newly connected observer.
    pub fn replicate_all(&mut self, observer: ObserverId) {
        let loaded = self.loaded_load_ids();
        debug!(observer = observer.0, banks = loaded.len(), "bulk sync");
        self.replication.bulk_sync(observer, &loaded);
    }
}

impl std::fmt::Debug for BankStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BankStore")
            .field("collections", &self.collections.len())
            .field("pending", &self.pending.len())
            .field("budget", &self.budget.bytes())
            .finish_non_exhaustive()
    }
}
