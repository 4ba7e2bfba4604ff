//! Streaming scheduler.
//!
//! Runs on a fixed interval of world time, not every frame. One pass:
//!
//! 1. prune speakers that vanished from the world,
//! 2. measure memory against the budget,
//! 3. rank active collections by priority tier,
//! 4. deal variety banks out evenly, or shed one when over budget or badly
//!    out of balance (at most one unload per pass),
//! 5. flush orphans whose grace period has run out, and take a variety from
//!    the oldest orphan when shedding found no active donor,
//! 6. on a longer interval, swap one variety of a random active collection.

use rand::Rng;
use tracing::{debug, info};

use crate::config::{PriorityConfig, StreamingConfig};
use crate::store::BankStore;
use crate::types::{GameTime, SpeakerId, TeamId};
use crate::world::DialogueWorld;

/// Priority class of a collection, from its most important speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PriorityTier {
    /// Everyone else.
    Other,
    /// A speaker on one of the configured primary teams.
    Primary,
    /// A locally controlled player.
    LocalPlayer,
}

impl PriorityTier {
    /// Tier of a set of speakers.
    #[must_use]
    pub fn of(world: &dyn DialogueWorld, speakers: &[SpeakerId], primary_teams: &[TeamId]) -> Self {
        let local = world.local_player();
        speakers
            .iter()
            .filter_map(|id| world.speaker(*id).map(|s| (*id, s)))
            .map(|(id, s)| {
                if s.locally_controlled || local == Some(id) {
                    Self::LocalPlayer
                } else if primary_teams.contains(&s.team) {
                    Self::Primary
                } else {
                    Self::Other
                }
            })
            .max()
            .unwrap_or(Self::Other)
    }
}

/// What one scheduler pass saw and did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Resident bytes at the start of the pass.
    pub used: u64,
    /// In-flight bytes at the start of the pass.
    pub in_flight: u64,
    /// Budget.
    pub budget: u64,
    /// Whether the pass started over budget.
    pub over_budget: bool,
    /// Collections with at least one speaker.
    pub active_collections: usize,
    /// Variety loads issued.
    pub loads_requested: usize,
    /// Varieties unloaded.
    pub varieties_unloaded: usize,
    /// Collections flushed.
    pub banks_flushed: usize,
}

/// Periodic streaming policy over a [`BankStore`].
#[derive(Debug, Clone)]
pub struct StreamingScheduler {
    config: StreamingConfig,
    primary_teams: Vec<TeamId>,
    last_update: Option<GameTime>,
    last_swap: Option<GameTime>,
}

impl StreamingScheduler {
    /// Scheduler with the given settings.
    #[must_use]
    pub fn new(config: StreamingConfig, priority: &PriorityConfig) -> Self {
        Self {
            config,
            primary_teams: priority.primary_teams.clone(),
            last_update: None,
            last_swap: None,
        }
    }

    /// Streaming settings.
    #[must_use]
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Make the next [`tick`](Self::tick) run regardless of the interval.
    pub fn force_next(&mut self) {
        self.last_update = None;
    }

    /// Run one pass if the update interval has elapsed.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        store: &mut BankStore,
        world: &mut dyn DialogueWorld,
        rng: &mut R,
        now: GameTime,
    ) -> Option<TickReport> {
        if let Some(last) = self.last_update {
            if now.since(last) < self.config.update_interval_secs {
                return None;
            }
        }
        self.last_update = Some(now);
        let last_swap = *self.last_swap.get_or_insert(now);

        store.prune_vanished(&*world, now);

        let memory = store.memory_report();
        let over_budget = memory.is_over_budget();
        let mut report = TickReport {
            used: memory.used,
            in_flight: memory.in_flight,
            budget: memory.budget,
            over_budget,
            ..TickReport::default()
        };

        let ranked = self.rank(store, &*world);
        report.active_collections = ranked.len();

        let mut needs_orphan_donor = false;
        if over_budget {
            // Lowest priority gives first.
            let donor = ranked.iter().rev().find(|bank| {
                store
                    .collection(bank)
                    .is_some_and(|c| c.loaded_variety_count() > 0)
            });
            match donor {
                Some(bank) => {
                    debug!(
                        bank = %bank,
                        used = memory.used,
                        budget = memory.budget,
                        "over budget, shedding"
                    );
                    report.varieties_unloaded += store.unload_oldest_varieties(world, bank, 1);
                }
                None => needs_orphan_donor = true,
            }
        } else if self.config.enabled {
            self.deal(store, world, &ranked, rng, now, &mut report);
        }

        self.expire_orphans(store, world, needs_orphan_donor, now, &mut report);

        if self.config.enabled
            && !ranked.is_empty()
            && now.since(last_swap) >= self.config.variety_swap_interval_secs
        {
            let bank = &ranked[rng.gen_range(0..ranked.len())];
            debug!(bank = %bank, "rotating a variety");
            if store.load_random_varieties(world, bank, 1, true, rng, now) {
                report.loads_requested += 1;
            }
            self.last_swap = Some(now);
        }

        Some(report)
    }

    /// Active collections (resident root, at least one speaker), highest
    /// tier first. Equal tiers keep bank-name order.
    fn rank(&self, store: &BankStore, world: &dyn DialogueWorld) -> Vec<String> {
        let mut ranked: Vec<(String, PriorityTier)> = store
            .collections()
            .filter(|(_, c)| c.has_root() && !c.is_orphaned())
            .map(|(bank, c)| {
                (
                    bank.to_string(),
                    PriorityTier::of(world, c.speakers(), &self.primary_teams),
                )
            })
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.into_iter().map(|(bank, _)| bank).collect()
    }

    /// Deal varieties out evenly. The top `total % n` collections get one
    /// extra share.
    fn deal<R: Rng + ?Sized>(
        &self,
        store: &mut BankStore,
        world: &mut dyn DialogueWorld,
        ranked: &[String],
        rng: &mut R,
        now: GameTime,
        report: &mut TickReport,
    ) {
        if ranked.is_empty() {
            return;
        }
        let total: usize = ranked
            .iter()
            .filter_map(|bank| store.collection(bank))
            .map(crate::bank::BankCollection::loaded_variety_count)
            .sum();
        let share = total / ranked.len();
        let remainder = total % ranked.len();

        let mut unloaded = false;
        for (rank, bank) in ranked.iter().enumerate() {
            let target = share + usize::from(rank < remainder);
            let count = store.variety_count_with_pending(bank);
            if count <= target && count < self.config.variety_bank_cap {
                if store.load_random_varieties(world, bank, 1, false, rng, now) {
                    report.loads_requested += 1;
                }
            } else if !unloaded && count > target + self.config.rebalance_slack {
                debug!(bank = %bank, count, target, "out of balance, shedding");
                report.varieties_unloaded += store.unload_oldest_varieties(world, bank, 1);
                unloaded = true;
            }
        }
    }

    fn expire_orphans(
        &self,
        store: &mut BankStore,
        world: &mut dyn DialogueWorld,
        needs_donor: bool,
        now: GameTime,
        report: &mut TickReport,
    ) {
        let mut expired = Vec::new();
        let mut oldest: Option<(String, GameTime)> = None;
        for (bank, collection) in store.collections() {
            let Some(since) = collection.orphaned_at().filter(|_| collection.is_orphaned()) else {
                continue;
            };
            if now.since(since) >= self.config.orphan_grace_secs {
                expired.push(bank.to_string());
            } else if needs_donor && oldest.as_ref().is_none_or(|(_, t)| since < *t) {
                oldest = Some((bank.to_string(), since));
            }
        }

        for bank in expired {
            info!(bank = %bank, "orphan grace period over");
            if store.flush_bank(world, &bank) {
                report.banks_flushed += 1;
            }
        }

        if let Some((bank, _)) = oldest {
            if store.unload_oldest_varieties(world, &bank, 1) > 0 {
                report.varieties_unloaded += 1;
            } else if store.flush_bank(world, &bank) {
                debug!(bank = %bank, "flushed oldest orphan to free memory");
                report.banks_flushed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::bank::BankCollection;
    use crate::budget::MemoryBudget;
    use crate::catalog::{BankDescriptor, Catalog, CatalogEntry};
    use crate::loading::CompletionQueue;
    use crate::metrics::GudsCounters;
    use crate::replication::LocalReplication;
    use crate::testing::{ScriptedLoader, TestWorld, marcus_catalog};
    use crate::types::Speaker;

    struct Fixture {
        store: BankStore,
        loader: ScriptedLoader,
        world: TestWorld,
        scheduler: StreamingScheduler,
        rng: StdRng,
    }

    fn catalog() -> Catalog {
        marcus_catalog().with_entry(
            "Dom",
            CatalogEntry {
                root: BankDescriptor::new("GUD_Dom", 400),
                varieties: vec![BankDescriptor::new("GUD_DomG1", 100)],
            },
        )
    }

    fn fixture(budget: u64, streaming: StreamingConfig) -> Fixture {
        let queue = CompletionQueue::new();
        let loader = ScriptedLoader::new(queue.clone());
        let store = BankStore::new(
            Arc::new(catalog()),
            MemoryBudget::new(budget),
            Box::new(loader.clone()),
            queue,
            Box::new(LocalReplication),
            Arc::new(GudsCounters::new()),
        );
        Fixture {
            store,
            loader,
            world: TestWorld::default(),
            scheduler: StreamingScheduler::new(streaming, &PriorityConfig::default()),
            rng: StdRng::seed_from_u64(5),
        }
    }

    impl Fixture {
        fn settle(&mut self, now: f64) {
            while self.loader.complete_all() > 0 {
                self.store.process_completions(&mut self.world, GameTime(now));
            }
        }

        fn register(&mut self, speaker: Speaker, bank: &str, now: f64) -> SpeakerId {
            let id = self.world.spawn(speaker);
            self.store
                .register_speaker(&mut self.world, id, bank, GameTime(now))
                .expect("register");
            self.settle(now);
            id
        }

        fn tick(&mut self, now: f64) -> Option<TickReport> {
            let report = self.scheduler.tick(
                &mut self.store,
                &mut self.world,
                &mut self.rng,
                GameTime(now),
            );
            self.settle(now);
            report
        }

        fn varieties(&self, bank: &str) -> usize {
            self.store
                .collection(bank)
                .map_or(0, BankCollection::loaded_variety_count)
        }
    }

    #[test]
    fn tier_prefers_player_then_primary_team() {
        let mut world = TestWorld::default();
        let mut player = Speaker::new("p", 3);
        player.locally_controlled = true;
        let p = world.spawn(player);
        let cog = world.spawn(Speaker::new("c", 0));
        let other = world.spawn(Speaker::new("o", 1));
        let primary = [0, 255];
        assert_eq!(PriorityTier::of(&world, &[other, p], &primary), PriorityTier::LocalPlayer);
        assert_eq!(PriorityTier::of(&world, &[other, cog], &primary), PriorityTier::Primary);
        assert_eq!(PriorityTier::of(&world, &[other], &primary), PriorityTier::Other);
        assert_eq!(PriorityTier::of(&world, &[], &primary), PriorityTier::Other);
    }

    #[test]
    fn respects_update_interval() {
        let mut f = fixture(10_000, StreamingConfig::default());
        assert!(f.tick(0.0).is_some());
        assert!(f.tick(0.5).is_none());
        assert!(f.tick(1.0).is_some());
        f.scheduler.force_next();
        assert!(f.tick(1.2).is_some());
    }

    #[test]
    fn deals_varieties_until_exhausted() {
        let mut f = fixture(10_000, StreamingConfig::default());
        f.register(Speaker::new("a", 0), "Marcus", 0.0);
        let first = f.tick(0.0).expect("ran");
        assert_eq!(first.loads_requested, 1);
        assert_eq!(f.varieties("Marcus"), 1);
        f.tick(1.0);
        assert_eq!(f.varieties("Marcus"), 2);
        let third = f.tick(2.0).expect("ran");
        assert_eq!(third.loads_requested, 0);
    }

    #[test]
    fn per_collection_cap_holds() {
        let streaming = StreamingConfig {
            variety_bank_cap: 1,
            ..StreamingConfig::default()
        };
        let mut f = fixture(10_000, streaming);
        f.register(Speaker::new("a", 0), "Marcus", 0.0);
        for t in 0..5 {
            f.tick(f64::from(t));
        }
        assert_eq!(f.varieties("Marcus"), 1);
    }

    #[test]
    fn over_budget_sheds_lowest_priority_first() {
        let mut f = fixture(1500, StreamingConfig::default());
        let mut player = Speaker::new("player", 0);
        player.locally_controlled = true;
        f.register(player, "Marcus", 0.0);
        f.tick(0.0);
        f.tick(1.0);
        assert_eq!(f.varieties("Marcus"), 2);
        assert_eq!(f.store.memory_report().used, 1500);

        // Dom's root pushes the store over budget; Dom has nothing to give.
        f.register(Speaker::new("dom", 3), "Dom", 2.0);
        let report = f.tick(2.0).expect("ran");
        assert!(report.over_budget);
        assert_eq!(report.varieties_unloaded, 1);
        f.tick(3.0);
        assert_eq!(f.varieties("Marcus"), 0);
        assert_eq!(f.store.memory_report().used, 1400);

        // Back under budget: dealing resumes where it fits.
        f.tick(4.0);
        assert!(f.store.memory_report().used <= 1500);
    }

    #[test]
    fn orphan_flushed_after_grace_period() {
        let mut f = fixture(10_000, StreamingConfig::default());
        let a = f.register(Speaker::new("a", 0), "Marcus", 0.0);
        f.store.unregister_speaker(&mut f.world, a, GameTime(1.0));

        f.tick(30.0);
        assert!(f.store.collection("Marcus").is_some());
        let report = f.tick(31.0).expect("ran");
        assert_eq!(report.banks_flushed, 1);
        assert!(f.store.collection("Marcus").is_none());
    }

    #[test]
    fn vanished_speaker_starts_orphan_clock() {
        let mut f = fixture(10_000, StreamingConfig::default());
        let a = f.register(Speaker::new("a", 0), "Marcus", 0.0);
        f.world.speakers.remove(a);
        f.tick(5.0);
        let c = f.store.collection("Marcus").expect("resident");
        assert_eq!(c.orphaned_at(), Some(GameTime(5.0)));
    }

    #[test]
    fn oldest_orphan_donates_when_no_active_donor() {
        let mut f = fixture(1300, StreamingConfig::default());
        let a = f.register(Speaker::new("a", 0), "Marcus", 0.0);
        f.store.unregister_speaker(&mut f.world, a, GameTime(1.0));
        // Dom's root tips the store over budget with no active varieties.
        f.register(Speaker::new("dom", 0), "Dom", 2.0);
        assert!(f.store.memory_report().is_over_budget());

        let report = f.tick(2.0).expect("ran");
        assert_eq!(report.banks_flushed, 1);
        assert!(f.store.collection("Marcus").is_none());
        assert!(f.store.collection("Dom").is_some());
    }

    #[test]
    fn rotation_swaps_a_variety() {
        let streaming = StreamingConfig {
            variety_bank_cap: 1,
            ..StreamingConfig::default()
        };
        let mut f = fixture(10_000, streaming);
        f.register(Speaker::new("a", 0), "Marcus", 0.0);
        f.tick(0.0);
        let before = f.store.collection("Marcus").expect("c").loaded_varieties();
        assert_eq!(before.len(), 1);

        f.tick(60.0);
        let after = f.store.collection("Marcus").expect("c").loaded_varieties();
        assert_eq!(after.len(), 1);
        assert_ne!(before, after);
    }

    #[test]
    fn streaming_disabled_still_expires_orphans() {
        let streaming = StreamingConfig {
            enabled: false,
            ..StreamingConfig::default()
        };
        let mut f = fixture(10_000, streaming);
        let a = f.register(Speaker::new("a", 0), "Marcus", 0.0);
        let report = f.tick(0.0).expect("ran");
        assert_eq!(report.loads_requested, 0);
        f.store.unregister_speaker(&mut f.world, a, GameTime(1.0));
        f.tick(40.0);
        assert!(f.store.collection("Marcus").is_none());
    }
}
