//! In-memory package loader with manual completion.
//!
//! Requests are parked until the host calls [`InMemoryLoadService::complete_next`]
//! or [`InMemoryLoadService::complete_all`], which makes load timing fully
//! deterministic. Used by integration tests and benchmarks.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use guds_core::bank::BankData;
use guds_core::catalog::{Catalog, LOCALIZED_SUFFIX};
use guds_core::loading::{CompletionQueue, LoadCompletion, LoadFailure, LoadService, LoadedPackage};
use guds_core::types::{BankSlot, LoadId};
use parking_lot::Mutex;

#[derive(Default)]
struct State {
    banks: HashMap<LoadId, BankData>,
    localized: HashSet<LoadId>,
    failing: HashSet<LoadId>,
    outstanding: VecDeque<LoadId>,
    requests: Vec<LoadId>,
}

/// Loader backed by a map of package contents.
///
/// Cloning yields another handle to the same state, so a test can keep one
/// to drive completions after handing the other to the dialogue manager.
#[derive(Clone)]
pub struct InMemoryLoadService {
    state: Arc<Mutex<State>>,
    queue: CompletionQueue,
}

impl InMemoryLoadService {
    /// Empty service completing into `queue`.
    #[must_use]
    pub fn new(queue: CompletionQueue) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            queue,
        }
    }

    /// Register an empty bank package for every slot in the catalog.
    #[must_use]
    pub fn with_catalog(self, catalog: &Catalog) -> Self {
        for name in catalog.bank_names() {
            let Some(entry) = catalog.get(name) else {
                continue;
            };
            for idx in 0..entry.slot_count() {
                if let Some(d) = entry.descriptor(BankSlot::from_index(idx)) {
                    self.insert_bank(d.load_id(), BankData::default());
                }
            }
        }
        self
    }

    /// Add or replace a bank package.
    pub fn insert_bank(&self, load_id: LoadId, data: BankData) {
        self.state.lock().banks.insert(load_id, data);
    }

    /// Add a localized resource package.
    pub fn insert_localized(&self, load_id: LoadId) {
        self.state.lock().localized.insert(load_id);
    }

    /// Make every future completion of this package a failure.
    pub fn fail(&self, load_id: LoadId) {
        self.state.lock().failing.insert(load_id);
    }

    /// Every id ever requested, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<LoadId> {
        self.state.lock().requests.clone()
    }

    /// Requests not yet completed.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding.len()
    }

    /// Outstanding request ids, oldest first.
    #[must_use]
    pub fn outstanding_ids(&self) -> Vec<LoadId> {
        self.state.lock().outstanding.iter().cloned().collect()
    }

    /// Complete the oldest outstanding request. Returns `false` if none.
    pub fn complete_next(&self) -> bool {
        let completion = {
            let mut state = self.state.lock();
            let Some(load_id) = state.outstanding.pop_front() else {
                return false;
            };
            let outcome = if state.failing.contains(&load_id) {
                Err(LoadFailure::new("injected failure"))
            } else if state.localized.contains(&load_id) {
                Ok(LoadedPackage::Resources)
            } else if let Some(data) = state.banks.get(&load_id) {
                Ok(LoadedPackage::Bank(data.clone()))
            } else {
                Err(LoadFailure::new(format!("no package {load_id}")))
            };
            LoadCompletion { load_id, outcome }
        };
        self.queue.push(completion);
        true
    }

    /// Complete everything outstanding, including requests issued while
    /// completing. Returns how many were completed.
    pub fn complete_all(&self) -> usize {
        let mut n = 0;
        while self.complete_next() {
            n += 1;
        }
        n
    }
}

impl LoadService for InMemoryLoadService {
    fn package_exists(&self, load_id: &LoadId) -> bool {
        let state = self.state.lock();
        if load_id.as_str().ends_with(LOCALIZED_SUFFIX) {
            state.localized.contains(load_id)
        } else {
            state.banks.contains_key(load_id) || state.failing.contains(load_id)
        }
    }

    fn load_async(&mut self, load_id: &LoadId) {
        let mut state = self.state.lock();
        state.requests.push(load_id.clone());
        state.outstanding.push_back(load_id.clone());
    }
}

impl std::fmt::Debug for InMemoryLoadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryLoadService")
            .field("banks", &state.banks.len())
            .field("outstanding", &state.outstanding.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use guds_core::catalog::{BankDescriptor, CatalogEntry};

    use super::*;

    fn id(s: &str) -> LoadId {
        LoadId(s.into())
    }

    #[test]
    fn completes_in_request_order() {
        let queue = CompletionQueue::new();
        let mut service = InMemoryLoadService::new(queue.clone());
        service.insert_bank(id("A_SF"), BankData::default());
        service.insert_localized(id("B_SF_LOC"));
        service.load_async(&id("A_SF"));
        service.load_async(&id("B_SF_LOC"));
        assert_eq!(service.outstanding(), 2);
        assert_eq!(service.outstanding_ids()[1], id("B_SF_LOC"));
        assert!(queue.is_empty());

        assert_eq!(service.complete_all(), 2);
        let done = queue.drain();
        assert_eq!(done[0].load_id, id("A_SF"));
        assert!(matches!(done[0].outcome, Ok(LoadedPackage::Bank(_))));
        assert!(matches!(done[1].outcome, Ok(LoadedPackage::Resources)));
    }

    #[test]
    fn existence_follows_registered_packages() {
        let service = InMemoryLoadService::new(CompletionQueue::new());
        service.insert_bank(id("A_SF"), BankData::default());
        service.fail(id("C_SF"));
        assert!(service.package_exists(&id("A_SF")));
        assert!(service.package_exists(&id("C_SF")));
        assert!(!service.package_exists(&id("A_SF_LOC")));
        assert!(!service.package_exists(&id("Z_SF")));
    }

    #[test]
    fn injected_and_unknown_failures() {
        let queue = CompletionQueue::new();
        let mut service = InMemoryLoadService::new(queue.clone());
        service.fail(id("C_SF"));
        service.load_async(&id("C_SF"));
        service.load_async(&id("Z_SF"));
        service.complete_all();
        assert!(queue.drain().iter().all(|c| c.outcome.is_err()));
    }

    #[test]
    fn catalog_seeding_covers_every_slot() {
        let catalog = Catalog::new().with_entry(
            "Dom",
            CatalogEntry {
                root: BankDescriptor::new("GUD_Dom", 10),
                varieties: vec![BankDescriptor::new("GUD_DomG1", 5)],
            },
        );
        let service = InMemoryLoadService::new(CompletionQueue::new()).with_catalog(&catalog);
        assert!(service.package_exists(&id("GUD_Dom_SF")));
        assert!(service.package_exists(&id("GUD_DomG1_SF")));
    }
}
