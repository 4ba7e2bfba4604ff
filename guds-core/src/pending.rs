//! Pending-load tracker.
//!
//! At most one load is in flight per bank name. A load walks
//! `LoadingLocalized -> LoadingBase -> (resolved)`, skipping the localized
//! stage when no localized package exists. Speakers registering while a
//! load is in flight are appended to the same record.

use std::collections::HashMap;

use crate::types::{BankSlot, GameTime, LoadId, SpeakerId};

/// Where a pending load is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    /// The localized resource package is loading; the base follows.
    LoadingLocalized,
    /// The base bank package is loading.
    LoadingBase,
    /// The load service reported failure. Kept so registrations do not
    /// retry; no longer charged against the budget.
    Failed,
}

/// One in-flight (or failed) load.
#[derive(Debug, Clone)]
pub struct PendingLoad {
    /// Bank the load belongs to.
    pub bank_name: String,
    /// Slot being filled.
    pub slot: BankSlot,
    /// Current stage.
    pub stage: LoadStage,
    /// Package currently requested from the load service.
    pub load_id: LoadId,
    /// Speakers waiting on this load, deduplicated.
    pub speakers: Vec<SpeakerId>,
    /// Bytes charged against the budget while in flight.
    pub approx_size: u64,
    /// When the load was first requested.
    pub requested_at: GameTime,
}

impl PendingLoad {
    /// Whether the load still counts as in flight.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.stage != LoadStage::Failed
    }

    fn add_speaker(&mut self, id: SpeakerId) {
        if !self.speakers.contains(&id) {
            self.speakers.push(id);
        }
    }
}

/// All pending loads, keyed by bank name with a reverse index by load id.
#[derive(Debug, Default)]
pub struct PendingLoads {
    by_bank: HashMap<String, PendingLoad>,
    by_load_id: HashMap<LoadId, String>,
}

impl PendingLoads {
    /// Empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending record for a bank.
    #[must_use]
    pub fn get(&self, bank_name: &str) -> Option<&PendingLoad> {
        self.by_bank.get(bank_name)
    }

    /// Whether a bank has a pending record.
    #[must_use]
    pub fn contains(&self, bank_name: &str) -> bool {
        self.by_bank.contains_key(bank_name)
    }

    /// Whether `slot` of `bank_name` is being loaded.
    #[must_use]
    pub fn is_loading(&self, bank_name: &str, slot: BankSlot) -> bool {
        self.by_bank
            .get(bank_name)
            .is_some_and(|p| p.slot == slot && p.is_in_flight())
    }

    /// Record that expects a completion for `load_id`.
    #[must_use]
    pub fn find_by_load_id(&self, load_id: &LoadId) -> Option<&PendingLoad> {
        self.by_load_id
            .get(load_id)
            .and_then(|bank| self.by_bank.get(bank))
    }

    /// Track a new load. Refused if the bank already has one.
    pub fn insert(&mut self, load: PendingLoad) -> bool {
        if self.by_bank.contains_key(&load.bank_name) {
            return false;
        }
        self.by_load_id
            .insert(load.load_id.clone(), load.bank_name.clone());
        self.by_bank.insert(load.bank_name.clone(), load);
        true
    }

    /// Append a waiting speaker to a bank's pending record.
    pub fn add_speaker(&mut self, bank_name: &str, id: SpeakerId) -> bool {
        match self.by_bank.get_mut(bank_name) {
            Some(load) => {
                load.add_speaker(id);
                true
            }
            None => false,
        }
    }

    /// Drop a speaker from every pending record.
    pub fn remove_speaker(&mut self, id: SpeakerId) {
        for load in self.by_bank.values_mut() {
            load.speakers.retain(|s| *s != id);
        }
    }

    /// Drop waiting speakers that no longer resolve, then abandon failed
    /// loads nobody waits on. Returns the abandoned bank names.
    pub fn prune<F>(&mut self, mut is_live: F) -> Vec<String>
    where
        F: FnMut(SpeakerId) -> bool,
    {
        for load in self.by_bank.values_mut() {
            load.speakers.retain(|s| is_live(*s));
        }
        let abandoned: Vec<String> = self
            .by_bank
            .values()
            .filter(|p| !p.is_in_flight() && p.speakers.is_empty())
            .map(|p| p.bank_name.clone())
            .collect();
        for bank in &abandoned {
            self.cancel_bank(bank);
        }
        abandoned
    }

    /// Move a localized load on to its base package.
    pub fn advance_to_base(&mut self, bank_name: &str, base_id: LoadId) -> bool {
        let Some(load) = self.by_bank.get_mut(bank_name) else {
            return false;
        };
        self.by_load_id.remove(&load.load_id);
        load.load_id = base_id.clone();
        load.stage = LoadStage::LoadingBase;
        self.by_load_id.insert(base_id, bank_name.to_string());
        true
    }

    /// Mark a bank's load as failed. The record stays as a tombstone.
    pub fn mark_failed(&mut self, bank_name: &str) {
        if let Some(load) = self.by_bank.get_mut(bank_name) {
            self.by_load_id.remove(&load.load_id);
            load.stage = LoadStage::Failed;
        }
    }

    /// Remove and return the record expecting `load_id`.
    pub fn take(&mut self, load_id: &LoadId) -> Option<PendingLoad> {
        let bank = self.by_load_id.remove(load_id)?;
        self.by_bank.remove(&bank)
    }

    /// Remove whatever is pending for a bank.
    pub fn cancel_bank(&mut self, bank_name: &str) -> Option<PendingLoad> {
        let load = self.by_bank.remove(bank_name)?;
        self.by_load_id.remove(&load.load_id);
        Some(load)
    }

    /// Bytes charged by loads still in flight.
    #[must_use]
    pub fn in_flight_bytes(&self) -> u64 {
        self.by_bank
            .values()
            .filter(|p| p.is_in_flight())
            .map(|p| p.approx_size)
            .sum()
    }

    /// Iterate pending records.
    pub fn iter(&self) -> impl Iterator<Item = &PendingLoad> {
        self.by_bank.values()
    }

    /// Number of records (failed tombstones included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_bank.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_bank.is_empty()
    }
}
