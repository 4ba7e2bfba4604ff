//! Memory budget enforcement.
//!
//! Sizes come from the catalog's approximate footprints. Resident slots
//! count as `used`; loads still in flight are charged separately so the
//! scheduler never admits a variety that would overshoot once it lands.

use crate::bank::BankCollection;
use crate::catalog::Catalog;

/// Memory usage measured at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReport {
    /// Bytes resident in collections.
    pub used: u64,
    /// Bytes charged by loads in flight.
    pub in_flight: u64,
    /// Configured budget.
    pub budget: u64,
    /// Number of resident slots.
    pub loaded_slots: usize,
}

impl MemoryReport {
    /// Resident bytes exceed the budget. Drives shedding.
    #[must_use]
    pub fn is_over_budget(&self) -> bool {
        self.used > self.budget
    }

    /// Room left once in-flight loads land.
    #[must_use]
    pub fn available(&self) -> u64 {
        self.budget
            .saturating_sub(self.used.saturating_add(self.in_flight))
    }

    /// Whether a variety of `size` bytes may be admitted.
    #[must_use]
    pub fn admits(&self, size: u64) -> bool {
        size > 0 && size <= self.available()
    }
}

/// Static budget plus the measuring logic.
#[derive(Debug, Clone, Copy)]
pub struct MemoryBudget {
    budget: u64,
}

impl MemoryBudget {
    /// Budget of `bytes`.
    #[must_use]
    pub fn new(bytes: u64) -> Self {
        Self { budget: bytes }
    }

    /// Configured bytes.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.budget
    }

    /// Sum resident slot sizes across `collections`.
    pub fn measure<'a, I>(&self, catalog: &Catalog, collections: I, in_flight: u64) -> MemoryReport
    where
        I: IntoIterator<Item = (&'a String, &'a BankCollection)>,
    {
        let mut used = 0u64;
        let mut loaded_slots = 0usize;
        for (bank, collection) in collections {
            for (slot, _) in collection.loaded_slots() {
                used += catalog.slot_size(bank, slot);
                loaded_slots += 1;
            }
        }
        MemoryReport {
            used,
            in_flight,
            budget: self.budget,
            loaded_slots,
        }
    }
}
