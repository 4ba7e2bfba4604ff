//! Bank catalog (table of contents).
//!
//! Immutable map from bank name to the root and variety package descriptors
//! for that bank. Built once at startup from TOML:
//!
//! ```toml
//! [banks.Marcus]
//! root = { package = "GUD_Marcus", approx_size = 120000 }
//! varieties = [
//!     { package = "GUD_MarcusG1", approx_size = 40000 },
//!     { package = "GUD_MarcusG2", approx_size = 40000 },
//! ]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GudsError, Result};
use crate::types::{BankSlot, LoadId};

/// Suffix of every seek-free bank package.
pub const SEEKFREE_SUFFIX: &str = "_SF";
/// Suffix appended to a package id for its localized variant.
pub const LOCALIZED_SUFFIX: &str = "_LOC";

/// One loadable package and its approximate resident size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDescriptor {
    /// Package base name, without suffixes.
    pub package: String,
    /// Approximate resident bytes once loaded.
    #[serde(default)]
    pub approx_size: u64,
}

impl BankDescriptor {
    /// Build a descriptor.
    #[must_use]
    pub fn new(package: impl Into<String>, approx_size: u64) -> Self {
        Self {
            package: package.into(),
            approx_size,
        }
    }

    /// Id of the base package.
    #[must_use]
    pub fn load_id(&self) -> LoadId {
        LoadId(format!("{}{SEEKFREE_SUFFIX}", self.package))
    }

    /// Id of the localized package.
    #[must_use]
    pub fn localized_load_id(&self) -> LoadId {
        LoadId(format!("{}{SEEKFREE_SUFFIX}{LOCALIZED_SUFFIX}", self.package))
    }
}

/// Root plus ordered varieties for one bank name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Always-resident root bank.
    pub root: BankDescriptor,
    /// Alternate-take banks, streamed in and out.
    #[serde(default)]
    pub varieties: Vec<BankDescriptor>,
}

impl CatalogEntry {
    /// Descriptor for a slot, if the slot exists.
    #[must_use]
    pub fn descriptor(&self, slot: BankSlot) -> Option<&BankDescriptor> {
        match slot {
            BankSlot::Root => Some(&self.root),
            BankSlot::Variety(v) => self.varieties.get(v),
        }
    }

    /// Number of variety banks.
    #[must_use]
    pub fn variety_count(&self) -> usize {
        self.varieties.len()
    }

    /// Number of slots including the root.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.varieties.len() + 1
    }
}

/// Process-wide table of contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    banks: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a TOML string.
    ///
    /// # Errors
    /// Returns `GudsError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| GudsError::Config(e.to_string()))
    }

    /// Load a catalog from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Builder: add or replace an entry.
    #[must_use]
    pub fn with_entry(mut self, bank_name: impl Into<String>, entry: CatalogEntry) -> Self {
        self.banks.insert(bank_name.into(), entry);
        self
    }

    /// Look up a bank.
    #[must_use]
    pub fn get(&self, bank_name: &str) -> Option<&CatalogEntry> {
        self.banks.get(bank_name)
    }

    /// Look up a bank, failing with `CatalogMiss`.
    ///
    /// # Errors
    /// Returns `GudsError::CatalogMiss` if the bank is unknown.
    pub fn entry(&self, bank_name: &str) -> Result<&CatalogEntry> {
        self.get(bank_name)
            .ok_or_else(|| GudsError::CatalogMiss(bank_name.to_string()))
    }

    /// Approximate size of a slot, zero if unknown.
    #[must_use]
    pub fn slot_size(&self, bank_name: &str, slot: BankSlot) -> u64 {
        self.get(bank_name)
            .and_then(|e| e.descriptor(slot))
            .map_or(0, |d| d.approx_size)
    }

    /// Resolve a completed base package back to its slot in `bank_name`.
    ///
    /// The package name with its seek-free suffix stripped must match the
    /// root or one of the varieties.
    #[must_use]
    pub fn resolve_slot(&self, bank_name: &str, load_id: &LoadId) -> Option<BankSlot> {
        let entry = self.get(bank_name)?;
        let package = load_id
            .as_str()
            .strip_suffix(SEEKFREE_SUFFIX)
            .unwrap_or(load_id.as_str());
        if entry.root.package == package {
            return Some(BankSlot::Root);
        }
        entry
            .varieties
            .iter()
            .position(|d| d.package == package)
            .map(BankSlot::Variety)
    }

    /// Iterate bank names in stable order.
    pub fn bank_names(&self) -> impl Iterator<Item = &str> {
        self.banks.keys().map(String::as_str)
    }

    /// Number of banks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.banks.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }
}
