//! Network replication of resident bank packages.
//!
//! The server side hands [`NetReplication`] to the dialogue manager; every
//! connected observer gets an unbounded tokio channel of [`BankSyncMessage`]s.
//! Clients feed what they receive into a [`ClientBankMirror`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use guds_core::replication::{ObserverId, ReplicationBridge};
use guds_core::types::LoadId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// One replication message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BankSyncMessage {
    /// A package became resident on the server.
    Loaded(LoadId),
    /// A package was released on the server.
    Unloaded(LoadId),
    /// Full resident set, sent to a newly connected observer.
    Snapshot(Vec<LoadId>),
}

type Observers = BTreeMap<ObserverId, UnboundedSender<BankSyncMessage>>;

/// Server-side bridge fanning slot transitions out to observers.
///
/// Clones share the observer table, so the host keeps one handle to
/// connect clients while the manager owns another.
#[derive(Clone, Default)]
pub struct NetReplication {
    observers: Arc<Mutex<Observers>>,
}

impl NetReplication {
    /// Bridge with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect an observer and return its message stream. Call
    /// `DialogueManager::replicate_all` afterwards to send the snapshot.
    pub fn connect(&self, observer: ObserverId) -> UnboundedReceiver<BankSyncMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.lock().insert(observer, tx);
        debug!(observer = observer.0, "replication observer connected");
        rx
    }

    /// Drop an observer.
    pub fn disconnect(&self, observer: ObserverId) -> bool {
        self.observers.lock().remove(&observer).is_some()
    }

    /// Connected observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    fn broadcast(&self, message: &BankSyncMessage) {
        let mut observers = self.observers.lock();
        observers.retain(|id, tx| {
            let ok = tx.send(message.clone()).is_ok();
            if !ok {
                debug!(observer = id.0, "replication observer gone");
            }
            ok
        });
    }
}

impl ReplicationBridge for NetReplication {
    fn notify_loaded(&mut self, load_id: &LoadId) {
        self.broadcast(&BankSyncMessage::Loaded(load_id.clone()));
    }

    fn notify_unloaded(&mut self, load_id: &LoadId) {
        self.broadcast(&BankSyncMessage::Unloaded(load_id.clone()));
    }

    fn bulk_sync(&mut self, observer: ObserverId, loaded: &[LoadId]) {
        let mut observers = self.observers.lock();
        let Some(tx) = observers.get(&observer) else {
            warn!(observer = observer.0, "bulk sync for unknown observer");
            return;
        };
        if tx.send(BankSyncMessage::Snapshot(loaded.to_vec())).is_err() {
            observers.remove(&observer);
        }
    }
}

impl std::fmt::Debug for NetReplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetReplication")
            .field("observers", &self.observer_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// Client-side copy of the server's resident package set.
#[derive(Debug, Default, Clone)]
pub struct ClientBankMirror {
    loaded: BTreeSet<LoadId>,
}

impl ClientBankMirror {
    /// Empty mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one message. Returns whether the mirror changed.
    pub fn apply(&mut self, message: BankSyncMessage) -> bool {
        match message {
            BankSyncMessage::Loaded(id) => self.loaded.insert(id),
            BankSyncMessage::Unloaded(id) => {
                let removed = self.loaded.remove(&id);
                if !removed {
                    warn!(load_id = %id, "unload for a package the client never saw");
                }
                removed
            }
            BankSyncMessage::Snapshot(ids) => {
                let next: BTreeSet<LoadId> = ids.into_iter().collect();
                let changed = next != self.loaded;
                self.loaded = next;
                changed
            }
        }
    }

    /// Apply everything currently waiting on `rx`.
    pub fn drain(&mut self, rx: &mut UnboundedReceiver<BankSyncMessage>) -> usize {
        let mut n = 0;
        while let Ok(message) = rx.try_recv() {
            self.apply(message);
            n += 1;
        }
        n
    }

    /// Whether a package is resident.
    #[must_use]
    pub fn is_loaded(&self, load_id: &LoadId) -> bool {
        self.loaded.contains(load_id)
    }

    /// Resident packages, sorted.
    pub fn loaded(&self) -> impl Iterator<Item = &LoadId> {
        self.loaded.iter()
    }

    /// Number of resident packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    /// Whether nothing is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}
