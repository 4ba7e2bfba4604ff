//! Replication bridge boundary.
//!
//! Remote observers mirror which bank packages the authority has resident.
//! Every slot transition fires exactly one notification; a newly connected
//! observer receives the full set through [`ReplicationBridge::bulk_sync`].

use crate::types::LoadId;

/// Identifier of a remote observer (client connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u32);

/// Transport for load/unload state. Implementations decide whether this is
/// a network RPC or a local no-op.
pub trait ReplicationBridge: Send {
    /// A package became resident.
    fn notify_loaded(&mut self, load_id: &LoadId);

    /// A package was released.
    fn notify_unloaded(&mut self, load_id: &LoadId);

    /// Tell one observer about everything currently resident.
    fn bulk_sync(&mut self, observer: ObserverId, loaded: &[LoadId]);
}

/// Bridge for standalone sessions with no remote observers.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalReplication;

impl ReplicationBridge for LocalReplication {
    fn notify_loaded(&mut self, _load_id: &LoadId) {}

    fn notify_unloaded(&mut self, _load_id: &LoadId) {}

    fn bulk_sync(&mut self, _observer: ObserverId, _loaded: &[LoadId]) {}
}
