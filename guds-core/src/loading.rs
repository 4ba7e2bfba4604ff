//! Async load service boundary and the completion queue.
//!
//! Package loads run off the tick thread. A [`LoadService`] accepts a
//! request and returns immediately; when the package is resident it pushes a
//! [`LoadCompletion`] onto the [`CompletionQueue`] it was built with. The
//! dialogue manager drains that queue once per tick, so every state change
//! still happens on the single logical thread that drives the tick loop.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bank::BankData;
use crate::types::LoadId;

/// Asynchronous package loader.
///
/// The dialogue system never issues a second request for a load id while
/// one is outstanding, so implementations need not de-duplicate.
pub trait LoadService: Send {
    /// Whether a package with this id can be loaded at all.
    fn package_exists(&self, load_id: &LoadId) -> bool;

    /// Start loading. The result must be delivered through the completion
    /// queue, never synchronously through the return value.
    fn load_async(&mut self, load_id: &LoadId);
}

/// What a successful load produced.
#[derive(Debug, Clone)]
pub enum LoadedPackage {
    /// A bank package with lines and actions.
    Bank(BankData),
    /// A localized resource package with no bank content of its own.
    Resources,
}

/// Why a load failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    /// Human-readable reason.
    pub reason: String,
}

impl LoadFailure {
    /// Build a failure from any displayable reason.
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

/// Outcome of one `load_async` call.
#[derive(Debug, Clone)]
pub struct LoadCompletion {
    /// Package that was requested.
    pub load_id: LoadId,
    /// Loaded content or failure.
    pub outcome: Result<LoadedPackage, LoadFailure>,
}

/// Shared FIFO of load completions.
///
/// Cloning yields another handle to the same queue: the load service keeps
/// one to push, the manager keeps one to drain.
#[derive(Clone, Default)]
pub struct CompletionQueue {
    inner: Arc<Mutex<CompletionQueueInner>>,
}

#[derive(Default)]
struct CompletionQueueInner {
    queue: VecDeque<LoadCompletion>,
    total_pushed: u64,
    total_drained: u64,
}

/// Queue counters.
#[derive(Debug, Clone, Copy)]
pub struct CompletionQueueStats {
    /// Completions waiting to be drained.
    pub depth: usize,
    /// Completions ever pushed.
    pub total_pushed: u64,
    /// Completions ever drained.
    pub total_drained: u64,
}

impl CompletionQueue {
    /// New empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a completion (any thread).
    pub fn push(&self, completion: LoadCompletion) {
        let mut inner = self.inner.lock();
        inner.total_pushed += 1;
        inner.queue.push_back(completion);
    }

    /// Take everything queued so far, in arrival order.
    pub fn drain(&self) -> Vec<LoadCompletion> {
        let mut inner = self.inner.lock();
        let drained: Vec<_> = inner.queue.drain(..).collect();
        inner.total_drained += drained.len() as u64;
        drained
    }

    /// Current depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    /// Queue statistics.
    #[must_use]
    pub fn stats(&self) -> CompletionQueueStats {
        let inner = self.inner.lock();
        CompletionQueueStats {
            depth: inner.queue.len(),
            total_pushed: inner.total_pushed,
            total_drained: inner.total_drained,
        }
    }
}

impl std::fmt::Debug for CompletionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionQueue")
            .field("stats", &self.stats())
            .finish()
    }
}
