//! Runtime counters and span names.
//!
//! Lock-free `AtomicU64` counters incremented on the hot path and read on
//! dashboard export. The manager shares one [`GudsCounters`] between its
//! store and selection engine through an `Arc`.

use std::sync::atomic::{AtomicU64, Ordering};

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Atomic counters for streaming and selection activity.
#[derive(Debug)]
pub struct GudsCounters {
    /// Load requests handed to the load service.
    pub loads_issued: AtomicU64,
    /// Base packages resolved into a collection.
    pub loads_completed: AtomicU64,
    /// Loads the service reported as failed.
    pub load_failures: AtomicU64,
    /// Completions that arrived for cancelled loads.
    pub stale_completions: AtomicU64,
    /// Variety banks unloaded.
    pub varieties_unloaded: AtomicU64,
    /// Collections flushed.
    pub banks_flushed: AtomicU64,
    /// Events accepted by gating.
    pub events_triggered: AtomicU64,
    /// Events rejected by gating.
    pub events_rejected: AtomicU64,
    /// Lines handed to the audio layer.
    pub lines_spoken: AtomicU64,
}

impl GudsCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            loads_issued: AtomicU64::new(0),
            loads_completed: AtomicU64::new(0),
            load_failures: AtomicU64::new(0),
            stale_completions: AtomicU64::new(0),
            varieties_unloaded: AtomicU64::new(0),
            banks_flushed: AtomicU64::new(0),
            events_triggered: AtomicU64::new(0),
            events_rejected: AtomicU64::new(0),
            lines_spoken: AtomicU64::new(0),
        }
    }

    /// Increment one counter.
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            loads_issued: self.loads_issued.load(Ordering::Relaxed),
            loads_completed: self.loads_completed.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            stale_completions: self.stale_completions.load(Ordering::Relaxed),
            varieties_unloaded: self.varieties_unloaded.load(Ordering::Relaxed),
            banks_flushed: self.banks_flushed.load(Ordering::Relaxed),
            events_triggered: self.events_triggered.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            lines_spoken: self.lines_spoken.load(Ordering::Relaxed),
        }
    }
}

impl Default for GudsCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Load requests issued.
    pub loads_issued: u64,
    /// Loads resolved.
    pub loads_completed: u64,
    /// Failed loads.
    pub load_failures: u64,
    /// Stale completions discarded.
    pub stale_completions: u64,
    /// Varieties unloaded.
    pub varieties_unloaded: u64,
    /// Collections flushed.
    pub banks_flushed: u64,
    /// Events accepted.
    pub events_triggered: u64,
    /// Events rejected.
    pub events_rejected: u64,
    /// Lines spoken.
    pub lines_spoken: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows = [
            ("guds_loads_issued_total", "Bank load requests issued", self.loads_issued),
            ("guds_loads_completed_total", "Bank loads resolved", self.loads_completed),
            ("guds_load_failures_total", "Bank loads failed", self.load_failures),
            ("guds_stale_completions_total", "Stale load completions", self.stale_completions),
            ("guds_varieties_unloaded_total", "Variety banks unloaded", self.varieties_unloaded),
            ("guds_banks_flushed_total", "Bank collections flushed", self.banks_flushed),
            ("guds_events_triggered_total", "Events accepted by gating", self.events_triggered),
            ("guds_events_rejected_total", "Events rejected by gating", self.events_rejected),
            ("guds_lines_spoken_total", "Lines handed to audio", self.lines_spoken),
        ];
        let mut out = String::new();
        for (name, help, value) in rows {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"
            ));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tracing span names
// ---------------------------------------------------------------------------

/// Span names used by the manager.
pub mod spans {
    /// One manager tick.
    pub const TICK: &str = "guds::tick";
    /// One scheduler pass.
    pub const STREAMING: &str = "guds::streaming";
    /// Resolving an event to a line.
    pub const SELECTION: &str = "guds::selection";
}
