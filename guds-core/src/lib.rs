//! # GUDS Core Library
//!
//! Engine-agnostic unscripted dialogue for game characters.
//!
//! Speakers register against a named dialogue bank. Each bank has a root
//! package and a list of variety packages; the root always loads, and
//! varieties are streamed in and out under a shared memory budget so the
//! pool of lines heard in play rotates over time.
//!
//! - **Catalog**: bank names to ordered package descriptors
//! - **Store**: loaded collections, the async load pipeline, orphans
//! - **Scheduler**: budget-aware dealing, shedding and rotation
//! - **Selection**: event gating, speaker and line choice, responses
//! - **Replication**: mirrors loaded packages to observers
//!
//! ## Threading
//!
//! Everything here runs on the game thread. Load services may complete on
//! any thread; completions land in a [`loading::CompletionQueue`] that the
//! manager drains once per tick.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bank;
pub mod budget;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod loading;
pub mod manager;
pub mod metrics;
pub mod pending;
pub mod replication;
pub mod scheduler;
pub mod selection;
pub mod store;
pub mod types;
pub mod world;

#[cfg(test)]
mod testing;

pub use catalog::Catalog;
pub use config::GudsConfig;
pub use error::GudsError;
pub use events::{EventTable, GudEvent};
pub use manager::DialogueManager;
pub use types::*;
pub use world::DialogueWorld;
