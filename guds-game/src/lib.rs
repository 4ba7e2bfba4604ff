//! # guds-game: Simulation Integration for GUDS
//!
//! This crate connects the game-agnostic `guds-core` library to a running
//! simulation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               Simulation                 │
//! │  ┌────────────────────────────────────┐  │
//! │  │            guds-game               │  │
//! │  │  ┌─────────────┐  ┌─────────────┐  │  │
//! │  │  │   Arena     │  │   Hooks     │  │  │
//! │  │  └──────┬──────┘  └──────┬──────┘  │  │
//! │  │         ▼                ▼         │  │
//! │  │    ┌──────────────────────────┐    │  │
//! │  │    │        guds-core         │    │  │
//! │  │    └──────────────────────────┘    │  │
//! │  │    ┌──────────────────────────┐    │  │
//! │  │    │       guds-loader        │    │  │
//! │  │    └──────────────────────────┘    │  │
//! │  └────────────────────────────────────┘  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `arena`: generation-checked speaker storage implementing the world boundary
//! - `replication`: channel-backed network bridge and client mirror
//! - `hooks`: gameplay occurrences to dialogue events
//! - `config`: platform profiles
//! - `admin`: debug console commands
//! - `logging`: tracing subscriber setup

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod admin;
pub mod arena;
pub mod config;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod replication;

pub use admin::{DebugCommand, run_test};
pub use arena::{Occluder, SpeakerArena, SpokenLine};
pub use config::{GameDialogueConfig, PlatformProfile};
pub use error::GameError;
pub use hooks::GameplayHooks;
pub use logging::init_tracing;
pub use replication::{BankSyncMessage, ClientBankMirror, NetReplication};
