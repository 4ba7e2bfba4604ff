//! # guds-loader: Package Loaders for GUDS
//!
//! Implementations of [`guds_core::loading::LoadService`]:
//!   - [`FileLoadService`] reads `<load_id>.json` packages from a directory
//!     on a tokio runtime
//!   - [`InMemoryLoadService`] holds packages in memory and completes on
//!     demand, for servers without audio and for tests
//!
//! Both deliver results through the shared completion queue; neither ever
//! completes synchronously inside `load_async`.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod file;
pub mod memory;

pub use error::LoadError;
pub use file::FileLoadService;
pub use memory::InMemoryLoadService;
