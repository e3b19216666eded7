//! # PHLX Persistence Library
//!
//! Persistence collaborator for the core engines.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Service Layer                          │
//! │             (load -> mutate aggregate -> save)               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Repository Traits                         │
//! │  (Location, Asset, MonitoredLocation, FireEvent, Command)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      InMemoryStore                           │
//! │         (JSON documents, one revision per document)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every stored aggregate carries a [`Revision`]. A save names the revision
//! it was loaded at and fails with [`PersistenceError::WriteConflict`] when
//! the stored document has moved on. Conflicts are surfaced, never merged.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use phlx_persistence::{InMemoryStore, LocationRepository, NEW_REVISION};
//!
//! let store = InMemoryStore::shared();
//! let rev = store.save_location(&location, NEW_REVISION).await?;
//! let loaded = store.get_location(location.id).await?;
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};

pub mod error;
pub mod repository;

pub use error::{PersistenceError, Result};
pub use repository::{
    AssetRepository, CommandRepository, FireEventRepository, InMemoryStore, LocationRepository,
    MonitoredLocationRepository, SharedStore,
};

/// Monotonic per-document revision. `0` means "not stored yet".
pub type Revision = u64;

/// Expected revision when creating a document
pub const NEW_REVISION: Revision = 0;

/// A stored value together with the revision it was read at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub revision: Revision,
    pub value: T,
}

impl<T> Versioned<T> {
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
