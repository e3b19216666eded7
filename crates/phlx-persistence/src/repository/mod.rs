//! # Repository Module
//!
//! Repository traits per aggregate root, plus the in-memory implementation
//! used by tests and the replay binary.

pub mod memory;
pub mod traits;

pub use memory::{InMemoryStore, SharedStore};
pub use traits::{
    AssetRepository, CommandRepository, FireEventRepository, LocationRepository,
    MonitoredLocationRepository,
};
