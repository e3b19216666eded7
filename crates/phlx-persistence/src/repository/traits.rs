//! # Repository Traits
//!
//! Abstract repository interfaces for the aggregate roots.
//! Implementations can be swapped for different backends (document store,
//! mock, etc.)
//!
//! Every `save_*` takes the revision the caller loaded the aggregate at
//! ([`NEW_REVISION`](crate::NEW_REVISION) for a create) and returns the new
//! revision.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::{Revision, Versioned};
use phlx_domain::{
    Asset, CommandFilter, FireEvent, Location, MonitoredLocation, Pagination, TacticalCommand,
};

// =============================================================================
// LOCATION REPOSITORY
// =============================================================================

/// Repository for Location aggregates (areas are stored inline)
#[async_trait]
pub trait LocationRepository: Send + Sync {
    /// Get location by ID
    async fn get_location(&self, location_id: Uuid) -> Result<Option<Versioned<Location>>>;

    /// All locations, oldest first
    async fn list_locations(&self, page: Pagination) -> Result<Vec<Location>>;

    async fn save_location(&self, location: &Location, expected: Revision) -> Result<Revision>;

    /// Delete location; `NotFound` if absent
    async fn delete_location(&self, location_id: Uuid) -> Result<()>;
}

// =============================================================================
// ASSET REPOSITORY
// =============================================================================

/// Repository for tracked assets
#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn get_asset(&self, asset_id: Uuid) -> Result<Option<Versioned<Asset>>>;

    /// All assets ordered by name
    async fn list_assets(&self) -> Result<Vec<Asset>>;

    async fn save_asset(&self, asset: &Asset, expected: Revision) -> Result<Revision>;
}

// =============================================================================
// MONITORED LOCATION REPOSITORY
// =============================================================================

/// Repository for places whose fire risk is tracked
#[async_trait]
pub trait MonitoredLocationRepository: Send + Sync {
    async fn get_monitored(&self, location_id: Uuid) -> Result<Option<MonitoredLocation>>;

    async fn list_monitored(&self) -> Result<Vec<MonitoredLocation>>;

    /// Insert or replace
    async fn put_monitored(&self, location: &MonitoredLocation) -> Result<()>;
}

// =============================================================================
// FIRE EVENT REPOSITORY
// =============================================================================

/// Repository for fire events. Events are never deleted.
#[async_trait]
pub trait FireEventRepository: Send + Sync {
    async fn get_fire_event(&self, event_id: Uuid) -> Result<Option<Versioned<FireEvent>>>;

    /// The open (active or acknowledged) event for a location, if any
    async fn find_open_fire_event(
        &self,
        location_id: Uuid,
    ) -> Result<Option<Versioned<FireEvent>>>;

    /// Every event recorded for a location, oldest first
    async fn fire_event_history(&self, location_id: Uuid) -> Result<Vec<FireEvent>>;

    async fn save_fire_event(&self, event: &FireEvent, expected: Revision) -> Result<Revision>;
}

// =============================================================================
// COMMAND REPOSITORY
// =============================================================================

/// Repository for tactical commands
#[async_trait]
pub trait CommandRepository: Send + Sync {
    async fn get_command(&self, command_id: Uuid) -> Result<Option<Versioned<TacticalCommand>>>;

    /// Commands matching `filter`, newest first
    async fn list_commands(
        &self,
        filter: &CommandFilter,
        page: Pagination,
    ) -> Result<Vec<TacticalCommand>>;

    async fn save_command(&self, command: &TacticalCommand, expected: Revision)
    -> Result<Revision>;
}
