//! Geofence membership orchestration.
//!
//! Keeps the last published membership per location and publishes only the
//! difference after every asset move or area change.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use phlx_domain::{
    Actor, Area, AreaUpdate, Asset, Location, Membership, MembershipChange, NewArea, Position,
};
use phlx_persistence::{
    AssetRepository, LocationRepository, NEW_REVISION, PersistenceError, Revision, Versioned,
};

use crate::config::Topic;
use crate::error::Result;
use crate::events::{Publisher, event_types};

/// Membership changes within one location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipDelta {
    pub location_id: Uuid,
    pub changes: Vec<MembershipChange>,
}

#[derive(Serialize)]
struct AreaChanged<'a> {
    location_id: Uuid,
    action: &'a str,
    area: &'a Area,
    changed_by: Option<&'a str>,
}

pub struct GeofenceService {
    locations: Arc<dyn LocationRepository>,
    assets: Arc<dyn AssetRepository>,
    publisher: Publisher,
    published: RwLock<HashMap<Uuid, Membership>>,
}

impl GeofenceService {
    pub fn new(
        locations: Arc<dyn LocationRepository>,
        assets: Arc<dyn AssetRepository>,
        publisher: Publisher,
    ) -> Self {
        Self {
            locations,
            assets,
            publisher,
            published: RwLock::new(HashMap::new()),
        }
    }

    async fn load(&self, location_id: Uuid) -> Result<Versioned<Location>> {
        self.locations
            .get_location(location_id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Location", location_id).into())
    }

    /// Store a new location and publish its initial membership.
    ///
    /// # Errors
    ///
    /// Persistence or transport failures.
    pub async fn register_location(&self, location: &Location) -> Result<MembershipDelta> {
        self.locations.save_location(location, NEW_REVISION).await?;
        tracing::info!(location_id = %location.id, name = %location.name, "Location registered");
        self.refresh(location.id).await
    }

    /// Store a new asset without re-evaluating membership.
    ///
    /// # Errors
    ///
    /// Persistence failures.
    pub async fn register_asset(&self, asset: &Asset) -> Result<Revision> {
        Ok(self.assets.save_asset(asset, NEW_REVISION).await?)
    }

    /// Current membership of a location, computed from stored state.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown location.
    pub async fn membership(&self, location_id: Uuid) -> Result<Membership> {
        let location = self.load(location_id).await?.into_inner();
        let assets = self.assets.list_assets().await?;
        Ok(location.membership(&assets))
    }

    /// Recompute a location's membership and publish the change set, if any.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown location; persistence or transport failures.
    pub async fn refresh(&self, location_id: Uuid) -> Result<MembershipDelta> {
        // held across the snapshot so diffs follow commit order
        let mut published = self.published.write().await;
        let current = self.membership(location_id).await?;
        let previous = published.get(&location_id).cloned().unwrap_or_default();
        let changes = current.diff(&previous);

        let delta = MembershipDelta {
            location_id,
            changes,
        };
        if delta.changes.is_empty() {
            tracing::debug!(%location_id, "Membership unchanged");
        } else {
            tracing::info!(%location_id, changes = delta.changes.len(), "Membership changed");
            self.publisher
                .publish(
                    Topic::LocationUpdates,
                    event_types::GEOFENCE_MEMBERSHIP_CHANGED,
                    &delta,
                )
                .await?;
        }
        published.insert(location_id, current);
        Ok(delta)
    }

    /// Record a position report and re-evaluate every location.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown asset, `WriteConflict` when the asset was
    /// saved concurrently.
    pub async fn update_asset_position(
        &self,
        asset_id: Uuid,
        position: Position,
    ) -> Result<Vec<MembershipDelta>> {
        let Versioned {
            revision,
            value: mut asset,
        } = self
            .assets
            .get_asset(asset_id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Asset", asset_id))?;

        asset.move_to(position);
        self.assets.save_asset(&asset, revision).await?;
        tracing::debug!(
            %asset_id,
            latitude = position.latitude,
            longitude = position.longitude,
            "Asset moved"
        );

        let mut deltas = Vec::new();
        for location in self.locations.list_locations(phlx_domain::Pagination {
            limit: usize::MAX,
            offset: 0,
        })
        .await?
        {
            let delta = self.refresh(location.id).await?;
            if !delta.changes.is_empty() {
                deltas.push(delta);
            }
        }
        Ok(deltas)
    }

    async fn mutate_location<F>(
        &self,
        location_id: Uuid,
        action: &str,
        actor: &Actor,
        apply: F,
    ) -> Result<(Area, MembershipDelta)>
    where
        F: FnOnce(&mut Location) -> phlx_domain::Result<Area> + Send,
    {
        let Versioned {
            revision,
            value: mut location,
        } = self.load(location_id).await?;

        let area = apply(&mut location).inspect_err(|e| {
            tracing::warn!(%location_id, action, error = %e, "Area change rejected");
        })?;
        self.locations.save_location(&location, revision).await?;

        tracing::info!(%location_id, area_id = %area.id, action, "Area changed");
        self.publisher
            .publish(
                Topic::LocationUpdates,
                event_types::LOCATION_UPDATE,
                &AreaChanged {
                    location_id,
                    action,
                    area: &area,
                    changed_by: Some(actor.id.as_str()),
                },
            )
            .await?;

        let delta = self.refresh(location_id).await?;
        Ok((area, delta))
    }

    /// # Errors
    ///
    /// `InvalidBoundary` for a bad polygon or opacity, `NotFound` for an
    /// unknown location.
    pub async fn add_area(
        &self,
        location_id: Uuid,
        area: NewArea,
        actor: &Actor,
    ) -> Result<(Area, MembershipDelta)> {
        self.mutate_location(location_id, "area_added", actor, |location| {
            location.add_area(area, Some(actor)).cloned()
        })
        .await
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown location or area, `InvalidBoundary` for a bad
    /// polygon or opacity.
    pub async fn update_area(
        &self,
        location_id: Uuid,
        area_id: Uuid,
        update: AreaUpdate,
        actor: &Actor,
    ) -> Result<(Area, MembershipDelta)> {
        self.mutate_location(location_id, "area_updated", actor, |location| {
            location.update_area(area_id, update, Some(actor)).cloned()
        })
        .await
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown location or area.
    pub async fn remove_area(
        &self,
        location_id: Uuid,
        area_id: Uuid,
        actor: &Actor,
    ) -> Result<(Area, MembershipDelta)> {
        self.mutate_location(location_id, "area_removed", actor, |location| {
            location.remove_area(area_id, Some(actor))
        })
        .await
    }
}
