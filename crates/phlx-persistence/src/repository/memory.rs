//! # In-Memory Document Store
//!
//! Each collection keeps aggregates as JSON documents keyed by id, so a read
//! never hands out a reference into shared state and a save is a full
//! document replace, the way a document database behaves.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::traits::{
    AssetRepository, CommandRepository, FireEventRepository, LocationRepository,
    MonitoredLocationRepository,
};
use crate::error::{PersistenceError, Result};
use crate::{NEW_REVISION, Revision, Versioned};
use phlx_domain::{
    Asset, CommandFilter, FireEvent, Location, MonitoredLocation, Pagination, TacticalCommand,
};

#[derive(Debug, Clone)]
struct Document {
    revision: Revision,
    body: Value,
}

#[derive(Debug)]
struct Collection {
    entity_type: &'static str,
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl Collection {
    fn new(entity_type: &'static str) -> Self {
        Self {
            entity_type,
            documents: RwLock::new(HashMap::new()),
        }
    }

    async fn get<T: DeserializeOwned>(&self, id: Uuid) -> Result<Option<Versioned<T>>> {
        let documents = self.documents.read().await;
        documents.get(&id).map(decode).transpose()
    }

    async fn scan<T: DeserializeOwned>(&self) -> Result<Vec<Versioned<T>>> {
        let documents = self.documents.read().await;
        documents.values().map(decode).collect()
    }

    async fn put<T: Serialize + Sync>(
        &self,
        id: Uuid,
        value: &T,
        expected: Revision,
    ) -> Result<Revision> {
        let body = serde_json::to_value(value)?;
        let mut documents = self.documents.write().await;

        let actual = documents.get(&id).map_or(NEW_REVISION, |d| d.revision);
        if actual != expected {
            tracing::warn!(
                entity_type = self.entity_type,
                %id,
                expected,
                actual,
                "Write conflict"
            );
            return Err(PersistenceError::WriteConflict {
                entity_type: self.entity_type.to_string(),
                id,
                expected,
                actual,
            });
        }

        let revision = actual + 1;
        documents.insert(id, Document { revision, body });
        tracing::debug!(entity_type = self.entity_type, %id, revision, "Document saved");
        Ok(revision)
    }

    async fn upsert<T: Serialize + Sync>(&self, id: Uuid, value: &T) -> Result<Revision> {
        let body = serde_json::to_value(value)?;
        let mut documents = self.documents.write().await;
        let revision = documents.get(&id).map_or(NEW_REVISION, |d| d.revision) + 1;
        documents.insert(id, Document { revision, body });
        Ok(revision)
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        let mut documents = self.documents.write().await;
        if documents.remove(&id).is_none() {
            return Err(PersistenceError::not_found(self.entity_type, id));
        }
        tracing::debug!(entity_type = self.entity_type, %id, "Document deleted");
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(doc: &Document) -> Result<Versioned<T>> {
    Ok(Versioned {
        revision: doc.revision,
        value: serde_json::from_value(doc.body.clone())?,
    })
}

/// In-memory implementation of every repository trait
#[derive(Debug)]
pub struct InMemoryStore {
    locations: Collection,
    assets: Collection,
    monitored: Collection,
    fire_events: Collection,
    commands: Collection,
}

/// Shared handle used by the services
pub type SharedStore = Arc<InMemoryStore>;

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            locations: Collection::new("Location"),
            assets: Collection::new("Asset"),
            monitored: Collection::new("MonitoredLocation"),
            fire_events: Collection::new("FireEvent"),
            commands: Collection::new("TacticalCommand"),
        }
    }

    #[must_use]
    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

// =============================================================================
// LOCATIONS
// =============================================================================

#[async_trait]
impl LocationRepository for InMemoryStore {
    async fn get_location(&self, location_id: Uuid) -> Result<Option<Versioned<Location>>> {
        self.locations.get(location_id).await
    }

    async fn list_locations(&self, page: Pagination) -> Result<Vec<Location>> {
        let mut all: Vec<Location> = self
            .locations
            .scan()
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(page.apply(all))
    }

    async fn save_location(&self, location: &Location, expected: Revision) -> Result<Revision> {
        self.locations.put(location.id, location, expected).await
    }

    async fn delete_location(&self, location_id: Uuid) -> Result<()> {
        self.locations.remove(location_id).await
    }
}

// =============================================================================
// ASSETS
// =============================================================================

#[async_trait]
impl AssetRepository for InMemoryStore {
    async fn get_asset(&self, asset_id: Uuid) -> Result<Option<Versioned<Asset>>> {
        self.assets.get(asset_id).await
    }

    async fn list_assets(&self) -> Result<Vec<Asset>> {
        let mut all: Vec<Asset> = self
            .assets
            .scan()
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn save_asset(&self, asset: &Asset, expected: Revision) -> Result<Revision> {
        self.assets.put(asset.id, asset, expected).await
    }
}

// =============================================================================
// MONITORED LOCATIONS
// =============================================================================

#[async_trait]
impl MonitoredLocationRepository for InMemoryStore {
    async fn get_monitored(&self, location_id: Uuid) -> Result<Option<MonitoredLocation>> {
        Ok(self
            .monitored
            .get(location_id)
            .await?
            .map(Versioned::into_inner))
    }

    async fn list_monitored(&self) -> Result<Vec<MonitoredLocation>> {
        let mut all: Vec<MonitoredLocation> = self
            .monitored
            .scan()
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn put_monitored(&self, location: &MonitoredLocation) -> Result<()> {
        self.monitored.upsert(location.id, location).await?;
        Ok(())
    }
}

// =============================================================================
// FIRE EVENTS
// =============================================================================

#[async_trait]
impl FireEventRepository for InMemoryStore {
    async fn get_fire_event(&self, event_id: Uuid) -> Result<Option<Versioned<FireEvent>>> {
        self.fire_events.get(event_id).await
    }

    async fn find_open_fire_event(
        &self,
        location_id: Uuid,
    ) -> Result<Option<Versioned<FireEvent>>> {
        let events: Vec<Versioned<FireEvent>> = self.fire_events.scan().await?;
        Ok(events
            .into_iter()
            .filter(|e| e.value.location_id == location_id && e.value.status.is_open())
            .max_by_key(|e| e.value.updated_at))
    }

    async fn fire_event_history(&self, location_id: Uuid) -> Result<Vec<FireEvent>> {
        let mut events: Vec<FireEvent> = self
            .fire_events
            .scan()
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .filter(|e: &FireEvent| e.location_id == location_id)
            .collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn save_fire_event(&self, event: &FireEvent, expected: Revision) -> Result<Revision> {
        self.fire_events.put(event.id, event, expected).await
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

#[async_trait]
impl CommandRepository for InMemoryStore {
    async fn get_command(&self, command_id: Uuid) -> Result<Option<Versioned<TacticalCommand>>> {
        self.commands.get(command_id).await
    }

    async fn list_commands(
        &self,
        filter: &CommandFilter,
        page: Pagination,
    ) -> Result<Vec<TacticalCommand>> {
        let mut matching: Vec<TacticalCommand> = self
            .commands
            .scan()
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .filter(|c: &TacticalCommand| filter.matches(c))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page.apply(matching))
    }

    async fn save_command(
        &self,
        command: &TacticalCommand,
        expected: Revision,
    ) -> Result<Revision> {
        self.commands.put(command.id, command, expected).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fake::Fake;
    use fake::faker::name::en::Name;
    use phlx_domain::{
        Actor, CommandCategory, CommandPriority, CommandSource, CommandStatus, CommandTarget,
        Coordinate, FireEventStatus, FireEventType, NewCommand, Position, RiskLevel, TargetType,
    };
    use tokio_test::{assert_err, assert_ok};

    fn location() -> Location {
        Location::new("Harbor", Coordinate::new(37.94, 23.64).unwrap())
    }

    fn fire_event(location_id: Uuid, status: FireEventStatus) -> FireEvent {
        let now = Utc::now();
        FireEvent {
            id: Uuid::new_v4(),
            location_id,
            location_name: "Substation 4".into(),
            location_kind: "facility".into(),
            event_type: FireEventType::Detected,
            risk_level: RiskLevel::High,
            risk_score: 61.0,
            fires: vec![],
            fwi: None,
            score_factors: None,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    fn command(mission_id: Uuid, title: &str) -> TacticalCommand {
        let new = NewCommand {
            mission_id,
            mission_title: "Ridge Fire".into(),
            situation_summary: None,
            title: title.into(),
            description: String::new(),
            category: CommandCategory::Dispatch,
            targets: vec![CommandTarget {
                target_type: TargetType::Team,
                target_id: Uuid::new_v4(),
                target_name: "Bravo".into(),
            }],
            destination: None,
            waypoints: vec![],
            area_of_operation: None,
            objective: None,
            priority: CommandPriority::Priority,
            source: CommandSource::Operator,
            metadata: phlx_domain::Metadata::new(),
        };
        TacticalCommand::issue(new, &Actor::new("op-1", "Ops")).unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load_location() {
        let store = InMemoryStore::new();
        let loc = location();

        let rev = assert_ok!(store.save_location(&loc, NEW_REVISION).await);
        assert_eq!(rev, 1);

        let loaded = store.get_location(loc.id).await.unwrap().unwrap();
        assert_eq!(loaded.revision, 1);
        assert_eq!(loaded.value, loc);
        assert!(store.get_location(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_revision_is_rejected() {
        let store = InMemoryStore::new();
        let mut loc = location();
        store.save_location(&loc, NEW_REVISION).await.unwrap();

        loc.name = "Harbor North".into();
        assert_eq!(store.save_location(&loc, 1).await.unwrap(), 2);

        let err = assert_err!(store.save_location(&loc, 1).await);
        assert_eq!(
            err,
            PersistenceError::WriteConflict {
                entity_type: "Location".into(),
                id: loc.id,
                expected: 1,
                actual: 2,
            }
        );

        // creating twice is also a conflict
        assert_err!(store.save_location(&loc, NEW_REVISION).await);
    }

    #[tokio::test]
    async fn test_concurrent_saves_one_wins() {
        let store = InMemoryStore::shared();
        let loc = location();
        store.save_location(&loc, NEW_REVISION).await.unwrap();

        let (a, b) = tokio::join!(store.save_location(&loc, 1), store.save_location(&loc, 1));
        assert_eq!(u8::from(a.is_ok()) + u8::from(b.is_ok()), 1);
    }

    #[tokio::test]
    async fn test_delete_location() {
        let store = InMemoryStore::new();
        let loc = location();
        store.save_location(&loc, NEW_REVISION).await.unwrap();

        assert_ok!(store.delete_location(loc.id).await);
        let err = assert_err!(store.delete_location(loc.id).await);
        assert!(matches!(err, PersistenceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_locations_paginates_oldest_first() {
        let store = InMemoryStore::new();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let loc = location();
            ids.push(loc.id);
            store.save_location(&loc, NEW_REVISION).await.unwrap();
        }

        let all = store.list_locations(Pagination::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].created_at <= w[1].created_at));

        let page = store
            .list_locations(Pagination {
                limit: 1,
                offset: 2,
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, all[2].id);
    }

    #[tokio::test]
    async fn test_assets_listed_by_name() {
        let store = InMemoryStore::new();
        for _ in 0..5 {
            let name: String = Name().fake();
            let asset = Asset::new(name, "vehicle", Position::new(37.9, 23.7, 0.0));
            store.save_asset(&asset, NEW_REVISION).await.unwrap();
        }
        let assets = store.list_assets().await.unwrap();
        assert_eq!(assets.len(), 5);
        assert!(assets.windows(2).all(|w| w[0].name <= w[1].name));
    }

    #[tokio::test]
    async fn test_open_fire_event_lookup() {
        let store = InMemoryStore::new();
        let site = Uuid::new_v4();

        let cleared = fire_event(site, FireEventStatus::Cleared);
        store.save_fire_event(&cleared, NEW_REVISION).await.unwrap();
        assert!(store.find_open_fire_event(site).await.unwrap().is_none());

        let acknowledged = fire_event(site, FireEventStatus::Acknowledged);
        store.save_fire_event(&acknowledged, NEW_REVISION).await.unwrap();

        let open = store.find_open_fire_event(site).await.unwrap().unwrap();
        assert_eq!(open.value.id, acknowledged.id);
        assert_eq!(open.revision, 1);

        assert_eq!(store.fire_event_history(site).await.unwrap().len(), 2);
        assert!(store.fire_event_history(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_monitored_upsert() {
        let store = InMemoryStore::new();
        let mut site = MonitoredLocation {
            id: Uuid::new_v4(),
            name: "Depot".into(),
            kind: "facility".into(),
            position: Coordinate::new(38.0, 23.7).unwrap(),
        };
        store.put_monitored(&site).await.unwrap();
        site.name = "Depot East".into();
        store.put_monitored(&site).await.unwrap();

        let loaded = store.get_monitored(site.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Depot East");
        assert_eq!(store.list_monitored().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_commands_filters_and_orders() {
        let store = InMemoryStore::new();
        let mission = Uuid::new_v4();

        let first = command(mission, "Stage at checkpoint");
        let second = command(mission, "Sweep sector 2");
        let other = command(Uuid::new_v4(), "Unrelated");
        for c in [&first, &second, &other] {
            store.save_command(c, NEW_REVISION).await.unwrap();
        }

        let filter = CommandFilter {
            mission_id: Some(mission),
            status: Some(CommandStatus::Pending),
            ..CommandFilter::default()
        };
        let listed = store
            .list_commands(&filter, Pagination::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at >= listed[1].created_at);

        let loaded = store.get_command(first.id).await.unwrap().unwrap();
        assert_eq!(loaded.value.status(), CommandStatus::Pending);
        assert_eq!(loaded.value.status_history().len(), 1);
    }
}
