//! Fire risk orchestration: telemetry in, fire event lifecycle out.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use phlx_domain::{Actor, FireEvent, FireRiskEngine, MonitoredLocation, RiskEvaluation, RiskInputs};
use phlx_persistence::{
    FireEventRepository, MonitoredLocationRepository, NEW_REVISION, PersistenceError, Versioned,
};

use crate::config::Topic;
use crate::error::Result;
use crate::events::{Publisher, event_types};

#[derive(Serialize)]
struct FireAcknowledged<'a> {
    #[serde(flatten)]
    fire_event: &'a FireEvent,
    acknowledged_by: &'a str,
}

pub struct FireRiskService {
    engine: FireRiskEngine,
    monitored: Arc<dyn MonitoredLocationRepository>,
    events: Arc<dyn FireEventRepository>,
    publisher: Publisher,
}

impl FireRiskService {
    pub fn new(
        engine: FireRiskEngine,
        monitored: Arc<dyn MonitoredLocationRepository>,
        events: Arc<dyn FireEventRepository>,
        publisher: Publisher,
    ) -> Self {
        Self {
            engine,
            monitored,
            events,
            publisher,
        }
    }

    pub const fn engine(&self) -> &FireRiskEngine {
        &self.engine
    }

    /// # Errors
    ///
    /// Persistence failures.
    pub async fn register(&self, location: &MonitoredLocation) -> Result<()> {
        self.monitored.put_monitored(location).await?;
        tracing::info!(location_id = %location.id, name = %location.name, "Monitoring location");
        Ok(())
    }

    /// Score new telemetry for a monitored location, persist the resulting
    /// fire event revision and publish the lifecycle event, if any.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unmonitored location, `WriteConflict` when the open
    /// event was changed concurrently, transport failures.
    pub async fn ingest(&self, location_id: Uuid, inputs: RiskInputs) -> Result<RiskEvaluation> {
        let location = self
            .monitored
            .get_monitored(location_id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("MonitoredLocation", location_id))?;
        let previous = self.events.find_open_fire_event(location_id).await?;

        let evaluation = self.engine.evaluate(
            previous.as_ref().map(|p| &p.value),
            &location,
            inputs,
        );

        let Some(event) = &evaluation.event else {
            tracing::debug!(
                %location_id,
                score = evaluation.assessment.score,
                level = evaluation.assessment.level.as_str(),
                "No material risk change"
            );
            return Ok(evaluation);
        };

        let expected = previous
            .as_ref()
            .filter(|p| p.value.id == event.fire_event.id)
            .map_or(NEW_REVISION, |p| p.revision);
        self.events.save_fire_event(&event.fire_event, expected).await?;

        tracing::info!(
            %location_id,
            fire_event_id = %event.fire_event.id,
            event_type = event.event_type.as_str(),
            score = event.fire_event.risk_score,
            level = event.fire_event.risk_level.as_str(),
            "Fire risk event"
        );
        self.publisher
            .publish(
                Topic::FireEvents,
                event.event_type.event_name(),
                &event.fire_event,
            )
            .await?;

        Ok(evaluation)
    }

    /// Acknowledge the open event of a location and announce it.
    ///
    /// # Errors
    ///
    /// `NotFound` when the location has no open event, `InvalidTransition`
    /// when it is already acknowledged, transport failures.
    pub async fn acknowledge(&self, location_id: Uuid, actor: &Actor) -> Result<FireEvent> {
        let Versioned {
            revision,
            value: mut event,
        } = self
            .events
            .find_open_fire_event(location_id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("FireEvent", location_id))?;

        event.acknowledge().inspect_err(|e| {
            tracing::warn!(%location_id, error = %e, "Acknowledgement rejected");
        })?;
        self.events.save_fire_event(&event, revision).await?;

        tracing::info!(
            %location_id,
            fire_event_id = %event.id,
            acknowledged_by = %actor.id,
            "Fire event acknowledged"
        );
        self.publisher
            .publish(
                Topic::FireEvents,
                event_types::FIRE_RISK_ACKNOWLEDGED,
                &FireAcknowledged {
                    fire_event: &event,
                    acknowledged_by: actor.id.as_str(),
                },
            )
            .await?;
        Ok(event)
    }

    /// # Errors
    ///
    /// Persistence failures.
    pub async fn history(&self, location_id: Uuid) -> Result<Vec<FireEvent>> {
        Ok(self.events.fire_event_history(location_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::{ChannelSink, EventEnvelope};
    use phlx_domain::{
        Coordinate, FireDetail, FireEventStatus, FireEventType, FwiInfo, RiskLevel,
    };
    use phlx_persistence::InMemoryStore;
    use tokio::sync::mpsc;

    fn setup() -> (FireRiskService, mpsc::Receiver<EventEnvelope>, MonitoredLocation) {
        let store = InMemoryStore::shared();
        let (sink, rx) = ChannelSink::new();
        let publisher = Publisher::new(Arc::new(Config::default()), Arc::new(sink));
        let svc = FireRiskService::new(FireRiskEngine::default(), store.clone(), store, publisher);
        let site = MonitoredLocation {
            id: Uuid::new_v4(),
            name: "Substation 4".into(),
            kind: "facility".into(),
            position: Coordinate::new(38.0, 23.7).unwrap(),
        };
        (svc, rx, site)
    }

    fn burning() -> RiskInputs {
        RiskInputs {
            fires: vec![FireDetail {
                fire_id: "f-1".into(),
                source: "nasa_firms".into(),
                satellite_source: Some("VIIRS_NOAA20_NRT".into()),
                distance_km: 0.5,
                in_fire: true,
                intensity: None,
                confidence: Some("high".into()),
            }],
            fwi: Some(FwiInfo::from_value(85.0)),
        }
    }

    #[tokio::test]
    async fn test_detect_then_idempotent_then_clear() {
        let (svc, mut rx, site) = setup();
        svc.register(&site).await.unwrap();

        let first = svc.ingest(site.id, burning()).await.unwrap();
        let detected = first.event.unwrap();
        assert_eq!(detected.event_type, FireEventType::Detected);
        assert_eq!(detected.fire_event.risk_level, RiskLevel::Critical);
        assert!((detected.fire_event.risk_score - 80.5).abs() < 1e-9);

        let again = svc.ingest(site.id, burning()).await.unwrap();
        assert!(again.event.is_none());

        let cleared = svc.ingest(site.id, RiskInputs::default()).await.unwrap();
        let cleared = cleared.event.unwrap();
        assert_eq!(cleared.event_type, FireEventType::Cleared);
        assert_eq!(cleared.fire_event.id, detected.fire_event.id);
        assert_eq!(cleared.fire_event.status, FireEventStatus::Cleared);

        let envelopes: Vec<EventEnvelope> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let types: Vec<&str> = envelopes.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["fire.risk.detected", "fire.risk.cleared"]);
        assert!(envelopes.iter().all(|e| e.topic == "fire-events"));

        let history = svc.history(site.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, FireEventStatus::Cleared);
    }

    #[tokio::test]
    async fn test_redetection_opens_new_event() {
        let (svc, _rx, site) = setup();
        svc.register(&site).await.unwrap();

        let first = svc.ingest(site.id, burning()).await.unwrap().event.unwrap();
        svc.ingest(site.id, RiskInputs::default()).await.unwrap();
        let second = svc.ingest(site.id, burning()).await.unwrap().event.unwrap();

        assert_eq!(second.event_type, FireEventType::Detected);
        assert_ne!(second.fire_event.id, first.fire_event.id);
        assert_eq!(svc.history(site.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_acknowledge_open_event() {
        let (svc, mut rx, site) = setup();
        svc.register(&site).await.unwrap();
        let ops = Actor::new("op-1", "Ops");

        let err = svc.acknowledge(site.id, &ops).await.unwrap_err();
        assert!(err.is_not_found());

        svc.ingest(site.id, burning()).await.unwrap();
        let acked = svc.acknowledge(site.id, &ops).await.unwrap();
        assert_eq!(acked.status, FireEventStatus::Acknowledged);

        let envelopes: Vec<EventEnvelope> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let last = envelopes.last().unwrap();
        assert_eq!(last.event_type, "fire.risk.acknowledged");
        assert_eq!(last.topic, "fire-events");
        assert_eq!(last.payload["id"], acked.id.to_string());
        assert_eq!(last.payload["status"], "acknowledged");
        assert_eq!(last.payload["acknowledged_by"], "op-1");

        let err = svc.acknowledge(site.id, &ops).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");

        // still open: identical telemetry does not re-detect
        assert!(svc.ingest(site.id, burning()).await.unwrap().event.is_none());
    }

    #[tokio::test]
    async fn test_unmonitored_location() {
        let (svc, _rx, _site) = setup();
        let err = svc.ingest(Uuid::new_v4(), burning()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
