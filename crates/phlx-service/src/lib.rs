//! # PHLX Service Layer
//!
//! Wires the domain engines to the persistence collaborator and the event
//! transport.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Inbound messages (scenario replay)              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        AppContext                            │
//! │   (GeofenceService, FireRiskService, CommandService)         │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                   │
//!                    ▼                   ▼
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │   Repository traits     │   │   Publisher -> EventSink     │
//! │   (InMemoryStore)       │   │   (channel, JSON lines, log) │
//! └─────────────────────────┘   └──────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod events;
pub mod scenario;
pub mod services;

use std::sync::Arc;

use phlx_domain::FireRiskEngine;
use phlx_persistence::{InMemoryStore, SharedStore};

pub use config::{Catalog, Config, LogFormat, Topic};
pub use error::{Result, ServiceError};
pub use events::{ChannelSink, EventEnvelope, EventSink, JsonLinesSink, LogSink, Publisher};
pub use scenario::{RunSummary, Scenario, ScenarioMessage, ScenarioRunner};
pub use services::{CommandService, FireRiskService, GeofenceService, MembershipDelta};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application context shared by every inbound handler
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: SharedStore,
    pub publisher: Publisher,
    pub geofence: Arc<GeofenceService>,
    pub fire_risk: Arc<FireRiskService>,
    pub commands: Arc<CommandService>,
}

impl AppContext {
    /// Build the services over a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Config`] when the configured risk model is invalid.
    pub fn new(config: Config, sink: Arc<dyn EventSink>) -> Result<Self> {
        let engine = FireRiskEngine::new(config.risk_model)
            .map_err(|e| ServiceError::Config(e.to_string()))?;

        let config = Arc::new(config);
        let store = InMemoryStore::shared();
        let publisher = Publisher::new(config.clone(), sink);

        let geofence = Arc::new(GeofenceService::new(
            store.clone(),
            store.clone(),
            publisher.clone(),
        ));
        let fire_risk = Arc::new(FireRiskService::new(
            engine,
            store.clone(),
            store.clone(),
            publisher.clone(),
        ));
        let commands = Arc::new(CommandService::new(
            store.clone(),
            config.catalog.clone(),
            publisher.clone(),
        ));

        Ok(Self {
            config,
            store,
            publisher,
            geofence,
            fire_risk,
            commands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_context_rejects_invalid_model() {
        let mut config = Config::default();
        config.risk_model.weights.fwi = 0.9;
        let err = AppContext::new(config, Arc::new(LogSink)).err().unwrap();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }
}
