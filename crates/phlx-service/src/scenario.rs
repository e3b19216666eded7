//! # Scenario Replay
//!
//! A scenario seeds locations, assets and monitored sites, then replays an
//! ordered list of inbound messages through the services. Commands are
//! created at replay time, so later messages refer to them by the `key`
//! given in their `command_issued` message.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use phlx_domain::{
    Actor, Asset, AreaUpdate, CommandStatus, Coordinate, Location, MonitoredLocation, NewArea,
    NewCommand, Position, RiskInputs, TargetReply,
};

use crate::AppContext;
use crate::error::{Result, ServiceError};

/// Seed location; areas are added in order and keep any id they carry so
/// later messages can refer to them
#[derive(Debug, Clone, Deserialize)]
pub struct SeedLocation {
    pub id: Uuid,
    pub name: String,
    pub center: Coordinate,
    #[serde(default)]
    pub areas: Vec<NewArea>,
}

/// Seed asset
#[derive(Debug, Clone, Deserialize)]
pub struct SeedAsset {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub position: Position,
    #[serde(default)]
    pub team_id: Option<Uuid>,
}

fn system() -> Actor {
    Actor::system()
}

/// One inbound message
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioMessage {
    AssetPosition {
        asset_id: Uuid,
        position: Position,
    },
    AreaAdded {
        location_id: Uuid,
        area: NewArea,
        #[serde(default = "system")]
        actor: Actor,
    },
    AreaUpdated {
        location_id: Uuid,
        area_id: Uuid,
        update: AreaUpdate,
        #[serde(default = "system")]
        actor: Actor,
    },
    AreaRemoved {
        location_id: Uuid,
        area_id: Uuid,
        #[serde(default = "system")]
        actor: Actor,
    },
    FireTelemetry {
        location_id: Uuid,
        #[serde(flatten)]
        inputs: RiskInputs,
    },
    FireAcknowledged {
        location_id: Uuid,
        #[serde(default = "system")]
        actor: Actor,
    },
    CommandIssued {
        key: String,
        command: NewCommand,
        #[serde(default = "system")]
        actor: Actor,
    },
    CommandApproved {
        command: String,
        #[serde(default = "system")]
        actor: Actor,
        #[serde(default)]
        notes: Option<String>,
    },
    CommandResponse {
        command: String,
        #[serde(flatten)]
        reply: TargetReply,
        #[serde(default = "system")]
        actor: Actor,
    },
    CommandStatus {
        command: String,
        status: CommandStatus,
        #[serde(default = "system")]
        actor: Actor,
        #[serde(default)]
        notes: Option<String>,
    },
}

impl ScenarioMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AssetPosition { .. } => "asset_position",
            Self::AreaAdded { .. } => "area_added",
            Self::AreaUpdated { .. } => "area_updated",
            Self::AreaRemoved { .. } => "area_removed",
            Self::FireTelemetry { .. } => "fire_telemetry",
            Self::FireAcknowledged { .. } => "fire_acknowledged",
            Self::CommandIssued { .. } => "command_issued",
            Self::CommandApproved { .. } => "command_approved",
            Self::CommandResponse { .. } => "command_response",
            Self::CommandStatus { .. } => "command_status",
        }
    }
}

/// Scenario document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub locations: Vec<SeedLocation>,
    pub assets: Vec<SeedAsset>,
    pub monitored: Vec<MonitoredLocation>,
    pub messages: Vec<ScenarioMessage>,
}

impl Scenario {
    /// # Errors
    ///
    /// [`ServiceError::Config`] when the document is not a valid scenario.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ServiceError::Config(format!("scenario: {e}")))
    }
}

/// Outcome of a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub messages: usize,
    pub applied: usize,
    pub rejected: usize,
    pub events: u64,
}

/// Routes scenario messages to the services
pub struct ScenarioRunner {
    ctx: AppContext,
    commands: HashMap<String, Uuid>,
}

impl ScenarioRunner {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            commands: HashMap::new(),
        }
    }

    /// Id of a command issued under `key`
    pub fn command_id(&self, key: &str) -> Option<Uuid> {
        self.commands.get(key).copied()
    }

    /// Seed state, then apply every message in order.
    ///
    /// A rejected message is logged and counted; replay continues. Seeding
    /// failures abort the run.
    ///
    /// # Errors
    ///
    /// Seeding failures and transport failures.
    pub async fn run(&mut self, scenario: Scenario) -> Result<RunSummary> {
        self.seed(&scenario).await?;

        let mut summary = RunSummary {
            messages: scenario.messages.len(),
            ..RunSummary::default()
        };
        for (index, message) in scenario.messages.into_iter().enumerate() {
            let kind = message.kind();
            match self.apply(message).await {
                Ok(()) => summary.applied += 1,
                Err(err @ ServiceError::Transport(_)) => return Err(err),
                Err(err) => {
                    summary.rejected += 1;
                    tracing::warn!(
                        index,
                        kind,
                        code = err.error_code(),
                        error = %err,
                        "Message rejected"
                    );
                }
            }
        }
        summary.events = self.ctx.publisher.published();

        tracing::info!(
            messages = summary.messages,
            applied = summary.applied,
            rejected = summary.rejected,
            events = summary.events,
            "Scenario replayed"
        );
        Ok(summary)
    }

    async fn seed(&self, scenario: &Scenario) -> Result<()> {
        for seed in &scenario.assets {
            let mut asset = Asset::new(seed.name.clone(), seed.kind.clone(), seed.position);
            asset.id = seed.id;
            asset.team_id = seed.team_id;
            self.ctx.geofence.register_asset(&asset).await?;
        }

        for seed in &scenario.locations {
            let mut location = Location::new(seed.name.clone(), seed.center);
            location.id = seed.id;
            let actor = Actor::system();
            for area in &seed.areas {
                location.add_area(area.clone(), Some(&actor))?;
            }
            self.ctx.geofence.register_location(&location).await?;
        }

        for site in &scenario.monitored {
            self.ctx.fire_risk.register(site).await?;
        }

        tracing::info!(
            locations = scenario.locations.len(),
            assets = scenario.assets.len(),
            monitored = scenario.monitored.len(),
            "Scenario seeded"
        );
        Ok(())
    }

    fn resolve(&self, key: &str) -> Result<Uuid> {
        self.command_id(key).ok_or_else(|| {
            ServiceError::Persistence(phlx_persistence::PersistenceError::not_found(
                "TacticalCommand",
                key,
            ))
        })
    }

    async fn apply(&mut self, message: ScenarioMessage) -> Result<()> {
        let ctx = &self.ctx;
        match message {
            ScenarioMessage::AssetPosition { asset_id, position } => {
                ctx.geofence.update_asset_position(asset_id, position).await?;
            }
            ScenarioMessage::AreaAdded {
                location_id,
                area,
                actor,
            } => {
                ctx.geofence.add_area(location_id, area, &actor).await?;
            }
            ScenarioMessage::AreaUpdated {
                location_id,
                area_id,
                update,
                actor,
            } => {
                ctx.geofence
                    .update_area(location_id, area_id, update, &actor)
                    .await?;
            }
            ScenarioMessage::AreaRemoved {
                location_id,
                area_id,
                actor,
            } => {
                ctx.geofence.remove_area(location_id, area_id, &actor).await?;
            }
            ScenarioMessage::FireTelemetry {
                location_id,
                inputs,
            } => {
                ctx.fire_risk.ingest(location_id, inputs).await?;
            }
            ScenarioMessage::FireAcknowledged { location_id, actor } => {
                ctx.fire_risk.acknowledge(location_id, &actor).await?;
            }
            ScenarioMessage::CommandIssued {
                key,
                command,
                actor,
            } => {
                if self.commands.contains_key(&key) {
                    return Err(phlx_domain::DomainError::InvalidCommand(format!(
                        "command key '{key}' already used"
                    ))
                    .into());
                }
                let issued = ctx.commands.issue(command, &actor).await?;
                self.commands.insert(key, issued.id);
            }
            ScenarioMessage::CommandApproved {
                command,
                actor,
                notes,
            } => {
                let id = self.resolve(&command)?;
                self.ctx.commands.approve(id, &actor, notes).await?;
            }
            ScenarioMessage::CommandResponse {
                command,
                reply,
                actor,
            } => {
                let id = self.resolve(&command)?;
                self.ctx.commands.respond(id, reply, &actor).await?;
            }
            ScenarioMessage::CommandStatus {
                command,
                status,
                actor,
                notes,
            } => {
                let id = self.resolve(&command)?;
                self.ctx
                    .commands
                    .transition(id, status, &actor, notes)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::LogSink;
    use phlx_persistence::LocationRepository;
    use std::sync::Arc;

    #[test]
    fn test_message_tags() {
        let json = r#"[
            {"type":"asset_position","asset_id":"7f1d0c4e-51a4-4a57-9f53-1c6f1f3c1a01",
             "position":{"latitude":5.0,"longitude":5.0}},
            {"type":"fire_telemetry","location_id":"7f1d0c4e-51a4-4a57-9f53-1c6f1f3c1a02",
             "fires":[{"fire_id":"f-1","source":"nasa_firms","distance_km":0.5,"in_fire":true}],
             "fwi":{"value":85.0,"category":"extreme","rating":9}},
            {"type":"command_response","command":"c1",
             "target_id":"7f1d0c4e-51a4-4a57-9f53-1c6f1f3c1a03","target_type":"asset",
             "decision":"accepted"}
        ]"#;
        let messages: Vec<ScenarioMessage> = serde_json::from_str(json).unwrap();
        let kinds: Vec<&str> = messages.iter().map(ScenarioMessage::kind).collect();
        assert_eq!(kinds, vec!["asset_position", "fire_telemetry", "command_response"]);

        let ScenarioMessage::CommandResponse { actor, .. } = &messages[2] else {
            panic!("expected command_response");
        };
        assert_eq!(actor, &Actor::system());
    }

    #[test]
    fn test_invalid_document() {
        let err = Scenario::from_json("{\"messages\": [{\"type\": \"teleport\"}]}").unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[tokio::test]
    async fn test_duplicate_seed_area_aborts_seeding() {
        let ctx = AppContext::new(Config::default(), Arc::new(LogSink)).unwrap();
        let store = ctx.store.clone();
        let mut runner = ScenarioRunner::new(ctx);
        let square = r#"[{"latitude":0.0,"longitude":0.0},{"latitude":0.0,"longitude":1.0},
                         {"latitude":1.0,"longitude":1.0},{"latitude":1.0,"longitude":0.0}]"#;
        let scenario = Scenario::from_json(&format!(
            r#"{{"locations":[{{
                "id":"7f1d0c4e-51a4-4a57-9f53-1c6f1f3c1b01","name":"Ridge",
                "center":{{"latitude":0.5,"longitude":0.5}},
                "areas":[
                    {{"id":"7f1d0c4e-51a4-4a57-9f53-1c6f1f3c1aaa","name":"A","boundary":{square}}},
                    {{"id":"7f1d0c4e-51a4-4a57-9f53-1c6f1f3c1aaa","name":"B","boundary":{square}}}
                ]}}]}}"#
        ))
        .unwrap();

        let err = runner.run(scenario).await.unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_ID");

        let location_id = Uuid::parse_str("7f1d0c4e-51a4-4a57-9f53-1c6f1f3c1b01").unwrap();
        assert!(store.get_location(location_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_command_key_is_rejected_not_fatal() {
        let ctx = AppContext::new(Config::default(), Arc::new(LogSink)).unwrap();
        let mut runner = ScenarioRunner::new(ctx);
        let scenario = Scenario::from_json(
            r#"{"messages":[{"type":"command_status","command":"nope","status":"cancelled"}]}"#,
        )
        .unwrap();

        let summary = runner.run(scenario).await.unwrap();
        assert_eq!(summary.messages, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.events, 0);
    }
}
