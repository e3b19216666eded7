//! Replays the bundled demo scenario end to end.

use std::sync::Arc;

use phlx_domain::{CommandStatus, FireEventStatus};
use phlx_persistence::{CommandRepository, FireEventRepository};
use phlx_service::{
    AppContext, ChannelSink, Config, EventEnvelope, JsonLinesSink, Scenario, ScenarioRunner,
};
use tokio::sync::mpsc;
use uuid::Uuid;

const DEMO: &str = include_str!("../../../demos/scenario.json");

const SUBSTATION: &str = "3b6f2a9e-1c41-4d8e-9a0b-5f1e2d3c4e01";
const ENGINE_7: &str = "3b6f2a9e-1c41-4d8e-9a0b-5f1e2d3c4c01";
const EVAC_ZONE: &str = "3b6f2a9e-1c41-4d8e-9a0b-5f1e2d3c4b11";

fn drain(rx: &mut mpsc::Receiver<EventEnvelope>) -> Vec<EventEnvelope> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

#[tokio::test]
async fn test_demo_scenario_replay() {
    let (sink, mut rx) = ChannelSink::new();
    let ctx = AppContext::new(Config::default(), Arc::new(sink)).unwrap();
    let store = ctx.store.clone();
    let mut runner = ScenarioRunner::new(ctx);

    let summary = runner.run(Scenario::from_json(DEMO).unwrap()).await.unwrap();
    assert_eq!(summary.messages, 12);
    assert_eq!(summary.applied, 11);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.events, 12);

    let events = drain(&mut rx);
    let sequence: Vec<(&str, &str)> = events
        .iter()
        .map(|e| (e.topic.as_str(), e.event_type.as_str()))
        .collect();
    assert_eq!(
        sequence,
        vec![
            ("location-updates", "geofence_membership_changed"),
            ("fire-events", "fire.risk.detected"),
            ("tactical-commands", "tactical_command_created"),
            ("tactical-commands", "tactical_command_response"),
            ("tactical-commands", "tactical_command_response"),
            ("tactical-commands", "tactical_command_status_changed"),
            ("tactical-commands", "tactical_command_status_changed"),
            ("fire-events", "fire.risk.acknowledged"),
            ("location-updates", "location_update"),
            ("location-updates", "geofence_membership_changed"),
            ("fire-events", "fire.risk.cleared"),
            ("tactical-commands", "tactical_command_status_changed"),
        ]
    );
    assert!(events.iter().all(|e| e.schema_version == "1.0"));

    // Engine 7 enters the zone, then leaves it when the zone is deactivated
    let entered = &events[0].payload["changes"][0];
    assert_eq!(entered["asset_id"], ENGINE_7);
    assert_eq!(entered["area_id"], EVAC_ZONE);
    assert_eq!(entered["transition"], "entered");
    assert_eq!(events[9].payload["changes"][0]["transition"], "exited");

    assert_eq!(events[1].payload["risk_level"], "critical");
    assert_eq!(events[5].payload["status"], "accepted");
    assert_eq!(events[7].payload["acknowledged_by"], "op-1");

    let command_id = runner.command_id("evac").unwrap();
    let command = store.get_command(command_id).await.unwrap().unwrap().into_inner();
    assert_eq!(command.status(), CommandStatus::Completed);
    let history: Vec<CommandStatus> = command.status_history().iter().map(|u| u.status).collect();
    assert_eq!(
        history,
        vec![
            CommandStatus::Pending,
            CommandStatus::Accepted,
            CommandStatus::InProgress,
            CommandStatus::Completed,
        ]
    );
    assert_eq!(command.responses().count(), 2);

    let substation = Uuid::parse_str(SUBSTATION).unwrap();
    let fires = store.fire_event_history(substation).await.unwrap();
    assert_eq!(fires.len(), 1);
    assert_eq!(fires[0].status, FireEventStatus::Cleared);
    assert!(store.find_open_fire_event(substation).await.unwrap().is_none());
}

#[tokio::test]
async fn test_json_lines_output() {
    let sink = Arc::new(JsonLinesSink::new(Vec::<u8>::new()));
    let ctx = AppContext::new(Config::default(), sink.clone()).unwrap();
    let summary = ScenarioRunner::new(ctx)
        .run(Scenario::from_json(DEMO).unwrap())
        .await
        .unwrap();

    let buffer = Arc::try_unwrap(sink).ok().unwrap().into_inner();
    let lines: Vec<EventEnvelope> = String::from_utf8(buffer)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(u64::try_from(lines.len()).unwrap(), summary.events);
    assert_eq!(lines[0].source, "phlx-core");
}
