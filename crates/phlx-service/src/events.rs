//! # Outbound Events
//!
//! Every derived change leaves the core as an [`EventEnvelope`] handed to an
//! [`EventSink`]. Real deployments put a message bus behind the sink; this
//! crate ships a channel sink for tests, a JSON-lines sink for the replay
//! binary and a logging sink for dry runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::config::{Config, Topic};
use crate::error::{Result, ServiceError};

/// Envelope schema version
pub const SCHEMA_VERSION: &str = "1.0";

/// Event type names
pub mod event_types {
    pub const LOCATION_UPDATE: &str = "location_update";
    pub const GEOFENCE_MEMBERSHIP_CHANGED: &str = "geofence_membership_changed";
    pub const TACTICAL_COMMAND_CREATED: &str = "tactical_command_created";
    pub const TACTICAL_COMMAND_RESPONSE: &str = "tactical_command_response";
    pub const TACTICAL_COMMAND_STATUS_CHANGED: &str = "tactical_command_status_changed";
    pub const FIRE_RISK_ACKNOWLEDGED: &str = "fire.risk.acknowledged";
}

/// Wire format of every outbound event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub event_type: String,
    pub topic: String,
    pub source: String,
    pub schema_version: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Destination for outbound envelopes
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, envelope: EventEnvelope) -> Result<()>;
}

// =============================================================================
// SINKS
// =============================================================================

/// Channel capacity for [`ChannelSink::new`]
const CHANNEL_CAPACITY: usize = 1024;

/// Forwards envelopes into a tokio mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<EventEnvelope>,
}

impl ChannelSink {
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<EventEnvelope>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&self, envelope: EventEnvelope) -> Result<()> {
        self.tx
            .send(envelope)
            .await
            .map_err(|e| ServiceError::Transport(format!("event channel closed: {e}")))
    }
}

/// Writes one JSON document per line
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl JsonLinesSink<tokio::io::Stdout> {
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> EventSink for JsonLinesSink<W> {
    async fn send(&self, envelope: EventEnvelope) -> Result<()> {
        let mut line = serde_json::to_vec(&envelope)
            .map_err(|e| ServiceError::Transport(format!("encode envelope: {e}")))?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))
    }
}

/// Logs envelopes instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn send(&self, envelope: EventEnvelope) -> Result<()> {
        tracing::info!(
            topic = %envelope.topic,
            event_type = %envelope.event_type,
            event_id = %envelope.id,
            "Event suppressed (dry run)"
        );
        Ok(())
    }
}

// =============================================================================
// PUBLISHER
// =============================================================================

/// Builds envelopes from configuration and hands them to the sink
#[derive(Clone)]
pub struct Publisher {
    config: Arc<Config>,
    sink: Arc<dyn EventSink>,
    published: Arc<AtomicU64>,
}

impl Publisher {
    pub fn new(config: Arc<Config>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            sink,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wrap `payload` in an envelope and send it.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Transport`] when the payload cannot be encoded or the
    /// sink refuses it.
    pub async fn publish<P: Serialize + Sync>(
        &self,
        topic: Topic,
        event_type: &str,
        payload: &P,
    ) -> Result<EventEnvelope> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| ServiceError::Transport(format!("encode payload: {e}")))?;

        let envelope = EventEnvelope {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            topic: self.config.catalog.topic(topic).to_string(),
            source: self.config.event_source.clone(),
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp: Utc::now(),
            payload,
        };

        tracing::debug!(
            topic = %envelope.topic,
            event_type = %envelope.event_type,
            "Publishing event"
        );
        self.sink.send(envelope.clone()).await?;
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(envelope)
    }

    /// Envelopes successfully handed to the sink so far
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
