//! Fire risk entities: detections, fire weather index, and the persisted
//! [`FireEvent`] lifecycle record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, Result};
use crate::geometry::Coordinate;

/// Discrete risk level, ordered from `None` to `Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Fire event status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireEventStatus {
    Active,
    Cleared,
    Acknowledged,
}

impl FireEventStatus {
    /// Active and acknowledged events are both still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Cleared)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cleared => "cleared",
            Self::Acknowledged => "acknowledged",
        }
    }
}

/// Risk lifecycle event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireEventType {
    Detected,
    Updated,
    Cleared,
}

impl FireEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detected => "detected",
            Self::Updated => "updated",
            Self::Cleared => "cleared",
        }
    }

    /// Envelope event name, e.g. `fire.risk.detected`.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Detected => "fire.risk.detected",
            Self::Updated => "fire.risk.updated",
            Self::Cleared => "fire.risk.cleared",
        }
    }
}

/// Fire Weather Index category (EFFIS bands)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FwiCategory {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
    Extreme,
}

impl FwiCategory {
    #[must_use]
    pub fn from_value(value: f64) -> Self {
        match value {
            v if v < 5.2 => Self::VeryLow,
            v if v < 11.2 => Self::Low,
            v if v < 21.3 => Self::Moderate,
            v if v < 38.0 => Self::High,
            v if v < 50.0 => Self::VeryHigh,
            _ => Self::Extreme,
        }
    }
}

/// Fire Weather Index reading. Category and rating always follow `value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFwi")]
pub struct FwiInfo {
    /// 0-100
    pub value: f64,
    pub category: FwiCategory,
    /// 1-10
    pub rating: u8,
}

/// Wire form; any supplied category or rating is recomputed from the value
#[derive(Deserialize)]
struct RawFwi {
    value: f64,
}

impl From<RawFwi> for FwiInfo {
    fn from(raw: RawFwi) -> Self {
        Self::from_value(raw.value)
    }
}

impl FwiInfo {
    /// Derive category and rating from a bare value.
    #[must_use]
    pub fn from_value(value: f64) -> Self {
        let value = value.clamp(0.0, 100.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rating = ((value / 10.0).ceil() as u8).clamp(1, 10);
        Self {
            value,
            category: FwiCategory::from_value(value),
            rating,
        }
    }
}

/// One satellite or ground fire detection near a monitored location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireDetail {
    pub fire_id: String,
    /// copernicus_effis, nasa_firms, ...
    pub source: String,
    /// VIIRS_NOAA20_NRT, VIIRS_SNPP_NRT, MODIS_NRT, ...
    #[serde(default)]
    pub satellite_source: Option<String>,
    pub distance_km: f64,
    #[serde(default)]
    pub in_fire: bool,
    /// Fire radiative power in MW
    #[serde(default)]
    pub intensity: Option<f64>,
    /// l/n/h label or a percentage
    #[serde(default)]
    pub confidence: Option<String>,
}

impl FireDetail {
    /// Build a detection from the fire's position, measuring the distance to
    /// the monitored location.
    pub fn from_position(
        fire_id: impl Into<String>,
        source: impl Into<String>,
        fire: &Coordinate,
        monitored: &Coordinate,
    ) -> Self {
        Self {
            fire_id: fire_id.into(),
            source: source.into(),
            satellite_source: None,
            distance_km: fire.distance_to_km(monitored),
            in_fire: false,
            intensity: None,
            confidence: None,
        }
    }
}

/// Per-factor breakdown of a risk score, each 0-100
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreFactors {
    pub distance_score: f64,
    pub intensity_score: f64,
    pub confidence_score: f64,
    pub fwi_score: f64,
}

/// A place whose fire risk is tracked (an asset or a facility)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredLocation {
    pub id: Uuid,
    pub name: String,
    /// asset, facility, ...
    pub kind: String,
    pub position: Coordinate,
}

/// Persisted fire risk record for one monitored location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireEvent {
    pub id: Uuid,
    pub location_id: Uuid,
    pub location_name: String,
    pub location_kind: String,

    /// Lifecycle event that produced this revision
    pub event_type: FireEventType,
    pub risk_level: RiskLevel,
    /// 0-100
    pub risk_score: f64,

    pub fires: Vec<FireDetail>,
    pub fwi: Option<FwiInfo>,
    pub score_factors: Option<ScoreFactors>,

    pub status: FireEventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FireEvent {
    /// Operator acknowledgement of an active event.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidTransition`] unless the event is active.
    pub fn acknowledge(&mut self) -> Result<()> {
        if self.status != FireEventStatus::Active {
            return Err(DomainError::transition(
                self.status.as_str(),
                FireEventStatus::Acknowledged.as_str(),
            ));
        }
        self.status = FireEventStatus::Acknowledged;
        self.updated_at = Utc::now();
        Ok(())
    }
}
