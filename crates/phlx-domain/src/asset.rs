//! Mobile assets (vehicles, teams, drones) as seen by the geofence engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Metadata;
use crate::geometry::Coordinate;

/// Asset operational status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Ready for dispatch
    Available,
    /// On a mission
    Dispatched,
    /// Coming back to base
    Returning,
    /// Not operational
    Offline,
}

/// Last reported position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude_m: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self {
            latitude: lat,
            longitude: lon,
            altitude_m: alt,
        }
    }

    /// Planar coordinate for containment tests.
    ///
    /// `None` when the position is the `(0, 0)` sentinel or out of range.
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::new(self.latitude, self.longitude)
            .ok()
            .filter(|c| !c.is_unset())
    }
}

/// Personnel vitals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vitals {
    pub battery_level: Option<u8>,
    pub pulse_rate: Option<u16>,
    pub oxygen_level: Option<u8>,
}

/// Asset entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub status: AssetStatus,
    pub team_id: Option<Uuid>,
    #[serde(default)]
    pub assigned_area_ids: Vec<Uuid>,
    pub position: Position,
    pub vitals: Option<Vitals>,
    /// When false, position simulators leave this asset alone
    #[serde(default)]
    pub auto_position_enabled: bool,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Asset {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, position: Position) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind: kind.into(),
            status: AssetStatus::Available,
            team_id: None,
            assigned_area_ids: Vec::new(),
            position,
            vitals: None,
            auto_position_enabled: false,
            last_updated: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    /// Record a new position report.
    pub fn move_to(&mut self, position: Position) {
        self.position = position;
        self.last_updated = Utc::now();
    }
}
