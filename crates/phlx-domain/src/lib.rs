//! # Phalanx Core - Domain Model
//!
//! Entities, value objects and pure rules for situational-awareness
//! operations: monitored locations with geofenced areas, tracked assets,
//! fire risk scoring, and multi-target tactical commands.
//!
//! Nothing in this crate performs I/O. Persistence and transport live in
//! `phlx-persistence` and `phlx-service`.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod asset;
pub mod command;
pub mod error;
pub mod fire_event;
pub mod geofence;
pub mod geometry;
pub mod location;
pub mod risk;

pub use asset::{Asset, AssetStatus, Position, Vitals};
pub use command::{
    CommandCategory, CommandFilter, CommandPriority, CommandResponse, CommandSource,
    CommandStatus, CommandStatusUpdate, CommandTarget, Decision, NewCommand, ResponseOutcome,
    TacticalCommand, TacticalGeoArea, TacticalGeoLocation, TargetLedger, TargetReply, TargetType,
};
pub use error::{DomainError, Result};
pub use fire_event::{
    FireDetail, FireEvent, FireEventStatus, FireEventType, FwiCategory, FwiInfo,
    MonitoredLocation, RiskLevel, ScoreFactors,
};
pub use geofence::{Membership, MembershipChange, MembershipTransition};
pub use geometry::{BoundingBox, Coordinate, point_in_polygon, validate_boundary};
pub use location::{Area, AreaPriority, AreaStyle, AreaUpdate, Location, LocationUpdate, NewArea};
pub use risk::{
    FireRiskEngine, FireRiskEvent, RiskAssessment, RiskEvaluation, RiskInputs, RiskModel,
    RiskThresholds, RiskWeights,
};

/// Free-form key/value bag carried by most entities
pub type Metadata = BTreeMap<String, serde_json::Value>;

// =============================================================================
// IDENTITY
// =============================================================================

/// Authenticated caller, as resolved by the surrounding system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Actor used for changes made by the system itself
    #[must_use]
    pub fn system() -> Self {
        Self::new("system", "System")
    }
}

// =============================================================================
// QUERY TYPES
// =============================================================================

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Slice a fully materialized, already ordered result set.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().skip(self.offset).take(self.limit).collect()
    }
}
