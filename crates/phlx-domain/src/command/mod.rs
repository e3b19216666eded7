//! # Tactical Commands
//!
//! Value types for commands issued against one or more targets. The
//! per-target response table lives in [`ledger`], the state machine in
//! [`lifecycle`].

pub mod ledger;
pub mod lifecycle;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Metadata;
use crate::error::{DomainError, Result};
use crate::geometry::{Coordinate, point_in_polygon, validate_boundary};

pub use ledger::{LedgerSlot, TargetLedger};
pub use lifecycle::{ResponseOutcome, TacticalCommand};

// =============================================================================
// ENUMS
// =============================================================================

/// Command lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// AI suggestion awaiting operator approval
    PendingApproval,
    /// Approved, waiting for target responses
    Pending,
    Accepted,
    Rejected,
    InProgress,
    Completed,
    Cancelled,
}

impl CommandStatus {
    pub const ALL: [Self; 7] = [
        Self::PendingApproval,
        Self::Pending,
        Self::Accepted,
        Self::Rejected,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingApproval => "pending_approval",
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Rejected)
    }

    /// Statuses set by an explicit operator action rather than derived from
    /// target responses.
    #[must_use]
    pub fn is_operator_phase(&self) -> bool {
        !matches!(self, Self::Accepted | Self::Rejected)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| DomainError::InvalidCommand(format!("unknown status '{s}'")))
    }
}

/// Predefined categories used for UI icon/color mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCategory {
    Movement,
    Security,
    Surveillance,
    Dispatch,
    Communication,
    Medical,
    Evacuation,
    Support,
    Investigation,
    Other,
}

impl CommandCategory {
    pub const ALL: [Self; 10] = [
        Self::Movement,
        Self::Security,
        Self::Surveillance,
        Self::Dispatch,
        Self::Communication,
        Self::Medical,
        Self::Evacuation,
        Self::Support,
        Self::Investigation,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movement => "movement",
            Self::Security => "security",
            Self::Surveillance => "surveillance",
            Self::Dispatch => "dispatch",
            Self::Communication => "communication",
            Self::Medical => "medical",
            Self::Evacuation => "evacuation",
            Self::Support => "support",
            Self::Investigation => "investigation",
            Self::Other => "other",
        }
    }
}

impl FromStr for CommandCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| DomainError::InvalidCommand(format!("unknown category '{s}'")))
    }
}

/// Command priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandPriority {
    Routine,
    Priority,
    Immediate,
    /// Critical / emergency
    Flash,
}

impl CommandPriority {
    pub const ALL: [Self; 4] = [Self::Routine, Self::Priority, Self::Immediate, Self::Flash];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Routine => "routine",
            Self::Priority => "priority",
            Self::Immediate => "immediate",
            Self::Flash => "flash",
        }
    }
}

impl FromStr for CommandPriority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| DomainError::InvalidCommand(format!("unknown priority '{s}'")))
    }
}

/// Who originated the command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    Ai,
    #[default]
    Operator,
}

/// Addressee kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Asset,
    Team,
}

/// A target's decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    Rejected,
}

// =============================================================================
// VALUE OBJECTS
// =============================================================================

/// An asset or team the command is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTarget {
    pub target_type: TargetType,
    pub target_id: Uuid,
    pub target_name: String,
}

/// A target's current response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub target_id: Uuid,
    pub target_type: TargetType,
    pub target_name: String,
    pub decision: Decision,
    pub notes: Option<String>,
    pub responded_by: String,
    pub responded_by_name: String,
    pub responded_at: DateTime<Utc>,
}

/// Response as submitted by (or on behalf of) a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetReply {
    pub target_id: Uuid,
    pub target_type: TargetType,
    pub decision: Decision,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One entry in the append-only status history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandStatusUpdate {
    pub status: CommandStatus,
    pub changed_by: String,
    pub changed_by_name: String,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Command destination or waypoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TacticalGeoLocation {
    pub point: Coordinate,
    /// "Training Area West"
    #[serde(default)]
    pub name: Option<String>,
    /// "2.4 km from perimeter"
    #[serde(default)]
    pub description: Option<String>,
}

/// Area of operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TacticalGeoArea {
    Circle {
        center: Coordinate,
        radius_m: f64,
        #[serde(default)]
        name: Option<String>,
    },
    Polygon {
        coordinates: Vec<Coordinate>,
        #[serde(default)]
        name: Option<String>,
    },
    Route {
        coordinates: Vec<Coordinate>,
        #[serde(default)]
        name: Option<String>,
    },
}

impl TacticalGeoArea {
    fn validate(&self) -> Result<()> {
        match self {
            Self::Circle { radius_m, .. } if !radius_m.is_finite() || *radius_m <= 0.0 => Err(
                DomainError::InvalidCommand(format!("circle radius {radius_m} must be positive")),
            ),
            Self::Circle { .. } => Ok(()),
            Self::Polygon { coordinates, .. } => validate_boundary(coordinates),
            Self::Route { coordinates, .. } if coordinates.len() < 2 => Err(
                DomainError::InvalidCommand("route needs at least 2 points".into()),
            ),
            Self::Route { .. } => Ok(()),
        }
    }

    /// Whether a point lies inside the area. Routes have no interior.
    #[must_use]
    pub fn contains(&self, point: &Coordinate) -> bool {
        match self {
            Self::Circle {
                center, radius_m, ..
            } => center.distance_to_km(point) * 1000.0 <= *radius_m,
            Self::Polygon { coordinates, .. } => point_in_polygon(point, coordinates),
            Self::Route { .. } => false,
        }
    }
}

/// Input for [`TacticalCommand::issue`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCommand {
    pub mission_id: Uuid,
    pub mission_title: String,
    #[serde(default)]
    pub situation_summary: Option<String>,
    pub title: String,
    pub description: String,
    pub category: CommandCategory,
    pub targets: Vec<CommandTarget>,
    #[serde(default)]
    pub destination: Option<TacticalGeoLocation>,
    #[serde(default)]
    pub waypoints: Vec<TacticalGeoLocation>,
    #[serde(default)]
    pub area_of_operation: Option<TacticalGeoArea>,
    #[serde(default)]
    pub objective: Option<String>,
    pub priority: CommandPriority,
    #[serde(default)]
    pub source: CommandSource,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewCommand {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::InvalidCommand("title must not be empty".into()));
        }
        if let Some(area) = &self.area_of_operation {
            area.validate()?;
        }
        Ok(())
    }
}

/// Query filter for listing commands
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandFilter {
    pub mission_id: Option<Uuid>,
    pub status: Option<CommandStatus>,
    pub target_id: Option<Uuid>,
    pub category: Option<CommandCategory>,
    pub priority: Option<CommandPriority>,
    pub source: Option<CommandSource>,
}

impl CommandFilter {
    #[must_use]
    pub fn matches(&self, command: &TacticalCommand) -> bool {
        self.mission_id.is_none_or(|m| command.mission_id == m)
            && self.status.is_none_or(|s| command.status() == s)
            && self
                .target_id
                .is_none_or(|t| command.ledger().targets().any(|target| target.target_id == t))
            && self.category.is_none_or(|c| command.category == c)
            && self.priority.is_none_or(|p| command.priority == p)
            && self.source.is_none_or(|s| command.source == s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_strings() {
        for status in CommandStatus::ALL {
            assert_eq!(status.as_str().parse::<CommandStatus>().unwrap(), status);
        }
        assert!("paused".parse::<CommandStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = CommandStatus::ALL
            .into_iter()
            .filter(CommandStatus::is_terminal)
            .collect();
        assert_eq!(
            terminal,
            vec![CommandStatus::Rejected, CommandStatus::Completed, CommandStatus::Cancelled]
        );
    }

    #[test]
    fn test_category_and_priority_parse() {
        assert_eq!("medical".parse::<CommandCategory>().unwrap(), CommandCategory::Medical);
        assert!("bogus".parse::<CommandCategory>().is_err());
        assert_eq!("flash".parse::<CommandPriority>().unwrap(), CommandPriority::Flash);
        assert!(CommandPriority::Flash > CommandPriority::Routine);
    }

    #[test]
    fn test_area_of_operation() {
        let center = Coordinate::new(38.0, 23.7).unwrap();
        let circle = TacticalGeoArea::Circle {
            center,
            radius_m: 2_000.0,
            name: None,
        };
        assert!(circle.validate().is_ok());
        assert!(circle.contains(&Coordinate::new(38.01, 23.7).unwrap()));
        assert!(!circle.contains(&Coordinate::new(38.05, 23.7).unwrap()));

        let route = TacticalGeoArea::Route {
            coordinates: vec![center],
            name: None,
        };
        assert!(route.validate().is_err());
    }

    #[test]
    fn test_area_serde_tag() {
        let json = r#"{"type":"polygon","coordinates":[
            {"latitude":0,"longitude":0},
            {"latitude":0,"longitude":1},
            {"latitude":1,"longitude":1}]}"#;
        let area: TacticalGeoArea = serde_json::from_str(json).unwrap();
        assert!(matches!(area, TacticalGeoArea::Polygon { .. }));
        assert!(area.validate().is_ok());
    }
}
