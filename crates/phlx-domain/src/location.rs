//! # Location / Area Aggregate
//!
//! A [`Location`] owns its [`Area`]s. The mutation methods on `Location` are
//! the only way to change an area; each one validates its input before
//! touching state and stamps the location's `updated_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, Result};
use crate::geometry::{Coordinate, point_in_polygon, validate_boundary};
use crate::{Actor, Metadata};

/// Area priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaPriority {
    High,
    Medium,
    Low,
}

/// Map display styling for an area
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaStyle {
    pub fill_color: Option<String>,
    pub border_color: Option<String>,
    /// 0.0 to 1.0
    pub opacity: Option<f64>,
}

/// Named polygon zone inside a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub boundary: Vec<Coordinate>,
    pub style: AreaStyle,
    /// perimeter, patrol_zone, checkpoint, ...
    pub kind: Option<String>,
    pub priority: Option<AreaPriority>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Area {
    /// Whether the area's polygon contains the coordinate.
    #[must_use]
    pub fn contains(&self, point: &Coordinate) -> bool {
        point_in_polygon(point, &self.boundary)
    }
}

/// Input for [`Location::add_area`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArea {
    /// Caller-chosen id; generated when absent
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub boundary: Vec<Coordinate>,
    #[serde(default)]
    pub style: AreaStyle,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub priority: Option<AreaPriority>,
    /// Defaults to active when absent
    #[serde(default)]
    pub active: Option<bool>,
}

impl NewArea {
    pub fn new(name: impl Into<String>, boundary: Vec<Coordinate>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            boundary,
            style: AreaStyle::default(),
            kind: None,
            priority: None,
            active: None,
        }
    }
}

/// Partial update for an area; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub boundary: Option<Vec<Coordinate>>,
    pub fill_color: Option<String>,
    pub border_color: Option<String>,
    pub opacity: Option<f64>,
    pub kind: Option<String>,
    pub priority: Option<AreaPriority>,
    pub active: Option<bool>,
}

/// Partial update for the location itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub center: Option<Coordinate>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub use_case: Option<String>,
    pub tags: Option<Vec<String>>,
    pub active: Option<bool>,
}

/// Geographic location with a center point and its areas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub center: Coordinate,
    areas: Vec<Area>,

    // Display
    pub color: Option<String>,
    pub icon: Option<String>,

    /// military, police, defense, ...
    pub use_case: Option<String>,
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,

    pub active: bool,

    // Audit
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

fn validate_opacity(opacity: Option<f64>) -> Result<()> {
    match opacity {
        Some(o) if !(0.0..=1.0).contains(&o) => Err(DomainError::InvalidBoundary(format!(
            "opacity {o} must be between 0.0 and 1.0"
        ))),
        _ => Ok(()),
    }
}

impl Location {
    pub fn new(name: impl Into<String>, center: Coordinate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            center,
            areas: Vec::new(),
            color: None,
            icon: None,
            use_case: None,
            tags: Vec::new(),
            metadata: Metadata::new(),
            active: true,
            created_by: None,
            created_at: now,
            updated_by: None,
            updated_at: now,
        }
    }

    fn touch(&mut self, actor: Option<&Actor>) {
        self.updated_at = Utc::now();
        if let Some(actor) = actor {
            self.updated_by = Some(actor.id.clone());
        }
    }

    #[must_use]
    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    #[must_use]
    pub fn find_area(&self, area_id: Uuid) -> Option<&Area> {
        self.areas.iter().find(|a| a.id == area_id)
    }

    /// Areas that currently take part in geofence membership.
    pub fn active_areas(&self) -> impl Iterator<Item = &Area> {
        self.areas.iter().filter(|a| a.active)
    }

    /// Append a new area.
    ///
    /// # Errors
    ///
    /// - [`DomainError::InvalidBoundary`] when the boundary or opacity is
    ///   invalid
    /// - [`DomainError::DuplicateId`] when `new.id` is already taken
    ///
    /// The location is left untouched on error.
    pub fn add_area(&mut self, new: NewArea, actor: Option<&Actor>) -> Result<&Area> {
        validate_boundary(&new.boundary)?;
        validate_opacity(new.style.opacity)?;
        if let Some(id) = new.id.filter(|id| self.find_area(*id).is_some()) {
            return Err(DomainError::DuplicateId {
                entity_type: "Area".to_string(),
                id: id.to_string(),
            });
        }

        let now = Utc::now();
        self.areas.push(Area {
            id: new.id.unwrap_or_else(Uuid::new_v4),
            name: new.name,
            description: new.description,
            boundary: new.boundary,
            style: new.style,
            kind: new.kind,
            priority: new.priority,
            active: new.active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        });
        self.touch(actor);

        let idx = self.areas.len() - 1;
        Ok(&self.areas[idx])
    }

    /// Apply a partial update to an area.
    ///
    /// # Errors
    ///
    /// - [`DomainError::NotFound`] when no area has `area_id`
    /// - [`DomainError::InvalidBoundary`] when the new boundary or opacity is
    ///   invalid; no field is applied in that case
    pub fn update_area(
        &mut self,
        area_id: Uuid,
        update: AreaUpdate,
        actor: Option<&Actor>,
    ) -> Result<&Area> {
        let idx = self
            .areas
            .iter()
            .position(|a| a.id == area_id)
            .ok_or_else(|| DomainError::not_found("Area", area_id))?;

        if let Some(boundary) = &update.boundary {
            validate_boundary(boundary)?;
        }
        validate_opacity(update.opacity)?;

        let area = &mut self.areas[idx];
        if let Some(name) = update.name {
            area.name = name;
        }
        if let Some(description) = update.description {
            area.description = Some(description);
        }
        if let Some(boundary) = update.boundary {
            area.boundary = boundary;
        }
        if let Some(fill) = update.fill_color {
            area.style.fill_color = Some(fill);
        }
        if let Some(border) = update.border_color {
            area.style.border_color = Some(border);
        }
        if let Some(opacity) = update.opacity {
            area.style.opacity = Some(opacity);
        }
        if let Some(kind) = update.kind {
            area.kind = Some(kind);
        }
        if let Some(priority) = update.priority {
            area.priority = Some(priority);
        }
        if let Some(active) = update.active {
            area.active = active;
        }
        area.updated_at = Utc::now();
        self.touch(actor);

        Ok(&self.areas[idx])
    }

    /// Remove an area, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] when no area has `area_id`.
    pub fn remove_area(&mut self, area_id: Uuid, actor: Option<&Actor>) -> Result<Area> {
        let idx = self
            .areas
            .iter()
            .position(|a| a.id == area_id)
            .ok_or_else(|| DomainError::not_found("Area", area_id))?;

        let removed = self.areas.remove(idx);
        self.touch(actor);
        Ok(removed)
    }

    /// Apply a partial update to the location's own fields.
    pub fn update(&mut self, update: LocationUpdate, actor: Option<&Actor>) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(center) = update.center {
            self.center = center;
        }
        if let Some(color) = update.color {
            self.color = Some(color);
        }
        if let Some(icon) = update.icon {
            self.icon = Some(icon);
        }
        if let Some(use_case) = update.use_case {
            self.use_case = Some(use_case);
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(active) = update.active {
            self.active = active;
        }
        self.touch(actor);
    }
}
