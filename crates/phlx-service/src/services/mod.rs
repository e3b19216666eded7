//! # Services
//!
//! Each service loads an aggregate, applies a domain operation, saves it at
//! the revision it was loaded at and publishes what changed.

pub mod command;
pub mod fire_risk;
pub mod geofence;

pub use command::CommandService;
pub use fire_risk::FireRiskService;
pub use geofence::{GeofenceService, MembershipDelta};
