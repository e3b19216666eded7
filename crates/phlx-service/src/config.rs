//! # Service Configuration
//!
//! Environment-based configuration, read once at startup and shared
//! immutably. The [`Catalog`] of constant tables lives here too.

use std::env;
use std::str::FromStr;

use phlx_domain::{CommandCategory, CommandPriority, RiskModel, RiskThresholds, RiskWeights};

use crate::error::{Result, ServiceError};

/// Default value for `EVENT_SOURCE`
pub const DEFAULT_EVENT_SOURCE: &str = "phlx-core";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(ServiceError::Config(format!(
                "LOG_FORMAT must be 'json' or 'pretty', got '{other}'"
            ))),
        }
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Outbound event topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    LocationUpdates,
    FireEvents,
    TacticalCommands,
}

/// Topic names as published on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub location_updates: String,
    pub fire_events: String,
    pub tactical_commands: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            location_updates: "location-updates".to_string(),
            fire_events: "fire-events".to_string(),
            tactical_commands: "tactical-commands".to_string(),
        }
    }
}

/// Constant tables: topic names and the command categories/priorities
/// accepted by this deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub topics: Topics,
    pub categories: Vec<CommandCategory>,
    pub priorities: Vec<CommandPriority>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            topics: Topics::default(),
            categories: CommandCategory::ALL.to_vec(),
            priorities: CommandPriority::ALL.to_vec(),
        }
    }
}

impl Catalog {
    /// Build the catalog from `COMMAND_CATEGORIES`, `COMMAND_PRIORITIES` and
    /// the `TOPIC_*` overrides; unset keys keep the defaults.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Config`] for an unknown name, an empty list or a blank
    /// topic.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let topic = |key: &str, default: String| match lookup(key) {
            Some(raw) if raw.trim().is_empty() => {
                Err(ServiceError::Config(format!("{key} must not be blank")))
            }
            Some(raw) => Ok(raw.trim().to_string()),
            None => Ok(default),
        };

        Ok(Self {
            topics: Topics {
                location_updates: topic(
                    "TOPIC_LOCATION_UPDATES",
                    defaults.topics.location_updates,
                )?,
                fire_events: topic("TOPIC_FIRE_EVENTS", defaults.topics.fire_events)?,
                tactical_commands: topic(
                    "TOPIC_TACTICAL_COMMANDS",
                    defaults.topics.tactical_commands,
                )?,
            },
            categories: lookup("COMMAND_CATEGORIES")
                .map_or(Ok(defaults.categories), |raw| parse_names("COMMAND_CATEGORIES", &raw))?,
            priorities: lookup("COMMAND_PRIORITIES")
                .map_or(Ok(defaults.priorities), |raw| parse_names("COMMAND_PRIORITIES", &raw))?,
        })
    }

    pub fn topic(&self, topic: Topic) -> &str {
        match topic {
            Topic::LocationUpdates => &self.topics.location_updates,
            Topic::FireEvents => &self.topics.fire_events,
            Topic::TacticalCommands => &self.topics.tactical_commands,
        }
    }

    #[must_use]
    pub fn allows_category(&self, category: CommandCategory) -> bool {
        self.categories.contains(&category)
    }

    #[must_use]
    pub fn allows_priority(&self, priority: CommandPriority) -> bool {
        self.priorities.contains(&priority)
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Logging level, overridden by `RUST_LOG`
    pub log_level: String,

    pub log_format: LogFormat,

    /// Validated risk scoring policy
    pub risk_model: RiskModel,

    /// `source` stamped on every outbound envelope
    pub event_source: String,

    pub catalog: Catalog,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            risk_model: RiskModel::default(),
            event_source: DEFAULT_EVENT_SOURCE.to_string(),
            catalog: Catalog::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] when a variable is malformed or the
    /// resulting risk model is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = RiskModel::default();

        let weights = match lookup("RISK_WEIGHTS") {
            Some(raw) => {
                let [distance, intensity, confidence, fwi] = parse_list("RISK_WEIGHTS", &raw)?;
                RiskWeights {
                    distance,
                    intensity,
                    confidence,
                    fwi,
                }
            }
            None => defaults.weights,
        };

        let thresholds = match lookup("RISK_THRESHOLDS") {
            Some(raw) => {
                let [low, medium, high, critical] = parse_list("RISK_THRESHOLDS", &raw)?;
                RiskThresholds {
                    low,
                    medium,
                    high,
                    critical,
                }
            }
            None => defaults.thresholds,
        };

        let risk_model = RiskModel {
            weights,
            thresholds,
            max_distance_km: parse_or(&lookup, "RISK_MAX_DISTANCE_KM", defaults.max_distance_km)?,
            intensity_saturation_mw: parse_or(
                &lookup,
                "RISK_INTENSITY_SATURATION_MW",
                defaults.intensity_saturation_mw,
            )?,
            material_delta: parse_or(&lookup, "RISK_MATERIAL_DELTA", defaults.material_delta)?,
        };
        risk_model
            .validate()
            .map_err(|e| ServiceError::Config(e.to_string()))?;

        let log_format = lookup("LOG_FORMAT")
            .map(|v| v.parse::<LogFormat>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
            risk_model,
            event_source: lookup("EVENT_SOURCE")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_SOURCE.to_string()),
            catalog: Catalog::from_lookup(&lookup)?,
        })
    }
}

fn parse_names<T>(key: &str, raw: &str) -> Result<Vec<T>>
where
    T: FromStr + PartialEq,
    T::Err: std::fmt::Display,
{
    let mut names = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let name = part
            .parse::<T>()
            .map_err(|e| ServiceError::Config(format!("{key}: {e}")))?;
        if !names.contains(&name) {
            names.push(name);
        }
    }
    if names.is_empty() {
        return Err(ServiceError::Config(format!("{key} must list at least one value")));
    }
    Ok(names)
}

fn parse_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> Result<f64> {
    lookup(key).map_or(Ok(default), |raw| parse_number(key, &raw))
}

fn parse_number(key: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ServiceError::Config(format!("{key}: '{raw}' is not a number")))
}

fn parse_list<const N: usize>(key: &str, raw: &str) -> Result<[f64; N]> {
    let values = raw
        .split(',')
        .map(|part| parse_number(key, part))
        .collect::<Result<Vec<f64>>>()?;
    let count = values.len();
    values.try_into().map_err(|_| {
        ServiceError::Config(format!("{key}: expected {N} comma-separated values, got {count}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.event_source, "phlx-core");
        assert_eq!(config.risk_model, RiskModel::default());
        assert_eq!(config.catalog.topic(Topic::TacticalCommands), "tactical-commands");
        assert_eq!(config.catalog.topic(Topic::LocationUpdates), "location-updates");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("LOG_LEVEL", "debug"),
            ("LOG_FORMAT", "pretty"),
            ("RISK_WEIGHTS", "0.4, 0.1, 0.2, 0.3"),
            ("RISK_THRESHOLDS", "5,20,40,70"),
            ("RISK_MATERIAL_DELTA", "2.5"),
            ("EVENT_SOURCE", "ops-east"),
        ]))
        .unwrap();

        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!((config.risk_model.weights.distance - 0.4).abs() < f64::EPSILON);
        assert!((config.risk_model.thresholds.critical - 70.0).abs() < f64::EPSILON);
        assert!((config.risk_model.material_delta - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.event_source, "ops-east");
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for pairs in [
            vec![("RISK_WEIGHTS", "0.5,0.5,0.5,0.5")],
            vec![("RISK_WEIGHTS", "0.5,0.5")],
            vec![("RISK_THRESHOLDS", "50,40,30,20")],
            vec![("RISK_MAX_DISTANCE_KM", "far")],
            vec![("LOG_FORMAT", "xml")],
        ] {
            let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(matches!(err, ServiceError::Config(_)), "{pairs:?}");
        }
    }

    #[test]
    fn test_catalog_from_env() {
        let config = Config::from_lookup(lookup(&[
            ("COMMAND_CATEGORIES", "evacuation, dispatch"),
            ("COMMAND_PRIORITIES", "flash"),
            ("TOPIC_FIRE_EVENTS", "ops.fire"),
        ]))
        .unwrap();

        let catalog = &config.catalog;
        assert_eq!(
            catalog.categories,
            vec![CommandCategory::Evacuation, CommandCategory::Dispatch]
        );
        assert!(!catalog.allows_category(CommandCategory::Movement));
        assert!(!catalog.allows_priority(CommandPriority::Routine));
        assert_eq!(catalog.topic(Topic::FireEvents), "ops.fire");
        assert_eq!(catalog.topic(Topic::TacticalCommands), "tactical-commands");

        for pairs in [
            vec![("COMMAND_CATEGORIES", "evacuation,teleport")],
            vec![("COMMAND_PRIORITIES", " , ")],
            vec![("TOPIC_LOCATION_UPDATES", "  ")],
        ] {
            let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
            assert_eq!(err.error_code(), "CONFIG_ERROR", "{pairs:?}");
        }
    }

    #[test]
    fn test_catalog_lists_every_category_and_priority() {
        let catalog = Catalog::default();
        assert!(CommandCategory::ALL.into_iter().all(|c| catalog.allows_category(c)));
        assert!(catalog.allows_priority(CommandPriority::Flash));
    }
}
