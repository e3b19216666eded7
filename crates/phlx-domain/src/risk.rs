//! # Composite Risk Scoring
//!
//! Four independent sub-scores (distance, intensity, confidence, FWI), each
//! clamped to `[0, 100]`, are fused by a fixed-weight sum into one risk score.
//! The score maps to a [`RiskLevel`] through strictly increasing thresholds.
//!
//! A location with no detections scores 0 / `none`: fire weather alone never
//! raises risk, it only amplifies detections.
//!
//! Default weights: distance 0.35, intensity 0.15, confidence 0.20, FWI 0.30.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, Result};
use crate::fire_event::{
    FireDetail, FireEvent, FireEventStatus, FireEventType, FwiInfo, MonitoredLocation, RiskLevel,
    ScoreFactors,
};

const MAX_SCORE: f64 = 100.0;

fn clamp_score(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, MAX_SCORE) }
}

// =============================================================================
// FACTOR MODEL
// =============================================================================

/// Qualitative detection confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionConfidence {
    Low,
    Nominal,
    High,
    /// MODIS style 0-100 confidence
    Percent(f64),
    Unknown,
}

impl DetectionConfidence {
    /// Parse VIIRS labels (`l`/`n`/`h`), spelled-out labels, or a percentage.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase();
        match label.as_str() {
            "l" | "low" => Self::Low,
            "n" | "nominal" | "medium" => Self::Nominal,
            "h" | "high" => Self::High,
            other => other
                .trim_end_matches('%')
                .parse::<f64>()
                .map_or(Self::Unknown, Self::Percent),
        }
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        match self {
            Self::Low => 30.0,
            Self::Nominal => 65.0,
            Self::High => 100.0,
            Self::Percent(p) => clamp_score(*p),
            Self::Unknown => 0.0,
        }
    }
}

/// Closer is higher; a detection inside the fire perimeter is always 100.
#[must_use]
pub fn distance_score(distance_km: f64, in_fire: bool, max_distance_km: f64) -> f64 {
    if in_fire {
        return MAX_SCORE;
    }
    if max_distance_km <= 0.0 {
        return 0.0;
    }
    clamp_score(MAX_SCORE * (1.0 - distance_km.max(0.0) / max_distance_km))
}

/// Linear in fire radiative power up to the saturation point.
#[must_use]
pub fn intensity_score(intensity_mw: Option<f64>, saturation_mw: f64) -> f64 {
    match intensity_mw {
        Some(frp) if saturation_mw > 0.0 => clamp_score(MAX_SCORE * frp / saturation_mw),
        _ => 0.0,
    }
}

#[must_use]
pub fn confidence_score(label: Option<&str>) -> f64 {
    label.map_or(0.0, |l| DetectionConfidence::parse(l).score())
}

/// The FWI value itself, clamped.
#[must_use]
pub fn fwi_score(value: f64) -> f64 {
    clamp_score(value)
}

// =============================================================================
// MODEL PARAMETERS
// =============================================================================

/// Factor weights; must be non-negative and sum to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub distance: f64,
    pub intensity: f64,
    pub confidence: f64,
    pub fwi: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            distance: 0.35,
            intensity: 0.15,
            confidence: 0.20,
            fwi: 0.30,
        }
    }
}

/// Lower bounds (inclusive) of each level above `none`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 10.0,
            medium: 25.0,
            high: 50.0,
            critical: 75.0,
        }
    }
}

impl RiskThresholds {
    #[must_use]
    pub fn level_for(&self, score: f64) -> RiskLevel {
        if score >= self.critical {
            RiskLevel::Critical
        } else if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else if score >= self.low {
            RiskLevel::Low
        } else {
            RiskLevel::None
        }
    }
}

/// Complete scoring policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskModel {
    pub weights: RiskWeights,
    pub thresholds: RiskThresholds,
    /// Distance at which the distance score reaches 0
    pub max_distance_km: f64,
    /// Fire radiative power at which the intensity score reaches 100
    pub intensity_saturation_mw: f64,
    /// Minimum score change that counts as an update
    pub material_delta: f64,
}

impl Default for RiskModel {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            thresholds: RiskThresholds::default(),
            max_distance_km: 50.0,
            intensity_saturation_mw: 100.0,
            material_delta: 5.0,
        }
    }
}

impl RiskModel {
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidRiskModel`] for negative weights, weights
    /// not summing to 1.0, non-increasing thresholds, or non-positive scales.
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        let weights = [w.distance, w.intensity, w.confidence, w.fwi];
        if weights.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(DomainError::InvalidRiskModel(
                "weights must be finite and non-negative".into(),
            ));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(DomainError::InvalidRiskModel(format!(
                "weights must sum to 1.0, got {sum}"
            )));
        }

        let t = &self.thresholds;
        let bounds = [0.0, t.low, t.medium, t.high, t.critical];
        if !bounds.windows(2).all(|pair| pair[0] < pair[1]) || t.critical > MAX_SCORE {
            return Err(DomainError::InvalidRiskModel(
                "thresholds must be strictly increasing within (0, 100]".into(),
            ));
        }

        if self.max_distance_km <= 0.0 || self.intensity_saturation_mw <= 0.0 {
            return Err(DomainError::InvalidRiskModel(
                "distance and intensity scales must be positive".into(),
            ));
        }
        if self.material_delta < 0.0 {
            return Err(DomainError::InvalidRiskModel(
                "material delta must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Sub-scores for a set of detections and an optional FWI reading.
    #[must_use]
    pub fn factors(&self, inputs: &RiskInputs) -> ScoreFactors {
        let nearest = inputs
            .fires
            .iter()
            .map(|f| f.distance_km)
            .fold(f64::INFINITY, f64::min);
        let in_fire = inputs.fires.iter().any(|f| f.in_fire);

        let distance = if inputs.fires.is_empty() {
            0.0
        } else {
            distance_score(nearest, in_fire, self.max_distance_km)
        };
        let intensity = inputs
            .fires
            .iter()
            .map(|f| intensity_score(f.intensity, self.intensity_saturation_mw))
            .fold(0.0, f64::max);
        let confidence = inputs
            .fires
            .iter()
            .map(|f| confidence_score(f.confidence.as_deref()))
            .fold(0.0, f64::max);

        ScoreFactors {
            distance_score: distance,
            intensity_score: intensity,
            confidence_score: confidence,
            fwi_score: inputs.fwi.map_or(0.0, |fwi| fwi_score(fwi.value)),
        }
    }

    /// Weighted sum of the sub-scores, in `[0, 100]`.
    #[must_use]
    pub fn composite(&self, factors: &ScoreFactors) -> f64 {
        let w = &self.weights;
        clamp_score(
            w.distance * clamp_score(factors.distance_score)
                + w.intensity * clamp_score(factors.intensity_score)
                + w.confidence * clamp_score(factors.confidence_score)
                + w.fwi * clamp_score(factors.fwi_score),
        )
    }

    #[must_use]
    pub fn assess(&self, inputs: &RiskInputs) -> RiskAssessment {
        let factors = self.factors(inputs);
        let score = if inputs.fires.is_empty() {
            0.0
        } else {
            self.composite(&factors)
        };
        RiskAssessment {
            score,
            level: self.thresholds.level_for(score),
            factors,
        }
    }
}

/// Telemetry for one monitored location at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskInputs {
    #[serde(default)]
    pub fires: Vec<FireDetail>,
    #[serde(default)]
    pub fwi: Option<FwiInfo>,
}

/// Scoring result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub level: RiskLevel,
    pub factors: ScoreFactors,
}

// =============================================================================
// LIFECYCLE DECISION
// =============================================================================

/// A lifecycle event together with the fire event revision to persist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireRiskEvent {
    pub event_type: FireEventType,
    pub fire_event: FireEvent,
}

/// Result of evaluating new telemetry against the prior state
#[derive(Debug, Clone, PartialEq)]
pub struct RiskEvaluation {
    pub assessment: RiskAssessment,
    /// `None` when nothing changed materially
    pub event: Option<FireRiskEvent>,
}

/// Scores telemetry and decides the fire risk lifecycle
#[derive(Debug, Clone)]
pub struct FireRiskEngine {
    model: RiskModel,
}

impl FireRiskEngine {
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidRiskModel`] when the model is invalid.
    pub fn new(model: RiskModel) -> Result<Self> {
        model.validate()?;
        Ok(Self { model })
    }

    #[must_use]
    pub const fn model(&self) -> &RiskModel {
        &self.model
    }

    /// Event to emit given the previous record (if any) and a new assessment.
    ///
    /// Only an open (active or acknowledged) previous event counts as prior
    /// state; a cleared one is treated like no record at all.
    #[must_use]
    pub fn decide(
        &self,
        previous: Option<&FireEvent>,
        assessment: &RiskAssessment,
    ) -> Option<FireEventType> {
        match previous.filter(|p| p.status.is_open()) {
            None if assessment.level > RiskLevel::None => Some(FireEventType::Detected),
            None => None,
            Some(_) if assessment.level == RiskLevel::None => Some(FireEventType::Cleared),
            Some(prev) => {
                let level_changed = prev.risk_level != assessment.level;
                let score_moved =
                    (prev.risk_score - assessment.score).abs() >= self.model.material_delta;
                (level_changed || score_moved).then_some(FireEventType::Updated)
            }
        }
    }

    /// Score `inputs` for `location` and build the next fire event revision.
    ///
    /// An update that raises the level re-activates an acknowledged event.
    #[must_use]
    pub fn evaluate(
        &self,
        previous: Option<&FireEvent>,
        location: &MonitoredLocation,
        inputs: RiskInputs,
    ) -> RiskEvaluation {
        let assessment = self.model.assess(&inputs);
        let Some(event_type) = self.decide(previous, &assessment) else {
            return RiskEvaluation {
                assessment,
                event: None,
            };
        };

        let now = Utc::now();
        let fire_event = match (event_type, previous) {
            (FireEventType::Detected, _) | (_, None) => FireEvent {
                id: Uuid::new_v4(),
                location_id: location.id,
                location_name: location.name.clone(),
                location_kind: location.kind.clone(),
                event_type,
                risk_level: assessment.level,
                risk_score: assessment.score,
                fires: inputs.fires,
                fwi: inputs.fwi,
                score_factors: Some(assessment.factors),
                status: FireEventStatus::Active,
                created_at: now,
                updated_at: now,
            },
            (_, Some(prev)) => {
                let status = match event_type {
                    FireEventType::Cleared => FireEventStatus::Cleared,
                    _ if assessment.level > prev.risk_level => FireEventStatus::Active,
                    _ => prev.status,
                };
                FireEvent {
                    event_type,
                    risk_level: assessment.level,
                    risk_score: assessment.score,
                    fires: inputs.fires,
                    fwi: inputs.fwi,
                    score_factors: Some(assessment.factors),
                    status,
                    updated_at: now,
                    ..prev.clone()
                }
            }
        };

        RiskEvaluation {
            assessment,
            event: Some(FireRiskEvent {
                event_type,
                fire_event,
            }),
        }
    }
}

impl Default for FireRiskEngine {
    fn default() -> Self {
        Self {
            model: RiskModel::default(),
        }
    }
}
