//! Core value types for biometric-driven guided breathing
//!
//! # Clinical Background
//!
//! The system keys breathing guidance off two biometric indicators:
//!
//! - **RMSSD (Root Mean Square of Successive Differences)**: the most common
//!   heart-rate-variability metric, measured in milliseconds. Lower values
//!   indicate reduced parasympathetic tone. Resting RMSSD declines with age,
//!   so classification bands are age-group specific.
//!
//! - **Stress level**: a discrete 1..5 scale (1 = maximum relaxation,
//!   5 = very high stress), typically sourced from a wearable's stress score.
//!
//! From these the decision engine produces a [`BreathingPattern`]: a pair of
//! phase durations plus the clinical action it corresponds to. Patterns are
//! cheap, disposable value objects recomputed on every accepted reading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive domain for stress level inputs
pub const STRESS_MIN: u8 = 1;
/// Inclusive domain for stress level inputs
pub const STRESS_MAX: u8 = 5;

/// Accepted RMSSD input range in milliseconds
///
/// Wider than the typical 20-100ms physiological band so that severely
/// depressed readings still validate; values outside are treated as
/// measurement errors and rejected, never clamped.
pub const RMSSD_MIN_MS: f64 = 0.0;
/// Accepted RMSSD input range in milliseconds
pub const RMSSD_MAX_MS: f64 = 250.0;

/// Age groups with distinct HRV classification bands
///
/// Each group owns exactly one [`crate::thresholds::ThresholdTriple`] in the
/// threshold table. Resting HRV is highest in children and declines through
/// adulthood, so the cut-points differ per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgeGroup {
    Child,
    YoungAdult,
    OlderAdult,
}

impl AgeGroup {
    /// All registered age groups, in ascending age order
    pub const ALL: [AgeGroup; 3] = [AgeGroup::Child, AgeGroup::YoungAdult, AgeGroup::OlderAdult];

    /// Stable kebab-case key used in config files and CLI arguments
    pub fn key(&self) -> &'static str {
        match self {
            AgeGroup::Child => "child",
            AgeGroup::YoungAdult => "young-adult",
            AgeGroup::OlderAdult => "older-adult",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for AgeGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "child" => Ok(AgeGroup::Child),
            "young-adult" | "young_adult" | "youngadult" => Ok(AgeGroup::YoungAdult),
            "older-adult" | "older_adult" | "olderadult" => Ok(AgeGroup::OlderAdult),
            _ => Err(format!("Invalid age group: {}", s)),
        }
    }
}

/// HRV indicator category derived from an (age group, RMSSD) pair
///
/// Never stored independently of the reading it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorCategory {
    /// RMSSD below the critical bound: markedly reduced vagal tone
    Critical,
    /// RMSSD between the critical and tolerable bounds
    Tolerable,
    /// RMSSD at or above the tolerable bound
    Normal,
}

impl IndicatorCategory {
    /// Severity rank for ordering properties: critical(2) > tolerable(1) > normal(0)
    pub fn severity_rank(&self) -> u8 {
        match self {
            IndicatorCategory::Critical => 2,
            IndicatorCategory::Tolerable => 1,
            IndicatorCategory::Normal => 0,
        }
    }
}

impl fmt::Display for IndicatorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorCategory::Critical => write!(f, "Critical"),
            IndicatorCategory::Tolerable => write!(f, "Tolerable"),
            IndicatorCategory::Normal => write!(f, "Normal"),
        }
    }
}

/// Clinical action recommended alongside a breathing pattern
///
/// - `ActivateProtocol`: start a guided-breathing block (4-6s phases)
/// - `ContinueProtocol`: repeat the block, recovery is incomplete
/// - `WaitReevaluate`: re-check before intervening
/// - `Monitor`: no protocol, but increase check frequency
/// - `NoAction`: nothing to do this review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolAction {
    ActivateProtocol,
    ContinueProtocol,
    WaitReevaluate,
    Monitor,
    NoAction,
}

impl ProtocolAction {
    /// Whether this action starts or sustains a guided-breathing block
    pub fn is_protocol_active(&self) -> bool {
        matches!(
            self,
            ProtocolAction::ActivateProtocol | ProtocolAction::ContinueProtocol
        )
    }
}

impl fmt::Display for ProtocolAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolAction::ActivateProtocol => write!(f, "Activate protocol"),
            ProtocolAction::ContinueProtocol => write!(f, "Continue protocol"),
            ProtocolAction::WaitReevaluate => write!(f, "Wait and re-evaluate"),
            ProtocolAction::Monitor => write!(f, "Monitor"),
            ProtocolAction::NoAction => write!(f, "No action"),
        }
    }
}

/// A computed breathing pattern: phase durations plus the clinical decision
///
/// Invariant: when [`ProtocolAction::is_protocol_active`] holds, both
/// durations lie within the clinical 4.0-6.0s band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreathingPattern {
    /// Inhale phase duration in seconds
    pub inhale_secs: f64,

    /// Exhale phase duration in seconds
    pub exhale_secs: f64,

    /// Recommended clinical action
    pub action: ProtocolAction,

    /// Human-readable rationale for display by the presentation layer
    pub rationale: String,
}

impl BreathingPattern {
    /// Neutral 4.0/4.0 baseline pattern
    pub fn neutral() -> Self {
        BreathingPattern {
            inhale_secs: 4.0,
            exhale_secs: 4.0,
            action: ProtocolAction::NoAction,
            rationale: String::new(),
        }
    }

    /// Full breath cycle length in seconds
    pub fn cycle_secs(&self) -> f64 {
        self.inhale_secs + self.exhale_secs
    }
}

/// A validated biometric reading, immutable once accepted
///
/// Each accepted reading fully replaces the prior one; the core retains no
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricReading {
    /// Age group the thresholds were resolved against
    pub age_group: AgeGroup,

    /// Raw RMSSD indicator value in milliseconds
    pub rmssd_ms: f64,

    /// Discrete stress level, 1..=5
    pub stress: u8,

    /// When the reading was accepted
    pub accepted_at: DateTime<Utc>,
}

impl BiometricReading {
    /// Create a reading, validating both inputs against their domains
    ///
    /// Rejects (never clamps) out-of-range values so that a garbage sensor
    /// sample cannot silently move the breathing pattern.
    pub fn new(age_group: AgeGroup, rmssd_ms: f64, stress: u8) -> crate::error::Result<Self> {
        if !rmssd_ms.is_finite() || !(RMSSD_MIN_MS..=RMSSD_MAX_MS).contains(&rmssd_ms) {
            return Err(crate::error::BreathError::OutOfRangeBiometric {
                field: "rmssd".to_string(),
                value: rmssd_ms,
                min: RMSSD_MIN_MS,
                max: RMSSD_MAX_MS,
            });
        }
        if !(STRESS_MIN..=STRESS_MAX).contains(&stress) {
            return Err(crate::error::BreathError::OutOfRangeBiometric {
                field: "stress".to_string(),
                value: stress as f64,
                min: STRESS_MIN as f64,
                max: STRESS_MAX as f64,
            });
        }
        Ok(BiometricReading {
            age_group,
            rmssd_ms,
            stress,
            accepted_at: Utc::now(),
        })
    }
}

/// Externally observable state of the phase controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseState {
    /// No phase assigned yet (initial)
    Idle,
    /// Inhale segment in flight
    Inhaling,
    /// Exhale segment in flight
    Exhaling,
    /// Suspended mid-phase, phase identity retained
    Paused,
    /// Stopped; `start` re-enters at Inhaling
    Stopped,
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseState::Idle => write!(f, "Idle"),
            PhaseState::Inhaling => write!(f, "Inhaling"),
            PhaseState::Exhaling => write!(f, "Exhaling"),
            PhaseState::Paused => write!(f, "Paused"),
            PhaseState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// One half-cycle of guided breathing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreathPhase {
    Inhale,
    Exhale,
}

impl BreathPhase {
    /// The phase that follows this one
    pub fn opposite(&self) -> BreathPhase {
        match self {
            BreathPhase::Inhale => BreathPhase::Exhale,
            BreathPhase::Exhale => BreathPhase::Inhale,
        }
    }

    /// Segment name this phase resolves to in clip metadata
    pub fn segment_name(&self) -> &'static str {
        match self {
            BreathPhase::Inhale => "inhale",
            BreathPhase::Exhale => "exhale",
        }
    }
}

impl fmt::Display for BreathPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_group_parsing() {
        assert_eq!("child".parse::<AgeGroup>().unwrap(), AgeGroup::Child);
        assert_eq!(
            "young-adult".parse::<AgeGroup>().unwrap(),
            AgeGroup::YoungAdult
        );
        assert_eq!(
            "older_adult".parse::<AgeGroup>().unwrap(),
            AgeGroup::OlderAdult
        );
        assert!("infant".parse::<AgeGroup>().is_err());
    }

    #[test]
    fn test_severity_rank_ordering() {
        assert!(
            IndicatorCategory::Critical.severity_rank()
                > IndicatorCategory::Tolerable.severity_rank()
        );
        assert!(
            IndicatorCategory::Tolerable.severity_rank()
                > IndicatorCategory::Normal.severity_rank()
        );
    }

    #[test]
    fn test_reading_rejects_out_of_range_stress() {
        let result = BiometricReading::new(AgeGroup::YoungAdult, 45.0, 6);
        assert!(matches!(
            result,
            Err(crate::error::BreathError::OutOfRangeBiometric { .. })
        ));
    }

    #[test]
    fn test_reading_rejects_non_finite_rmssd() {
        assert!(BiometricReading::new(AgeGroup::Child, f64::NAN, 3).is_err());
        assert!(BiometricReading::new(AgeGroup::Child, f64::INFINITY, 3).is_err());
        assert!(BiometricReading::new(AgeGroup::Child, -1.0, 3).is_err());
        assert!(BiometricReading::new(AgeGroup::Child, 251.0, 3).is_err());
    }

    #[test]
    fn test_reading_accepts_boundary_values() {
        assert!(BiometricReading::new(AgeGroup::OlderAdult, 0.0, 1).is_ok());
        assert!(BiometricReading::new(AgeGroup::OlderAdult, 250.0, 5).is_ok());
    }

    #[test]
    fn test_phase_opposite() {
        assert_eq!(BreathPhase::Inhale.opposite(), BreathPhase::Exhale);
        assert_eq!(BreathPhase::Exhale.opposite(), BreathPhase::Inhale);
    }

    #[test]
    fn test_protocol_active_flag() {
        assert!(ProtocolAction::ActivateProtocol.is_protocol_active());
        assert!(ProtocolAction::ContinueProtocol.is_protocol_active());
        assert!(!ProtocolAction::Monitor.is_protocol_active());
        assert!(!ProtocolAction::WaitReevaluate.is_protocol_active());
        assert!(!ProtocolAction::NoAction.is_protocol_active());
    }
}
