//! Biometric-to-breathing-pattern decision engine
//!
//! # Clinical Background
//!
//! The engine maps an HRV indicator category plus a discrete stress level to
//! a breathing pattern: inhale/exhale durations, a protocol action, and a
//! rationale string for display. Two strategies exist because deployments
//! differ in which indicators the host can read:
//!
//! - **Table**: the canonical 3x5 decision surface of clinically authored
//!   cells. Activation cells prescribe lengthened exhales (exhale-biased
//!   breathing drives parasympathetic activation) and every activating cell
//!   keeps both phases inside the clinical 4.0-6.0s band.
//!
//! - **Additive**: a continuous variant over four discrete indicator levels
//!   (heart rate, inter-beat interval, HRV, stress). Starts from a 4.0/4.0
//!   baseline, applies a fixed delta per indicator level, clamps, and rounds
//!   to one decimal. The action and rationale still come from the canonical
//!   cell so both strategies share one output contract.
//!
//! The table strategy is the deterministic default. The additive strategy is
//! deterministic too: identical inputs always produce identical durations.
//! Hosts that want slight session-to-session variation can enable an
//! explicitly seeded exhale jitter, which stays reproducible for a given
//! seed.
//!
//! Out-of-domain inputs are rejected with no computation performed; the
//! clamps above apply only to *computed* durations, never to inputs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{BreathError, Result};
use crate::models::{
    BreathingPattern, IndicatorCategory, ProtocolAction, STRESS_MAX, STRESS_MIN,
};

/// Clinical ceiling for activated-protocol phase durations, seconds
pub const ACTIVATION_MIN_SECS: f64 = 4.0;
/// Clinical ceiling for activated-protocol phase durations, seconds
pub const ACTIVATION_MAX_SECS: f64 = 6.0;

/// Additive-variant clamp ranges, seconds
pub const ADDITIVE_INHALE_RANGE: (f64, f64) = (1.5, 8.0);
/// Additive-variant clamp ranges, seconds
pub const ADDITIVE_EXHALE_RANGE: (f64, f64) = (1.5, 10.0);

/// Domain of the discrete 1..=3 indicator levels in the additive variant
pub const LEVEL_MIN: u8 = 1;
/// Domain of the discrete 1..=3 indicator levels in the additive variant
pub const LEVEL_MAX: u8 = 3;

/// Strategy selecting how durations are derived
///
/// One engine serves every deployment; the strategy is a tagged variant
/// selected at construction rather than a separate engine type per
/// indicator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternStrategy {
    /// Canonical 3x5 decision table (deterministic default)
    Table,
    /// Additive per-indicator adjustment from a 4.0/4.0 baseline
    Additive,
}

impl Default for PatternStrategy {
    fn default() -> Self {
        PatternStrategy::Table
    }
}

/// Raw indicator levels consumed by the additive strategy
///
/// Heart rate, inter-beat interval, and HRV are coarse 1..=3 levels
/// (1 = low, 2 = normal, 3 = high); stress keeps its 1..=5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditiveInputs {
    /// Heart rate level, 1..=3
    pub heart_rate_level: u8,
    /// Inter-beat-interval level, 1..=3
    pub ibi_level: u8,
    /// HRV level, 1..=3
    pub hrv_level: u8,
    /// Stress level, 1..=5
    pub stress: u8,
}

impl AdditiveInputs {
    /// Derive additive inputs from a classified reading
    ///
    /// HRV level follows the category (Critical=1, Tolerable=2, Normal=3);
    /// heart rate and inter-beat interval default to their neutral level
    /// when the host supplies only the HRV indicator.
    pub fn from_category(category: IndicatorCategory, stress: u8) -> Self {
        let hrv_level = match category {
            IndicatorCategory::Critical => 1,
            IndicatorCategory::Tolerable => 2,
            IndicatorCategory::Normal => 3,
        };
        AdditiveInputs {
            heart_rate_level: 2,
            ibi_level: 2,
            hrv_level,
            stress,
        }
    }

    fn validate(&self) -> Result<()> {
        let levels = [
            ("heart_rate_level", self.heart_rate_level),
            ("ibi_level", self.ibi_level),
            ("hrv_level", self.hrv_level),
        ];
        for (field, value) in levels {
            if !(LEVEL_MIN..=LEVEL_MAX).contains(&value) {
                return Err(BreathError::OutOfRangeBiometric {
                    field: field.to_string(),
                    value: value as f64,
                    min: LEVEL_MIN as f64,
                    max: LEVEL_MAX as f64,
                });
            }
        }
        validate_stress(self.stress)
    }
}

fn validate_stress(stress: u8) -> Result<()> {
    if !(STRESS_MIN..=STRESS_MAX).contains(&stress) {
        return Err(BreathError::OutOfRangeBiometric {
            field: "stress".to_string(),
            value: stress as f64,
            min: STRESS_MIN as f64,
            max: STRESS_MAX as f64,
        });
    }
    Ok(())
}

/// Round to one decimal, half away from zero at the tenths digit
fn round_tenths(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn clamp(v: f64, range: (f64, f64)) -> f64 {
    v.max(range.0).min(range.1)
}

/// The biometric-to-pattern decision engine
///
/// Pure over its inputs. The full table surface is precomputed at
/// construction; the surface is finite (15 cells) and patterns are cheap
/// value objects, so this is a lookup optimization, not a cache with
/// invalidation concerns.
#[derive(Debug, Clone)]
pub struct PatternEngine {
    strategy: PatternStrategy,
    surface: HashMap<(IndicatorCategory, u8), BreathingPattern>,
    jitter_seed: Option<u64>,
}

impl PatternEngine {
    /// Canonical table-driven engine (the deterministic default)
    pub fn table() -> Self {
        Self::with_strategy(PatternStrategy::Table)
    }

    /// Additive-adjustment engine, deterministic
    pub fn additive() -> Self {
        Self::with_strategy(PatternStrategy::Additive)
    }

    /// Build an engine with an explicit strategy
    pub fn with_strategy(strategy: PatternStrategy) -> Self {
        let mut surface = HashMap::with_capacity(15);
        for category in [
            IndicatorCategory::Critical,
            IndicatorCategory::Tolerable,
            IndicatorCategory::Normal,
        ] {
            for stress in STRESS_MIN..=STRESS_MAX {
                surface.insert((category, stress), canonical_cell(category, stress));
            }
        }
        PatternEngine {
            strategy,
            surface,
            jitter_seed: None,
        }
    }

    /// Enable the documented exhale jitter on the additive strategy
    ///
    /// Identical inputs and an identical seed always produce identical
    /// durations. Has no effect on the table strategy.
    pub fn with_jitter(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    /// Strategy this engine was constructed with
    pub fn strategy(&self) -> PatternStrategy {
        self.strategy
    }

    /// Map a classified reading to a breathing pattern
    ///
    /// Rejects out-of-domain stress with [`BreathError::OutOfRangeBiometric`]
    /// before any computation, so a failed call leaves the caller's current
    /// pattern unchanged.
    pub fn compute_pattern(
        &self,
        category: IndicatorCategory,
        stress: u8,
    ) -> Result<BreathingPattern> {
        validate_stress(stress)?;
        match self.strategy {
            PatternStrategy::Table => Ok(self
                .surface
                .get(&(category, stress))
                .cloned()
                .unwrap_or_else(BreathingPattern::neutral)),
            PatternStrategy::Additive => {
                self.compute_additive(AdditiveInputs::from_category(category, stress))
            }
        }
    }

    /// Additive variant over all four raw indicator levels
    ///
    /// Durations start from the 4.0/4.0 baseline and shift by a fixed delta
    /// per indicator level, favouring exhale extension as the downregulating
    /// lever. The action and rationale come from the canonical cell for the
    /// equivalent (category, stress) pair so both strategies expose one
    /// output contract; when that cell activates the protocol, the durations
    /// are clamped into the clinical 4.0-6.0s band, otherwise into the wide
    /// additive ranges.
    pub fn compute_additive(&self, inputs: AdditiveInputs) -> Result<BreathingPattern> {
        inputs.validate()?;

        let mut inhale = 4.0;
        let mut exhale = 4.0;

        // HRV is the dominant indicator: depressed HRV lengthens the exhale.
        let (hrv_in, mut hrv_ex) = match inputs.hrv_level {
            1 => (0.5, 1.5),
            2 => (0.0, 0.5),
            _ => (0.0, 0.0),
        };
        if let Some(seed) = self.jitter_seed {
            let mut rng = StdRng::seed_from_u64(seed);
            hrv_ex *= rng.gen_range(0.9..=1.1);
        }
        inhale += hrv_in;
        exhale += hrv_ex;

        // Elevated heart rate shortens the inhale and extends the exhale;
        // a short inter-beat interval reads the same direction.
        match inputs.heart_rate_level {
            3 => {
                inhale -= 0.5;
                exhale += 1.0;
            }
            1 => inhale += 0.5,
            _ => {}
        }
        match inputs.ibi_level {
            1 => exhale += 0.5,
            3 => inhale += 0.5,
            _ => {}
        }

        // Stress shifts both phases around its neutral midpoint of 3.
        let stress_offset = inputs.stress as f64 - 3.0;
        exhale += stress_offset * 0.5;
        inhale -= stress_offset * 0.25;

        let category = match inputs.hrv_level {
            1 => IndicatorCategory::Critical,
            2 => IndicatorCategory::Tolerable,
            _ => IndicatorCategory::Normal,
        };
        let cell = canonical_cell(category, inputs.stress);

        let (inhale, exhale) = if cell.action.is_protocol_active() {
            (
                clamp(inhale, (ACTIVATION_MIN_SECS, ACTIVATION_MAX_SECS)),
                clamp(exhale, (ACTIVATION_MIN_SECS, ACTIVATION_MAX_SECS)),
            )
        } else {
            (
                clamp(inhale, ADDITIVE_INHALE_RANGE),
                clamp(exhale, ADDITIVE_EXHALE_RANGE),
            )
        };

        Ok(BreathingPattern {
            inhale_secs: round_tenths(inhale),
            exhale_secs: round_tenths(exhale),
            action: cell.action,
            rationale: cell.rationale,
        })
    }

    /// The full precomputed 15-cell decision surface, for display/debugging
    pub fn decision_surface(&self) -> &HashMap<(IndicatorCategory, u8), BreathingPattern> {
        &self.surface
    }
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::table()
    }
}

/// One clinically authored cell of the canonical decision surface
///
/// Reproduced cell-for-cell from the clinical protocol; activating cells are
/// clamped into the 4.0-6.0s band as a final guard even though every literal
/// already lies inside it.
fn canonical_cell(category: IndicatorCategory, stress: u8) -> BreathingPattern {
    use IndicatorCategory::*;
    use ProtocolAction::*;

    let (inhale, exhale, action, rationale) = match (stress, category) {
        // Very high stress
        (5, Critical) => (
            4.0,
            6.0,
            ActivateProtocol,
            "Very high stress with critical HRV: sympathetic crisis, start 3-minute breathing protocol",
        ),
        (5, Tolerable) => (
            4.5,
            5.5,
            ActivateProtocol,
            "Very high stress with tolerable HRV: activate protocol to prevent collapse",
        ),
        (5, Normal) => (
            4.0,
            4.0,
            WaitReevaluate,
            "Very high stress with normal HRV: resilient profile, re-evaluate in 3 minutes",
        ),

        // High stress
        (4, Critical) => (
            4.0,
            6.0,
            ActivateProtocol,
            "High stress with critical HRV: vagal dysfunction, start 3-minute breathing protocol",
        ),
        (4, Tolerable) => (
            4.5,
            5.0,
            ActivateProtocol,
            "High stress with tolerable HRV: activate protocol to protect remaining reserve",
        ),
        (4, Normal) => (
            4.0,
            4.0,
            Monitor,
            "High stress with normal HRV: coping capacity present, increase check frequency",
        ),

        // Neutral stress
        (3, Critical) => (
            4.5,
            5.5,
            ActivateProtocol,
            "Neutral stress with critical HRV: autonomic dysfunction, start breathing protocol",
        ),
        (3, Tolerable) => (
            4.0,
            4.0,
            WaitReevaluate,
            "Neutral stress with tolerable HRV: re-evaluate in 3 minutes before intervening",
        ),
        (3, Normal) => (
            4.0,
            4.0,
            NoAction,
            "Neutral stress with normal HRV: balanced state, nothing to do",
        ),

        // Low stress
        (2, Critical) => (
            4.5,
            5.0,
            ContinueProtocol,
            "Low stress with critical HRV: recovery incomplete, repeat breathing block",
        ),
        (2, Tolerable) => (
            4.0,
            4.0,
            Monitor,
            "Low stress with tolerable HRV: watch recovery, increase check frequency",
        ),
        (2, Normal) => (
            4.0,
            4.0,
            NoAction,
            "Low stress with normal HRV: optimal homeostasis, nothing to do",
        ),

        // Maximum relaxation
        (_, Critical) => (
            4.0,
            4.0,
            Monitor,
            "Maximum relaxation with critical HRV: possible measurement artifacts, monitor",
        ),
        (_, _) => (
            4.0,
            4.0,
            NoAction,
            "Maximum relaxation with good HRV: healthy profile, nothing to do",
        ),
    };

    let (inhale, exhale) = if action.is_protocol_active() {
        (
            clamp(inhale, (ACTIVATION_MIN_SECS, ACTIVATION_MAX_SECS)),
            clamp(exhale, (ACTIVATION_MIN_SECS, ACTIVATION_MAX_SECS)),
        )
    } else {
        (inhale, exhale)
    };

    BreathingPattern {
        inhale_secs: round_tenths(inhale),
        exhale_secs: round_tenths(exhale),
        action,
        rationale: rationale.to_string(),
    }
}
