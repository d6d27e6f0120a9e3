//! Age-group HRV threshold tables and indicator classification
//!
//! # Clinical Background
//!
//! RMSSD has no single clinical cut-point: resting values are highest in
//! children and decline with age, so the same 28ms reading is alarming in a
//! child and unremarkable in an older adult. The table therefore keys a
//! {critical, tolerable} bound pair per age group:
//!
//! - Below `critical_bound` ⇒ Critical (markedly reduced vagal tone)
//! - Below `tolerable_bound` ⇒ Tolerable
//! - Otherwise ⇒ Normal
//!
//! Values exactly equal to a bound classify into the *less severe* category.
//! This boundary rule decides protocol activation at the margins and must be
//! preserved exactly.
//!
//! The table is static configuration: built once at startup (optionally from
//! config overrides) and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{BreathError, Result};
use crate::models::{AgeGroup, IndicatorCategory};

/// Cut-point pair separating the RMSSD indicator into three categories
///
/// Both bounds are in the indicator's native unit (milliseconds).
/// Invariant: `critical_bound < tolerable_bound`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTriple {
    /// Readings strictly below this are Critical
    pub critical_bound: f64,

    /// Readings strictly below this (and at or above critical) are Tolerable
    pub tolerable_bound: f64,
}

impl ThresholdTriple {
    /// Create a bound pair, enforcing the ordering invariant
    pub fn new(critical_bound: f64, tolerable_bound: f64) -> Result<Self> {
        if !critical_bound.is_finite() || !tolerable_bound.is_finite() {
            return Err(BreathError::Configuration(format!(
                "Threshold bounds must be finite, got {}/{}",
                critical_bound, tolerable_bound
            )));
        }
        if critical_bound >= tolerable_bound {
            return Err(BreathError::Configuration(format!(
                "critical_bound {} must be below tolerable_bound {}",
                critical_bound, tolerable_bound
            )));
        }
        Ok(ThresholdTriple {
            critical_bound,
            tolerable_bound,
        })
    }

    /// Classify a raw indicator value against these bounds
    ///
    /// Equality falls into the higher (less severe) category.
    pub fn classify(&self, raw_value: f64) -> IndicatorCategory {
        if raw_value < self.critical_bound {
            IndicatorCategory::Critical
        } else if raw_value < self.tolerable_bound {
            IndicatorCategory::Tolerable
        } else {
            IndicatorCategory::Normal
        }
    }
}

/// Per-age-group threshold registry
///
/// Lookup fails with [`BreathError::UnknownAgeGroup`] for groups that were
/// never registered rather than silently falling back to a default band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    bounds: HashMap<AgeGroup, ThresholdTriple>,
}

impl ThresholdTable {
    /// Build a table from explicit per-group bounds
    pub fn new(bounds: HashMap<AgeGroup, ThresholdTriple>) -> Self {
        ThresholdTable { bounds }
    }

    /// Clinical default bands
    ///
    /// YoungAdult carries the canonical adult bands (<30ms critical,
    /// 30-50ms tolerable, >50ms normal); Child and OlderAdult shift the
    /// pair up/down to follow resting HRV across age.
    pub fn clinical_default() -> Self {
        let mut bounds = HashMap::new();
        bounds.insert(
            AgeGroup::Child,
            ThresholdTriple {
                critical_bound: 40.0,
                tolerable_bound: 60.0,
            },
        );
        bounds.insert(
            AgeGroup::YoungAdult,
            ThresholdTriple {
                critical_bound: 30.0,
                tolerable_bound: 50.0,
            },
        );
        bounds.insert(
            AgeGroup::OlderAdult,
            ThresholdTriple {
                critical_bound: 20.0,
                tolerable_bound: 35.0,
            },
        );
        ThresholdTable { bounds }
    }

    /// Look up the bound pair for an age group
    pub fn bounds_for(&self, age_group: AgeGroup) -> Result<ThresholdTriple> {
        self.bounds
            .get(&age_group)
            .copied()
            .ok_or_else(|| BreathError::UnknownAgeGroup {
                group: age_group.to_string(),
            })
    }

    /// Replace the bounds for one age group (startup configuration only)
    pub fn register(&mut self, age_group: AgeGroup, triple: ThresholdTriple) {
        self.bounds.insert(age_group, triple);
    }

    /// Classify a raw RMSSD value for an age group
    ///
    /// Pure and total over the registered age-group set; no side effects.
    pub fn classify(&self, age_group: AgeGroup, raw_value: f64) -> Result<IndicatorCategory> {
        Ok(self.bounds_for(age_group)?.classify(raw_value))
    }

    /// Registered age groups
    pub fn age_groups(&self) -> impl Iterator<Item = AgeGroup> + '_ {
        self.bounds.keys().copied()
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::clinical_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triple_invariant_enforced() {
        assert!(ThresholdTriple::new(30.0, 50.0).is_ok());
        assert!(ThresholdTriple::new(50.0, 30.0).is_err());
        assert!(ThresholdTriple::new(30.0, 30.0).is_err());
        assert!(ThresholdTriple::new(f64::NAN, 30.0).is_err());
    }

    #[test]
    fn test_young_adult_bands() {
        let table = ThresholdTable::clinical_default();
        assert_eq!(
            table.classify(AgeGroup::YoungAdult, 25.0).unwrap(),
            IndicatorCategory::Critical
        );
        assert_eq!(
            table.classify(AgeGroup::YoungAdult, 40.0).unwrap(),
            IndicatorCategory::Tolerable
        );
        assert_eq!(
            table.classify(AgeGroup::YoungAdult, 60.0).unwrap(),
            IndicatorCategory::Normal
        );
    }

    #[test]
    fn test_boundary_values_fall_into_less_severe_category() {
        let table = ThresholdTable::clinical_default();
        for group in AgeGroup::ALL {
            let bounds = table.bounds_for(group).unwrap();
            assert_eq!(
                table.classify(group, bounds.critical_bound).unwrap(),
                IndicatorCategory::Tolerable,
                "critical bound of {} should classify Tolerable",
                group
            );
            assert_eq!(
                table.classify(group, bounds.tolerable_bound).unwrap(),
                IndicatorCategory::Normal,
                "tolerable bound of {} should classify Normal",
                group
            );
        }
    }

    #[test]
    fn test_unknown_age_group() {
        let table = ThresholdTable::new(HashMap::new());
        assert!(matches!(
            table.classify(AgeGroup::Child, 45.0),
            Err(BreathError::UnknownAgeGroup { .. })
        ));
    }

    #[test]
    fn test_all_default_groups_registered() {
        let table = ThresholdTable::clinical_default();
        for group in AgeGroup::ALL {
            assert!(table.bounds_for(group).is_ok());
        }
    }
}
