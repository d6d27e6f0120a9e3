//! Biometric session: validation, decision pipeline, and playback wiring
//!
//! The session is the sole boundary with the presentation layer. A host
//! constructs one explicitly and holds the reference; there is no global
//! singleton. `update` runs the full pipeline:
//!
//! ```text
//! update(reading) -> classify -> compute pattern -> duration slots
//! ```
//!
//! with strong exception safety: every input is validated before anything
//! mutates, so a rejected reading leaves the prior reading, the active
//! pattern, and the controller's duration slots untouched. Accepted readings
//! replace the previous one wholesale; the core keeps no history.
//!
//! Duration pushes never interrupt a phase in flight: the controller applies
//! them at the next phase boundary.

use tracing::{info, warn};

use crate::adapter::{AnimationAdapter, ClipMetadata};
use crate::controller::PhaseController;
use crate::error::Result;
use crate::models::{AgeGroup, BiometricReading, BreathingPattern};
use crate::pattern::PatternEngine;
use crate::thresholds::ThresholdTable;

/// Process-wide record of the last accepted biometric reading plus the
/// machinery that turns readings into playback durations
#[derive(Debug)]
pub struct BiometricSession {
    thresholds: ThresholdTable,
    engine: PatternEngine,
    controller: PhaseController,
    reading: Option<BiometricReading>,
    active_pattern: Option<BreathingPattern>,
}

impl BiometricSession {
    /// Assemble a session from its parts
    pub fn new(
        thresholds: ThresholdTable,
        engine: PatternEngine,
        controller: PhaseController,
    ) -> Self {
        BiometricSession {
            thresholds,
            engine,
            controller,
            reading: None,
            active_pattern: None,
        }
    }

    /// Session with clinical default thresholds, the canonical table engine,
    /// and neutral 4.0/4.0 starting durations
    pub fn with_defaults() -> Self {
        Self::new(
            ThresholdTable::clinical_default(),
            PatternEngine::table(),
            PhaseController::new(4.0, 4.0),
        )
    }

    /// Accept a biometric reading and reconfigure breathing durations
    ///
    /// Validates the age group and both input domains first; on any failure
    /// the error is returned and no state changes (the caller's current
    /// pattern stays active). On success the computed pattern is returned so
    /// the presentation layer can render the action and rationale.
    pub fn update(
        &mut self,
        age_group: AgeGroup,
        rmssd_ms: f64,
        stress: u8,
    ) -> Result<BreathingPattern> {
        // Validation phase: nothing below may mutate until all of it passes.
        let reading = BiometricReading::new(age_group, rmssd_ms, stress).map_err(|e| {
            warn!(%age_group, rmssd_ms, stress, error = %e, "Biometric reading rejected");
            e
        })?;
        let category = self.thresholds.classify(age_group, rmssd_ms)?;
        let pattern = self.engine.compute_pattern(category, stress)?;

        // Commit phase.
        self.controller.set_inhale_duration(pattern.inhale_secs);
        self.controller.set_exhale_duration(pattern.exhale_secs);
        info!(
            %age_group,
            rmssd_ms,
            stress,
            %category,
            action = %pattern.action,
            inhale_secs = pattern.inhale_secs,
            exhale_secs = pattern.exhale_secs,
            "Breathing pattern applied"
        );
        self.reading = Some(reading);
        self.active_pattern = Some(pattern.clone());
        Ok(pattern)
    }

    /// Write both duration slots directly, bypassing the decision engine
    ///
    /// Preset values are the caller's responsibility; the engine's clamps do
    /// not apply here.
    pub fn set_preset(&mut self, inhale_secs: f64, exhale_secs: f64) {
        self.controller.set_inhale_duration(inhale_secs);
        self.controller.set_exhale_duration(exhale_secs);
        self.active_pattern = None;
    }

    /// Currently active pattern, for display by the presentation layer
    pub fn active_pattern(&self) -> Option<&BreathingPattern> {
        self.active_pattern.as_ref()
    }

    /// Last accepted reading
    pub fn last_reading(&self) -> Option<&BiometricReading> {
        self.reading.as_ref()
    }

    /// Threshold table in effect
    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    /// Decision engine in effect
    pub fn engine(&self) -> &PatternEngine {
        &self.engine
    }

    /// Attach validated clip metadata to the controller
    pub fn attach_clip(&mut self, clip: ClipMetadata) {
        self.controller.attach_clip(clip);
    }

    /// Attach the animation adapter
    pub fn attach_adapter(&mut self, adapter: Box<dyn AnimationAdapter>) {
        self.controller.attach_adapter(adapter);
    }

    /// Start the breathing cycle at the inhale phase
    pub fn start(&mut self) {
        self.controller.start();
    }

    /// Stop the breathing cycle
    pub fn stop(&mut self) {
        self.controller.stop();
    }

    /// Suspend playback mid-phase
    pub fn pause(&mut self) {
        self.controller.pause();
    }

    /// Continue a suspended phase
    pub fn resume(&mut self) {
        self.controller.resume();
    }

    /// Completion event forwarded from the animation adapter
    pub fn on_phase_complete(&mut self) {
        self.controller.on_phase_complete();
    }

    /// The underlying phase controller
    pub fn controller(&self) -> &PhaseController {
        &self.controller
    }

    /// Mutable access for hosts that wire the adapter callback directly
    pub fn controller_mut(&mut self) -> &mut PhaseController {
        &mut self.controller
    }
}

impl Default for BiometricSession {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BreathError;
    use crate::models::ProtocolAction;

    #[test]
    fn test_update_pushes_durations() {
        let mut session = BiometricSession::with_defaults();
        let pattern = session.update(AgeGroup::YoungAdult, 25.0, 5).unwrap();
        assert_eq!(pattern.inhale_secs, 4.0);
        assert_eq!(pattern.exhale_secs, 6.0);
        assert_eq!(pattern.action, ProtocolAction::ActivateProtocol);
        assert_eq!(session.controller().durations(), (4.0, 6.0));
        assert!(session.last_reading().is_some());
    }

    #[test]
    fn test_rejected_update_leaves_state_untouched() {
        let mut session = BiometricSession::with_defaults();
        session.update(AgeGroup::YoungAdult, 25.0, 5).unwrap();

        let err = session.update(AgeGroup::YoungAdult, 25.0, 6).unwrap_err();
        assert!(matches!(err, BreathError::OutOfRangeBiometric { .. }));
        assert_eq!(session.controller().durations(), (4.0, 6.0));
        assert_eq!(session.last_reading().unwrap().stress, 5);
        assert_eq!(
            session.active_pattern().unwrap().action,
            ProtocolAction::ActivateProtocol
        );
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut session = BiometricSession::with_defaults();
        let first = session.update(AgeGroup::OlderAdult, 18.0, 4).unwrap();
        let second = session.update(AgeGroup::OlderAdult, 18.0, 4).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            session.controller().durations(),
            (first.inhale_secs, first.exhale_secs)
        );
    }

    #[test]
    fn test_preset_bypasses_engine() {
        let mut session = BiometricSession::with_defaults();
        session.update(AgeGroup::Child, 70.0, 1).unwrap();
        session.set_preset(5.0, 7.0);
        assert_eq!(session.controller().durations(), (5.0, 7.0));
        assert!(session.active_pattern().is_none());
    }
}
