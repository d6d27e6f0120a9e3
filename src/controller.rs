//! Phase-cycling state machine for the breathing animation
//!
//! The controller owns the current phase, the running flag, and the duration
//! slots the biometric pipeline writes into. It never polls: the external
//! animation adapter raises a single completion event when a played segment
//! finishes, and the controller flips phase and issues the next play command
//! from whatever durations the slots hold *at that boundary*. A duration
//! update landing mid-phase therefore takes effect only at the next phase
//! transition; a phase's speed is fixed for its entire playback.
//!
//! Playback speed stretches a fixed-length clip segment to the clinically
//! computed duration:
//!
//! ```text
//! speed = segment_frame_count / (duration_seconds * frame_rate)
//! ```
//!
//! The core is single-threaded and event-driven. Each external event (a
//! completion, a control call, a biometric update) is handled to completion
//! before the next, so no two logical transitions interleave. A
//! multi-threaded host must serialize access behind a single mutex.

use tracing::{debug, trace, warn};

use crate::adapter::{AnimationAdapter, ClipMetadata};
use crate::error::{BreathError, Result};
use crate::models::{BreathPhase, PhaseState};

/// State machine driving inhale/exhale playback
pub struct PhaseController {
    clip: Option<ClipMetadata>,
    adapter: Option<Box<dyn AnimationAdapter>>,
    phase: BreathPhase,
    running: bool,
    paused: bool,
    started: bool,
    inhale_secs: f64,
    exhale_secs: f64,
}

impl std::fmt::Debug for PhaseController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseController")
            .field("state", &self.state())
            .field("inhale_secs", &self.inhale_secs)
            .field("exhale_secs", &self.exhale_secs)
            .field("has_clip", &self.clip.is_some())
            .field("has_adapter", &self.adapter.is_some())
            .finish()
    }
}

impl PhaseController {
    /// Create an idle controller holding the given default durations
    pub fn new(inhale_secs: f64, exhale_secs: f64) -> Self {
        PhaseController {
            clip: None,
            adapter: None,
            phase: BreathPhase::Inhale,
            running: false,
            paused: false,
            started: false,
            inhale_secs,
            exhale_secs,
        }
    }

    /// Attach validated clip metadata
    ///
    /// The metadata constructor already guaranteed both breathing segments
    /// resolve, so attachment itself cannot fail.
    pub fn attach_clip(&mut self, clip: ClipMetadata) {
        debug!(frame_rate = clip.frame_rate(), "Clip metadata attached");
        self.clip = Some(clip);
    }

    /// Attach the animation adapter play commands are issued through
    ///
    /// The controller degrades gracefully without one: phase transitions
    /// still update internal state so a later attachment picks up from the
    /// correct phase, but no commands are emitted until then.
    pub fn attach_adapter(&mut self, adapter: Box<dyn AnimationAdapter>) {
        debug!("Animation adapter attached");
        self.adapter = Some(adapter);
    }

    /// Externally observable state
    pub fn state(&self) -> PhaseState {
        if !self.started {
            PhaseState::Idle
        } else if !self.running {
            PhaseState::Stopped
        } else if self.paused {
            PhaseState::Paused
        } else {
            match self.phase {
                BreathPhase::Inhale => PhaseState::Inhaling,
                BreathPhase::Exhale => PhaseState::Exhaling,
            }
        }
    }

    /// Phase currently in flight (or last in flight when stopped)
    pub fn phase(&self) -> BreathPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Currently held (inhale, exhale) duration slots in seconds
    pub fn durations(&self) -> (f64, f64) {
        (self.inhale_secs, self.exhale_secs)
    }

    /// Start (or restart) the cycle at the inhale phase
    ///
    /// Calling start while already running restarts at Inhaling.
    pub fn start(&mut self) {
        self.running = true;
        self.paused = false;
        self.started = true;
        self.phase = BreathPhase::Inhale;
        debug!(inhale_secs = self.inhale_secs, "Breathing cycle started");
        self.issue_play();
    }

    /// Stop the cycle
    ///
    /// Subsequent stray completion events become no-ops; `start` is the only
    /// way back to a running cycle.
    pub fn stop(&mut self) {
        self.running = false;
        self.paused = false;
        debug!("Breathing cycle stopped");
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.stop_playback();
        }
    }

    /// Suspend playback mid-phase without altering phase or running flag
    ///
    /// A no-op while not running.
    pub fn pause(&mut self) {
        if !self.running {
            trace!("Pause ignored while not running");
            return;
        }
        self.paused = true;
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.pause_playback();
        }
    }

    /// Continue a suspended phase
    pub fn resume(&mut self) {
        if !self.running || !self.paused {
            trace!("Resume ignored");
            return;
        }
        self.paused = false;
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.resume_playback();
        }
    }

    /// Completion event raised by the animation adapter
    ///
    /// Flips phase and issues the next play command from the *currently
    /// held* duration slot for the new phase. Ignored when not running, so a
    /// late callback cannot revive a stopped session.
    pub fn on_phase_complete(&mut self) {
        if !self.running {
            trace!("Stray completion event ignored while stopped");
            return;
        }
        self.phase = self.phase.opposite();
        trace!(phase = %self.phase, "Phase boundary");
        self.issue_play();
    }

    /// Update the held inhale duration slot
    ///
    /// Takes effect at the next transition into the inhale phase; the
    /// in-flight segment keeps its committed speed. No bounds validation
    /// here, that is the pattern engine's and caller's responsibility.
    pub fn set_inhale_duration(&mut self, seconds: f64) {
        self.inhale_secs = seconds;
    }

    /// Update the held exhale duration slot (see [`Self::set_inhale_duration`])
    pub fn set_exhale_duration(&mut self, seconds: f64) {
        self.exhale_secs = seconds;
    }

    /// Duration slot currently held for a phase, seconds
    pub fn phase_duration(&self, phase: BreathPhase) -> f64 {
        match phase {
            BreathPhase::Inhale => self.inhale_secs,
            BreathPhase::Exhale => self.exhale_secs,
        }
    }

    /// Speed multiplier that stretches a phase's clip segment to its held
    /// duration, or None without clip metadata
    pub fn playback_speed(&self, phase: BreathPhase) -> Option<f64> {
        let clip = self.clip.as_ref()?;
        let segment = clip.phase_segment(phase);
        let duration = self.phase_duration(phase);
        if duration <= 0.0 {
            return None;
        }
        Some(segment.frame_count() as f64 / (duration * clip.frame_rate()))
    }

    /// Issue (or re-issue) the play command for the current phase
    ///
    /// Fails with [`BreathError::AdapterUnavailable`] when no adapter is
    /// attached; internal state is unaffected either way. Hosts that attach
    /// an adapter after the cycle started can call this to kick playback
    /// from the correct phase.
    pub fn replay_current_phase(&mut self) -> Result<()> {
        let Some(clip) = self.clip.as_ref() else {
            return Err(BreathError::Configuration(
                "no clip metadata attached".to_string(),
            ));
        };
        let segment = clip.phase_segment(self.phase);
        let duration = self.phase_duration(self.phase);
        if duration <= 0.0 {
            warn!(
                phase = %self.phase,
                duration, "Non-positive duration; play command suppressed"
            );
            return Err(BreathError::Configuration(format!(
                "non-positive duration {} for {} phase",
                duration, self.phase
            )));
        }
        let speed = segment.frame_count() as f64 / (duration * clip.frame_rate());
        let adapter = self
            .adapter
            .as_mut()
            .ok_or(BreathError::AdapterUnavailable)?;
        trace!(phase = %self.phase, speed, "Play command issued");
        adapter.play(segment, speed);
        Ok(())
    }

    /// Issue a play command for the current phase, degrading gracefully
    ///
    /// Without a clip or adapter the internal state has already advanced;
    /// only the outward command is suppressed.
    fn issue_play(&mut self) {
        if let Err(e) = self.replay_current_phase() {
            debug!(phase = %self.phase, error = %e, "Phase advanced without playback");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterCommand, ClipMetadata, FrameRange, RecordingAdapter};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    fn test_clip() -> ClipMetadata {
        let mut segments = HashMap::new();
        segments.insert("inhale".to_string(), FrameRange::new(0, 180));
        segments.insert("exhale".to_string(), FrameRange::new(180, 360));
        ClipMetadata::new(Some(30.0), segments).unwrap()
    }

    fn wired_controller() -> (PhaseController, Rc<RefCell<RecordingAdapter>>) {
        let adapter = Rc::new(RefCell::new(RecordingAdapter::new()));
        let mut controller = PhaseController::new(4.0, 4.0);
        controller.attach_clip(test_clip());
        controller.attach_adapter(Box::new(Rc::clone(&adapter)));
        (controller, adapter)
    }

    #[test]
    fn test_initial_state_is_idle() {
        let controller = PhaseController::new(4.0, 4.0);
        assert_eq!(controller.state(), PhaseState::Idle);
        assert_eq!(controller.durations(), (4.0, 4.0));
    }

    #[test]
    fn test_start_plays_inhale_at_held_duration() {
        let (mut controller, adapter) = wired_controller();
        controller.start();
        assert_eq!(controller.state(), PhaseState::Inhaling);

        // 180 frames / (4.0s * 30fps) = 1.5
        let (segment, speed) = adapter.borrow().last_play().unwrap();
        assert_eq!(segment, FrameRange::new(0, 180));
        assert_eq!(speed, 1.5);
    }

    #[test]
    fn test_completion_flips_phase() {
        let (mut controller, adapter) = wired_controller();
        controller.start();
        controller.on_phase_complete();
        assert_eq!(controller.state(), PhaseState::Exhaling);
        controller.on_phase_complete();
        assert_eq!(controller.state(), PhaseState::Inhaling);

        let plays = adapter
            .borrow()
            .commands
            .iter()
            .filter(|c| matches!(c, AdapterCommand::Play { .. }))
            .count();
        assert_eq!(plays, 3);
    }

    #[test]
    fn test_mid_phase_duration_update_applies_at_next_boundary() {
        let (mut controller, adapter) = wired_controller();
        controller.start();

        // Update the exhale slot while still inhaling.
        controller.set_exhale_duration(7.0);
        controller.on_phase_complete();

        // 180 frames / (7.0s * 30fps)
        let (_, speed) = adapter.borrow().last_play().unwrap();
        assert_eq!(speed, 180.0 / (7.0 * 30.0));

        // A change issued after entering Exhaling must not retroactively
        // alter the committed speed.
        controller.set_exhale_duration(3.0);
        let (_, speed_after) = adapter.borrow().last_play().unwrap();
        assert_eq!(speed_after, 180.0 / (7.0 * 30.0));
    }

    #[test]
    fn test_stray_completion_after_stop_is_noop() {
        let (mut controller, adapter) = wired_controller();
        controller.start();
        controller.stop();
        assert_eq!(controller.state(), PhaseState::Stopped);

        let commands_before = adapter.borrow().commands.len();
        controller.on_phase_complete();
        assert_eq!(adapter.borrow().commands.len(), commands_before);
        assert_eq!(controller.state(), PhaseState::Stopped);
    }

    #[test]
    fn test_restart_reenters_at_inhale() {
        let (mut controller, _adapter) = wired_controller();
        controller.start();
        controller.on_phase_complete();
        assert_eq!(controller.state(), PhaseState::Exhaling);

        controller.start();
        assert_eq!(controller.state(), PhaseState::Inhaling);
    }

    #[test]
    fn test_pause_while_stopped_is_noop() {
        let (mut controller, adapter) = wired_controller();
        controller.pause();
        assert_eq!(controller.state(), PhaseState::Idle);
        assert!(adapter.borrow().commands.is_empty());
    }

    #[test]
    fn test_pause_retains_phase_identity() {
        let (mut controller, adapter) = wired_controller();
        controller.start();
        controller.on_phase_complete();
        controller.pause();
        assert_eq!(controller.state(), PhaseState::Paused);
        assert_eq!(controller.phase(), BreathPhase::Exhale);

        controller.resume();
        assert_eq!(controller.state(), PhaseState::Exhaling);
        assert!(adapter
            .borrow()
            .commands
            .iter()
            .any(|c| matches!(c, AdapterCommand::Resume)));
    }

    #[test]
    fn test_replay_without_adapter_reports_unavailable() {
        let mut controller = PhaseController::new(4.0, 4.0);
        controller.attach_clip(test_clip());
        controller.start();
        assert!(matches!(
            controller.replay_current_phase(),
            Err(BreathError::AdapterUnavailable)
        ));
        // State advanced regardless.
        assert_eq!(controller.state(), PhaseState::Inhaling);
    }

    #[test]
    fn test_state_advances_without_adapter() {
        let mut controller = PhaseController::new(4.0, 4.0);
        controller.attach_clip(test_clip());
        controller.start();
        controller.on_phase_complete();
        assert_eq!(controller.state(), PhaseState::Exhaling);
    }

    #[test]
    fn test_speed_formula_with_default_frame_rate() {
        let mut segments = HashMap::new();
        segments.insert("inhale".to_string(), FrameRange::new(0, 90));
        segments.insert("exhale".to_string(), FrameRange::new(90, 180));
        let clip = ClipMetadata::new(None, segments).unwrap();

        let mut controller = PhaseController::new(6.0, 4.0);
        controller.attach_clip(clip);
        // 90 / (6.0 * 30) = 0.5
        assert_eq!(controller.playback_speed(BreathPhase::Inhale), Some(0.5));
    }
}
