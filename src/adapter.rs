//! Animation adapter seam and clip metadata
//!
//! Rendering and animation-asset parsing live outside the core. The core
//! only needs clip *metadata* (frame rate plus two named frame segments) and
//! a command surface to drive playback. The adapter raises a single
//! completion event back into the core by calling
//! [`crate::controller::PhaseController::on_phase_complete`] when a played
//! segment finishes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{BreathError, Result};
use crate::models::BreathPhase;

/// Frame rate assumed when the clip metadata does not carry one
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// A fixed frame range within a single animation clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    /// First frame of the segment (inclusive)
    pub start_frame: u32,
    /// Last frame of the segment (exclusive, matching clip in/out points)
    pub end_frame: u32,
}

impl FrameRange {
    pub fn new(start_frame: u32, end_frame: u32) -> Self {
        FrameRange {
            start_frame,
            end_frame,
        }
    }

    /// Number of frames the segment spans
    pub fn frame_count(&self) -> u32 {
        self.end_frame.saturating_sub(self.start_frame)
    }
}

/// Metadata of a loaded animation clip
///
/// Construction is the fatal validation point: a clip that cannot resolve
/// both the "inhale" and "exhale" segments fails with
/// [`BreathError::MissingSegment`] and the session never starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipMetadata {
    frame_rate: f64,
    segments: HashMap<String, FrameRange>,
}

impl ClipMetadata {
    /// Build clip metadata from a frame rate and named segments
    ///
    /// `frame_rate` of `None` falls back to [`DEFAULT_FRAME_RATE`]. Both
    /// breathing segments must be present.
    pub fn new(frame_rate: Option<f64>, segments: HashMap<String, FrameRange>) -> Result<Self> {
        for phase in [BreathPhase::Inhale, BreathPhase::Exhale] {
            if !segments.contains_key(phase.segment_name()) {
                return Err(BreathError::MissingSegment {
                    name: phase.segment_name().to_string(),
                });
            }
        }
        let frame_rate = match frame_rate {
            Some(fr) if fr.is_finite() && fr > 0.0 => fr,
            _ => DEFAULT_FRAME_RATE,
        };
        Ok(ClipMetadata {
            frame_rate,
            segments,
        })
    }

    /// Clip frame rate in frames per second
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Resolve a named segment
    pub fn segment(&self, name: &str) -> Result<FrameRange> {
        self.segments
            .get(name)
            .copied()
            .ok_or_else(|| BreathError::MissingSegment {
                name: name.to_string(),
            })
    }

    /// Resolve the segment for a breath phase
    ///
    /// Infallible after construction, which guarantees both phases resolve.
    pub fn phase_segment(&self, phase: BreathPhase) -> FrameRange {
        self.segments
            .get(phase.segment_name())
            .copied()
            .unwrap_or(FrameRange {
                start_frame: 0,
                end_frame: 0,
            })
    }
}

/// Command surface the core drives playback through
///
/// Implementations wrap the host's rendering library. All methods are
/// fire-and-forget commands; completion flows back through the single
/// `on_phase_complete` event on the controller.
pub trait AnimationAdapter {
    /// Play a segment at the given speed multiplier
    fn play(&mut self, segment: FrameRange, speed: f64);

    /// Change playback speed of the in-flight segment
    fn set_speed(&mut self, speed: f64);

    /// Stop playback entirely
    fn stop_playback(&mut self);

    /// Suspend playback mid-segment
    fn pause_playback(&mut self);

    /// Continue a suspended segment
    fn resume_playback(&mut self);
}

/// Shared-handle adapters, for hosts that keep their own reference to the
/// adapter while the controller drives it
impl<A: AnimationAdapter> AnimationAdapter for std::rc::Rc<std::cell::RefCell<A>> {
    fn play(&mut self, segment: FrameRange, speed: f64) {
        self.borrow_mut().play(segment, speed);
    }

    fn set_speed(&mut self, speed: f64) {
        self.borrow_mut().set_speed(speed);
    }

    fn stop_playback(&mut self) {
        self.borrow_mut().stop_playback();
    }

    fn pause_playback(&mut self) {
        self.borrow_mut().pause_playback();
    }

    fn resume_playback(&mut self) {
        self.borrow_mut().resume_playback();
    }
}

/// Playback command recorded by [`RecordingAdapter`]
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterCommand {
    Play { segment: FrameRange, speed: f64 },
    SetSpeed(f64),
    Stop,
    Pause,
    Resume,
}

/// Adapter double that records every command it receives
///
/// Used by the integration tests and the CLI simulator in place of a real
/// rendering library.
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    /// Commands in arrival order
    pub commands: Vec<AdapterCommand>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last play command issued, if any
    pub fn last_play(&self) -> Option<(FrameRange, f64)> {
        self.commands.iter().rev().find_map(|c| match c {
            AdapterCommand::Play { segment, speed } => Some((*segment, *speed)),
            _ => None,
        })
    }
}

impl AnimationAdapter for RecordingAdapter {
    fn play(&mut self, segment: FrameRange, speed: f64) {
        self.commands.push(AdapterCommand::Play { segment, speed });
    }

    fn set_speed(&mut self, speed: f64) {
        self.commands.push(AdapterCommand::SetSpeed(speed));
    }

    fn stop_playback(&mut self) {
        self.commands.push(AdapterCommand::Stop);
    }

    fn pause_playback(&mut self) {
        self.commands.push(AdapterCommand::Pause);
    }

    fn resume_playback(&mut self) {
        self.commands.push(AdapterCommand::Resume);
    }
}
