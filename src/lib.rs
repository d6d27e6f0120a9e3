// Library interface for BreathRS modules
// This allows integration tests and host applications to access the core

pub mod adapter;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod models;
pub mod pattern;
pub mod session;
pub mod thresholds;

// Re-export commonly used types for convenience
pub use adapter::{AnimationAdapter, ClipMetadata, FrameRange, DEFAULT_FRAME_RATE};
pub use config::SessionConfig;
pub use controller::PhaseController;
pub use error::{BreathError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::{
    AgeGroup, BiometricReading, BreathPhase, BreathingPattern, IndicatorCategory, PhaseState,
    ProtocolAction,
};
pub use pattern::{AdditiveInputs, PatternEngine, PatternStrategy};
pub use session::BiometricSession;
pub use thresholds::{ThresholdTable, ThresholdTriple};
