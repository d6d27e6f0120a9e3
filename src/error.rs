//! Unified error hierarchy for BreathRS
//!
//! Provides a structured error type system with context preservation and
//! integration with the tracing system. Input-validation errors are
//! recoverable and leave prior state untouched; clip errors are fatal at
//! load time.

use thiserror::Error;

/// Top-level error type for all BreathRS operations
#[derive(Debug, Error)]
pub enum BreathError {
    /// Age group is not registered in the threshold table
    #[error("Unknown age group: {group}")]
    UnknownAgeGroup { group: String },

    /// A biometric input is outside its declared domain
    #[error("Out-of-range biometric: {field}={value} (expected {min}..={max})")]
    OutOfRangeBiometric {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Animation clip lacks a required named segment
    #[error("Missing animation segment: {name}")]
    MissingSegment { name: String },

    /// No animation adapter attached when a play command was issued
    #[error("No animation adapter attached")]
    AdapterUnavailable,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for BreathRS operations
pub type Result<T> = std::result::Result<T, BreathError>;

impl BreathError {
    /// Whether the session can continue after this error with prior state
    /// preserved
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BreathError::UnknownAgeGroup { .. }
                | BreathError::OutOfRangeBiometric { .. }
                | BreathError::AdapterUnavailable
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BreathError::UnknownAgeGroup { .. } => ErrorSeverity::Warning,
            BreathError::OutOfRangeBiometric { .. } => ErrorSeverity::Warning,
            BreathError::AdapterUnavailable => ErrorSeverity::Warning,
            BreathError::MissingSegment { .. } => ErrorSeverity::Critical,
            BreathError::Configuration(_) => ErrorSeverity::Error,
            BreathError::Io(_) => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            BreathError::UnknownAgeGroup { group } => {
                format!(
                    "Age group '{}' is not configured. Valid groups: child, young-adult, older-adult.",
                    group
                )
            }
            BreathError::OutOfRangeBiometric { field, value, min, max } => {
                format!(
                    "The {} reading {} is outside the accepted range {}..{}. The previous breathing pattern is still active.",
                    field, value, min, max
                )
            }
            BreathError::MissingSegment { name } => {
                format!(
                    "The animation clip has no '{}' segment. Guided breathing needs both an inhale and an exhale segment.",
                    name
                )
            }
            BreathError::AdapterUnavailable => {
                "No animation is attached yet; breathing state advances silently.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Session cannot start or continue
    Critical,
    /// Operation failed but the session can continue
    Error,
    /// Input rejected, prior state preserved
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = BreathError::MissingSegment {
            name: "inhale".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);

        let err = BreathError::UnknownAgeGroup {
            group: "toddler".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_recoverable() {
        let err = BreathError::OutOfRangeBiometric {
            field: "stress".to_string(),
            value: 6.0,
            min: 1.0,
            max: 5.0,
        };
        assert!(err.is_recoverable());

        let err = BreathError::MissingSegment {
            name: "exhale".to_string(),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_user_messages() {
        let err = BreathError::UnknownAgeGroup {
            group: "infant".to_string(),
        };
        assert!(err.user_message().contains("infant"));

        let err = BreathError::OutOfRangeBiometric {
            field: "rmssd".to_string(),
            value: 300.0,
            min: 0.0,
            max: 250.0,
        };
        assert!(err.user_message().contains("previous breathing pattern"));
    }
}
