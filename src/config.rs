//! Session configuration
//!
//! Explicit, enumerated configuration for a breathing session host: where
//! the animation renders, which clip to load, starting durations, autostart
//! behavior, strategy selection, and optional per-age-group threshold
//! overrides. Unrecognized age-group keys fail fast at build time instead of
//! silently resolving to nothing.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::controller::PhaseController;
use crate::error::BreathError;
use crate::models::AgeGroup;
use crate::pattern::{PatternEngine, PatternStrategy};
use crate::session::BiometricSession;
use crate::thresholds::{ThresholdTable, ThresholdTriple};

/// Main session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Host container the animation renders into
    pub container: String,

    /// Path to the animation clip asset
    pub clip_path: PathBuf,

    /// Starting inhale duration in seconds
    pub default_inhale_secs: f64,

    /// Starting exhale duration in seconds
    pub default_exhale_secs: f64,

    /// Start the cycle as soon as the session is wired up
    pub autostart: bool,

    /// Decision engine strategy
    pub strategy: PatternStrategy,

    /// Optional jitter seed for the additive strategy
    pub jitter_seed: Option<u64>,

    /// Per-age-group threshold overrides, keyed by kebab-case group name
    pub thresholds: HashMap<String, ThresholdTriple>,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let now = Utc::now();
        SessionConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            container: "lottie".to_string(),
            clip_path: PathBuf::from("breathing.json"),
            default_inhale_secs: 4.0,
            default_exhale_secs: 4.0,
            autostart: true,
            strategy: PatternStrategy::Table,
            jitter_seed: None,
            thresholds: HashMap::new(),
        }
    }
}

impl SessionConfig {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("breathrs")
            .join("config.toml")
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: SessionConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let mut config = self.clone();
        config.metadata.updated_at = Utc::now();
        let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration values
    ///
    /// Fails fast on non-positive durations, unrecognized age-group keys,
    /// and threshold pairs violating the ordering invariant.
    pub fn validate(&self) -> Result<()> {
        if self.default_inhale_secs <= 0.0 || self.default_exhale_secs <= 0.0 {
            anyhow::bail!(
                "Default durations must be positive, got {}/{}",
                self.default_inhale_secs,
                self.default_exhale_secs
            );
        }
        for (key, triple) in &self.thresholds {
            AgeGroup::from_str(key)
                .map_err(|e| anyhow::anyhow!("Unrecognized age-group key in thresholds: {}", e))?;
            ThresholdTriple::new(triple.critical_bound, triple.tolerable_bound)
                .map_err(|e| anyhow::anyhow!("Invalid thresholds for '{}': {}", key, e))?;
        }
        Ok(())
    }

    /// Build the threshold table: clinical defaults plus configured overrides
    pub fn build_threshold_table(&self) -> crate::error::Result<ThresholdTable> {
        let mut table = ThresholdTable::clinical_default();
        for (key, triple) in &self.thresholds {
            let group = AgeGroup::from_str(key)
                .map_err(|_| BreathError::UnknownAgeGroup { group: key.clone() })?;
            table.register(
                group,
                ThresholdTriple::new(triple.critical_bound, triple.tolerable_bound)?,
            );
        }
        Ok(table)
    }

    /// Build the configured decision engine
    pub fn build_engine(&self) -> PatternEngine {
        let engine = PatternEngine::with_strategy(self.strategy);
        match self.jitter_seed {
            Some(seed) => engine.with_jitter(seed),
            None => engine,
        }
    }

    /// Assemble a full session from this configuration
    pub fn build_session(&self) -> crate::error::Result<BiometricSession> {
        let table = self.build_threshold_table()?;
        let controller =
            PhaseController::new(self.default_inhale_secs, self.default_exhale_secs);
        Ok(BiometricSession::new(table, self.build_engine(), controller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_inhale_secs, 4.0);
        assert!(config.autostart);
        assert_eq!(config.strategy, PatternStrategy::Table);
    }

    #[test]
    fn test_unknown_age_group_key_fails_fast() {
        let mut config = SessionConfig::default();
        config.thresholds.insert(
            "teenager".to_string(),
            ThresholdTriple {
                critical_bound: 30.0,
                tolerable_bound: 50.0,
            },
        );
        assert!(config.validate().is_err());
        assert!(matches!(
            config.build_threshold_table(),
            Err(BreathError::UnknownAgeGroup { .. })
        ));
    }

    #[test]
    fn test_threshold_override_applies() {
        let mut config = SessionConfig::default();
        config.thresholds.insert(
            "young-adult".to_string(),
            ThresholdTriple {
                critical_bound: 25.0,
                tolerable_bound: 45.0,
            },
        );
        let table = config.build_threshold_table().unwrap();
        let bounds = table.bounds_for(AgeGroup::YoungAdult).unwrap();
        assert_eq!(bounds.critical_bound, 25.0);
        assert_eq!(bounds.tolerable_bound, 45.0);
        // Unconfigured groups keep the clinical defaults.
        let child = table.bounds_for(AgeGroup::Child).unwrap();
        assert_eq!(child.critical_bound, 40.0);
    }

    #[test]
    fn test_invalid_threshold_ordering_rejected() {
        let mut config = SessionConfig::default();
        config.thresholds.insert(
            "child".to_string(),
            ThresholdTriple {
                critical_bound: 60.0,
                tolerable_bound: 40.0,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = SessionConfig::default();
        config.default_exhale_secs = 6.0;
        config.strategy = PatternStrategy::Additive;
        config.jitter_seed = Some(7);
        config.save(&path).unwrap();

        let loaded = SessionConfig::load(&path).unwrap();
        assert_eq!(loaded.default_exhale_secs, 6.0);
        assert_eq!(loaded.strategy, PatternStrategy::Additive);
        assert_eq!(loaded.jitter_seed, Some(7));
    }

    #[test]
    fn test_build_session_uses_defaults() {
        let mut config = SessionConfig::default();
        config.default_inhale_secs = 5.0;
        config.default_exhale_secs = 5.5;
        let session = config.build_session().unwrap();
        assert_eq!(session.controller().durations(), (5.0, 5.5));
    }
}
