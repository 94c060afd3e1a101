//! Engine configuration
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Values are layered from an optional TOML file and then
//! `SURVEY_SENTIMENT_*` environment variables, with nested keys separated by
//! a double underscore:
//!
//! ```text
//! SURVEY_SENTIMENT_STATE_DIR=/var/lib/survey
//! SURVEY_SENTIMENT_BACKGROUND__EXPLORATION_RATE=0
//! SURVEY_SENTIMENT_INCOME__AUTO_UPDATE_AFTER=5
//! ```

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "SURVEY_SENTIMENT";

/// Default location for snapshots and the audit log
pub fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("survey-sentiment")
}

/// Main engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding snapshots and the threshold audit log
    pub state_dir: PathBuf,

    /// Seed for every exploration policy (unseeded when absent)
    pub seed: Option<u64>,

    pub background: BackgroundConfig,
    pub income: IncomeConfig,
    pub traits: TraitConfig,
    pub scheduler: SchedulerConfig,
}

/// Occupation sentiment scorer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub learning_rate: f64,
    pub exploration_rate: f64,
}

/// Income threshold classifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeConfig {
    /// Run `update()` once this many feedback records are buffered
    pub auto_update_after: Option<usize>,

    /// Append boundary moves to `<state_dir>/income_threshold_audit.jsonl`
    pub audit_log: bool,
}

/// Role-model trait weighter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitConfig {
    pub learning_rate: f64,
    pub exploration_rate: f64,

    /// Reward for the trait picked by the policy on each occurrence
    pub selection_reward: f64,

    /// Reward (or penalty, when negative impact) for every extracted trait
    pub impact_reward: f64,
}

/// Periodic update settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            seed: None,
            background: BackgroundConfig::default(),
            income: IncomeConfig::default(),
            traits: TraitConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            exploration_rate: 0.1,
        }
    }
}

impl Default for IncomeConfig {
    fn default() -> Self {
        Self {
            auto_update_after: None,
            audit_log: true,
        }
    }
}

impl Default for TraitConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            exploration_rate: 0.2,
            selection_reward: 0.1,
            impact_reward: 0.05,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 300,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl EngineConfig {
    /// Layer defaults, an optional TOML file, and environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration rooted at `state_dir` with defaults elsewhere
    pub fn with_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            ..Self::default()
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        validate_learning_rate("background.learning_rate", self.background.learning_rate)?;
        validate_rate("background.exploration_rate", self.background.exploration_rate)?;
        validate_learning_rate("traits.learning_rate", self.traits.learning_rate)?;
        validate_rate("traits.exploration_rate", self.traits.exploration_rate)?;

        if !self.traits.selection_reward.is_finite() || !self.traits.impact_reward.is_finite() {
            return Err(EngineError::InvalidConfig(
                "traits rewards must be finite".to_string(),
            ));
        }

        if self.income.auto_update_after == Some(0) {
            return Err(EngineError::InvalidConfig(
                "income.auto_update_after must be at least 1".to_string(),
            ));
        }

        if self.scheduler.interval_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "scheduler.interval_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Where the income audit log goes, if enabled
    pub fn audit_log_path(&self) -> Option<PathBuf> {
        self.income
            .audit_log
            .then(|| self.state_dir.join("income_threshold_audit.jsonl"))
    }
}

fn validate_rate(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(EngineError::InvalidConfig(format!(
            "{} must be between 0 and 1",
            name
        )));
    }
    Ok(())
}

fn validate_learning_rate(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(EngineError::InvalidConfig(format!(
            "{} must be positive",
            name
        )));
    }
    Ok(())
}
