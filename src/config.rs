//! Study configuration
//!
//! Read from `study.toml` in the data directory. Every field has a default,
//! so a missing or empty file gives the stock scheduler.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub scheduler: SchedulerConfig,
    pub session: SessionConfig,
    pub leech: LeechConfig,
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub desired_retention: f64,
    /// Longest interval in days
    pub maximum_interval: i64,
    pub enable_fuzz: bool,
    /// Learning steps in minutes
    pub learning_steps: Vec<u32>,
    /// Relearning steps in minutes
    pub relearning_steps: Vec<u32>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            desired_retention: 0.9,
            maximum_interval: 730,
            enable_fuzz: true,
            learning_steps: vec![1, 10],
            relearning_steps: vec![10],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub new_limit: usize,
    pub review_limit: usize,
    pub exam_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            new_limit: 20,
            review_limit: 100,
            exam_limit: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeechConfig {
    /// Leech once lapses exceed this
    pub lapse_threshold: u32,
    /// Retention path only applies once reps exceed this
    pub rep_threshold: u32,
    /// Percent
    pub retention_threshold: f64,
    /// Fewer logs than this and retention is unknown
    pub min_logs: usize,
    /// Rolling window for retention, in days
    pub window_days: i64,
}

impl Default for LeechConfig {
    fn default() -> Self {
        Self {
            lapse_threshold: 5,
            rep_threshold: 10,
            retention_threshold: 40.0,
            min_logs: 5,
            window_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub page_size: usize,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self { page_size: 100 }
    }
}

impl StudyConfig {
    pub const FILE_NAME: &'static str = "study.toml";

    /// Default data directory (e.g. ~/.local/share/nous-srs)
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("nous-srs"))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: StudyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, falling back to defaults when it doesn't exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let retention = self.scheduler.desired_retention;
        if !retention.is_finite() || retention <= 0.0 || retention >= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "scheduler.desired_retention must be between 0 and 1, got {}",
                retention
            )));
        }
        if self.scheduler.maximum_interval < 1 {
            return Err(ConfigError::Invalid(
                "scheduler.maximum_interval must be at least 1 day".to_string(),
            ));
        }
        if !self.leech.retention_threshold.is_finite() {
            return Err(ConfigError::Invalid(
                "leech.retention_threshold must be a finite percentage".to_string(),
            ));
        }
        if self.maintenance.page_size == 0 {
            return Err(ConfigError::Invalid(
                "maintenance.page_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
