//! CBRS Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with defaults matching the usual fairness evaluation setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Metric parameters
    pub eval: EvalConfig,

    /// Chart output configuration
    pub plot: PlotConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("CBRS_POP_PERCENTAGE") {
            config.eval.pop_percentage =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "CBRS_POP_PERCENTAGE".to_string(),
                    value,
                })?;
        }

        if let Ok(dir) = std::env::var("CBRS_PLOT_DIR") {
            config.plot.output_dir = PathBuf::from(dir);
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;

        // Only override if env values differ from defaults
        if env_config.eval.pop_percentage != EvalConfig::default().pop_percentage {
            self.eval.pop_percentage = env_config.eval.pop_percentage;
        }
        if env_config.plot.output_dir != PlotConfig::default().output_dir {
            self.plot.output_dir = env_config.plot.output_dir;
        }
        if env_config.logging.level != LoggingConfig::default().level {
            self.logging.level = env_config.logging.level;
        }

        Ok(self)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pct = self.eval.pop_percentage;
        if !(pct > 0.0 && pct <= 1.0) {
            return Err(ConfigError::InvalidValue {
                key: "eval.pop_percentage".to_string(),
                value: pct.to_string(),
            });
        }

        if !(self.eval.gini_epsilon > 0.0 && self.eval.gini_epsilon.is_finite()) {
            return Err(ConfigError::InvalidValue {
                key: "eval.gini_epsilon".to_string(),
                value: self.eval.gini_epsilon.to_string(),
            });
        }

        crate::validate_group_specs(&self.eval.user_groups).map_err(|e| {
            ConfigError::InvalidValue {
                key: "eval.user_groups".to_string(),
                value: e.to_string(),
            }
        })?;

        Ok(())
    }
}

/// Metric parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Share of distinct items considered "popular" (top of the ranking)
    pub pop_percentage: f64,

    /// Offset added to every rating before computing the Gini coefficient
    pub gini_epsilon: f64,

    /// Group definitions used when users are split by popularity ratio,
    /// ordered from the most to the least popularity-focused users
    pub user_groups: Vec<GroupSpec>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            pop_percentage: 0.2,
            gini_epsilon: 1e-7,
            user_groups: vec![
                GroupSpec::new("bb_focused", 0.2),
                GroupSpec::new("diverse", 0.6),
                GroupSpec::new("niche", 0.2),
            ],
        }
    }
}

/// A named share of the user base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Group name
    pub name: String,

    /// Fraction of users assigned to the group, in (0, 1]
    pub fraction: f64,
}

impl GroupSpec {
    /// Create a new group spec
    pub fn new(name: impl Into<String>, fraction: f64) -> Self {
        Self {
            name: name.into(),
            fraction,
        }
    }
}

/// Chart output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Root directory for generated charts
    pub output_dir: PathBuf,

    /// Chart width in pixels
    pub width: u32,

    /// Chart height in pixels
    pub height: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("results/plots"),
            width: 640,
            height: 480,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
