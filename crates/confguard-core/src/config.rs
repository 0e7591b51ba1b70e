//! Configuration types for confguard.

use crate::driver::{DriverRegistry, DriverSchema};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level configuration for confguard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Batch evaluation configuration.
    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    /// Script rule sandbox limits.
    #[serde(default)]
    pub script: ScriptConfig,

    /// Text rule defaults.
    #[serde(default)]
    pub text: TextConfig,

    /// Diff engine settings.
    #[serde(default)]
    pub diff: DiffConfig,

    /// Driver schemas.
    #[serde(default)]
    pub drivers: Vec<DriverSchema>,

    /// Per-rule configurations, by rule name.
    #[serde(default)]
    pub rules: HashMap<String, RuleConfig>,
}

impl Config {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Checks if a rule is enabled.
    #[must_use]
    pub fn is_rule_enabled(&self, rule_name: &str) -> bool {
        self.rules
            .get(rule_name)
            .map_or(true, |c| c.enabled.unwrap_or(true))
    }

    /// Builds the driver registry from the configured schemas.
    #[must_use]
    pub fn driver_registry(&self) -> DriverRegistry {
        self.drivers.iter().cloned().collect()
    }
}

/// Batch evaluation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Inventory directory (default: `inventory`).
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Glob patterns to exclude from inventory discovery.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Policy files to load.
    #[serde(default)]
    pub policies: Vec<PathBuf>,

    /// Maximum number of parallel evaluations (default: one per CPU).
    #[serde(default)]
    pub parallelism: Option<usize>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            exclude: Vec::new(),
            policies: Vec::new(),
            parallelism: None,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("inventory")
}

/// Longest accepted script time budget, one hour.
pub const MAX_SCRIPT_TIME_MS: u64 = 3_600_000;

/// Script rule sandbox limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Maximum number of interpreter operations per evaluation.
    pub max_operations: u64,
    /// Wall-clock budget per evaluation, in milliseconds.
    pub max_execution_time_ms: u64,
    /// Maximum function call depth.
    pub max_call_levels: usize,
    /// Maximum string length.
    pub max_string_size: usize,
    /// Maximum array length.
    pub max_array_size: usize,
    /// Maximum map size.
    pub max_map_size: usize,
    /// Whether scripts may resolve host names.
    pub allow_nslookup: bool,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            max_operations: 50_000_000,
            max_execution_time_ms: 60_000,
            max_call_levels: 64,
            max_string_size: 16 * 1024 * 1024,
            max_array_size: 100_000,
            max_map_size: 100_000,
            allow_nslookup: true,
        }
    }
}

impl ScriptConfig {
    /// Returns the wall-clock budget, clamped to 1 ms..1 h.
    #[must_use]
    pub fn execution_time(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.max_execution_time_ms.clamp(1, MAX_SCRIPT_TIME_MS))
    }
}

/// Text rule defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextConfig {
    /// Whether new text rules normalize whitespace by default.
    #[serde(default)]
    pub default_normalize: bool,
}

/// Diff engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Lines of context around each delta.
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            context_lines: default_context_lines(),
        }
    }
}

fn default_context_lines() -> usize {
    crate::diff::DEFAULT_CONTEXT_LINES
}

/// Per-rule configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Whether this rule is enabled.
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Parse error in config file.
    #[error("Failed to parse config: {message}")]
    Parse {
        /// Parse error message.
        message: String,
    },
}
