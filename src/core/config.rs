//! Configuration management for viewstats.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - CLI argument overrides
//! - Declarative view definitions
//! - Validation and defaults

use crate::core::{Result, StatsError, TagKey};
use crate::stats::{Aggregation, CollectionState, Measure, MeasureKind, View, ViewName, Window};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Complete configuration for viewstats
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Record delivery configuration
    pub recorder: RecorderConfig,
    /// Collection state configuration
    pub collection: CollectionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Views registered at startup
    pub views: Vec<ViewConfig>,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// How `record` calls reach the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderMode {
    /// Single worker thread draining a FIFO queue
    #[default]
    Queued,
    /// Applied synchronously on the caller's thread
    Direct,
}

/// Recorder configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Delivery mode
    pub mode: RecorderMode,
    /// Queue bound in queued mode; unbounded when unset
    pub queue_capacity: Option<usize>,
}

/// Collection state configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// State the manager starts in
    pub initial_state: CollectionState,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured logging format
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Declarative measure definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default = "default_measure_kind")]
    pub kind: MeasureKind,
}

/// Declarative view definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub measure: MeasureConfig,
    pub aggregation: Aggregation,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default = "default_window")]
    pub window: Window,
}

fn default_unit() -> String {
    "1".to_string()
}

fn default_measure_kind() -> MeasureKind {
    MeasureKind::Double
}

fn default_window() -> Window {
    Window::Cumulative
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl MeasureConfig {
    pub fn to_measure(&self) -> Result<Measure> {
        Measure::new(
            self.name.as_str(),
            self.description.as_str(),
            self.unit.as_str(),
            self.kind,
        )
    }
}

impl ViewConfig {
    /// Validates this definition and converts it into a [`View`].
    pub fn to_view(&self) -> Result<View> {
        let columns = self
            .columns
            .iter()
            .map(|column| TagKey::new(column.as_str()))
            .collect::<Result<Vec<_>>>()?;
        View::new(
            ViewName::new(self.name.as_str())?,
            self.description.as_str(),
            self.measure.to_measure()?,
            self.aggregation.clone(),
            columns,
            self.window,
        )
    }
}

impl Config {
    /// Load and validate a YAML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        ConfigBuilder::new().from_yaml(&yaml)?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.recorder.queue_capacity == Some(0) {
            return Err(StatsError::config("queue_capacity must be greater than 0"));
        }

        let mut names = HashSet::new();
        for view in &self.views {
            if !names.insert(view.name.as_str()) {
                return Err(StatsError::config(format!(
                    "View '{}' is defined more than once",
                    view.name
                )));
            }
            view.to_view()
                .map_err(|e| StatsError::config(format!("Invalid view '{}': {}", view.name, e)))?;
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)?;
        Ok(self)
    }

    /// Set record delivery mode
    pub fn recorder_mode(mut self, mode: RecorderMode) -> Self {
        self.config.recorder.mode = mode;
        self
    }

    /// Set queue bound
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.recorder.queue_capacity = Some(capacity);
        self
    }

    /// Set initial collection state
    pub fn initial_state(mut self, state: CollectionState) -> Self {
        self.config.collection.initial_state = state;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Enable structured logs
    pub fn structured_logs(mut self, structured: bool) -> Self {
        self.config.logging.structured = structured;
        self
    }

    /// Add a view definition
    pub fn view(mut self, view: ViewConfig) -> Self {
        self.config.views.push(view);
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
