//! Detector Configuration
//!
//! Features:
//! - Detector mode selection (auto/single/multi)
//! - Trace capture limits
//! - Logging level and format
//! - Environment variable overrides and validation

use crate::error::{Error, Result};
use crate::graph::ResourceAllocationGraph;
use serde::{Deserialize, Serialize};

/// Which detector a run uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Cycle detection for single-instance graphs, reduction otherwise
    #[default]
    Auto,
    SingleInstance,
    MultiInstance,
}

impl DetectionMode {
    /// Resolves `Auto` against a concrete graph. Forced modes are returned as-is.
    pub fn resolve(self, graph: &ResourceAllocationGraph) -> DetectionMode {
        match self {
            DetectionMode::Auto if graph.is_single_instance() => DetectionMode::SingleInstance,
            DetectionMode::Auto => DetectionMode::MultiInstance,
            forced => forced,
        }
    }
}

impl std::str::FromStr for DetectionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(DetectionMode::Auto),
            "single" | "single_instance" | "single-instance" | "cycle" => {
                Ok(DetectionMode::SingleInstance)
            }
            "multi" | "multi_instance" | "multi-instance" | "safety" => {
                Ok(DetectionMode::MultiInstance)
            }
            _ => Err(Error::ConfigError(format!("Invalid detection mode: {}", s))),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(Error::ConfigError(format!("Invalid log format: {}", s))),
        }
    }
}

/// Complete detector configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Detector selection
    pub mode: DetectionMode,

    /// Trace capture
    pub trace: TraceConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Record algorithm steps. When off only the terminal event is kept.
    pub capture: bool,

    /// Maximum number of recorded events (None = unbounded)
    pub max_events: Option<usize>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            capture: true,
            max_events: None,
        }
    }
}

impl TraceConfig {
    /// Only the terminal event is recorded.
    pub fn verdict_only() -> Self {
        Self {
            capture: false,
            max_events: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl DetectorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the environment in `from_env`)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Detector
        if let Some(mode) = lookup("RAGWATCH_MODE") {
            self.mode = mode.parse()?;
        }

        // Trace
        if let Some(capture) = lookup("RAGWATCH_TRACE") {
            self.trace.capture = capture
                .parse()
                .map_err(|_| Error::ConfigError("Invalid RAGWATCH_TRACE".to_string()))?;
        }
        if let Some(max) = lookup("RAGWATCH_MAX_EVENTS") {
            self.trace.max_events = Some(
                max.parse()
                    .map_err(|_| Error::ConfigError("Invalid RAGWATCH_MAX_EVENTS".to_string()))?,
            );
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(level) = lookup("RAGWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("RAGWATCH_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.trace.max_events == Some(0) {
            return Err(Error::ConfigError(
                "RAGWATCH_MAX_EVENTS must be at least 1".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::ConfigError(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = DetectorConfig::default();
        assert_eq!(config.mode, DetectionMode::Auto);
        assert!(config.trace.capture);
        assert_eq!(config.trace.max_events, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("auto".parse::<DetectionMode>().unwrap(), DetectionMode::Auto);
        assert_eq!("Single".parse::<DetectionMode>().unwrap(), DetectionMode::SingleInstance);
        assert_eq!("multi-instance".parse::<DetectionMode>().unwrap(), DetectionMode::MultiInstance);
        assert!("recover".parse::<DetectionMode>().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = DetectorConfig::default();
        config
            .apply_overrides(lookup_from(&[
                ("RAGWATCH_MODE", "multi"),
                ("RAGWATCH_TRACE", "false"),
                ("RAGWATCH_MAX_EVENTS", "64"),
                ("LOG_LEVEL", "warn"),
                ("RAGWATCH_LOG_LEVEL", "debug"),
                ("RAGWATCH_LOG_FORMAT", "json"),
            ]))
            .unwrap();

        assert_eq!(config.mode, DetectionMode::MultiInstance);
        assert!(!config.trace.capture);
        assert_eq!(config.trace.max_events, Some(64));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_overrides() {
        let mut config = DetectorConfig::default();
        assert!(config
            .apply_overrides(lookup_from(&[("RAGWATCH_MAX_EVENTS", "lots")]))
            .is_err());

        let mut config = DetectorConfig::default();
        config
            .apply_overrides(lookup_from(&[("RAGWATCH_LOG_LEVEL", "loud")]))
            .unwrap();
        assert!(config.validate().is_err());

        let mut config = DetectorConfig::default();
        config.trace.max_events = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mode_resolution() {
        let mut graph = ResourceAllocationGraph::new();
        graph.add_single_resource("R1").unwrap();
        assert_eq!(DetectionMode::Auto.resolve(&graph), DetectionMode::SingleInstance);

        graph.add_resource("R2", 2).unwrap();
        assert_eq!(DetectionMode::Auto.resolve(&graph), DetectionMode::MultiInstance);
        assert_eq!(
            DetectionMode::SingleInstance.resolve(&graph),
            DetectionMode::SingleInstance
        );
    }
}
