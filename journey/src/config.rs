//! Configuration for a learning journey.

use std::path::Path;

use serde::{Deserialize, Serialize};

use flowpath::LayoutConfig;
use playback::{PlaybackConfig, DEFAULT_QUIZ_SECONDS};

use crate::error::ConfigError;

/// Top-level journey configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JourneyConfig {
    /// Canvas geometry
    pub layout: LayoutConfig,
    /// Block gating
    pub playback: PlaybackConfig,
    /// Standalone quizzes
    pub quiz: QuizConfig,
    /// General settings
    pub general: GeneralConfig,
}

impl JourneyConfig {
    /// Parse config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Load config from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&raw)?)
    }

    /// Write config to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}

/// Quiz configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    /// Time limit when a quiz does not specify one (seconds)
    pub default_time_limit_secs: u32,
    /// Allow going back to earlier questions
    pub allow_backtrack: bool,
    /// Score needed to pass (percent)
    pub pass_threshold_percent: u8,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            default_time_limit_secs: DEFAULT_QUIZ_SECONDS,
            allow_backtrack: true,
            pass_threshold_percent: 70,
        }
    }
}

/// General settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default log filter for binaries
    pub log_level: String,
    /// Broadcast capacity of the journey event bus
    pub event_capacity: usize,
}

impl GeneralConfig {
    /// Filter directive for `target` at the configured level.
    pub fn log_directive(&self, target: &str) -> String {
        format!("{}={}", target, self.log_level.trim())
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            event_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JourneyConfig::default();
        assert_eq!(config.quiz.default_time_limit_secs, 1800);
        assert!(config.playback.require_correct_to_advance);
        assert_eq!(config.playback.video_min_watch_secs, 3);
        assert_eq!(config.layout.canvas_width, 375.0);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = JourneyConfig::default();
        config.quiz.default_time_limit_secs = 600;
        config.playback.require_correct_to_advance = false;

        let yaml = config.to_yaml().unwrap();
        assert_eq!(JourneyConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
playback:
  video_min_watch_secs: 5
layout:
  canvas_width: 414
"#;
        let config = JourneyConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.playback.video_min_watch_secs, 5);
        assert!(config.playback.require_correct_to_advance);
        assert_eq!(config.layout.canvas_width, 414.0);
        assert_eq!(config.layout.node_spacing, 140.0);
        assert_eq!(config.quiz, QuizConfig::default());
    }

    #[test]
    fn test_log_directive_from_yaml() {
        let config = JourneyConfig::from_yaml("general:\n  log_level: debug\n").unwrap();
        assert_eq!(config.general.log_directive("flow_preview"), "flow_preview=debug");
        assert_eq!(GeneralConfig::default().log_directive("journey"), "journey=info");
    }

    #[test]
    fn test_load_missing_file() {
        let err = JourneyConfig::load("/nonexistent/journey.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
