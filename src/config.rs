//! Configuration file parsing for mutation testing

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::MutantError;
use crate::expression::Expression;
use crate::integration::Test;
use crate::isolation::IsolationKind;

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub integration: IntegrationConfig,
    /// Directories searched for `requires`, in order
    #[serde(default)]
    pub includes: Vec<PathBuf>,
    /// Files loaded into the program image
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub matcher: MatcherConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Global settings for mutation testing
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Number of worker threads
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Timeout in seconds for each test run
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Milliseconds between progress polls
    #[serde(default = "default_delay")]
    pub delay: u64,
    #[serde(default)]
    pub isolation: IsolationKind,
    /// Stop scheduling new mutations once one survives
    #[serde(default)]
    pub fail_fast: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            timeout: default_timeout(),
            delay: default_delay(),
            isolation: IsolationKind::default(),
            fail_fast: false,
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay)
    }
}

fn default_jobs() -> usize {
    num_cpus::get()
}

fn default_timeout() -> u64 {
    30
}

fn default_delay() -> u64 {
    50
}

/// Test framework integration settings
#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationConfig {
    /// Registered integration name
    #[serde(default = "default_integration")]
    pub name: String,
    /// Program and arguments of the `command` integration
    #[serde(default)]
    pub command: Vec<String>,
    /// Tests known to the integration
    #[serde(default)]
    pub tests: Vec<Test>,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            name: default_integration(),
            command: Vec::new(),
            tests: Vec::new(),
        }
    }
}

fn default_integration() -> String {
    "null".to_string()
}

/// Expressions selecting and excluding subjects
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatcherConfig {
    #[serde(default)]
    pub match_expressions: Vec<Expression>,
    #[serde(default)]
    pub ignore_expressions: Vec<Expression>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, MutantError> {
        let content = std::fs::read_to_string(path).map_err(|e| MutantError::ConfigError {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::parse(&content).map_err(|e| MutantError::ConfigError {
            message: format!("Failed to parse config file '{}': {}", path.display(), e),
        })
    }

    /// Parse configuration from YAML text
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Validate settings that cannot be checked while parsing
    pub fn validate(&self) -> Result<(), Vec<MutantError>> {
        let mut errors = Vec::new();

        if self.settings.jobs == 0 {
            errors.push(MutantError::ConfigError {
                message: "settings.jobs must be at least 1".to_string(),
            });
        }
        if self.settings.timeout == 0 {
            errors.push(MutantError::ConfigError {
                message: "settings.timeout must be at least 1 second".to_string(),
            });
        }
        if self.matcher.match_expressions.is_empty() {
            errors.push(MutantError::ConfigError {
                message: "matcher.match_expressions is empty, nothing to mutate".to_string(),
            });
        }
        for include in &self.includes {
            if !include.is_dir() {
                errors.push(MutantError::ConfigError {
                    message: format!("include directory '{}' does not exist", include.display()),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
