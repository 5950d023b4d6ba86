//! Configuration system for reqscope
//!
//! Provides:
//! - Config file discovery (CLI flag, env var, user config dir)
//! - TOML parsing with serde
//! - Environment variable overrides
//! - Validation of log level, timeline limits and filter names

use crate::category::Category;
use crate::messages::Agent;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Complete reqscope configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReqscopeConfig {
    /// Logging settings
    pub logging: LoggingSettings,

    /// Timeline settings
    pub timeline: TimelineSettings,

    /// Initial filter state
    pub filters: FilterSettings,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Timeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineSettings {
    /// Spans kept in the overview before it is truncated
    pub overview_cap: usize,

    /// Ranks surfaced as "slowest events"
    pub slowest_rank_limit: u32,
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            overview_cap: 45,
            slowest_rank_limit: 3,
        }
    }
}

/// Filter settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Agents hidden at startup (server, browser)
    pub hidden_agents: Vec<String>,

    /// Categories hidden at startup
    pub hidden_categories: Vec<String>,
}

impl FilterSettings {
    /// Parsed hidden agents; unknown names are skipped
    pub fn hidden_agents(&self) -> Vec<Agent> {
        self.hidden_agents
            .iter()
            .filter_map(|a| Agent::parse(a))
            .collect()
    }

    /// Parsed hidden categories; unknown names are skipped
    pub fn hidden_categories(&self) -> Vec<Category> {
        self.hidden_categories
            .iter()
            .filter_map(|c| Category::parse(c))
            .collect()
    }
}

/// Configuration loader
pub struct ConfigLoader {
    /// Path to config file (if specified via CLI)
    cli_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self { cli_path: None }
    }

    /// Set the config path from CLI argument
    pub fn with_cli_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_path = path;
        self
    }

    /// Load configuration with the following precedence:
    /// 1. CLI --config flag
    /// 2. REQSCOPE_CONFIG environment variable
    /// 3. <user config dir>/reqscope/config.toml
    /// 4. Default values
    pub fn load(&self) -> ConfigResult<ReqscopeConfig> {
        let config_path = self.find_config_file();

        let mut config = if let Some(path) = config_path {
            info!("Loading configuration from: {}", path.display());
            self.load_from_file(&path)?
        } else {
            debug!("No config file found, using defaults");
            ReqscopeConfig::default()
        };

        self.apply_env_overrides(&mut config);
        self.validate(&config)?;

        Ok(config)
    }

    /// Find the config file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            if path.exists() {
                return Some(path.clone());
            }
            warn!("CLI config path does not exist: {}", path.display());
        }

        if let Ok(env_path) = std::env::var("REQSCOPE_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            warn!("REQSCOPE_CONFIG path does not exist: {}", env_path);
        }

        Self::default_config_path().filter(|p| p.exists())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(&self, path: &Path) -> ConfigResult<ReqscopeConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: ReqscopeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, config: &mut ReqscopeConfig) {
        if let Ok(val) = std::env::var("REQSCOPE_LOG_LEVEL") {
            config.logging.log_level = val;
        }
        if let Ok(val) = std::env::var("REQSCOPE_OVERVIEW_CAP") {
            match val.parse() {
                Ok(cap) => config.timeline.overview_cap = cap,
                Err(_) => warn!("Ignoring non-numeric REQSCOPE_OVERVIEW_CAP: {}", val),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self, config: &ReqscopeConfig) -> ConfigResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                config.logging.log_level, valid_levels
            )));
        }

        if config.timeline.overview_cap == 0 {
            return Err(ConfigError::ValidationError(
                "Timeline overview cap cannot be 0".to_string(),
            ));
        }

        if let Some(agent) = config
            .filters
            .hidden_agents
            .iter()
            .find(|a| Agent::parse(a).is_none())
        {
            return Err(ConfigError::ValidationError(format!(
                "Unknown agent in filters.hidden_agents: {}",
                agent
            )));
        }

        if let Some(category) = config
            .filters
            .hidden_categories
            .iter()
            .find(|c| Category::parse(c).is_none())
        {
            return Err(ConfigError::ValidationError(format!(
                "Unknown category in filters.hidden_categories: {}",
                category
            )));
        }

        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, config: &ReqscopeConfig, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| {
            ConfigError::ValidationError(format!("Failed to serialize config: {}", e))
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Get the default config file path for the current platform
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("reqscope").join("config.toml"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper module for platform-specific directories
mod dirs {
    use std::path::PathBuf;

    /// Get the user's config directory
    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }

        #[cfg(not(target_os = "windows"))]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReqscopeConfig::default();
        assert_eq!(config.logging.log_level, "info");
        assert_eq!(config.timeline.overview_cap, 45);
        assert_eq!(config.timeline.slowest_rank_limit, 3);
        assert!(config.filters.hidden_agents.is_empty());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
            [logging]
            log_level = "debug"
        "#;
        let config: ReqscopeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.logging.log_level, "debug");
        // Other fields should be default
        assert_eq!(config.timeline.overview_cap, 45);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
            [logging]
            log_level = "trace"

            [timeline]
            overview_cap = 20
            slowest_rank_limit = 5

            [filters]
            hidden_agents = ["browser"]
            hidden_categories = ["data-store", "log"]
        "#;

        let config: ReqscopeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.logging.log_level, "trace");
        assert_eq!(config.timeline.overview_cap, 20);
        assert_eq!(config.timeline.slowest_rank_limit, 5);
        assert_eq!(config.filters.hidden_agents(), vec![Agent::Browser]);
        assert_eq!(
            config.filters.hidden_categories(),
            vec![Category::DataStore, Category::Log]
        );
        assert!(ConfigLoader::new().validate(&config).is_ok());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let config = ReqscopeConfig {
            logging: LoggingSettings {
                log_level: "invalid".to_string(),
            },
            ..Default::default()
        };
        assert!(ConfigLoader::new().validate(&config).is_err());
    }

    #[test]
    fn test_validation_zero_overview_cap() {
        let config = ReqscopeConfig {
            timeline: TimelineSettings {
                overview_cap: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(ConfigLoader::new().validate(&config).is_err());
    }

    #[test]
    fn test_validation_unknown_filter_names() {
        let config = ReqscopeConfig {
            filters: FilterSettings {
                hidden_agents: vec!["mobile".to_string()],
                hidden_categories: Vec::new(),
            },
            ..Default::default()
        };
        assert!(ConfigLoader::new().validate(&config).is_err());

        let config = ReqscopeConfig {
            filters: FilterSettings {
                hidden_agents: Vec::new(),
                hidden_categories: vec!["styles".to_string()],
            },
            ..Default::default()
        };
        assert!(ConfigLoader::new().validate(&config).is_err());
    }

    #[test]
    fn test_save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let loader = ConfigLoader::new();

        let mut config = ReqscopeConfig::default();
        config.timeline.overview_cap = 12;
        loader.save(&config, &path).unwrap();

        let loaded = loader.load_from_file(&path).unwrap();
        assert_eq!(loaded.timeline.overview_cap, 12);
    }

    #[test]
    fn test_serialize_config() {
        let config = ReqscopeConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[logging]"));
        assert!(toml_str.contains("overview_cap"));
    }
}
