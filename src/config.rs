use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::context_manager::ContextManagerConfig;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub context: ContextManagerConfig,
    pub general: GeneralConfig,
}

/// Where persisted context lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// General application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub verbose: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|dir| dir.join("agent-context"))
            .unwrap_or_else(|| PathBuf::from("./data/context"));
        Self { data_dir }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?.unwrap_or_default();
        config.load_from_env()?;
        Ok(config)
    }

    /// Load configuration from file. A missing file is not an error.
    fn load_from_file() -> Result<Option<Self>> {
        let config_path = Self::get_config_path();
        if !config_path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        Ok(Some(config))
    }

    /// Load configuration from environment variables
    fn load_from_env(&mut self) -> Result<()> {
        if let Ok(data_dir) = env::var("AGENT_CONTEXT_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(limit) = env::var("AGENT_CONTEXT_HISTORY_LIMIT") {
            self.set_value("context.history_limit", &limit)?;
        }

        if let Ok(verbose) = env::var("AGENT_CONTEXT_VERBOSE") {
            self.general.verbose = verbose.parse().unwrap_or(false);
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path();

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn get_config_path() -> PathBuf {
        // Use ~/.config/agent-context/config.toml consistently across platforms
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("agent-context");
        path.push("config.toml");
        path
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.context.history_limit == 0 {
            return Err(anyhow::anyhow!("history_limit must be greater than 0"));
        }

        if self.context.max_suggestions == 0 {
            return Err(anyhow::anyhow!("max_suggestions must be greater than 0"));
        }

        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("data_dir must not be empty"));
        }

        Ok(())
    }

    /// Create a sample configuration file
    pub fn create_sample_config() -> Result<()> {
        let config = Self::default();
        let config_path = Self::get_config_path();

        if config_path.exists() {
            println!("Configuration file already exists at: {}", config_path.display());
            return Ok(());
        }

        config.save()?;

        println!("Created sample configuration file at: {}", config_path.display());
        println!("Environment variables override the file:");
        println!("  AGENT_CONTEXT_DATA_DIR=/path/to/data");
        println!("  AGENT_CONTEXT_HISTORY_LIMIT=200");

        Ok(())
    }

    /// Set a configuration value
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "storage.data_dir" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "context.history_limit" => {
                self.context.history_limit = value.parse::<usize>()
                    .map_err(|_| anyhow::anyhow!("Invalid history_limit value: {}", value))?;
            }
            "context.context_message_count" => {
                self.context.context_message_count = value.parse::<usize>()
                    .map_err(|_| anyhow::anyhow!("Invalid context_message_count value: {}", value))?;
            }
            "context.max_suggestions" => {
                self.context.max_suggestions = value.parse::<usize>()
                    .map_err(|_| anyhow::anyhow!("Invalid max_suggestions value: {}", value))?;
            }
            "general.verbose" => {
                self.general.verbose = value.parse::<bool>()
                    .map_err(|_| anyhow::anyhow!("Invalid verbose value: {}. Must be true or false", value))?;
            }
            _ => {
                return Err(anyhow::anyhow!("Unknown configuration key: {}", key));
            }
        }
        Ok(())
    }

    /// Get available configuration keys
    pub fn get_available_keys() -> Vec<&'static str> {
        vec![
            "storage.data_dir",
            "context.history_limit",
            "context.context_message_count",
            "context.max_suggestions",
            "general.verbose",
        ]
    }
}

/// Configuration builder for programmatic configuration
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.config.storage.data_dir = data_dir.into();
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.config.context.history_limit = limit;
        self
    }

    pub fn context_message_count(mut self, count: usize) -> Self {
        self.config.context.context_message_count = count;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.general.verbose = verbose;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.context.history_limit, 200);
        assert_eq!(config.context.context_message_count, 3);
        assert_eq!(config.context.max_suggestions, 5);
        assert!(!config.general.verbose);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .data_dir("/tmp/agent-context")
            .history_limit(50)
            .context_message_count(0)
            .verbose(true)
            .build();

        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/agent-context"));
        assert_eq!(config.context.history_limit, 50);
        assert_eq!(config.context.context_message_count, 0);
        assert!(config.general.verbose);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.context.history_limit = 0;
        assert!(config.validate().is_err());

        config.context.history_limit = 10;
        config.context.max_suggestions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_set_value() {
        let mut config = Config::default();
        config.set_value("context.history_limit", "25").unwrap();
        config.set_value("general.verbose", "true").unwrap();
        assert_eq!(config.context.history_limit, 25);
        assert!(config.general.verbose);

        assert!(config.set_value("context.history_limit", "lots").is_err());
        assert!(config.set_value("llm.provider", "x").is_err());
        assert_eq!(Config::get_available_keys().len(), 5);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[context]\nhistory_limit = 42\n").unwrap();
        assert_eq!(config.context.history_limit, 42);
        assert_eq!(config.context.max_suggestions, 5);
        assert_eq!(config.general, GeneralConfig::default());

        let round_trip: Config = toml::from_str(&toml::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(round_trip, config);
    }
}
