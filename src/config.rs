//! Configuration for the wakatime agent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Period between dispatch cycles.
pub const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::from_secs(30);

/// Main configuration for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Proxy handed to the reporter; empty means none
    pub proxy: String,

    /// Show activity in the editor status bar (UI only)
    pub show_in_status_bar: bool,

    /// Verbose reporter runs and debug logging
    pub debug: bool,

    /// Time between dispatch cycles
    #[serde(with = "duration_serde")]
    pub dispatch_interval: Duration,

    /// Path for storing the activity log
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wakatime-agent");

        Self {
            proxy: String::new(),
            show_in_status_bar: true,
            debug: false,
            dispatch_interval: DEFAULT_DISPATCH_INTERVAL,
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wakatime-agent")
            .join("config.json")
    }

    /// Path of the persisted activity log.
    pub fn activity_log_path(&self) -> PathBuf {
        self.data_path.join("activity.json")
    }

    /// The user-facing settings carried by this configuration.
    pub fn settings(&self) -> Settings {
        Settings {
            proxy: self.proxy.clone(),
            show_in_status_bar: self.show_in_status_bar,
            debug: self.debug,
        }
    }
}

/// The three user-configurable options read by each dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub proxy: String,
    pub show_in_status_bar: bool,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().settings()
    }
}

impl Settings {
    /// The proxy, if one is configured.
    pub fn proxy(&self) -> Option<&str> {
        let proxy = self.proxy.trim();
        (!proxy.is_empty()).then_some(proxy)
    }
}

/// Settings shared between the host and the dispatch scheduler.
pub type SharedSettings = Arc<RwLock<Settings>>;

pub fn shared_settings(settings: Settings) -> SharedSettings {
    Arc::new(RwLock::new(settings))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("dispatch_interval must be at least one second")]
    ZeroInterval,
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
