use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use todo_sharer_core::SortBy;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

pub const DEFAULT_SETTLE_TIMEOUT_SECS: u64 = 10;

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    /// Initial sort key for item listings
    pub sort_by: ConfigValue<SortBy>,
    /// Hide completed items by default
    pub hide_completed: ConfigValue<bool>,
    /// How long a command waits for live queries to load
    pub settle_timeout_secs: ConfigValue<u64>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    sort_by: Option<String>,
    hide_completed: Option<bool>,
    settle_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut database_path = ConfigValue::new(
            Self::default_data_dir().join("todo-sharer.db"),
            ConfigSource::Default,
        );
        let mut sort_by = ConfigValue::new(SortBy::Order, ConfigSource::Default);
        let mut hide_completed = ConfigValue::new(false, ConfigSource::Default);
        let mut settle_timeout_secs =
            ConfigValue::new(DEFAULT_SETTLE_TIMEOUT_SECS, ConfigSource::Default);
        let mut config_file = None;

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                database_path = ConfigValue::new(resolve_relative(&path, db_path), ConfigSource::File);
            }
            if let Some(value) = file_config.sort_by {
                sort_by = ConfigValue::new(parse_sort_by("sort_by", &value)?, ConfigSource::File);
            }
            if let Some(value) = file_config.hide_completed {
                hide_completed = ConfigValue::new(value, ConfigSource::File);
            }
            if let Some(value) = file_config.settle_timeout_secs {
                settle_timeout_secs = ConfigValue::new(value, ConfigSource::File);
            }
        }

        if let Ok(db_path) = std::env::var("TODO_SHARER_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(value) = std::env::var("TODO_SHARER_SORT_BY") {
            sort_by = ConfigValue::new(
                parse_sort_by("TODO_SHARER_SORT_BY", &value)?,
                ConfigSource::Environment,
            );
        }
        if let Ok(value) = std::env::var("TODO_SHARER_HIDE_COMPLETED") {
            let parsed = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => return Err(ConfigError::InvalidValue("TODO_SHARER_HIDE_COMPLETED".into(), value)),
            };
            hide_completed = ConfigValue::new(parsed, ConfigSource::Environment);
        }
        if let Ok(value) = std::env::var("TODO_SHARER_SETTLE_TIMEOUT") {
            let parsed = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TODO_SHARER_SETTLE_TIMEOUT".into(), value.clone()))?;
            settle_timeout_secs = ConfigValue::new(parsed, ConfigSource::Environment);
        }

        Ok(Self {
            database_path,
            sort_by,
            hide_completed,
            settle_timeout_secs,
            config_file,
        })
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_secs(self.settle_timeout_secs.value)
    }

    /// Writes a config file holding the current values.
    ///
    /// Refuses to overwrite an existing file.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(path.to_path_buf(), e))?;
        }

        let file = ConfigFile {
            database_path: Some(Self::default_data_dir().join("todo-sharer.db")),
            sort_by: Some(SortBy::Order.as_str().to_string()),
            hide_completed: Some(false),
            settle_timeout_secs: Some(DEFAULT_SETTLE_TIMEOUT_SECS),
        };
        let contents = serde_yaml::to_string(&file)
            .map_err(|e| ConfigError::SerializeError(path.to_path_buf(), e))?;
        std::fs::write(path, contents).map_err(|e| ConfigError::WriteError(path.to_path_buf(), e))
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/todo-sharer/
    /// - macOS: ~/Library/Application Support/todo-sharer/
    /// - Windows: %APPDATA%/todo-sharer/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("todo-sharer")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/todo-sharer/
    /// - macOS: ~/Library/Application Support/todo-sharer/
    /// - Windows: %APPDATA%/todo-sharer/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("todo-sharer")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

/// Relative paths in a config file are relative to that file's directory.
fn resolve_relative(config_path: &Path, value: PathBuf) -> PathBuf {
    if value.is_relative() {
        config_path
            .parent()
            .map(|p| p.join(&value))
            .unwrap_or(value)
    } else {
        value
    }
}

fn parse_sort_by(key: &str, value: &str) -> Result<SortBy, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    WriteError(PathBuf, std::io::Error),
    SerializeError(PathBuf, serde_yaml::Error),
    AlreadyExists(PathBuf),
    InvalidValue(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::WriteError(path, e) => {
                write!(f, "Failed to write config file '{}': {}", path.display(), e)
            }
            ConfigError::SerializeError(path, e) => {
                write!(f, "Failed to serialize config for '{}': {}", path.display(), e)
            }
            ConfigError::AlreadyExists(path) => {
                write!(f, "Config file '{}' already exists", path.display())
            }
            ConfigError::InvalidValue(key, value) => {
                write!(f, "Invalid value for {}: '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
