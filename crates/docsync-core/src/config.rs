//! Configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/docsync/config.toml)
//! 3. Environment variables (DOCSYNC_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::store::MAX_BATCH_SIZE;

/// Environment variable prefix
const ENV_PREFIX: &str = "DOCSYNC";

/// How the relator writes a parent's reference array back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelateMode {
    /// Compare-and-swap on the parent's version, retrying on conflict
    #[default]
    Checked,
    /// Plain read-modify-write; concurrent relates may lose an update
    Unchecked,
}

impl std::str::FromStr for RelateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "checked" => Ok(RelateMode::Checked),
            "unchecked" => Ok(RelateMode::Unchecked),
            other => Err(format!("unknown relate mode '{}'", other)),
        }
    }
}

/// Synchronization layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for local data (the CLI's store snapshot)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Serve fetches from the local cache when possible
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,

    /// Ids per batched read, clamped to 1..=10
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Reference array update strategy
    #[serde(default)]
    pub relate_mode: RelateMode,

    /// Attempts before a checked relate gives up
    #[serde(default = "default_max_relate_attempts")]
    pub max_relate_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            use_cache: default_use_cache(),
            batch_size: default_batch_size(),
            relate_mode: RelateMode::default(),
            max_relate_attempts: default_max_relate_attempts(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (DOCSYNC_DATA_DIR, DOCSYNC_USE_CACHE, ...)
    /// 2. Config file (~/.config/docsync/config.toml or DOCSYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_USE_CACHE", ENV_PREFIX)) {
            self.use_cache = val.eq_ignore_ascii_case("true") || val == "1";
        }

        if let Ok(val) = std::env::var(format!("{}_BATCH_SIZE", ENV_PREFIX)) {
            if let Ok(size) = val.parse() {
                self.batch_size = size;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_RELATE_MODE", ENV_PREFIX)) {
            if let Ok(mode) = val.parse() {
                self.relate_mode = mode;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_MAX_RELATE_ATTEMPTS", ENV_PREFIX)) {
            if let Ok(attempts) = val.parse() {
                self.max_relate_attempts = attempts;
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with DOCSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docsync")
            .join("config.toml")
    }

    /// Get the path to the store snapshot
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }

    /// Batch size actually used for id-list reads
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docsync")
}

fn default_use_cache() -> bool {
    true
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_max_relate_attempts() -> u32 {
    5
}
