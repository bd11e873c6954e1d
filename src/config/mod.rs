//! Configuration management for docsight
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Sidecar process configuration
    #[serde(default)]
    pub sidecar: SidecarConfig,

    /// Local store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// How the sidecar executable is located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SidecarMode {
    /// Packaged when a resource directory is present, development otherwise
    Auto,
    /// Always spawn the bundled binary
    Packaged,
    /// Never spawn; assume a server is already running on `dev_port`
    Development,
}

/// Sidecar process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    #[serde(default = "default_sidecar_mode")]
    pub mode: SidecarMode,

    /// Host the sidecar binds and is probed on
    #[serde(default = "default_sidecar_host")]
    pub host: String,

    /// Port for the bundled sidecar
    #[serde(default = "default_sidecar_port")]
    pub port: u16,

    /// Port of an externally-run server in development mode
    #[serde(default = "default_sidecar_dev_port")]
    pub dev_port: u16,

    /// Executable name without platform suffix
    #[serde(default = "default_sidecar_binary_name")]
    pub binary_name: String,

    /// Explicit executable path, bypassing the search
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Extra directories searched before the default install locations
    #[serde(default)]
    pub resource_dirs: Vec<PathBuf>,

    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,

    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,

    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    #[serde(default = "default_health_path")]
    pub health_path: String,
}

impl SidecarConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

/// Local store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store file name, relative to the base directory
    #[serde(default = "default_store_file_name")]
    pub file_name: String,

    #[serde(default = "default_store_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Legacy rows migrated per transaction
    #[serde(default = "default_migration_batch_size")]
    pub migration_batch_size: u32,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for docsight data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to the SQLite store
    pub db_file: PathBuf,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            mode: default_sidecar_mode(),
            host: default_sidecar_host(),
            port: default_sidecar_port(),
            dev_port: default_sidecar_dev_port(),
            binary_name: default_sidecar_binary_name(),
            binary_path: None,
            resource_dirs: Vec::new(),
            startup_timeout_ms: default_startup_timeout_ms(),
            startup_grace_ms: default_startup_grace_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            monitor_interval_secs: default_monitor_interval_secs(),
            stop_grace_ms: default_stop_grace_ms(),
            health_path: default_health_path(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            file_name: default_store_file_name(),
            max_connections: default_store_max_connections(),
            busy_timeout_ms: default_store_busy_timeout_ms(),
            migration_batch_size: default_migration_batch_size(),
        }
    }
}

impl Config {
    /// Get the default base directory for docsight (~/.docsight)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".docsight")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join(&self.store.file_name),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join(&config.store.file_name),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            return Self::load(&config.paths.config_file);
        }

        debug!("No config file found, using defaults");
        config.validate()?;
        Ok(config)
    }

    /// Build a default configuration rooted at `base_dir`
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        let mut config = Config::default();
        config.init_paths(Some(base_dir));
        config
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let sidecar = &self.sidecar;

        if sidecar.host.trim().is_empty() {
            return Err(Error::Config("sidecar.host must not be empty".to_string()));
        }

        if sidecar.port == 0 || sidecar.dev_port == 0 {
            return Err(Error::Config(
                "sidecar.port and sidecar.dev_port must be non-zero".to_string(),
            ));
        }

        if sidecar.retry_interval_ms == 0 {
            return Err(Error::Config(
                "sidecar.retry_interval_ms must be positive".to_string(),
            ));
        }

        if sidecar.probe_timeout_ms == 0 || sidecar.probe_timeout_ms >= sidecar.startup_timeout_ms
        {
            return Err(Error::Config(
                "sidecar.probe_timeout_ms must be positive and shorter than sidecar.startup_timeout_ms"
                    .to_string(),
            ));
        }

        if sidecar.monitor_interval_secs == 0 {
            return Err(Error::Config(
                "sidecar.monitor_interval_secs must be positive".to_string(),
            ));
        }

        if sidecar.stop_grace_ms == 0 {
            return Err(Error::Config(
                "sidecar.stop_grace_ms must be positive".to_string(),
            ));
        }

        if !sidecar.health_path.starts_with('/') {
            return Err(Error::Config(
                "sidecar.health_path must start with '/'".to_string(),
            ));
        }

        if self.store.file_name.trim().is_empty() {
            return Err(Error::Config("store.file_name must not be empty".to_string()));
        }

        if self.store.max_connections == 0 {
            return Err(Error::Config(
                "store.max_connections must be positive".to_string(),
            ));
        }

        if self.store.migration_batch_size == 0 {
            return Err(Error::Config(
                "store.migration_batch_size must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
