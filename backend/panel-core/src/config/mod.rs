pub mod paths;
pub mod store;

pub use paths::{ConfigDir, PathSource, resolve_config_dir, try_load_dotenv};
pub use store::{ConfigStore, ConfigValue};

use crate::error::config::ConfigError;
use crate::supervisor::{LaunchSettings, SupervisorSettings};
use crate::transaction::FrameLimits;
use crate::{
    CONFIG_FILE_NAME, DEFAULT_MAX_FRAME_LEN, DEFAULT_SOCKET_TIMEOUT_MS, SOCKET_ADDRESS_ENV,
    SOCKET_TIMEOUT_ENV,
};

use common::ErrorLocation;

use std::env;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_VERSION: u32 = 1;
const MIN_FRAME_LEN: u32 = 1024;
const MAX_SOCKET_TIMEOUT_MS: u64 = 10 * 60 * 1000;

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocketConfig {
    #[serde(default = "paths::default_socket_path")]
    pub path: PathBuf,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: u32,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            path: paths::default_socket_path(),
            timeout_ms: default_timeout_ms(),
            max_frame_len: default_max_frame_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModulesConfig {
    #[serde(default = "default_keyboard_dir")]
    pub keyboard_dir: PathBuf,
    #[serde(default = "default_helper_dir")]
    pub helper_dir: PathBuf,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            keyboard_dir: default_keyboard_dir(),
            helper_dir: default_helper_dir(),
            cache_path: default_cache_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HelperConfig {
    #[serde(default = "default_launcher")]
    pub launcher: PathBuf,
    #[serde(default = "default_config_module")]
    pub config_module: String,
    #[serde(default)]
    pub display: String,
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    #[serde(default = "default_restart_window_secs")]
    pub restart_window_secs: u64,
    #[serde(default = "default_reap_interval_ms")]
    pub reap_interval_ms: u64,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            launcher: default_launcher(),
            config_module: default_config_module(),
            display: String::new(),
            max_restarts: default_max_restarts(),
            restart_window_secs: default_restart_window_secs(),
            reap_interval_ms: default_reap_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Backing file of the config clients' key/value store. Relative paths
    /// resolve against the config directory.
    #[serde(default = "default_store_file")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PanelConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub socket: SocketConfig,

    #[serde(default)]
    pub modules: ModulesConfig,

    #[serde(default)]
    pub helpers: HelperConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            socket: SocketConfig::default(),
            modules: ModulesConfig::default(),
            helpers: HelperConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_timeout_ms() -> u64 {
    DEFAULT_SOCKET_TIMEOUT_MS
}
fn default_max_frame_len() -> u32 {
    DEFAULT_MAX_FRAME_LEN
}
fn default_keyboard_dir() -> PathBuf {
    paths::default_data_dir().join("keyboard")
}
fn default_helper_dir() -> PathBuf {
    paths::default_data_dir().join("helper")
}
fn default_cache_path() -> PathBuf {
    paths::default_cache_dir().join("ise_info")
}
fn default_launcher() -> PathBuf {
    PathBuf::from("panel-helper-launcher")
}
fn default_config_module() -> String {
    "socket".to_string()
}
fn default_max_restarts() -> u32 {
    3
}
fn default_restart_window_secs() -> u64 {
    60
}
fn default_reap_interval_ms() -> u64 {
    500
}
fn default_store_file() -> PathBuf {
    PathBuf::from("config-store.json")
}

// ============================================
// IMPLEMENTATION
// ============================================

impl PanelConfig {
    /// Load config from {config_dir}/panel.json.
    ///
    /// # Returns
    ///
    /// Returns `Ok(PanelConfig)` if loaded successfully or defaults if file missing.
    /// Returns `Err(ConfigError)` if file exists but is corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: PanelConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/panel.json using atomic write.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Apply `PANEL_SOCKET_ADDRESS` and `PANEL_SOCKET_TIMEOUT`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(address) = env::var(SOCKET_ADDRESS_ENV) {
            if address.is_empty() {
                warn!("{} is set but empty, ignoring", SOCKET_ADDRESS_ENV);
            } else {
                info!("Using {} override: {}", SOCKET_ADDRESS_ENV, address);
                self.socket.path = PathBuf::from(address);
            }
        }

        if let Ok(timeout) = env::var(SOCKET_TIMEOUT_ENV) {
            match timeout.trim().parse::<u64>() {
                Ok(ms) => {
                    info!("Using {} override: {}ms", SOCKET_TIMEOUT_ENV, ms);
                    self.socket.timeout_ms = ms;
                }
                Err(e) => warn!("Ignoring {}={:?}: {}", SOCKET_TIMEOUT_ENV, timeout, e),
            }
        }
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::ValidationError {
            location: ErrorLocation::from(Location::caller()),
            reason,
        };

        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(invalid(format!(
                "Invalid version: {} (expected 1-{})",
                self.version, CONFIG_VERSION
            )));
        }

        if self.socket.path.as_os_str().is_empty() {
            return Err(invalid("socket.path cannot be empty".to_string()));
        }

        if self.socket.timeout_ms == 0 || self.socket.timeout_ms > MAX_SOCKET_TIMEOUT_MS {
            return Err(invalid(format!(
                "Invalid socket timeout: {}ms (must be 1-{})",
                self.socket.timeout_ms, MAX_SOCKET_TIMEOUT_MS
            )));
        }

        if self.socket.max_frame_len < MIN_FRAME_LEN {
            return Err(invalid(format!(
                "Invalid max frame length: {} (must be at least {})",
                self.socket.max_frame_len, MIN_FRAME_LEN
            )));
        }

        if self.helpers.launcher.as_os_str().is_empty() {
            return Err(invalid("helpers.launcher cannot be empty".to_string()));
        }

        if self.helpers.reap_interval_ms == 0 {
            return Err(invalid("helpers.reap_interval_ms must be positive".to_string()));
        }

        if self.helpers.restart_window_secs == 0 {
            return Err(invalid(
                "helpers.restart_window_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits::new(
            Duration::from_millis(self.socket.timeout_ms),
            self.socket.max_frame_len,
        )
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.helpers.reap_interval_ms)
    }

    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            keyboard_dir: self.modules.keyboard_dir.clone(),
            helper_dir: self.modules.helper_dir.clone(),
            cache_path: self.modules.cache_path.clone(),
            launch: LaunchSettings {
                launcher: self.helpers.launcher.clone(),
                config_module: self.helpers.config_module.clone(),
                display: self.helpers.display.clone(),
            },
            max_restarts: self.helpers.max_restarts,
            restart_window: Duration::from_secs(self.helpers.restart_window_secs),
        }
    }

    pub fn store_path(&self, config_dir: &Path) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            config_dir.join(&self.store.path)
        }
    }
}
