//! Where the broker keeps its files, and `.env` loading.

use crate::{CONFIG_DIR_ENV, PANEL_DIR_NAME};

use std::env;
use std::path::PathBuf;

use log::{debug, info, warn};

/// How the config directory was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSource {
    EnvVar,
    PlatformDefault,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDir {
    pub path: PathBuf,
    pub source: PathSource,
}

/// Resolve the config directory.
///
/// - `PANEL_CONFIG_DIR` when set
/// - otherwise `<platform config dir>/panel`
/// - otherwise `<temp dir>/panel`
pub fn resolve_config_dir() -> ConfigDir {
    if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
        let path = PathBuf::from(custom_dir);
        info!("Using {} override: {}", CONFIG_DIR_ENV, path.display());
        return ConfigDir {
            path,
            source: PathSource::EnvVar,
        };
    }

    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join(PANEL_DIR_NAME);
        debug!("Platform config dir: {}", path.display());
        return ConfigDir {
            path,
            source: PathSource::PlatformDefault,
        };
    }

    let path = env::temp_dir().join(PANEL_DIR_NAME);
    warn!("No platform config dir, falling back to {}", path.display());
    ConfigDir {
        path,
        source: PathSource::Fallback,
    }
}

/// Default location for the listening socket.
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(env::temp_dir)
        .join(crate::DEFAULT_SOCKET_NAME)
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join(PANEL_DIR_NAME)
}

pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join(PANEL_DIR_NAME)
}

/// Load `.env` from the working directory, then from next to the
/// executable. Returns the file that was loaded.
pub fn try_load_dotenv() -> Option<PathBuf> {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded .env from: {:?}", path);
        return Some(path);
    }

    let exe_path = env::current_exe().ok()?;
    let env_path = exe_path.parent()?.join(".env");
    if !env_path.exists() {
        return None;
    }
    match dotenvy::from_path(&env_path) {
        Ok(()) => {
            info!("Loaded .env from: {:?}", env_path);
            Some(env_path)
        }
        Err(e) => {
            warn!("Failed to parse .env at {:?}: {}", env_path, e);
            None
        }
    }
}
