//! Startup and shutdown of the broker process.

use crate::error::PanelError;
use crate::logger::initialize as LoggerInitialize;

use panel_core::config::paths::default_data_dir;
use panel_core::config::{PanelConfig, resolve_config_dir, try_load_dotenv};
use panel_core::observer::LoggingObserver;
use panel_core::server::PanelServer;

use common::ErrorLocation;

use std::env;
use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;

use log::{info, warn};
use tokio::signal::unix::{SignalKind, signal};

/// Overrides where `panel.log` is written.
pub const LOG_DIR_ENV: &str = "PANEL_LOG_DIR";

/// `PANEL_LOG_DIR` when set, otherwise `<data dir>/panel/logs`.
pub fn log_dir() -> PathBuf {
    match env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => default_data_dir().join("logs"),
    }
}

/// Load configuration, start the broker and serve until SIGINT, SIGTERM or
/// a client's `Exit`.
pub async fn run() -> Result<(), PanelError> {
    // Before the logger so PANEL_LOG_DIR can come from .env
    let dotenv = try_load_dotenv();

    let log_dir = log_dir();
    create_dir_all(&log_dir).map_err(|e| PanelError::Panel {
        message: format!("Failed to create log directory {}: {e}", log_dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;
    LoggerInitialize(&log_dir)?;

    info!("Panel broker starting");
    info!("Log directory: {}", log_dir.display());
    if let Some(path) = dotenv {
        info!("Environment loaded from {}", path.display());
    }

    let config_dir = resolve_config_dir();
    info!(
        "Config directory: {} ({:?})",
        config_dir.path.display(),
        config_dir.source
    );

    let mut config = PanelConfig::load(&config_dir.path)?;
    config.apply_env_overrides();

    let server = PanelServer::start(&config, &config_dir.path, Box::new(LoggingObserver)).await?;
    server.run(shutdown_signal()).await?;

    info!("Panel broker exited");
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!("SIGTERM handler not installed: {}", e);
            None
        }
    };

    let terminated = async {
        match terminate.as_mut() {
            Some(stream) => {
                stream.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Ctrl-C handler failed: {}", e);
            }
            info!("Interrupted");
        }
        _ = terminated => info!("Terminated"),
    }
}
