use panel_core::error::CoreError;
use panel_core::error::config::ConfigError;
use panel_core::error::ipc::IpcError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the broker daemon.
#[derive(Debug, Error)]
pub enum PanelError {
    /// Error from the daemon itself
    #[error("Panel Error: {message} {location}")]
    Panel {
        message: String,
        location: ErrorLocation,
    },

    /// Error from panel-core (config, socket, supervisor)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    #[error("Logger Error: {message} {location}")]
    Logger {
        message: String,
        location: ErrorLocation,
    },
}

impl From<CoreError> for PanelError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        PanelError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for PanelError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        PanelError::from(CoreError::from(error))
    }
}

impl From<IpcError> for PanelError {
    #[track_caller]
    fn from(error: IpcError) -> Self {
        PanelError::from(CoreError::from(error))
    }
}
