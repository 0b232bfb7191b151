use common::ErrorLocation;

use std::error::Error as StdError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SpawnError {
    #[error("Spawn Error: {message} {location}")]
    Spawn {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Unknown Helper Error: {message} {location}")]
    UnknownHelper {
        message: String,
        location: ErrorLocation,
    },

    #[error("Crash Loop Error: {message} {location}")]
    CrashLoop {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Running Error: {message} {location}")]
    NotRunning {
        message: String,
        location: ErrorLocation,
    },
}
