use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum EngineError {
    #[error("Unknown Factory Error: {message} {location}")]
    UnknownFactory {
        message: String,
        location: ErrorLocation,
    },

    #[error("Module Load Error: {message} {location}")]
    ModuleLoad {
        message: String,
        location: ErrorLocation,
    },

    #[error("Instance Creation Error: {message} {location}")]
    InstanceCreation {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unknown Instance Error: {message} {location}")]
    UnknownInstance {
        message: String,
        location: ErrorLocation,
    },
}
