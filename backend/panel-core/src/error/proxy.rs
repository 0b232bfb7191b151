use crate::error::codec::CodecError;
use crate::error::ipc::IpcError;

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ProxyError {
    #[error("Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
    },

    #[error("Rejected Error: {message} {location}")]
    Rejected {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unknown Handle Error: {message} {location}")]
    UnknownHandle {
        message: String,
        location: ErrorLocation,
    },

    #[error("Protocol Error: {message} {location}")]
    Protocol {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Ipc(#[from] IpcError),
}

impl From<CodecError> for ProxyError {
    #[track_caller]
    fn from(error: CodecError) -> Self {
        if error.is_transport() {
            ProxyError::Transport {
                message: error.to_string(),
                location: ErrorLocation::from(std::panic::Location::caller()),
            }
        } else {
            ProxyError::Protocol {
                message: error.to_string(),
                location: ErrorLocation::from(std::panic::Location::caller()),
            }
        }
    }
}
