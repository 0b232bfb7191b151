use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CodecError {
    #[error("Type Mismatch Error: expected {expected}, found {found} {location}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
        location: ErrorLocation,
    },

    #[error("Unknown Opcode Error: {value} {location}")]
    UnknownOpcode { value: i32, location: ErrorLocation },

    #[error("Malformed Field Error: {message} {location}")]
    Malformed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Frame Too Large Error: {length} bytes exceeds limit of {limit} {location}")]
    FrameTooLarge {
        length: u64,
        limit: u32,
        location: ErrorLocation,
    },

    #[error("Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Closed Error: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },
}

impl CodecError {
    /// Transport failures end the connection; everything else only fails
    /// the request being decoded.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            CodecError::Timeout { .. }
                | CodecError::Closed { .. }
                | CodecError::Io { .. }
                | CodecError::FrameTooLarge { .. }
        )
    }
}

impl From<IoError> for CodecError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        if error.kind() == std::io::ErrorKind::UnexpectedEof {
            return CodecError::Closed {
                message: error.to_string(),
                location: ErrorLocation::from(Location::caller()),
            };
        }
        CodecError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
