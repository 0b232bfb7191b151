use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised when a secret type is handed to a serializer.
#[derive(Debug, ThisError)]
pub enum RedactError {
    #[error("Redact Error: {type_name} is never serialized, read it explicitly {location}")]
    SecretSerialization {
        type_name: &'static str,
        location: ErrorLocation,
    },
}
