use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Reasons a [`HelperDescriptor`](crate::HelperDescriptor) is refused at build time.
#[derive(Debug, ThisError)]
pub enum ModelError {
    #[error("Model Error: {field} is required {location}")]
    MissingField {
        field: &'static str,
        location: ErrorLocation,
    },

    #[error("Model Error: {field} cannot be empty {location}")]
    EmptyField {
        field: &'static str,
        location: ErrorLocation,
    },

    /// The value would break a colon separated catalogue cache line.
    #[error("Model Error: {field} contains a reserved character: {value:?} {location}")]
    ReservedCharacter {
        field: &'static str,
        value: String,
        location: ErrorLocation,
    },
}

impl ModelError {
    /// Name of the descriptor field that failed validation.
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field, .. }
            | Self::EmptyField { field, .. }
            | Self::ReservedCharacter { field, .. } => field,
        }
    }
}
