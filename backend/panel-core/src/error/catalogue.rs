use common::ErrorLocation;

use std::path::PathBuf;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CatalogueError {
    #[error("Catalogue Read Error: {path}: {source} {location}")]
    Read {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalogue Write Error: {path}: {source} {location}")]
    Write {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest Parse Error: {path}: {reason} {location}")]
    Manifest {
        location: ErrorLocation,
        path: PathBuf,
        reason: String,
    },

    #[error("Watch Error: {reason} {location}")]
    Watch {
        location: ErrorLocation,
        reason: String,
    },
}
