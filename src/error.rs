//! Error handling for Furnish
//!
//! No error in this crate is fatal to the process. Every variant either
//! reverts the session to a well-defined prior state or degrades to a fresh
//! mapping session.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionState;

/// Result type alias for Furnish operations
pub type Result<T> = std::result::Result<T, FurnishError>;

/// Main error type for Furnish operations
#[derive(Error, Debug)]
pub enum FurnishError {
    // Store Errors
    #[error("Malformed placement store: {len} bytes is not a multiple of the {width}-byte record width")]
    MalformedStore { len: usize, width: usize },

    #[error("Failed to write placement store: {path}: {source}")]
    PersistenceWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read placement store: {path}: {source}")]
    PersistenceReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Mapping Engine Errors
    #[error("Mapping engine failed to save the map: {reason}")]
    EngineSaveFailed { reason: String },

    #[error("Mapping engine failed to load the map: {reason}")]
    EngineLoadFailed { reason: String },

    #[error("Mapping engine failed to delete map {map_id}")]
    EngineDeleteFailed { map_id: String },

    // Session Errors
    #[error("Placements are not accepted while {state}")]
    NotAcceptingPlacements { state: SessionState },

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        state: SessionState,
        operation: &'static str,
    },

    // Placement Errors
    #[error("Unknown model type {model_type} (catalog has {catalog_len} entries)")]
    UnknownModelType { model_type: u32, catalog_len: usize },

    #[error("No surface under the reticle to place a model on")]
    NoPlacementSurface,

    // Settings / Configuration Errors
    #[error("Settings error: {reason}")]
    Settings { reason: String },

    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },

    // Serialization Errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FurnishError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            FurnishError::MalformedStore { .. } => "MALFORMED_STORE",
            FurnishError::PersistenceWriteFailed { .. } => "PERSISTENCE_WRITE_FAILED",
            FurnishError::PersistenceReadFailed { .. } => "PERSISTENCE_READ_FAILED",
            FurnishError::EngineSaveFailed { .. } => "ENGINE_SAVE_FAILED",
            FurnishError::EngineLoadFailed { .. } => "ENGINE_LOAD_FAILED",
            FurnishError::EngineDeleteFailed { .. } => "ENGINE_DELETE_FAILED",
            FurnishError::NotAcceptingPlacements { .. } => "NOT_ACCEPTING_PLACEMENTS",
            FurnishError::InvalidState { .. } => "INVALID_STATE",
            FurnishError::UnknownModelType { .. } => "UNKNOWN_MODEL_TYPE",
            FurnishError::NoPlacementSurface => "NO_PLACEMENT_SURFACE",
            FurnishError::Settings { .. } => "SETTINGS_ERROR",
            FurnishError::ConfigError { .. } => "CONFIG_ERROR",
            FurnishError::Json(_) => "JSON_ERROR",
            FurnishError::Io(_) => "IO_ERROR",
        }
    }

    /// Check if the user can simply try the same operation again
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FurnishError::PersistenceWriteFailed { .. }
                | FurnishError::EngineSaveFailed { .. }
                | FurnishError::EngineLoadFailed { .. }
                | FurnishError::EngineDeleteFailed { .. }
                | FurnishError::NotAcceptingPlacements { .. }
                | FurnishError::NoPlacementSurface
        )
    }

    /// Get a user-facing recovery suggestion
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            FurnishError::MalformedStore { .. } => {
                Some("The saved placements are unreadable. Clear the session and place the models again.")
            }
            FurnishError::PersistenceWriteFailed { .. } => {
                Some("Free up storage space and save again.")
            }
            FurnishError::EngineSaveFailed { .. } => {
                Some("Keep scanning the room for a few seconds, then save again.")
            }
            FurnishError::EngineLoadFailed { .. } => {
                Some("Check the network connection and retry the download.")
            }
            FurnishError::EngineDeleteFailed { .. } => {
                Some("The old map is kept and will be removed on the next successful save.")
            }
            FurnishError::NotAcceptingPlacements { .. } => {
                Some("Clear the current session to start placing models again.")
            }
            FurnishError::NoPlacementSurface => {
                Some("Move the device slowly until a surface is detected.")
            }
            _ => None,
        }
    }
}
