//! Error types for the page studio

use thiserror::Error;

use crate::library::LibraryKind;
use crate::model::PanelId;

/// Result type alias for studio operations
pub type StudioResult<T> = Result<T, StudioError>;

/// Errors surfaced to the user by a single studio action.
///
/// None of these leave the page model half-updated: every mutation validates
/// before it writes.
#[derive(Error, Debug)]
pub enum StudioError {
    #[error("Invalid library file format: {0}")]
    InvalidImportFormat(String),

    #[error("Cannot create a {width}x{height} drawing surface for export")]
    SurfaceUnavailable { width: u32, height: u32 },

    #[error("{0} library is empty")]
    EmptyLibrary(LibraryKind),

    #[error("{kind} library is full (max {capacity})")]
    LibraryFull { kind: LibraryKind, capacity: usize },

    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Unknown page layout: {0}")]
    UnknownLayout(String),

    #[error("Panel {0} not found")]
    PanelNotFound(PanelId),

    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Image encode failed: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<base64::DecodeError> for StudioError {
    fn from(err: base64::DecodeError) -> Self {
        StudioError::Decode(err.to_string())
    }
}

impl From<image::ImageError> for StudioError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Encoding(e) => StudioError::Encode(e.to_string()),
            other => StudioError::Decode(other.to_string()),
        }
    }
}
