//! Error types for the persistence crate (thiserror-based).

use thiserror::Error;

/// Errors that can occur while loading or saving timeline documents.
#[derive(Error, Debug)]
pub enum ProjectError {
    /// File I/O error (read, write, rename).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document version is from a newer format than this build understands.
    #[error("Unsupported timeline version: {version}")]
    UnsupportedVersion { version: String },

    /// Document is structurally unusable.
    #[error("Invalid timeline snapshot: {reason}")]
    InvalidSnapshot { reason: String },

    /// Room id would escape the storage directory or is empty.
    #[error("Invalid room id: {room_id:?}")]
    InvalidRoomId { room_id: String },

    /// Migration from an older format failed.
    #[error("Migration failed from version {from} to {to}: {reason}")]
    MigrationFailed {
        from: String,
        to: String,
        reason: String,
    },
}

/// Convenience Result type for persistence operations.
pub type ProjectResult<T> = Result<T, ProjectError>;
