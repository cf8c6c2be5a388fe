//! Errors raised by the remote room service boundary (thiserror-based).

use thiserror::Error;

use crate::types::InputId;

/// Errors returned by calls into the remote compositing room.
///
/// Callers in the playback path log these and carry on; they are never
/// surfaced to the frame loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoomError {
    #[error("Room request `{operation}` failed: {reason}")]
    RequestFailed { operation: String, reason: String },

    #[error("Room service unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown input: {0}")]
    UnknownInput(InputId),
}

/// Convenience Result type for room service calls.
pub type RoomResult<T> = Result<T, RoomError>;
