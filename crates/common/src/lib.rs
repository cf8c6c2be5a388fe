//! `rl-common` — Shared types, configuration, and errors for the roomline engine.
//!
//! This crate is the foundation that the other roomline crates depend on:
//!
//! - **Types**: `InputId` (newtype over a room source identifier)
//! - **Config**: `TimelineConfig`, `SchedulerConfig`, `PersistenceConfig`, `SessionConfig`
//! - **Errors**: `RoomError` for calls into the remote room service (thiserror-based)

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used items at crate root
pub use config::{PersistenceConfig, SchedulerConfig, SessionConfig, TimelineConfig};
pub use error::{RoomError, RoomResult};
pub use types::InputId;
