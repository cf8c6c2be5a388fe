//! `rl-playback` — Drives a live compositing room from a timeline.
//!
//! This crate provides:
//!
//! - **`RoomService`**: the remote room boundary (show/hide/reorder/query),
//!   plus `LocalRoom`, an in-memory implementation
//! - **`PlaybackScheduler`**: play/stop as a non-destructive preview, with
//!   anchor-relative playhead, compiled event firing and diff-before-send
//! - **`RoomSession`**: the single-task event loop tying the store, scheduler
//!   and persistence together
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rl_common::{InputId, SessionConfig};
//! use rl_playback::{LocalRoom, RoomSession, RoomState, SessionCommand, SystemClock};
//! use rl_project::MemoryStore;
//!
//! # async fn demo() {
//! let room = Arc::new(LocalRoom::new(RoomState::visible([InputId::from("cam")])));
//! let session = RoomSession::open(
//!     "studio",
//!     room,
//!     SystemClock::new(),
//!     MemoryStore::new(),
//!     SessionConfig::default(),
//! )
//! .await;
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(32);
//! tx.send(SessionCommand::Play).await.unwrap();
//! tx.send(SessionCommand::Shutdown).await.unwrap();
//! let store = session.run(rx).await;
//! assert!(!store.state().is_playing);
//! # }
//! ```

pub mod clock;
pub mod room;
pub mod scheduler;
pub mod session;

// Re-export primary types at crate root for convenience.
pub use clock::{Clock, ManualClock, SystemClock};
pub use room::{LocalRoom, RoomCommand, RoomInput, RoomService, RoomState};
pub use scheduler::{PlaybackScheduler, TickOutcome, TransportState};
pub use session::{RoomSession, SessionCommand};
