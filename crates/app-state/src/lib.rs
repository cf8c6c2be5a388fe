//! `rl-app-state` — Undoable timeline state for the roomline engine.
//!
//! This crate provides:
//!
//! - **`TimelineStore`**: owns the current `TimelineState`, routes every edit
//!   through the reducer, and keeps structure/state revision counters.
//! - **`HistoryManager`**: bounded snapshot-based undo/redo with gesture batching.
//! - **`TimelineSnapshot`**: the persistable subset of a timeline.
//!
//! # Architecture
//!
//! ```text
//! TimelineStore
//! ├── current: TimelineState         (tracks, keyframes, playhead, zoom, transport)
//! ├── history: HistoryManager
//! │   ├── undo_stack: VecDeque       (past structural snapshots, bounded)
//! │   ├── redo_stack: Vec            (undone snapshots)
//! │   └── batch support              (drag gestures)
//! ├── structure_revision             (read by the playback scheduler)
//! └── state_revision                 (read by the save debouncer)
//! ```

pub mod history;
pub mod snapshot;
pub mod store;

// Re-export primary types at crate root for convenience.
pub use history::{HistoryEntry, HistoryManager};
pub use snapshot::{TimelineSnapshot, SNAPSHOT_VERSION};
pub use store::TimelineStore;
