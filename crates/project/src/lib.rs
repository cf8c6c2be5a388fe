//! `rl-project` — Timeline persistence for the roomline engine.
//!
//! This crate handles loading and saving per-room timeline snapshots:
//!
//! - **Adapters**: the `TimelinePersistence` trait with a JSON file store and
//!   an in-memory store
//! - **Save/Load**: atomic JSON writes, tolerant reads (missing file is `None`)
//! - **Migration**: upgrades older timeline documents to the current version
//! - **Debounce**: `SaveDebouncer` coalesces bursts of edits into one save
//!
//! # Usage
//!
//! ```rust,no_run
//! use rl_app_state::TimelineStore;
//! use rl_common::TimelineConfig;
//! use rl_project::{JsonFileStore, TimelinePersistence};
//!
//! let store = JsonFileStore::new("timelines");
//! let mut timeline = TimelineStore::new(TimelineConfig::default());
//!
//! if let Some(snapshot) = store.load_timeline("studio").unwrap() {
//!     timeline.hydrate(&snapshot);
//! }
//! store.save_timeline("studio", &timeline.snapshot()).unwrap();
//! ```

pub mod autosave;
pub mod error;
pub mod load;
pub mod migrate;
pub mod persistence;
pub mod save;

// Re-export primary API at crate root
pub use autosave::{SaveDebouncer, DEFAULT_SAVE_DEBOUNCE_MS};
pub use error::{ProjectError, ProjectResult};
pub use load::{from_json_string, load_snapshot};
pub use migrate::migrate_snapshot;
pub use persistence::{validate_room_id, JsonFileStore, MemoryStore, TimelinePersistence};
pub use save::{save_snapshot, to_json_string};
