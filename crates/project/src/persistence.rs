//! Persistence adapters: where a room's timeline lives between sessions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rl_app_state::TimelineSnapshot;
use rl_common::PersistenceConfig;
use tracing::debug;

use crate::error::{ProjectError, ProjectResult};
use crate::load::load_snapshot;
use crate::save::save_snapshot;

/// Loads and saves one serialized timeline per room.
pub trait TimelinePersistence {
    /// `Ok(None)` when the room has never been saved.
    fn load_timeline(&self, room_id: &str) -> ProjectResult<Option<TimelineSnapshot>>;

    fn save_timeline(&self, room_id: &str, snapshot: &TimelineSnapshot) -> ProjectResult<()>;
}

impl<T: TimelinePersistence + ?Sized> TimelinePersistence for Arc<T> {
    fn load_timeline(&self, room_id: &str) -> ProjectResult<Option<TimelineSnapshot>> {
        (**self).load_timeline(room_id)
    }

    fn save_timeline(&self, room_id: &str, snapshot: &TimelineSnapshot) -> ProjectResult<()> {
        (**self).save_timeline(room_id, snapshot)
    }
}

/// Rejects ids that are empty or could escape the storage directory.
pub fn validate_room_id(room_id: &str) -> ProjectResult<()> {
    let bad = room_id.is_empty()
        || room_id == "."
        || room_id.contains("..")
        || room_id
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':' | '\0') || c.is_control());
    if bad {
        return Err(ProjectError::InvalidRoomId {
            room_id: room_id.to_string(),
        });
    }
    Ok(())
}

/// One `<room>.timeline.json` document per room under a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &PersistenceConfig) -> Self {
        Self::new(config.storage_dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a room, after validating the id.
    pub fn path_for(&self, room_id: &str) -> ProjectResult<PathBuf> {
        validate_room_id(room_id)?;
        Ok(self.dir.join(format!("{room_id}.timeline.json")))
    }
}

impl TimelinePersistence for JsonFileStore {
    fn load_timeline(&self, room_id: &str) -> ProjectResult<Option<TimelineSnapshot>> {
        let path = self.path_for(room_id)?;
        load_snapshot(&path)
    }

    fn save_timeline(&self, room_id: &str, snapshot: &TimelineSnapshot) -> ProjectResult<()> {
        let path = self.path_for(room_id)?;
        std::fs::create_dir_all(&self.dir)?;
        save_snapshot(snapshot, &path)
    }
}

/// Process-local store. Useful for previews and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: Mutex<HashMap<String, TimelineSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rooms.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.lock().is_empty()
    }
}

impl TimelinePersistence for MemoryStore {
    fn load_timeline(&self, room_id: &str) -> ProjectResult<Option<TimelineSnapshot>> {
        validate_room_id(room_id)?;
        Ok(self.rooms.lock().get(room_id).cloned())
    }

    fn save_timeline(&self, room_id: &str, snapshot: &TimelineSnapshot) -> ProjectResult<()> {
        validate_room_id(room_id)?;
        self.rooms
            .lock()
            .insert(room_id.to_string(), snapshot.clone());
        debug!(room_id, "Timeline stored in memory");
        Ok(())
    }
}
