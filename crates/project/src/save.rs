//! Snapshot serialization: writing `TimelineSnapshot` to JSON files.

use std::path::Path;

use rl_app_state::TimelineSnapshot;
use tracing::{debug, info};

use crate::error::{ProjectError, ProjectResult};

/// Serialize a snapshot to a pretty-printed JSON string.
pub fn to_json_string(snapshot: &TimelineSnapshot) -> ProjectResult<String> {
    let json = serde_json::to_string_pretty(snapshot)?;
    debug!(
        tracks = snapshot.tracks.len(),
        json_len = json.len(),
        "Serialized timeline to JSON"
    );
    Ok(json)
}

/// Write a snapshot to `path`.
///
/// Data is first written to a sibling temp file and then renamed over the
/// target, so an interrupted write never leaves a truncated document.
pub fn save_snapshot(snapshot: &TimelineSnapshot, path: &Path) -> ProjectResult<()> {
    let json = to_json_string(snapshot)?;
    let temp_path = path.with_extension("json.tmp");

    std::fs::write(&temp_path, json.as_bytes()).map_err(|e| {
        tracing::error!(path = %temp_path.display(), error = %e, "Failed to write temp file");
        ProjectError::Io(e)
    })?;

    std::fs::rename(&temp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        tracing::error!(
            from = %temp_path.display(),
            to = %path.display(),
            error = %e,
            "Failed to rename temp file to target"
        );
        ProjectError::Io(e)
    })?;

    info!(path = %path.display(), "Timeline saved");
    Ok(())
}
