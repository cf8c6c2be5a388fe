//! Snapshot deserialization: loading `TimelineSnapshot` from JSON files.

use std::path::Path;

use rl_app_state::TimelineSnapshot;
use tracing::{debug, info, warn};

use crate::error::{ProjectError, ProjectResult};
use crate::migrate::migrate_snapshot;

/// Deserialize a snapshot from a JSON string, migrating older formats.
pub fn from_json_string(json: &str) -> ProjectResult<TimelineSnapshot> {
    let mut value: serde_json::Value = serde_json::from_str(json)?;

    let stored_version = migrate_snapshot(&mut value)?;
    let snapshot: TimelineSnapshot = serde_json::from_value(value)?;

    debug!(
        stored_version,
        tracks = snapshot.tracks.len(),
        keyframes = snapshot.order_keyframes.len(),
        "Deserialized timeline from JSON"
    );

    validate_snapshot(&snapshot)?;
    Ok(snapshot)
}

/// Load a snapshot from `path`. A missing file yields `Ok(None)`.
pub fn load_snapshot(path: &Path) -> ProjectResult<Option<TimelineSnapshot>> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No stored timeline");
            return Ok(None);
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read timeline file");
            return Err(ProjectError::Io(e));
        }
    };

    let snapshot = from_json_string(&json)?;
    info!(
        path = %path.display(),
        tracks = snapshot.tracks.len(),
        "Timeline loaded"
    );
    Ok(Some(snapshot))
}

/// Reject documents the clamp-and-sort pass cannot repair.
fn validate_snapshot(snapshot: &TimelineSnapshot) -> ProjectResult<()> {
    if !snapshot.total_duration_ms.is_finite() || snapshot.total_duration_ms <= 0.0 {
        return Err(ProjectError::InvalidSnapshot {
            reason: format!("invalid total duration: {}", snapshot.total_duration_ms),
        });
    }

    for (input_id, track) in &snapshot.tracks {
        if &track.input_id != input_id {
            warn!(
                key = %input_id,
                track_input = %track.input_id,
                "Track keyed under a different input id"
            );
            return Err(ProjectError::InvalidSnapshot {
                reason: format!("track {input_id} names input {}", track.input_id),
            });
        }
    }

    Ok(())
}
