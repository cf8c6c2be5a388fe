//! Version migration: upgrades older timeline documents to the current format.
//!
//! Version 0 documents predate the `version` field. They may lack
//! `pixelsPerSecond` and `playheadMs`, and may store tracks as an array
//! instead of a map keyed by input id.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use rl_app_state::SNAPSHOT_VERSION;
use rl_common::TimelineConfig;

use crate::error::{ProjectError, ProjectResult};

/// Migrate a timeline JSON value to the current version in place.
///
/// Returns the version the document was stored with.
pub fn migrate_snapshot(value: &mut Value) -> ProjectResult<u32> {
    let obj = value
        .as_object_mut()
        .ok_or_else(|| ProjectError::InvalidSnapshot {
            reason: "timeline root must be a JSON object".into(),
        })?;

    let version = extract_version(obj)?;

    if version > SNAPSHOT_VERSION {
        return Err(ProjectError::UnsupportedVersion {
            version: version.to_string(),
        });
    }

    if version == SNAPSHOT_VERSION {
        debug!(version, "Timeline is at current version, no migration needed");
        return Ok(version);
    }

    let mut current = version;
    while current < SNAPSHOT_VERSION {
        info!(from = current, to = current + 1, "Migrating timeline");
        match current {
            0 => migrate_v0_to_v1(obj)?,
            other => {
                return Err(ProjectError::MigrationFailed {
                    from: other.to_string(),
                    to: (other + 1).to_string(),
                    reason: format!("no migration path from version {other}"),
                });
            }
        }
        current += 1;
    }

    obj.insert("version".to_string(), Value::Number(SNAPSHOT_VERSION.into()));
    Ok(version)
}

fn extract_version(obj: &Map<String, Value>) -> ProjectResult<u32> {
    match obj.get("version") {
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| ProjectError::InvalidSnapshot {
                reason: "version must be a non-negative integer".into(),
            }),
        Some(Value::String(s)) => s.parse::<u32>().map_err(|_| ProjectError::InvalidSnapshot {
            reason: format!("cannot parse version string: {s}"),
        }),
        Some(_) => Err(ProjectError::InvalidSnapshot {
            reason: "version field has unexpected type".into(),
        }),
        None => {
            warn!("Timeline has no version field, assuming version 0");
            Ok(0)
        }
    }
}

fn migrate_v0_to_v1(obj: &mut Map<String, Value>) -> ProjectResult<()> {
    let defaults = TimelineConfig::default();

    match obj.remove("tracks") {
        None | Some(Value::Null) => {
            obj.insert("tracks".to_string(), Value::Object(Map::new()));
        }
        Some(Value::Object(map)) => {
            obj.insert("tracks".to_string(), Value::Object(map));
        }
        // Early documents stored tracks as a list; key them by input id.
        Some(Value::Array(list)) => {
            let mut map = Map::new();
            for track in list {
                let Some(input_id) = track.get("inputId").and_then(Value::as_str) else {
                    return Err(ProjectError::MigrationFailed {
                        from: "0".into(),
                        to: "1".into(),
                        reason: "track entry without inputId".into(),
                    });
                };
                map.insert(input_id.to_string(), track);
            }
            obj.insert("tracks".to_string(), Value::Object(map));
        }
        Some(_) => {
            return Err(ProjectError::MigrationFailed {
                from: "0".into(),
                to: "1".into(),
                reason: "tracks has unexpected type".into(),
            });
        }
    }

    ensure_field(obj, "orderKeyframes", Value::Array(Vec::new()));
    ensure_number(obj, "totalDurationMs", defaults.default_total_duration_ms);
    ensure_number(obj, "playheadMs", 0.0);
    ensure_number(obj, "pixelsPerSecond", defaults.default_pixels_per_second);
    Ok(())
}

fn ensure_field(obj: &mut Map<String, Value>, key: &str, default: Value) {
    if obj.get(key).map_or(true, Value::is_null) {
        obj.insert(key.to_string(), default);
    }
}

fn ensure_number(obj: &mut Map<String, Value>, key: &str, default: f64) {
    if let Some(n) = serde_json::Number::from_f64(default) {
        ensure_field(obj, key, Value::Number(n));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn current_version_untouched() {
        let mut value = json!({
            "version": 1,
            "tracks": {},
            "orderKeyframes": [],
            "totalDurationMs": 20000.0,
            "playheadMs": 0.0,
            "pixelsPerSecond": 120.0
        });
        let before = value.clone();
        assert_eq!(migrate_snapshot(&mut value).expect("migrate"), 1);
        assert_eq!(value, before);
    }

    #[test]
    fn future_version_rejected() {
        let mut value = json!({ "version": 7 });
        let err = migrate_snapshot(&mut value).unwrap_err();
        assert!(matches!(err, ProjectError::UnsupportedVersion { .. }));
    }

    #[test]
    fn v0_fills_missing_view_fields() {
        let mut value = json!({
            "tracks": {},
            "orderKeyframes": [],
            "totalDurationMs": 30000.0
        });
        assert_eq!(migrate_snapshot(&mut value).expect("migrate"), 0);
        assert_eq!(value["version"], 1);
        assert_eq!(value["pixelsPerSecond"], 50.0);
        assert_eq!(value["playheadMs"], 0.0);
        assert_eq!(value["totalDurationMs"], 30000.0);
    }

    #[test]
    fn v0_keys_track_list_by_input() {
        let mut value = json!({
            "tracks": [
                { "inputId": "cam", "segments": [] },
                { "inputId": "screen", "segments": [] }
            ]
        });
        migrate_snapshot(&mut value).expect("migrate");
        let tracks = value["tracks"].as_object().expect("object");
        assert!(tracks.contains_key("cam"));
        assert!(tracks.contains_key("screen"));
    }

    #[test]
    fn v0_track_without_input_fails() {
        let mut value = json!({ "tracks": [{ "segments": [] }] });
        let err = migrate_snapshot(&mut value).unwrap_err();
        assert!(matches!(err, ProjectError::MigrationFailed { .. }));
    }

    #[test]
    fn version_string_parsed() {
        let mut value = json!({ "version": "1" });
        assert_eq!(migrate_snapshot(&mut value).expect("migrate"), 1);
    }

    #[test]
    fn non_object_root_rejected() {
        let mut value = json!([1, 2, 3]);
        let err = migrate_snapshot(&mut value).unwrap_err();
        assert!(matches!(err, ProjectError::InvalidSnapshot { .. }));
    }
}
