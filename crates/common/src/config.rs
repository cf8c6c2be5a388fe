//! Configuration structs for the timeline, scheduler, and persistence layers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Structural limits and view ranges for the timeline model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Shortest allowed segment, in milliseconds.
    pub min_segment_ms: f64,
    /// Order keyframes closer than this are treated as the same point.
    pub keyframe_merge_epsilon_ms: f64,
    pub min_pixels_per_second: f64,
    pub max_pixels_per_second: f64,
    pub default_pixels_per_second: f64,
    /// Floor applied by `SET_TOTAL_DURATION`.
    pub min_total_duration_ms: f64,
    pub default_total_duration_ms: f64,
    /// Maximum number of undo steps kept.
    pub history_depth: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            min_segment_ms: 1000.0,
            keyframe_merge_epsilon_ms: 50.0,
            min_pixels_per_second: 10.0,
            max_pixels_per_second: 500.0,
            default_pixels_per_second: 50.0,
            min_total_duration_ms: 10_000.0,
            default_total_duration_ms: 60_000.0,
            history_depth: 50,
        }
    }
}

/// Playback scheduler timing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval of the per-frame playhead loop (16ms is roughly 60Hz).
    pub frame_interval_ms: u64,
}

impl SchedulerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
        }
    }
}

/// Timeline persistence settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Delay after the last change before a save is issued.
    pub save_debounce_ms: u64,
    /// Directory holding one JSON document per room.
    pub storage_dir: PathBuf,
}

impl PersistenceConfig {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 500,
            storage_dir: PathBuf::from("timelines"),
        }
    }
}

/// Everything a room session needs, grouped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub timeline: TimelineConfig,
    pub scheduler: SchedulerConfig,
    pub persistence: PersistenceConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let cfg = TimelineConfig::default();
        assert!(cfg.min_pixels_per_second < cfg.max_pixels_per_second);
        assert!(cfg.default_pixels_per_second >= cfg.min_pixels_per_second);
        assert!(cfg.default_pixels_per_second <= cfg.max_pixels_per_second);
        assert!(cfg.default_total_duration_ms >= cfg.min_total_duration_ms);
        assert_eq!(cfg.keyframe_merge_epsilon_ms, 50.0);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: SessionConfig =
            serde_json::from_str(r#"{"timeline":{"min_segment_ms":500.0}}"#).unwrap();
        assert_eq!(cfg.timeline.min_segment_ms, 500.0);
        assert_eq!(cfg.timeline.history_depth, 50);
        assert_eq!(cfg.scheduler.frame_interval_ms, 16);
        assert_eq!(cfg.persistence.save_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn frame_interval_never_zero() {
        let cfg = SchedulerConfig {
            frame_interval_ms: 0,
        };
        assert_eq!(cfg.frame_interval(), Duration::from_millis(1));
    }
}
