//! Timeline data model types: Segment, Track, OrderKeyframe, TimelineState.
//!
//! These describe *which* room input is visible during *which* time window,
//! and in what stacking order. The reducer edits them; the evaluator turns
//! them into desired visibility and playback events.

use std::collections::BTreeMap;

use rl_common::{InputId, TimelineConfig};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a fresh segment identifier.
pub fn new_segment_id() -> String {
    format!("seg_{}", Uuid::new_v4().simple())
}

/// Generate a fresh order keyframe identifier.
pub fn new_keyframe_id() -> String {
    format!("kf_{}", Uuid::new_v4().simple())
}

/// A contiguous window `[start_ms, end_ms)` during which an input is visible.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub start_ms: f64,
    pub end_ms: f64,
}

impl Segment {
    pub fn new(id: impl Into<String>, start_ms: f64, end_ms: f64) -> Self {
        Self {
            id: id.into(),
            start_ms,
            end_ms,
        }
    }

    /// A segment spanning the whole timeline, with a fresh id.
    pub fn full(total_duration_ms: f64) -> Self {
        Self::new(new_segment_id(), 0.0, total_duration_ms)
    }

    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }

    /// Whether `time_ms` falls inside the half-open window.
    pub fn is_active_at(&self, time_ms: f64) -> bool {
        self.start_ms <= time_ms && time_ms < self.end_ms
    }
}

/// The ordered, non-overlapping segment list of one input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub input_id: InputId,
    /// Sorted by `start_ms`, pairwise non-overlapping.
    pub segments: Vec<Segment>,
}

impl Track {
    /// A track with one segment covering the whole timeline.
    pub fn full(input_id: InputId, total_duration_ms: f64) -> Self {
        Self {
            input_id,
            segments: vec![Segment::full(total_duration_ms)],
        }
    }

    pub fn segment_index(&self, segment_id: &str) -> Option<usize> {
        self.segments.iter().position(|s| s.id == segment_id)
    }

    /// Whether any segment covers `time_ms`.
    pub fn is_visible_at(&self, time_ms: f64) -> bool {
        self.segments.iter().any(|s| s.is_active_at(time_ms))
    }
}

/// Stacking order of inputs, effective from `time_ms` until the next keyframe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderKeyframe {
    pub id: String,
    pub time_ms: f64,
    pub input_order: Vec<InputId>,
}

impl OrderKeyframe {
    pub fn new(time_ms: f64, input_order: Vec<InputId>) -> Self {
        Self {
            id: new_keyframe_id(),
            time_ms,
            input_order,
        }
    }
}

/// Complete editable timeline plus view and transport fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineState {
    /// One track per live input.
    pub tracks: BTreeMap<InputId, Track>,
    /// Sorted by `time_ms`; the first one sits at 0 whenever any exist.
    pub order_keyframes: Vec<OrderKeyframe>,
    pub total_duration_ms: f64,
    /// Always within `[0, total_duration_ms]`.
    pub playhead_ms: f64,
    pub is_playing: bool,
    /// Zoom level. View-only, never read by playback.
    pub pixels_per_second: f64,
}

impl TimelineState {
    /// An empty timeline sized from the config defaults.
    pub fn new(config: &TimelineConfig) -> Self {
        Self {
            tracks: BTreeMap::new(),
            order_keyframes: Vec::new(),
            total_duration_ms: config.default_total_duration_ms,
            playhead_ms: 0.0,
            is_playing: false,
            pixels_per_second: config.default_pixels_per_second,
        }
    }

    pub fn track(&self, input_id: &InputId) -> Option<&Track> {
        self.tracks.get(input_id)
    }

    pub fn keyframe_index(&self, keyframe_id: &str) -> Option<usize> {
        self.order_keyframes.iter().position(|k| k.id == keyframe_id)
    }

    pub fn total_segments(&self) -> usize {
        self.tracks.values().map(|t| t.segments.len()).sum()
    }

    /// Whether the structural content (tracks, keyframes, duration) of two
    /// states is identical, ignoring playhead, zoom, and transport.
    pub fn same_structure(&self, other: &TimelineState) -> bool {
        self.tracks == other.tracks
            && self.order_keyframes == other.order_keyframes
            && self.total_duration_ms == other.total_duration_ms
    }
}
