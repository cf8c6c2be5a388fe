//! Serializable timeline snapshot for persistence.
//!
//! `TimelineSnapshot` is the exact document handed to the persistence adapter:
//! structure plus playhead and zoom. The transport flag (`is_playing`) is
//! deliberately left out, so reloading a room never resumes playback.

use std::collections::BTreeMap;

use rl_common::InputId;
use rl_timeline::{OrderKeyframe, TimelineState, Track};
use serde::{Deserialize, Serialize};

/// Current snapshot document version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persistable subset of a `TimelineState`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSnapshot {
    pub version: u32,
    pub tracks: BTreeMap<InputId, Track>,
    pub order_keyframes: Vec<OrderKeyframe>,
    pub total_duration_ms: f64,
    pub playhead_ms: f64,
    pub pixels_per_second: f64,
}

impl TimelineSnapshot {
    /// Capture a snapshot from the current timeline state.
    pub fn capture(state: &TimelineState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            tracks: state.tracks.clone(),
            order_keyframes: state.order_keyframes.clone(),
            total_duration_ms: state.total_duration_ms,
            playhead_ms: state.playhead_ms,
            pixels_per_second: state.pixels_per_second,
        }
    }

    /// Restore this snapshot into the given timeline state.
    ///
    /// It does NOT change `is_playing`; transport is managed separately.
    pub fn restore(&self, state: &mut TimelineState) {
        state.tracks = self.tracks.clone();
        state.order_keyframes = self.order_keyframes.clone();
        state.total_duration_ms = self.total_duration_ms;
        state.playhead_ms = self.playhead_ms;
        state.pixels_per_second = self.pixels_per_second;

        tracing::debug!(
            tracks = state.tracks.len(),
            segments = state.total_segments(),
            keyframes = state.order_keyframes.len(),
            "Snapshot restored"
        );
    }
}
