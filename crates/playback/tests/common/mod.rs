//! Shared fixtures for the playback integration tests.

#![allow(dead_code)]

use rl_app_state::{TimelineSnapshot, TimelineStore};
use rl_common::{InputId, TimelineConfig};
use rl_playback::RoomState;
use rl_timeline::{SegmentEdge, TimelineAction};

pub fn ids(names: &[&str]) -> Vec<InputId> {
    names.iter().map(|n| InputId::from(*n)).collect()
}

pub fn id(name: &str) -> InputId {
    InputId::from(name)
}

/// Install a test-friendly subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn room_state() -> RoomState {
    RoomState::visible(ids(&["a", "b"]))
}

/// A 10s timeline over inputs a and b:
/// - a visible throughout
/// - b visible in [2000, 5000)
/// - order [a, b] from 0, [b, a] from 3000
pub fn fixture_store() -> TimelineStore {
    let mut store = TimelineStore::new(TimelineConfig::default());
    store.dispatch(&TimelineAction::SetTotalDuration { ms: 10_000.0 });
    store.dispatch(&TimelineAction::SyncTracks {
        inputs: ids(&["a", "b"]),
    });
    let seg = store.state().tracks[&id("b")].segments[0].id.clone();
    store.dispatch(&TimelineAction::ResizeSegment {
        input_id: id("b"),
        segment_id: seg.clone(),
        edge: SegmentEdge::Start,
        new_ms: 2_000.0,
    });
    store.dispatch(&TimelineAction::ResizeSegment {
        input_id: id("b"),
        segment_id: seg,
        edge: SegmentEdge::End,
        new_ms: 5_000.0,
    });
    store.dispatch(&TimelineAction::AddOrderKeyframe {
        time_ms: 3_000.0,
        input_order: ids(&["b", "a"]),
    });
    store
}

pub fn fixture_snapshot() -> TimelineSnapshot {
    fixture_store().snapshot()
}
