//! Timeline evaluation: what the room should look like at a given instant,
//! and which visibility/order changes lie ahead of the playhead.
//!
//! The scheduler consumes these; nothing here talks to the room.

use std::collections::BTreeMap;

use rl_common::InputId;
use serde::{Deserialize, Serialize};

use crate::types::TimelineState;

/// Desired visibility of every tracked input (`true` = shown).
pub type DesiredState = BTreeMap<InputId, bool>;

/// What a playback event asks the room to do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlaybackEventKind {
    /// A segment starts: show the input.
    Connect { input_id: InputId },
    /// A segment ends: hide the input.
    Disconnect { input_id: InputId },
    /// An order keyframe takes effect.
    Order { input_order: Vec<InputId> },
}

impl PlaybackEventKind {
    /// Tie-break for events at the same instant: hides, then shows, then
    /// reorders. Back-to-back segments therefore end up visible.
    fn rank(&self) -> u8 {
        match self {
            PlaybackEventKind::Disconnect { .. } => 0,
            PlaybackEventKind::Connect { .. } => 1,
            PlaybackEventKind::Order { .. } => 2,
        }
    }
}

/// A derived, timestamped change. Never stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEvent {
    pub time_ms: f64,
    pub kind: PlaybackEventKind,
}

/// Desired visibility at the state's own playhead.
pub fn compute_desired_state(state: &TimelineState) -> DesiredState {
    desired_state_at(state, state.playhead_ms)
}

/// Desired visibility at an arbitrary time: an input is visible iff one of its
/// segments satisfies `start_ms <= time_ms < end_ms`.
pub fn desired_state_at(state: &TimelineState, time_ms: f64) -> DesiredState {
    state
        .tracks
        .iter()
        .map(|(id, track)| (id.clone(), track.is_visible_at(time_ms)))
        .collect()
}

/// Stacking order in effect at the state's playhead.
pub fn active_order(state: &TimelineState) -> Option<&[InputId]> {
    order_at(state, state.playhead_ms)
}

/// Order of the last keyframe with `time_ms <= time`, if any.
pub fn order_at(state: &TimelineState, time_ms: f64) -> Option<&[InputId]> {
    state
        .order_keyframes
        .iter()
        .take_while(|k| k.time_ms <= time_ms)
        .last()
        .map(|k| k.input_order.as_slice())
}

/// Every segment boundary and keyframe strictly after `from_ms`, sorted
/// ascending by time.
///
/// Recomputed from scratch on every call: a single edit can move any number
/// of boundaries.
pub fn compile_events(state: &TimelineState, from_ms: f64) -> Vec<PlaybackEvent> {
    let mut events = Vec::with_capacity(state.total_segments() * 2 + state.order_keyframes.len());

    for (input_id, track) in &state.tracks {
        for seg in &track.segments {
            if seg.start_ms > from_ms {
                events.push(PlaybackEvent {
                    time_ms: seg.start_ms,
                    kind: PlaybackEventKind::Connect {
                        input_id: input_id.clone(),
                    },
                });
            }
            if seg.end_ms > from_ms {
                events.push(PlaybackEvent {
                    time_ms: seg.end_ms,
                    kind: PlaybackEventKind::Disconnect {
                        input_id: input_id.clone(),
                    },
                });
            }
        }
    }

    for kf in &state.order_keyframes {
        if kf.time_ms > from_ms {
            events.push(PlaybackEvent {
                time_ms: kf.time_ms,
                kind: PlaybackEventKind::Order {
                    input_order: kf.input_order.clone(),
                },
            });
        }
    }

    events.sort_by(|a, b| {
        a.time_ms
            .total_cmp(&b.time_ms)
            .then(a.kind.rank().cmp(&b.kind.rank()))
    });
    events
}
