//! Timeline reducer: every edit to a `TimelineState` goes through here.
//!
//! `reduce()` is the pure `(state, action) -> state'` form; `apply()` is the
//! in-place form used by the store, which returns whether anything changed.
//! Edits that would break an invariant (overlap, minimum duration, removing
//! the t=0 keyframe) are rejected by leaving the state untouched.

use std::collections::BTreeSet;

use rl_common::{InputId, TimelineConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{new_segment_id, OrderKeyframe, Segment, TimelineState, Track};

/// Which edge of a segment a resize drags.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentEdge {
    Start,
    End,
}

/// A single transition of the timeline state machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineAction {
    /// Reconcile tracks with the currently live inputs.
    SyncTracks { inputs: Vec<InputId> },
    SetPlayhead { ms: f64 },
    SetPlaying { playing: bool },
    SetZoom { pixels_per_second: f64 },
    SetTotalDuration { ms: f64 },
    /// Discard everything and start over with full-width tracks.
    Reset { inputs: Vec<InputId> },
    MoveSegment {
        input_id: InputId,
        segment_id: String,
        new_start_ms: f64,
    },
    ResizeSegment {
        input_id: InputId,
        segment_id: String,
        edge: SegmentEdge,
        new_ms: f64,
    },
    SplitSegment {
        input_id: InputId,
        segment_id: String,
        at_ms: f64,
    },
    DeleteSegment {
        input_id: InputId,
        segment_id: String,
    },
    DuplicateSegment {
        input_id: InputId,
        segment_id: String,
    },
    AddOrderKeyframe {
        time_ms: f64,
        input_order: Vec<InputId>,
    },
    UpdateOrderKeyframe {
        keyframe_id: String,
        time_ms: Option<f64>,
        input_order: Option<Vec<InputId>>,
    },
    RemoveOrderKeyframe { keyframe_id: String },
}

impl TimelineAction {
    /// Structural actions are recorded in undo history.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            TimelineAction::SyncTracks { .. }
                | TimelineAction::SetPlayhead { .. }
                | TimelineAction::SetPlaying { .. }
                | TimelineAction::SetZoom { .. }
        )
    }

    /// Whether the action can change tracks or keyframes.
    pub fn touches_structure(&self) -> bool {
        self.is_structural() || matches!(self, TimelineAction::SyncTracks { .. })
    }

    /// Human-readable label, used for history entries.
    pub fn label(&self) -> &'static str {
        match self {
            TimelineAction::SyncTracks { .. } => "Sync tracks",
            TimelineAction::SetPlayhead { .. } => "Set playhead",
            TimelineAction::SetPlaying { .. } => "Set playing",
            TimelineAction::SetZoom { .. } => "Zoom",
            TimelineAction::SetTotalDuration { .. } => "Change duration",
            TimelineAction::Reset { .. } => "Reset timeline",
            TimelineAction::MoveSegment { .. } => "Move segment",
            TimelineAction::ResizeSegment { .. } => "Resize segment",
            TimelineAction::SplitSegment { .. } => "Split segment",
            TimelineAction::DeleteSegment { .. } => "Delete segment",
            TimelineAction::DuplicateSegment { .. } => "Duplicate segment",
            TimelineAction::AddOrderKeyframe { .. } => "Add order keyframe",
            TimelineAction::UpdateOrderKeyframe { .. } => "Update order keyframe",
            TimelineAction::RemoveOrderKeyframe { .. } => "Remove order keyframe",
        }
    }
}

/// Pure transition: returns the next state, or an unchanged copy when the
/// action is rejected.
pub fn reduce(
    state: &TimelineState,
    action: &TimelineAction,
    config: &TimelineConfig,
) -> TimelineState {
    let mut next = state.clone();
    if apply(&mut next, action, config) {
        next
    } else {
        state.clone()
    }
}

/// Apply `action` in place. Returns `true` if the state changed.
///
/// A rejected action leaves `state` exactly as it was.
pub fn apply(state: &mut TimelineState, action: &TimelineAction, config: &TimelineConfig) -> bool {
    let changed = match action {
        TimelineAction::SyncTracks { inputs } => sync_tracks(state, inputs),
        TimelineAction::SetPlayhead { ms } => set_playhead(state, *ms),
        TimelineAction::SetPlaying { playing } => {
            let changed = state.is_playing != *playing;
            state.is_playing = *playing;
            changed
        }
        TimelineAction::SetZoom { pixels_per_second } => {
            set_zoom(state, *pixels_per_second, config)
        }
        TimelineAction::SetTotalDuration { ms } => set_total_duration(state, *ms, config),
        TimelineAction::Reset { inputs } => {
            reset(state, inputs);
            true
        }
        TimelineAction::MoveSegment {
            input_id,
            segment_id,
            new_start_ms,
        } => move_segment(state, input_id, segment_id, *new_start_ms),
        TimelineAction::ResizeSegment {
            input_id,
            segment_id,
            edge,
            new_ms,
        } => resize_segment(state, input_id, segment_id, *edge, *new_ms, config),
        TimelineAction::SplitSegment {
            input_id,
            segment_id,
            at_ms,
        } => split_segment(state, input_id, segment_id, *at_ms, config),
        TimelineAction::DeleteSegment {
            input_id,
            segment_id,
        } => delete_segment(state, input_id, segment_id),
        TimelineAction::DuplicateSegment {
            input_id,
            segment_id,
        } => duplicate_segment(state, input_id, segment_id),
        TimelineAction::AddOrderKeyframe {
            time_ms,
            input_order,
        } => add_order_keyframe(state, *time_ms, input_order, config),
        TimelineAction::UpdateOrderKeyframe {
            keyframe_id,
            time_ms,
            input_order,
        } => update_order_keyframe(state, keyframe_id, *time_ms, input_order.as_deref(), config),
        TimelineAction::RemoveOrderKeyframe { keyframe_id } => {
            remove_order_keyframe(state, keyframe_id)
        }
    };

    if !changed {
        debug!(action = action.label(), "Timeline action had no effect");
        return false;
    }

    if action.touches_structure() {
        normalize(state, config);
    }

    debug!(
        action = action.label(),
        tracks = state.tracks.len(),
        segments = state.total_segments(),
        keyframes = state.order_keyframes.len(),
        "Timeline action applied"
    );
    true
}

/// Clamp-and-sort pass. Restores every invariant of `TimelineState`:
/// duration floor, playhead/zoom ranges, sorted non-overlapping segments of at
/// least the minimum length, and sorted, epsilon-merged keyframes with one at 0.
pub fn normalize(state: &mut TimelineState, config: &TimelineConfig) {
    if !state.total_duration_ms.is_finite()
        || state.total_duration_ms < config.min_total_duration_ms
    {
        state.total_duration_ms = config.min_total_duration_ms;
    }
    let total = state.total_duration_ms;

    state.playhead_ms = clamp_or(state.playhead_ms, 0.0, total, 0.0);
    state.pixels_per_second = clamp_or(
        state.pixels_per_second,
        config.min_pixels_per_second,
        config.max_pixels_per_second,
        config.default_pixels_per_second,
    );

    for track in state.tracks.values_mut() {
        normalize_segments(&mut track.segments, total, config.min_segment_ms);
    }
    normalize_keyframes(
        &mut state.order_keyframes,
        total,
        config.keyframe_merge_epsilon_ms,
    );
}

fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback.clamp(min, max)
    }
}

fn normalize_segments(segments: &mut Vec<Segment>, total: f64, min_ms: f64) {
    segments.retain(|s| s.start_ms.is_finite() && s.end_ms.is_finite());
    for seg in segments.iter_mut() {
        seg.start_ms = seg.start_ms.clamp(0.0, total);
        seg.end_ms = seg.end_ms.clamp(0.0, total);
    }
    segments.sort_by(|a, b| a.start_ms.total_cmp(&b.start_ms));

    let mut prev_end = 0.0_f64;
    segments.retain_mut(|seg| {
        if seg.start_ms < prev_end {
            seg.start_ms = prev_end;
        }
        if seg.duration_ms() >= min_ms {
            prev_end = seg.end_ms;
            true
        } else {
            debug!(segment_id = %seg.id, "Dropping segment below minimum duration");
            false
        }
    });
}

fn normalize_keyframes(keyframes: &mut Vec<OrderKeyframe>, total: f64, epsilon: f64) {
    let mut indexed: Vec<(usize, OrderKeyframe)> = keyframes
        .drain(..)
        .filter(|k| k.time_ms.is_finite())
        .enumerate()
        .map(|(i, mut k)| {
            k.time_ms = k.time_ms.clamp(0.0, total);
            (i, k)
        })
        .collect();
    indexed.sort_by(|a, b| a.1.time_ms.total_cmp(&b.1.time_ms).then(a.0.cmp(&b.0)));

    // Within one epsilon window the keyframe written last (highest index) wins.
    let mut merged: Vec<(usize, OrderKeyframe)> = Vec::with_capacity(indexed.len());
    for (idx, kf) in indexed {
        if let Some((last_idx, last)) = merged.last_mut() {
            if kf.time_ms - last.time_ms <= epsilon {
                if idx > *last_idx {
                    last.input_order = kf.input_order;
                    *last_idx = idx;
                }
                continue;
            }
        }
        merged.push((idx, kf));
    }
    *keyframes = merged.into_iter().map(|(_, k)| k).collect();

    let first_time = keyframes.first().map(|k| k.time_ms);
    if let Some(first_time) = first_time {
        if first_time > 0.0 && first_time <= epsilon {
            keyframes[0].time_ms = 0.0;
        } else if first_time > 0.0 {
            let order = keyframes[0].input_order.clone();
            keyframes.insert(0, OrderKeyframe::new(0.0, order));
        }
    }
}

/// Deduplicate while keeping first-seen order.
fn unique_inputs(inputs: &[InputId]) -> Vec<InputId> {
    let mut seen = BTreeSet::new();
    inputs
        .iter()
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect()
}

fn sync_tracks(state: &mut TimelineState, inputs: &[InputId]) -> bool {
    let inputs = unique_inputs(inputs);
    let live: BTreeSet<&InputId> = inputs.iter().collect();
    let total = state.total_duration_ms;
    let mut changed = false;

    let before = state.tracks.len();
    state.tracks.retain(|id, _| live.contains(id));
    if state.tracks.len() != before {
        debug!(dropped = before - state.tracks.len(), "Dropped tracks for departed inputs");
        changed = true;
    }

    for id in &inputs {
        if !state.tracks.contains_key(id) {
            debug!(input_id = %id, "Creating track for new input");
            state.tracks.insert(id.clone(), Track::full(id.clone(), total));
            changed = true;
        }
    }

    for kf in &mut state.order_keyframes {
        let len = kf.input_order.len();
        kf.input_order.retain(|id| live.contains(id));
        let mut order = unique_inputs(&kf.input_order);
        for id in &inputs {
            if !order.contains(id) {
                order.push(id.clone());
            }
        }
        if order.len() != len || order != kf.input_order {
            kf.input_order = order;
            changed = true;
        }
    }

    if !state.order_keyframes.iter().any(|k| k.time_ms == 0.0) {
        state
            .order_keyframes
            .insert(0, OrderKeyframe::new(0.0, inputs.clone()));
        changed = true;
    }

    changed
}

fn set_playhead(state: &mut TimelineState, ms: f64) -> bool {
    if !ms.is_finite() {
        return false;
    }
    let clamped = ms.clamp(0.0, state.total_duration_ms);
    let changed = clamped != state.playhead_ms;
    state.playhead_ms = clamped;
    changed
}

fn set_zoom(state: &mut TimelineState, pps: f64, config: &TimelineConfig) -> bool {
    if !pps.is_finite() {
        return false;
    }
    let clamped = pps.clamp(config.min_pixels_per_second, config.max_pixels_per_second);
    let changed = clamped != state.pixels_per_second;
    state.pixels_per_second = clamped;
    changed
}

fn set_total_duration(state: &mut TimelineState, ms: f64, config: &TimelineConfig) -> bool {
    if !ms.is_finite() {
        return false;
    }
    let total = ms.max(config.min_total_duration_ms);
    if total == state.total_duration_ms {
        return false;
    }
    state.total_duration_ms = total;
    state.playhead_ms = state.playhead_ms.clamp(0.0, total);
    true
}

fn reset(state: &mut TimelineState, inputs: &[InputId]) {
    let inputs = unique_inputs(inputs);
    let total = state.total_duration_ms;
    state.tracks = inputs
        .iter()
        .map(|id| (id.clone(), Track::full(id.clone(), total)))
        .collect();
    state.order_keyframes = vec![OrderKeyframe::new(0.0, inputs)];
}

fn move_segment(
    state: &mut TimelineState,
    input_id: &InputId,
    segment_id: &str,
    new_start_ms: f64,
) -> bool {
    if !new_start_ms.is_finite() {
        return false;
    }
    let total = state.total_duration_ms;
    let Some(track) = state.tracks.get_mut(input_id) else {
        return false;
    };
    let Some(idx) = track.segment_index(segment_id) else {
        return false;
    };

    let duration = track.segments[idx].duration_ms();
    let lower = if idx > 0 {
        track.segments[idx - 1].end_ms
    } else {
        0.0
    };
    let upper = match track.segments.get(idx + 1) {
        Some(next) => next.start_ms - duration,
        None => total - duration,
    };
    if upper < lower {
        return false;
    }

    let start = new_start_ms.clamp(lower, upper);
    let seg = &mut track.segments[idx];
    if start == seg.start_ms {
        return false;
    }
    seg.start_ms = start;
    seg.end_ms = start + duration;
    true
}

fn resize_segment(
    state: &mut TimelineState,
    input_id: &InputId,
    segment_id: &str,
    edge: SegmentEdge,
    new_ms: f64,
    config: &TimelineConfig,
) -> bool {
    if !new_ms.is_finite() {
        return false;
    }
    let total = state.total_duration_ms;
    let Some(track) = state.tracks.get_mut(input_id) else {
        return false;
    };
    let Some(idx) = track.segment_index(segment_id) else {
        return false;
    };

    let (start, end) = (track.segments[idx].start_ms, track.segments[idx].end_ms);
    let (lower, upper) = match edge {
        SegmentEdge::Start => {
            let prev_end = if idx > 0 {
                track.segments[idx - 1].end_ms
            } else {
                0.0
            };
            (prev_end, end - config.min_segment_ms)
        }
        SegmentEdge::End => {
            let next_start = track.segments.get(idx + 1).map_or(total, |n| n.start_ms);
            (start + config.min_segment_ms, next_start)
        }
    };
    if upper < lower {
        return false;
    }

    let value = new_ms.clamp(lower, upper);
    let seg = &mut track.segments[idx];
    let field = match edge {
        SegmentEdge::Start => &mut seg.start_ms,
        SegmentEdge::End => &mut seg.end_ms,
    };
    if *field == value {
        return false;
    }
    *field = value;
    true
}

fn split_segment(
    state: &mut TimelineState,
    input_id: &InputId,
    segment_id: &str,
    at_ms: f64,
    config: &TimelineConfig,
) -> bool {
    let Some(track) = state.tracks.get_mut(input_id) else {
        return false;
    };
    let Some(idx) = track.segment_index(segment_id) else {
        return false;
    };

    let seg = &track.segments[idx];
    if !(at_ms - seg.start_ms >= config.min_segment_ms
        && seg.end_ms - at_ms >= config.min_segment_ms)
    {
        debug!(segment_id, at_ms, "Split rejected: piece below minimum duration");
        return false;
    }

    let right = Segment::new(new_segment_id(), at_ms, seg.end_ms);
    track.segments[idx].end_ms = at_ms;
    track.segments.insert(idx + 1, right);
    true
}

fn delete_segment(state: &mut TimelineState, input_id: &InputId, segment_id: &str) -> bool {
    let Some(track) = state.tracks.get_mut(input_id) else {
        return false;
    };
    let Some(idx) = track.segment_index(segment_id) else {
        return false;
    };
    track.segments.remove(idx);
    true
}

fn duplicate_segment(state: &mut TimelineState, input_id: &InputId, segment_id: &str) -> bool {
    let total = state.total_duration_ms;
    let Some(track) = state.tracks.get_mut(input_id) else {
        return false;
    };
    let Some(idx) = track.segment_index(segment_id) else {
        return false;
    };

    let seg = &track.segments[idx];
    let start = seg.end_ms;
    let end = start + seg.duration_ms();
    if end > total {
        debug!(segment_id, "Duplicate rejected: exceeds timeline duration");
        return false;
    }
    if track.segments.get(idx + 1).is_some_and(|next| next.start_ms < end) {
        debug!(segment_id, "Duplicate rejected: would overlap next segment");
        return false;
    }

    track
        .segments
        .insert(idx + 1, Segment::new(new_segment_id(), start, end));
    true
}

/// Index of the keyframe closest to `time_ms` within the merge window.
fn keyframe_near(
    keyframes: &[OrderKeyframe],
    time_ms: f64,
    epsilon: f64,
    skip: Option<usize>,
) -> Option<usize> {
    keyframes
        .iter()
        .enumerate()
        .filter(|(i, k)| Some(*i) != skip && (k.time_ms - time_ms).abs() <= epsilon)
        .min_by(|(_, a), (_, b)| {
            (a.time_ms - time_ms)
                .abs()
                .total_cmp(&(b.time_ms - time_ms).abs())
        })
        .map(|(i, _)| i)
}

fn add_order_keyframe(
    state: &mut TimelineState,
    time_ms: f64,
    input_order: &[InputId],
    config: &TimelineConfig,
) -> bool {
    if !time_ms.is_finite() {
        return false;
    }
    let time_ms = time_ms.clamp(0.0, state.total_duration_ms);
    let order = unique_inputs(input_order);

    if let Some(idx) = keyframe_near(
        &state.order_keyframes,
        time_ms,
        config.keyframe_merge_epsilon_ms,
        None,
    ) {
        let existing = &mut state.order_keyframes[idx];
        if existing.input_order == order {
            return false;
        }
        debug!(keyframe_id = %existing.id, time_ms, "Merging into existing order keyframe");
        existing.input_order = order;
        return true;
    }

    state
        .order_keyframes
        .push(OrderKeyframe::new(time_ms, order));
    state
        .order_keyframes
        .sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
    true
}

fn update_order_keyframe(
    state: &mut TimelineState,
    keyframe_id: &str,
    time_ms: Option<f64>,
    input_order: Option<&[InputId]>,
    config: &TimelineConfig,
) -> bool {
    let Some(idx) = state.keyframe_index(keyframe_id) else {
        return false;
    };
    let total = state.total_duration_ms;
    let mut changed = false;

    if let Some(order) = input_order {
        let order = unique_inputs(order);
        if state.order_keyframes[idx].input_order != order {
            state.order_keyframes[idx].input_order = order;
            changed = true;
        }
    }

    // The origin keyframe stays pinned at 0.
    let is_origin = state.order_keyframes[idx].time_ms == 0.0;
    let new_time = time_ms
        .filter(|t| t.is_finite() && !is_origin)
        .map(|t| t.clamp(0.0, total));
    let Some(new_time) = new_time else {
        return changed;
    };
    if new_time == state.order_keyframes[idx].time_ms {
        return changed;
    }
    state.order_keyframes[idx].time_ms = new_time;

    // The updated keyframe wins over any neighbour it now collides with.
    while let Some(other) = keyframe_near(
        &state.order_keyframes,
        new_time,
        config.keyframe_merge_epsilon_ms,
        state.keyframe_index(keyframe_id),
    ) {
        let Some(updated_idx) = state.keyframe_index(keyframe_id) else {
            break;
        };
        if state.order_keyframes[other].time_ms == 0.0 {
            let order = state.order_keyframes[updated_idx].input_order.clone();
            state.order_keyframes[other].input_order = order;
            state.order_keyframes.remove(updated_idx);
            break;
        }
        state.order_keyframes.remove(other);
    }

    state
        .order_keyframes
        .sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
    true
}

fn remove_order_keyframe(state: &mut TimelineState, keyframe_id: &str) -> bool {
    let Some(idx) = state.keyframe_index(keyframe_id) else {
        return false;
    };
    if state.order_keyframes[idx].time_ms == 0.0 {
        debug!(keyframe_id, "Refusing to remove the origin keyframe");
        return false;
    }
    state.order_keyframes.remove(idx);
    true
}
