//! `rl-timeline` — The structural timeline model for a live compositing room.
//!
//! This crate answers "which input is visible during which window, and in
//! what stacking order". It provides:
//!
//! - **Model**: `Segment`, `Track`, `OrderKeyframe`, `TimelineState`
//! - **Reducer**: `TimelineAction` transitions with invariant-preserving clamping
//! - **Evaluation**: desired visibility and active order at a playhead, and the
//!   sorted list of upcoming `PlaybackEvent`s
//!
//! # Usage
//!
//! ```rust
//! use rl_common::{InputId, TimelineConfig};
//! use rl_timeline::{compute_desired_state, reduce, TimelineAction, TimelineState};
//!
//! let config = TimelineConfig::default();
//! let state = TimelineState::new(&config);
//! let state = reduce(
//!     &state,
//!     &TimelineAction::SyncTracks { inputs: vec![InputId::from("cam-1")] },
//!     &config,
//! );
//! assert!(compute_desired_state(&state)[&InputId::from("cam-1")]);
//! ```

pub mod evaluator;
pub mod reducer;
pub mod types;

// Re-export primary API
pub use evaluator::{
    active_order, compile_events, compute_desired_state, desired_state_at, order_at,
    DesiredState, PlaybackEvent, PlaybackEventKind,
};
pub use reducer::{apply, normalize, reduce, SegmentEdge, TimelineAction};
pub use types::{new_keyframe_id, new_segment_id, OrderKeyframe, Segment, TimelineState, Track};
