//! Undoable timeline store.
//!
//! `TimelineStore` exclusively owns the current `TimelineState` and wraps the
//! reducer with history. Only structural actions are recorded; playhead, zoom,
//! and transport changes mutate the current state without touching history,
//! and undo/redo never roll those fields back.

use rl_common::{InputId, TimelineConfig};
use rl_timeline::{apply, normalize, TimelineAction, TimelineState};

use crate::history::HistoryManager;
use crate::snapshot::TimelineSnapshot;

/// The current timeline plus bounded undo/redo history.
pub struct TimelineStore {
    current: TimelineState,
    history: HistoryManager,
    config: TimelineConfig,
    /// Bumped on every change to tracks or keyframes.
    structure_revision: u64,
    /// Bumped on every change to a persisted field.
    state_revision: u64,
    /// Set once the timeline has been synced, reset, or hydrated.
    initialized: bool,
}

impl TimelineStore {
    pub fn new(config: TimelineConfig) -> Self {
        Self {
            current: TimelineState::new(&config),
            history: HistoryManager::new(config.history_depth),
            config,
            structure_revision: 0,
            state_revision: 0,
            initialized: false,
        }
    }

    /// The current timeline. Callers treat it as an immutable snapshot.
    pub fn state(&self) -> &TimelineState {
        &self.current
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Counter consumed by the playback scheduler to detect edits mid-playback.
    pub fn structure_revision(&self) -> u64 {
        self.structure_revision
    }

    /// Counter consumed by the save debouncer.
    pub fn state_revision(&self) -> u64 {
        self.state_revision
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run `action` through the reducer. Returns `true` if the state changed.
    ///
    /// Structural actions push the pre-edit state onto the undo stack and clear
    /// redo. Rejected edits change nothing, history included.
    pub fn dispatch(&mut self, action: &TimelineAction) -> bool {
        if matches!(
            action,
            TimelineAction::SyncTracks { .. } | TimelineAction::Reset { .. }
        ) {
            self.initialized = true;
        }

        if !action.is_structural() {
            let changed = apply(&mut self.current, action, &self.config);
            if changed {
                if action.touches_structure() {
                    self.structure_revision += 1;
                }
                if !matches!(action, TimelineAction::SetPlaying { .. }) {
                    self.state_revision += 1;
                }
            }
            return changed;
        }

        let before = self.current.clone();
        if !apply(&mut self.current, action, &self.config) {
            return false;
        }

        self.history.push(action.label(), before);
        self.structure_revision += 1;
        self.state_revision += 1;
        tracing::debug!(
            action = action.label(),
            structure_revision = self.structure_revision,
            undo_depth = self.history.undo_count(),
            "Structural edit recorded"
        );
        true
    }

    /// Restore the previous structural snapshot, keeping the current playhead,
    /// zoom, and transport.
    pub fn undo(&mut self) -> bool {
        let Some(restored) = self.history.undo(self.current.clone()) else {
            return false;
        };
        self.install(restored);
        true
    }

    /// Re-apply the last undone structural snapshot, keeping the current
    /// playhead, zoom, and transport.
    pub fn redo(&mut self) -> bool {
        let Some(restored) = self.history.redo(self.current.clone()) else {
            return false;
        };
        self.install(restored);
        true
    }

    /// Swap in a snapshot from history. Tracks follow the room, not history:
    /// the restored state is re-synced to the inputs that are live now.
    fn install(&mut self, mut restored: TimelineState) {
        let live = self.initialized.then(|| self.live_inputs());
        restored.playhead_ms = self
            .current
            .playhead_ms
            .clamp(0.0, restored.total_duration_ms);
        restored.pixels_per_second = self.current.pixels_per_second;
        restored.is_playing = self.current.is_playing;
        if let Some(inputs) = live {
            apply(&mut restored, &TimelineAction::SyncTracks { inputs }, &self.config);
        }
        self.current = restored;
        self.structure_revision += 1;
        self.state_revision += 1;
    }

    /// Inputs that currently have a track, in the stacking order at zero.
    fn live_inputs(&self) -> Vec<InputId> {
        let tracks = &self.current.tracks;
        let mut inputs: Vec<InputId> = self
            .current
            .order_keyframes
            .first()
            .map(|kf| {
                kf.input_order
                    .iter()
                    .filter(|id| tracks.contains_key(*id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        for id in tracks.keys() {
            if !inputs.contains(id) {
                inputs.push(id.clone());
            }
        }
        inputs
    }

    /// Open a gesture: structural edits until `end_gesture` become one undo step.
    pub fn begin_gesture(&mut self, label: &str) {
        self.history.start_batch(label, self.current.clone());
    }

    /// Close the open gesture. A gesture that changed nothing leaves no entry.
    pub fn end_gesture(&mut self) {
        let unchanged = self
            .history
            .batch_start()
            .is_some_and(|start| start.same_structure(&self.current));
        if unchanged {
            self.history.cancel_batch();
        } else {
            self.history.end_batch();
        }
    }

    pub fn is_in_gesture(&self) -> bool {
        self.history.is_batching()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.history.undo_label()
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.history.redo_label()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_count()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_count()
    }

    /// Persistable view of the current state.
    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot::capture(&self.current)
    }

    /// Replace the current timeline with a loaded snapshot. History is cleared
    /// and the result is normalized, so a hand-edited or stale document cannot
    /// smuggle in broken invariants.
    pub fn hydrate(&mut self, snapshot: &TimelineSnapshot) {
        snapshot.restore(&mut self.current);
        normalize(&mut self.current, &self.config);
        self.history.clear();
        self.structure_revision += 1;
        self.state_revision += 1;
        self.initialized = true;
        tracing::info!(
            tracks = self.current.tracks.len(),
            keyframes = self.current.order_keyframes.len(),
            "Timeline hydrated from snapshot"
        );
    }
}
