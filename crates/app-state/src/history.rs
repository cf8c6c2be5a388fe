//! Snapshot-based undo/redo history manager.
//!
//! - Undo/redo stacks of `TimelineState` snapshots, bounded like a ring buffer
//!   (oldest entries fall off once `max_entries` is reached)
//! - Batch grouping to collapse a gesture (e.g. dragging a segment, which emits
//!   many moves) into one undo step
//!
//! # Usage
//!
//! ```ignore
//! let mut history = HistoryManager::new(50);
//!
//! // Before a structural edit, record the state it started from
//! history.push("Move segment", state.clone());
//!
//! // Undo: hand over the current state, get the one to restore
//! if let Some(prev) = history.undo(current.clone()) {
//!     current = prev;
//! }
//! ```

use std::collections::VecDeque;
use std::time::Instant;

use rl_timeline::TimelineState;

/// A single entry in the undo/redo history.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    /// Human-readable label describing the action (e.g., "Split segment").
    pub label: String,
    /// The timeline state at this point in history.
    pub snapshot: TimelineState,
    /// When this entry was created.
    pub timestamp: Instant,
}

/// Manages undo/redo history using timeline snapshots.
///
/// - Two stacks: undo (past states) and redo (future states undone)
/// - Pushing a new entry clears the redo stack (new timeline branch)
/// - Batch mode suppresses individual pushes and creates a single entry on end
/// - Maximum stack depth bounds memory
pub struct HistoryManager {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_entries: usize,
    /// When Some, we are in batch mode and push() calls are suppressed.
    batch_label: Option<String>,
    /// State captured at the start of a batch (the "before" state).
    batch_start_snapshot: Option<TimelineState>,
}

impl HistoryManager {
    /// Create a new history manager with the given maximum number of undo entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            undo_stack: VecDeque::with_capacity(max_entries.min(256)),
            redo_stack: Vec::new(),
            max_entries,
            batch_label: None,
            batch_start_snapshot: None,
        }
    }

    /// Push the state from *before* the current action onto the undo stack.
    ///
    /// Clears the redo stack. Suppressed while a batch is open.
    pub fn push(&mut self, label: &str, snapshot: TimelineState) {
        if self.batch_label.is_some() {
            tracing::debug!(label, "Push suppressed: batch in progress");
            return;
        }

        self.redo_stack.clear();
        self.push_undo(label.to_string(), snapshot);

        tracing::debug!(
            label,
            undo_depth = self.undo_stack.len(),
            "History entry pushed"
        );
    }

    fn push_undo(&mut self, label: String, snapshot: TimelineState) {
        self.undo_stack.push_back(HistoryEntry {
            label,
            snapshot,
            timestamp: Instant::now(),
        });
        while self.undo_stack.len() > self.max_entries {
            self.undo_stack.pop_front();
        }
    }

    /// Ends a batch left open by a lost pointer-up or similar.
    fn end_stuck_batch(&mut self) {
        if self.batch_label.is_some() {
            tracing::warn!("Ending stuck batch before undo/redo");
            self.end_batch();
        }
    }

    /// Undo the last action.
    ///
    /// `current` is moved onto the redo stack so a later redo can return to it.
    /// Returns the snapshot to restore, or `None` if there is nothing to undo.
    pub fn undo(&mut self, current: TimelineState) -> Option<TimelineState> {
        self.end_stuck_batch();

        let entry = self.undo_stack.pop_back()?;
        tracing::debug!(
            label = %entry.label,
            undo_remaining = self.undo_stack.len(),
            "Undo"
        );

        self.redo_stack.push(HistoryEntry {
            label: entry.label,
            snapshot: current,
            timestamp: Instant::now(),
        });
        Some(entry.snapshot)
    }

    /// Redo the last undone action.
    ///
    /// `current` goes back onto the undo stack. Returns the snapshot to
    /// restore, or `None` if there is nothing to redo.
    pub fn redo(&mut self, current: TimelineState) -> Option<TimelineState> {
        self.end_stuck_batch();

        let entry = self.redo_stack.pop()?;
        tracing::debug!(
            label = %entry.label,
            redo_remaining = self.redo_stack.len(),
            "Redo"
        );

        self.push_undo(entry.label, current);
        Some(entry.snapshot)
    }

    /// Check if undo is available.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty() || self.batch_start_snapshot.is_some()
    }

    /// Check if redo is available.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Start a batch operation. While batching, individual `push()` calls are
    /// suppressed; `end_batch()` records `before_snapshot` as a single entry.
    pub fn start_batch(&mut self, label: &str, before_snapshot: TimelineState) {
        if self.batch_label.is_some() {
            tracing::warn!(label, "start_batch called while already batching, ignoring");
            return;
        }

        self.batch_label = Some(label.to_string());
        self.batch_start_snapshot = Some(before_snapshot);

        tracing::debug!(label, "Batch started");
    }

    /// End the current batch, pushing the state captured at `start_batch`.
    ///
    /// If no batch is in progress, this is a no-op.
    pub fn end_batch(&mut self) {
        let Some(label) = self.batch_label.take() else {
            return;
        };
        let Some(start_snapshot) = self.batch_start_snapshot.take() else {
            return;
        };

        self.redo_stack.clear();
        self.push_undo(label, start_snapshot);

        tracing::debug!(
            undo_depth = self.undo_stack.len(),
            "Batch ended, entry pushed"
        );
    }

    /// End the current batch without recording anything (the gesture
    /// produced no change).
    pub fn cancel_batch(&mut self) {
        if self.batch_label.take().is_some() {
            self.batch_start_snapshot = None;
            tracing::debug!("Batch cancelled");
        }
    }

    /// Whether a batch operation is currently in progress.
    pub fn is_batching(&self) -> bool {
        self.batch_label.is_some()
    }

    /// State captured when the open batch started.
    pub fn batch_start(&self) -> Option<&TimelineState> {
        self.batch_start_snapshot.as_ref()
    }

    /// Get the label of the action that would be undone next.
    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.label.as_str())
    }

    /// Get the label of the action that would be redone next.
    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().map(|e| e.label.as_str())
    }

    /// Number of entries on the undo stack.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of entries on the redo stack.
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Clear all history (undo and redo stacks).
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch_label = None;
        self.batch_start_snapshot = None;
        tracing::debug!("History cleared");
    }

    /// Get the maximum number of undo entries.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Set the maximum number of undo entries. Trims the oldest entries if needed.
    pub fn set_max_entries(&mut self, max: usize) {
        self.max_entries = max;
        while self.undo_stack.len() > self.max_entries {
            self.undo_stack.pop_front();
        }
    }
}
