//! Debounced saving: tracks dirty state and the save deadline.
//!
//! `SaveDebouncer` does NOT own a task or timer. The caller reports changes
//! and polls `should_save_at(now)`; when it returns `true` the caller writes
//! the snapshot and calls `mark_saved()`. Every change pushes the deadline
//! back by the full delay, so a burst of edits produces one save.

use std::time::{Duration, Instant};

use tracing::debug;

/// Default debounce delay in milliseconds.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 500;

#[derive(Debug)]
pub struct SaveDebouncer {
    delay: Duration,
    /// When a pending save becomes due. `None` when clean.
    deadline: Option<Instant>,
    /// Saves stay off until the timeline has been initialized once.
    enabled: bool,
}

impl SaveDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            enabled: false,
        }
    }

    /// Allow saves from now on. Called once the timeline is hydrated or synced.
    pub fn enable(&mut self) {
        if !self.enabled {
            debug!("Save debouncer enabled");
        }
        self.enabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a change at `now`, restarting the delay.
    pub fn mark_changed_at(&mut self, now: Instant) {
        if !self.enabled {
            return;
        }
        self.deadline = Some(now + self.delay);
    }

    pub fn mark_changed(&mut self) {
        self.mark_changed_at(Instant::now());
    }

    pub fn is_dirty(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn should_save_at(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    pub fn should_save(&self) -> bool {
        self.should_save_at(Instant::now())
    }

    /// The pending deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the pending save is due; `None` when clean.
    pub fn time_until_save_at(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub fn mark_saved(&mut self) {
        self.deadline = None;
        debug!("Timeline marked as saved");
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for SaveDebouncer {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_SAVE_DEBOUNCE_MS))
    }
}
