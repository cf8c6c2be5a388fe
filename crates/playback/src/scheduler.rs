//! Playback scheduler: turns a timeline into show/hide/order calls on a room.
//!
//! Playback is a non-destructive preview. `play()` snapshots the room,
//! `stop()` puts it back exactly as it was. In between, the playhead is
//! derived from a wall-clock anchor (`anchor.playhead + (now - anchor.wall)`)
//! so timer drift never accumulates, and compiled events are consumed by a
//! single monotonically advancing cursor.
//!
//! Every outgoing call passes through the applied-state cache: an input only
//! gets a call when the desired visibility differs from both what was last
//! applied and what the room is known to show.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rl_app_state::TimelineStore;
use rl_common::InputId;
use rl_timeline::{
    active_order, compile_events, compute_desired_state, desired_state_at, order_at,
    DesiredState, PlaybackEvent, PlaybackEventKind, TimelineAction,
};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::room::{RoomCommand, RoomService, RoomState};

/// Events this close past the playhead count as due.
const DUE_TOLERANCE_MS: f64 = 1e-3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    /// Restoration in progress. A second `stop()` is ignored.
    Stopping,
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    wall_clock_ms: f64,
    playhead_ms: f64,
}

/// Result of one frame of the playhead loop.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not playing.
    Idle,
    /// Playhead moved; `commands` are due and should be sent without awaiting.
    Advanced {
        playhead_ms: f64,
        commands: Vec<RoomCommand>,
    },
    /// The playhead hit the end of the timeline. The caller should `stop()`.
    Ended,
}

pub struct PlaybackScheduler<R, C> {
    room: Arc<R>,
    clock: C,
    transport: TransportState,
    /// Visibility last sent (or confirmed) per input.
    applied: BTreeMap<InputId, bool>,
    applied_order: Option<Vec<InputId>>,
    /// Calls issued but not yet finished, per input.
    pending: BTreeMap<InputId, usize>,
    pending_orders: usize,
    /// Best-known external state.
    known_room: Option<RoomState>,
    /// Room as it was when playback started.
    pre_play: Option<RoomState>,
    anchor: Option<Anchor>,
    events: Vec<PlaybackEvent>,
    cursor: usize,
    compiled_revision: u64,
}

impl<R: RoomService, C: Clock> PlaybackScheduler<R, C> {
    pub fn new(room: Arc<R>, clock: C) -> Self {
        Self {
            room,
            clock,
            transport: TransportState::Stopped,
            applied: BTreeMap::new(),
            applied_order: None,
            pending: BTreeMap::new(),
            pending_orders: 0,
            known_room: None,
            pre_play: None,
            anchor: None,
            events: Vec::new(),
            cursor: 0,
            compiled_revision: 0,
        }
    }

    pub fn room(&self) -> &Arc<R> {
        &self.room
    }

    pub fn transport(&self) -> TransportState {
        self.transport
    }

    pub fn is_playing(&self) -> bool {
        self.transport == TransportState::Playing
    }

    pub fn known_room(&self) -> Option<&RoomState> {
        self.known_room.as_ref()
    }

    /// Events not yet fired in this playback session.
    pub fn pending_events(&self) -> &[PlaybackEvent] {
        self.events.get(self.cursor..).unwrap_or(&[])
    }

    /// Feed in room state polled by the host.
    pub fn observe_room(&mut self, state: RoomState) {
        self.known_room = Some(state);
    }

    /// Query the room once. Returns `false` (and keeps the old view) on failure.
    pub async fn refresh_room(&mut self) -> bool {
        match self.room.get_room_state().await {
            Ok(state) => {
                self.known_room = Some(state);
                true
            }
            Err(e) => {
                warn!(error = %e, "Room state refresh failed");
                false
            }
        }
    }

    /// Anchor-relative playhead. `None` unless playing.
    pub fn playhead_now(&self) -> Option<f64> {
        if !self.is_playing() {
            return None;
        }
        let anchor = self.anchor?;
        Some(anchor.playhead_ms + (self.clock.now_ms() - anchor.wall_clock_ms))
    }

    /// Diff `desired` (and `order`) against the cache and the known room, and
    /// mark the result as applied. Returns the calls that must be sent.
    ///
    /// The room is not consulted for an input while a call for it is still
    /// pending: until that call finishes, the cache is ahead of the room.
    pub fn plan_commands(
        &mut self,
        desired: &DesiredState,
        order: Option<&[InputId]>,
    ) -> Vec<RoomCommand> {
        let mut commands = Vec::new();

        for (input_id, &visible) in desired {
            if self.applied.insert(input_id.clone(), visible) == Some(visible) {
                continue;
            }
            let room_matches = !self.pending.contains_key(input_id)
                && self
                    .known_room
                    .as_ref()
                    .and_then(|room| room.is_visible(input_id))
                    == Some(visible);
            if !room_matches {
                *self.pending.entry(input_id.clone()).or_default() += 1;
                commands.push(RoomCommand::visibility(input_id.clone(), visible));
            }
        }

        if let Some(order) = order {
            if self.applied_order.replace(order.to_vec()).as_deref() != Some(order) {
                let room_matches = self.pending_orders == 0
                    && self
                        .known_room
                        .as_ref()
                        .is_some_and(|room| room.order() == order);
                if !room_matches {
                    self.pending_orders += 1;
                    commands.push(RoomCommand::SetOrder(order.to_vec()));
                }
            }
        }

        commands
    }

    /// Report the outcome of a sent call. Failed inputs drop out of the cache
    /// so the next recomputation retries them.
    pub fn command_finished(&mut self, command: &RoomCommand, ok: bool) {
        match command {
            RoomCommand::Show(id) | RoomCommand::Hide(id) => {
                if let Some(count) = self.pending.get_mut(id) {
                    *count -= 1;
                    if *count == 0 {
                        self.pending.remove(id);
                    }
                }
            }
            RoomCommand::SetOrder(_) => self.pending_orders = self.pending_orders.saturating_sub(1),
        }
        if ok {
            if let Some(room) = self.known_room.as_mut() {
                let _ = room.apply(command);
            }
            return;
        }
        match command {
            RoomCommand::Show(id) | RoomCommand::Hide(id) => {
                self.applied.remove(id);
            }
            RoomCommand::SetOrder(_) => self.applied_order = None,
        }
    }

    async fn send_batch(&mut self, commands: &[RoomCommand]) {
        let room = Arc::clone(&self.room);
        let results = join_all(commands.iter().map(|c| c.execute(room.as_ref()))).await;
        for (command, ok) in commands.iter().zip(results) {
            self.command_finished(command, ok);
        }
    }

    /// Push the diff between `desired` and what is applied, concurrently, then
    /// refresh the room once. Returns the number of calls issued.
    pub async fn apply_desired_state(
        &mut self,
        desired: &DesiredState,
        order: Option<&[InputId]>,
    ) -> usize {
        let commands = self.plan_commands(desired, order);
        if commands.is_empty() {
            return 0;
        }
        debug!(calls = commands.len(), "Applying desired state");
        self.send_batch(&commands).await;
        self.refresh_room().await;
        commands.len()
    }

    /// Start playback from the current playhead.
    pub async fn play(&mut self, store: &mut TimelineStore) -> bool {
        if self.transport != TransportState::Stopped {
            debug!(transport = ?self.transport, "Play ignored");
            return false;
        }

        let state = store.state();
        if state.playhead_ms >= state.total_duration_ms {
            store.dispatch(&TimelineAction::SetPlayhead { ms: 0.0 });
        }

        if !self.refresh_room().await {
            if self.known_room.is_some() {
                warn!("Room refresh failed, snapshotting the last known room state");
            } else {
                warn!("Starting playback without a room snapshot; stop will not restore");
            }
        }
        self.pre_play = self.known_room.clone();
        self.applied = self
            .known_room
            .iter()
            .flat_map(|room| room.inputs.iter())
            .map(|input| (input.input_id.clone(), !input.hidden))
            .collect();
        self.applied_order = self.known_room.as_ref().map(RoomState::order);

        let playhead_ms = store.state().playhead_ms;
        self.anchor = Some(Anchor {
            wall_clock_ms: self.clock.now_ms(),
            playhead_ms,
        });
        self.events = compile_events(store.state(), playhead_ms);
        self.cursor = 0;
        self.compiled_revision = store.structure_revision();
        self.transport = TransportState::Playing;
        store.dispatch(&TimelineAction::SetPlaying { playing: true });
        info!(playhead_ms, events = self.events.len(), "Playback started");

        let desired = compute_desired_state(store.state());
        let order = active_order(store.state()).map(<[InputId]>::to_vec);
        self.apply_desired_state(&desired, order.as_deref()).await;
        true
    }

    /// Stop playback and restore the room to its pre-play state.
    pub async fn stop(&mut self, store: &mut TimelineStore) -> bool {
        if self.transport != TransportState::Playing {
            debug!(transport = ?self.transport, "Stop ignored");
            return false;
        }
        self.transport = TransportState::Stopping;
        self.anchor = None;
        self.events.clear();
        self.cursor = 0;

        match self.pre_play.take() {
            Some(pre) => {
                let commands = self.restore_commands(&pre).await;
                if !commands.is_empty() {
                    debug!(calls = commands.len(), "Restoring pre-play room state");
                    self.send_batch(&commands).await;
                }
            }
            None => warn!("No pre-play snapshot, room left as is"),
        }

        self.applied.clear();
        self.applied_order = None;
        self.transport = TransportState::Stopped;
        store.dispatch(&TimelineAction::SetPlaying { playing: false });
        info!(playhead_ms = store.state().playhead_ms, "Playback stopped");
        true
    }

    async fn restore_commands(&mut self, pre: &RoomState) -> Vec<RoomCommand> {
        let current = if self.refresh_room().await {
            self.known_room.clone()
        } else {
            None
        };

        let mut commands = Vec::new();
        for input in &pre.inputs {
            let want_visible = !input.hidden;
            match current.as_ref().map(|room| room.is_visible(&input.input_id)) {
                // Already right, or the input has left the room.
                Some(Some(v)) if v == want_visible => {}
                Some(None) => {}
                _ => commands.push(RoomCommand::visibility(input.input_id.clone(), want_visible)),
            }
        }

        let pre_order = pre.order();
        let order_matches = current.as_ref().is_some_and(|room| {
            room.order()
                .into_iter()
                .filter(|id| pre_order.contains(id))
                .eq(pre_order.iter().cloned())
        });
        if !order_matches {
            commands.push(RoomCommand::SetOrder(pre_order));
        }
        commands
    }

    /// Push the room to match the timeline at the current playhead, with or
    /// without an active playback session. Returns the number of calls issued.
    pub async fn apply_at_playhead(&mut self, store: &TimelineStore) -> usize {
        if !self.is_playing() {
            // Outside playback the cache is stale; trust a fresh room query.
            self.refresh_room().await;
            self.applied.clear();
            self.applied_order = None;
        }
        let desired = compute_desired_state(store.state());
        let order = active_order(store.state()).map(<[InputId]>::to_vec);
        self.apply_desired_state(&desired, order.as_deref()).await
    }

    /// Re-anchor at the store's playhead after a scrub during playback.
    /// Returns the calls needed to match the new instant.
    pub fn seek(&mut self, store: &TimelineStore) -> Vec<RoomCommand> {
        if !self.is_playing() {
            return Vec::new();
        }
        let playhead_ms = store.state().playhead_ms;
        self.anchor = Some(Anchor {
            wall_clock_ms: self.clock.now_ms(),
            playhead_ms,
        });
        self.reschedule(store, playhead_ms)
    }

    /// One frame: advance the playhead and collect due calls.
    pub fn tick(&mut self, store: &mut TimelineStore) -> TickOutcome {
        let Some(playhead_ms) = self.playhead_now() else {
            return TickOutcome::Idle;
        };

        let total = store.state().total_duration_ms;
        if playhead_ms >= total {
            store.dispatch(&TimelineAction::SetPlayhead { ms: total });
            info!(total_duration_ms = total, "Playback reached end of timeline");
            return TickOutcome::Ended;
        }

        store.dispatch(&TimelineAction::SetPlayhead { ms: playhead_ms });
        let commands = self.fire_due_events(store);
        TickOutcome::Advanced {
            playhead_ms,
            commands,
        }
    }

    /// Fire every compiled event at or before the playhead. A structure change
    /// since the last compile recompiles from the playhead first and diffs the
    /// desired state there.
    pub fn fire_due_events(&mut self, store: &TimelineStore) -> Vec<RoomCommand> {
        let Some(playhead_ms) = self.playhead_now() else {
            return Vec::new();
        };

        let mut commands = Vec::new();
        if store.structure_revision() != self.compiled_revision {
            commands.extend(self.reschedule(store, playhead_ms));
        }

        // Net effect of this batch: the last event per input wins.
        let mut visibility = DesiredState::new();
        let mut order = None;
        while let Some(event) = self
            .events
            .get(self.cursor)
            .filter(|e| e.time_ms <= playhead_ms + DUE_TOLERANCE_MS)
        {
            match &event.kind {
                PlaybackEventKind::Connect { input_id } => {
                    visibility.insert(input_id.clone(), true);
                }
                PlaybackEventKind::Disconnect { input_id } => {
                    visibility.insert(input_id.clone(), false);
                }
                PlaybackEventKind::Order { input_order } => order = Some(input_order.clone()),
            }
            self.cursor += 1;
        }

        commands.extend(self.plan_commands(&visibility, order.as_deref()));
        commands
    }

    fn reschedule(&mut self, store: &TimelineStore, playhead_ms: f64) -> Vec<RoomCommand> {
        let state = store.state();
        self.events = compile_events(state, playhead_ms);
        self.cursor = 0;
        self.compiled_revision = store.structure_revision();
        debug!(
            playhead_ms,
            events = self.events.len(),
            revision = self.compiled_revision,
            "Playback events recompiled"
        );

        let desired = desired_state_at(state, playhead_ms);
        let order = order_at(state, playhead_ms).map(<[InputId]>::to_vec);
        self.plan_commands(&desired, order.as_deref())
    }

    /// Delay until the next compiled event, recomputed from the anchor on
    /// every call. Rounded up to whole milliseconds.
    pub fn next_event_delay(&self) -> Option<Duration> {
        let playhead_ms = self.playhead_now()?;
        let next = self.events.get(self.cursor)?;
        let ms = (next.time_ms - playhead_ms).max(0.0).ceil();
        Some(Duration::from_millis(ms as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::room::LocalRoom;
    use rl_common::TimelineConfig;
    use rl_timeline::SegmentEdge;

    fn ids(names: &[&str]) -> Vec<InputId> {
        names.iter().map(|n| InputId::from(*n)).collect()
    }

    fn id(name: &str) -> InputId {
        InputId::from(name)
    }

    /// Inputs a and b over a 10s timeline; b only visible in [2000, 5000),
    /// order flips to [b, a] at 3000.
    fn store() -> TimelineStore {
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

    fn scheduler() -> (
        PlaybackScheduler<LocalRoom, ManualClock>,
        Arc<LocalRoom>,
        ManualClock,
    ) {
        let room = Arc::new(LocalRoom::new(RoomState::visible(ids(&["a", "b"]))));
        let clock = ManualClock::new(0.0);
        let scheduler = PlaybackScheduler::new(Arc::clone(&room), clock.clone());
        (scheduler, room, clock)
    }

    #[tokio::test]
    async fn play_applies_desired_state_immediately() {
        let mut store = store();
        let (mut sched, room, _clock) = scheduler();

        assert!(sched.play(&mut store).await);
        assert!(store.state().is_playing);
        // b is outside its segment at 0 and gets hidden; order [a, b] already matches.
        assert_eq!(room.calls(), vec![RoomCommand::Hide(id("b"))]);
        assert!(!sched.play(&mut store).await);
    }

    #[tokio::test]
    async fn diff_suppression_second_apply_is_silent() {
        let store = store();
        let (mut sched, room, _clock) = scheduler();
        let desired = compute_desired_state(store.state());
        sched.refresh_room().await;

        let first = sched.apply_desired_state(&desired, None).await;
        assert_eq!(first, 1);
        let calls = room.call_count();

        let second = sched.apply_desired_state(&desired, None).await;
        assert_eq!(second, 0);
        assert_eq!(room.call_count(), calls);
    }

    #[tokio::test]
    async fn failed_calls_are_retried() {
        let store = store();
        let (mut sched, room, _clock) = scheduler();
        let desired = compute_desired_state(store.state());
        sched.refresh_room().await;

        room.set_failing(true);
        assert_eq!(sched.apply_desired_state(&desired, None).await, 1);
        room.set_failing(false);
        assert_eq!(sched.apply_desired_state(&desired, None).await, 1);
        assert_eq!(room.state().hidden_set(), [id("b")].into_iter().collect());
    }

    #[tokio::test]
    async fn room_already_matching_needs_no_call() {
        let (mut sched, room, _clock) = scheduler();
        sched.refresh_room().await;
        let visible: DesiredState = [(id("a"), true)].into_iter().collect();
        let hidden: DesiredState = [(id("a"), false)].into_iter().collect();
        assert!(sched.plan_commands(&visible, None).is_empty());

        // Hidden by someone else; the cache still says visible.
        room.force_hidden(&id("a"), true);
        sched.observe_room(room.state());
        assert!(sched.plan_commands(&hidden, None).is_empty());
        assert_eq!(sched.plan_commands(&visible, None), vec![RoomCommand::Show(id("a"))]);
    }

    #[tokio::test]
    async fn pending_call_keeps_room_view_out_of_the_diff() {
        let (mut sched, room, _clock) = scheduler();
        room.force_hidden(&id("a"), true);
        sched.refresh_room().await;
        let visible: DesiredState = [(id("a"), true)].into_iter().collect();
        let hidden: DesiredState = [(id("a"), false)].into_iter().collect();

        let show = sched.plan_commands(&visible, None);
        assert_eq!(show, vec![RoomCommand::Show(id("a"))]);
        // The Show has not landed, so "hidden" in the room view is stale.
        let hide = sched.plan_commands(&hidden, None);
        assert_eq!(hide, vec![RoomCommand::Hide(id("a"))]);

        sched.command_finished(&show[0], true);
        sched.command_finished(&hide[0], true);
        assert_eq!(sched.known_room().and_then(|r| r.is_visible(&id("a"))), Some(false));
        assert!(sched.plan_commands(&hidden, None).is_empty());
    }

    #[tokio::test]
    async fn tick_fires_events_in_order() {
        let mut store = store();
        let (mut sched, room, clock) = scheduler();
        sched.play(&mut store).await;
        room.take_calls();

        clock.set(2_100.0);
        let TickOutcome::Advanced { commands, .. } = sched.tick(&mut store) else {
            panic!("expected advance");
        };
        assert_eq!(commands, vec![RoomCommand::Show(id("b"))]);
        assert_eq!(store.state().playhead_ms, 2_100.0);

        clock.set(3_000.0);
        let TickOutcome::Advanced { commands, .. } = sched.tick(&mut store) else {
            panic!("expected advance");
        };
        assert_eq!(commands, vec![RoomCommand::SetOrder(ids(&["b", "a"]))]);

        clock.set(5_500.0);
        let TickOutcome::Advanced { commands, .. } = sched.tick(&mut store) else {
            panic!("expected advance");
        };
        assert_eq!(commands, vec![RoomCommand::Hide(id("b"))]);
    }

    #[tokio::test]
    async fn tick_at_end_reports_ended() {
        let mut store = store();
        let (mut sched, _room, clock) = scheduler();
        sched.play(&mut store).await;

        clock.set(12_000.0);
        assert_eq!(sched.tick(&mut store), TickOutcome::Ended);
        assert_eq!(store.state().playhead_ms, 10_000.0);
    }

    #[tokio::test]
    async fn play_from_end_rewinds() {
        let mut store = store();
        store.dispatch(&TimelineAction::SetPlayhead { ms: 10_000.0 });
        let (mut sched, _room, _clock) = scheduler();

        sched.play(&mut store).await;
        assert_eq!(store.state().playhead_ms, 0.0);
        assert_eq!(sched.pending_events().first().map(|e| e.time_ms), Some(2_000.0));
    }

    #[tokio::test]
    async fn next_event_delay_is_anchor_relative() {
        let mut store = store();
        let (mut sched, _room, clock) = scheduler();
        assert_eq!(sched.next_event_delay(), None);

        sched.play(&mut store).await;
        assert_eq!(sched.next_event_delay(), Some(Duration::from_millis(2_000)));
        clock.set(1_250.5);
        assert_eq!(sched.next_event_delay(), Some(Duration::from_millis(750)));
    }

    #[tokio::test]
    async fn edit_during_playback_recompiles_and_diffs() {
        let mut store = store();
        let (mut sched, _room, clock) = scheduler();
        sched.play(&mut store).await;

        clock.set(1_000.0);
        sched.tick(&mut store);

        // Pull b's segment start back to 500: it should become visible now.
        let seg = store.state().tracks[&id("b")].segments[0].id.clone();
        store.dispatch(&TimelineAction::ResizeSegment {
            input_id: id("b"),
            segment_id: seg,
            edge: SegmentEdge::Start,
            new_ms: 500.0,
        });

        clock.set(1_016.0);
        let TickOutcome::Advanced { commands, .. } = sched.tick(&mut store) else {
            panic!("expected advance");
        };
        assert_eq!(commands, vec![RoomCommand::Show(id("b"))]);
        assert!(sched
            .pending_events()
            .iter()
            .all(|e| e.time_ms > 1_016.0));
    }

    #[tokio::test]
    async fn seek_during_playback_reanchors() {
        let mut store = store();
        let (mut sched, _room, clock) = scheduler();
        sched.play(&mut store).await;

        clock.set(500.0);
        store.dispatch(&TimelineAction::SetPlayhead { ms: 4_000.0 });
        let commands = sched.seek(&store);
        assert_eq!(
            commands,
            vec![
                RoomCommand::Show(id("b")),
                RoomCommand::SetOrder(ids(&["b", "a"]))
            ]
        );

        clock.set(600.0);
        assert_eq!(sched.playhead_now(), Some(4_100.0));
        assert_eq!(sched.pending_events().first().map(|e| e.time_ms), Some(5_000.0));
    }

    #[tokio::test]
    async fn back_to_back_segments_do_not_flicker() {
        let mut store = store();
        let seg = store.state().tracks[&id("b")].segments[0].id.clone();
        store.dispatch(&TimelineAction::DuplicateSegment {
            input_id: id("b"),
            segment_id: seg,
        });
        let (mut sched, _room, clock) = scheduler();
        sched.play(&mut store).await;

        clock.set(2_500.0);
        sched.tick(&mut store);
        clock.set(4_000.0);
        sched.tick(&mut store);

        // b's first segment ends at 5000 exactly where the duplicate begins.
        clock.set(5_200.0);
        let TickOutcome::Advanced { commands, .. } = sched.tick(&mut store) else {
            panic!("expected advance");
        };
        assert!(commands.is_empty(), "unexpected {commands:?}");
    }

    #[tokio::test]
    async fn stop_restores_pre_play_room() {
        let mut store = store();
        let (mut sched, room, clock) = scheduler();
        room.force_hidden(&id("a"), true);
        let before = room.state();

        sched.play(&mut store).await;
        clock.set(3_500.0);
        if let TickOutcome::Advanced { commands, .. } = sched.tick(&mut store) {
            for command in &commands {
                let ok = command.execute(room.as_ref()).await;
                sched.command_finished(command, ok);
            }
        }
        assert_ne!(room.state(), before);

        assert!(sched.stop(&mut store).await);
        assert_eq!(room.state(), before);
        assert!(!store.state().is_playing);
        assert_eq!(sched.transport(), TransportState::Stopped);
        assert!(!sched.stop(&mut store).await);
    }

    #[tokio::test]
    async fn failed_refresh_on_play_snapshots_last_known_room() {
        let mut store = store();
        let (mut sched, room, _clock) = scheduler();
        sched.refresh_room().await;

        room.set_failing(true);
        assert!(sched.play(&mut store).await);
        room.set_failing(false);
        room.force_hidden(&id("a"), true);

        assert!(sched.stop(&mut store).await);
        assert_eq!(room.state(), RoomState::visible(ids(&["a", "b"])));
    }

    #[tokio::test]
    async fn play_without_any_room_view_leaves_room_on_stop() {
        let mut store = store();
        let (mut sched, room, _clock) = scheduler();

        room.set_failing(true);
        assert!(sched.play(&mut store).await);
        room.set_failing(false);
        room.force_hidden(&id("a"), true);
        room.take_calls();

        assert!(sched.stop(&mut store).await);
        assert!(room.calls().is_empty());
        assert_eq!(room.state().hidden_set(), [id("a")].into_iter().collect());
    }

    #[tokio::test]
    async fn apply_at_playhead_without_playback() {
        let mut store = store();
        store.dispatch(&TimelineAction::SetPlayhead { ms: 4_000.0 });
        let (mut sched, room, _clock) = scheduler();

        let calls = sched.apply_at_playhead(&store).await;
        assert_eq!(calls, 1);
        assert_eq!(room.state().order(), ids(&["b", "a"]));
        assert!(!sched.is_playing());
        assert!(!store.state().is_playing);
    }

    #[tokio::test]
    async fn apply_at_playhead_ignores_stale_cache() {
        let mut store = store();
        store.dispatch(&TimelineAction::SetPlayhead { ms: 4_000.0 });
        let (mut sched, room, _clock) = scheduler();
        sched.apply_at_playhead(&store).await;

        // Someone hides b behind our back; a second apply must notice.
        room.force_hidden(&id("b"), true);
        assert_eq!(sched.apply_at_playhead(&store).await, 1);
        assert!(room.state().hidden_set().is_empty());
    }
}
