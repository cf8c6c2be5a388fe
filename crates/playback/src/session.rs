//! The room session loop.
//!
//! A `RoomSession` owns the timeline store, the playback scheduler and the
//! persistence adapter for one room, and drives all of them from a single
//! task. Hosts talk to it through an mpsc channel of `SessionCommand`s.
//!
//! # Loop sources
//!
//! ```text
//! tokio::select!
//! ├── commands.recv()        edits, undo/redo, transport, room updates
//! ├── frames.tick()          fixed-rate playhead update (playing only)
//! ├── sleep(event delay)     one-shot timer for the next compiled event
//! ├── in_flight.next()       completion of fire-and-forget room calls
//! └── sleep_until(deadline)  debounced save
//! ```

use std::sync::Arc;

use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use rl_app_state::TimelineStore;
use rl_common::SessionConfig;
use rl_project::{SaveDebouncer, TimelinePersistence};
use rl_timeline::TimelineAction;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::room::{RoomCommand, RoomService, RoomState};
use crate::scheduler::{PlaybackScheduler, TickOutcome};

/// Requests accepted by a running session.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Edit(TimelineAction),
    Undo,
    Redo,
    BeginGesture(String),
    EndGesture,
    Play,
    Stop,
    TogglePlay,
    ApplyAtPlayhead,
    /// The host polled the room and saw this.
    RoomChanged(RoomState),
    Shutdown,
}

type InFlight = FuturesUnordered<LocalBoxFuture<'static, (RoomCommand, bool)>>;

fn now_std() -> std::time::Instant {
    time::Instant::now().into_std()
}

pub struct RoomSession<R, C, P> {
    room_id: String,
    store: TimelineStore,
    scheduler: PlaybackScheduler<R, C>,
    persistence: P,
    saver: SaveDebouncer,
    config: SessionConfig,
    /// State revision last handed to the debouncer.
    seen_revision: u64,
}

impl<R, C, P> RoomSession<R, C, P>
where
    R: RoomService + 'static,
    C: Clock,
    P: TimelinePersistence,
{
    /// Load the room's saved timeline (if any) and sync it with the room's
    /// current source list.
    pub async fn open(
        room_id: impl Into<String>,
        room: Arc<R>,
        clock: C,
        persistence: P,
        config: SessionConfig,
    ) -> Self {
        let room_id = room_id.into();
        let mut store = TimelineStore::new(config.timeline.clone());

        match persistence.load_timeline(&room_id) {
            Ok(Some(snapshot)) => store.hydrate(&snapshot),
            Ok(None) => info!(room_id = %room_id, "No saved timeline, starting fresh"),
            Err(e) => warn!(room_id = %room_id, error = %e, "Failed to load timeline, starting fresh"),
        }

        let mut session = Self {
            room_id,
            seen_revision: store.state_revision(),
            store,
            scheduler: PlaybackScheduler::new(room, clock),
            persistence,
            saver: SaveDebouncer::new(config.persistence.save_debounce()),
            config,
        };
        session.sync_from_room().await;
        session.note_changes();
        session
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn store(&self) -> &TimelineStore {
        &self.store
    }

    pub fn scheduler(&self) -> &PlaybackScheduler<R, C> {
        &self.scheduler
    }

    /// Run until `Shutdown` or until every sender is dropped. Playback is
    /// stopped and any pending save flushed before the store is returned.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) -> TimelineStore {
        let mut frames = time::interval(self.config.scheduler.frame_interval());
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight = InFlight::new();
        info!(room_id = %self.room_id, "Room session started");

        loop {
            let playing = self.scheduler.is_playing();
            let event_delay = self.scheduler.next_event_delay();
            let save_deadline = self.saver.deadline().map(time::Instant::from_std);

            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command, &mut in_flight).await,
                },
                _ = frames.tick(), if playing => {
                    self.on_frame(&mut in_flight).await;
                }
                _ = time::sleep(event_delay.unwrap_or_default()), if playing && event_delay.is_some() => {
                    let due = self.scheduler.fire_due_events(&self.store);
                    self.spawn_calls(due, &mut in_flight);
                }
                Some((command, ok)) = in_flight.next(), if !in_flight.is_empty() => {
                    self.scheduler.command_finished(&command, ok);
                }
                _ = time::sleep_until(save_deadline.unwrap_or_else(time::Instant::now)), if save_deadline.is_some() => {
                    self.save_now();
                }
            }

            self.note_changes();
        }

        self.stop(&mut in_flight).await;
        self.drain(&mut in_flight).await;
        self.note_changes();
        if self.saver.is_dirty() {
            self.save_now();
        }
        info!(room_id = %self.room_id, "Room session closed");
        self.store
    }

    async fn handle(&mut self, command: SessionCommand, in_flight: &mut InFlight) {
        debug!(?command, "Session command");
        match command {
            SessionCommand::Edit(TimelineAction::SetPlaying { playing }) => {
                if playing {
                    self.scheduler.play(&mut self.store).await;
                } else {
                    self.stop(in_flight).await;
                }
            }
            SessionCommand::Edit(action) => {
                let scrub = matches!(action, TimelineAction::SetPlayhead { .. });
                if self.store.dispatch(&action) && scrub {
                    let calls = self.scheduler.seek(&self.store);
                    self.spawn_calls(calls, in_flight);
                }
            }
            SessionCommand::Undo => {
                self.store.undo();
            }
            SessionCommand::Redo => {
                self.store.redo();
            }
            SessionCommand::BeginGesture(label) => self.store.begin_gesture(&label),
            SessionCommand::EndGesture => self.store.end_gesture(),
            SessionCommand::Play => {
                self.scheduler.play(&mut self.store).await;
            }
            SessionCommand::Stop => self.stop(in_flight).await,
            SessionCommand::TogglePlay => {
                if self.scheduler.is_playing() {
                    self.stop(in_flight).await;
                } else {
                    self.scheduler.play(&mut self.store).await;
                }
            }
            SessionCommand::ApplyAtPlayhead => {
                self.scheduler.apply_at_playhead(&self.store).await;
            }
            SessionCommand::RoomChanged(state) => {
                let inputs = state.input_ids();
                self.scheduler.observe_room(state);
                self.store.dispatch(&TimelineAction::SyncTracks { inputs });
            }
            // Intercepted by the loop.
            SessionCommand::Shutdown => {}
        }
    }

    async fn on_frame(&mut self, in_flight: &mut InFlight) {
        match self.scheduler.tick(&mut self.store) {
            TickOutcome::Advanced { commands, .. } => self.spawn_calls(commands, in_flight),
            TickOutcome::Ended => self.stop(in_flight).await,
            TickOutcome::Idle => {}
        }
    }

    fn spawn_calls(&self, commands: Vec<RoomCommand>, in_flight: &mut InFlight) {
        for command in commands {
            let room = Arc::clone(self.scheduler.room());
            in_flight.push(Box::pin(async move {
                let ok = command.execute(room.as_ref()).await;
                (command, ok)
            }));
        }
    }

    async fn drain(&mut self, in_flight: &mut InFlight) {
        while let Some((command, ok)) = in_flight.next().await {
            self.scheduler.command_finished(&command, ok);
        }
    }

    /// Outstanding calls land before the pre-play state is restored.
    async fn stop(&mut self, in_flight: &mut InFlight) {
        if !self.scheduler.is_playing() {
            return;
        }
        self.drain(in_flight).await;
        self.scheduler.stop(&mut self.store).await;
    }

    async fn sync_from_room(&mut self) {
        if !self.scheduler.refresh_room().await {
            return;
        }
        if let Some(room) = self.scheduler.known_room() {
            let inputs = room.input_ids();
            self.store.dispatch(&TimelineAction::SyncTracks { inputs });
        }
    }

    fn note_changes(&mut self) {
        if self.store.is_initialized() {
            self.saver.enable();
        }
        let revision = self.store.state_revision();
        if revision != self.seen_revision {
            self.seen_revision = revision;
            self.saver.mark_changed_at(now_std());
        }
    }

    fn save_now(&mut self) {
        let snapshot = self.store.snapshot();
        match self.persistence.save_timeline(&self.room_id, &snapshot) {
            Ok(()) => {
                self.saver.mark_saved();
                info!(room_id = %self.room_id, "Timeline saved");
            }
            Err(e) => {
                warn!(room_id = %self.room_id, error = %e, "Timeline save failed, will retry");
                self.saver.mark_changed_at(now_std());
            }
        }
    }
}
