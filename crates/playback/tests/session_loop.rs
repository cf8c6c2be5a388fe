//! The session event loop under tokio's paused clock. Time only moves when
//! every task is idle, so timer-driven behavior is deterministic.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fixture_snapshot, id, ids, init_tracing, room_state};
use rl_common::{InputId, SessionConfig};
use rl_playback::{LocalRoom, RoomCommand, RoomSession, SessionCommand, SystemClock};
use rl_project::{MemoryStore, TimelinePersistence};
use rl_timeline::{SegmentEdge, TimelineAction};
use tokio::sync::mpsc;
use tokio::time::sleep;

fn room_id() -> String {
    format!("room-{}", uuid::Uuid::new_v4())
}

async fn open_session(
    room: &Arc<LocalRoom>,
    persistence: &Arc<MemoryStore>,
    room_id: &str,
) -> RoomSession<LocalRoom, SystemClock, Arc<MemoryStore>> {
    RoomSession::open(
        room_id,
        Arc::clone(room),
        SystemClock::new(),
        Arc::clone(persistence),
        SessionConfig::default(),
    )
    .await
}

#[tokio::test(start_paused = true)]
async fn playback_follows_timeline_and_restores_room() {
    init_tracing();
    let room = Arc::new(LocalRoom::new(room_state()));
    let persistence = Arc::new(MemoryStore::new());
    let room_id = room_id();
    persistence
        .save_timeline(&room_id, &fixture_snapshot())
        .expect("seed");

    let session = open_session(&room, &persistence, &room_id).await;
    let (tx, rx) = mpsc::channel(16);

    let driver = async {
        tx.send(SessionCommand::Play).await.expect("send");

        sleep(Duration::from_millis(1_000)).await;
        assert_eq!(room.state().hidden_set(), [id("b")].into_iter().collect());

        sleep(Duration::from_millis(1_500)).await;
        assert!(room.state().hidden_set().is_empty(), "b shown at 2000");
        assert_eq!(room.state().order(), ids(&["a", "b"]));

        sleep(Duration::from_millis(1_000)).await;
        assert_eq!(room.state().order(), ids(&["b", "a"]), "reordered at 3000");

        sleep(Duration::from_millis(2_000)).await;
        assert_eq!(room.state().hidden_set(), [id("b")].into_iter().collect());

        tx.send(SessionCommand::Stop).await.expect("send");
        sleep(Duration::from_millis(10)).await;
        assert_eq!(room.state(), room_state());

        tx.send(SessionCommand::Shutdown).await.expect("send");
    };

    let (store, ()) = tokio::join!(session.run(rx), driver);
    assert!(!store.state().is_playing);
    let playhead = store.state().playhead_ms;
    assert!((5_400.0..=5_600.0).contains(&playhead), "playhead {playhead}");

    let saved = persistence
        .load_timeline(&room_id)
        .expect("load")
        .expect("saved on shutdown");
    assert_eq!(saved.playhead_ms, playhead);
}

#[tokio::test(start_paused = true)]
async fn playback_stops_itself_at_the_end() {
    init_tracing();
    let room = Arc::new(LocalRoom::new(room_state()));
    let persistence = Arc::new(MemoryStore::new());
    let room_id = room_id();
    persistence
        .save_timeline(&room_id, &fixture_snapshot())
        .expect("seed");

    let session = open_session(&room, &persistence, &room_id).await;
    let (tx, rx) = mpsc::channel(16);

    let driver = async {
        tx.send(SessionCommand::TogglePlay).await.expect("send");
        sleep(Duration::from_millis(11_000)).await;
        assert_eq!(room.state(), room_state());
        tx.send(SessionCommand::Shutdown).await.expect("send");
    };

    let (store, ()) = tokio::join!(session.run(rx), driver);
    assert!(!store.state().is_playing);
    assert_eq!(store.state().playhead_ms, 10_000.0);
}

#[tokio::test(start_paused = true)]
async fn edits_are_saved_once_after_the_debounce() {
    init_tracing();
    let room = Arc::new(LocalRoom::new(room_state()));
    let persistence = Arc::new(MemoryStore::new());
    let room_id = room_id();

    let session = open_session(&room, &persistence, &room_id).await;
    assert!(session.store().is_initialized());
    let (tx, rx) = mpsc::channel(16);

    let driver = async {
        sleep(Duration::from_millis(100)).await;
        tx.send(SessionCommand::Edit(TimelineAction::SetZoom {
            pixels_per_second: 100.0,
        }))
        .await
        .expect("send");
        sleep(Duration::from_millis(100)).await;
        tx.send(SessionCommand::Edit(TimelineAction::SetZoom {
            pixels_per_second: 120.0,
        }))
        .await
        .expect("send");
        sleep(Duration::from_millis(100)).await;
        tx.send(SessionCommand::Edit(TimelineAction::SetTotalDuration {
            ms: 20_000.0,
        }))
        .await
        .expect("send");

        sleep(Duration::from_millis(400)).await;
        assert!(persistence.load_timeline(&room_id).expect("load").is_none());

        sleep(Duration::from_millis(200)).await;
        let saved = persistence
            .load_timeline(&room_id)
            .expect("load")
            .expect("saved after debounce");
        assert_eq!(saved.pixels_per_second, 120.0);
        assert_eq!(saved.total_duration_ms, 20_000.0);

        tx.send(SessionCommand::Shutdown).await.expect("send");
    };

    tokio::join!(session.run(rx), driver);
}

#[tokio::test(start_paused = true)]
async fn room_changes_sync_tracks_outside_history() {
    init_tracing();
    let room = Arc::new(LocalRoom::new(room_state()));
    let persistence = Arc::new(MemoryStore::new());
    let session = open_session(&room, &persistence, &room_id()).await;
    let (tx, rx) = mpsc::channel(16);

    room.add_input(id("c"));
    room.remove_input(&id("a"));

    let driver = async {
        tx.send(SessionCommand::RoomChanged(room.state()))
            .await
            .expect("send");
        tx.send(SessionCommand::Undo).await.expect("send");
        tx.send(SessionCommand::Shutdown).await.expect("send");
    };

    let (store, ()) = tokio::join!(session.run(rx), driver);
    let tracks: Vec<InputId> = store.state().tracks.keys().cloned().collect();
    assert_eq!(tracks, ids(&["b", "c"]));
    assert!(!store.can_undo());
}

#[tokio::test(start_paused = true)]
async fn undo_after_an_input_leaves_keeps_it_gone() {
    init_tracing();
    let room = Arc::new(LocalRoom::new(room_state()));
    let persistence = Arc::new(MemoryStore::new());
    let room_id = room_id();
    let session = open_session(&room, &persistence, &room_id).await;
    let segment_id = session.store().state().tracks[&id("b")].segments[0]
        .id
        .clone();
    let (tx, rx) = mpsc::channel(16);

    let driver = async {
        tx.send(SessionCommand::Edit(TimelineAction::ResizeSegment {
            input_id: id("b"),
            segment_id,
            edge: SegmentEdge::End,
            new_ms: 5_000.0,
        }))
        .await
        .expect("send");
        sleep(Duration::from_millis(10)).await;

        room.remove_input(&id("b"));
        tx.send(SessionCommand::RoomChanged(room.state()))
            .await
            .expect("send");
        tx.send(SessionCommand::Undo).await.expect("send");
        tx.send(SessionCommand::Play).await.expect("send");
        sleep(Duration::from_millis(100)).await;

        let mentions_b = room.calls().into_iter().any(|call| match call {
            RoomCommand::Show(input) | RoomCommand::Hide(input) => input == id("b"),
            RoomCommand::SetOrder(order) => order.contains(&id("b")),
        });
        assert!(!mentions_b, "no calls for an input that left the room");

        tx.send(SessionCommand::Shutdown).await.expect("send");
    };

    let (store, ()) = tokio::join!(session.run(rx), driver);
    let tracks: Vec<InputId> = store.state().tracks.keys().cloned().collect();
    assert_eq!(tracks, ids(&["a"]));
    for kf in &store.state().order_keyframes {
        assert_eq!(kf.input_order, ids(&["a"]));
    }

    let saved = persistence
        .load_timeline(&room_id)
        .expect("load")
        .expect("saved on shutdown");
    assert!(!saved.tracks.contains_key(&id("b")));
}

#[tokio::test(start_paused = true)]
async fn remote_failures_do_not_halt_playback() {
    init_tracing();
    let room = Arc::new(LocalRoom::new(room_state()));
    let persistence = Arc::new(MemoryStore::new());
    let room_id = room_id();
    persistence
        .save_timeline(&room_id, &fixture_snapshot())
        .expect("seed");

    let session = open_session(&room, &persistence, &room_id).await;
    let (tx, rx) = mpsc::channel(16);

    let driver = async {
        tx.send(SessionCommand::Play).await.expect("send");
        sleep(Duration::from_millis(1_000)).await;

        room.set_failing(true);
        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(room.state().hidden_set(), [id("b")].into_iter().collect());
        room.set_failing(false);

        tx.send(SessionCommand::ApplyAtPlayhead).await.expect("send");
        sleep(Duration::from_millis(100)).await;
        assert!(room.state().hidden_set().is_empty());

        tx.send(SessionCommand::Shutdown).await.expect("send");
    };

    let (store, ()) = tokio::join!(session.run(rx), driver);
    assert!(store.state().playhead_ms > 2_500.0);
    assert_eq!(room.state(), room_state());
}
