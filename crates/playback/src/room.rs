//! The remote room boundary.
//!
//! A room is the compositor that actually shows inputs. The scheduler only
//! ever talks to it through `RoomService`; `LocalRoom` is an in-process
//! implementation used for offline previews and tests.

use std::collections::BTreeSet;
use std::future::Future;

use parking_lot::Mutex;
use rl_common::{InputId, RoomError, RoomResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One source as the room reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInput {
    pub input_id: InputId,
    pub hidden: bool,
}

/// Live room state. Vector order is the compositor stacking order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    pub inputs: Vec<RoomInput>,
}

impl RoomState {
    /// All inputs visible, stacked in the given order.
    pub fn visible(inputs: impl IntoIterator<Item = InputId>) -> Self {
        Self {
            inputs: inputs
                .into_iter()
                .map(|input_id| RoomInput {
                    input_id,
                    hidden: false,
                })
                .collect(),
        }
    }

    pub fn input_ids(&self) -> Vec<InputId> {
        self.inputs.iter().map(|i| i.input_id.clone()).collect()
    }

    /// Current stacking order.
    pub fn order(&self) -> Vec<InputId> {
        self.input_ids()
    }

    pub fn hidden_set(&self) -> BTreeSet<InputId> {
        self.inputs
            .iter()
            .filter(|i| i.hidden)
            .map(|i| i.input_id.clone())
            .collect()
    }

    /// `Some(true)` if the input is shown, `None` if the room does not know it.
    pub fn is_visible(&self, input_id: &InputId) -> Option<bool> {
        self.inputs
            .iter()
            .find(|i| &i.input_id == input_id)
            .map(|i| !i.hidden)
    }

    /// Record the effect of a command that the room acknowledged.
    pub fn apply(&mut self, command: &RoomCommand) -> RoomResult<()> {
        match command {
            RoomCommand::Show(id) | RoomCommand::Hide(id) => {
                let input = self
                    .inputs
                    .iter_mut()
                    .find(|i| &i.input_id == id)
                    .ok_or_else(|| RoomError::UnknownInput(id.clone()))?;
                input.hidden = matches!(command, RoomCommand::Hide(_));
            }
            RoomCommand::SetOrder(order) => {
                // Listed inputs move to the front in the given order; unlisted
                // ones keep their relative order behind them. Unknown ids are ignored.
                let mut rest = std::mem::take(&mut self.inputs);
                for id in order {
                    if let Some(pos) = rest.iter().position(|i| &i.input_id == id) {
                        self.inputs.push(rest.remove(pos));
                    }
                }
                self.inputs.extend(rest);
            }
        }
        Ok(())
    }
}

/// The compositor service a room session drives.
///
/// All calls are idempotent. Futures are not required to be `Send`: the
/// session loop runs on a single task.
pub trait RoomService {
    fn show_input(&self, input_id: &InputId) -> impl Future<Output = RoomResult<()>>;

    fn hide_input(&self, input_id: &InputId) -> impl Future<Output = RoomResult<()>>;

    /// Replace the stacking order.
    fn set_input_order(&self, order: &[InputId]) -> impl Future<Output = RoomResult<()>>;

    fn get_room_state(&self) -> impl Future<Output = RoomResult<RoomState>>;
}

/// A single remote call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "arg", rename_all = "camelCase")]
pub enum RoomCommand {
    Show(InputId),
    Hide(InputId),
    SetOrder(Vec<InputId>),
}

impl RoomCommand {
    pub fn visibility(input_id: InputId, visible: bool) -> Self {
        if visible {
            RoomCommand::Show(input_id)
        } else {
            RoomCommand::Hide(input_id)
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            RoomCommand::Show(_) => "show_input",
            RoomCommand::Hide(_) => "hide_input",
            RoomCommand::SetOrder(_) => "set_input_order",
        }
    }

    /// Issue the call and return its raw result.
    pub async fn send<R: RoomService>(&self, room: &R) -> RoomResult<()> {
        match self {
            RoomCommand::Show(id) => room.show_input(id).await,
            RoomCommand::Hide(id) => room.hide_input(id).await,
            RoomCommand::SetOrder(order) => room.set_input_order(order).await,
        }
    }

    /// Issue the call, logging and swallowing any failure. Returns whether the
    /// room acknowledged it.
    pub async fn execute<R: RoomService>(&self, room: &R) -> bool {
        match self.send(room).await {
            Ok(()) => true,
            Err(e) => {
                warn!(operation = self.operation(), error = %e, "Room call failed");
                false
            }
        }
    }
}

#[derive(Debug, Default)]
struct LocalRoomInner {
    state: RoomState,
    calls: Vec<RoomCommand>,
    failing: bool,
}

/// In-memory room with a call log and failure injection.
#[derive(Debug, Default)]
pub struct LocalRoom {
    inner: Mutex<LocalRoomInner>,
}

impl LocalRoom {
    pub fn new(state: RoomState) -> Self {
        Self {
            inner: Mutex::new(LocalRoomInner {
                state,
                ..Default::default()
            }),
        }
    }

    /// Snapshot of the room as it is now.
    pub fn state(&self) -> RoomState {
        self.inner.lock().state.clone()
    }

    /// Every show/hide/order call received so far, failed ones included.
    pub fn calls(&self) -> Vec<RoomCommand> {
        self.inner.lock().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<RoomCommand> {
        std::mem::take(&mut self.inner.lock().calls)
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    /// While set, every call (state queries included) fails.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }

    /// A new source joins the room, visible and stacked on top.
    pub fn add_input(&self, input_id: InputId) {
        let mut inner = self.inner.lock();
        if inner.state.is_visible(&input_id).is_none() {
            inner.state.inputs.push(RoomInput {
                input_id,
                hidden: false,
            });
        }
    }

    pub fn remove_input(&self, input_id: &InputId) {
        self.inner
            .lock()
            .state
            .inputs
            .retain(|i| &i.input_id != input_id);
    }

    /// Set visibility directly, bypassing the call log.
    pub fn force_hidden(&self, input_id: &InputId, hidden: bool) {
        let mut inner = self.inner.lock();
        if let Some(input) = inner
            .state
            .inputs
            .iter_mut()
            .find(|i| &i.input_id == input_id)
        {
            input.hidden = hidden;
        }
    }

    fn handle(&self, command: RoomCommand) -> RoomResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(command.clone());
        if inner.failing {
            return Err(RoomError::Unavailable("local room is failing".into()));
        }
        debug!(operation = command.operation(), "Local room call");
        inner.state.apply(&command)
    }
}

impl RoomService for LocalRoom {
    async fn show_input(&self, input_id: &InputId) -> RoomResult<()> {
        self.handle(RoomCommand::Show(input_id.clone()))
    }

    async fn hide_input(&self, input_id: &InputId) -> RoomResult<()> {
        self.handle(RoomCommand::Hide(input_id.clone()))
    }

    async fn set_input_order(&self, order: &[InputId]) -> RoomResult<()> {
        self.handle(RoomCommand::SetOrder(order.to_vec()))
    }

    async fn get_room_state(&self) -> RoomResult<RoomState> {
        let inner = self.inner.lock();
        if inner.failing {
            return Err(RoomError::Unavailable("local room is failing".into()));
        }
        Ok(inner.state.clone())
    }
}
