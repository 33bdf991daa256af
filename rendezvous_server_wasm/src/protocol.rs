//! Signaling protocol: request decoding and the join/send/recv/leave operations
//!
//! A request names a room and a role. Validation happens up front, so a
//! rejected request never touches a room. Each accepted request is applied
//! inside a single registry transaction.

use crate::config::ReadyMode;
use crate::error::SignalingError;
use crate::room::{Message, Role};
use crate::state::{RoomId, ServerState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

/// Operation named by the `action` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Mark the role present
    Join,
    /// Queue a payload for the other role
    Send,
    /// Drain the role's own queue
    Recv,
    /// Mark the role absent
    Leave,
}

impl FromStr for Action {
    type Err = SignalingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "join" => Ok(Self::Join),
            "send" => Ok(Self::Send),
            "recv" => Ok(Self::Recv),
            "leave" => Ok(Self::Leave),
            _ => Err(SignalingError::UnknownAction),
        }
    }
}

/// Validated operation with its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Join the room
    Join,
    /// Forward `payload` to the peer
    Send(Value),
    /// Drain pending messages
    Recv,
    /// Leave the room
    Leave,
}

/// A fully validated signaling request
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRequest {
    /// Target room
    pub room_id: RoomId,
    /// Role of the caller
    pub role: Role,
    /// What to do
    pub command: Command,
}

/// Request body as it arrives on the wire
#[derive(Debug, Default, Deserialize)]
struct RawRequest {
    action: Option<String>,
    #[serde(rename = "roomCode")]
    room_code: Option<String>,
    role: Option<String>,
    payload: Option<Value>,
}

impl SignalRequest {
    /// Decode and validate a JSON request body.
    ///
    /// An empty body, and any JSON value that is not an object, carries no
    /// fields and is treated as an empty object.
    pub fn from_json(body: &str) -> Result<Self, SignalingError> {
        let value = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(body)?
        };
        let raw = match value {
            Value::Object(_) => serde_json::from_value(value)?,
            _ => RawRequest::default(),
        };
        Self::validate(raw)
    }

    fn validate(raw: RawRequest) -> Result<Self, SignalingError> {
        let non_empty = |field: Option<String>| field.filter(|s| !s.is_empty());
        let (Some(room_code), Some(role)) = (non_empty(raw.room_code), non_empty(raw.role)) else {
            return Err(SignalingError::MissingRequiredField);
        };
        let role = role.parse::<Role>()?;

        let action = raw
            .action
            .as_deref()
            .ok_or(SignalingError::UnknownAction)?
            .parse::<Action>()?;

        let command = match action {
            Action::Join => Command::Join,
            Action::Send => Command::Send(raw.payload.ok_or(SignalingError::MissingPayload)?),
            Action::Recv => Command::Recv,
            Action::Leave => Command::Leave,
        };

        Ok(Self {
            room_id: RoomId(room_code),
            role,
            command,
        })
    }
}

/// Successful response body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalResponse {
    /// Always `true`
    pub ok: bool,
    /// Drained messages; only present for `recv`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}

impl SignalResponse {
    /// Plain acknowledgment
    pub fn ack() -> Self {
        Self {
            ok: true,
            messages: None,
        }
    }

    /// Acknowledgment carrying drained messages
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            ok: true,
            messages: Some(messages),
        }
    }
}

impl ServerState {
    /// Decode a request body and apply it
    pub fn handle_body(&self, body: &str) -> Result<SignalResponse, SignalingError> {
        let request = SignalRequest::from_json(body)?;
        self.execute(request)
    }

    /// Apply a validated request
    pub fn execute(&self, request: SignalRequest) -> Result<SignalResponse, SignalingError> {
        let SignalRequest {
            room_id,
            role,
            command,
        } = request;

        match command {
            Command::Join => {
                self.join(&room_id, role)?;
                Ok(SignalResponse::ack())
            }
            Command::Send(payload) => {
                self.send(&room_id, role, payload)?;
                Ok(SignalResponse::ack())
            }
            Command::Recv => Ok(SignalResponse::with_messages(self.recv(&room_id, role)?)),
            Command::Leave => {
                self.leave(&room_id, role)?;
                Ok(SignalResponse::ack())
            }
        }
    }

    /// Mark `role` present, creating the room if needed.
    ///
    /// When both roles end up present a `ready` message is queued for each.
    /// Under [`ReadyMode::EveryJoin`] this repeats on every join, including
    /// redundant ones; under [`ReadyMode::Transition`] only the join that
    /// completes the pair emits it.
    pub fn join(&self, room_id: &RoomId, role: Role) -> Result<(), SignalingError> {
        let limit = self.config().queue_limit;
        let mode = self.config().ready_mode;

        self.transact(|rooms| {
            let room = rooms.get_or_create(room_id);
            let was_present = room.set_present(role, true);
            debug!("{} joined room {}", role, room_id);

            let emit = match mode {
                ReadyMode::EveryJoin => room.both_present(),
                ReadyMode::Transition => room.both_present() && !was_present,
            };
            if emit {
                debug!("Room {} ready", room_id);
                room.queue_mut(Role::Host).push_control(Message::ready(), limit);
                room.queue_mut(Role::Guest).push_control(Message::ready(), limit);
            }
            Ok(())
        })
    }

    /// Queue `payload` for the other role. Presence is not required.
    pub fn send(&self, room_id: &RoomId, role: Role, payload: Value) -> Result<(), SignalingError> {
        let limit = self.config().queue_limit;

        self.transact(|rooms| {
            rooms
                .get_or_create(room_id)
                .queue_mut(role.peer())
                .push(Message::new(payload), limit)
        })
    }

    /// Drain every message queued for `role`.
    ///
    /// Never blocks; an unknown room yields an empty list and is not created.
    pub fn recv(&self, room_id: &RoomId, role: Role) -> Result<Vec<Message>, SignalingError> {
        self.transact(|rooms| {
            Ok(rooms
                .get_mut(room_id)
                .map(|room| room.queue_mut(role).drain_all())
                .unwrap_or_default())
        })
    }

    /// Mark `role` absent and notify the other role with `peer-left`.
    ///
    /// The room, including undrained messages, is deleted once neither role
    /// is present.
    pub fn leave(&self, room_id: &RoomId, role: Role) -> Result<(), SignalingError> {
        let limit = self.config().queue_limit;

        self.transact(|rooms| {
            let room = rooms.get_or_create(room_id);
            room.set_present(role, false);
            room.queue_mut(role.peer()).push_control(Message::peer_left(), limit);
            debug!("{} left room {}", role, room_id);

            if room.is_vacant() {
                rooms.delete(room_id);
            }
            Ok(())
        })
    }
}
