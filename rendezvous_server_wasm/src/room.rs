//! Room data model: roles, message envelopes and per-role queues

use crate::config::{OverflowPolicy, QueueLimit};
use crate::error::SignalingError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// One of the two fixed participants of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The party that opened the room
    Host,
    /// The party that joined the host
    Guest,
}

impl Role {
    /// The other role in the room
    pub fn peer(self) -> Self {
        match self {
            Self::Host => Self::Guest,
            Self::Guest => Self::Host,
        }
    }

    /// Wire name of the role
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Guest => "guest",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SignalingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(Self::Host),
            "guest" => Ok(Self::Guest),
            _ => Err(SignalingError::InvalidRole),
        }
    }
}

/// Envelope around one opaque payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Forwarded verbatim; never inspected by the relay
    pub payload: Value,
}

impl Message {
    /// Wrap a user payload
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// `{type: "ready"}` control message
    pub fn ready() -> Self {
        Self::new(json!({ "type": "ready" }))
    }

    /// `{type: "peer-left"}` control message
    pub fn peer_left() -> Self {
        Self::new(json!({ "type": "peer-left" }))
    }
}

/// Pull-style FIFO buffer: append at the back, drain everything at once.
///
/// There is no way to peek or partially consume; a drain hands every queued
/// message to the caller and leaves the queue empty.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageQueue {
    messages: VecDeque<Message>,
}

impl MessageQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message, applying `limit`
    pub fn push(&mut self, message: Message, limit: QueueLimit) -> Result<(), SignalingError> {
        if let QueueLimit::Bounded { capacity, overflow } = limit {
            if self.messages.len() >= capacity.get() {
                match overflow {
                    OverflowPolicy::Reject => return Err(SignalingError::QueueFull),
                    OverflowPolicy::DropOldest => self.evict_to(capacity.get() - 1),
                }
            }
        }
        self.messages.push_back(message);
        Ok(())
    }

    /// Append a control message. Never refused; under
    /// [`OverflowPolicy::Reject`] it may exceed the bound.
    pub fn push_control(&mut self, message: Message, limit: QueueLimit) {
        if let QueueLimit::Bounded {
            capacity,
            overflow: OverflowPolicy::DropOldest,
        } = limit
        {
            self.evict_to(capacity.get() - 1);
        }
        self.messages.push_back(message);
    }

    /// Remove and return every queued message in arrival order
    pub fn drain_all(&mut self) -> Vec<Message> {
        self.messages.drain(..).collect()
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn evict_to(&mut self, keep: usize) {
        let excess = self.messages.len().saturating_sub(keep);
        if excess > 0 {
            warn!("Queue full, dropping {} oldest message(s)", excess);
            self.messages.drain(..excess);
        }
    }
}

/// Presence flags and inbound queues for one room
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    host_present: bool,
    guest_present: bool,
    /// Messages destined for the host
    host_queue: MessageQueue,
    /// Messages destined for the guest
    guest_queue: MessageQueue,
}

impl Room {
    /// A room with both roles absent and empty queues
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `role` is currently joined
    pub fn is_present(&self, role: Role) -> bool {
        match role {
            Role::Host => self.host_present,
            Role::Guest => self.guest_present,
        }
    }

    /// Set the presence flag of `role`, returning the previous value
    pub fn set_present(&mut self, role: Role, present: bool) -> bool {
        let flag = match role {
            Role::Host => &mut self.host_present,
            Role::Guest => &mut self.guest_present,
        };
        std::mem::replace(flag, present)
    }

    /// Both roles joined
    pub fn both_present(&self) -> bool {
        self.host_present && self.guest_present
    }

    /// Neither role joined
    pub fn is_vacant(&self) -> bool {
        !self.host_present && !self.guest_present
    }

    /// Queue of messages destined for `role`
    pub fn queue(&self, role: Role) -> &MessageQueue {
        match role {
            Role::Host => &self.host_queue,
            Role::Guest => &self.guest_queue,
        }
    }

    /// Mutable queue of messages destined for `role`
    pub fn queue_mut(&mut self, role: Role) -> &mut MessageQueue {
        match role {
            Role::Host => &mut self.host_queue,
            Role::Guest => &mut self.guest_queue,
        }
    }
}
