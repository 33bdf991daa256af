//! WASI-compatible host/guest rendezvous relay using wstd
//!
//! Two parties, a `host` and a `guest`, exchange opaque handshake messages
//! (for example WebRTC session descriptions) through a shared room without a
//! persistent connection. Each side polls; the relay buffers whatever was
//! sent to it until its next poll.
//!
//! # Protocol
//!
//! Every request is a `POST` with a JSON body:
//!
//! ```json
//! {"action": "join" | "send" | "recv" | "leave",
//!  "roomCode": "<room>",
//!  "role": "host" | "guest",
//!  "payload": <any, send only>}
//! ```
//!
//! - **join** marks the role present. Whenever both roles are present after
//!   a join, `{"type":"ready"}` is queued for each of them.
//! - **send** queues `payload` for the other role.
//! - **recv** returns and removes everything queued for the caller.
//! - **leave** marks the role absent and queues `{"type":"peer-left"}` for
//!   the other role. A room nobody is in is deleted with its queues.
//!
//! ## Responses
//!
//! ```json
//! {"ok": true}
//! {"ok": true, "messages": [{"payload": ...}, ...]}
//! {"error": "Unknown action"}
//! ```
//!
//! # Example
//!
//! ```bash
//! # Start the server
//! wasmtime serve -S common --addr 127.0.0.1:3536 rendezvous-signaling-wasm.wasm
//!
//! curl -X POST -d '{"action":"join","roomCode":"abc","role":"host"}' http://127.0.0.1:3536/
//! curl -X POST -d '{"action":"recv","roomCode":"abc","role":"host"}' http://127.0.0.1:3536/
//! ```
//!
//! Rooms live in the memory of one [`ServerState`]. Instances that do not
//! share a state cannot see each other's rooms; set `RENDEZVOUS_STATE_FILE`
//! to have them share a JSON file instead.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod room;
pub mod state;

pub use config::{OverflowPolicy, QueueLimit, ReadyMode, ServerConfig};
pub use error::{ConfigError, SignalingError};
pub use handler::handle_request;
pub use protocol::{Action, Command, SignalRequest, SignalResponse};
pub use room::{Message, MessageQueue, Role, Room};
pub use state::{RoomId, RoomRegistry, ServerState};
