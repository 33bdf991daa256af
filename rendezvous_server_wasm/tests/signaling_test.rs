//! Signaling protocol tests

use rendezvous_server_wasm::{
    Message, OverflowPolicy, QueueLimit, Role, RoomId, ServerConfig, ServerState, SignalingError,
};
use serde_json::{Value, json};
use std::num::NonZeroUsize;

fn request(state: &ServerState, body: Value) -> Value {
    match state.handle_body(&body.to_string()) {
        Ok(reply) => serde_json::to_value(reply).unwrap(),
        Err(err) => json!({ "error": err.to_string() }),
    }
}

fn payloads(messages: Vec<Message>) -> Vec<Value> {
    messages.into_iter().map(|m| m.payload).collect()
}

#[test]
fn send_then_recv_returns_payloads_in_order_once() {
    let state = ServerState::new();
    let room = RoomId::from("R");

    for i in 0..4 {
        state.send(&room, Role::Host, json!({ "candidate": i })).unwrap();
    }

    assert_eq!(
        payloads(state.recv(&room, Role::Guest).unwrap()),
        (0..4).map(|i| json!({ "candidate": i })).collect::<Vec<_>>()
    );
    assert!(state.recv(&room, Role::Guest).unwrap().is_empty());
    assert!(state.recv(&room, Role::Host).unwrap().is_empty());
}

#[test]
fn concrete_handshake_scenario() {
    let state = ServerState::new();

    assert_eq!(
        request(&state, json!({ "action": "join", "roomCode": "R", "role": "host" })),
        json!({ "ok": true })
    );
    assert_eq!(
        request(&state, json!({ "action": "join", "roomCode": "R", "role": "guest" })),
        json!({ "ok": true })
    );
    assert_eq!(
        request(&state, json!({ "action": "recv", "roomCode": "R", "role": "host" })),
        json!({ "ok": true, "messages": [{ "payload": { "type": "ready" } }] })
    );
    assert_eq!(
        request(&state, json!({ "action": "recv", "roomCode": "R", "role": "host" })),
        json!({ "ok": true, "messages": [] })
    );
    assert_eq!(
        request(
            &state,
            json!({ "action": "send", "roomCode": "R", "role": "host", "payload": { "sdp": "offer" } })
        ),
        json!({ "ok": true })
    );
    assert_eq!(
        request(&state, json!({ "action": "recv", "roomCode": "R", "role": "guest" })),
        json!({
            "ok": true,
            "messages": [
                { "payload": { "type": "ready" } },
                { "payload": { "sdp": "offer" } }
            ]
        })
    );
}

#[test]
fn redundant_join_requeues_ready() {
    let state = ServerState::new();
    let room = RoomId::from("R");

    state.join(&room, Role::Host).unwrap();
    state.join(&room, Role::Guest).unwrap();
    state.join(&room, Role::Host).unwrap();

    assert_eq!(
        state.recv(&room, Role::Host).unwrap(),
        vec![Message::ready(), Message::ready()]
    );
    assert_eq!(
        state.recv(&room, Role::Guest).unwrap(),
        vec![Message::ready(), Message::ready()]
    );
}

#[test]
fn single_join_does_not_emit_ready() {
    let state = ServerState::new();
    let room = RoomId::from("R");

    state.join(&room, Role::Host).unwrap();
    state.join(&room, Role::Host).unwrap();

    assert!(state.recv(&room, Role::Host).unwrap().is_empty());
    assert!(state.recv(&room, Role::Guest).unwrap().is_empty());
}

#[test]
fn leave_notifies_peer_even_if_never_joined() {
    let state = ServerState::new();
    let room = RoomId::from("R");

    state.join(&room, Role::Host).unwrap();
    state.send(&room, Role::Host, json!("offer")).unwrap();
    state.join(&room, Role::Host).unwrap();
    state.leave(&room, Role::Guest).unwrap();

    // Guest leaving while host stays keeps the room alive.
    assert!(state.has_room(&room).unwrap());
    assert_eq!(state.recv(&room, Role::Host).unwrap(), vec![Message::peer_left()]);

    state.join(&room, Role::Guest).unwrap();
    let _ = state.recv(&room, Role::Guest).unwrap();
    state.leave(&room, Role::Host).unwrap();
    assert_eq!(state.recv(&room, Role::Guest).unwrap(), vec![Message::peer_left()]);
}

#[test]
fn send_does_not_require_presence() {
    let state = ServerState::new();
    let room = RoomId::from("lobby");

    state.send(&room, Role::Guest, json!({ "answer": true })).unwrap();
    assert!(state.has_room(&room).unwrap());
    assert_eq!(payloads(state.recv(&room, Role::Host).unwrap()), vec![json!({ "answer": true })]);
}

#[test]
fn recv_on_unknown_room_is_empty_and_creates_nothing() {
    let state = ServerState::new();
    assert!(state.recv(&RoomId::from("nowhere"), Role::Host).unwrap().is_empty());
    assert_eq!(state.room_count().unwrap(), 0);
}

#[test]
fn empty_room_is_garbage_collected() {
    let state = ServerState::new();
    let room = RoomId::from("R");

    state.join(&room, Role::Host).unwrap();
    state.join(&room, Role::Guest).unwrap();
    state.send(&room, Role::Guest, json!("never read")).unwrap();
    state.leave(&room, Role::Host).unwrap();
    assert!(state.has_room(&room).unwrap());
    state.leave(&room, Role::Guest).unwrap();
    assert!(!state.has_room(&room).unwrap());

    state.join(&room, Role::Host).unwrap();
    assert!(state.recv(&room, Role::Host).unwrap().is_empty());
    assert!(state.recv(&room, Role::Guest).unwrap().is_empty());
}

#[test]
fn leave_on_unknown_room_leaves_nothing_behind() {
    let state = ServerState::new();
    state.leave(&RoomId::from("ghost"), Role::Host).unwrap();
    assert_eq!(state.room_count().unwrap(), 0);
}

#[test]
fn rooms_are_independent() {
    let state = ServerState::new();
    let a = RoomId::from("a");
    let b = RoomId::from("b");

    state.send(&a, Role::Host, json!("for a")).unwrap();
    state.join(&b, Role::Host).unwrap();
    state.join(&b, Role::Guest).unwrap();

    assert_eq!(payloads(state.recv(&a, Role::Guest).unwrap()), vec![json!("for a")]);
    assert_eq!(state.recv(&b, Role::Guest).unwrap(), vec![Message::ready()]);
    assert!(state.recv(&a, Role::Host).unwrap().is_empty());
}

#[test]
fn validation_errors() {
    let state = ServerState::new();

    assert_eq!(
        request(&state, json!({ "action": "join", "roomCode": "R", "role": "moderator" })),
        json!({ "error": "role must be 'host' or 'guest'" })
    );
    assert_eq!(
        request(&state, json!({ "action": "send", "roomCode": "R", "role": "host" })),
        json!({ "error": "payload is required for send" })
    );
    assert_eq!(
        request(&state, json!({ "action": "teleport", "roomCode": "R", "role": "host" })),
        json!({ "error": "Unknown action" })
    );
    assert_eq!(
        request(&state, json!({ "action": "join", "role": "host" })),
        json!({ "error": "roomCode and role are required" })
    );
    assert_eq!(state.room_count().unwrap(), 0);
}

#[test]
fn reject_policy_refuses_sends_beyond_capacity() {
    let state = ServerState::with_config(ServerConfig {
        queue_limit: QueueLimit::Bounded {
            capacity: NonZeroUsize::new(2).unwrap(),
            overflow: OverflowPolicy::Reject,
        },
        ..ServerConfig::default()
    });
    let room = RoomId::from("R");

    state.join(&room, Role::Guest).unwrap();
    state.send(&room, Role::Host, json!(1)).unwrap();
    state.send(&room, Role::Host, json!(2)).unwrap();
    assert_eq!(
        state.send(&room, Role::Host, json!(3)),
        Err(SignalingError::QueueFull)
    );

    // Notifications still get through.
    state.leave(&room, Role::Host).unwrap();
    assert_eq!(
        payloads(state.recv(&room, Role::Guest).unwrap()),
        vec![json!(1), json!(2), json!({ "type": "peer-left" })]
    );
}

#[test]
fn drop_oldest_policy_keeps_latest_messages() {
    let state = ServerState::with_config(ServerConfig {
        queue_limit: QueueLimit::Bounded {
            capacity: NonZeroUsize::new(3).unwrap(),
            overflow: OverflowPolicy::DropOldest,
        },
        ..ServerConfig::default()
    });
    let room = RoomId::from("R");

    for i in 0..10 {
        state.send(&room, Role::Guest, json!(i)).unwrap();
    }
    assert_eq!(
        payloads(state.recv(&room, Role::Host).unwrap()),
        vec![json!(7), json!(8), json!(9)]
    );
}

#[test]
fn file_backed_states_share_rooms() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        state_file: Some(dir.path().join("rooms.json")),
        ..ServerConfig::default()
    };
    let host_side = ServerState::with_config(config.clone());
    let guest_side = ServerState::with_config(config);
    let room = RoomId::from("shared");

    host_side.join(&room, Role::Host).unwrap();
    guest_side.join(&room, Role::Guest).unwrap();
    host_side.send(&room, Role::Host, json!({ "sdp": "offer" })).unwrap();

    assert_eq!(
        payloads(guest_side.recv(&room, Role::Guest).unwrap()),
        vec![json!({ "type": "ready" }), json!({ "sdp": "offer" })]
    );

    host_side.leave(&room, Role::Host).unwrap();
    guest_side.leave(&room, Role::Guest).unwrap();
    assert_eq!(host_side.room_count().unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_senders_preserve_per_sender_order() {
    let state = ServerState::new();
    let room = RoomId::from("busy");

    let mut tasks = Vec::new();
    for role in [Role::Host, Role::Guest] {
        let state = state.clone();
        let room = room.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..200 {
                state.send(&room, role, json!(i)).unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for role in [Role::Host, Role::Guest] {
        assert_eq!(
            payloads(state.recv(&room, role).unwrap()),
            (0..200).map(|i| json!(i)).collect::<Vec<_>>()
        );
    }
}

#[test]
fn unwritable_state_file_refuses_instead_of_acknowledging() {
    let dir = tempfile::tempdir().unwrap();
    let state = ServerState::with_config(ServerConfig {
        state_file: Some(dir.path().join("no_such_dir").join("rooms.json")),
        ..ServerConfig::default()
    });
    let room = RoomId::from("R");

    assert!(matches!(
        state.send(&room, Role::Host, json!({ "sdp": "offer" })),
        Err(SignalingError::Storage(_))
    ));
    let reply = request(
        &state,
        json!({ "action": "send", "roomCode": "R", "role": "host", "payload": { "sdp": "offer" } }),
    );
    assert!(reply.get("ok").is_none(), "{reply}");
    assert!(reply["error"].as_str().unwrap().starts_with("State storage failed"));
}

#[test]
fn unreadable_state_file_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rooms.json");
    std::fs::write(&path, "[truncated").unwrap();
    let state = ServerState::with_config(ServerConfig {
        state_file: Some(path.clone()),
        ..ServerConfig::default()
    });

    assert!(matches!(
        state.join(&RoomId::from("R"), Role::Host),
        Err(SignalingError::Storage(_))
    ));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[truncated");
}
