//! End-to-end tests over real WebSocket connections.

mod helpers;

use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;

use parley_core::traits::UserDisplayInfo;
use parley_core::types::UserId;

use helpers::TestApp;

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::spawn().await;

    let response = reqwest::get(app.http_url("/api/health")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ws_upgrade_with_bad_token_is_401() {
    let app = TestApp::spawn().await;

    match connect_async(app.ws_url("not-a-jwt")).await {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 401),
        Err(other) => panic!("unexpected error {other:?}"),
        Ok(_) => panic!("upgrade should be refused"),
    }
    assert_eq!(app.hub.stats().connections, 0);
}

#[tokio::test]
async fn test_chat_round_trip() {
    let app = TestApp::spawn().await;
    let (alice_id, bob_id) = (UserId::new(), UserId::new());
    app.grant("t1", alice_id);
    app.grant("t1", bob_id);
    app.directory.insert(UserDisplayInfo {
        user_id: bob_id,
        display_name: "Bob".to_string(),
        avatar_url: None,
    });

    let mut alice = app.connect(alice_id, "alice").await;
    let mut bob = app.connect(bob_id, "bob").await;
    alice.join("t1").await;
    let joined = bob.join("t1").await;
    assert_eq!(joined["online_user_ids"].as_array().unwrap().len(), 2);

    let peer = alice.expect("room:peer_joined").await;
    assert_eq!(peer["user_id"], bob_id.to_string());
    assert_eq!(peer["display_name"], "Bob");

    alice
        .send(json!({"type": "message:send", "room_id": "t1", "content": "hi", "nonce": "n1"}))
        .await;
    let received = bob.expect("message:received").await;
    assert_eq!(received["content"], "hi");
    assert_eq!(received["sender_id"], alice_id.to_string());

    let ack = alice.expect("message:ack").await;
    assert_eq!(ack["status"], "DELIVERED");
    assert_eq!(ack["message_id"], received["message_id"]);

    bob.send(json!({"type": "message:seen", "message_id": received["message_id"]}))
        .await;
    let status = alice.expect("message:status").await;
    assert_eq!(status["status"], "SEEN");
}

#[tokio::test]
async fn test_call_flow() {
    let app = TestApp::spawn().await;
    let (alice_id, bob_id) = (UserId::new(), UserId::new());
    let mut alice = app.connect(alice_id, "alice").await;
    let mut bob = app.connect(bob_id, "bob").await;

    alice
        .send(json!({"type": "call:start", "callee_id": bob_id, "payload": {"sdp": "offer"}}))
        .await;
    let call_id = alice.expect("call:ringing").await["call_id"].clone();
    let incoming = bob.expect("call:incoming").await;
    assert_eq!(incoming["call_id"], call_id);
    assert_eq!(incoming["caller_name"], "alice");

    bob.send(json!({"type": "call:answer", "call_id": call_id, "payload": {"sdp": "answer"}}))
        .await;
    assert_eq!(alice.expect("call:accepted").await["payload"]["sdp"], "answer");

    alice
        .send(json!({"type": "call:signal", "call_id": call_id, "payload": {"candidate": "c1"}}))
        .await;
    let signal = bob.expect("call:signal").await;
    assert_eq!(signal["payload"]["candidate"], "c1");
    assert_eq!(signal["from_user_id"], alice_id.to_string());

    bob.send(json!({"type": "call:end", "call_id": call_id})).await;
    let ended = alice.expect("call:ended").await;
    assert_eq!(ended["reason"], "hangup");
}

#[tokio::test]
async fn test_socket_close_notifies_room_and_call_peer() {
    let app = TestApp::spawn().await;
    let (alice_id, bob_id) = (UserId::new(), UserId::new());
    app.grant("t1", alice_id);
    app.grant("t1", bob_id);

    let mut alice = app.connect(alice_id, "alice").await;
    let mut bob = app.connect(bob_id, "bob").await;
    alice.join("t1").await;
    bob.join("t1").await;

    alice.send(json!({"type": "call:start", "callee_id": bob_id})).await;
    alice.expect("call:ringing").await;
    bob.expect("call:incoming").await;

    bob.close().await;

    let left = alice.expect("room:peer_left").await;
    assert_eq!(left["user_id"], bob_id.to_string());
    assert_eq!(left["reason"], "disconnected");
    let ended = alice.expect("call:ended").await;
    assert_eq!(ended["reason"], "peer-disconnected");
}

#[tokio::test]
async fn test_heartbeat_and_errors() {
    let app = TestApp::spawn().await;
    let mut alice = app.connect(UserId::new(), "alice").await;

    alice.send(json!({"type": "heartbeat"})).await;
    assert!(alice.expect("heartbeat:ack").await["server_time"].is_string());

    alice.send(json!({"type": "room:join", "room_id": "private"})).await;
    let error = alice.expect("error").await;
    assert_eq!(error["code"], "FORBIDDEN");
    assert_eq!(error["event"], "room:join");

    alice.send(json!({"type": "nonsense"})).await;
    assert_eq!(alice.expect("error").await["code"], "INVALID_MESSAGE");
}

#[tokio::test]
async fn test_oversized_frame_is_rejected_without_closing() {
    let app = TestApp::spawn().await;
    let (alice_id, bob_id) = (UserId::new(), UserId::new());
    app.grant("t1", alice_id);

    let mut alice = app.connect(alice_id, "alice").await;
    let mut bob = app.connect(bob_id, "bob").await;
    alice.join("t1").await;

    alice.send(json!({"type": "call:start", "callee_id": bob_id})).await;
    let call_id = alice.expect("call:ringing").await["call_id"].clone();
    bob.expect("call:incoming").await;

    let content = "x".repeat(70 * 1024);
    alice
        .send(json!({"type": "message:send", "room_id": "t1", "content": content, "nonce": "big"}))
        .await;
    let error = alice.expect("error").await;
    assert_eq!(error["code"], "INVALID_MESSAGE");
    assert_eq!(error["event"], "message:send");

    // the connection and its call survive
    alice.send(json!({"type": "heartbeat"})).await;
    alice.expect("heartbeat:ack").await;
    assert_eq!(app.hub.stats().connections, 2);
    assert_eq!(app.hub.stats().active_calls, 1);

    alice
        .send(json!({"type": "call:signal", "call_id": call_id, "payload": {"candidate": "c1"}}))
        .await;
    let next = bob.next_event().await;
    assert_eq!(next["type"], "call:signal");
}
