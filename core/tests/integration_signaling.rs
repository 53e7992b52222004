//! End-to-end signaling over real WebSocket connections.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use ringline_core::push::PushError;
use ringline_core::{
    MemoryPresenceStore, PresenceStatus, PushNotifier, RelayConfig, RelayServer, WakeupPush,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct RecordingNotifier {
    sent: UnboundedSender<(String, WakeupPush)>,
}

#[async_trait]
impl PushNotifier for RecordingNotifier {
    async fn send_wakeup(&self, token: &str, push: WakeupPush) -> Result<(), PushError> {
        let _ = self.sent.send((token.to_string(), push));
        Ok(())
    }
}

struct TestRelay {
    addr: SocketAddr,
    store: MemoryPresenceStore,
    pushes: UnboundedReceiver<(String, WakeupPush)>,
}

async fn start_relay() -> TestRelay {
    let store = MemoryPresenceStore::new();
    let (push_tx, pushes) = mpsc::unbounded_channel();
    let config = RelayConfig {
        bind: "127.0.0.1:0".parse().unwrap(),
        ..Default::default()
    };
    let server = RelayServer::new(
        config,
        Arc::new(store.clone()),
        Arc::new(RecordingNotifier { sent: push_tx }),
    );
    let bound = server.bind().await.expect("Failed to bind");
    let addr = bound.local_addr();
    tokio::spawn(bound.run());
    TestRelay {
        addr,
        store,
        pushes,
    }
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}", addr))
        .await
        .expect("Failed to connect");
    client
}

async fn send(client: &mut Client, event: Value) {
    client
        .send(Message::Text(event.to_string()))
        .await
        .expect("Failed to send");
}

async fn recv(client: &mut Client) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("Timed out waiting for event")
            .expect("Connection closed")
            .expect("Socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("Non-JSON frame");
        }
    }
}

async fn expect_silence(client: &mut Client) {
    let outcome = timeout(Duration::from_millis(300), client.next()).await;
    assert!(outcome.is_err(), "expected no event, got {:?}", outcome);
}

async fn register(client: &mut Client, user_id: &str, push_token: Option<&str>) {
    let mut data = json!({ "userId": user_id });
    if let Some(token) = push_token {
        data["pushToken"] = json!(token);
    }
    send(client, json!({ "event": "register", "data": data })).await;
}

/// Registration takes effect asynchronously to the client; poll the shared
/// store until the endpoint binding lands.
async fn wait_until_online(store: &MemoryPresenceStore, user_id: &str) {
    use ringline_core::PresenceStore;
    for _ in 0..100 {
        if let Ok(Some(record)) = store.get(user_id).await {
            if record.status == PresenceStatus::Online {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never came online", user_id);
}

async fn wait_until_offline(store: &MemoryPresenceStore, user_id: &str) {
    use ringline_core::PresenceStore;
    for _ in 0..100 {
        if let Ok(Some(record)) = store.get(user_id).await {
            if record.status == PresenceStatus::Offline {
                assert_eq!(record.endpoint_id, None);
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never went offline", user_id);
}

#[tokio::test]
async fn test_full_call_negotiation_roundtrip() {
    let relay = start_relay().await;
    let mut alice = connect(relay.addr).await;
    let mut bob = connect(relay.addr).await;

    register(&mut alice, "alice", None).await;
    register(&mut bob, "bob", None).await;
    wait_until_online(&relay.store, "alice").await;
    wait_until_online(&relay.store, "bob").await;

    // Offer reaches bob tagged with the caller
    send(
        &mut alice,
        json!({ "event": "offer", "data": { "offer": { "sdp": "v=0 alice" }, "from": "alice", "to": "bob" } }),
    )
    .await;
    let event = recv(&mut bob).await;
    assert_eq!(event["event"], "offer");
    assert_eq!(event["data"]["from"], "alice");
    assert_eq!(event["data"]["offer"]["sdp"], "v=0 alice");

    // Answer comes back without a from field
    send(
        &mut bob,
        json!({ "event": "answer", "data": { "answer": { "sdp": "v=0 bob" }, "from": "bob", "to": "alice" } }),
    )
    .await;
    let event = recv(&mut alice).await;
    assert_eq!(event["event"], "answer");
    assert_eq!(event["data"]["answer"]["sdp"], "v=0 bob");
    assert_eq!(event["data"].get("from"), None);

    // Candidates flow both ways
    send(
        &mut bob,
        json!({ "event": "ice-candidate", "data": { "candidate": { "sdpMid": "0" }, "to": "alice" } }),
    )
    .await;
    let event = recv(&mut alice).await;
    assert_eq!(event["event"], "ice-candidate");
    assert_eq!(event["data"]["candidate"]["sdpMid"], "0");

    // Teardown relays with an empty payload
    send(&mut alice, json!({ "event": "end-call", "data": { "to": "bob" } })).await;
    let event = recv(&mut bob).await;
    assert_eq!(event["event"], "end-call");
}

#[tokio::test]
async fn test_disconnect_flips_presence_and_offer_falls_back_to_push() {
    let mut relay = start_relay().await;
    let mut alice = connect(relay.addr).await;
    let mut bob = connect(relay.addr).await;

    register(&mut alice, "alice", None).await;
    register(&mut bob, "bob", Some("tok-bob")).await;
    wait_until_online(&relay.store, "bob").await;
    wait_until_online(&relay.store, "alice").await;

    bob.close(None).await.expect("Failed to close");
    wait_until_offline(&relay.store, "bob").await;

    send(
        &mut alice,
        json!({ "event": "offer", "data": { "offer": {}, "from": "alice", "to": "bob" } }),
    )
    .await;

    let (token, push) = timeout(Duration::from_secs(2), relay.pushes.recv())
        .await
        .expect("Push not sent")
        .expect("Push channel closed");
    assert_eq!(token, "tok-bob");
    assert_eq!(push.kind, "incoming_call");
    assert_eq!(push.caller_id, "alice");

    // Exactly one push, and no error back to alice
    assert!(relay.pushes.try_recv().is_err());
    expect_silence(&mut alice).await;
}

#[tokio::test]
async fn test_offer_to_unregistered_user_reports_not_found() {
    let mut relay = start_relay().await;
    let mut alice = connect(relay.addr).await;
    register(&mut alice, "alice", None).await;
    wait_until_online(&relay.store, "alice").await;

    send(
        &mut alice,
        json!({ "event": "offer", "data": { "offer": {}, "from": "alice", "to": "ghost" } }),
    )
    .await;

    let event = recv(&mut alice).await;
    assert_eq!(event["event"], "error");
    assert_eq!(event["data"], "User ghost not found");
    assert!(relay.pushes.try_recv().is_err());
}

#[tokio::test]
async fn test_answer_to_offline_user_drops_without_push_or_error() {
    let mut relay = start_relay().await;
    let mut alice = connect(relay.addr).await;
    let mut bob = connect(relay.addr).await;

    register(&mut alice, "alice", None).await;
    register(&mut bob, "bob", Some("tok-bob")).await;
    wait_until_online(&relay.store, "bob").await;
    wait_until_online(&relay.store, "alice").await;
    bob.close(None).await.expect("Failed to close");
    wait_until_offline(&relay.store, "bob").await;

    send(
        &mut alice,
        json!({ "event": "answer", "data": { "answer": {}, "from": "alice", "to": "bob" } }),
    )
    .await;
    send(
        &mut alice,
        json!({ "event": "end-call", "data": { "to": "bob" } }),
    )
    .await;

    expect_silence(&mut alice).await;
    assert!(relay.pushes.try_recv().is_err());
}

#[tokio::test]
async fn test_keywords_match_broadcasts_to_everyone_else() {
    let relay = start_relay().await;
    let mut sender = connect(relay.addr).await;
    let mut other = connect(relay.addr).await;
    let mut third = connect(relay.addr).await;

    register(&mut sender, "sender", None).await;
    register(&mut other, "other", None).await;
    register(&mut third, "third", None).await;
    wait_until_online(&relay.store, "third").await;

    send(
        &mut sender,
        json!({ "event": "keywords", "data": { "input": "Special loan offer today" } }),
    )
    .await;

    let result = recv(&mut sender).await;
    assert_eq!(result["event"], "keywords-result");
    assert_eq!(result["data"]["input"], "Special loan offer today");
    assert_eq!(result["data"]["foundKeywords"], json!(["loan", "offer"]));
    assert_eq!(result["data"]["hasKeywords"], true);

    for client in [&mut other, &mut third] {
        let notice = recv(client).await;
        assert_eq!(notice["event"], "message");
        assert_eq!(notice["data"], "Keywords detected: loan, offer");
    }
    // The sender gets the result, never the broadcast
    expect_silence(&mut sender).await;
}

#[tokio::test]
async fn test_keywords_without_match_stays_quiet() {
    let relay = start_relay().await;
    let mut sender = connect(relay.addr).await;
    let mut other = connect(relay.addr).await;
    register(&mut sender, "sender", None).await;
    register(&mut other, "other", None).await;
    wait_until_online(&relay.store, "other").await;

    send(
        &mut sender,
        json!({ "event": "keywords", "data": { "input": "hello world" } }),
    )
    .await;

    let result = recv(&mut sender).await;
    assert_eq!(result["data"]["foundKeywords"], json!([]));
    assert_eq!(result["data"]["hasKeywords"], false);
    expect_silence(&mut other).await;
}

#[tokio::test]
async fn test_empty_keywords_input_is_an_error_without_broadcast() {
    let relay = start_relay().await;
    let mut sender = connect(relay.addr).await;
    let mut other = connect(relay.addr).await;
    register(&mut sender, "sender", None).await;
    register(&mut other, "other", None).await;
    wait_until_online(&relay.store, "other").await;

    send(
        &mut sender,
        json!({ "event": "keywords", "data": { "input": "" } }),
    )
    .await;

    let event = recv(&mut sender).await;
    assert_eq!(event["event"], "error");
    assert_eq!(event["data"], "Input must be a non-empty string");
    expect_silence(&mut other).await;
}

#[tokio::test]
async fn test_malformed_frame_does_not_kill_the_connection() {
    let relay = start_relay().await;
    let mut alice = connect(relay.addr).await;
    register(&mut alice, "alice", None).await;
    wait_until_online(&relay.store, "alice").await;

    send(&mut alice, json!({ "event": "subscribe", "data": {} })).await;
    alice
        .send(Message::Text("not json".to_string()))
        .await
        .expect("Failed to send");

    // Connection still serves signaling afterwards
    send(
        &mut alice,
        json!({ "event": "offer", "data": { "offer": {}, "from": "alice", "to": "ghost" } }),
    )
    .await;
    let event = recv(&mut alice).await;
    assert_eq!(event["event"], "error");
    assert_eq!(event["data"], "User ghost not found");
}
