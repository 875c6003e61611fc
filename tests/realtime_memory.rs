// tests/realtime_memory.rs

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::time::{timeout, Duration};

use rocketchat_realtime::{
    // ---
    create_memory_transport,
    Channel,
    MemoryPeer,
    Operation,
    RealtimeClient,
    RealtimeClientBuilder,
    RealtimeConfig,
    RoomMessage,
    RpcError,
    SequenceAllocator,
};

#[cfg(feature = "logging")]
fn init_logging() {
    // ---
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

async fn setup(client_id: &str) -> (RealtimeClient, MemoryPeer) {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    let (transport, peer) = create_memory_transport()
        .await
        .expect("failed to create memory transport");

    let client = RealtimeClientBuilder::new(transport)
        .client_id(client_id)
        .build()
        .expect("failed to build client");

    (client, peer)
}

/// Next frame the client sent, with a timeout guard.
async fn next_frame(peer: &mut MemoryPeer) -> Value {
    timeout(Duration::from_secs(1), peer.recv())
        .await
        .expect("timed out waiting for outbound frame")
        .expect("outbound channel closed unexpectedly")
}

fn frame_id(frame: &Value) -> String {
    frame["id"].as_str().expect("frame without id").to_string()
}

async fn answer_with_error(peer: &mut MemoryPeer) {
    // ---
    let frame = next_frame(peer).await;
    let id = frame_id(&frame);

    let error = json!({ "error": 403, "reason": "not-allowed" });
    let delivered = match frame["msg"].as_str() {
        Some("sub") | Some("unsub") => {
            peer.deliver(json!({ "msg": "nosub", "id": id, "error": error }))
        }
        _ => peer.reply_error(&id, error),
    };
    assert!(delivered, "error reply did not reach the caller");
}

#[tokio::test]
async fn test_connect_handshake() {
    // ---
    // Arrange
    // ---
    let (client, mut peer) = setup("connect").await;

    // ---
    // Act
    // ---
    let c = client.clone();
    let handle = tokio::spawn(async move { c.connect().await });

    let frame = next_frame(&mut peer).await;
    assert!(peer.deliver(json!({ "msg": "connected", "session": "s-1" })));

    // ---
    // Assert
    // ---
    assert_eq!(
        frame,
        json!({ "msg": "connect", "version": "1", "support": ["1"] })
    );
    handle.await.unwrap().expect("connect failed");

    // The handshake draws no id from the sequence.
    assert_eq!(client.sequence().issued(), 0);
}

#[tokio::test]
async fn test_connect_uses_configured_versions() {
    // ---
    let (transport, mut peer) = create_memory_transport().await.unwrap();
    let config = RealtimeConfig::new("versions")
        .with_protocol_version("pre2")
        .with_supported_versions(["pre2", "pre1"]);
    let client = RealtimeClientBuilder::new(transport)
        .config(config)
        .build()
        .unwrap();

    let handle = tokio::spawn(async move { client.connect().await });

    let frame = next_frame(&mut peer).await;
    assert_eq!(frame["version"], "pre2");
    assert_eq!(frame["support"], json!(["pre2", "pre1"]));

    peer.deliver(json!({ "msg": "connected", "session": "s-2" }));
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_connect_refused_maps_to_connect_error() {
    // ---
    let (client, mut peer) = setup("refused").await;

    let handle = tokio::spawn(async move { client.connect().await });

    next_frame(&mut peer).await;
    assert!(peer.deliver(json!({ "msg": "failed", "version": "1" })));

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, RpcError::Connect(_)));
    assert_eq!(err.server_error().unwrap().detail()["version"], "1");
}

#[tokio::test]
async fn test_login_sends_digest_only() {
    // ---
    let (client, mut peer) = setup("login").await;

    let c = client.clone();
    let handle = tokio::spawn(async move { c.login("alice", "plain-text-secret").await });

    let frame = next_frame(&mut peer).await;
    let id = frame_id(&frame);
    peer.reply_result(&id, json!({ "id": "user-1", "token": "tok", "tokenExpires": null }));

    let result = handle.await.unwrap().expect("login failed");
    assert_eq!(result.id.as_deref(), Some("user-1"));

    assert_eq!(id, "1");
    assert_eq!(frame["method"], "login");
    assert_eq!(frame["params"][0]["user"]["username"], "alice");
    assert_eq!(frame["params"][0]["password"]["algorithm"], "sha-256");

    let digest = frame["params"][0]["password"]["digest"].as_str().unwrap();
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(!frame.to_string().contains("plain-text-secret"));
}

#[tokio::test]
async fn test_resume_sends_token() {
    // ---
    let (client, mut peer) = setup("resume").await;

    let handle = tokio::spawn(async move { client.resume("resume-token").await });

    let frame = next_frame(&mut peer).await;
    assert_eq!(frame["method"], "login");
    assert_eq!(frame["params"], json!([{ "resume": "resume-token" }]));

    // A result without `id` is not an error.
    peer.reply_result(&frame_id(&frame), json!({}));
    let result = handle.await.unwrap().unwrap();
    assert_eq!(result.id, None);
}

#[tokio::test]
async fn test_concurrent_calls_resolve_out_of_order() {
    // ---
    // Arrange
    // ---
    let (client, mut peer) = setup("concurrent").await;

    let c = client.clone();
    let channels = tokio::spawn(async move { c.get_channels().await });
    let first = next_frame(&mut peer).await;

    let c = client.clone();
    let message = tokio::spawn(async move { c.send_message("hi", "GENERAL", None).await });
    let second = next_frame(&mut peer).await;

    let c = client.clone();
    let reaction = tokio::spawn(async move { c.send_reaction("msg-9", ":tada:").await });
    let third = next_frame(&mut peer).await;

    // ---
    // Act: answer newest first
    // ---
    peer.reply_result(&frame_id(&third), json!({ "id": "reaction" }));
    peer.reply_result(&frame_id(&second), json!({ "id": "message" }));
    peer.reply_result(
        &frame_id(&first),
        json!([
            { "_id": "GENERAL", "t": "c" },
            { "_id": "dm-1", "t": "d" },
        ]),
    );

    // ---
    // Assert
    // ---
    assert_eq!(frame_id(&first), "1");
    assert_eq!(frame_id(&second), "2");
    assert_eq!(frame_id(&third), "3");

    assert_eq!(
        reaction.await.unwrap().unwrap().id.as_deref(),
        Some("reaction")
    );
    assert_eq!(message.await.unwrap().unwrap().id.as_deref(), Some("message"));
    assert_eq!(
        channels.await.unwrap().unwrap(),
        vec![Channel::new("GENERAL", "c"), Channel::new("dm-1", "d")]
    );
    assert_eq!(peer.transport().dispatcher().pending_len(), 0);
}

#[tokio::test]
async fn test_send_message_in_thread() {
    // ---
    let (client, mut peer) = setup("thread").await;

    let handle = tokio::spawn(async move {
        client
            .send_message("reply", "GENERAL", Some("parent-1"))
            .await
    });

    let frame = next_frame(&mut peer).await;
    let message = &frame["params"][0];

    assert_eq!(frame["method"], "sendMessage");
    assert_eq!(message["rid"], "GENERAL");
    assert_eq!(message["msg"], "reply");
    assert_eq!(message["tmid"], "parent-1");
    assert_eq!(message["_id"].as_str().unwrap().len(), 12);

    peer.reply_result(&frame_id(&frame), json!({ "id": message["_id"].clone() }));
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_send_reaction_and_typing_envelopes() {
    // ---
    let (client, mut peer) = setup("envelopes").await;

    let c = client.clone();
    let reaction = tokio::spawn(async move { c.send_reaction("msg-1", ":thumbsup:").await });
    let frame = next_frame(&mut peer).await;
    assert_eq!(frame["method"], "setReaction");
    assert_eq!(frame["params"], json!([":thumbsup:", "msg-1"]));
    peer.reply_result(&frame_id(&frame), Value::Null);
    reaction.await.unwrap().unwrap();

    let c = client.clone();
    let typing = tokio::spawn(async move { c.send_typing_event("GENERAL", "alice", true).await });
    let frame = next_frame(&mut peer).await;
    assert_eq!(frame["method"], "stream-notify-room");
    assert_eq!(frame["params"], json!(["GENERAL/typing", "alice", true]));
    peer.reply_result(&frame_id(&frame), Value::Null);
    typing.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_every_call_maps_server_error_to_its_operation() {
    // ---
    let (client, mut peer) = setup("errors").await;

    let c = client.clone();
    let handle = tokio::spawn(async move { c.resume("expired").await });
    answer_with_error(&mut peer).await;
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, RpcError::Resume(_)));

    let c = client.clone();
    let handle = tokio::spawn(async move { c.login("alice", "wrong").await });
    answer_with_error(&mut peer).await;
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, RpcError::Login(_)));

    let c = client.clone();
    let handle = tokio::spawn(async move { c.get_channels().await });
    answer_with_error(&mut peer).await;
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, RpcError::GetChannels(_)));

    let c = client.clone();
    let handle = tokio::spawn(async move { c.send_message("x", "GENERAL", None).await });
    answer_with_error(&mut peer).await;
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, RpcError::SendMessage(_)));

    let c = client.clone();
    let handle = tokio::spawn(async move { c.send_reaction("msg-1", ":x:").await });
    answer_with_error(&mut peer).await;
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, RpcError::SendReaction(_)));

    let c = client.clone();
    let handle = tokio::spawn(async move { c.send_typing_event("GENERAL", "alice", false).await });
    answer_with_error(&mut peer).await;
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, RpcError::SendTypingEvent(_)));

    let c = client.clone();
    let handle =
        tokio::spawn(async move { c.subscribe_to_channel_messages("GENERAL", |_| {}).await });
    answer_with_error(&mut peer).await;
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, RpcError::SubscribeToChannelMessages(_)));

    let c = client.clone();
    let handle = tokio::spawn(async move { c.subscribe_to_channel_changes("user-1", |_| {}).await });
    answer_with_error(&mut peer).await;
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, RpcError::SubscribeToChannelChanges(_)));
    assert_eq!(err.server_error().unwrap().detail()["reason"], "not-allowed");

    let c = client.clone();
    let handle = tokio::spawn(async move { c.unsubscribe(&"42".into()).await });
    answer_with_error(&mut peer).await;
    let err = handle.await.unwrap().unwrap_err();
    assert_eq!(err.operation(), Some(Operation::Unsubscribe));

    // Refused subscriptions leave no handler behind.
    assert_eq!(peer.transport().dispatcher().subscription_len(), 0);
}

#[tokio::test]
async fn test_channel_messages_subscription_delivers_events() {
    // ---
    // Arrange
    // ---
    let (client, mut peer) = setup("messages").await;
    let seen: Arc<Mutex<Vec<RoomMessage>>> = Arc::default();

    let sink = seen.clone();
    let c = client.clone();
    let handle = tokio::spawn(async move {
        c.subscribe_to_channel_messages("GENERAL", move |message| {
            sink.lock().unwrap().push(message);
        })
        .await
    });

    let frame = next_frame(&mut peer).await;
    let id = frame_id(&frame);
    assert_eq!(frame["msg"], "sub");
    assert_eq!(frame["name"], "stream-room-messages");
    assert_eq!(frame["params"][0], "GENERAL");

    assert!(peer.deliver(json!({ "msg": "ready", "subs": [id] })));
    let subscription_id = handle.await.unwrap().expect("subscribe failed");
    assert_eq!(subscription_id.as_str(), id);

    // ---
    // Act
    // ---
    let push = |args: Value| {
        json!({
            "msg": "changed",
            "collection": "stream-room-messages",
            "id": id,
            "fields": { "eventName": "GENERAL", "args": args },
        })
    };

    assert!(peer.deliver(push(json!([{
        "_id": "m-1",
        "rid": "GENERAL",
        "msg": "hello",
        "u": { "_id": "user-2", "username": "bob" },
    }]))));

    // Missing sender: reaches the handler, produces no event.
    assert!(peer.deliver(push(json!([{ "_id": "m-2", "rid": "GENERAL", "msg": "?" }]))));

    assert!(peer.deliver(push(json!([{
        "_id": "m-3",
        "rid": "GENERAL",
        "tmid": "m-1",
        "t": "uj",
        "u": { "_id": "user-3" },
    }]))));

    // ---
    // Assert
    // ---
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);

    assert_eq!(seen[0].message_id, "m-1");
    assert_eq!(seen[0].sender_id, "user-2");
    assert_eq!(seen[0].text, "hello");
    assert_eq!(seen[0].thread_id, None);

    assert_eq!(seen[1].message_id, "m-3");
    assert_eq!(seen[1].text, "");
    assert_eq!(seen[1].thread_id.as_deref(), Some("m-1"));
    assert_eq!(seen[1].qualifier.as_deref(), Some("uj"));
}

#[tokio::test]
async fn test_channel_changes_subscription_suppresses_removals() {
    // ---
    let (client, mut peer) = setup("changes").await;
    let seen: Arc<Mutex<Vec<Channel>>> = Arc::default();

    let sink = seen.clone();
    let c = client.clone();
    let handle = tokio::spawn(async move {
        c.subscribe_to_channel_changes("user-1", move |channel| {
            sink.lock().unwrap().push(channel);
        })
        .await
    });

    let frame = next_frame(&mut peer).await;
    let id = frame_id(&frame);
    assert_eq!(frame["name"], "stream-notify-user");
    assert_eq!(frame["params"], json!(["user-1/rooms-changed", false]));

    peer.deliver(json!({ "msg": "ready", "subs": [id] }));
    handle.await.unwrap().unwrap();

    let push = |action: &str, room: Value| {
        json!({
            "msg": "changed",
            "collection": "stream-notify-user",
            "id": id,
            "fields": { "eventName": "user-1/rooms-changed", "args": [action, room] },
        })
    };

    peer.deliver(push("inserted", json!({ "_id": "room-1", "t": "p" })));
    peer.deliver(push("removed", json!({ "_id": "room-2", "t": "c" })));
    peer.deliver(push("updated", json!({ "_id": "room-3", "t": "d" })));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Channel::new("room-1", "p"), Channel::new("room-3", "d")]
    );
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    // ---
    let (client, mut peer) = setup("unsubscribe").await;
    let count = Arc::new(Mutex::new(0usize));

    let counter = count.clone();
    let c = client.clone();
    let handle = tokio::spawn(async move {
        c.subscribe_to_channel_changes("user-1", move |_| *counter.lock().unwrap() += 1)
            .await
    });

    let id = frame_id(&next_frame(&mut peer).await);
    peer.deliver(json!({ "msg": "ready", "subs": [id] }));
    let subscription_id = handle.await.unwrap().unwrap();

    let room_push = json!({
        "msg": "changed",
        "id": id,
        "fields": { "args": ["updated", { "_id": "room-1", "t": "c" }] },
    });
    assert!(peer.deliver(room_push.clone()));

    // Act
    let c = client.clone();
    let sid = subscription_id.clone();
    let handle = tokio::spawn(async move { c.unsubscribe(&sid).await });

    let frame = next_frame(&mut peer).await;
    assert_eq!(frame, json!({ "msg": "unsub", "id": subscription_id.as_str() }));

    assert!(peer.deliver(json!({ "msg": "nosub", "id": id })));
    handle.await.unwrap().expect("unsubscribe failed");

    // Assert
    assert!(!peer.deliver(room_push));
    assert_eq!(*count.lock().unwrap(), 1);
    assert_eq!(peer.transport().dispatcher().subscription_len(), 0);
}

#[tokio::test]
async fn test_peer_drop_releases_pending_call() {
    // ---
    let (client, mut peer) = setup("peer-drop").await;

    let c = client.clone();
    let handle = tokio::spawn(async move { c.get_channels().await });
    next_frame(&mut peer).await;

    drop(peer);

    let err = timeout(Duration::from_secs(1), handle)
        .await
        .expect("pending call was not released")
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, RpcError::ConnectionLost));

    let err = client.get_channels().await.unwrap_err();
    assert!(matches!(err, RpcError::ConnectionLost));
}

#[tokio::test]
async fn test_stream_frames_with_placeholder_id_reach_subscriber() {
    // ---
    let (client, mut peer) = setup("stream").await;
    let seen: Arc<Mutex<Vec<RoomMessage>>> = Arc::default();

    let sink = seen.clone();
    let c = client.clone();
    let handle = tokio::spawn(async move {
        c.subscribe_to_channel_messages("GENERAL", move |message| {
            sink.lock().unwrap().push(message);
        })
        .await
    });

    let id = frame_id(&next_frame(&mut peer).await);
    peer.deliver(json!({ "msg": "ready", "subs": [id] }));
    handle.await.unwrap().unwrap();

    // Stream events carry `"id": "id"`; the stream name and event select the
    // subscription.
    let stream_push = |event_name: &str| {
        json!({
            "msg": "changed",
            "collection": "stream-room-messages",
            "id": "id",
            "fields": {
                "eventName": event_name,
                "args": [{ "_id": "m-1", "rid": event_name, "msg": "hi", "u": { "_id": "u-1" } }],
            },
        })
    };

    assert!(peer.deliver(stream_push("GENERAL")));
    assert!(!peer.deliver(stream_push("random")));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].channel_id, "GENERAL");
    assert_eq!(seen[0].text, "hi");
}

#[tokio::test]
async fn test_close_fails_pending_and_later_calls() {
    // ---
    let (client, mut peer) = setup("close").await;

    let c = client.clone();
    let handle = tokio::spawn(async move { c.get_channels().await });
    next_frame(&mut peer).await;

    client.close().await.unwrap();

    let err = timeout(Duration::from_secs(1), handle)
        .await
        .expect("pending call was not released")
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, RpcError::ConnectionLost));

    let err = client.send_reaction("msg-1", ":x:").await.unwrap_err();
    assert!(matches!(err, RpcError::ConnectionLost));
    assert!(peer.try_recv().is_none());
}

#[tokio::test]
async fn test_shared_sequence_across_sessions() {
    // ---
    let sequence = Arc::new(SequenceAllocator::new());

    let (t1, mut p1) = create_memory_transport().await.unwrap();
    let (t2, mut p2) = create_memory_transport().await.unwrap();

    let a = RealtimeClientBuilder::new(t1)
        .sequence(sequence.clone())
        .build()
        .unwrap();
    let b = RealtimeClientBuilder::new(t2)
        .sequence(sequence.clone())
        .build()
        .unwrap();

    let ha = tokio::spawn(async move { a.get_channels().await });
    let fa = next_frame(&mut p1).await;
    let hb = tokio::spawn(async move { b.get_channels().await });
    let fb = next_frame(&mut p2).await;

    assert_eq!(frame_id(&fa), "1");
    assert_eq!(frame_id(&fb), "2");
    assert_eq!(sequence.issued(), 2);

    // A non-array result yields no channels.
    p1.reply_result(&frame_id(&fa), json!({ "update": [] }));
    p2.reply_result(&frame_id(&fb), json!([]));

    assert!(ha.await.unwrap().unwrap().is_empty());
    assert!(hb.await.unwrap().unwrap().is_empty());
}
