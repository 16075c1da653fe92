//! Gateway Integration Tests
//!
//! Each test starts an in-process mock gateway and drives a real client
//! against it over WebSocket.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::sync::Arc;
use std::time::Duration;

use cord_common::{Compression, Encoding};
use cord_core::Snowflake;
use cord_gateway::protocol::GatewayMessage;
use cord_gateway::{GatewayClient, HookName, HookPayload, LoopExit};
use integration_tests::*;
use parking_lot::Mutex;

/// Register a hook on every name that records what fired
fn record_hooks(client: &GatewayClient) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for name in HookName::ALL {
        if name == HookName::SocketReceive {
            continue;
        }
        let seen = Arc::clone(&seen);
        client.on(name, move |payload| {
            let seen = Arc::clone(&seen);
            async move {
                let entry = match payload {
                    HookPayload::Message(message) => format!("{name}:{}", message.content),
                    HookPayload::Guild(guild) => format!("{name}:{}", guild["name"].as_str().unwrap_or_default()),
                    HookPayload::Empty => name.to_string(),
                };
                seen.lock().push(entry);
                Ok(())
            }
        });
    }
    seen
}

// ============================================================================
// Session Tests
// ============================================================================

#[tokio::test]
async fn test_identify_and_ready_populate_cache() {
    let gateway = MockGateway::start(vec![
        json_frame(&hello()),
        json_frame(&ready(1, "1", &["10"], None)),
        json_frame(&guild_create(2, "10", "announced")),
        json_frame(&guild_create(3, "20", "joined")),
        json_frame(&message_create(4, "5", "9", "hello there")),
        json_frame(&GatewayMessage::heartbeat_ack()),
        ScriptFrame::Close(1000),
    ])
    .await
    .unwrap();

    let client = GatewayClient::new(test_config(&gateway.url(), Encoding::Json, Compression::None));
    let seen = record_hooks(&client);

    let shard = client.connect_shard(0).await.unwrap();
    let session = Arc::clone(shard.session());
    let exit = tokio::time::timeout(Duration::from_secs(5), shard.join())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(exit, LoopExit::Closed { code: Some(1000) });

    let identify = &gateway.received()[0];
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], TEST_TOKEN);
    assert_eq!(identify["d"]["intents"], 513);
    assert!(identify["d"].get("shard").is_none());

    assert_eq!(session.session_id().as_deref(), Some("mock-session"));
    assert_eq!(session.current_sequence(), Some(4));

    let cache = client.cache();
    assert!(cache.user(Snowflake::new(1)).is_some());
    assert!(cache.guild(Snowflake::new(10)).is_some());
    assert!(cache.guild(Snowflake::new(20)).is_some());

    let message = cache.message("5:9").unwrap();
    assert_eq!(message.content, "hello there");
    assert_eq!(message.author.id, Snowflake::new(42));
    assert_eq!(message.mentions[0].conn, message.conn);

    assert_eq!(
        *seen.lock(),
        vec!["ready", "guild_create:joined", "message:hello there", "heartbeat"]
    );
}

#[tokio::test]
async fn test_invalid_session_is_reported() {
    let gateway = MockGateway::start(vec![
        json_frame(&hello()),
        json_frame(&ready(1, "1", &[], None)),
        json_frame(&GatewayMessage::invalid_session(false)),
        json_frame(&message_create(2, "5", "9", "never cached")),
    ])
    .await
    .unwrap();

    let client = GatewayClient::new(test_config(&gateway.url(), Encoding::Json, Compression::None));
    let shard = client.connect_shard(0).await.unwrap();
    let session = Arc::clone(shard.session());

    let err = tokio::time::timeout(Duration::from_secs(5), shard.join())
        .await
        .unwrap()
        .unwrap_err();

    assert!(err.is_invalid_session());
    assert!(!err.should_resume());
    assert!(!session.can_resume());
    assert!(client.cache().message("5:9").is_none());
}

#[tokio::test]
async fn test_heartbeat_carries_last_sequence() {
    let gateway = MockGateway::start(vec![
        json_frame(&hello()),
        json_frame(&ready(1, "1", &[], None)),
        json_frame(&message_create(7, "5", "9", "latest")),
    ])
    .await
    .unwrap();

    let client = GatewayClient::new(test_config(&gateway.url(), Encoding::Json, Compression::None));
    let shard = client.connect_shard(0).await.unwrap();

    assert!(wait_until(|| client.cache().message("5:9").is_some()).await);
    shard.heartbeat().await.unwrap();

    let received = gateway.wait_for_received(2).await;
    assert_eq!(received[1]["op"], 1);
    assert_eq!(received[1]["d"], 7);

    shard.cancel();
    let exit = shard.join().await.unwrap();
    assert_eq!(exit, LoopExit::Cancelled);
}

#[tokio::test]
async fn test_cancel_idle_connection() {
    let gateway = MockGateway::start(vec![json_frame(&hello())]).await.unwrap();

    let client = GatewayClient::new(test_config(&gateway.url(), Encoding::Json, Compression::None));
    let shard = client.connect_shard(0).await.unwrap();
    let canceller = shard.canceller();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!shard.is_finished());

    canceller.cancel();
    assert!(canceller.is_cancelled());

    let exit = tokio::time::timeout(Duration::from_secs(1), shard.join())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit, LoopExit::Cancelled);
    assert!(client.cache().is_empty());
}

#[tokio::test]
async fn test_reconnect_resumes_session() {
    let resume_gateway = MockGateway::start(vec![
        json_frame(&resumed(3)),
        json_frame(&message_create(4, "5", "10", "after resume")),
        ScriptFrame::Close(1000),
    ])
    .await
    .unwrap();

    let gateway = MockGateway::start(vec![
        json_frame(&hello()),
        json_frame(&ready(1, "1", &[], Some(&resume_gateway.url()))),
        json_frame(&message_create(2, "5", "9", "before drop")),
        ScriptFrame::Close(4000),
    ])
    .await
    .unwrap();

    let client = GatewayClient::new(test_config(&gateway.url(), Encoding::Json, Compression::None));
    let shard = client.connect_shard(0).await.unwrap();
    let conn = shard.conn();
    let session = Arc::clone(shard.session());

    let exit = shard.join().await.unwrap();
    assert_eq!(exit, LoopExit::Closed { code: Some(4000) });
    assert!(exit.should_reconnect());
    assert!(session.can_resume());

    let shard = client.reconnect(conn, Arc::clone(&session)).await.unwrap();
    let exit = shard.join().await.unwrap();
    assert_eq!(exit, LoopExit::Closed { code: Some(1000) });

    let resume = &resume_gateway.received()[0];
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["session_id"], "mock-session");
    assert_eq!(resume["d"]["seq"], 2);
    assert_eq!(resume["d"]["token"], TEST_TOKEN);

    assert_eq!(gateway.connections(), 1);
    assert_eq!(session.current_sequence(), Some(4));
    assert!(client.cache().message("5:9").is_some());
    assert!(client.cache().message("5:10").is_some());
}

#[tokio::test]
async fn test_close_code_refusing_reconnect() {
    let gateway = MockGateway::start(vec![ScriptFrame::Close(4004)]).await.unwrap();

    let client = GatewayClient::new(test_config(&gateway.url(), Encoding::Json, Compression::None));
    let exit = client.connect_shard(0).await.unwrap().join().await.unwrap();

    assert_eq!(exit, LoopExit::Closed { code: Some(4004) });
    assert!(!exit.should_reconnect());
    assert_eq!(
        exit.close_code().map(|code| code.description()),
        Some("Authentication failed")
    );
}

// ============================================================================
// Wire Format Tests
// ============================================================================

#[tokio::test]
async fn test_zlib_stream_transport() {
    let mut zlib = ZlibFrames::default();
    let mut script = vec![zlib.frame(&hello()), zlib.frame(&ready(1, "1", &["10"], None))];
    script.extend(zlib.split_frames(&message_create(2, "5", "9", "compressed")));
    script.push(zlib.frame(&guild_create(3, "10", "announced")));
    script.push(ScriptFrame::Close(1000));

    let gateway = MockGateway::start(script).await.unwrap();
    let client = GatewayClient::new(test_config(&gateway.url(), Encoding::Json, Compression::ZlibStream));
    let seen = record_hooks(&client);

    let exit = client.connect_shard(0).await.unwrap().join().await.unwrap();
    assert_eq!(exit, LoopExit::Closed { code: Some(1000) });

    assert_eq!(client.cache().message("5:9").unwrap().content, "compressed");
    assert!(client.cache().guild(Snowflake::new(10)).is_some());
    assert_eq!(*seen.lock(), vec!["ready", "message:compressed"]);
}

#[tokio::test]
async fn test_etf_encoding() {
    let gateway = MockGateway::start(vec![
        etf_frame(&hello()),
        etf_frame(&ready(1, "1", &[], None)),
        etf_frame(&message_create(2, "5", "9", "binary terms")),
        ScriptFrame::Close(1000),
    ])
    .await
    .unwrap();

    let client = GatewayClient::new(test_config(&gateway.url(), Encoding::Etf, Compression::None));
    let exit = client.connect_shard(0).await.unwrap().join().await.unwrap();
    assert_eq!(exit, LoopExit::Closed { code: Some(1000) });

    // The mock decodes binary frames as ETF, so the IDENTIFY went out in ETF
    let identify = &gateway.received()[0];
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], TEST_TOKEN);

    let message = client.cache().message("5:9").unwrap();
    assert_eq!(message.content, "binary terms");
    assert_eq!(message.channel_id, Snowflake::new(5));
}

// ============================================================================
// Sharding Tests
// ============================================================================

#[tokio::test]
async fn test_shards_share_cache() {
    let gateway = MockGateway::start(vec![
        json_frame(&hello()),
        json_frame(&ready(1, "1", &[], None)),
        json_frame(&message_create(2, "5", "9", "seen twice")),
        ScriptFrame::Close(1000),
    ])
    .await
    .unwrap();

    let mut config = test_config(&gateway.url(), Encoding::Json, Compression::None);
    config.shards.count = 2;
    let client = GatewayClient::new(config);

    let shards = client.connect_all().await.unwrap();
    assert_eq!(shards.len(), 2);
    for shard in shards {
        let exit = shard.join().await.unwrap();
        assert_eq!(exit, LoopExit::Closed { code: Some(1000) });
    }

    let mut pairs: Vec<Vec<u64>> = gateway
        .received()
        .iter()
        .filter(|m| m["op"] == 2)
        .map(|m| {
            m["d"]["shard"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(serde_json::Value::as_u64)
                .collect()
        })
        .collect();
    pairs.sort();
    assert_eq!(pairs, vec![vec![0, 2], vec![1, 2]]);

    let stats = client.cache().stats();
    assert_eq!(stats.users, 1);
    assert_eq!(stats.messages, 1);
}
