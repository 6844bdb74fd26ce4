//! Integration tests for the server over real loopback sockets: policy
//! file, join, routing fallback and disconnect cleanup.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Client, PLAYER, join_player, json_arg, seeded_repository};
use pioforge::message;
use pioforge::prelude::*;
use pioforge_context::MemoryRepository;
use tokio::net::TcpStream;

/// Starts a server on a random port.
async fn start_server(repo: Arc<MemoryRepository>) -> (String, Arc<ServerContext>) {
    let server = Server::builder()
        .bind("127.0.0.1:0")
        .repository(repo)
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let context = Arc::clone(server.context());

    tokio::spawn(async move {
        let _ = server.run().await;
    });
    (addr, context)
}

async fn connect(addr: &str) -> Client<TcpStream> {
    Client::new(TcpStream::connect(addr).await.expect("should connect"))
}

async fn within<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_policy_file_request_gets_policy_then_close() {
    let (addr, context) = start_server(seeded_repository(0)).await;
    let mut client = connect(&addr).await;

    client.send_raw(b"<policy-file-request/>\0").await;
    let reply = within(client.read_to_end()).await;

    assert_eq!(reply, message::policy_file_response(context.port()));
    assert!(String::from_utf8_lossy(&reply).contains(&format!("to-ports=\"{}\"", context.port())));
}

#[tokio::test]
async fn test_join_unknown_key_rejected_and_closed() {
    let (addr, _context) = start_server(seeded_repository(0)).await;
    let mut client = connect(&addr).await;

    client.join("not-a-key").await;
    let result = within(client.expect(message::JOIN_RESULT)).await;
    assert_eq!(result[1], Value::from(false));
    assert!(within(client.recv()).await.is_none());
}

#[tokio::test]
async fn test_join_valid_key_sends_result_and_game_ready() {
    let (addr, context) = start_server(seeded_repository(250)).await;
    let mut client = connect(&addr).await;
    let key = context.join_keys.create(PlayerId::new(PLAYER));

    // The client prefixes its first write with a NUL byte.
    client.send_raw(&[0]).await;
    client.join(&key).await;

    let result = within(client.expect(message::JOIN_RESULT)).await;
    assert_eq!(result[1], Value::from(true));

    let ready = within(client.expect(message::GAME_READY)).await;
    assert_eq!(ready.len(), 6);
    assert!(matches!(ready[1], Value::Double(_)));
    assert_eq!(ready[2], Value::Bytes(Vec::new()));
    assert_eq!(ready[3], Value::from("{}"));
    let login_state = json_arg(&ready, 5);
    assert_eq!(login_state["resources"]["cash"], 250);
    assert_eq!(login_state["survivors"][0]["id"], "leader");

    assert!(context.tracker.get_context(&PlayerId::new(PLAYER)).is_some());
}

#[tokio::test]
async fn test_join_key_is_single_use() {
    let (addr, context) = start_server(seeded_repository(0)).await;
    let key = context.join_keys.create(PlayerId::new(PLAYER));

    let mut first = connect(&addr).await;
    first.join(&key).await;
    within(first.expect(message::JOIN_RESULT)).await;

    let mut second = connect(&addr).await;
    second.join(&key).await;
    let result = within(second.expect(message::JOIN_RESULT)).await;
    assert_eq!(result[1], Value::from(false));
}

#[tokio::test]
async fn test_unhandled_message_gets_null_reply() {
    let (addr, context) = start_server(seeded_repository(0)).await;
    let mut client = connect(&addr).await;
    within(join_player(&mut client, &context)).await;

    client.send("mystery", vec![Value::from("k"), Value::from(2)]).await;
    let reply = within(client.expect(message::UNHANDLED_REPLY)).await;
    assert_eq!(reply.len(), 1);
}

#[tokio::test]
async fn test_quest_progress_and_zombie_attack_replies() {
    let (addr, context) = start_server(seeded_repository(0)).await;
    let mut client = connect(&addr).await;
    within(join_player(&mut client, &context)).await;

    client.send("qp", vec![Value::from("x")]).await;
    let progress = within(client.expect(message::QUEST_PROGRESS)).await;
    assert!(json_arg(&progress, 1)["complete"].is_null());

    client.send("rza", vec![Value::from(true)]).await;
    within(client.expect(message::ZOMBIE_ATTACK)).await;
}

#[tokio::test]
async fn test_survivor_check_replies_then_sends_survivor() {
    let (addr, context) = start_server(seeded_repository(0)).await;
    let mut client = connect(&addr).await;
    within(join_player(&mut client, &context)).await;

    client
        .send("rsc", vec![Value::from(r#"{"id":"save-9"}"#)])
        .await;
    let reply = within(client.expect(message::SAVE_RESPONSE)).await;
    assert_eq!(reply[1], Value::from("save-9"));
    assert_eq!(json_arg(&reply, 3)["success"], true);

    let survivor = within(client.expect(message::SURVIVOR_NEW)).await;
    assert_eq!(json_arg(&survivor, 1)["classId"], "unassigned");
}

#[tokio::test]
async fn test_disconnect_removes_context_and_records_login() {
    let repo = seeded_repository(0);
    let (addr, context) = start_server(Arc::clone(&repo)).await;
    let player = PlayerId::new(PLAYER);
    let mut client = connect(&addr).await;
    within(join_player(&mut client, &context)).await;

    client.send("ic", vec![]).await;
    within(client.expect(message::TIME_UPDATE)).await;
    assert!(context.online.is_online(&player));
    drop(client);

    within(async {
        while context.tracker.get_context(&player).is_some() || !context.scheduler.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(!context.online.is_online(&player));
    let record = repo.snapshot(&player).expect("player record");
    assert!(record.account.last_login > 0);
    assert!(context.scheduler.is_empty());
}
