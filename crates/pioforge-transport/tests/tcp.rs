//! Integration tests for the TCP transport.
//!
//! These bind a real listener on an OS-assigned loopback port and talk to
//! it with a plain `TcpStream`, the way the game client does.

use pioforge_protocol::{decode, Value};
use pioforge_transport::{ClientConnection, Connection, TcpTransport, Transport};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn bound_transport() -> (TcpTransport, String) {
    let transport = TcpTransport::bind("127.0.0.1:0").await.expect("should bind");
    let addr = transport.local_addr().expect("local addr").to_string();
    (transport, addr)
}

#[tokio::test]
async fn test_tcp_accept_and_exchange_bytes() {
    let (mut transport, addr) = bound_transport().await;
    let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });

    let mut client = TcpStream::connect(&addr).await.expect("client should connect");
    let conn = server.await.expect("accept task");
    assert!(conn.id().into_inner() > 0);

    client.write_all(b"hello from client").await.unwrap();
    let received = conn.recv().await.unwrap().expect("should have data");
    assert_eq!(received, b"hello from client");

    conn.send(b"hello from server").await.unwrap();
    let mut buf = [0u8; 17];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello from server");
}

#[tokio::test]
async fn test_tcp_recv_returns_none_on_client_close() {
    let (mut transport, addr) = bound_transport().await;
    let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });

    let client = TcpStream::connect(&addr).await.unwrap();
    let conn = server.await.unwrap();
    drop(client);

    assert!(conn.recv().await.expect("recv should not error").is_none());
}

#[tokio::test]
async fn test_client_connection_sends_encoded_message_over_tcp() {
    let (mut transport, addr) = bound_transport().await;
    let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });

    let mut client = TcpStream::connect(&addr).await.unwrap();
    let socket = server.await.unwrap();
    let peer = socket.peer().to_string();
    let conn = ClientConnection::new(socket, peer);

    conn.send_message("playerio.joinresult", [Value::Bool(true)])
        .await
        .unwrap();

    let mut buf = vec![0u8; 64];
    let n = client.read(&mut buf).await.unwrap();
    let msgs = decode(&buf[..n]).unwrap();
    assert_eq!(
        msgs[0],
        vec![Value::from("playerio.joinresult"), Value::Bool(true)]
    );

    conn.shutdown().await;
    // write half closed → client sees EOF
    assert_eq!(client.read(&mut buf).await.unwrap(), 0);
}
