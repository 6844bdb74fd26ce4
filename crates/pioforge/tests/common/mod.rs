//! Shared helpers: a raw wire client and a seeded player store.

#![allow(dead_code)]

use std::sync::Arc;

use bytes::BytesMut;
use pioforge::ServerContext;
use pioforge::connection::handle_connection;
use pioforge::router::MessageRouter;
use pioforge::save::SaveRouter;
use pioforge_context::{
    Account, Building, BuildingCore, JunkBuilding, MemoryRepository, PlayerObjects, PlayerRecord,
};
use pioforge_protocol::{PlayerId, Value, WireCodec, encode_message};
use pioforge_transport::{ClientConnection, TcpConnection};
use serde_json::{Value as Json, json};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio_util::codec::Decoder;

pub const PLAYER: &str = "p1";

/// A client speaking the wire format over any byte stream.
pub struct Client<S> {
    stream: S,
    buffer: BytesMut,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::new(),
        }
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write");
    }

    pub async fn send(&mut self, msg_type: &str, args: Vec<Value>) {
        let bytes = encode_message(msg_type, args).expect("encode");
        self.send_raw(&bytes).await;
    }

    /// Sends `["s", {"id": save_id, "data": data}]`.
    pub async fn save(&mut self, save_id: &str, data: Json) {
        let body = json!({ "id": save_id, "data": data }).to_string();
        self.send("s", vec![Value::from(body)]).await;
    }

    pub async fn join(&mut self, key: &str) {
        self.send("join", vec![Value::from(key)]).await;
    }

    /// Next decoded message, or `None` once the server closed.
    pub async fn recv(&mut self) -> Option<Vec<Value>> {
        loop {
            if let Some(msg) = WireCodec::default().decode(&mut self.buffer).expect("decode") {
                return Some(msg);
            }
            match self.stream.read_buf(&mut self.buffer).await {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    /// Next message, asserting its type tag.
    pub async fn expect(&mut self, msg_type: &str) -> Vec<Value> {
        let msg = self.recv().await.expect("connection closed early");
        assert_eq!(msg[0].as_str(), Some(msg_type), "unexpected message {msg:?}");
        msg
    }

    /// Reads everything until the server closes.
    pub async fn read_to_end(&mut self) -> Vec<u8> {
        let mut out = self.buffer.split().to_vec();
        let _ = self.stream.read_to_end(&mut out).await;
        out
    }
}

/// Parses argument `index` of a message as a JSON document.
pub fn json_arg(msg: &[Value], index: usize) -> Json {
    let raw = msg[index].as_str().expect("string argument");
    serde_json::from_str(raw).expect("json argument")
}

pub fn junk(id: &str) -> Building {
    Building::Junk(JunkBuilding {
        core: BuildingCore::new(id, "junk-pile"),
        items: Vec::new(),
        pos: "10,10".into(),
        rot: "0".into(),
    })
}

/// One player with `cash`, a junk pile `j1` and a leader survivor.
pub fn seeded_repository(cash: i32) -> Arc<MemoryRepository> {
    let repo = MemoryRepository::new();
    let mut account = Account::new(PlayerId::new(PLAYER), "Tester");
    account.leader_id = Some("leader".into());

    let mut objects = PlayerObjects {
        buildings: vec![junk("j1")],
        ..PlayerObjects::default()
    };
    objects.resources.cash = cash;

    repo.insert(
        PlayerRecord::new(account)
            .with_objects(objects)
            .with_survivors(vec![json!({ "id": "leader", "xp": 0, "level": 2 })]),
    );
    Arc::new(repo)
}

pub fn standard_router() -> Arc<MessageRouter> {
    Arc::new(MessageRouter::standard(
        SaveRouter::standard().expect("save router"),
    ))
}

/// Runs the connection loop over an in-memory stream.
pub fn connect_duplex(
    server: &Arc<ServerContext>,
    router: &Arc<MessageRouter>,
) -> Client<DuplexStream> {
    let (client, socket) = tokio::io::duplex(64 * 1024);
    let (r, w) = tokio::io::split(socket);
    let connection = ClientConnection::new(TcpConnection::from_io(r, w, "duplex"), "duplex");
    tokio::spawn(handle_connection(
        connection,
        Arc::clone(server),
        Arc::clone(router),
    ));
    Client::new(client)
}

/// Joins `PLAYER` and drains the join result and game-ready messages.
pub async fn join_player<S: AsyncRead + AsyncWrite + Unpin>(
    client: &mut Client<S>,
    server: &ServerContext,
) {
    let key = server.join_keys.create(PlayerId::new(PLAYER));
    client.join(&key).await;
    let result = client.expect("playerio.joinresult").await;
    assert_eq!(result[1], Value::from(true));
    client.expect("gr").await;
}
