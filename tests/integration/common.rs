//! Test utilities: an in-process fake language server attached to an
//! `LspClient` over a duplex pipe.

use lsp_bridge::lsp::transport::{self, MessageReader};
use lsp_bridge::lsp::LspClient;
use serde_json::{json, Value};
use std::path::Path;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

pub struct FakeLspServer {
    reader: MessageReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeLspServer {
    pub fn pair() -> (LspClient, FakeLspServer) {
        let (client_io, server_io) = tokio::io::duplex(256 * 1024);
        let (client_read, client_write) = tokio::io::split(client_io);
        let client = LspClient::from_streams(client_read, client_write, None);
        let (server_read, server_write) = tokio::io::split(server_io);
        (
            client,
            FakeLspServer {
                reader: MessageReader::new(server_read),
                writer: server_write,
            },
        )
    }

    pub async fn recv(&mut self) -> Value {
        self.reader.read_message().await.expect("server read")
    }

    pub async fn recv_method(&mut self, method: &str) -> Value {
        loop {
            let message = self.recv().await;
            if message["method"] == method {
                return message;
            }
        }
    }

    pub async fn send(&mut self, message: Value) {
        transport::write_message(&mut self.writer, &message)
            .await
            .expect("server write");
    }

    pub async fn respond(&mut self, id: &Value, result: Value) {
        self.send(transport::response(id, result)).await;
    }

    /// Answer the `initialize` handshake so default handlers get
    /// installed on the client.
    pub async fn complete_initialize(&mut self) {
        let request = self.recv_method("initialize").await;
        let id = request["id"].clone();
        self.respond(&id, json!({"capabilities": {}})).await;
        self.recv_method("initialized").await;
    }
}

/// Initialize a client against the fake server for a workspace dir.
pub async fn initialized_pair(workspace: &Path) -> (LspClient, FakeLspServer) {
    let (client, mut server) = FakeLspServer::pair();
    let root = workspace.to_path_buf();
    let client_task = client.clone();
    let handshake = tokio::spawn(async move { client_task.initialize(&root).await });
    server.complete_initialize().await;
    handshake.await.unwrap().unwrap();
    (client, server)
}
