//! Shared test double: a scripted language server on the far side of
//! a duplex pipe.

use serde_json::Value;
use std::time::Duration;
use tokio::io::{duplex, DuplexStream, ReadHalf, WriteHalf};

use crate::lsp::client::LspClient;
use crate::lsp::transport::{self, MessageReader};

pub(crate) struct FakeServer {
    reader: MessageReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeServer {
    pub(crate) fn pair(request_timeout: Option<Duration>) -> (LspClient, FakeServer) {
        let (client_io, server_io) = duplex(256 * 1024);
        let (client_read, client_write) = tokio::io::split(client_io);
        let client = LspClient::from_streams(client_read, client_write, request_timeout);
        let (server_read, server_write) = tokio::io::split(server_io);
        (
            client,
            FakeServer {
                reader: MessageReader::new(server_read),
                writer: server_write,
            },
        )
    }

    pub(crate) async fn recv(&mut self) -> Value {
        self.reader.read_message().await.expect("server read")
    }

    /// Read messages until one with the given method arrives, skipping
    /// unrelated traffic.
    pub(crate) async fn recv_method(&mut self, method: &str) -> Value {
        loop {
            let message = self.recv().await;
            if message["method"] == method {
                return message;
            }
        }
    }

    /// Like `recv_method` but gives up after a deadline, for asserting
    /// that a message does NOT arrive.
    pub(crate) async fn try_recv_method(&mut self, method: &str, limit: Duration) -> Option<Value> {
        tokio::time::timeout(limit, self.recv_method(method))
            .await
            .ok()
    }

    pub(crate) async fn send(&mut self, message: Value) {
        transport::write_message(&mut self.writer, &message)
            .await
            .expect("server write");
    }

    pub(crate) async fn respond(&mut self, id: &Value, result: Value) {
        self.send(transport::response(id, result)).await;
    }
}
