//! Client lifecycle behaviour through the public API.

use crate::common::{initialized_pair, FakeLspServer};
use lsp_bridge::lsp::transport;
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
async fn initialize_advertises_watched_files_and_configuration() {
    let (client, mut server) = FakeLspServer::pair();
    let workspace = tempfile::tempdir().unwrap();
    let root = workspace.path().canonicalize().unwrap();

    let task_client = client.clone();
    let task_root = root.clone();
    let handshake = tokio::spawn(async move { task_client.initialize(&task_root).await });

    let request = server.recv_method("initialize").await;
    let capabilities = &request["params"]["capabilities"];
    assert_eq!(capabilities["workspace"]["configuration"], true);
    assert_eq!(
        capabilities["workspace"]["didChangeWatchedFiles"]["dynamicRegistration"],
        true
    );
    assert_eq!(
        capabilities["textDocument"]["publishDiagnostics"]["versionSupport"],
        true
    );
    assert!(request["params"]["processId"].is_number());

    let id = request["id"].clone();
    server.respond(&id, json!({"capabilities": {}})).await;
    server.recv_method("initialized").await;
    handshake.await.unwrap().unwrap();
}

#[tokio::test]
async fn diagnostics_store_is_last_write_wins() {
    let workspace = tempfile::tempdir().unwrap();
    let (client, mut server) = initialized_pair(workspace.path()).await;

    let diagnostic = |message: &str| {
        json!({
            "range": {"start": {"line": 1, "character": 0}, "end": {"line": 1, "character": 4}},
            "severity": 2,
            "message": message,
        })
    };

    server
        .send(transport::notification(
            "textDocument/publishDiagnostics",
            json!({"uri": "file:///ws/x.go", "diagnostics": [diagnostic("L1"), diagnostic("old")]}),
        ))
        .await;
    server
        .send(transport::notification(
            "textDocument/publishDiagnostics",
            json!({"uri": "file:///ws/x.go", "diagnostics": [diagnostic("L2")]}),
        ))
        .await;

    // Ping to make sure both notifications were processed in order.
    let task_client = client.clone();
    let ping = tokio::spawn(async move { task_client.call("ping", Value::Null).await });
    let request = server.recv_method("ping").await;
    server.respond(&request["id"].clone(), Value::Null).await;
    ping.await.unwrap().unwrap();

    let stored = client.diagnostics_for("file:///ws/x.go");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].message, "L2");
}

#[tokio::test]
async fn shutdown_protocol_order() {
    let workspace = tempfile::tempdir().unwrap();
    let (client, mut server) = initialized_pair(workspace.path()).await;

    let file = workspace.path().join("open.rs");
    tokio::fs::write(&file, "fn a() {}\n").await.unwrap();
    client.open_file(&file).await.unwrap();
    server.recv_method("textDocument/didOpen").await;

    let task_client = client.clone();
    let shutdown = tokio::spawn(async move {
        task_client.close_all_files().await;
        task_client.shutdown().await?;
        task_client.exit().await
    });

    // didClose for the open file precedes the shutdown request, which
    // precedes the exit notification.
    server.recv_method("textDocument/didClose").await;
    let request = server.recv_method("shutdown").await;
    server.respond(&request["id"].clone(), Value::Null).await;
    server.recv_method("exit").await;
    shutdown.await.unwrap().unwrap();

    assert_eq!(client.open_file_count(), 0);
}

#[tokio::test]
async fn dynamic_registration_reaches_watch_hook() {
    let workspace = tempfile::tempdir().unwrap();
    let (client, mut server) = initialized_pair(workspace.path()).await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    client.set_watch_hook(move |id, watchers| {
        let _ = tx.send((id, watchers.len()));
    });

    server
        .send(transport::request(
            41,
            "client/registerCapability",
            json!({"registrations": [{
                "id": "workspace-watch",
                "method": "workspace/didChangeWatchedFiles",
                "registerOptions": {"watchers": [
                    {"globPattern": "**/*.go"},
                    {"globPattern": "**/*.mod", "kind": 6},
                ]},
            }]}),
        ))
        .await;

    let reply = server.recv().await;
    assert_eq!(reply["id"], 41);
    assert_eq!(reply["result"], Value::Null);

    let (id, watcher_count) =
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
    assert_eq!(id, "workspace-watch");
    assert_eq!(watcher_count, 2);
}
