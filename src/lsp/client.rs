//! LSP client
//!
//! Owns the language-server child process and all shared protocol
//! state: the pending-request table, the open-file registry, the
//! diagnostics store and the handler maps for server-initiated
//! traffic. A single reader task demultiplexes the server's stdout;
//! server requests are dispatched on detached tasks so the reader
//! never blocks on a handler.

use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::lsp::error::{error_codes, Error, Result};
use crate::lsp::language::language_id_for_path;
use crate::lsp::protocol::{
    classify, Diagnostic, FileSystemWatcher, Incoming, PublishDiagnosticsParams,
    RegistrationParams,
};
use crate::lsp::transport::{self, MessageReader};
use crate::lsp::uri::path_to_uri;

/// Grace window for the child to exit after stdin closes.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

type NotificationHandler = Arc<dyn Fn(Value) + Send + Sync>;
type RequestHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;
type WatchHook = Arc<dyn Fn(String, Vec<FileSystemWatcher>) + Send + Sync>;

/// Client for a single language server. Cheap to clone; all clones
/// share the same connection and state.
#[derive(Clone)]
pub struct LspClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    next_id: AtomicI64,
    request_timeout: Option<Duration>,
    pending: StdMutex<HashMap<i64, oneshot::Sender<Result<Value>>>>,
    notification_handlers: StdMutex<HashMap<String, NotificationHandler>>,
    request_handlers: StdMutex<HashMap<String, RequestHandler>>,
    /// URI -> document version. Present iff the server has seen a
    /// `didOpen` not yet followed by `didClose`.
    open_files: StdMutex<HashMap<String, i64>>,
    /// URI -> most recent published diagnostics (last write wins).
    diagnostics: StdMutex<HashMap<String, Vec<Diagnostic>>>,
    watch_hook: StdMutex<Option<WatchHook>>,
    child: StdMutex<Option<Child>>,
}

impl LspClient {
    /// Spawn a language server and start reading its stdout.
    pub fn spawn(
        command: &str,
        args: &[String],
        workspace: &Path,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        let resolved = which::which(command).map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("language server '{command}' not found in PATH"),
            ))
        })?;

        let mut child = Command::new(resolved)
            .args(args)
            .current_dir(workspace)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transport("failed to capture server stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transport("failed to capture server stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Transport("failed to capture server stderr".to_string()))?;

        // Stderr is never parsed, only logged.
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("server stderr: {line}");
            }
        });

        info!("language server started: {command}");
        Ok(Self::build(
            Box::new(stdout),
            Box::new(stdin),
            request_timeout,
            Some(child),
        ))
    }

    /// Build a client over arbitrary streams. Used by tests to talk to
    /// an in-process fake server.
    pub fn from_streams<R, W>(reader: R, writer: W, request_timeout: Option<Duration>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::build(Box::new(reader), Box::new(writer), request_timeout, None)
    }

    fn build(
        reader: Box<dyn AsyncRead + Send + Unpin>,
        writer: Box<dyn AsyncWrite + Send + Unpin>,
        request_timeout: Option<Duration>,
        child: Option<Child>,
    ) -> Self {
        let inner = Arc::new(ClientInner {
            writer: Mutex::new(writer),
            next_id: AtomicI64::new(1),
            request_timeout,
            pending: StdMutex::new(HashMap::new()),
            notification_handlers: StdMutex::new(HashMap::new()),
            request_handlers: StdMutex::new(HashMap::new()),
            open_files: StdMutex::new(HashMap::new()),
            diagnostics: StdMutex::new(HashMap::new()),
            watch_hook: StdMutex::new(None),
            child: StdMutex::new(child),
        });

        tokio::spawn(reader_loop(Arc::clone(&inner), reader));

        Self { inner }
    }

    /// Send the `initialize` request, the `initialized` notification,
    /// and install the default handlers for server-initiated traffic.
    pub async fn initialize(&self, workspace_dir: &Path) -> Result<Value> {
        let root_uri = path_to_uri(workspace_dir)?;
        let workspace_name = workspace_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("workspace")
            .to_string();

        let params = json!({
            "processId": std::process::id(),
            "rootUri": root_uri,
            "workspaceFolders": [{"uri": root_uri, "name": workspace_name}],
            "capabilities": {
                "workspace": {
                    "configuration": true,
                    "didChangeWatchedFiles": {"dynamicRegistration": true},
                    "symbol": {"dynamicRegistration": false},
                },
                "textDocument": {
                    "synchronization": {
                        "dynamicRegistration": true,
                        "didSave": true,
                    },
                    "publishDiagnostics": {"versionSupport": true},
                    "hover": {"contentFormat": ["markdown", "plaintext"]},
                },
            },
        });

        let result = self.call("initialize", params).await?;
        self.notify("initialized", json!({})).await?;
        self.install_default_handlers();
        info!("language server initialized for {}", workspace_dir.display());
        Ok(result)
    }

    pub(crate) fn install_default_handlers(&self) {
        // The tools apply workspace edits themselves; acknowledge and
        // do nothing so the server sees exactly one effective
        // application.
        self.on_request("workspace/applyEdit", |_params| {
            Box::pin(async { Ok(json!({"applied": true})) })
        });

        self.on_request("workspace/configuration", |params| {
            Box::pin(async move {
                let items = params
                    .get("items")
                    .and_then(Value::as_array)
                    .map(|items| items.len())
                    .unwrap_or(0);
                Ok(Value::Array(vec![json!({}); items]))
            })
        });

        let hook_target = self.clone();
        self.on_request("client/registerCapability", move |params| {
            let client = hook_target.clone();
            Box::pin(async move {
                let parsed: RegistrationParams = serde_json::from_value(params)?;
                for registration in parsed.registrations {
                    if registration.method != "workspace/didChangeWatchedFiles" {
                        continue;
                    }
                    let watchers: Vec<FileSystemWatcher> = registration
                        .register_options
                        .as_ref()
                        .and_then(|options| options.get("watchers"))
                        .cloned()
                        .map(serde_json::from_value)
                        .transpose()?
                        .unwrap_or_default();
                    client.forward_watch_registration(registration.id, watchers);
                }
                Ok(Value::Null)
            })
        });

        self.on_notification("window/showMessage", |params| {
            let message = params
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            info!("language server message: {message}");
        });

        self.on_notification("window/logMessage", |params| {
            let message = params
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            debug!("language server log: {message}");
        });

        let store = self.clone();
        self.on_notification("textDocument/publishDiagnostics", move |params| {
            match serde_json::from_value::<PublishDiagnosticsParams>(params) {
                Ok(published) => {
                    debug!(
                        "received {} diagnostics for {}",
                        published.diagnostics.len(),
                        published.uri
                    );
                    store
                        .inner
                        .diagnostics
                        .lock()
                        .unwrap()
                        .insert(published.uri, published.diagnostics);
                }
                Err(e) => warn!("unparseable publishDiagnostics: {e}"),
            }
        });
    }

    /// Register a notification handler. Handlers must be cheap; they
    /// run on the reader task.
    pub fn on_notification<F>(&self, method: &str, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.inner
            .notification_handlers
            .lock()
            .unwrap()
            .insert(method.to_string(), Arc::new(handler));
    }

    /// Register a handler for server-initiated requests. Handlers run
    /// on detached tasks; the returned value (or error) becomes the
    /// JSON-RPC response.
    pub fn on_request<F>(&self, method: &str, handler: F)
    where
        F: Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync + 'static,
    {
        self.inner
            .request_handlers
            .lock()
            .unwrap()
            .insert(method.to_string(), Arc::new(handler));
    }

    /// Install the hook invoked when the server registers
    /// `workspace/didChangeWatchedFiles` watchers.
    pub fn set_watch_hook<F>(&self, hook: F)
    where
        F: Fn(String, Vec<FileSystemWatcher>) + Send + Sync + 'static,
    {
        *self.inner.watch_hook.lock().unwrap() = Some(Arc::new(hook));
    }

    fn forward_watch_registration(&self, id: String, watchers: Vec<FileSystemWatcher>) {
        let hook = self.inner.watch_hook.lock().unwrap().clone();
        match hook {
            Some(hook) => hook(id, watchers),
            None => debug!("watcher registration '{id}' received before a hook was installed"),
        }
    }

    /// Send a request and await its response.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().unwrap().insert(id, tx);

        let message = transport::request(id, method, params);
        if let Err(e) = self.write(&message).await {
            self.inner.pending.lock().unwrap().remove(&id);
            return Err(e);
        }

        match self.inner.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(outcome) => outcome.unwrap_or(Err(Error::ConnectionClosed)),
                Err(_) => {
                    self.inner.pending.lock().unwrap().remove(&id);
                    Err(Error::Timeout {
                        method: method.to_string(),
                    })
                }
            },
            None => rx.await.unwrap_or(Err(Error::ConnectionClosed)),
        }
    }

    /// Send a notification; there is no acknowledgement.
    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        self.write(&transport::notification(method, params)).await
    }

    async fn write(&self, message: &Value) -> Result<()> {
        let mut writer = self.inner.writer.lock().await;
        transport::write_message(&mut *writer, message).await
    }

    /// Open a file on the server. Idempotent per URI; the first open
    /// reads the file, assigns version 1 and sends `didOpen`.
    pub async fn open_file(&self, path: &Path) -> Result<()> {
        let uri = path_to_uri(path)?;
        if self.inner.open_files.lock().unwrap().contains_key(&uri) {
            return Ok(());
        }

        let text = tokio::fs::read_to_string(path).await?;
        {
            let mut open = self.inner.open_files.lock().unwrap();
            if open.contains_key(&uri) {
                return Ok(());
            }
            open.insert(uri.clone(), 1);
        }

        let params = json!({
            "textDocument": {
                "uri": uri.clone(),
                "languageId": language_id_for_path(path),
                "version": 1,
                "text": text,
            },
        });
        let sent = self.notify("textDocument/didOpen", params).await;
        if sent.is_err() {
            self.inner.open_files.lock().unwrap().remove(&uri);
        }
        sent
    }

    /// Re-read an open file and send a full-text `didChange` with the
    /// next version. Fails when the URI is not open.
    pub async fn notify_change(&self, path: &Path) -> Result<()> {
        let uri = path_to_uri(path)?;
        let text = tokio::fs::read_to_string(path).await?;
        let version = {
            let mut open = self.inner.open_files.lock().unwrap();
            let version = open
                .get_mut(&uri)
                .ok_or_else(|| Error::MissingOpenFile(uri.clone()))?;
            *version += 1;
            *version
        };

        self.notify(
            "textDocument/didChange",
            json!({
                "textDocument": {"uri": uri, "version": version},
                "contentChanges": [{"text": text}],
            }),
        )
        .await
    }

    /// Close a file on the server. Idempotent on missing.
    pub async fn close_file(&self, path: &Path) -> Result<()> {
        let uri = path_to_uri(path)?;
        let was_open = self.inner.open_files.lock().unwrap().remove(&uri).is_some();
        if was_open {
            self.notify(
                "textDocument/didClose",
                json!({"textDocument": {"uri": uri}}),
            )
            .await?;
        }
        Ok(())
    }

    /// Best-effort close of every open file.
    pub async fn close_all_files(&self) {
        let uris: Vec<String> = self
            .inner
            .open_files
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        for uri in uris {
            self.inner.open_files.lock().unwrap().remove(&uri);
            let params = json!({"textDocument": {"uri": uri.clone()}});
            if let Err(e) = self.notify("textDocument/didClose", params).await {
                debug!("failed to close {uri}: {e}");
            }
        }
    }

    pub fn is_open(&self, path: &Path) -> bool {
        path_to_uri(path)
            .map(|uri| self.inner.open_files.lock().unwrap().contains_key(&uri))
            .unwrap_or(false)
    }

    pub fn open_file_count(&self) -> usize {
        self.inner.open_files.lock().unwrap().len()
    }

    /// The most recent diagnostics published for a URI.
    pub fn diagnostics_for(&self, uri: &str) -> Vec<Diagnostic> {
        self.inner
            .diagnostics
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .unwrap_or_default()
    }

    /// Bounded wait for the server to settle after `initialized`.
    /// Real servers differ wildly here (jdtls in particular), so the
    /// duration is caller-configured rather than hardcoded.
    pub async fn wait_for_server_ready(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }

    /// The LSP `shutdown` request: the server flushes state but must
    /// not exit yet.
    pub async fn shutdown(&self) -> Result<Value> {
        self.call("shutdown", Value::Null).await
    }

    /// The `exit` notification that follows `shutdown`.
    pub async fn exit(&self) -> Result<()> {
        self.notify("exit", Value::Null).await
    }

    /// Close the server's stdin and await process exit, killing the
    /// child after a grace window.
    pub async fn close(&self) -> Result<()> {
        {
            let mut writer = self.inner.writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                debug!("closing server stdin failed: {e}");
            }
        }

        let child = self.inner.child.lock().unwrap().take();
        if let Some(mut child) = child {
            match tokio::time::timeout(CLOSE_GRACE, child.wait()).await {
                Ok(Ok(status)) => info!("language server exited: {status}"),
                Ok(Err(e)) => warn!("waiting for language server failed: {e}"),
                Err(_) => {
                    warn!("language server did not exit within {CLOSE_GRACE:?}, killing");
                    if let Err(e) = child.kill().await {
                        warn!("failed to kill language server: {e}");
                    }
                }
            }
        }
        Ok(())
    }
}

async fn reader_loop(inner: Arc<ClientInner>, reader: Box<dyn AsyncRead + Send + Unpin>) {
    let mut reader = MessageReader::new(reader);
    loop {
        let message = match reader.read_message().await {
            Ok(message) => message,
            Err(Error::ConnectionClosed) => {
                info!("language server closed the connection");
                break;
            }
            Err(e) => {
                error!("transport error, ending session: {e}");
                break;
            }
        };

        match classify(message) {
            Incoming::Request { id, method, params } => {
                let handler = inner
                    .request_handlers
                    .lock()
                    .unwrap()
                    .get(&method)
                    .cloned();
                match handler {
                    Some(handler) => {
                        // Dispatch off-loop so a slow handler cannot
                        // stall responses and diagnostics.
                        let inner = Arc::clone(&inner);
                        let future = handler(params);
                        tokio::spawn(async move {
                            let reply = match future.await {
                                Ok(result) => transport::response(&id, result),
                                Err(e) => {
                                    warn!("handler for '{method}' failed: {e:#}");
                                    transport::error_response(
                                        &id,
                                        error_codes::INTERNAL_ERROR,
                                        &format!("{e:#}"),
                                    )
                                }
                            };
                            if let Err(e) = write_raw(&inner, &reply).await {
                                warn!("failed to respond to server request: {e}");
                            }
                        });
                    }
                    None => {
                        let reply = transport::error_response(
                            &id,
                            error_codes::METHOD_NOT_FOUND,
                            &format!("no handler for '{method}'"),
                        );
                        if let Err(e) = write_raw(&inner, &reply).await {
                            warn!("failed to reject server request: {e}");
                        }
                    }
                }
            }
            Incoming::Notification { method, params } => {
                let handler = inner
                    .notification_handlers
                    .lock()
                    .unwrap()
                    .get(&method)
                    .cloned();
                match handler {
                    Some(handler) => handler(params),
                    None => debug!("unhandled notification: {method}"),
                }
            }
            Incoming::Response { id, result, error } => {
                let Some(id) = id.as_i64() else {
                    warn!("response with non-integer id {id}, dropping");
                    continue;
                };
                let sender = inner.pending.lock().unwrap().remove(&id);
                match sender {
                    Some(sender) => {
                        let outcome = match error {
                            Some(error) => Err(Error::Request {
                                code: error.code,
                                message: error.message,
                            }),
                            None => Ok(result.unwrap_or(Value::Null)),
                        };
                        let _ = sender.send(outcome);
                    }
                    None => warn!("response for unknown request id {id}, dropping"),
                }
            }
            Incoming::Malformed(value) => {
                warn!("dropping malformed message: {value}");
            }
        }
    }

    // Pending calls receive the terminal error.
    let pending: Vec<_> = inner.pending.lock().unwrap().drain().collect();
    for (_, sender) in pending {
        let _ = sender.send(Err(Error::ConnectionClosed));
    }
}

async fn write_raw(inner: &ClientInner, message: &Value) -> Result<()> {
    let mut writer = inner.writer.lock().await;
    transport::write_message(&mut *writer, message).await
}
