//! LSP protocol types
//!
//! Core types used in the Language Server Protocol, plus classification
//! of incoming JSON-RPC messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// An incoming JSON-RPC message, classified by `{method, id}` presence.
#[derive(Debug)]
pub enum Incoming {
    /// `method` + `id`: a server-initiated request expecting a response.
    Request {
        id: Value,
        method: String,
        params: Value,
    },
    /// `method` only: a notification.
    Notification { method: String, params: Value },
    /// `id` only: a response to one of our requests.
    Response {
        id: Value,
        result: Option<Value>,
        error: Option<ResponseError>,
    },
    /// Neither a method nor a usable id.
    Malformed(Value),
}

/// Classify a decoded JSON-RPC message.
pub fn classify(mut message: Value) -> Incoming {
    let method = message
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_string);
    let has_id = message.get("id").map(|id| !id.is_null()).unwrap_or(false);

    match (method, has_id) {
        (Some(method), true) => Incoming::Request {
            id: message["id"].take(),
            method,
            params: message.get_mut("params").map(Value::take).unwrap_or(Value::Null),
        },
        (Some(method), false) => Incoming::Notification {
            method,
            params: message.get_mut("params").map(Value::take).unwrap_or(Value::Null),
        },
        (None, true) => {
            let error = message
                .get_mut("error")
                .map(Value::take)
                .and_then(|e| serde_json::from_value(e).ok());
            Incoming::Response {
                id: message["id"].take(),
                result: message.get_mut("result").map(Value::take),
                error,
            }
        }
        (None, false) => Incoming::Malformed(message),
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A position in a text document (0-indexed line and character)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Position {
    /// Line position (0-indexed)
    pub line: u32,
    /// Character offset on the line (0-indexed, UTF-16 code units)
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A range in a text document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// A location in a document (URI + range)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

/// LSP Diagnostic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub range: Range,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub message: String,
}

/// `textDocument/publishDiagnostics` params
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishDiagnosticsParams {
    pub uri: String,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

/// A single text edit within one document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

/// A workspace-wide set of edits keyed by document URI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<HashMap<String, Vec<TextEdit>>>,
}

/// Hover result
#[derive(Debug, Clone, Deserialize)]
pub struct Hover {
    pub contents: HoverContents,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
}

/// The three shapes `Hover.contents` can take on the wire
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HoverContents {
    Markup(MarkupContent),
    Scalar(MarkedString),
    Array(Vec<MarkedString>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkupContent {
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MarkedString {
    String(String),
    LanguageString { language: String, value: String },
}

/// `workspace/didChangeWatchedFiles` change entry. `type` is
/// 1 = Created, 2 = Changed, 3 = Deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeType {
    Created,
    Changed,
    Deleted,
}

impl FileChangeType {
    pub fn as_lsp(self) -> u32 {
        match self {
            FileChangeType::Created => 1,
            FileChangeType::Changed => 2,
            FileChangeType::Deleted => 3,
        }
    }

    /// Bit in a watcher registration's kind mask (Create=1, Change=2, Delete=4).
    pub fn watch_kind_bit(self) -> u32 {
        match self {
            FileChangeType::Created => 1,
            FileChangeType::Changed => 2,
            FileChangeType::Deleted => 4,
        }
    }
}

/// One dynamic registration from `client/registerCapability`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub register_options: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationParams {
    pub registrations: Vec<Registration>,
}

/// A watcher entry from a `workspace/didChangeWatchedFiles` registration.
///
/// The glob pattern may be a plain string or a `{pattern, baseUri}`
/// object; the kind is a bitset of {Create=1, Change=2, Delete=4} and
/// absence means all three.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemWatcher {
    pub glob_pattern: Value,
    #[serde(default)]
    pub kind: Option<u32>,
}

impl FileSystemWatcher {
    /// The pattern string, unwrapping the `{pattern}` object form.
    pub fn pattern(&self) -> Option<&str> {
        match &self.glob_pattern {
            Value::String(s) => Some(s),
            Value::Object(o) => o.get("pattern").and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn accepts(&self, change: FileChangeType) -> bool {
        match self.kind {
            Some(mask) => mask & change.watch_kind_bit() != 0,
            None => true,
        }
    }
}
