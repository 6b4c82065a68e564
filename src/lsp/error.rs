//! Error types for the LSP client.
//!
//! Covers everything from transport-level failures to error responses
//! returned by the language server.

use std::path::PathBuf;
use thiserror::Error;

/// A specialized Result type for LSP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for LSP operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO errors from the transport layer or file access
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport protocol errors (malformed headers, EOF mid-message)
    #[error("transport error: {0}")]
    Transport(String),

    /// Error response from the language server
    #[error("server error {code}: {message}")]
    Request { code: i64, message: String },

    /// A `didChange` was attempted for a URI that was never opened
    #[error("file is not open: {0}")]
    MissingOpenFile(String),

    /// A path could not be converted to a `file://` URI or back
    #[error("invalid path: {0}")]
    InvalidPath(PathBuf),

    /// The reader loop exited; no further responses will arrive
    #[error("connection to language server closed")]
    ConnectionClosed,

    /// A request did not complete within the configured timeout
    #[error("request '{method}' timed out")]
    Timeout { method: String },
}

/// JSON-RPC error codes used when replying to server requests.
pub mod error_codes {
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INTERNAL_ERROR: i64 = -32603;
}
