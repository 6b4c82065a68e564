//! Transport layer for the Language Server Protocol.
//!
//! Messages on the wire are framed HTTP-style: one or more headers, a
//! blank line, and a JSON payload. Only `Content-Length` is required;
//! other headers are tolerated and ignored.

use crate::lsp::error::{Error, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Incremental reader for framed JSON-RPC messages.
///
/// Keeps a byte buffer across chunks so messages split at arbitrary
/// byte boundaries (or concatenated back-to-back) are reassembled
/// correctly. Bytes past the current payload stay buffered for the
/// next message.
pub struct MessageReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Read the next complete message.
    ///
    /// A clean EOF between messages yields `ConnectionClosed`; EOF in
    /// the middle of a message is a transport error.
    pub async fn read_message(&mut self) -> Result<Value> {
        loop {
            if let Some(message) = self.try_parse()? {
                return Ok(message);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Err(Error::ConnectionClosed);
                }
                return Err(Error::Transport(
                    "EOF before a complete message".to_string(),
                ));
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Attempt to parse one message out of the buffer. Returns
    /// `Ok(None)` when more bytes are needed.
    fn try_parse(&mut self) -> Result<Option<Value>> {
        let Some(separator) = find_subsequence(&self.buf, HEADER_SEPARATOR) else {
            return Ok(None);
        };

        let header = std::str::from_utf8(&self.buf[..separator])
            .map_err(|e| Error::Transport(format!("invalid UTF-8 in header: {e}")))?;
        let content_length = parse_content_length(header)?;

        let body_start = separator + HEADER_SEPARATOR.len();
        if self.buf.len() < body_start + content_length {
            return Ok(None);
        }

        let message = serde_json::from_slice(&self.buf[body_start..body_start + content_length])?;
        self.buf.drain(..body_start + content_length);
        Ok(Some(message))
    }
}

/// Serialize a message and write it as a single framed payload.
///
/// The header carries the **byte** length of the body. Callers must
/// serialize writes; interleaved writers would corrupt the stream.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &Value) -> Result<()> {
    let body = serde_json::to_vec(message)?;
    let mut framed = Vec::with_capacity(body.len() + 32);
    framed.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
    framed.extend_from_slice(&body);
    writer.write_all(&framed).await?;
    writer.flush().await?;
    Ok(())
}

/// Build a JSON-RPC request.
pub fn request(id: i64, method: &str, params: Value) -> Value {
    let mut message = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
    });
    if !params.is_null() {
        message["params"] = params;
    }
    message
}

/// Build a JSON-RPC notification.
pub fn notification(method: &str, params: Value) -> Value {
    let mut message = json!({
        "jsonrpc": "2.0",
        "method": method,
    });
    if !params.is_null() {
        message["params"] = params;
    }
    message
}

/// Build a JSON-RPC success response.
pub fn response(id: &Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

/// Build a JSON-RPC error response.
pub fn error_response(id: &Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}

fn parse_content_length(header: &str) -> Result<usize> {
    for line in header.split("\r\n") {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                return value.trim().parse::<usize>().map_err(|_| {
                    Error::Transport(format!("invalid Content-Length: {}", value.trim()))
                });
            }
        }
    }
    Err(Error::Transport(
        "missing Content-Length header".to_string(),
    ))
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
