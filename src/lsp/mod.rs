//! LSP client side of the bridge
//!
//! Handles communication with a single language server via JSON-RPC
//! over stdio: framing, request/response correlation, routing of
//! server-initiated traffic, and the open-file registry.

pub mod client;
pub mod error;
pub mod language;
pub mod protocol;
pub mod symbols;
#[cfg(test)]
pub(crate) mod test_support;
pub mod transport;
pub mod uri;

pub use client::LspClient;
pub use error::{Error, Result};
