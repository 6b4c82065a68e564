//! Uniform view over the two symbol shapes returned by `workspace/symbol`.
//!
//! Servers may return `SymbolInformation` (location with a range) or
//! `WorkspaceSymbol` (location possibly carrying only a URI). Downstream
//! code sees one type; the degenerate case synthesizes a zero-length
//! range at line 0.

use crate::lsp::protocol::{Location, Range};
use serde::Deserialize;
use serde_json::Value;

/// LSP `SymbolKind.Method`.
pub const SYMBOL_KIND_METHOD: u32 = 6;

/// A symbol from a `workspace/symbol` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    name: String,
    #[serde(default)]
    kind: Option<u32>,
    #[serde(default)]
    container_name: Option<String>,
    location: SymbolLocation,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SymbolLocation {
    Full(Location),
    UriOnly { uri: String },
}

impl Symbol {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Option<u32> {
        self.kind
    }

    pub fn kind_name(&self) -> Option<&'static str> {
        self.kind.and_then(symbol_kind_name)
    }

    pub fn container_name(&self) -> Option<&str> {
        self.container_name.as_deref()
    }

    /// The symbol's location; a URI-only location gets a zero-length
    /// range at line 0.
    pub fn location(&self) -> Location {
        match &self.location {
            SymbolLocation::Full(location) => location.clone(),
            SymbolLocation::UriOnly { uri } => Location {
                uri: uri.clone(),
                range: Range::default(),
            },
        }
    }
}

/// Parse a `workspace/symbol` result value into symbols. `null` and
/// entries that do not deserialize are dropped.
pub fn parse_symbols(result: &Value) -> Vec<Symbol> {
    match result {
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn symbol_kind_name(kind: u32) -> Option<&'static str> {
    let name = match kind {
        1 => "File",
        2 => "Module",
        3 => "Namespace",
        4 => "Package",
        5 => "Class",
        6 => "Method",
        7 => "Property",
        8 => "Field",
        9 => "Constructor",
        10 => "Enum",
        11 => "Interface",
        12 => "Function",
        13 => "Variable",
        14 => "Constant",
        15 => "String",
        16 => "Number",
        17 => "Boolean",
        18 => "Array",
        19 => "Object",
        20 => "Key",
        21 => "Null",
        22 => "EnumMember",
        23 => "Struct",
        24 => "Event",
        25 => "Operator",
        26 => "TypeParameter",
        _ => return None,
    };
    Some(name)
}
