//! Definition tool: workspace symbol lookup, range expansion, and a
//! numbered-line rendering of the definition block.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

use super::{render, Tool, ToolContext};
use crate::lsp::protocol::Range;
use crate::lsp::symbols::{parse_symbols, Symbol, SYMBOL_KIND_METHOD};
use crate::lsp::uri::uri_to_path;

pub struct DefinitionTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionParams {
    symbol_name: String,
}

#[async_trait]
impl Tool for DefinitionTool {
    fn name(&self) -> &str {
        "definition"
    }

    fn description(&self) -> &str {
        "Find the definition of a symbol by name and return it with surrounding context"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "symbolName": {
                    "type": "string",
                    "description": "Name of the symbol to look up (qualified names like 'Class.method' are matched exactly)"
                }
            },
            "required": ["symbolName"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<String> {
        let params: DefinitionParams =
            serde_json::from_value(params).context("Invalid parameters for definition")?;
        let name = params.symbol_name;

        let result = ctx
            .client
            .call("workspace/symbol", json!({"query": name}))
            .await
            .context("workspace/symbol query failed")?;
        let symbols = parse_symbols(&result);

        let mut blocks = Vec::new();
        for symbol in symbols.iter().filter(|s| matches_definition(&name, s)) {
            let location = symbol.location();
            let path = match uri_to_path(&location.uri) {
                Ok(path) => path,
                Err(_) => continue,
            };
            if let Err(e) = ctx.client.open_file(&path).await {
                blocks.push(format!("Could not open {}: {e}", path.display()));
                continue;
            }
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let lines: Vec<&str> = text.split('\n').collect();
            let (start, end) = expand_range(&lines, &location.range);
            blocks.push(render_definition(symbol, &path, &location.range, &lines, start, end));
        }

        if blocks.is_empty() {
            return Ok(format!("{name} not found"));
        }
        Ok(blocks.join("\n\n"))
    }
}

/// Match policy: dotted queries require exact equality; methods also
/// match when the server returns a qualified name ending in `::name`
/// or `.name`; everything else is exact.
fn matches_definition(query: &str, symbol: &Symbol) -> bool {
    if query.contains('.') {
        return symbol.name() == query;
    }
    if symbol.kind() == Some(SYMBOL_KIND_METHOD) {
        return symbol.name() == query
            || symbol.name().ends_with(&format!("::{query}"))
            || symbol.name().ends_with(&format!(".{query}"));
    }
    symbol.name() == query
}

/// Expand the server's identifier range into a readable block: walk
/// upward over comments and annotations, and extend the end forward
/// to the line where brace balance returns to zero.
fn expand_range(lines: &[&str], range: &Range) -> (usize, usize) {
    if lines.is_empty() {
        return (0, 0);
    }
    let last = lines.len() - 1;
    let reported_start = (range.start.line as usize).min(last);
    let reported_end = (range.end.line as usize).min(last);

    let mut start = reported_start;
    while start > 0 && is_comment_or_annotation(lines[start - 1]) {
        start -= 1;
    }

    (start, expand_end(lines, reported_start, reported_end))
}

fn is_comment_or_annotation(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("//")
        || trimmed.starts_with("/*")
        || trimmed.starts_with('*')
        || trimmed.starts_with('#')
        || trimmed.starts_with('@')
}

fn expand_end(lines: &[&str], reported_start: usize, reported_end: usize) -> usize {
    let mut balance: i64 = 0;
    let mut saw_brace = false;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (index, line) in lines.iter().enumerate().skip(reported_end) {
        for c in line.chars() {
            if escaped {
                escaped = false;
                continue;
            }
            match in_string {
                Some(quote) => match c {
                    '\\' => escaped = true,
                    c if c == quote => in_string = None,
                    _ => {}
                },
                None => match c {
                    '\'' | '"' => in_string = Some(c),
                    '{' => {
                        balance += 1;
                        saw_brace = true;
                    }
                    '}' => balance -= 1,
                    _ => {}
                },
            }
        }
        if saw_brace && balance == 0 && index > reported_start {
            return index;
        }
    }
    // Balance never closed: the end never shrinks below what the
    // server reported.
    reported_end
}

fn render_definition(
    symbol: &Symbol,
    path: &Path,
    range: &Range,
    lines: &[&str],
    start: usize,
    end: usize,
) -> String {
    let mut out = String::new();
    out.push_str(&"=".repeat(60));
    out.push('\n');
    out.push_str(&format!("Symbol: {}\n", symbol.name()));
    out.push_str(&format!("File: {}\n", path.display()));
    if let Some(kind) = symbol.kind_name() {
        out.push_str(&format!("Kind: {kind}\n"));
    }
    if let Some(container) = symbol.container_name() {
        out.push_str(&format!("Container Name: {container}\n"));
    }
    out.push_str(&format!(
        "Range: L{}:C{} - L{}:C{}\n",
        range.start.line + 1,
        range.start.character + 1,
        range.end.line + 1,
        range.end.character + 1
    ));
    out.push_str(&"=".repeat(60));
    out.push('\n');
    out.push_str(&render::render_lines(lines, start, end));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::lsp::protocol::Position;
    use crate::lsp::test_support::FakeServer;
    use crate::lsp::transport;
    use serde_json::Value;

    fn symbol(name: &str, kind: u32) -> Symbol {
        serde_json::from_value(json!({
            "name": name,
            "kind": kind,
            "location": {"uri": "file:///ws/a.ts", "range": {
                "start": {"line": 0, "character": 0},
                "end": {"line": 0, "character": 1},
            }},
        }))
        .unwrap()
    }

    #[test]
    fn match_policy_for_methods() {
        let candidates = [
            symbol("Foo", SYMBOL_KIND_METHOD),
            symbol("Bar::Foo", SYMBOL_KIND_METHOD),
            symbol("other.Foo", SYMBOL_KIND_METHOD),
        ];
        let matched: Vec<&str> = candidates
            .iter()
            .filter(|s| matches_definition("Foo", s))
            .map(Symbol::name)
            .collect();
        assert_eq!(matched, vec!["Foo", "Bar::Foo", "other.Foo"]);

        // A dotted query requires exact equality.
        let matched: Vec<&str> = candidates
            .iter()
            .filter(|s| matches_definition("Bar.Foo", s))
            .map(Symbol::name)
            .collect();
        assert!(matched.is_empty());
        assert!(matches_definition(
            "Bar.Foo",
            &symbol("Bar.Foo", SYMBOL_KIND_METHOD)
        ));
    }

    #[test]
    fn match_policy_for_non_methods_is_exact() {
        assert!(matches_definition("Foo", &symbol("Foo", 5)));
        assert!(!matches_definition("Foo", &symbol("Bar::Foo", 5)));
        assert!(!matches_definition("Foo", &symbol("Foobar", 5)));
    }

    #[test]
    fn expansion_includes_leading_comment_and_closing_brace() {
        let lines = vec!["// doc", "function f() {", "  return 1;", "}"];
        let range = Range::new(Position::new(1, 0), Position::new(1, 12));
        assert_eq!(expand_range(&lines, &range), (0, 3));
    }

    #[test]
    fn expansion_walks_over_annotations_and_hashes() {
        let lines = vec![
            "const X = 1;",
            "# a comment",
            "@decorator",
            "/* block",
            " * middle",
            "def f():",
            "    pass",
        ];
        let range = Range::new(Position::new(5, 4), Position::new(5, 5));
        let (start, end) = expand_range(&lines, &range);
        assert_eq!(start, 1);
        // No braces: the end stays where the server put it.
        assert_eq!(end, 5);
    }

    #[test]
    fn expansion_ignores_braces_inside_strings() {
        let lines = vec![
            "fn f() {",
            "  let s = \"}\";",
            "  let c = '{';",
            "  let esc = \"\\\"}\";",
            "}",
        ];
        let range = Range::new(Position::new(0, 3), Position::new(0, 4));
        assert_eq!(expand_range(&lines, &range), (0, 4));
    }

    #[test]
    fn unbalanced_braces_keep_reported_end() {
        let lines = vec!["fn f() {", "  stuff();"];
        let range = Range::new(Position::new(0, 3), Position::new(0, 4));
        assert_eq!(expand_range(&lines, &range), (0, 0));
    }

    #[tokio::test]
    async fn end_to_end_rendering() {
        let (client, mut server) = FakeServer::pair(None);
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let file = root.join("lib.ts");
        tokio::fs::write(&file, "// doc\nfunction f() {\n  return 1;\n}\n")
            .await
            .unwrap();

        let uri = crate::lsp::uri::path_to_uri(&file).unwrap();
        let ctx = ToolContext {
            client,
            workspace_root: root,
            config: BridgeConfig::default(),
        };

        let responder = tokio::spawn(async move {
            let request = server.recv_method("workspace/symbol").await;
            assert_eq!(request["params"]["query"], "f");
            let id = request["id"].clone();
            server
                .send(transport::response(
                    &id,
                    json!([{
                        "name": "f",
                        "kind": 12,
                        "location": {"uri": uri, "range": {
                            "start": {"line": 1, "character": 0},
                            "end": {"line": 1, "character": 12},
                        }},
                    }]),
                ))
                .await;
            server
        });

        let output = DefinitionTool
            .execute(json!({"symbolName": "f"}), &ctx)
            .await
            .unwrap();
        let mut server = responder.await.unwrap();

        assert!(output.contains("Symbol: f"));
        assert!(output.contains("Kind: Function"));
        assert!(output.contains("Range: L2:C1 - L2:C13"));
        assert!(output.contains("     1| // doc"));
        assert!(output.contains("     2| function f() {"));
        assert!(output.contains("     4| }"));
        assert!(!output.contains("     5|"));

        // The tool opened the file before reading it.
        let opened: Value = server.recv_method("textDocument/didOpen").await;
        assert_eq!(opened["params"]["textDocument"]["languageId"], "typescript");
    }

    #[tokio::test]
    async fn missing_symbol_reports_not_found() {
        let (client, mut server) = FakeServer::pair(None);
        let ctx = ToolContext {
            client,
            workspace_root: std::path::PathBuf::from("/tmp"),
            config: BridgeConfig::default(),
        };

        let responder = tokio::spawn(async move {
            let request = server.recv_method("workspace/symbol").await;
            let id = request["id"].clone();
            server.send(transport::response(&id, Value::Null)).await;
        });

        let output = DefinitionTool
            .execute(json!({"symbolName": "Ghost"}), &ctx)
            .await
            .unwrap();
        responder.await.unwrap();
        assert_eq!(output, "Ghost not found");
    }
}
