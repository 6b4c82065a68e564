//! References tool: symbol lookup, reference query, and a per-file
//! context view with collapsed line ranges.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

use super::{render, Tool, ToolContext};
use crate::lsp::protocol::Location;
use crate::lsp::symbols::{parse_symbols, Symbol};
use crate::lsp::uri::uri_to_path;

pub struct ReferencesTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferencesParams {
    symbol_name: String,
}

#[async_trait]
impl Tool for ReferencesTool {
    fn name(&self) -> &str {
        "references"
    }

    fn description(&self) -> &str {
        "Find all references to a symbol, grouped by file with surrounding context lines"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "symbolName": {
                    "type": "string",
                    "description": "Name of the symbol whose references to find"
                }
            },
            "required": ["symbolName"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<String> {
        let params: ReferencesParams =
            serde_json::from_value(params).context("Invalid parameters for references")?;
        let name = params.symbol_name;
        let context_lines = ctx.config.context_lines;

        let result = ctx
            .client
            .call("workspace/symbol", json!({"query": name}))
            .await
            .context("workspace/symbol query failed")?;
        let symbols = parse_symbols(&result);

        // All reference locations across the accepted symbols, grouped
        // by URI; BTreeMap keeps files lexicographically sorted.
        let mut by_uri: BTreeMap<String, Vec<Location>> = BTreeMap::new();
        for symbol in symbols.iter().filter(|s| matches_references(&name, s)) {
            let location = symbol.location();
            let Ok(path) = uri_to_path(&location.uri) else {
                continue;
            };
            if let Err(e) = ctx.client.open_file(&path).await {
                tracing::debug!("could not open {}: {e}", path.display());
                continue;
            }

            let result = ctx
                .client
                .call(
                    "textDocument/references",
                    json!({
                        "textDocument": {"uri": location.uri},
                        "position": location.range.start,
                        "context": {"includeDeclaration": false},
                    }),
                )
                .await
                .context("textDocument/references failed")?;
            let locations: Vec<Location> = serde_json::from_value(result).unwrap_or_default();
            for reference in locations {
                by_uri.entry(reference.uri.clone()).or_default().push(reference);
            }
        }

        if by_uri.is_empty() {
            return Ok(format!("No references found for {name}"));
        }

        let mut blocks = Vec::new();
        for (uri, references) in &by_uri {
            let Ok(path) = uri_to_path(uri) else {
                continue;
            };
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let lines: Vec<&str> = text.split('\n').collect();
            blocks.push(render_file_block(&path, references, &lines, context_lines));
        }

        Ok(blocks.join("\n\n"))
    }
}

/// More permissive than the definition policy: a dotted query also
/// matches symbols named by its last segment.
fn matches_references(query: &str, symbol: &Symbol) -> bool {
    if query.contains('.') {
        let last_segment = query.rsplit('.').next().unwrap_or(query);
        return symbol.name() == query || symbol.name() == last_segment;
    }
    symbol.name() == query
}

fn render_file_block(
    path: &std::path::Path,
    references: &[Location],
    lines: &[&str],
    context_lines: usize,
) -> String {
    let total = lines.len().saturating_sub(1);

    // Collect the displayed line set: every reference span padded by
    // the context budget on both sides.
    let mut wanted: Vec<usize> = Vec::new();
    for reference in references {
        let start = (reference.range.start.line as usize).saturating_sub(context_lines);
        let end = (reference.range.end.line as usize + context_lines).min(total);
        wanted.extend(start..=end);
    }
    wanted.sort_unstable();
    wanted.dedup();
    let ranges = render::collapse_ranges(&wanted);

    let positions: Vec<String> = references
        .iter()
        .map(|r| {
            format!(
                "L{}:C{}",
                r.range.start.line + 1,
                r.range.start.character + 1
            )
        })
        .collect();

    let mut out = format!(
        "File: {}\nReferences in File: {}\nAt: {}\n",
        path.display(),
        references.len(),
        positions.join(", ")
    );
    let rendered: Vec<String> = ranges
        .iter()
        .map(|&(start, end)| render::render_lines(lines, start, end))
        .collect();
    out.push_str(&rendered.join("\n...\n"));
    out
}
