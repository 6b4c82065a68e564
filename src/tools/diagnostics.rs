//! Diagnostics tool: report the server's most recent diagnostics for
//! a file with a context slice per finding.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{render, Tool, ToolContext};
use crate::lsp::protocol::Diagnostic;
use crate::lsp::uri::path_to_uri;

/// Diagnostics arrive unsolicited; after opening a file the server
/// needs a moment to analyze and push them.
const PUBLISH_GRACE: Duration = Duration::from_millis(500);

pub struct DiagnosticsTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiagnosticsParams {
    file_path: String,
    #[serde(default = "default_context_lines")]
    context_lines: usize,
    #[serde(default = "default_show_line_numbers")]
    show_line_numbers: bool,
}

fn default_context_lines() -> usize {
    5
}

fn default_show_line_numbers() -> bool {
    true
}

#[async_trait]
impl Tool for DiagnosticsTool {
    fn name(&self) -> &str {
        "diagnostics"
    }

    fn description(&self) -> &str {
        "Get compiler/linter diagnostics for a file as published by the language server"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": {"type": "string", "description": "File to fetch diagnostics for"},
                "contextLines": {
                    "type": "integer",
                    "description": "Context lines shown around each diagnostic (default 5)"
                },
                "showLineNumbers": {
                    "type": "boolean",
                    "description": "Prefix context lines with line numbers (default true)"
                }
            },
            "required": ["filePath"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<String> {
        let params: DiagnosticsParams =
            serde_json::from_value(params).context("Invalid parameters for diagnostics")?;

        let path = ctx.resolve_path(&params.file_path);
        ctx.client
            .open_file(&path)
            .await
            .with_context(|| format!("could not open {}", path.display()))?;

        tokio::time::sleep(PUBLISH_GRACE).await;

        let uri = path_to_uri(&path)?;
        let diagnostics = ctx.client.diagnostics_for(&uri);
        if diagnostics.is_empty() {
            return Ok(format!("No diagnostics for {}", params.file_path));
        }

        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let lines: Vec<&str> = text.split('\n').collect();

        let blocks: Vec<String> = diagnostics
            .iter()
            .map(|diagnostic| {
                render_diagnostic(
                    diagnostic,
                    &lines,
                    params.context_lines,
                    params.show_line_numbers,
                )
            })
            .collect();

        Ok(format!(
            "Diagnostics for {} ({} total):\n\n{}",
            params.file_path,
            diagnostics.len(),
            blocks.join("\n\n")
        ))
    }
}

fn render_diagnostic(
    diagnostic: &Diagnostic,
    lines: &[&str],
    context_lines: usize,
    show_line_numbers: bool,
) -> String {
    let range = &diagnostic.range;
    let mut out = format!(
        "[{}] L{}:C{} - L{}:C{}: {}",
        render::severity_name(diagnostic.severity),
        range.start.line + 1,
        range.start.character + 1,
        range.end.line + 1,
        range.end.character + 1,
        diagnostic.message
    );
    if let Some(source) = &diagnostic.source {
        out.push_str(&format!("\nSource: {source}"));
    }
    if let Some(code) = &diagnostic.code {
        let code = match code {
            serde_json::Value::String(code) => code.clone(),
            other => other.to_string(),
        };
        out.push_str(&format!("\nCode: {code}"));
    }

    if lines.is_empty() {
        return out;
    }
    let last = lines.len() - 1;
    let start = (range.start.line as usize).saturating_sub(context_lines);
    let end = (range.end.line as usize + context_lines).min(last);
    out.push('\n');
    if show_line_numbers {
        out.push_str(&render::render_lines(lines, start, end));
    } else {
        out.push_str(&lines[start..=end.min(last)].join("\n"));
    }
    out
}
