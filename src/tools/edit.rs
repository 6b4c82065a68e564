//! Edit tool: 1-indexed, inclusive line-range edits applied through
//! the same machinery as server-provided workspace edits.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use super::{edits, Tool, ToolContext};
use crate::lsp::protocol::{Position, Range, TextEdit};
use crate::lsp::uri::path_to_uri;

pub struct EditFileTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditFileParams {
    file_path: String,
    edits: Vec<LineEdit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineEdit {
    /// 1-indexed, inclusive
    start_line: u32,
    /// 1-indexed, inclusive
    end_line: u32,
    new_text: String,
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace inclusive 1-indexed line ranges in a file; ranges past end-of-file append"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": {"type": "string", "description": "File to edit"},
                "edits": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "startLine": {"type": "integer", "description": "First line to replace (1-indexed, inclusive)"},
                            "endLine": {"type": "integer", "description": "Last line to replace (1-indexed, inclusive)"},
                            "newText": {"type": "string", "description": "Replacement text"}
                        },
                        "required": ["startLine", "endLine", "newText"]
                    }
                }
            },
            "required": ["filePath", "edits"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<String> {
        let params: EditFileParams =
            serde_json::from_value(params).context("Invalid parameters for edit_file")?;
        if params.edits.is_empty() {
            return Ok("No edits provided".to_string());
        }

        let path = ctx.resolve_path(&params.file_path);
        ctx.client
            .open_file(&path)
            .await
            .with_context(|| format!("could not open {}", path.display()))?;

        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let lines: Vec<&str> = text.split('\n').collect();

        let mut converted = Vec::with_capacity(params.edits.len());
        let mut lines_removed = 0usize;
        let mut lines_added = 0usize;
        for edit in &params.edits {
            anyhow::ensure!(
                edit.start_line >= 1,
                "startLine must be >= 1 (lines are 1-indexed)"
            );
            anyhow::ensure!(
                edit.end_line >= edit.start_line,
                "endLine must not precede startLine"
            );
            lines_added += edit.new_text.split('\n').count();
            converted.push(convert_edit(edit, &lines, &mut lines_removed));
        }

        let mut changes = HashMap::new();
        changes.insert(path_to_uri(&path)?, converted);
        let summary = edits::apply_workspace_edit(&changes).await?;

        Ok(format!(
            "Applied {} edit(s) to {}: {} line(s) removed, {} line(s) added",
            summary.total_edits, params.file_path, lines_removed, lines_added
        ))
    }
}

/// Convert a 1-indexed inclusive line edit to an LSP-style edit.
/// A start past end-of-file turns the whole edit into an append at a
/// zero-width range on the last line.
fn convert_edit(edit: &LineEdit, lines: &[&str], lines_removed: &mut usize) -> TextEdit {
    let line_count = lines.len();
    if edit.start_line as usize > line_count {
        let last = line_count.saturating_sub(1);
        let column = lines.get(last).map(|l| l.chars().count()).unwrap_or(0) as u32;
        let at_eof = Position::new(last as u32, column);
        let new_text = if lines.get(last).map(|l| l.is_empty()).unwrap_or(true) {
            edit.new_text.clone()
        } else {
            format!("\n{}", edit.new_text)
        };
        return TextEdit {
            range: Range::new(at_eof, at_eof),
            new_text,
        };
    }

    let start = edit.start_line - 1;
    let end = edit.end_line.min(line_count as u32) - 1;
    *lines_removed += (end - start + 1) as usize;
    let end_column = lines[end as usize].chars().count() as u32;
    TextEdit {
        range: Range::new(Position::new(start, 0), Position::new(end, end_column)),
        new_text: edit.new_text.clone(),
    }
}
