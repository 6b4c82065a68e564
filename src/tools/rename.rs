//! Rename tool: request a `WorkspaceEdit` from the server and apply
//! it to disk ourselves.
//!
//! The client's `workspace/applyEdit` handler acknowledges without
//! applying, so this tool is the single place the rename takes effect.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{edits, Tool, ToolContext};
use crate::lsp::protocol::WorkspaceEdit;
use crate::lsp::uri::path_to_uri;

pub struct RenameTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameParams {
    file_path: String,
    /// 1-indexed line
    line: u32,
    /// 1-indexed column
    column: u32,
    new_name: String,
}

#[async_trait]
impl Tool for RenameTool {
    fn name(&self) -> &str {
        "rename_symbol"
    }

    fn description(&self) -> &str {
        "Rename the symbol at a position across the workspace and write the edits to disk"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": {"type": "string", "description": "File containing the symbol"},
                "line": {"type": "integer", "description": "Line number (1-indexed)"},
                "column": {"type": "integer", "description": "Column number (1-indexed)"},
                "newName": {"type": "string", "description": "New name for the symbol"}
            },
            "required": ["filePath", "line", "column", "newName"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<String> {
        let params: RenameParams =
            serde_json::from_value(params).context("Invalid parameters for rename_symbol")?;
        anyhow::ensure!(
            params.line >= 1 && params.column >= 1,
            "line and column are 1-indexed"
        );

        let path = ctx.resolve_path(&params.file_path);
        ctx.client
            .open_file(&path)
            .await
            .with_context(|| format!("could not open {}", path.display()))?;

        let result = ctx
            .client
            .call(
                "textDocument/rename",
                json!({
                    "textDocument": {"uri": path_to_uri(&path)?},
                    "position": {"line": params.line - 1, "character": params.column - 1},
                    "newName": params.new_name,
                }),
            )
            .await
            .context("textDocument/rename failed")?;

        let edit: WorkspaceEdit = match serde_json::from_value(result) {
            Ok(edit) => edit,
            Err(_) => WorkspaceEdit::default(),
        };
        let changes = edit.changes.unwrap_or_default();
        if changes.values().all(|edits| edits.is_empty()) {
            return Ok(format!(
                "No edits returned for renaming to '{}'",
                params.new_name
            ));
        }

        let summary = edits::apply_workspace_edit(&changes).await?;
        Ok(summary.render())
    }
}
