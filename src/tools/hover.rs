//! Hover tool: format `textDocument/hover` contents.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Tool, ToolContext};
use crate::lsp::protocol::{Hover, HoverContents, MarkedString};
use crate::lsp::uri::path_to_uri;

pub struct HoverTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HoverParams {
    file_path: String,
    /// 1-indexed line
    line: u32,
    /// 1-indexed column
    column: u32,
}

#[async_trait]
impl Tool for HoverTool {
    fn name(&self) -> &str {
        "hover"
    }

    fn description(&self) -> &str {
        "Get hover information (type signature, documentation) at a file position"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": {"type": "string", "description": "File to inspect"},
                "line": {"type": "integer", "description": "Line number (1-indexed)"},
                "column": {"type": "integer", "description": "Column number (1-indexed)"}
            },
            "required": ["filePath", "line", "column"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<String> {
        let params: HoverParams =
            serde_json::from_value(params).context("Invalid parameters for hover")?;
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
                "textDocument/hover",
                json!({
                    "textDocument": {"uri": path_to_uri(&path)?},
                    "position": {"line": params.line - 1, "character": params.column - 1},
                }),
            )
            .await
            .context("textDocument/hover failed")?;

        let header = format!(
            "Hover information for {}:{}:{}:",
            params.file_path, params.line, params.column
        );
        let body = match serde_json::from_value::<Option<Hover>>(result) {
            Ok(Some(hover)) => format_contents(&hover.contents),
            _ => "No hover information available".to_string(),
        };
        Ok(format!("{header}\n\n{body}"))
    }
}

fn format_contents(contents: &HoverContents) -> String {
    match contents {
        HoverContents::Markup(markup) => markup.value.clone(),
        HoverContents::Scalar(marked) => format_marked_string(marked),
        HoverContents::Array(items) => items
            .iter()
            .map(format_marked_string)
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

fn format_marked_string(marked: &MarkedString) -> String {
    match marked {
        MarkedString::String(text) => text.clone(),
        MarkedString::LanguageString { language, value } => {
            format!("```{language}\n{value}\n```")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::lsp::test_support::FakeServer;
    use crate::lsp::transport;
    use serde_json::Value;

    #[test]
    fn marked_string_with_language_becomes_fenced_block() {
        let contents: HoverContents = serde_json::from_value(json!([
            {"language": "rust", "value": "fn main()"},
            "Plain trailer",
        ]))
        .unwrap();
        assert_eq!(
            format_contents(&contents),
            "```rust\nfn main()\n```\n\nPlain trailer"
        );
    }

    #[test]
    fn markup_content_uses_raw_value() {
        let contents: HoverContents =
            serde_json::from_value(json!({"kind": "markdown", "value": "**bold**"})).unwrap();
        assert_eq!(format_contents(&contents), "**bold**");
    }

    #[tokio::test]
    async fn end_to_end_with_position_translation() {
        let (client, mut server) = FakeServer::pair(None);
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        tokio::fs::write(root.join("m.rs"), "fn main() {}\n")
            .await
            .unwrap();

        let ctx = ToolContext {
            client,
            workspace_root: root,
            config: BridgeConfig::default(),
        };

        let responder = tokio::spawn(async move {
            let request = server.recv_method("textDocument/hover").await;
            // 1-indexed input becomes 0-indexed LSP position.
            assert_eq!(request["params"]["position"]["line"], 0);
            assert_eq!(request["params"]["position"]["character"], 3);
            let id = request["id"].clone();
            server
                .send(transport::response(
                    &id,
                    json!({"contents": {"kind": "plaintext", "value": "fn main()"}}),
                ))
                .await;
        });

        let output = HoverTool
            .execute(json!({"filePath": "m.rs", "line": 1, "column": 4}), &ctx)
            .await
            .unwrap();
        responder.await.unwrap();

        assert!(output.starts_with("Hover information for m.rs:1:4:"));
        assert!(output.contains("fn main()"));
    }

    #[tokio::test]
    async fn null_hover_still_has_header() {
        let (client, mut server) = FakeServer::pair(None);
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        tokio::fs::write(root.join("m.rs"), "fn main() {}\n")
            .await
            .unwrap();

        let ctx = ToolContext {
            client,
            workspace_root: root,
            config: BridgeConfig::default(),
        };

        let responder = tokio::spawn(async move {
            let request = server.recv_method("textDocument/hover").await;
            let id = request["id"].clone();
            server.send(transport::response(&id, Value::Null)).await;
        });

        let output = HoverTool
            .execute(json!({"filePath": "m.rs", "line": 1, "column": 1}), &ctx)
            .await
            .unwrap();
        responder.await.unwrap();

        assert!(output.starts_with("Hover information for m.rs:1:1:"));
        assert!(output.contains("No hover information available"));
    }
}
