//! MCP server surface
//!
//! Exposes the tool registry over the Model Context Protocol on
//! stdio. Tool failures become error-flagged text results rather than
//! protocol errors, so callers always get something readable back.

use anyhow::Result;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool as McpTool,
};
use rmcp::service::RequestContext;
use rmcp::transport::stdio;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, ServiceExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::tools::{ToolContext, ToolRegistry};

/// The MCP-facing server: a registry of semantic tools plus the
/// context they run in.
#[derive(Clone)]
pub struct BridgeServer {
    registry: Arc<ToolRegistry>,
    ctx: Arc<ToolContext>,
}

impl BridgeServer {
    pub fn new(registry: ToolRegistry, ctx: ToolContext) -> Self {
        Self {
            registry: Arc::new(registry),
            ctx: Arc::new(ctx),
        }
    }
}

impl ServerHandler for BridgeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "lsp-bridge".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::default()
            },
            instructions: Some(
                "Code-intelligence tools backed by a language server: find definitions \
                 and references by symbol name, hover, diagnostics, rename and line edits."
                    .to_string(),
            ),
            ..ServerInfo::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = self
            .registry
            .tools()
            .map(|tool| McpTool {
                name: tool.name().to_string().into(),
                title: None,
                description: Some(tool.description().to_string().into()),
                input_schema: Arc::new(schema_object(tool.parameters_schema())),
                output_schema: None,
                annotations: None,
                icons: None,
                meta: None,
            })
            .collect();

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let Some(tool) = self.registry.get_tool(request.name.as_ref()) else {
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "Unknown tool '{}'",
                request.name
            ))]));
        };

        let arguments = Value::Object(request.arguments.unwrap_or_default());
        debug!("tool call: {}", tool.name());
        match tool.execute(arguments, &self.ctx).await {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "{e:#}"
            ))])),
        }
    }
}

fn schema_object(schema: Value) -> serde_json::Map<String, Value> {
    match schema {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

/// Serve MCP over this process's stdin/stdout until the client hangs
/// up.
pub async fn serve_stdio(server: BridgeServer) -> Result<()> {
    info!("MCP server listening on stdio");
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    info!("MCP transport closed");
    Ok(())
}
