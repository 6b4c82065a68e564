//! Semantic tools exposed over MCP.
//!
//! Each tool is a thin presentation layer over one or more LSP
//! requests; they all return a single text block.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::BridgeConfig;
use crate::lsp::LspClient;

pub mod definition;
pub mod diagnostics;
pub mod edit;
pub mod edits;
pub mod hover;
pub mod references;
pub mod render;
pub mod rename;

pub use definition::DefinitionTool;
pub use diagnostics::DiagnosticsTool;
pub use edit::EditFileTool;
pub use hover::HoverTool;
pub use references::ReferencesTool;
pub use rename::RenameTool;

/// Context passed to tool execution.
#[derive(Clone)]
pub struct ToolContext {
    pub client: LspClient,
    pub workspace_root: PathBuf,
    pub config: BridgeConfig,
}

impl ToolContext {
    /// Resolve a user-supplied file path against the workspace root.
    pub fn resolve_path(&self, file_path: &str) -> PathBuf {
        let path = Path::new(file_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> serde_json::Value;
    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<String>;
}

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: vec![] }
    }

    /// Registry with the full bridge tool set.
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(DefinitionTool));
        registry.register(Box::new(ReferencesTool));
        registry.register(Box::new(HoverTool));
        registry.register(Box::new(DiagnosticsTool));
        registry.register(Box::new(RenameTool));
        registry.register(Box::new(EditFileTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn get_tool(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn tools(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.iter().map(|t| t.as_ref())
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
