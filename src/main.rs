use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

use lsp_bridge::config::{BridgeConfig, WatcherConfig};
use lsp_bridge::logging;
use lsp_bridge::lsp::LspClient;
use lsp_bridge::mcp::{self, BridgeServer};
use lsp_bridge::tools::{ToolContext, ToolRegistry};
use lsp_bridge::watcher::WorkspaceWatcher;

#[derive(Parser)]
#[command(name = "lsp-bridge")]
#[command(about = "Expose a language server's capabilities as MCP tools", long_about = None)]
struct Cli {
    /// Workspace root the language server operates on
    #[arg(long)]
    workspace: PathBuf,

    /// Language server command to spawn
    #[arg(long)]
    lsp: String,

    /// Arguments after `--` are forwarded to the language server
    #[arg(last = true)]
    server_args: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init() {
        eprintln!("failed to initialize logging: {e:#}");
        std::process::exit(1);
    }

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let workspace = cli
        .workspace
        .canonicalize()
        .with_context(|| format!("workspace does not exist: {}", cli.workspace.display()))?;
    anyhow::ensure!(
        workspace.is_dir(),
        "workspace is not a directory: {}",
        workspace.display()
    );

    let config = BridgeConfig::from_env();

    let client = LspClient::spawn(
        &cli.lsp,
        &cli.server_args,
        &workspace,
        config.request_timeout,
    )
    .with_context(|| format!("failed to start language server '{}'", cli.lsp))?;

    // The watcher hooks into dynamic registrations, so it must be in
    // place before initialize installs the capability handler.
    let workspace_watcher = WorkspaceWatcher::new(client.clone(), WatcherConfig::default());
    workspace_watcher.watch_workspace(&workspace)?;

    client
        .initialize(&workspace)
        .await
        .context("language server initialization failed")?;
    client.wait_for_server_ready(config.ready_delay).await;

    let registry = ToolRegistry::with_default_tools();
    let ctx = ToolContext {
        client: client.clone(),
        workspace_root: workspace,
        config,
    };
    let server = BridgeServer::new(registry, ctx);

    let mut serve = tokio::spawn(mcp::serve_stdio(server));
    tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            serve.abort();
        }
        result = &mut serve => {
            result.context("MCP server task failed")??;
        }
    }

    graceful_shutdown(&workspace_watcher, &client).await;
    Ok(())
}

/// Stop feeding the server events, close its documents, then walk the
/// LSP shutdown protocol before reaping the process. Failures are
/// logged and never block the next step.
async fn graceful_shutdown(workspace_watcher: &WorkspaceWatcher, client: &LspClient) {
    workspace_watcher.stop();
    client.close_all_files().await;
    if let Err(e) = client.shutdown().await {
        warn!("shutdown request failed: {e}");
    }
    if let Err(e) = client.exit().await {
        warn!("exit notification failed: {e}");
    }
    if let Err(e) = client.close().await {
        warn!("closing language server failed: {e}");
    }
    info!("bridge stopped");
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
