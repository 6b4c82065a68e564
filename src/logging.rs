//! Logging setup
//!
//! Logs always go to stderr (stdout carries the MCP protocol), with an
//! optional tee to a file. Levels come from `LOG_LEVEL` and per-component
//! overrides from `LOG_COMPONENT_LEVELS` (`comp:LVL,comp:LVL`).

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber from the environment.
pub fn init() -> Result<()> {
    let filter = build_filter(
        std::env::var("LOG_LEVEL").ok().as_deref(),
        std::env::var("LOG_COMPONENT_LEVELS").ok().as_deref(),
    );

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let file_layer = match std::env::var("LOG_FILE").ok() {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {path}"))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}

/// Translate `LOG_LEVEL` / `LOG_COMPONENT_LEVELS` into an EnvFilter
/// directive string. Component names without `::` are treated as
/// modules of this crate.
fn build_filter(level: Option<&str>, component_levels: Option<&str>) -> String {
    let mut directives = vec![translate_level(level.unwrap_or("INFO")).to_string()];

    if let Some(components) = component_levels {
        for entry in components.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let Some((component, level)) = entry.split_once(':') else {
                continue;
            };
            let component = component.trim();
            let level = translate_level(level.trim());
            if component.is_empty() {
                continue;
            }
            let target = if component.contains("::") {
                component.to_string()
            } else {
                format!("lsp_bridge::{component}")
            };
            directives.push(format!("{target}={level}"));
        }
    }

    directives.join(",")
}

fn translate_level(level: &str) -> &'static str {
    match level.to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARN" => "warn",
        // tracing has no fatal level; error is the closest.
        "ERROR" | "FATAL" => "error",
        _ => "info",
    }
}
