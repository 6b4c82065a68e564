//! Bridge configuration
//!
//! Everything tunable comes from the environment; the CLI only carries
//! the workspace and the language-server command line.

use std::time::Duration;

/// Environment variable for the references-tool context line count.
pub const CONTEXT_LINES_VAR: &str = "LSP_CONTEXT_LINES";
/// Environment variable for the per-request timeout (ms, 0 disables).
pub const REQUEST_TIMEOUT_VAR: &str = "LSP_REQUEST_TIMEOUT_MS";
/// Environment variable for the post-initialize readiness delay (ms).
pub const READY_DELAY_VAR: &str = "LSP_READY_DELAY_MS";

const DEFAULT_CONTEXT_LINES: usize = 5;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_READY_DELAY_MS: u64 = 1_000;

/// Runtime knobs for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Context lines shown around references and diagnostics.
    pub context_lines: usize,
    /// Per-request timeout for LSP calls; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Bounded wait after `initialized` before serving tools. Slow
    /// servers (jdtls) may need more than the default second.
    pub ready_delay: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
            request_timeout: Some(Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)),
            ready_delay: Duration::from_millis(DEFAULT_READY_DELAY_MS),
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var(CONTEXT_LINES_VAR).ok().as_deref(),
            std::env::var(REQUEST_TIMEOUT_VAR).ok().as_deref(),
            std::env::var(READY_DELAY_VAR).ok().as_deref(),
        )
    }

    fn from_values(
        context_lines: Option<&str>,
        request_timeout_ms: Option<&str>,
        ready_delay_ms: Option<&str>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            context_lines: parse_or(context_lines, DEFAULT_CONTEXT_LINES),
            request_timeout: match parse_or(request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS) {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            ready_delay: Duration::from_millis(parse_or(
                ready_delay_ms,
                defaults.ready_delay.as_millis() as u64,
            )),
        }
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<&str>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Configuration for the workspace watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiet period per `(path, changeType)` key.
    pub debounce_time: Duration,
    /// Directory basenames never traversed.
    pub excluded_dirs: Vec<String>,
    /// Extensions never opened (compiled artifacts).
    pub excluded_file_extensions: Vec<String>,
    /// Media/archive extensions never opened.
    pub large_binary_extensions: Vec<String>,
    /// Files larger than this are skipped.
    pub max_file_size: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_time: Duration::from_millis(100),
            excluded_dirs: [
                "node_modules",
                ".git",
                "dist",
                "build",
                "out",
                "target",
                ".idea",
                ".vscode",
                "__pycache__",
                ".pytest_cache",
                ".mypy_cache",
                "vendor",
            ]
            .map(str::to_string)
            .to_vec(),
            excluded_file_extensions: [
                ".pyc", ".pyo", ".class", ".o", ".obj", ".exe", ".dll", ".so", ".dylib",
            ]
            .map(str::to_string)
            .to_vec(),
            large_binary_extensions: [
                ".zip", ".tar", ".gz", ".bz2", ".xz", ".7z", ".rar", ".jar", ".war", ".png",
                ".jpg", ".jpeg", ".gif", ".bmp", ".ico", ".webp", ".mp3", ".mp4", ".avi", ".mov",
                ".mkv", ".wav", ".flac", ".pdf", ".iso",
            ]
            .map(str::to_string)
            .to_vec(),
            max_file_size: 10 * 1024 * 1024,
        }
    }
}
