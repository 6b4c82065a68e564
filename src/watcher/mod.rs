//! Workspace watcher
//!
//! Serves the LSP contract that the server be told about external
//! file-system changes and have the files it cares about opened. Raw
//! notify events are filtered through exclusion rules and the
//! server-registered glob patterns, debounced per key, and forwarded
//! to the client as `didChange` or `workspace/didChangeWatchedFiles`.

pub mod patterns;

use anyhow::{Context, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::WatcherConfig;
use crate::lsp::protocol::{FileChangeType, FileSystemWatcher};
use crate::lsp::uri::path_to_uri;
use crate::lsp::LspClient;
use patterns::matches_pattern;

/// Initial walk pacing: yield after this many opens.
const WALK_BATCH: usize = 100;
const WALK_PAUSE: std::time::Duration = std::time::Duration::from_millis(10);

/// Watches a workspace and keeps the language server in sync.
#[derive(Clone)]
pub struct WorkspaceWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    client: LspClient,
    config: WatcherConfig,
    root: StdMutex<Option<PathBuf>>,
    gitignore: StdMutex<Option<Gitignore>>,
    registrations: StdMutex<Vec<FileSystemWatcher>>,
    debounces: StdMutex<HashMap<String, JoinHandle<()>>>,
    fs_watcher: StdMutex<Option<RecommendedWatcher>>,
    walked: AtomicBool,
}

impl WorkspaceWatcher {
    pub fn new(client: LspClient, config: WatcherConfig) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                client,
                config,
                root: StdMutex::new(None),
                gitignore: StdMutex::new(None),
                registrations: StdMutex::new(Vec::new()),
                debounces: StdMutex::new(HashMap::new()),
                fs_watcher: StdMutex::new(None),
                walked: AtomicBool::new(false),
            }),
        }
    }

    /// Start watching `root`: load `.gitignore`, hook into the
    /// client's dynamic watcher registrations, and begin the recursive
    /// file-system watch.
    pub fn watch_workspace(&self, root: &Path) -> Result<()> {
        let root = root
            .canonicalize()
            .with_context(|| format!("workspace does not exist: {}", root.display()))?;

        *self.inner.gitignore.lock().unwrap() = Some(build_gitignore(&root)?);
        *self.inner.root.lock().unwrap() = Some(root.clone());

        let (registration_tx, mut registration_rx) =
            mpsc::unbounded_channel::<Vec<FileSystemWatcher>>();
        self.inner.client.set_watch_hook(move |id, watchers| {
            debug!("server registered {} watcher(s) under '{id}'", watchers.len());
            let _ = registration_tx.send(watchers);
        });
        let registrar = self.clone();
        tokio::spawn(async move {
            while let Some(watchers) = registration_rx.recv().await {
                registrar.register_watchers(watchers).await;
            }
        });

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
        let mut fs_watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(e) => warn!("file watch error: {e}"),
            },
            notify::Config::default(),
        )
        .context("failed to create file-system watcher")?;
        fs_watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", root.display()))?;
        *self.inner.fs_watcher.lock().unwrap() = Some(fs_watcher);

        let dispatcher = self.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                dispatcher.process_event(event).await;
            }
        });

        info!("watching workspace {}", root.display());
        Ok(())
    }

    /// Stop the underlying file-system watch. Fired-but-unflushed
    /// debounce timers may still deliver one notification each.
    pub fn stop(&self) {
        self.inner.fs_watcher.lock().unwrap().take();
        info!("workspace watcher stopped");
    }

    /// Append server-registered patterns; the first batch triggers the
    /// initial open walk.
    pub(crate) async fn register_watchers(&self, watchers: Vec<FileSystemWatcher>) {
        self.inner
            .registrations
            .lock()
            .unwrap()
            .extend(watchers);

        if !self.inner.walked.swap(true, Ordering::SeqCst) {
            self.initial_walk().await;
        }
    }

    /// Open every non-excluded workspace file matching a registered
    /// pattern. Pacing yields keep the reader loop responsive while
    /// hundreds of `didOpen`s stream out.
    async fn initial_walk(&self) {
        let Some(root) = self.inner.root.lock().unwrap().clone() else {
            return;
        };

        let files = self.collect_workspace_files(&root);
        let mut opened = 0usize;
        for file in files {
            if !self.matches_any_registration(&file, None) {
                continue;
            }
            match self.inner.client.open_file(&file).await {
                Ok(()) => opened += 1,
                Err(e) => debug!("initial open failed for {}: {e}", file.display()),
            }
            if opened > 0 && opened % WALK_BATCH == 0 {
                tokio::time::sleep(WALK_PAUSE).await;
            }
        }
        info!("initial walk opened {opened} file(s)");
    }

    /// Directory-traversal-order list of candidate files under root.
    fn collect_workspace_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("cannot read {}: {e}", dir.display());
                    continue;
                }
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.is_dir() {
                    if !self.is_excluded_dir(&path) {
                        stack.push(path);
                    }
                } else if !self.is_excluded(&path) {
                    files.push(path);
                }
            }
        }
        files
    }

    async fn process_event(&self, event: Event) {
        let change = match event.kind {
            EventKind::Create(_) => FileChangeType::Created,
            EventKind::Modify(_) => FileChangeType::Changed,
            EventKind::Remove(_) => FileChangeType::Deleted,
            _ => return,
        };
        for path in event.paths {
            self.handle_path_event(&path, change).await;
        }
    }

    /// One classified event for one path, after exclusion and pattern
    /// filtering.
    pub(crate) async fn handle_path_event(&self, path: &Path, change: FileChangeType) {
        if change != FileChangeType::Deleted && path.is_dir() {
            return;
        }
        if self.is_excluded(path) {
            return;
        }
        if !self.matches_any_registration(path, Some(change)) {
            return;
        }

        match change {
            FileChangeType::Created => {
                if let Err(e) = self.inner.client.open_file(path).await {
                    debug!("open on create failed for {}: {e}", path.display());
                }
            }
            FileChangeType::Changed if self.inner.client.is_open(path) => {
                let client = self.inner.client.clone();
                let path = path.to_path_buf();
                self.debounce(format!("change:{}", path.display()), async move {
                    if let Err(e) = client.notify_change(&path).await {
                        warn!("didChange failed for {}: {e}", path.display());
                    }
                });
            }
            _ => {
                let Ok(uri) = path_to_uri(path) else {
                    return;
                };
                let client = self.inner.client.clone();
                let key = format!("{}:{}", path.display(), change.as_lsp());
                self.debounce(key, async move {
                    let params = json!({
                        "changes": [{"uri": uri, "type": change.as_lsp()}],
                    });
                    if let Err(e) = client.notify("workspace/didChangeWatchedFiles", params).await {
                        warn!("didChangeWatchedFiles failed: {e}");
                    }
                });
            }
        }
    }

    /// Schedule `action` after the quiet period; a later event with
    /// the same key cancels and replaces the earlier timer.
    fn debounce<F>(&self, key: String, action: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let delay = self.inner.config.debounce_time;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });
        let mut debounces = self.inner.debounces.lock().unwrap();
        if let Some(previous) = debounces.insert(key, handle) {
            previous.abort();
        }
    }

    fn matches_any_registration(&self, path: &Path, change: Option<FileChangeType>) -> bool {
        let relative = self.relative_path(path);
        let registrations = self.inner.registrations.lock().unwrap();
        registrations.iter().any(|watcher| {
            change.map(|c| watcher.accepts(c)).unwrap_or(true)
                && watcher
                    .pattern()
                    .map(|p| matches_pattern(p, &relative))
                    .unwrap_or(false)
        })
    }

    fn relative_path(&self, path: &Path) -> String {
        let root = self.inner.root.lock().unwrap().clone();
        let relative = root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);
        relative.to_string_lossy().replace('\\', "/")
    }

    fn is_excluded_dir(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return true;
        };
        if name.starts_with('.') {
            return true;
        }
        if self.inner.config.excluded_dirs.iter().any(|d| d == name) {
            return true;
        }
        self.is_gitignored(path, true)
    }

    /// Exclusion rules for a single file path: dot segments, excluded
    /// directories, artifact/binary extensions, size cap, gitignore.
    pub(crate) fn is_excluded(&self, path: &Path) -> bool {
        let root = self.inner.root.lock().unwrap().clone();
        let relative = root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);

        for component in relative.components() {
            let Some(name) = component.as_os_str().to_str() else {
                return true;
            };
            if name.starts_with('.') {
                return true;
            }
            if self.inner.config.excluded_dirs.iter().any(|d| d == name) {
                return true;
            }
        }

        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            let dotted = format!(".{}", ext.to_lowercase());
            if self
                .inner
                .config
                .excluded_file_extensions
                .iter()
                .chain(self.inner.config.large_binary_extensions.iter())
                .any(|e| e == &dotted)
            {
                return true;
            }
        }

        if let Ok(metadata) = std::fs::metadata(path) {
            if metadata.is_file() && metadata.len() > self.inner.config.max_file_size {
                return true;
            }
        }

        self.is_gitignored(path, false)
    }

    fn is_gitignored(&self, path: &Path, is_dir: bool) -> bool {
        let gitignore = self.inner.gitignore.lock().unwrap();
        match gitignore.as_ref() {
            Some(gitignore) => gitignore
                .matched_path_or_any_parents(path, is_dir)
                .is_ignore(),
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_root_for_tests(&self, root: &Path) {
        *self.inner.root.lock().unwrap() = Some(root.to_path_buf());
        *self.inner.gitignore.lock().unwrap() = build_gitignore(root).ok();
    }
}

/// Root `.gitignore` plus the baseline ignores every workspace gets.
fn build_gitignore(root: &Path) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    builder.add(root.join(".gitignore"));
    for default in [".git/", "node_modules/", ".DS_Store", "*.swp", "*.swo", "*~"] {
        builder
            .add_line(None, default)
            .context("invalid default ignore pattern")?;
    }
    builder.build().context("failed to build gitignore")
}
