//! Glob matching for server-registered file watchers.
//!
//! Only the three shapes language servers actually send us are
//! supported: `**/*`, `**/*.EXT` and `*.EXT`. Anything richer
//! (`{a,b}`, `?`, character ranges) deliberately returns "no match";
//! none of the supported servers rely on it.

/// Match a workspace-relative path (forward slashes) against a watcher
/// pattern.
pub fn matches_pattern(pattern: &str, relative_path: &str) -> bool {
    if pattern == "**/*" {
        return true;
    }
    if let Some(ext) = pattern.strip_prefix("**/*.") {
        return has_extension(relative_path, ext);
    }
    if let Some(ext) = pattern.strip_prefix("*.") {
        return has_extension(relative_path, ext);
    }
    false
}

fn has_extension(path: &str, ext: &str) -> bool {
    path.len() > ext.len() + 1 && path.ends_with(ext) && path.as_bytes()[path.len() - ext.len() - 1] == b'.'
}
