//! Application of `WorkspaceEdit`s to files on disk.
//!
//! The server's own `workspace/applyEdit` is acknowledged without
//! effect, so the mutating tools funnel through this module instead.
//! Per file, edits are applied in descending position order, which
//! makes the result independent of the order non-overlapping edits
//! arrive in.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::lsp::protocol::TextEdit;
use crate::lsp::uri::uri_to_path;

/// Outcome of applying a workspace edit.
#[derive(Debug)]
pub struct EditSummary {
    pub total_edits: usize,
    /// Per-file edit counts, sorted by path.
    pub per_file: Vec<(PathBuf, usize)>,
}

impl EditSummary {
    pub fn render(&self) -> String {
        let mut out = format!(
            "Total changes: {} across {} file(s)",
            self.total_edits,
            self.per_file.len()
        );
        for (path, count) in &self.per_file {
            out.push_str(&format!("\n  {}: {} edit(s)", path.display(), count));
        }
        out
    }
}

/// Apply a `changes`-style workspace edit (URI -> edits) to disk.
pub async fn apply_workspace_edit(
    changes: &HashMap<String, Vec<TextEdit>>,
) -> Result<EditSummary> {
    let mut per_file = Vec::new();
    let mut total_edits = 0usize;

    for (uri, edits) in changes {
        if edits.is_empty() {
            continue;
        }
        let path = uri_to_path(uri).with_context(|| format!("unusable edit target {uri}"))?;
        apply_file_edits(&path, edits)
            .await
            .with_context(|| format!("failed to edit {}", path.display()))?;
        total_edits += edits.len();
        per_file.push((path, edits.len()));
    }

    per_file.sort();
    Ok(EditSummary {
        total_edits,
        per_file,
    })
}

async fn apply_file_edits(path: &PathBuf, edits: &[TextEdit]) -> Result<()> {
    let text = tokio::fs::read_to_string(path).await?;
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();

    // Descending start position, so earlier edits keep their
    // coordinates valid while later ones are spliced in.
    let mut ordered: Vec<&TextEdit> = edits.iter().collect();
    ordered.sort_by(|a, b| {
        (b.range.start.line, b.range.start.character)
            .cmp(&(a.range.start.line, a.range.start.character))
    });

    for edit in ordered {
        apply_single_edit(&mut lines, edit);
    }

    tokio::fs::write(path, lines.join("\n")).await?;
    Ok(())
}

fn apply_single_edit(lines: &mut Vec<String>, edit: &TextEdit) {
    if lines.is_empty() {
        lines.push(String::new());
    }
    let last = lines.len() - 1;
    let start_line = (edit.range.start.line as usize).min(last);
    let end_line = (edit.range.end.line as usize).min(last);

    let start_col = byte_index(&lines[start_line], edit.range.start.character as usize);
    let end_col = byte_index(&lines[end_line], edit.range.end.character as usize);

    if start_line == end_line {
        let line = &lines[start_line];
        lines[start_line] = format!("{}{}{}", &line[..start_col], edit.new_text, &line[end_col..]);
    } else {
        let merged = format!(
            "{}{}{}",
            &lines[start_line][..start_col],
            edit.new_text,
            &lines[end_line][end_col..]
        );
        lines.splice(start_line..=end_line, [merged]);
    }
}

/// Clamped byte index for a character offset.
fn byte_index(line: &str, character: usize) -> usize {
    line.char_indices()
        .nth(character)
        .map(|(index, _)| index)
        .unwrap_or(line.len())
}
