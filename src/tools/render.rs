//! Shared text rendering for tool output.

/// Format one line with the 6-column right-aligned number gutter,
/// 1-indexed: `     1| ...`.
pub fn gutter_line(line_number: usize, text: &str) -> String {
    format!("{line_number:>6}| {text}")
}

/// Render an inclusive 0-indexed line span with the gutter.
pub fn render_lines(lines: &[&str], start: usize, end: usize) -> String {
    let end = end.min(lines.len().saturating_sub(1));
    (start..=end)
        .map(|i| gutter_line(i + 1, lines[i]))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse a sorted, deduplicated set of line indices into maximal
/// contiguous inclusive ranges.
pub fn collapse_ranges(indices: &[usize]) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for &index in indices {
        match ranges.last_mut() {
            Some((_, end)) if *end + 1 == index => *end = index,
            Some((_, end)) if *end >= index => {}
            _ => ranges.push((index, index)),
        }
    }
    ranges
}

/// Severity display names per the LSP numbering.
pub fn severity_name(severity: Option<i64>) -> &'static str {
    match severity {
        Some(1) => "Error",
        Some(2) => "Warning",
        Some(3) => "Information",
        Some(4) => "Hint",
        _ => "Information",
    }
}
