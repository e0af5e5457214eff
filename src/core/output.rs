//! Compact output rendering helpers for result lines and prompts.
//!
//! Keeps echoed generator payloads bounded and readable while preserving signal.

pub const RESULTS_HEADER: &str = "=== File Operations Results ===";

/// Collapse newlines/extra whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, max_chars)
}

/// Bound `input` to `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    let mut chars = input.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Append the results section to `text`. Returns `text` trimmed when there is
/// nothing to report.
pub fn append_results(text: &str, lines: &[String]) -> String {
    if lines.is_empty() {
        return text.trim().to_string();
    }
    let mut out = text.trim_end().to_string();
    out.push_str("\n\n");
    out.push_str(RESULTS_HEADER);
    for line in lines {
        out.push('\n');
        out.push_str(line);
    }
    out.trim().to_string()
}
