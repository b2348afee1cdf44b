use serde::Serialize;

use crate::note::{Note, NoteId};

/// Maximum number of chars of content shown in a list excerpt.
pub const EXCERPT_MAX_CHARS: usize = 160;

/// Default number of lines in a snippet when no match is found.
pub const DEFAULT_SNIPPET_LINES: usize = 6;

/// Maximum number of characters in a snippet before truncation.
pub const DEFAULT_SNIPPET_MAX_CHARS: usize = 400;

/// Lightweight projection of a note used by list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSummary {
    pub id: NoteId,
    pub title: String,
    pub excerpt: String,
    pub updated_at: u64,
}

impl From<&Note> for NoteSummary {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id,
            title: note.title.clone(),
            excerpt: excerpt(&note.content),
            updated_at: note.updated_at,
        }
    }
}

/// The first [`EXCERPT_MAX_CHARS`] chars of `content`, with `…` appended
/// when anything was cut.
pub fn excerpt(content: &str) -> String {
    match content.char_indices().nth(EXCERPT_MAX_CHARS) {
        Some((cut, _)) => format!("{}…", &content[..cut]),
        None => content.to_string(),
    }
}

/// Prepend line numbers to each line of text.
///
/// `start_line` is the number to assign to the first line (1-indexed).
pub fn add_line_numbers(text: &str, start_line: usize) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| format!("{}: {}", start_line + i, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract a snippet around the first line containing `query`.
///
/// Returns `(snippet_text, start_line_number)` where start_line_number is
/// 1-indexed. Falls back to the first few lines, then to the first line
/// containing any whitespace token of the query. Returns `None` if the text
/// is empty.
pub fn extract_snippet(text: &str, query: &str) -> Option<(String, usize)> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return None;
    }

    let query_lower = query.trim().to_lowercase();
    let lowered: Vec<String> = lines.iter().map(|l| l.to_lowercase()).collect();

    let match_idx = if query_lower.is_empty() {
        None
    } else {
        lowered
            .iter()
            .position(|line| line.contains(&query_lower))
            .or_else(|| {
                lowered.iter().position(|line| {
                    query_lower
                        .split_whitespace()
                        .any(|token| line.contains(token))
                })
            })
    };

    let (start, end) = if let Some(idx) = match_idx {
        let start = idx.saturating_sub(2);
        let end = (idx + 3).min(lines.len());
        (start, end)
    } else {
        (0, DEFAULT_SNIPPET_LINES.min(lines.len()))
    };

    let mut snippet = lines[start..end].join("\n");
    if let Some((cut, _)) =
        snippet.char_indices().nth(DEFAULT_SNIPPET_MAX_CHARS)
    {
        snippet.truncate(cut);
        snippet.push_str("...");
    }

    Some((snippet, start + 1))
}

/// Apply line offset and optional line limit to a block of text.
///
/// `start_line` is 1-indexed. If `max_lines` is `Some(n)`, at most `n` lines
/// are returned with a truncation notice appended.
pub fn apply_line_limits(
    text: &str,
    start_line: usize,
    max_lines: Option<usize>,
) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start_idx = start_line.saturating_sub(1);
    if start_idx >= lines.len() {
        return String::new();
    }

    let end_idx = match max_lines {
        Some(max) => start_idx.saturating_add(max).min(lines.len()),
        None => lines.len(),
    };

    let mut slice = lines[start_idx..end_idx].join("\n");
    if end_idx < lines.len() {
        slice.push_str(&format!(
            "\n\n[... truncated {} more lines]",
            lines.len() - end_idx
        ));
    }

    slice
}
