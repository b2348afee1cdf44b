//! Relevance scores for a single (query, text) pair.
//!
//! Two scorers with different strictness:
//!
//! - [`primary_score`] requires the query to be a subsequence of the text and
//!   returns [`f64::NEG_INFINITY`] otherwise. It rewards an early verbatim
//!   substring hit most, then dense and contiguous subsequence matches.
//! - [`fallback_score`] counts whitespace-token containment in a title and
//!   content pair. It never excludes: the result is `0.0` when nothing hits.
//!
//! Both compare Unicode-lowercased strings. Positions are counted in `char`s
//! of the lowercased text.

/// Bonus for a verbatim substring hit starting at index 0.
pub const SUBSTRING_BONUS: f64 = 100.0;

/// The substring bonus shrinks by one per char of offset, down to
/// `SUBSTRING_BONUS - MAX_SUBSTRING_PENALTY`.
pub const MAX_SUBSTRING_PENALTY: usize = 90;

/// Base increment for every matched query char.
pub const CHAR_MATCH_SCORE: f64 = 5.0;

/// Extra increment for a match found right at the cursor, decaying by one
/// per char of gap.
pub const PROXIMITY_BONUS: usize = 3;

/// Added to the contiguity run for every gap-free match.
pub const RUN_STEP: f64 = 2.0;

pub const TITLE_TOKEN_SCORE: f64 = 20.0;
pub const CONTENT_TOKEN_SCORE: f64 = 8.0;
pub const TITLE_PHRASE_SCORE: f64 = 25.0;
pub const CONTENT_PHRASE_SCORE: f64 = 10.0;

/// Score `text` against `query` with a greedy subsequence match.
///
/// - An empty query scores `0.0` against anything.
/// - If the query occurs verbatim at char index `idx`, the score gains
///   `100 - min(idx, 90)`.
/// - Each query char is then looked up at or after a forward-only cursor. A
///   missing char makes the whole score [`f64::NEG_INFINITY`]. A char found
///   `gap` chars past the cursor adds `5 + max(0, 3 - gap)`.
/// - A run counter grows by 2 on every gap-free match and resets to 0 on any
///   other match; its final value is added once at the end.
///
/// ```
/// use jotter::scorer::primary_score;
///
/// assert_eq!(primary_score("", "anything"), 0.0);
/// assert_eq!(primary_score("cat", "Cat"), 130.0);
/// assert_eq!(primary_score("xyz", "abc"), f64::NEG_INFINITY);
/// ```
pub fn primary_score(query: &str, text: &str) -> f64 {
    let query: Vec<char> = query.to_lowercase().chars().collect();
    if query.is_empty() {
        return 0.0;
    }
    let text: Vec<char> = text.to_lowercase().chars().collect();

    let mut score = 0.0;
    if let Some(idx) = find_chars(&text, &query) {
        score += SUBSTRING_BONUS - idx.min(MAX_SUBSTRING_PENALTY) as f64;
    }

    let mut cursor = 0;
    let mut run = 0.0;
    for &ch in &query {
        let Some(gap) = text[cursor..].iter().position(|&c| c == ch) else {
            return f64::NEG_INFINITY;
        };
        run = if gap == 0 { run + RUN_STEP } else { 0.0 };
        score += CHAR_MATCH_SCORE + PROXIMITY_BONUS.saturating_sub(gap) as f64;
        cursor += gap + 1;
    }

    score + run
}

/// Score a note by loose token containment.
///
/// The query is lowercased, trimmed and split on whitespace. Every token
/// found in the title adds 20 and every token found in the content adds 8.
/// The whole trimmed query adds 25 more when found in the title and 10 when
/// found in the content.
pub fn fallback_score(query: &str, title: &str, content: &str) -> f64 {
    let lowered = query.to_lowercase();
    let query = lowered.trim();
    if query.is_empty() {
        return 0.0;
    }

    let title = title.to_lowercase();
    let content = content.to_lowercase();

    let mut score = 0.0;
    for token in query.split_whitespace() {
        if title.contains(token) {
            score += TITLE_TOKEN_SCORE;
        }
        if content.contains(token) {
            score += CONTENT_TOKEN_SCORE;
        }
    }

    if title.contains(query) {
        score += TITLE_PHRASE_SCORE;
    }
    if content.contains(query) {
        score += CONTENT_PHRASE_SCORE;
    }
    score
}

/// Char index of the first occurrence of `needle` in `haystack`.
fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
