use std::{cmp::Ordering, collections::HashSet};

use serde::Serialize;

use crate::{
    error::Result,
    note::{Note, UserId},
    note_db::{NoteDb, NoteSource},
    scorer::{fallback_score, primary_score},
    text_util::NoteSummary,
};

/// Weight of the content score relative to the title score in the primary
/// pass.
pub const CONTENT_WEIGHT: f64 = 0.5;

/// With at least this many primary hits the fallback pass is skipped.
pub const FALLBACK_THRESHOLD: usize = 3;

/// Maximum number of fallback hits appended after the primary hits.
pub const FALLBACK_LIMIT: usize = 10;

/// Which pass produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Primary,
    Fallback,
}

/// A note paired with the score that ranked it.
#[derive(Debug, Clone, Copy)]
pub struct ScoredNote<'a> {
    pub note: &'a Note,
    pub score: f64,
    pub tier: Tier,
}

/// Rank `notes` against `query`.
///
/// 1. Primary pass: `title + 0.5 * content` with [`primary_score`]. A note
///    that fails the subsequence test on either field scores `-inf` and is
///    dropped.
/// 2. An empty or whitespace-only query, or at least three primary hits,
///    returns the primary hits alone.
/// 3. Otherwise every note not already a primary hit is scored with
///    [`fallback_score`]; positive hits are sorted and the best ten are
///    appended after the primary hits.
///
/// Within a tier hits are ordered by descending score, ties by ascending
/// note id.
pub fn rank<'a>(query: &str, notes: &'a [Note]) -> Vec<ScoredNote<'a>> {
    let mut primary: Vec<ScoredNote<'a>> = notes
        .iter()
        .map(|note| ScoredNote {
            note,
            score: primary_score(query, &note.title)
                + CONTENT_WEIGHT * primary_score(query, &note.content),
            tier: Tier::Primary,
        })
        .filter(|s| s.score > f64::NEG_INFINITY)
        .collect();
    primary.sort_by(by_score_then_id);

    if query.trim().is_empty() || primary.len() >= FALLBACK_THRESHOLD {
        tracing::debug!(primary = primary.len(), "ranked without fallback");
        return primary;
    }

    let seen: HashSet<u64> = primary.iter().map(|s| s.note.id).collect();
    let mut fallback: Vec<ScoredNote<'a>> = notes
        .iter()
        .filter(|note| !seen.contains(&note.id))
        .map(|note| ScoredNote {
            note,
            score: fallback_score(query, &note.title, &note.content),
            tier: Tier::Fallback,
        })
        .filter(|s| s.score > 0.0)
        .collect();
    fallback.sort_by(by_score_then_id);
    fallback.truncate(FALLBACK_LIMIT);

    tracing::debug!(
        primary = primary.len(),
        fallback = fallback.len(),
        "ranked with fallback"
    );

    primary.extend(fallback);
    primary
}

fn by_score_then_id(a: &ScoredNote<'_>, b: &ScoredNote<'_>) -> Ordering {
    b.score.total_cmp(&a.score).then(a.note.id.cmp(&b.note.id))
}

/// Search every note owned by `owner`.
///
/// Performs one bulk read from `source`; store errors are returned as-is.
pub fn search_notes<S>(
    source: &S,
    query: &str,
    owner: UserId,
) -> Result<Vec<Note>>
where
    S: NoteSource + ?Sized,
{
    let notes = source.list_all_for_owner(owner)?;
    let ranked: Vec<Note> = rank(query, &notes)
        .into_iter()
        .map(|s| s.note.clone())
        .collect();
    Ok(ranked)
}

/// One row of a search listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub rank: usize,
    #[serde(flatten)]
    pub summary: NoteSummary,
    /// `None` for plain listings, which are not scored.
    pub score: Option<f64>,
    pub tier: Option<Tier>,
}

/// The list view behind `jotter list`, `jotter search` and the MCP search
/// tool.
///
/// A blank query lists every note, newest first. Anything else is trimmed
/// and ranked.
pub fn list_or_search(
    db: &NoteDb,
    query: &str,
    owner: UserId,
) -> Result<Vec<SearchHit>> {
    let query = query.trim();

    if query.is_empty() {
        let notes = db.list_notes(owner)?;
        return Ok(notes
            .iter()
            .enumerate()
            .map(|(i, note)| SearchHit {
                rank: i + 1,
                summary: NoteSummary::from(note),
                score: None,
                tier: None,
            })
            .collect());
    }

    let notes = db.list_all_for_owner(owner)?;
    Ok(rank(query, &notes)
        .into_iter()
        .enumerate()
        .map(|(i, s)| SearchHit {
            rank: i + 1,
            summary: NoteSummary::from(s.note),
            score: Some(s.score),
            tier: Some(s.tier),
        })
        .collect())
}

/// Format hits for human-readable terminal output.
pub fn format_human(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No notes found.");
        return;
    }

    for hit in hits {
        match (hit.score, hit.tier) {
            (Some(score), Some(Tier::Fallback)) => println!(
                "{:>3}. [{score:.1}~] #{} {}",
                hit.rank, hit.summary.id, hit.summary.title
            ),
            (Some(score), _) => println!(
                "{:>3}. [{score:.1}] #{} {}",
                hit.rank, hit.summary.id, hit.summary.title
            ),
            (None, _) => println!(
                "{:>3}. #{} {}",
                hit.rank, hit.summary.id, hit.summary.title
            ),
        }
        let first_line = hit.summary.excerpt.lines().next().unwrap_or("");
        if !first_line.is_empty() {
            println!("     {first_line}");
        }
    }
    println!("\n{} note(s)", hits.len());
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchOutput<'a> {
    query: &'a str,
    result_count: usize,
    results: &'a [SearchHit],
}

/// Format hits as JSON output.
pub fn format_json(hits: &[SearchHit], query: &str) -> Result<()> {
    let output = SearchOutput {
        query,
        result_count: hits.len(),
        results: hits,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
