use std::sync::Arc;

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error,
    note::UserId,
    note_db::NoteDb,
    search::{self, Tier},
    text_util::{add_line_numbers, apply_line_limits, extract_snippet},
};

const DEFAULT_SEARCH_LIMIT: usize = 20;

struct JotterState {
    db: NoteDb,
    owner: UserId,
}

/// MCP server exposing one owner's notes.
#[derive(Clone)]
pub struct JotterMcpServer {
    state: Arc<JotterState>,
    tool_router: ToolRouter<Self>,
}

impl JotterMcpServer {
    fn new(state: JotterState) -> Self {
        Self {
            state: Arc::new(state),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl JotterMcpServer {
    /// Search notes with subsequence ranking and token fallback.
    #[tool(
        name = "jotter_search",
        description = "Search notes by title and content. A blank query lists all notes, newest first."
    )]
    pub async fn jotter_search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let query = params.query.trim().to_string();
        let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let include_snippet = params.include_snippet.unwrap_or(true);

        let hits = search::list_or_search(&self.state.db, &query, self.state.owner)
            .map_err(|e| mcp_error("search failed", e))?;

        let mut items = Vec::with_capacity(hits.len().min(limit));
        for hit in hits.into_iter().take(limit) {
            let snippet = if include_snippet && !query.is_empty() {
                self.state
                    .db
                    .get_note(hit.summary.id, self.state.owner)
                    .map_err(|e| mcp_error("failed to load note", e))?
                    .and_then(|note| extract_snippet(&note.content, &query))
                    .map(|(snippet, start_line)| {
                        add_line_numbers(&snippet, start_line)
                    })
            } else {
                None
            };

            items.push(SearchResultItem {
                id: hit.summary.id,
                title: hit.summary.title,
                excerpt: hit.summary.excerpt,
                updated_at: hit.summary.updated_at,
                score: hit.score,
                tier: hit.tier,
                snippet,
            });
        }

        let summary = format_search_summary(&items, &query);
        let structured = serde_json::to_value(SearchResponse {
            query,
            result_count: items.len(),
            results: items,
        })
        .map_err(|e| mcp_error("failed to serialize search results", e))?;

        let mut result = CallToolResult::success(vec![Content::text(summary)]);
        result.structured_content = Some(structured);
        Ok(result)
    }

    /// Fetch one note by id.
    #[tool(
        name = "jotter_get",
        description = "Read a note by id. Supports line numbers and line limits."
    )]
    pub async fn jotter_get(
        &self,
        params: Parameters<GetParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let note = self
            .state
            .db
            .get_note(params.id, self.state.owner)
            .map_err(|e| mcp_error("failed to load note", e))?
            .ok_or_else(|| {
                rmcp::ErrorData::invalid_params(
                    format!("note not found: {}", params.id),
                    None,
                )
            })?;

        let content = if params.line_numbers.unwrap_or(false) {
            add_line_numbers(&note.content, 1)
        } else {
            note.content.clone()
        };
        let body = apply_line_limits(
            &content,
            params.from_line.unwrap_or(1),
            params.max_lines,
        );

        let text = format!("# {}\n\n{body}", note.title);
        let mut result = CallToolResult::success(vec![Content::text(text)]);
        result.structured_content = Some(json!({
            "id": note.id,
            "title": note.title,
            "createdAt": note.created_at,
            "updatedAt": note.updated_at,
        }));
        Ok(result)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for JotterMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_server_info(
                Implementation::new("jotter", env!("CARGO_PKG_VERSION"))
                    .with_title("jotter MCP"),
            )
            .with_instructions(
                "Use jotter_search to find notes, then jotter_get to read one by id.",
            )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Search query string. Blank lists every note.
    pub query: String,
    /// Maximum number of results (default: 20).
    pub limit: Option<usize>,
    /// Include a snippet around the match (default: true).
    pub include_snippet: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetParams {
    /// Note id.
    pub id: u64,
    /// First content line to return, 1-indexed (default: 1).
    pub from_line: Option<usize>,
    /// Maximum number of content lines to return.
    pub max_lines: Option<usize>,
    /// Prefix content lines with their line numbers (default: false).
    pub line_numbers: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    query: String,
    result_count: usize,
    results: Vec<SearchResultItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResultItem {
    id: u64,
    title: String,
    excerpt: String,
    updated_at: u64,
    score: Option<f64>,
    tier: Option<Tier>,
    snippet: Option<String>,
}

fn format_search_summary(results: &[SearchResultItem], query: &str) -> String {
    if results.is_empty() {
        return format!("No notes found for \"{query}\"");
    }

    let mut lines = Vec::with_capacity(results.len() + 1);
    let suffix = if results.len() == 1 { "" } else { "s" };
    if query.is_empty() {
        lines.push(format!("{} note{suffix}:", results.len()));
    } else {
        lines.push(format!(
            "Found {} note{suffix} for \"{query}\":",
            results.len()
        ));
    }

    for item in results {
        match item.score {
            Some(score) => {
                lines.push(format!("#{} {score:.1} {}", item.id, item.title))
            }
            None => lines.push(format!("#{} {}", item.id, item.title)),
        }
    }

    lines.join("\n")
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

pub fn run_mcp(db: NoteDb, owner: UserId) -> error::Result<()> {
    let server = JotterMcpServer::new(JotterState { db, owner });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::NoteInput;

    fn test_server() -> (tempfile::TempDir, JotterMcpServer) {
        let tmp = tempfile::tempdir().unwrap();
        let db = NoteDb::open(&tmp.path().join("notes.redb")).unwrap();
        db.create_note(
            1,
            &NoteInput::new("Rust book", "Intro\nrust ownership rules\nEnd"),
        )
        .unwrap();
        db.create_note(1, &NoteInput::new("Rustacean meetup", "notes"))
            .unwrap();
        db.create_note(2, &NoteInput::new("Rust secrets", "rust rust"))
            .unwrap();
        (tmp, JotterMcpServer::new(JotterState { db, owner: 1 }))
    }

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn search_tool_returns_structured_results() {
        let (_tmp, server) = test_server();

        let params = SearchParams {
            query: "rust".to_string(),
            limit: Some(5),
            include_snippet: Some(true),
        };
        let result = server.jotter_search(Parameters(params)).await.unwrap();

        let structured = result.structured_content.clone().expect("structured");
        let results = structured
            .get("results")
            .and_then(|v| v.as_array())
            .expect("results array");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].get("id").and_then(|v| v.as_u64()), Some(1));
        assert_eq!(
            results[0].get("tier").and_then(|v| v.as_str()),
            Some("primary")
        );
        assert_eq!(
            results[1].get("tier").and_then(|v| v.as_str()),
            Some("fallback")
        );
        let snippet = results[0]
            .get("snippet")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        assert!(snippet.contains("2: rust ownership rules"));

        assert!(text_of(&result).contains("Found 2 notes"));
    }

    #[tokio::test]
    async fn blank_search_lists_all_notes() {
        let (_tmp, server) = test_server();

        let params = SearchParams {
            query: "  ".to_string(),
            limit: None,
            include_snippet: None,
        };
        let result = server.jotter_search(Parameters(params)).await.unwrap();

        let structured = result.structured_content.expect("structured");
        assert_eq!(
            structured.get("resultCount").and_then(|v| v.as_u64()),
            Some(2)
        );
    }

    #[tokio::test]
    async fn get_tool_applies_line_limits() {
        let (_tmp, server) = test_server();

        let params = GetParams {
            id: 1,
            from_line: Some(2),
            max_lines: Some(1),
            line_numbers: Some(true),
        };
        let result = server.jotter_get(Parameters(params)).await.unwrap();

        let text = text_of(&result);
        assert!(text.starts_with("# Rust book"));
        assert!(text.contains("2: rust ownership rules"));
        assert!(!text.contains("Intro"));
    }

    #[tokio::test]
    async fn get_tool_hides_other_owners() {
        let (_tmp, server) = test_server();

        let params = GetParams {
            id: 3,
            from_line: None,
            max_lines: None,
            line_numbers: None,
        };
        assert!(server.jotter_get(Parameters(params)).await.is_err());
    }
}
