use std::path::{Path, PathBuf};

use jotter::{NoteDb, NoteInput, auth};
use rmcp::{
    ServiceExt,
    model::CallToolRequestParams,
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use serde_json::json;

const PASSWORD: &str = "s3cret";

fn setup_fixture(data_dir: &Path) -> Result<u64, Box<dyn std::error::Error>> {
    let db = NoteDb::open(&data_dir.join("notes.redb"))?;
    let owner = auth::login(&db, PASSWORD)?;
    let other = auth::login(&db, "someone-else")?;

    let report = db.create_note(
        owner,
        &NoteInput::new("Quarterly Report", "Revenue up\nCosts flat\n"),
    )?;
    db.create_note(owner, &NoteInput::new("Groceries", "milk, eggs"))?;
    db.create_note(other, &NoteInput::new("Quarterly secrets", "hidden"))?;

    Ok(report.id)
}

#[tokio::test]
async fn mcp_stdio_search_roundtrip() -> Result<(), Box<dyn std::error::Error>>
{
    let tempdir = tempfile::tempdir()?;
    let report_id = setup_fixture(tempdir.path())?;

    let bin = jotter_bin()?;
    let transport = TokioChildProcess::new(
        tokio::process::Command::new(bin).configure(|cmd| {
            cmd.arg("mcp")
                .env("JOTTER_DATA_DIR", tempdir.path())
                .env("JOTTER_PASSWORD", PASSWORD);
        }),
    )?;

    let client = ().serve(transport).await?;

    let args = json!({
        "query": "qr",
        "limit": 5,
        "includeSnippet": false
    });

    let result = client
        .peer()
        .call_tool(CallToolRequestParams::new("jotter_search")
                .with_arguments(args.as_object().unwrap().clone()),
        )
        .await?;

    let structured = result.structured_content.expect("structured content");
    let results = structured
        .get("results")
        .and_then(|v| v.as_array())
        .expect("results array");

    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].get("title").and_then(|v| v.as_str()),
        Some("Quarterly Report")
    );
    assert_eq!(
        results[0].get("tier").and_then(|v| v.as_str()),
        Some("primary")
    );

    let get_args = json!({
        "id": report_id,
        "lineNumbers": true,
        "maxLines": 1
    });
    let get_result = client
        .peer()
        .call_tool(CallToolRequestParams::new("jotter_get")
                .with_arguments(get_args.as_object().unwrap().clone()),
        )
        .await?;
    let text = get_result
        .content
        .iter()
        .find_map(|c| c.as_text())
        .map(|t| t.text.clone())
        .expect("jotter_get text");
    assert!(text.starts_with("# Quarterly Report"));
    assert!(text.contains("1: Revenue up"));
    assert!(!text.contains("Costs flat"));

    client.cancel().await?;
    Ok(())
}

fn jotter_bin() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Ok(bin) = std::env::var("CARGO_BIN_EXE_jotter") {
        return Ok(PathBuf::from(bin));
    }

    let mut path = std::env::current_exe()?;
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("jotter");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    Ok(path)
}
