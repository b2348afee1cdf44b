use clap::Parser;
use jotter::{
    DataDir,
    NoteDb,
    NoteInput,
    OpenAiBackend,
    Personas,
    Remixer,
    UserId,
    auth,
    error::{self, Error},
    mcp,
    note_db::require_note,
    remix,
    search,
    text_util,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, ModelAction};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("JOTTER_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let db = NoteDb::open(&data_dir.notes_db())?;
    let owner = auth::bootstrap(&db, &cli.password)?;
    let model = cli.model.as_deref();

    match cli.command {
        Command::Add(args) => cmd_add(&db, owner, &args)?,
        Command::Get(args) => cmd_get(&db, owner, &args)?,
        Command::Edit(args) => cmd_edit(&db, owner, &args)?,
        Command::Rm(args) => {
            if !db.delete_note(args.id, owner)? {
                return Err(Error::note_not_found(args.id));
            }
            println!("Removed note #{}", args.id);
        }
        Command::List(args) => {
            let hits = search::list_or_search(&db, "", owner)?;
            if args.json {
                search::format_json(&hits, "")?;
            } else {
                search::format_human(&hits);
            }
        }
        Command::Search(args) => {
            let hits = search::list_or_search(&db, &args.query, owner)?;
            if args.json {
                search::format_json(&hits, args.query.trim())?;
            } else {
                search::format_human(&hits);
            }
        }
        Command::Remix(args) => {
            cmd_remix(&db, &data_dir, owner, model, &args)?;
        }
        Command::Personas { json } => {
            let personas = Personas::new(data_dir.personas_dir()?);
            let names = personas.list()?;
            if json {
                println!("{}", serde_json::to_string(&names)?);
            } else if names.is_empty() {
                println!(
                    "No personas found. Add <name>.md files to {}",
                    personas.dir().display()
                );
            } else {
                for name in &names {
                    println!("{name}");
                }
            }
        }
        Command::AiCheck => cmd_ai_check(&db, model)?,
        Command::Model { action } => cmd_model(&db, model, action)?,
        Command::Whoami => println!("{owner}"),
        Command::Status(args) => {
            cmd_status(&db, &data_dir, owner, model, args.json)?;
        }
        Command::Mcp => mcp::run_mcp(db, owner)?,
        Command::Completions(_) => {}
    }

    Ok(())
}

fn runtime() -> error::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Config(format!("failed to start tokio runtime: {e}")))
}

fn cmd_add(db: &NoteDb, owner: UserId, args: &cli::AddArgs) -> error::Result<()> {
    let note = db.create_note(owner, &NoteInput::new(&args.title, &args.content))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&note)?);
    } else {
        println!("Added note #{} '{}'", note.id, note.title);
    }
    Ok(())
}

fn cmd_get(db: &NoteDb, owner: UserId, args: &cli::GetArgs) -> error::Result<()> {
    let note = require_note(db, args.id, owner)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&note)?);
    } else if args.meta {
        println!("id: {}", note.id);
        println!("title: {}", note.title);
        println!("created: {}", note.created_at);
        println!("updated: {}", note.updated_at);
    } else {
        println!("# {}\n", note.title);
        if args.line_numbers {
            println!("{}", text_util::add_line_numbers(&note.content, 1));
        } else {
            print!("{}", note.content);
            if !note.content.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}

fn cmd_edit(
    db: &NoteDb,
    owner: UserId,
    args: &cli::EditArgs,
) -> error::Result<()> {
    if args.title.is_none() && args.content.is_none() {
        return Err(Error::Invalid(
            "nothing to change: pass --title and/or --content".into(),
        ));
    }

    let current = require_note(db, args.id, owner)?;
    let input = NoteInput {
        title: args.title.clone().unwrap_or(current.title),
        content: args.content.clone().unwrap_or(current.content),
    };
    let note = db
        .update_note(args.id, owner, &input)?
        .ok_or_else(|| Error::note_not_found(args.id))?;

    println!("Updated note #{} '{}'", note.id, note.title);
    Ok(())
}

fn remixer(
    db: &NoteDb,
    model: Option<&str>,
) -> error::Result<Remixer<OpenAiBackend>> {
    let backend = OpenAiBackend::from_env()?;
    let preferred = remix::resolve_preferred_model(model, db)?;
    Ok(Remixer::new(backend, preferred.as_deref()))
}

fn cmd_remix(
    db: &NoteDb,
    data_dir: &DataDir,
    owner: UserId,
    model: Option<&str>,
    args: &cli::RemixArgs,
) -> error::Result<()> {
    let personas = Personas::new(data_dir.personas_dir()?);
    let remixer = remixer(db, model)?;

    let note = runtime()?.block_on(remix::remix_note(
        db,
        &remixer,
        &personas,
        args.id,
        owner,
        &args.persona,
    ))?;

    eprintln!(
        "Remixed note #{} with '{}' ({})",
        note.id,
        args.persona,
        remixer.cached_model().unwrap_or_default()
    );
    print!("{}", note.content);
    if !note.content.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn cmd_ai_check(db: &NoteDb, model: Option<&str>) -> error::Result<()> {
    let remixer = remixer(db, model)?;
    let report = runtime()?.block_on(remixer.probe());

    if report.ok {
        println!(
            "AI check OK. Model: {}\nSample: {}",
            report.model.unwrap_or_default(),
            report.sample.unwrap_or_default()
        );
        Ok(())
    } else {
        Err(Error::Remix(report.error.unwrap_or_default()))
    }
}

fn cmd_model(
    db: &NoteDb,
    model: Option<&str>,
    action: ModelAction,
) -> error::Result<()> {
    match action {
        ModelAction::Show { json } => {
            let stored = db.get_setting(remix::MODEL_SETTING)?;
            let preferred = remix::resolve_preferred_model(model, db)?;
            let candidates = remix::model_candidates(preferred.as_deref());

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "preferred": preferred,
                        "stored": stored,
                        "candidates": candidates,
                    }))?
                );
            } else {
                println!(
                    "Preferred: {}",
                    preferred.as_deref().unwrap_or("(none)")
                );
                println!("Stored: {}", stored.as_deref().unwrap_or("(none)"));
                println!("Candidates: {}", candidates.join(", "));
            }
        }
        ModelAction::Set { model } => {
            db.set_setting(remix::MODEL_SETTING, &model)?;
            println!("Preferred model set to '{model}'");
        }
        ModelAction::Clear => {
            if db.remove_setting(remix::MODEL_SETTING)? {
                println!("Cleared preferred model");
            } else {
                println!("No preferred model was set");
            }
        }
    }
    Ok(())
}

fn cmd_status(
    db: &NoteDb,
    data_dir: &DataDir,
    owner: UserId,
    model: Option<&str>,
    json: bool,
) -> error::Result<()> {
    let own_notes = db.list_notes(owner)?.len();
    let total_notes = db.count_notes()?;
    let users = db.count_users()?;
    let personas = Personas::new(data_dir.personas_dir()?).list()?.len();
    let preferred = remix::resolve_preferred_model(model, db)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "dataDir": data_dir.root(),
                "user": owner,
                "notes": own_notes,
                "totalNotes": total_notes,
                "users": users,
                "personas": personas,
                "model": preferred,
            }))?
        );
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("User: {owner}");
        println!("Notes: {own_notes} ({total_notes} across {users} users)");
        println!("Personas: {personas}");
        println!(
            "Preferred model: {}",
            preferred.as_deref().unwrap_or("(default)")
        );
    }
    Ok(())
}
