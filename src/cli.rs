use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use jotter::auth::{DEFAULT_PASSWORD, PASSWORD_ENV_VAR};

#[derive(Debug, Parser)]
#[command(
    name = "jotter",
    about = "A password-gated personal notes store with layered fuzzy search"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Password identifying whose notes to use
    #[arg(
        long,
        global = true,
        env = PASSWORD_ENV_VAR,
        default_value = DEFAULT_PASSWORD,
        hide_env_values = true,
        hide_default_value = true
    )]
    pub password: String,

    /// Override the model tried first for remixing
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a note
    Add(AddArgs),
    /// Print a note
    Get(GetArgs),
    /// Change a note's title or content
    Edit(EditArgs),
    /// Delete a note
    #[command(alias = "remove")]
    Rm(RmArgs),
    /// List notes, most recently updated first
    List(ListArgs),
    /// Search notes by title and content
    Search(SearchArgs),
    /// Rewrite a note's content in a persona's tone
    Remix(RemixArgs),
    /// List available personas
    Personas {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that a remix model answers
    AiCheck,
    /// Manage the preferred remix model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Print the user id for the current password
    Whoami,
    /// Show data directory and store statistics
    Status(StatusArgs),
    /// Start MCP server for AI agent integration
    Mcp,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Notes --

#[derive(Debug, Parser)]
pub struct AddArgs {
    /// Note title
    #[arg(short, long)]
    pub title: String,

    /// Note content (empty when omitted)
    #[arg(short, long, default_value = "")]
    pub content: String,

    /// Output the created note as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct GetArgs {
    /// Note id
    pub id: u64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Print only metadata
    #[arg(long)]
    pub meta: bool,

    /// Prefix content lines with line numbers
    #[arg(long)]
    pub line_numbers: bool,
}

#[derive(Debug, Parser)]
pub struct EditArgs {
    /// Note id
    pub id: u64,

    /// New title
    #[arg(short, long)]
    pub title: Option<String>,

    /// New content
    #[arg(short, long)]
    pub content: Option<String>,
}

#[derive(Debug, Parser)]
pub struct RmArgs {
    /// Note id
    pub id: u64,
}

#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query (blank lists every note)
    pub query: String,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct RemixArgs {
    /// Note id
    pub id: u64,

    /// Persona name (a file in the personas directory, without .md)
    #[arg(short, long)]
    pub persona: String,
}

// -- Model --

#[derive(Debug, Subcommand)]
pub enum ModelAction {
    /// Show the resolved model candidates
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist a preferred model in the store
    Set {
        /// Model id
        model: String,
    },
    /// Clear the stored model setting (revert to defaults)
    Clear,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "jotter",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_search_defaults() {
        let cli = Cli::parse_from(["jotter", "search", "qr"]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query, "qr");
                assert!(!args.json);
            }
            _ => panic!("expected search command"),
        }
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn parse_add_with_global_password() {
        let cli = Cli::parse_from([
            "jotter",
            "add",
            "--title",
            "Groceries",
            "--password",
            "s3cret",
        ]);
        assert_eq!(cli.password, "s3cret");
        match cli.command {
            Command::Add(args) => {
                assert_eq!(args.title, "Groceries");
                assert_eq!(args.content, "");
            }
            _ => panic!("expected add command"),
        }
    }

    #[test]
    fn parse_remove_alias() {
        let cli = Cli::parse_from(["jotter", "remove", "3"]);
        assert!(matches!(cli.command, Command::Rm(RmArgs { id: 3 })));
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
