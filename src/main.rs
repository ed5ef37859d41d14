//! # `ctx`
//!
//! Command-line interface for context documents.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctx init` | Create the project (or `--global`) registry |
//! | `ctx create <name>` | Write a new context document and register it |
//! | `ctx sync [path]` | Rescan documents and record checksums |
//! | `ctx check [path]` | Report drift without writing (alias `validate`) |
//! | `ctx refresh` | Sync, then rebuild the global index |
//! | `ctx status` | Registry locations and freshness |
//! | `ctx list` | Tabulate registered contexts |
//! | `ctx add <path>` | Register an existing document |
//! | `ctx remove <id>` | Unregister a document |
//! | `ctx save <name>` | Save text from a file or stdin as a standalone context |
//! | `ctx adopt <path>` | Bring a markdown file under management |
//! | `ctx load [file]` | Print the contexts for a file, or search by keyword |
//! | `ctx migrate` | Convert legacy `.ctx.yml`/`.ctx.json` documents to markdown |
//! | `ctx session` | Digest of every known context |
//!
//! Exit status is 1 on any error, and on drift under `ctx check --strict`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use context_docs::commands;
use context_docs::workspace::Workspace;

/// Manage markdown context documents for a codebase.
#[derive(Parser)]
#[command(name = "ctx", version, about)]
struct Cli {
    /// Directory to start the project search from. Defaults to the current
    /// directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Home directory holding the global registry. Defaults to `$HOME`.
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Configuration file (TOML). Defaults to `<project>/.ctx/config.toml`
    /// when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug detail to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty registry and contexts directory.
    ///
    /// Idempotent: an existing registry is left untouched.
    Init {
        #[arg(long)]
        global: bool,
    },

    /// Write a new context document from a template and register it.
    ///
    /// A name ending in `.ctx.md` (or exactly `ctx.md`) creates a companion
    /// file at that path; anything else goes under the contexts directory.
    Create {
        name: String,
        /// File, glob, or folder (trailing `/`) the document describes.
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        what: Option<String>,
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,
        #[arg(long)]
        global: bool,
    },

    /// Rescan context documents and record their checksums.
    Sync {
        /// Only sync this document.
        path: Option<String>,
        #[arg(long)]
        global: bool,
    },

    /// Compare recorded checksums with the files on disk. Never writes.
    #[command(visible_alias = "validate")]
    Check {
        /// Only check this document (skips discovery of new documents).
        path: Option<String>,
        #[arg(long)]
        global: bool,
        /// Exit with status 1 when anything is stale, deleted, or broken.
        #[arg(long)]
        strict: bool,
        #[arg(long)]
        json: bool,
    },

    /// Sync the project, then rebuild the global index from every indexed
    /// project's registry.
    Refresh,

    /// Show registry locations, counts, and freshness.
    Status,

    /// List registered contexts.
    List {
        #[arg(long)]
        global: bool,
        #[arg(long)]
        json: bool,
    },

    /// Register an existing context document.
    Add {
        path: String,
        #[arg(long)]
        global: bool,
    },

    /// Unregister a context. The file itself is kept.
    Remove {
        id: String,
        #[arg(long)]
        global: bool,
    },

    /// Save text as a standalone context (reads stdin without --file).
    Save {
        name: String,
        #[arg(long)]
        what: String,
        #[arg(long, value_delimiter = ',', required = true)]
        keywords: Vec<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        global: bool,
    },

    /// Register a markdown file, adding a metadata block if it has none.
    Adopt {
        path: String,
        #[arg(long)]
        what: Option<String>,
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,
        #[arg(long)]
        target: Option<String>,
    },

    /// Print the context for a file, or rank contexts by keywords.
    Load {
        /// File to find contexts for.
        target: Option<String>,
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        keywords: Vec<String>,
        /// Show every match instead of only the best one.
        #[arg(long)]
        all: bool,
    },

    /// Convert legacy structured documents into markdown.
    Migrate {
        #[arg(long)]
        global: bool,
    },

    /// Print a digest of every known context.
    Session {
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "context_docs=debug,ctx=debug"
    } else {
        "context_docs=warn,ctx=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let current = std::env::current_dir()?;
    let cwd = match cli.root {
        Some(root) => current.join(root),
        None => current,
    };
    let home = match cli.home {
        Some(home) => home,
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow::anyhow!("HOME is not set; pass --home"))?,
    };
    let ws = Workspace::discover(&cwd, &home, cli.config.as_deref())?;

    match cli.command {
        Commands::Init { global } => commands::run_init(&ws, global).await?,
        Commands::Create {
            name,
            target,
            what,
            keywords,
            global,
        } => commands::run_create(&ws, &name, target, what, keywords, global).await?,
        Commands::Sync { path, global } => {
            commands::run_sync(&ws, path.as_deref(), global).await?
        }
        Commands::Check {
            path,
            global,
            strict,
            json,
        } => {
            if !commands::run_check(&ws, path.as_deref(), global, strict, json).await? {
                std::process::exit(1);
            }
        }
        Commands::Refresh => commands::run_refresh(&ws).await?,
        Commands::Status => commands::run_status(&ws).await?,
        Commands::List { global, json } => commands::run_list(&ws, global, json).await?,
        Commands::Add { path, global } => commands::run_add(&ws, &path, global).await?,
        Commands::Remove { id, global } => commands::run_remove(&ws, &id, global).await?,
        Commands::Save {
            name,
            what,
            keywords,
            file,
            global,
        } => commands::run_save(&ws, &name, what, keywords, file.as_deref(), global).await?,
        Commands::Adopt {
            path,
            what,
            keywords,
            target,
        } => commands::run_adopt(&ws, &path, what, keywords, target).await?,
        Commands::Load {
            target,
            keywords,
            all,
        } => commands::run_load(&ws, target.as_deref(), &keywords, all).await?,
        Commands::Migrate { global } => commands::run_migrate(&ws, global).await?,
        Commands::Session { json } => commands::run_session(&ws, json).await?,
    }

    Ok(())
}
