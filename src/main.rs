//! # Context Recorder CLI (`ccr`)
//!
//! Records short notes (decisions, bug reports, commit context, links)
//! against the files they explain, and finds them again by fuzzy search,
//! per-file timeline, commit, author or date.
//!
//! ## Usage
//!
//! ```bash
//! ccr [--config ./.ccr/config.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ccr init` | Write a default config and create the database schema |
//! | `ccr add "<text>"` | Record an entry |
//! | `ccr search "<query>"` | Fuzzy search with optional filters |
//! | `ccr suggest <partial>` | Complete a partial search term |
//! | `ccr related <id>` | Entries similar to an entry |
//! | `ccr timeline <file>` | Entries for one file, newest first |
//! | `ccr recent` | Newest entries, or a date range |
//! | `ccr commit <hash>` / `ccr author <name>` | Exact lookups |
//! | `ccr get <id>` / `ccr edit <id>` / `ccr delete <id>` | Single entries |
//! | `ccr stats` | Corpus analytics |
//! | `ccr export` / `ccr import <file>` | JSON interchange |
//!
//! ## Examples
//!
//! ```bash
//! ccr init
//! ccr add "Retry loop backs off to 30s; upstream rate limit" \
//!     --type decision --file src/client.rs:40-62 --tag networking
//! ccr search "retry" --file 'src/.*\.rs'
//! ccr timeline src/client.rs
//! ccr stats --json
//! ```
//!
//! Logging goes to stderr. Set `CCR_LOG` (an `EnvFilter` directive such as
//! `context_recorder=debug`) or pass `-v`/`-q`.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use context_recorder::add::{self, NewEntry};
use context_recorder::config::{self, Config};
use context_recorder::search::{self, SearchFilters};
use context_recorder::{export, get, migrate, stats, timeline};
use context_recorder_core::models::ContextMetadata;

const DEFAULT_CONFIG_PATH: &str = "./.ccr/config.toml";

#[derive(Parser)]
#[command(
    name = "ccr",
    about = "Context Recorder: notes and decisions linked to the code they explain",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./.ccr/config.toml`; built-in defaults apply when that
    /// file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config (if missing) and create the database schema.
    ///
    /// Idempotent: running it again leaves existing data untouched.
    Init,

    /// Record a new entry. Prints its id.
    Add {
        /// Entry text, or `-` to read it from stdin.
        content: String,

        /// Entry type: text, voice, link, code_snippet, commit,
        /// meeting_note, decision, bug_report or research.
        #[arg(long = "type", default_value = "text")]
        entry_type: String,

        /// Where the entry came from: manual, git_hook, browser_extension,
        /// editor_extension, cli or api.
        #[arg(long, default_value = "cli")]
        source: String,

        /// Associated file as `path`, `path:line` or `path:start-end`. Repeatable.
        #[arg(short, long = "file")]
        files: Vec<String>,

        /// Tag. Repeatable.
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        email: Option<String>,

        /// Commit hash the entry describes.
        #[arg(long)]
        commit: Option<String>,

        #[arg(long)]
        branch: Option<String>,

        /// URL. Repeatable.
        #[arg(long = "link")]
        links: Vec<String>,

        /// Related ticket id. Repeatable.
        #[arg(long = "ticket")]
        tickets: Vec<String>,

        /// Related pull request. Repeatable.
        #[arg(long = "pr")]
        prs: Vec<String>,

        /// Related discussion thread. Repeatable.
        #[arg(long = "thread")]
        threads: Vec<String>,

        /// Cursor line the entry was recorded at.
        #[arg(long)]
        line: Option<u32>,

        #[arg(long)]
        column: Option<u32>,

        /// Voice note length in seconds.
        #[arg(long)]
        duration: Option<u32>,

        /// Voice note recording path.
        #[arg(long)]
        audio: Option<String>,

        /// Print the stored entry as JSON instead of its id.
        #[arg(long)]
        json: bool,
    },

    /// Fuzzy search with optional filters.
    ///
    /// Filters are ANDed. With no query and only `--tag`, searches for the
    /// tags themselves.
    Search {
        #[arg(default_value = "")]
        query: String,

        /// Regular expression matched against associated file paths.
        #[arg(long)]
        file: Option<String>,

        /// Entry type. Repeatable; matches any.
        #[arg(long = "type")]
        types: Vec<String>,

        /// Tag. Repeatable; matches any.
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Exact author.
        #[arg(long)]
        author: Option<String>,

        /// Only entries on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Only entries on or before this date (YYYY-MM-DD).
        #[arg(long)]
        until: Option<String>,

        /// Index hits to consider before filtering.
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Complete a partial search term from indexed words.
    Suggest {
        partial: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },

    /// Entries similar to the given entry.
    Related {
        id: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },

    /// Entries associated with one file, newest first.
    Timeline {
        /// Exact file path as recorded.
        file: String,
        #[arg(long)]
        json: bool,
    },

    /// Newest entries, or every entry in a date range.
    Recent {
        #[arg(long)]
        limit: Option<usize>,
        /// Range start (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,
        /// Range end, inclusive (YYYY-MM-DD).
        #[arg(long)]
        until: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Entries recorded for a commit.
    Commit {
        hash: String,
        #[arg(long)]
        json: bool,
    },

    /// Entries by an exact author name.
    Author {
        name: String,
        #[arg(long)]
        json: bool,
    },

    /// Show one entry in full.
    Get {
        id: String,
        #[arg(long)]
        json: bool,
    },

    /// Replace an entry's content. Other fields are left as they are.
    Edit {
        id: String,
        /// New text, or `-` to read it from stdin.
        content: String,
    },

    /// Delete an entry with its files, tags and links.
    Delete { id: String },

    /// Corpus analytics.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Export every entry as JSON, newest first.
    Export {
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a JSON export, skipping ids already stored.
    Import { file: PathBuf },

    /// Generate shell completions and print to stdout.
    Completions { shell: Shell },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("CCR_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn resolve_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    match explicit {
        Some(path) => config::load_config(path),
        None => config::load_or_default(Path::new(DEFAULT_CONFIG_PATH)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "ccr", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Init => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
            if config::write_default(&path)? {
                println!("Wrote default config to {}", path.display());
            }
            let cfg = config::load_config(&path)?;
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
            return Ok(());
        }
        _ => {}
    }

    let cfg = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Add {
            content,
            entry_type,
            source,
            files,
            tags,
            author,
            email,
            commit,
            branch,
            links,
            tickets,
            prs,
            threads,
            line,
            column,
            duration,
            audio,
            json,
        } => {
            let new = NewEntry {
                content,
                entry_type,
                source,
                files,
                tags,
                metadata: ContextMetadata {
                    author,
                    email,
                    commit_hash: commit,
                    branch,
                    links,
                    duration,
                    audio_path: audio,
                    line_number: line,
                    column_number: column,
                    related_tickets: tickets,
                    related_prs: prs,
                    related_threads: threads,
                },
            };
            add::run_add(&cfg, new, json).await?;
        }
        Commands::Search {
            query,
            file,
            types,
            tags,
            author,
            since,
            until,
            limit,
            json,
        } => {
            let filters = SearchFilters {
                file,
                types,
                tags,
                author,
                since,
                until,
                limit,
            };
            search::run_search(&cfg, &query, &filters, json).await?;
        }
        Commands::Suggest {
            partial,
            limit,
            json,
        } => {
            search::run_suggest(&cfg, &partial, limit, json).await?;
        }
        Commands::Related { id, limit, json } => {
            search::run_related(&cfg, &id, limit, json).await?;
        }
        Commands::Timeline { file, json } => {
            timeline::run_timeline(&cfg, &file, json).await?;
        }
        Commands::Recent {
            limit,
            since,
            until,
            json,
        } => {
            timeline::run_recent(&cfg, limit, since, until, json).await?;
        }
        Commands::Commit { hash, json } => {
            timeline::run_commit(&cfg, &hash, json).await?;
        }
        Commands::Author { name, json } => {
            timeline::run_author(&cfg, &name, json).await?;
        }
        Commands::Get { id, json } => {
            get::run_get(&cfg, &id, json).await?;
        }
        Commands::Edit { id, content } => {
            add::run_edit(&cfg, &id, &content).await?;
        }
        Commands::Delete { id } => {
            get::run_delete(&cfg, &id).await?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json).await?;
        }
        Commands::Export { output } => {
            export::run_export(&cfg, output.as_deref()).await?;
        }
        Commands::Import { file } => {
            export::run_import(&cfg, &file).await?;
        }
        Commands::Completions { .. } | Commands::Init => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
