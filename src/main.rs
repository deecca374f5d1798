//! # Repo Summarizer CLI (`rsum`)
//!
//! The `rsum` binary analyzes repositories from the command line and serves
//! the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! rsum --config ./config/rsum.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rsum init` | Create the SQLite database and run schema migrations |
//! | `rsum analyze <url>` | Analyze a repository and print the saved record |
//! | `rsum history` | List saved analyses, most recent first |
//! | `rsum show <id>` | Print one analysis report |
//! | `rsum delete <id>` | Delete one analysis |
//! | `rsum serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! rsum init --config ./config/rsum.toml
//! rsum analyze https://github.com/tokio-rs/axum --progress human
//! rsum analyze https://github.com/org/repo/tree/main/docs --progress json 2>events.ndjson
//! rsum serve --memory
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

use repo_summarizer::config;
use repo_summarizer::events::ProgressMode;
use repo_summarizer::migrate;
use repo_summarizer::pipeline::Pipeline;
use repo_summarizer::server;
use repo_summarizer::store::{RecordStore, SqliteStore};
use repo_summarizer::telemetry;

/// Repo Summarizer: documentation audits of source repositories.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rsum.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rsum",
    about = "Repo Summarizer: documentation audits of source repositories",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rsum.toml")]
    config: PathBuf,

    /// Emit logs as newline-delimited JSON on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Analyze a repository and save the report.
    ///
    /// The saved record is printed to stdout as JSON. Progress goes to
    /// stderr.
    Analyze {
        /// Repository URL, e.g. `https://github.com/org/repo` or
        /// `https://github.com/org/repo/tree/main/docs`.
        url: String,

        /// Progress output: `human`, `json`, or `off`. Defaults to `human`
        /// when stderr is a terminal and `off` otherwise.
        #[arg(long)]
        progress: Option<String>,
    },

    /// List saved analyses, most recent first.
    History,

    /// Print the report of one analysis.
    Show {
        /// Analysis id.
        id: String,
    },

    /// Delete one analysis.
    Delete {
        /// Analysis id.
        id: String,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve {
        /// Keep records in memory instead of the configured database.
        #[arg(long)]
        memory: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.command {
        Commands::Serve { .. } => Level::INFO,
        _ => Level::WARN,
    };
    telemetry::init_tracing(cli.log_json, level);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Analyze { url, progress } => {
            let mode = match progress.as_deref() {
                None => ProgressMode::default_for_tty(),
                Some(s) => match ProgressMode::parse(s) {
                    Some(m) => m,
                    None => bail!("Unknown progress mode: '{}'. Use human, json, or off.", s),
                },
            };
            let store = Arc::new(SqliteStore::open(&cfg).await?);
            let pipeline = Pipeline::from_config(&cfg, store.clone())?;
            let sink = mode.sink();
            let outcome = pipeline.run(&url, sink.as_ref()).await;
            store.close().await;
            let record = outcome?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::History => {
            let store = SqliteStore::open(&cfg).await?;
            let records = store.list().await?;
            store.close().await;
            if records.is_empty() {
                println!("No analyses yet.");
            } else {
                println!("{:<38} {:<22} SOURCE", "ID", "CREATED");
                for r in &records {
                    println!(
                        "{:<38} {:<22} {}",
                        r.id,
                        r.created_at.format("%Y-%m-%d %H:%M:%S"),
                        r.source_url
                    );
                }
            }
        }
        Commands::Show { id } => {
            let store = SqliteStore::open(&cfg).await?;
            let record = store.get(&id).await?;
            store.close().await;
            match record {
                Some(r) => println!("{}", r.generated_text),
                None => bail!("Analysis not found: {}", id),
            }
        }
        Commands::Delete { id } => {
            let store = SqliteStore::open(&cfg).await?;
            let removed = store.delete_by_id(&id).await?;
            store.close().await;
            if !removed {
                bail!("Analysis not found: {}", id);
            }
            println!("Deleted {}", id);
        }
        Commands::Serve { memory } => {
            server::run_server(&cfg, memory).await?;
        }
    }

    Ok(())
}
