//! # pdfchat CLI
//!
//! ## Usage
//!
//! ```bash
//! pdfchat --config ./config/pdfchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdfchat init` | Create the SQLite database and run schema migrations |
//! | `pdfchat index <paths...>` | Build (or reuse) the collection for a set of files |
//! | `pdfchat ask "<question>" --files <paths...>` | Answer one question |
//! | `pdfchat chat <paths...>` | Interactive question loop |
//! | `pdfchat collections` | List stored collections |
//! | `pdfchat clear <paths...>` | Delete the collection for a set of files |
//! | `pdfchat serve` | Start the HTTP sessions API |
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pdfchat::{chat, collections, config, migrate, server};

#[derive(Parser)]
#[command(
    name = "pdfchat",
    about = "pdfchat: ask questions about your PDFs",
    version,
    long_about = "pdfchat extracts and embeds the text of a set of documents into a reusable \
    collection, then answers questions with multi-query retrieval and a language model that is \
    told to answer only from the retrieved context."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/pdfchat.toml`. A missing file means all defaults.
    #[arg(long, global = true, default_value = "./config/pdfchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Extract, chunk, and embed documents into their collection.
    ///
    /// Directories are walked and filtered by `[files]` globs. Indexing the
    /// same files again reuses the existing collection.
    Index {
        /// PDF or text files, or directories containing them.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Answer a single question about a set of files.
    Ask {
        /// The question.
        question: String,

        /// Files or directories to answer from.
        #[arg(long, required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },

    /// Chat about a set of files interactively.
    ///
    /// `/history` prints the conversation, `/clear` deletes the knowledge
    /// base and exits, an empty line or EOF quits.
    Chat {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List stored collections with chunk counts and models.
    Collections,

    /// Delete the collection built from a set of files.
    Clear {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Start the HTTP sessions API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index { paths } => {
            chat::run_index(&cfg, &paths).await?;
        }
        Commands::Ask { question, files } => {
            chat::run_ask(&cfg, &question, &files).await?;
        }
        Commands::Chat { paths } => {
            chat::run_chat(&cfg, &paths).await?;
        }
        Commands::Collections => {
            collections::run_collections(&cfg).await?;
        }
        Commands::Clear { paths } => {
            collections::run_clear(&cfg, &paths).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
