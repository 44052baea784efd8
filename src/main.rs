//! # Workout Knowledge Base CLI (`wkb`)
//!
//! The `wkb` binary drives the knowledge base lifecycle and answers
//! questions from the command line.
//!
//! ## Usage
//!
//! ```bash
//! wkb --config ./config/wkb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wkb init` | Load the persisted knowledge base, or crawl and build it |
//! | `wkb ask "<question>"` | Answer a question from the knowledge base |
//! | `wkb status` | Show readiness, index info, and configuration |
//! | `wkb rebuild [urls...]` | Delete and rebuild the index from scratch |
//! | `wkb add <urls...>` | Add sources and rebuild with them included |
//! | `wkb serve` | Start the question-answering HTTP API |
//!
//! The embedding and chat backends require `OPENAI_API_KEY` in the
//! environment.

mod answer;
mod config;
mod embedding;
mod error;
mod fetch;
mod filter;
mod index;
mod kb;
mod llm;
mod models;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::kb::KnowledgeBase;
use crate::models::QuestionKind;

/// Workout Knowledge Base — crawl fitness articles into a vector index and
/// answer questions over it.
#[derive(Parser)]
#[command(
    name = "wkb",
    about = "Workout Knowledge Base — retrieval-augmented fitness question answering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Missing file falls back to built-in defaults (crawl list, store
    /// location, model settings).
    #[arg(long, global = true, default_value = "./config/wkb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the knowledge base.
    ///
    /// Loads the persisted store when both artifacts are present; otherwise
    /// crawls the configured source list, filters for fitness relevance,
    /// and builds a fresh index. Idempotent across runs.
    Init,

    /// Answer a question from the knowledge base.
    ///
    /// Requires a previously built store (`wkb init`); querying never
    /// triggers a build.
    Ask {
        /// The question text.
        question: String,

        /// Question type: `general`, `workout`, `form`, or `nutrition`.
        /// Each type tunes retrieval for its use case.
        #[arg(long = "type", default_value = "general")]
        kind: QuestionKind,

        /// Print the retrieval context handed to the model.
        #[arg(long)]
        show_context: bool,
    },

    /// Show readiness, index info, and configuration.
    Status,

    /// Delete the current index and rebuild from scratch.
    ///
    /// With URLs given, rebuilds from them instead of the configured list.
    Rebuild {
        /// Source URLs to build from (defaults to the configured list).
        urls: Vec<String>,
    },

    /// Add source URLs and rebuild the knowledge base with them included.
    ///
    /// URLs whose content fails the relevance filter are skipped; when
    /// nothing passes, the knowledge base is left unchanged.
    Add {
        /// Source URLs to add.
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Start the question-answering HTTP API.
    ///
    /// Initializes the knowledge base first, then binds to the address in
    /// `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("workout_kb=info,wkb=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let kb = KnowledgeBase::new(cfg)?;
            let outcome = kb.initialize().await;
            println!("{}", outcome.message);
            if !outcome.success {
                anyhow::bail!("initialization failed");
            }
        }
        Commands::Ask {
            question,
            kind,
            show_context,
        } => {
            let kb = KnowledgeBase::new(cfg)?;
            if !kb.load_existing().await? {
                anyhow::bail!("no knowledge base found; run `wkb init` first");
            }

            let response = kb.ask_typed(kind, &question).await?;

            println!("{}", response.answer);
            if !response.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &response.sources {
                    match source.relevance_score {
                        Some(score) => {
                            println!("  [{:.2}] {} — {}", score, source.title, source.url)
                        }
                        None => println!("  {} — {}", source.title, source.url),
                    }
                }
            }
            if show_context {
                println!();
                println!("Context:");
                println!("{}", response.context);
            }
        }
        Commands::Status => {
            let kb = KnowledgeBase::new(cfg)?;
            kb.load_existing().await?;
            let status = kb.status().await;

            println!("ready: {}", status.is_ready);
            println!("records: {}", status.index_info.record_count);
            println!("store: {}", status.index_info.store_dir);
            println!("sources: {}", kb.current_sources().len());
        }
        Commands::Rebuild { urls } => {
            let kb = KnowledgeBase::new(cfg)?;
            let custom = if urls.is_empty() { None } else { Some(urls) };
            let accepted = kb.rebuild(custom).await?;
            println!("knowledge base rebuilt from {} relevant articles", accepted);
        }
        Commands::Add { urls } => {
            let kb = KnowledgeBase::new(cfg)?;
            let accepted = kb.add_sources(&urls).await?;
            if accepted == 0 {
                println!("no new relevant fitness content found; knowledge base unchanged");
            } else {
                println!("added {} relevant articles to the knowledge base", accepted);
            }
        }
        Commands::Serve => {
            let kb = Arc::new(KnowledgeBase::new(cfg.clone())?);
            let outcome = kb.initialize().await;
            if !outcome.success {
                anyhow::bail!("initialization failed: {}", outcome.message);
            }
            server::run_server(&cfg, kb).await?;
        }
    }

    Ok(())
}
