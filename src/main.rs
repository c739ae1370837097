//! # Study Harness CLI (`study`)
//!
//! Builds the document index, asks the assistants one-off questions, and
//! starts the HTTP server used by the web client.
//!
//! ## Usage
//!
//! ```bash
//! study --config ./config/study.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `study index` | Load, chunk and embed the document directory |
//! | `study search "<query>"` | Show the chunks closest to a query |
//! | `study chat "<message>"` | Ask the general, Socratic or plain assistant |
//! | `study quiz "<topic>"` | Generate a ten-question quiz |
//! | `study course "<topic>"` | Generate a course outline |
//! | `study serve` | Start the HTTP server |

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use study_harness::assistant::Assistant;
use study_harness::config::{self, Config};
use study_harness::embedding::{create_embedder, Embedder};
use study_harness::error::PipelineError;
use study_harness::index::IndexHandle;
use study_harness::ingest;
use study_harness::llm::OpenAiCompatibleChat;
use study_harness::logging;
use study_harness::prompt::{CourseParams, PromptPolicy};
use study_harness::retriever::Retriever;
use study_harness::server;

/// Study Harness: a retrieval-augmented study assistant over your course
/// material.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "study",
    about = "Study Harness — retrieval-augmented chat, Socratic tutoring and quizzes over your documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/study.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the document index.
    ///
    /// Loads every supported file under `[docs].dir`, splits it into
    /// overlapping chunks, embeds them, and writes the index to
    /// `[index].path`.
    Index,

    /// Show the chunks most similar to a query.
    Search {
        query: String,

        /// Number of chunks to return (defaults to `[retrieval].k`).
        #[arg(short, long)]
        k: Option<usize>,

        /// Use the index saved by the last `study index` instead of rebuilding.
        #[arg(long)]
        cached: bool,
    },

    /// Ask one question.
    Chat {
        message: String,

        #[arg(long, value_enum, default_value_t = ChatPolicy::General)]
        policy: ChatPolicy,
    },

    /// Generate a multiple-choice quiz and print it as an HTML form.
    Quiz { topic: String },

    /// Generate a course outline and print it as HTML.
    Course {
        topic: String,

        #[arg(long)]
        level: Option<String>,

        #[arg(long)]
        audience: Option<String>,

        #[arg(long)]
        duration: Option<String>,

        #[arg(long)]
        depth: Option<String>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Clone, Copy, ValueEnum)]
enum ChatPolicy {
    General,
    Socratic,
    Plain,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Index => {
            let embedder = create_embedder(&cfg.embedding)?;
            let (built, stats) = ingest::rebuild_index(&cfg, embedder.as_ref()).await?;
            println!("index {}", cfg.docs.dir.display());
            println!("  documents loaded: {}", stats.documents);
            println!("  chunks: {}", stats.chunks);
            match built {
                Some(index) => {
                    println!("  chunks indexed: {}", stats.indexed);
                    println!("  model: {} ({} dims)", index.model, index.dims);
                    println!("  saved to: {}", cfg.index.path.display());
                    println!("ok");
                }
                None => println!("  no index built"),
            }
        }
        Commands::Search { query, k, cached } => {
            let embedder = create_embedder(&cfg.embedding)?;
            let retriever = open_retriever(&cfg, embedder, cached).await?;
            let k = k.unwrap_or(cfg.retrieval.k);
            let results = match retriever.search(&query, k).await {
                Ok(results) => results,
                Err(PipelineError::IndexUnavailable) => {
                    println!("No index available. Add documents and run `study index`.");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            if results.is_empty() {
                println!("No results.");
            }
            for (i, scored) in results.iter().enumerate() {
                println!(
                    "{}. {} @{} (distance {:.4})",
                    i + 1,
                    scored.chunk.source_path,
                    scored.chunk.offset,
                    scored.distance
                );
                println!("   {}", snippet(&scored.chunk.text, 160));
            }
        }
        Commands::Chat { message, policy } => {
            let assistant = build_assistant(&cfg, true).await?;
            let policy = match policy {
                ChatPolicy::General => PromptPolicy::General,
                ChatPolicy::Socratic => PromptPolicy::Socratic,
                ChatPolicy::Plain => PromptPolicy::Plain,
            };
            let reply = assistant.reply(policy, &message).await?;
            println!("{}", reply);
        }
        Commands::Quiz { topic } => {
            let assistant = build_assistant(&cfg, true).await?;
            println!("{}", assistant.quiz(&topic).await?);
        }
        Commands::Course {
            topic,
            level,
            audience,
            duration,
            depth,
        } => {
            let defaults = CourseParams::default();
            let params = CourseParams {
                level: level.unwrap_or(defaults.level),
                audience: audience.unwrap_or(defaults.audience),
                duration: duration.unwrap_or(defaults.duration),
                depth: depth.unwrap_or(defaults.depth),
            };
            let assistant = build_assistant(&cfg, true).await?;
            println!("{}", assistant.course(&topic, params).await?);
        }
        Commands::Serve => {
            let assistant = build_assistant(&cfg, false).await?;
            server::run_server(&cfg, Arc::new(assistant)).await?;
        }
    }

    Ok(())
}

/// A retriever over either the cached index or a fresh rebuild.
async fn open_retriever(
    cfg: &Config,
    embedder: Arc<dyn Embedder>,
    cached: bool,
) -> Result<Retriever> {
    let index = if cached {
        ingest::load_cached(cfg, embedder.as_ref())
    } else {
        ingest::rebuild_index(cfg, embedder.as_ref()).await?.0
    };
    Ok(Retriever::new(
        embedder,
        IndexHandle::new(index),
        cfg.retrieval.k,
    ))
}

/// Initialize the embedder and index once, then wire up the chat client.
///
/// With `prefer_cached`, a saved index from the same model is reused and the
/// directory is only re-indexed when there is none.
async fn build_assistant(cfg: &Config, prefer_cached: bool) -> Result<Assistant> {
    let embedder = create_embedder(&cfg.embedding)?;
    let cached = if prefer_cached {
        ingest::load_cached(cfg, embedder.as_ref())
    } else {
        None
    };
    let index = match cached {
        Some(index) => Some(index),
        None => ingest::rebuild_index(cfg, embedder.as_ref()).await?.0,
    };
    let retriever = Retriever::new(embedder, IndexHandle::new(index), cfg.retrieval.k);

    let chat = OpenAiCompatibleChat::from_config(&cfg.chat)
        .context("Failed to create chat client")?;
    Ok(Assistant::new(
        retriever,
        Arc::new(chat),
        Duration::from_secs(cfg.chat.timeout_secs),
    )
    .with_sampling(cfg.chat.policies.clone()))
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
