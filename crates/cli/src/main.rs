//! Maintenance/debug CLI for the quill knowledge base.
//!
//! The editor shell talks to the gateway in-process; this binary exposes the
//! same entry points for scripting and troubleshooting an index from a
//! terminal.

use clap::{Parser, Subcommand};
use quill_embeddings::{Embedder, MiniLmEmbedder};
use quill_gateway::KbGateway;
use quill_kb_index::EnsureOptions;
use quill_retrieval::{EmbeddingSearchOptions, PassageSearchOptions, Router};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "quill", version, about = "Knowledge-base tools for the quill editor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build or refresh the embedding index for a directory
    Index {
        directory: PathBuf,
        #[arg(long, default_value_t = 2000)]
        max_files: usize,
    },
    /// Semantic search over the directory's index
    Search {
        directory: PathBuf,
        query: String,
        #[arg(long, default_value_t = 6)]
        top_k: usize,
        #[arg(long, default_value_t = 600)]
        max_chars: usize,
    },
    /// Keyword search, bypassing the embedding index
    Keyword {
        directory: PathBuf,
        query: String,
        #[arg(long, default_value_t = 6)]
        max_passages: usize,
        #[arg(long, default_value_t = 2000)]
        max_files: usize,
        #[arg(long, default_value_t = 600)]
        max_chars: usize,
    },
    /// Decide which retrieval sources an instruction should consult
    Route {
        instruction: String,
        /// Pretend no retrieval directory is configured
        #[arg(long)]
        no_local_dir: bool,
    },
    /// List the directory's articles, or substring-search them
    Articles {
        directory: PathBuf,
        #[arg(long)]
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let embedder: Arc<dyn Embedder> = Arc::new(MiniLmEmbedder::new());
    let gateway = KbGateway::new(embedder);

    match cli.command {
        Command::Index {
            directory,
            max_files,
        } => {
            let response = gateway
                .build_index(&directory, &EnsureOptions { max_files })
                .await;
            print_json(&response)?;
        }
        Command::Search {
            directory,
            query,
            top_k,
            max_chars,
        } => {
            let options = EmbeddingSearchOptions {
                top_k,
                max_chars_per_passage: max_chars,
                ..EmbeddingSearchOptions::default()
            };
            let passages = gateway.search_embeddings(&directory, &query, &options).await;
            print_json(&passages)?;
        }
        Command::Keyword {
            directory,
            query,
            max_passages,
            max_files,
            max_chars,
        } => {
            let options = PassageSearchOptions {
                max_files,
                max_passages,
                max_chars_per_passage: max_chars,
                include_file_meta: true,
            };
            let passages = gateway.search_passages(&directory, &query, &options).await;
            print_json(&passages)?;
        }
        Command::Route {
            instruction,
            no_local_dir,
        } => {
            let router = Router::new(!no_local_dir);
            let route = router.decide(&instruction).await;
            print_json(&route)?;
        }
        Command::Articles { directory, query } => {
            let articles = match query {
                Some(query) => gateway.search_articles(&directory, &query).await,
                None => gateway.list_articles(&directory).await,
            };
            print_json(&articles)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
