mod cli;
mod config;
mod corpus;
mod embedding;
mod matcher;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kotae", version, about = "FAQ-style chat responder with local embeddings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Answer a single query from the terminal
    Ask {
        /// The question to answer
        query: String,
    },
    /// Inspect the conversation corpus
    Corpus {
        #[command(subcommand)]
        action: CorpusAction,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum CorpusAction {
    /// Validate the corpus file and print a report
    Check,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.kotae/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = config::KotaeConfig::load()?;

    // Initialize tracing with the configured log level, to stderr so the
    // `ask` command's stdout stays clean.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            server::serve(config).await?;
        }
        Command::Ask { query } => {
            cli::ask::ask(&config, &query).await?;
        }
        Command::Corpus { action } => match action {
            CorpusAction::Check => {
                cli::corpus_check::corpus_check(&config)?;
            }
        },
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
    }

    Ok(())
}
