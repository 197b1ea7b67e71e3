//! CLI `ask` command — answer a single query from the terminal.

use anyhow::Result;
use std::sync::Arc;

use crate::config::KotaeConfig;
use crate::corpus::Corpus;
use crate::matcher::Responder;

/// Load the corpus, answer one query, and print the reply.
pub async fn ask(config: &KotaeConfig, query: &str) -> Result<()> {
    let corpus = Corpus::load(config.resolved_corpus_path())?;
    let provider: Arc<dyn crate::embedding::EmbeddingProvider> =
        Arc::from(crate::embedding::create_provider(&config.embedding)?);

    let responder = Responder::new(corpus, provider, &config.matcher);
    let reply = responder.respond(query).await?;

    println!("{reply}");
    Ok(())
}
