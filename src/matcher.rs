//! Similarity matcher — the retrieval core.
//!
//! [`Responder`] owns the corpus, the embedding provider, and the lazily
//! built corpus embedding matrix. The first query triggers one batch embed
//! of every corpus input; after that the matrix is shared read-only and each
//! query costs a single provider call plus a cosine scan.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::MatcherConfig;
use crate::corpus::Corpus;
use crate::embedding::EmbeddingProvider;

/// Reply used when no corpus entry clears the acceptance threshold.
pub const DEFAULT_FALLBACK: &str = "申し訳ありません。その質問にはお答えできません。";

/// Failures surfaced by the matcher. A low-confidence query is not a
/// failure — it resolves to the fallback reply.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The provider failed while embedding the corpus at initialization.
    #[error("failed to embed corpus: {0}")]
    CorpusEmbedding(anyhow::Error),

    /// The provider returned a different number of vectors than corpus entries.
    #[error("corpus has {corpus} entries but provider returned {vectors} vectors")]
    EmbeddingCountMismatch { corpus: usize, vectors: usize },

    /// The provider failed while embedding a live query.
    #[error("failed to embed query: {0}")]
    QueryEmbedding(anyhow::Error),
}

/// One scored corpus candidate, consumed within a single selection.
#[derive(Debug, Clone, Copy)]
struct Scored {
    similarity: f32,
    index: usize,
}

/// FAQ responder: maps one query string to one reply string.
pub struct Responder {
    corpus: Corpus,
    provider: Arc<dyn EmbeddingProvider>,
    threshold: f32,
    fallback: String,
    // Built exactly once per process. get_or_try_init serializes concurrent
    // first callers and does not cache failures, so a failed initialization
    // is retried on the next call.
    embeddings: OnceCell<Vec<Vec<f32>>>,
}

impl Responder {
    pub fn new(
        corpus: Corpus,
        provider: Arc<dyn EmbeddingProvider>,
        config: &MatcherConfig,
    ) -> Self {
        Self::with_policy(corpus, provider, config.threshold, config.fallback.clone())
    }

    pub fn with_policy(
        corpus: Corpus,
        provider: Arc<dyn EmbeddingProvider>,
        threshold: f32,
        fallback: String,
    ) -> Self {
        Self {
            corpus,
            provider,
            threshold,
            fallback,
            embeddings: OnceCell::new(),
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Guarantee the corpus embedding matrix exists, building it on first
    /// call with a single batch embed of every corpus input in index order.
    pub async fn ensure_ready(&self) -> Result<&Vec<Vec<f32>>, MatchError> {
        self.embeddings
            .get_or_try_init(|| async {
                let inputs: Vec<String> =
                    self.corpus.iter().map(|e| e.input.clone()).collect();
                let provider = Arc::clone(&self.provider);

                let vectors = tokio::task::spawn_blocking(move || {
                    let refs: Vec<&str> = inputs.iter().map(|s| s.as_str()).collect();
                    provider.embed_batch(&refs)
                })
                .await
                .map_err(|e| MatchError::CorpusEmbedding(anyhow::Error::new(e)))?
                .map_err(MatchError::CorpusEmbedding)?;

                if vectors.len() != self.corpus.len() {
                    return Err(MatchError::EmbeddingCountMismatch {
                        corpus: self.corpus.len(),
                        vectors: vectors.len(),
                    });
                }

                tracing::info!(entries = vectors.len(), "corpus embeddings ready");
                Ok(vectors)
            })
            .await
    }

    /// Answer a query: embed it, score it against the corpus, and return the
    /// best entry's output if its similarity strictly exceeds the threshold,
    /// the fallback reply otherwise.
    ///
    /// Provider failures propagate as errors — the fallback is reserved for
    /// the no-confident-match case.
    pub async fn respond(&self, query: &str) -> Result<String, MatchError> {
        // No candidates means no confident match, regardless of the query.
        if self.corpus.is_empty() {
            return Ok(self.fallback.clone());
        }

        let matrix = self.ensure_ready().await?;

        let owned = query.to_string();
        let provider = Arc::clone(&self.provider);
        let query_embedding = tokio::task::spawn_blocking(move || {
            provider.embed_batch(&[owned.as_str()])
        })
        .await
        .map_err(|e| MatchError::QueryEmbedding(anyhow::Error::new(e)))?
        .map_err(MatchError::QueryEmbedding)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            MatchError::QueryEmbedding(anyhow::anyhow!("provider returned no vector for query"))
        })?;

        match best_match(&query_embedding, matrix) {
            Some(best) if best.similarity > self.threshold => {
                tracing::debug!(
                    index = best.index,
                    similarity = best.similarity,
                    "confident match"
                );
                let entry = self.corpus.get(best.index).expect("scored index in corpus range");
                Ok(entry.output.clone())
            }
            best => {
                tracing::debug!(
                    similarity = best.map(|b| b.similarity),
                    threshold = self.threshold,
                    "no confident match, using fallback"
                );
                Ok(self.fallback.clone())
            }
        }
    }
}

/// Pick the highest-similarity candidate. Ties keep the lowest index, so
/// selection is deterministic for a fixed corpus and query.
fn best_match(query: &[f32], matrix: &[Vec<f32>]) -> Option<Scored> {
    let mut best: Option<Scored> = None;
    for (index, vector) in matrix.iter().enumerate() {
        let similarity = cosine_similarity(query, vector);
        match best {
            Some(b) if similarity <= b.similarity => {}
            _ => best = Some(Scored { similarity, index }),
        }
    }
    best
}

/// Cosine similarity `q·v / (‖q‖‖v‖)`, in `[-1, 1]` for well-formed
/// embeddings. Zero-norm inputs score 0.0 rather than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}
