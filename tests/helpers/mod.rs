#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use kotae::corpus::ConversationEntry;
use kotae::embedding::EmbeddingProvider;

/// Embedding dimension used by the stub vector space.
pub const STUB_DIM: usize = 4;

/// Deterministic embedding provider for tests: fixed vectors for fixed
/// strings, a default vector for everything else, and knobs to inject the
/// failure modes the matcher must handle.
pub struct StubProvider {
    vectors: HashMap<String, Vec<f32>>,
    default: Vec<f32>,
    /// Size of every batch passed to `embed_batch`, in call order.
    pub batch_sizes: Mutex<Vec<usize>>,
    fail_remaining: AtomicUsize,
    fail_single: bool,
    drop_last: bool,
    delay_ms: u64,
}

impl StubProvider {
    pub fn new() -> Self {
        Self {
            vectors: HashMap::new(),
            default: unit(STUB_DIM - 1),
            batch_sizes: Mutex::new(Vec::new()),
            fail_remaining: AtomicUsize::new(0),
            fail_single: false,
            drop_last: false,
            delay_ms: 0,
        }
    }

    /// Map a text to a fixed vector.
    pub fn map(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Fail the next `n` batch calls, then recover.
    pub fn fail_first(self, n: usize) -> Self {
        self.fail_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Fail single-element batches only (query embeds), leaving the corpus
    /// batch working.
    pub fn fail_queries(mut self) -> Self {
        self.fail_single = true;
        self
    }

    /// Return one vector fewer than requested for multi-element batches.
    pub fn drop_last_vector(mut self) -> Self {
        self.drop_last = true;
        self
    }

    /// Sleep inside multi-element batch calls, widening the window in which
    /// concurrent first callers could race initialization.
    pub fn slow_corpus_embed(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Total number of `embed_batch` invocations so far.
    pub fn total_calls(&self) -> usize {
        self.batch_sizes.lock().unwrap().len()
    }

    /// Number of `embed_batch` invocations with the given batch size.
    pub fn calls_with_size(&self, size: usize) -> usize {
        self.batch_sizes
            .lock()
            .unwrap()
            .iter()
            .filter(|&&s| s == size)
            .count()
    }
}

impl EmbeddingProvider for StubProvider {
    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.batch_sizes.lock().unwrap().push(texts.len());

        if self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            anyhow::bail!("stub provider unavailable");
        }

        if self.fail_single && texts.len() == 1 {
            anyhow::bail!("stub provider rejects query embeds");
        }

        if self.delay_ms > 0 && texts.len() > 1 {
            std::thread::sleep(std::time::Duration::from_millis(self.delay_ms));
        }

        let mut out: Vec<Vec<f32>> = texts
            .iter()
            .map(|t| self.vectors.get(*t).cloned().unwrap_or_else(|| self.default.clone()))
            .collect();

        if self.drop_last && out.len() > 1 {
            out.pop();
        }

        Ok(out)
    }

    fn dimensions(&self) -> usize {
        STUB_DIM
    }
}

/// Unit vector along dimension `i` of the stub space.
pub fn unit(i: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; STUB_DIM];
    v[i % STUB_DIM] = 1.0;
    v
}

pub fn entry(input: &str, output: &str) -> ConversationEntry {
    ConversationEntry {
        input: input.to_string(),
        output: output.to_string(),
    }
}
