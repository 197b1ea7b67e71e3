//! Static conversation corpus.
//!
//! The corpus is a fixed, ordered list of (input, output) pairs loaded once
//! from a JSON document at startup. Entry identity is positional: the vector
//! of corpus embeddings built by the matcher is index-parallel to the entries
//! here, so order must be preserved exactly as written in the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// One training pair: a canonical user utterance and its canned reply.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ConversationEntry {
    pub input: String,
    pub output: String,
}

/// On-disk corpus document: `{ "conversations": [ { "input": ..., "output": ... } ] }`.
#[derive(Debug, Deserialize)]
struct CorpusFile {
    conversations: Vec<ConversationEntry>,
}

/// Ordered, immutable set of conversation entries.
#[derive(Debug, Clone)]
pub struct Corpus {
    entries: Vec<ConversationEntry>,
}

impl Corpus {
    /// Load the corpus from a JSON file. The file must exist — an absent
    /// corpus is a deployment error, not an empty corpus.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read corpus file {}", path.display()))?;
        let file: CorpusFile = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse corpus JSON {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            entries = file.conversations.len(),
            "corpus loaded"
        );

        Ok(Self {
            entries: file.conversations,
        })
    }

    /// Build a corpus directly from entries (tests, embedded corpora).
    pub fn from_entries(entries: Vec<ConversationEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ConversationEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationEntry> {
        self.entries.iter()
    }

    /// All `input` utterances in index order — the texts the embedding
    /// matrix is built from.
    pub fn inputs(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.input.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_corpus_json() {
        let json = r#"{
            "conversations": [
                { "input": "こんにちは", "output": "こんにちは！何かお手伝いできることはありますか？" },
                { "input": "hello", "output": "hi there" }
            ]
        }"#;
        let file: CorpusFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.conversations.len(), 2);
        assert_eq!(file.conversations[1].input, "hello");
        assert_eq!(file.conversations[1].output, "hi there");
    }

    #[test]
    fn load_from_file_preserves_order() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"conversations": [
                {{"input": "a", "output": "first"}},
                {{"input": "b", "output": "second"}},
                {{"input": "c", "output": "third"}}
            ]}}"#
        )
        .unwrap();

        let corpus = Corpus::load(f.path()).unwrap();
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.get(0).unwrap().output, "first");
        assert_eq!(corpus.get(2).unwrap().output, "third");
        assert_eq!(corpus.inputs(), vec!["a", "b", "c"]);
    }

    #[test]
    fn load_missing_file_errors() {
        let result = Corpus::load("/nonexistent/corpus.json");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("failed to read corpus file"));
    }

    #[test]
    fn load_malformed_json_errors() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{{not json").unwrap();
        let result = Corpus::load(f.path());
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("failed to parse corpus JSON"));
    }

    #[test]
    fn empty_corpus_is_valid() {
        let corpus = Corpus::from_entries(vec![]);
        assert!(corpus.is_empty());
        assert_eq!(corpus.len(), 0);
        assert!(corpus.inputs().is_empty());
        assert!(corpus.get(0).is_none());
    }
}
