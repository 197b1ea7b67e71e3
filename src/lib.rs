//! kotae (答え) — a minimal FAQ-style chat responder.
//!
//! Given a user utterance, kotae returns the canned reply whose paired
//! training utterance is semantically closest, or a polite refusal when no
//! candidate is close enough. The corpus of (input, output) pairs is fixed at
//! startup; its embeddings are computed once, lazily, on the first query and
//! shared read-only across all requests afterwards.
//!
//! # Architecture
//!
//! - **Corpus**: (input, output) pairs loaded from a JSON file, identity by index
//! - **Embeddings**: local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions)
//! - **Matching**: cosine similarity, top-1 selection, acceptance threshold
//! - **Transport**: HTTP (`POST /api/prompt`) or one-shot CLI (`kotae ask`)
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`corpus`] — The static conversation corpus and its JSON format
//! - [`embedding`] — Text-to-vector embedding pipeline via ONNX Runtime
//! - [`matcher`] — Core retrieval: lazy corpus embedding, scoring, threshold policy
//! - [`server`] — HTTP boundary: request validation and response envelopes

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod matcher;
pub mod server;
