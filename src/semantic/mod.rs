//! Semantic retrieval over highlights.
//!
//! This module computes an embedding for every highlight and answers
//! similarity queries with an exact in-memory vector index.
//!
//! # Architecture
//!
//! - `embeddings`: the `Embedder` capability and the fastembed-backed model
//! - `hashing`: deterministic bag-of-words embedder needing no model download
//! - `preprocess`: text preprocessing for embedding input
//! - `index`: in-memory vector index with cosine similarity search
//! - `engine`: free-text search, book insights and cross-book connections

pub mod embeddings;
mod engine;
mod hashing;
mod index;
mod preprocess;

pub use embeddings::{Embedder, EmbeddingModel, DEFAULT_BATCH_SIZE};
pub use engine::{
    BookInsights, Connection, EngineError, QueryEngine, QuerySettings, ScoredHighlight,
    TemporalDistribution, DEFAULT_REPRESENTATIVE_COUNT,
};
pub use hashing::HashEmbedder;
pub use index::{DEFAULT_PAIRWISE_WINDOW, DEFAULT_TOP_K};

/// Default embedding model name
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Model name selecting [`HashEmbedder`] instead of a downloaded model
pub const HASH_MODEL: &str = "hash";

/// Default similarity threshold for cross-book connections
pub const DEFAULT_CONNECTION_THRESHOLD: f32 = 0.7;
