//! Document retrieval for the researcher.
//!
//! Ingestion chunks each document into overlapping word windows, embeds the
//! chunks and stores them in a [`VectorStore`](crate::db::VectorStore).
//! Queries embed the raw query text and return the nearest chunks.
//!
//! - [`chunker`](crate::rag::chunker) - word-window chunking
//! - [`embeddings`](crate::rag::embeddings) - feature-hashed and fastembed embedders
//! - [`index`](crate::rag::index) - the [`DocumentIndex`] tying them together

pub mod chunker;
pub mod embeddings;
pub mod index;

pub use chunker::TextChunker;
pub use embeddings::{Embedder, HashEmbedder};
pub use index::{DocumentIndex, IngestSummary, RetrievedChunk};
