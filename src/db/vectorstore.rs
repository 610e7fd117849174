//! Vector store abstraction for document chunks.
//!
//! The document index talks to a [`VectorStore`]; the in-process
//! [`InMemoryVectorStore`] is the backend used by default.

use crate::types::{AppError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One embedded chunk of a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// `{document_id}#{chunk_index}`
    pub id: String,
    pub document_id: String,
    /// Where the document came from, e.g. a file path; the document id when unnamed
    pub locator: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl StoredChunk {
    pub fn new(document_id: &str, chunk_index: usize, text: String, embedding: Vec<f32>) -> Self {
        Self {
            id: format!("{}#{}", document_id, chunk_index),
            document_id: document_id.to_string(),
            locator: document_id.to_string(),
            chunk_index,
            text,
            embedding,
        }
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = locator.into();
        self
    }
}

/// A chunk returned from a similarity search (embedding omitted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub document_id: String,
    pub locator: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace chunks; returns how many were written.
    async fn upsert(&self, chunks: &[StoredChunk]) -> Result<usize>;

    /// Chunks with cosine similarity at or above `threshold`, best first.
    async fn search(&self, embedding: &[f32], limit: usize, threshold: f32) -> Result<Vec<ScoredChunk>>;
}

/// Process-local vector store. Uses cosine similarity for comparisons.
pub struct InMemoryVectorStore {
    dimensions: usize,
    chunks: Arc<RwLock<HashMap<String, StoredChunk>>>,
}

impl InMemoryVectorStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            chunks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Calculate cosine similarity between two vectors.
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, chunks: &[StoredChunk]) -> Result<usize> {
        for chunk in chunks {
            if chunk.embedding.len() != self.dimensions {
                return Err(AppError::InvalidInput(format!(
                    "Chunk '{}' has {} dimensions, expected {}",
                    chunk.id,
                    chunk.embedding.len(),
                    self.dimensions
                )));
            }
        }

        let mut stored = self.chunks.write();
        for chunk in chunks {
            stored.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(chunks.len())
    }

    async fn search(&self, embedding: &[f32], limit: usize, threshold: f32) -> Result<Vec<ScoredChunk>> {
        let stored = self.chunks.read();

        let mut results: Vec<ScoredChunk> = stored
            .values()
            .filter_map(|chunk| {
                let score = Self::cosine_similarity(embedding, &chunk.embedding);
                (score >= threshold).then(|| ScoredChunk {
                    id: chunk.id.clone(),
                    document_id: chunk.document_id.clone(),
                    locator: chunk.locator.clone(),
                    chunk_index: chunk.chunk_index,
                    text: chunk.text.clone(),
                    score,
                })
            })
            .collect();

        // Score descending, id as tie-break so equal scores come back in a stable order
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(limit);

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: &str, idx: usize, embedding: Vec<f32>) -> StoredChunk {
        StoredChunk::new(doc, idx, format!("{} chunk {}", doc, idx), embedding)
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((InMemoryVectorStore::cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(InMemoryVectorStore::cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(InMemoryVectorStore::cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(InMemoryVectorStore::cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_search_orders_and_filters() {
        let store = InMemoryVectorStore::new(2);
        store
            .upsert(&[
                chunk("a", 0, vec![1.0, 0.0]),
                chunk("b", 0, vec![0.7, 0.7]),
                chunk("c", 0, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 10, 0.1).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document_id, "a");
        assert_eq!(results[1].document_id, "b");

        let limited = store.search(&[1.0, 0.0], 1, 0.0).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let store = InMemoryVectorStore::new(3);
        let err = store.upsert(&[chunk("a", 0, vec![1.0])]).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(store.search(&[1.0, 0.0, 0.0], 10, 0.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_chunk_id() {
        let store = InMemoryVectorStore::new(2);
        store.upsert(&[chunk("a", 0, vec![1.0, 0.0]), chunk("a", 1, vec![0.0, 1.0])]).await.unwrap();
        store
            .upsert(&[chunk("a", 0, vec![0.0, 1.0]).with_locator("notes/a.md")])
            .await
            .unwrap();

        let results = store.search(&[0.0, 1.0], 10, 0.9).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|r| r.chunk_index == 0 && r.locator == "notes/a.md"));
        assert!(results.iter().any(|r| r.chunk_index == 1 && r.locator == "a"));
    }
}
