use crate::db::vectorstore::{InMemoryVectorStore, StoredChunk, VectorStore};
use crate::rag::chunker::TextChunker;
use crate::rag::embeddings::{Embedder, HashEmbedder};
use crate::types::{AppError, Result};
use crate::utils::config::{EmbedderKind, RagConfig};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a `load_documents` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub documents: usize,
    pub chunks: usize,
    pub failed: usize,
}

/// A chunk matched by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub document_id: String,
    /// The document's name when loaded with one, otherwise its id
    pub locator: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

/// Chunked, embedded document collection answering similarity queries.
///
/// Shared read-only between runs; ingestion goes through `&self` so an
/// `Arc<DocumentIndex>` can be loaded while the orchestrator holds it.
pub struct DocumentIndex {
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    min_similarity: f32,
    next_document: AtomicUsize,
    chunk_count: AtomicUsize,
}

impl DocumentIndex {
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        min_similarity: f32,
    ) -> Self {
        Self {
            chunker,
            embedder,
            store,
            min_similarity,
            next_document: AtomicUsize::new(0),
            chunk_count: AtomicUsize::new(0),
        }
    }

    /// Build an in-memory index from the `[rag]` section.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = match config.embedder {
            EmbedderKind::Hash => Arc::new(HashEmbedder::new(config.embedding_dimensions)),
            #[cfg(feature = "local-embeddings")]
            EmbedderKind::FastEmbed => Arc::new(crate::rag::embeddings::FastEmbedder::new()?),
            #[cfg(not(feature = "local-embeddings"))]
            EmbedderKind::FastEmbed => {
                return Err(AppError::Configuration(
                    "fastembed embeddings require the 'local-embeddings' feature".to_string(),
                ))
            }
        };
        let store = Arc::new(InMemoryVectorStore::new(embedder.dimensions()));

        Ok(Self::new(
            TextChunker::new(config.chunk_size, config.chunk_overlap),
            embedder,
            store,
            config.min_similarity,
        ))
    }

    /// In-memory index with the deterministic hash embedder, ignoring
    /// `config.embedder`.
    pub fn hashed(config: &RagConfig) -> Self {
        let embedder = Arc::new(HashEmbedder::new(config.embedding_dimensions));
        let store = Arc::new(InMemoryVectorStore::new(embedder.dimensions()));
        Self::new(
            TextChunker::new(config.chunk_size, config.chunk_overlap),
            embedder,
            store,
            config.min_similarity,
        )
    }

    /// Whether any chunk has been ingested.
    pub fn is_loaded(&self) -> bool {
        self.chunk_count.load(Ordering::SeqCst) > 0
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count.load(Ordering::SeqCst)
    }

    /// Chunk, embed and store each text as its own document.
    ///
    /// Documents that fail to embed are skipped and counted. Fails with
    /// `Ingest` when nothing could be ingested.
    pub async fn load_documents(&self, texts: &[String]) -> Result<IngestSummary> {
        let documents: Vec<(Option<&str>, &str)> = texts.iter().map(|t| (None, t.as_str())).collect();
        self.ingest(&documents).await
    }

    /// Like [`load_documents`](Self::load_documents) with a name per document,
    /// such as its file path. The name becomes the locator of every chunk.
    pub async fn load_named_documents(&self, documents: &[(String, String)]) -> Result<IngestSummary> {
        let documents: Vec<(Option<&str>, &str)> = documents
            .iter()
            .map(|(name, text)| (Some(name.as_str()), text.as_str()))
            .collect();
        self.ingest(&documents).await
    }

    async fn ingest(&self, documents: &[(Option<&str>, &str)]) -> Result<IngestSummary> {
        if documents.is_empty() {
            return Err(AppError::Ingest("no documents supplied".to_string()));
        }

        let mut summary = IngestSummary {
            documents: 0,
            chunks: 0,
            failed: 0,
        };
        let mut last_error = None;

        for &(name, text) in documents {
            let document_id = format!("doc_{}", self.next_document.fetch_add(1, Ordering::SeqCst));
            let locator = name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(document_id.as_str())
                .to_string();
            match self.ingest_one(&document_id, &locator, text).await {
                Ok(chunks) => {
                    summary.documents += 1;
                    summary.chunks += chunks;
                }
                Err(e) => {
                    warn!(document_id = %document_id, %locator, error = %e, "Failed to ingest document");
                    summary.failed += 1;
                    last_error = Some(e);
                }
            }
        }

        if summary.documents == 0 {
            let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
            return Err(AppError::Ingest(format!(
                "all {} documents failed to ingest: {}",
                summary.failed, reason
            )));
        }

        info!(
            documents = summary.documents,
            chunks = summary.chunks,
            failed = summary.failed,
            "Documents ingested"
        );
        Ok(summary)
    }

    async fn ingest_one(&self, document_id: &str, locator: &str, text: &str) -> Result<usize> {
        let pieces = self.chunker.chunk(text);
        if pieces.is_empty() {
            return Err(AppError::Ingest("document is empty".to_string()));
        }

        let embeddings = self.embedder.embed(&pieces)?;
        if embeddings.len() != pieces.len() {
            return Err(AppError::Ingest(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                pieces.len()
            )));
        }

        let chunks: Vec<StoredChunk> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| {
                StoredChunk::new(document_id, i, text, embedding).with_locator(locator)
            })
            .collect();

        let written = self.store.upsert(&chunks).await?;
        self.chunk_count.fetch_add(written, Ordering::SeqCst);
        Ok(written)
    }

    /// Top `k` chunks for `text`, best first.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if !self.is_loaded() {
            return Err(AppError::SourceUnavailable {
                source_name: "document_index".to_string(),
                message: "no documents loaded".to_string(),
            });
        }

        let embedding = self.embedder.embed_one(text)?;
        let results = self.store.search(&embedding, k, self.min_similarity).await?;

        Ok(results
            .into_iter()
            .map(|r| RetrievedChunk {
                document_id: r.document_id,
                locator: r.locator,
                chunk_index: r.chunk_index,
                text: r.text,
                score: r.score.clamp(0.0, 1.0),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> DocumentIndex {
        DocumentIndex::from_config(&RagConfig {
            chunk_size: 8,
            chunk_overlap: 2,
            ..RagConfig::default()
        })
        .unwrap()
    }

    struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(AppError::Internal("model missing".into()))
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    #[tokio::test]
    async fn test_load_and_query() {
        let index = index();
        assert!(!index.is_loaded());

        let summary = index
            .load_documents(&[
                "Rust guarantees memory safety through ownership and borrowing rules".to_string(),
                "The violin concerto was premiered in Vienna".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(summary.documents, 2);
        assert_eq!(summary.failed, 0);
        assert!(index.is_loaded());

        let results = index.query("memory safety ownership", 3).await.unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].document_id, "doc_0");
        assert_eq!(results[0].locator, "doc_0");
        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }

    #[tokio::test]
    async fn test_named_documents_keep_their_names() {
        let index = index();
        index
            .load_named_documents(&[
                ("notes/rust.md".to_string(), "Rust guarantees memory safety through ownership".to_string()),
                ("  ".to_string(), "The violin concerto was premiered in Vienna".to_string()),
            ])
            .await
            .unwrap();

        let rust = index.query("memory safety ownership", 1).await.unwrap();
        assert_eq!(rust[0].locator, "notes/rust.md");
        let violin = index.query("violin concerto Vienna", 1).await.unwrap();
        assert_eq!(violin[0].locator, violin[0].document_id);
    }

    #[tokio::test]
    async fn test_empty_documents_are_skipped() {
        let index = index();
        let summary = index
            .load_documents(&["".to_string(), "some real content here".to_string()])
            .await
            .unwrap();
        assert_eq!(summary.documents, 1);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_all_failures_is_ingest_error() {
        let index = DocumentIndex::new(
            TextChunker::new(10, 0),
            Arc::new(BrokenEmbedder),
            Arc::new(InMemoryVectorStore::new(4)),
            0.0,
        );
        let err = index.load_documents(&["text".to_string()]).await.unwrap_err();
        assert!(matches!(err, AppError::Ingest(_)));
        assert!(!index.is_loaded());

        let err = index.load_documents(&[]).await.unwrap_err();
        assert!(matches!(err, AppError::Ingest(_)));
    }

    #[tokio::test]
    async fn test_query_before_load_is_unavailable() {
        let err = index().query("anything", 3).await.unwrap_err();
        assert!(matches!(err, AppError::SourceUnavailable { .. }));
    }
}
