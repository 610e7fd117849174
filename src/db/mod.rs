//! Storage backends: chunk vectors for retrieval and completed runs for replay.

/// Persistence of completed pipeline runs.
pub mod session_store;
/// Vector store abstraction and the in-memory backend.
pub mod vectorstore;

pub use session_store::{InMemorySessionStore, JsonFileSessionStore, SessionStore, SessionSummary};
pub use vectorstore::{InMemoryVectorStore, ScoredChunk, StoredChunk, VectorStore};
