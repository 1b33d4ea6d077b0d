//! Embedding, vector storage and retrieval-augmented answering for kbchat
//!
//! This crate provides the embedders, the in-memory and Qdrant vector stores
//! and the retrieval-QA engine that turns a question into a grounded answer.

mod embedder;
mod engine;
mod vector_store;


pub use embedder::{DEFAULT_DIMENSION, EmbeddingConfig, HashingEmbedder, HttpEmbedder};
pub use engine::{DEFAULT_TOP_K, RetrievalQA, build_prompt};
pub use vector_store::{
    DEFAULT_COLLECTION, DEFAULT_QDRANT_URL, LocalVectorStore, QdrantVectorStore,
    cosine_similarity, point_id,
};

// Re-export core types for convenience
pub use kbchat_core::{
    Answer, Chunk, Embedder, Error, RAGEngine, RAGQuery, Result, SearchConfig, SearchResult,
    VectorDocument, VectorStore,
};
