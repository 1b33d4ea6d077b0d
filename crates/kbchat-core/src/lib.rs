//! Core traits and types for kbchat
//!
//! This crate defines the interfaces shared by the ingestion pipeline, the
//! retrieval engine and the LLM client: LLM providers, embedders, vector
//! stores and RAG engines, plus the common error type.

pub mod llm;
pub mod rag;
pub mod vector_store;
pub mod embedding;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use llm::{LLMProvider, GenerationConfig, GenerationResult};
pub use rag::{RAGEngine, RAGQuery};
pub use vector_store::{VectorStore, VectorDocument, SearchResult, SearchConfig};
pub use embedding::Embedder;
pub use types::*;
