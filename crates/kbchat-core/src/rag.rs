//! RAG (Retrieval-Augmented Generation) engine trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Answer, Result, VectorDocument};

/// Query for RAG retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RAGQuery {
    pub query: String,
    pub top_k: usize,
    pub score_threshold: Option<f32>,
}

impl RAGQuery {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k,
            score_threshold: None,
        }
    }
}

/// Trait for RAG engines
///
/// Retrieval finds the chunks closest to the question, the context is those
/// chunks stuffed into a fixed prompt, and the LLM writes the answer.
#[async_trait]
pub trait RAGEngine: Send + Sync {
    /// Retrieve relevant chunks for a query
    async fn retrieve(&self, query: &RAGQuery) -> Result<Vec<VectorDocument>>;

    /// Build context from retrieved chunks
    fn build_context(&self, documents: &[VectorDocument]) -> String;

    /// Answer a question
    async fn ask(&self, question: &str) -> Result<String> {
        Ok(self.ask_with_sources(question).await?.text)
    }

    /// Answer a question and return the chunks used
    async fn ask_with_sources(&self, question: &str) -> Result<Answer>;

    /// Get statistics about the RAG engine
    async fn stats(&self) -> Result<serde_json::Value>;

    /// Check if the RAG engine is ready
    fn is_ready(&self) -> bool;
}
