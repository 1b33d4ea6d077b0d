//! Embedder trait

use async_trait::async_trait;

use crate::Result;

/// Turns text into dense vectors.
///
/// The same embedder must be used for indexing and for queries, otherwise
/// similarity scores are meaningless.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input in the same order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| crate::Error::Embedding("Embedder returned no vector".to_string()))
    }

    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Short human-readable name
    fn name(&self) -> &str;
}
