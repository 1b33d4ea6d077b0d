//! Embedder implementations

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::debug;

use kbchat_core::{Embedder, Error, Result};

/// Dimension of all-MiniLM-L6-v2, kept so vectors are interchangeable in size
pub const DEFAULT_DIMENSION: usize = 384;

const BIGRAM_WEIGHT: f32 = 0.5;

/// Local feature-hashing embedder
///
/// Each lower-cased word and each adjacent word pair is hashed into one of
/// `dimension` buckets with a hash-derived sign. Vectors are L2-normalised, so
/// cosine similarity reflects shared vocabulary. Needs no network or model.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    }

    fn add_feature(&self, embedding: &mut [f32], feature: &str, weight: f32) {
        let digest = md5::compute(feature.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.0[..8]);
        let hash = u64::from_le_bytes(bytes);

        let idx = (hash % self.dimension as u64) as usize;
        let sign = if digest.0[15] & 1 == 0 { 1.0 } else { -1.0 };
        embedding[idx] += sign * weight;
    }

    /// Embed one text synchronously
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let tokens = Self::tokenize(text);
        let mut embedding = vec![0.0; self.dimension];

        for token in &tokens {
            self.add_feature(&mut embedding, token, 1.0);
        }

        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.add_feature(&mut embedding, &bigram, BIGRAM_WEIGHT);
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in embedding.iter_mut() {
                *val /= magnitude;
            }
        }

        embedding
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// Configuration for an OpenAI-compatible embeddings endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub batch_size: usize,
}

impl EmbeddingConfig {
    /// Read `EMBEDDING_API_URL`, `EMBEDDING_API_KEY` and `EMBEDDING_MODEL`
    ///
    /// Returns `None` when no endpoint is configured.
    pub fn from_env() -> Option<Self> {
        let api_url = env::var("EMBEDDING_API_URL").ok().filter(|u| !u.trim().is_empty())?;

        Some(Self {
            api_url,
            api_key: env::var("EMBEDDING_API_KEY").ok(),
            model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "sentence-transformers/all-MiniLM-L6-v2".to_string()),
            batch_size: 64,
        })
    }

    pub fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.api_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint
pub struct HttpEmbedder {
    config: EmbeddingConfig,
    client: Client,
    dimension: usize,
}

impl HttpEmbedder {
    /// Create the client and learn the vector dimension with a sample request
    pub async fn connect(config: EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        let mut embedder = Self {
            config,
            client,
            dimension: 0,
        };

        let sample = embedder.request(&["dimension check".to_string()]).await?;
        embedder.dimension = sample
            .first()
            .map(|v| v.len())
            .filter(|d| *d > 0)
            .ok_or_else(|| Error::Embedding("Embedding endpoint returned an empty vector".to_string()))?;

        debug!("Embedding endpoint {} has dimension {}", embedder.config.api_url, embedder.dimension);
        Ok(embedder)
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };

        let mut request = self.client.post(self.config.embeddings_url()).json(&body);
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Embedding(format!(
                "Embedding request failed with status {}: {}",
                status, error_text
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;

        order_embeddings(parsed.data, texts.len())
    }
}

/// Put vectors back in input order and check one came back per input
fn order_embeddings(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(Error::Embedding(format!(
            "Expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size.max(1)) {
            vectors.extend(self.request(batch).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_hashing_embedder_is_normalised_and_deterministic() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_text("The library opens at nine");
        let b = embedder.embed_text("The library opens at nine");

        assert_eq!(a.len(), DEFAULT_DIMENSION);
        assert_eq!(a, b);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_embedder_similarity() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_text("library opening hours");
        let related = embedder.embed_text("The library opening hours are nine to five");
        let unrelated = embedder.embed_text("Cats are small domesticated mammals");

        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        assert_eq!(embedder.embed_text("  ... "), vec![0.0; 8]);
    }

    #[tokio::test]
    async fn test_embed_batch_matches_inputs() {
        let embedder = HashingEmbedder::new(16);
        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let vectors = embedder.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(embedder.embed_query("two").await.unwrap(), vectors[1]);
    }

    #[test]
    fn test_order_embeddings() {
        let data = vec![
            EmbeddingData { embedding: vec![2.0], index: 1 },
            EmbeddingData { embedding: vec![1.0], index: 0 },
        ];
        assert_eq!(order_embeddings(data, 2).unwrap(), vec![vec![1.0], vec![2.0]]);

        let data = vec![EmbeddingData { embedding: vec![1.0], index: 0 }];
        assert!(order_embeddings(data, 2).is_err());
    }

    #[test]
    fn test_embeddings_url() {
        let config = EmbeddingConfig {
            api_url: "http://localhost:11434/v1/".to_string(),
            api_key: None,
            model: "nomic-embed-text".to_string(),
            batch_size: 8,
        };
        assert_eq!(config.embeddings_url(), "http://localhost:11434/v1/embeddings");
    }
}
