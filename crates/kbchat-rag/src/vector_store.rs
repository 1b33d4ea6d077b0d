//! Vector store implementations

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use kbchat_core::{Error, Result, SearchConfig, SearchResult, VectorDocument, VectorStore};

/// Local in-memory vector store
///
/// Documents keep their insertion order, so equal scores come back in the
/// order the chunks were indexed.
pub struct LocalVectorStore {
    documents: Arc<RwLock<Vec<VectorDocument>>>,
    connected: bool,
}

impl LocalVectorStore {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(Vec::new())),
            connected: false,
        }
    }
}

impl Default for LocalVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity, 0.0 for mismatched lengths or zero vectors
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

fn passes_threshold(doc: &VectorDocument, config: &SearchConfig) -> bool {
    match config.score_threshold {
        Some(threshold) => doc.score.unwrap_or(0.0) >= threshold,
        None => true,
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn store_batch(&self, documents: Vec<VectorDocument>) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(documents.len());
        let mut docs = self
            .documents
            .write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        for document in documents {
            if document.embedding.is_none() {
                return Err(Error::VectorStore(format!(
                    "Document {} has no embedding",
                    document.id
                )));
            }

            let id = document.id.clone();
            match docs.iter_mut().find(|d| d.id == id) {
                Some(existing) => *existing = document,
                None => docs.push(document),
            }
            ids.push(id);
        }

        Ok(ids)
    }

    async fn search_by_vector(&self, vector: Vec<f32>, config: &SearchConfig) -> Result<SearchResult> {
        let docs = self
            .documents
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let mut results: Vec<VectorDocument> = docs
            .iter()
            .filter_map(|doc| {
                let embedding = doc.embedding.as_ref()?;
                let mut scored = doc.clone();
                scored.score = Some(cosine_similarity(&vector, embedding));
                Some(scored)
            })
            .filter(|doc| passes_threshold(doc, config))
            .collect();

        // Stable sort keeps insertion order among ties
        results.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .partial_cmp(&a.score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(config.top_k);

        let total = results.len();
        Ok(SearchResult {
            documents: results,
            total,
        })
    }

    async fn clear(&self) -> Result<()> {
        let mut docs = self
            .documents
            .write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        docs.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let docs = self
            .documents
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        Ok(docs.len())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "kbchat";

/// Qdrant-backed vector store
///
/// `connect` recreates the collection so every session starts from the
/// directory that was just loaded.
pub struct QdrantVectorStore {
    url: String,
    api_key: Option<String>,
    collection: String,
    dimension: u64,
    client: Option<Qdrant>,
}

impl QdrantVectorStore {
    pub fn new(url: impl Into<String>, collection: impl Into<String>, dimension: usize) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            collection: collection.into(),
            dimension: dimension as u64,
            client: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn client(&self) -> Result<&Qdrant> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::VectorStore("Qdrant store is not connected".to_string()))
    }

    async fn create_collection(&self, client: &Qdrant) -> Result<()> {
        if client
            .collection_exists(self.collection.as_str())
            .await
            .map_err(qdrant_error)?
        {
            debug!("Dropping existing collection {}", self.collection);
            client
                .delete_collection(self.collection.as_str())
                .await
                .map_err(qdrant_error)?;
        }

        client
            .create_collection(
                CreateCollectionBuilder::new(self.collection.clone())
                    .vectors_config(VectorParamsBuilder::new(self.dimension, Distance::Cosine)),
            )
            .await
            .map_err(qdrant_error)?;

        info!("Created Qdrant collection {} (dimension {})", self.collection, self.dimension);
        Ok(())
    }
}

fn qdrant_error(e: impl std::fmt::Display) -> Error {
    Error::VectorStore(format!("Qdrant: {}", e))
}

/// Qdrant point ids must be integers or UUIDs
pub fn point_id(chunk_id: &str) -> String {
    Uuid::from_bytes(md5::compute(chunk_id.as_bytes()).0).to_string()
}

fn payload_for(document: &VectorDocument) -> HashMap<String, QdrantValue> {
    let mut payload = HashMap::new();
    payload.insert("chunk_id".to_string(), QdrantValue::from(document.id.clone()));
    payload.insert("content".to_string(), QdrantValue::from(document.content.clone()));
    payload.insert("metadata".to_string(), QdrantValue::from(document.metadata.to_string()));
    payload
}

fn payload_str(payload: &HashMap<String, QdrantValue>, key: &str) -> Option<String> {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Rebuild a document from a stored payload
fn document_from_payload(payload: &HashMap<String, QdrantValue>, score: f32) -> VectorDocument {
    let metadata = payload_str(payload, "metadata")
        .and_then(|m| serde_json::from_str(&m).ok())
        .unwrap_or(serde_json::Value::Null);

    VectorDocument {
        id: payload_str(payload, "chunk_id").unwrap_or_default(),
        content: payload_str(payload, "content").unwrap_or_default(),
        embedding: None,
        metadata,
        score: Some(score),
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn connect(&mut self) -> Result<()> {
        let client = Qdrant::from_url(&self.url)
            .api_key(self.api_key.clone())
            .build()
            .map_err(qdrant_error)?;

        self.create_collection(&client).await?;
        self.client = Some(client);
        Ok(())
    }

    async fn store_batch(&self, documents: Vec<VectorDocument>) -> Result<Vec<String>> {
        let client = self.client()?;
        let mut ids = Vec::with_capacity(documents.len());
        let mut points = Vec::with_capacity(documents.len());

        for document in documents {
            let Some(ref embedding) = document.embedding else {
                return Err(Error::VectorStore(format!(
                    "Document {} has no embedding",
                    document.id
                )));
            };

            points.push(PointStruct::new(
                point_id(&document.id),
                embedding.clone(),
                payload_for(&document),
            ));
            ids.push(document.id);
        }

        if points.is_empty() {
            return Ok(ids);
        }

        client
            .upsert_points(UpsertPointsBuilder::new(self.collection.clone(), points).wait(true))
            .await
            .map_err(qdrant_error)?;

        Ok(ids)
    }

    async fn search_by_vector(&self, vector: Vec<f32>, config: &SearchConfig) -> Result<SearchResult> {
        let client = self.client()?;

        let mut request = SearchPointsBuilder::new(self.collection.clone(), vector, config.top_k as u64)
            .with_payload(true);
        if let Some(threshold) = config.score_threshold {
            request = request.score_threshold(threshold);
        }

        let response = client.search_points(request).await.map_err(qdrant_error)?;

        let documents: Vec<VectorDocument> = response
            .result
            .iter()
            .map(|point| document_from_payload(&point.payload, point.score))
            .collect();

        let total = documents.len();
        Ok(SearchResult { documents, total })
    }

    async fn clear(&self) -> Result<()> {
        let client = self.client()?;
        self.create_collection(client).await
    }

    async fn count(&self) -> Result<usize> {
        let client = self.client()?;
        let response = client
            .count(CountPointsBuilder::new(self.collection.clone()).exact(true))
            .await
            .map_err(qdrant_error)?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, content: &str, embedding: Vec<f32>) -> VectorDocument {
        VectorDocument {
            id: id.to_string(),
            content: content.to_string(),
            embedding: Some(embedding),
            metadata: json!({"source": "notes.txt"}),
            score: None,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_local_store_ranks_by_similarity() {
        let mut store = LocalVectorStore::new();
        store.connect().await.unwrap();
        assert!(store.is_connected());

        store
            .store_batch(vec![
                doc("a", "east", vec![1.0, 0.0]),
                doc("b", "north", vec![0.0, 1.0]),
                doc("c", "north-east", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        let config = SearchConfig { top_k: 2, score_threshold: None };
        let result = store.search_by_vector(vec![0.0, 2.0], &config).await.unwrap();

        let ids: Vec<_> = result.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(result.total, 2);
        assert_eq!(result.documents[0].score, Some(1.0));
    }

    #[tokio::test]
    async fn test_local_store_threshold_and_upsert() {
        let store = LocalVectorStore::new();
        store
            .store_batch(vec![doc("a", "old", vec![1.0, 0.0]), doc("b", "other", vec![0.0, 1.0])])
            .await
            .unwrap();
        store.store_batch(vec![doc("a", "new", vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        let config = SearchConfig { top_k: 5, score_threshold: Some(0.5) };
        let result = store.search_by_vector(vec![1.0, 0.0], &config).await.unwrap();
        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.documents[0].content, "new");

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_local_store_requires_embeddings() {
        let store = LocalVectorStore::new();
        let mut missing = doc("a", "text", vec![]);
        missing.embedding = None;
        assert!(store.store_batch(vec![missing]).await.is_err());
    }

    #[test]
    fn test_point_id_is_stable_uuid() {
        let id = point_id("5d41402abc4b2a76b9719d911017c592");
        assert_eq!(id, point_id("5d41402abc4b2a76b9719d911017c592"));
        assert!(Uuid::parse_str(&id).is_ok());
        assert_ne!(id, point_id("another chunk"));
    }

    #[test]
    fn test_payload_round_trip() {
        let original = doc("chunk-1", "The library opens at nine.", vec![1.0]);
        let payload = payload_for(&original);

        let restored = document_from_payload(&payload, 0.5);
        assert_eq!(restored.id, "chunk-1");
        assert_eq!(restored.content, "The library opens at nine.");
        assert_eq!(restored.metadata, json!({"source": "notes.txt"}));
        assert_eq!(restored.score, Some(0.5));
    }

    #[tokio::test]
    async fn test_qdrant_requires_connect() {
        let store = QdrantVectorStore::new(DEFAULT_QDRANT_URL, DEFAULT_COLLECTION, 4);
        assert!(!store.is_connected());
        assert!(store.count().await.is_err());
    }
}
