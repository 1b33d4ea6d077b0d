//! Retrieval-QA engine: embed the question, fetch the closest chunks, stuff
//! them into a fixed prompt and let the LLM answer.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use kbchat_core::{
    Answer, Chunk, Embedder, Error, GenerationConfig, LLMProvider, RAGEngine, RAGQuery, Result,
    SearchConfig, VectorDocument, VectorStore,
};

pub const DEFAULT_TOP_K: usize = 3;

/// Chunks embedded per request while indexing
const INDEX_BATCH_SIZE: usize = 64;

const PROMPT_TEMPLATE: &str = "Use only the following retrieved context to answer the question.
If you don't know the answer, just say that you don't know.

Context:
{context}

Question:
{input}

Answer:";

/// Render the answer prompt
pub fn build_prompt(context: &str, question: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{context}", context)
        .replace("{input}", question)
}

/// Question answering over an indexed set of chunks
pub struct RetrievalQA<L: LLMProvider, V: VectorStore> {
    llm: L,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<V>,
    top_k: usize,
    generation: GenerationConfig,
    indexed: usize,
}

impl<L: LLMProvider, V: VectorStore> RetrievalQA<L, V> {
    /// Connect the store and the LLM, then embed and store every chunk
    pub async fn build(
        chunks: &[Chunk],
        embedder: Arc<dyn Embedder>,
        mut vector_store: V,
        mut llm: L,
        top_k: usize,
    ) -> Result<Self> {
        if !vector_store.is_connected() {
            vector_store.connect().await?;
        }
        llm.connect().await?;

        // No temperature here, so the provider's own setting applies
        let generation = GenerationConfig {
            model_id: llm.model_id().to_string(),
            temperature: None,
            ..Default::default()
        };

        let mut engine = Self {
            llm,
            embedder,
            vector_store: Arc::new(vector_store),
            top_k: top_k.max(1),
            generation,
            indexed: 0,
        };

        engine.index_chunks(chunks).await?;
        Ok(engine)
    }

    /// Embed chunks in batches and add them to the store
    pub async fn index_chunks(&mut self, chunks: &[Chunk]) -> Result<usize> {
        for batch in chunks.chunks(INDEX_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;

            if embeddings.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "Embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }

            let documents = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| VectorDocument {
                    id: chunk.id.clone(),
                    content: chunk.content.clone(),
                    embedding: Some(embedding),
                    metadata: chunk.metadata.clone(),
                    score: None,
                })
                .collect();

            self.indexed += self.vector_store.store_batch(documents).await?.len();
            debug!("Indexed {} / {} chunks", self.indexed, chunks.len());
        }

        info!(
            "Indexed {} chunks with the {} embedder",
            self.indexed,
            self.embedder.name()
        );
        Ok(self.indexed)
    }
}

#[async_trait]
impl<L: LLMProvider + 'static, V: VectorStore + 'static> RAGEngine for RetrievalQA<L, V> {
    async fn retrieve(&self, query: &RAGQuery) -> Result<Vec<VectorDocument>> {
        let vector = self.embedder.embed_query(&query.query).await?;
        let config = SearchConfig {
            top_k: query.top_k,
            score_threshold: query.score_threshold,
        };

        let result = self.vector_store.search_by_vector(vector, &config).await?;
        Ok(result.documents)
    }

    fn build_context(&self, documents: &[VectorDocument]) -> String {
        documents
            .iter()
            .map(|doc| doc.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn ask_with_sources(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("Question must not be empty".to_string()));
        }
        if !self.is_ready() {
            return Err(Error::RAGEngine("No chunks indexed yet".to_string()));
        }

        let sources = self.retrieve(&RAGQuery::new(question, self.top_k)).await?;
        let context = self.build_context(&sources);
        let prompt = build_prompt(&context, question);
        debug!("Prompt with {} source chunk(s), {} chars", sources.len(), prompt.len());

        let result = self.llm.generate_with_config(&prompt, &self.generation).await?;

        Ok(Answer {
            text: result.text,
            sources,
        })
    }

    async fn stats(&self) -> Result<serde_json::Value> {
        Ok(json!({
            "indexed_chunks": self.indexed,
            "vector_store_count": self.vector_store.count().await?,
            "embedder": self.embedder.name(),
            "dimension": self.embedder.dimension(),
            "model": self.llm.model_id(),
            "top_k": self.top_k,
        }))
    }

    fn is_ready(&self) -> bool {
        self.indexed > 0 && self.vector_store.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use crate::vector_store::LocalVectorStore;
    use kbchat_core::GenerationResult;
    use std::sync::Mutex;

    /// Records prompts and answers with a fixed string
    struct EchoLLM {
        prompts: Arc<Mutex<Vec<String>>>,
        connected: bool,
    }

    impl EchoLLM {
        fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
            let prompts = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    prompts: prompts.clone(),
                    connected: false,
                },
                prompts,
            )
        }
    }

    #[async_trait]
    impl LLMProvider for EchoLLM {
        async fn connect(&mut self) -> Result<()> {
            self.connected = true;
            Ok(())
        }

        async fn generate(&self, prompt: &str) -> Result<GenerationResult> {
            self.generate_with_config(prompt, &GenerationConfig::default()).await
        }

        async fn generate_with_config(
            &self,
            prompt: &str,
            config: &GenerationConfig,
        ) -> Result<GenerationResult> {
            assert!(self.connected);
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(GenerationResult {
                text: "It opens at nine.".to_string(),
                model_id: config.model_id.clone(),
                tokens_used: None,
            })
        }

        fn model_id(&self) -> &str {
            "echo"
        }
    }

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            content: content.to_string(),
            metadata: json!({"source": "notes.txt"}),
        }
    }

    fn sample_chunks() -> Vec<Chunk> {
        vec![
            chunk("1", "Cats are small domesticated mammals."),
            chunk("2", "The library opens at nine in the morning."),
            chunk("3", "Penguins live in the southern hemisphere."),
        ]
    }

    #[tokio::test]
    async fn test_build_indexes_all_chunks() {
        let (llm, _) = EchoLLM::new();
        let engine = RetrievalQA::build(
            &sample_chunks(),
            Arc::new(HashingEmbedder::default()),
            LocalVectorStore::new(),
            llm,
            DEFAULT_TOP_K,
        )
        .await
        .unwrap();

        assert!(engine.is_ready());
        let stats = engine.stats().await.unwrap();
        assert_eq!(stats["indexed_chunks"], json!(3));
        assert_eq!(stats["vector_store_count"], json!(3));
        assert_eq!(stats["embedder"], json!("hashing"));
    }

    #[tokio::test]
    async fn test_ask_with_sources_uses_retrieved_context() {
        let (llm, prompts) = EchoLLM::new();
        let engine = RetrievalQA::build(
            &sample_chunks(),
            Arc::new(HashingEmbedder::default()),
            LocalVectorStore::new(),
            llm,
            1,
        )
        .await
        .unwrap();

        let answer = engine
            .ask_with_sources("When does the library open in the morning?")
            .await
            .unwrap();

        assert_eq!(answer.text, "It opens at nine.");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].id, "2");

        let prompts = prompts.lock().unwrap();
        assert_eq!(
            prompts[0],
            build_prompt(
                "The library opens at nine in the morning.",
                "When does the library open in the morning?"
            )
        );
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let (llm, prompts) = EchoLLM::new();
        let engine = RetrievalQA::build(
            &sample_chunks(),
            Arc::new(HashingEmbedder::default()),
            LocalVectorStore::new(),
            llm,
            DEFAULT_TOP_K,
        )
        .await
        .unwrap();

        let err = engine.ask("   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_build_context_joins_with_blank_line() {
        let (llm, _) = EchoLLM::new();
        let engine = RetrievalQA::build(
            &[],
            Arc::new(HashingEmbedder::new(8)),
            LocalVectorStore::new(),
            llm,
            DEFAULT_TOP_K,
        )
        .await
        .unwrap();
        assert!(!engine.is_ready());

        let docs: Vec<VectorDocument> = ["first", "second"]
            .iter()
            .map(|c| VectorDocument {
                id: c.to_string(),
                content: c.to_string(),
                embedding: None,
                metadata: json!({}),
                score: None,
            })
            .collect();

        assert_eq!(engine.build_context(&docs), "first\n\nsecond");
        assert_eq!(engine.build_context(&[]), "");

        let err = engine.ask("anything?").await.unwrap_err();
        assert!(matches!(err, Error::RAGEngine(_)));
    }
}
