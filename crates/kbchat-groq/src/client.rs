//! Groq chat client implementation

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use kbchat_core::{
    LLMProvider, GenerationConfig, GenerationResult, Error, Result,
};

use crate::config::GroqConfig;

/// Groq chat completions client
pub struct GroqClient {
    config: GroqConfig,
    client: Client,
    connected: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

impl GroqClient {
    /// Model constants
    pub const LLAMA_3_3_70B_VERSATILE: &'static str = "llama-3.3-70b-versatile";
    pub const LLAMA_3_1_8B_INSTANT: &'static str = "llama-3.1-8b-instant";

    /// Create a new Groq client from configuration
    pub fn new(config: GroqConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            config,
            client,
            connected: false,
        })
    }

    /// Create a new Groq client from environment variables
    pub fn from_env() -> Result<Self> {
        let config = GroqConfig::from_env()?;
        Self::new(config)
    }

    /// Set the model to use for generation
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.config.model = model_id.into();
        self
    }

    fn build_request(&self, prompt: &str, config: &GenerationConfig) -> ChatRequest {
        ChatRequest {
            model: config.model_id.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: config.temperature.unwrap_or(self.config.temperature),
            max_tokens: config.max_tokens,
            top_p: config.top_p,
            stop: config.stop_sequences.clone(),
        }
    }

    /// Perform the actual generation request
    async fn perform_generation(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<(String, Option<u32>)> {
        if !self.connected {
            return Err(Error::Authentication("Not connected. Call connect() first.".to_string()));
        }

        let request_body = self.build_request(prompt, config);
        let url = self.config.chat_completions_url();
        debug!("POST {} (model {})", url, request_body.model);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::LLMProvider(format!(
                "Groq API request failed with status {}: {}",
                status, error_text
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        parse_chat_response(&response_text)
    }
}

/// Pull the answer text and token usage out of a chat completions body
fn parse_chat_response(body: &str) -> Result<(String, Option<u32>)> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::Serialization(format!("Unexpected Groq response: {}", e)))?;

    let answer = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();

    let cleaned = clean_answer(&answer);
    if cleaned.is_empty() {
        return Err(Error::LLMProvider(format!(
            "Empty response from Groq API. Raw response: {}",
            body
        )));
    }

    Ok((cleaned, parsed.usage.map(|u| u.total_tokens)))
}

/// Models often echo the template's trailing "Answer:" label
fn clean_answer(answer: &str) -> String {
    let trimmed = answer.trim();
    trimmed
        .strip_prefix("Answer:")
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

#[async_trait]
impl LLMProvider for GroqClient {
    async fn connect(&mut self) -> Result<()> {
        if self.config.api_key.trim().is_empty() {
            return Err(Error::Configuration(
                "Groq API key not found. Please set it in a .env file.".to_string(),
            ));
        }

        let url = format!("{}/models", self.config.api_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Authentication(format!(
                "Authentication failed: {}",
                response.status()
            )));
        }

        self.connected = true;
        Ok(())
    }

    async fn generate(&self, prompt: &str) -> Result<GenerationResult> {
        let config = GenerationConfig {
            model_id: self.config.model.clone(),
            temperature: Some(self.config.temperature),
            ..Default::default()
        };
        self.generate_with_config(prompt, &config).await
    }

    async fn generate_with_config(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let generation_future = self.perform_generation(prompt, config);

        let (text, tokens_used) = match timeout(config.timeout, generation_future).await {
            Ok(result) => result?,
            Err(_) => return Err(Error::Timeout("Request timed out".to_string())),
        };

        Ok(GenerationResult {
            text,
            model_id: config.model_id.clone(),
            tokens_used,
        })
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Answer: Paris."}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        }"#;

        let (text, tokens) = parse_chat_response(body).unwrap();
        assert_eq!(text, "Paris.");
        assert_eq!(tokens, Some(12));
    }

    #[test]
    fn test_parse_empty_choice_is_error() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "  "}}]}"#;
        assert!(matches!(parse_chat_response(body), Err(Error::LLMProvider(_))));

        let body = r#"{"choices": []}"#;
        assert!(parse_chat_response(body).is_err());
    }

    #[test]
    fn test_parse_malformed_body() {
        assert!(matches!(parse_chat_response("<html>"), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_request_body_shape() {
        let client = GroqClient::new(GroqConfig::new("key".to_string())).unwrap();
        let config = GenerationConfig {
            model_id: "llama-3.3-70b-versatile".to_string(),
            max_tokens: Some(256),
            temperature: Some(0.5),
            ..Default::default()
        };

        let body = serde_json::to_value(client.build_request("Where is it?", &config)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "llama-3.3-70b-versatile",
                "messages": [{"role": "user", "content": "Where is it?"}],
                "temperature": 0.5,
                "max_tokens": 256
            })
        );
    }

    #[test]
    fn test_request_without_token_cap() {
        let client = GroqClient::new(GroqConfig::new("key".to_string())).unwrap();
        let config = GenerationConfig {
            model_id: "llama-3.3-70b-versatile".to_string(),
            ..Default::default()
        };

        let body = serde_json::to_value(client.build_request("Where is it?", &config)).unwrap();
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["model"], serde_json::json!("llama-3.3-70b-versatile"));
    }

    #[test]
    fn test_model_override() {
        let client = GroqClient::new(GroqConfig::new("key".to_string()))
            .unwrap()
            .with_model(GroqClient::LLAMA_3_1_8B_INSTANT);
        assert_eq!(client.model_id(), "llama-3.1-8b-instant");
    }

    #[tokio::test]
    async fn test_generate_requires_connect() {
        let client = GroqClient::new(GroqConfig::new("key".to_string())).unwrap();
        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }
}
