//! Groq configuration

use serde::{Deserialize, Serialize};
use std::env;
use kbchat_core::{Error, Result};

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Configuration for the Groq chat client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    pub api_key: String,
    pub model: String,
    pub api_url: String,
    pub temperature: f32,
}

impl GroqConfig {
    /// Create configuration from environment variables, reading `.env` first
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = env::var("GROQ_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Configuration(
                "Groq API key not found. Please set it in a .env file.".to_string()
            ))?;

        let model = env::var("GROQ_MODEL")
            .unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let api_url = env::var("GROQ_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let temperature = match env::var("GROQ_TEMPERATURE") {
            Ok(raw) => raw.parse::<f32>().map_err(|_| Error::Configuration(
                format!("GROQ_TEMPERATURE must be a number, got '{}'", raw)
            ))?,
            Err(_) => DEFAULT_TEMPERATURE,
        };

        Ok(Self {
            api_key,
            model,
            api_url,
            temperature,
        })
    }

    /// Create configuration with explicit values
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Endpoint for chat completions, tolerant of a trailing slash in the base URL
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
    }
}
