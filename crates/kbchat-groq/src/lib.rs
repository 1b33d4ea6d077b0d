//! Groq integration for kbchat
//!
//! This crate provides the Groq implementation of the LLMProvider trait,
//! talking to Groq's OpenAI-compatible chat completions endpoint.

mod client;
mod config;

#[cfg(test)]
mod tests;

pub use client::GroqClient;
pub use config::{GroqConfig, DEFAULT_API_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE};

// Re-export core types for convenience
pub use kbchat_core::{
    LLMProvider, GenerationConfig, GenerationResult, Error, Result,
};
