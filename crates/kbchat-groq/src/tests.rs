//! Snapshot tests for the Groq client

#[cfg(test)]
mod snapshot_tests {
    use crate::{GroqClient, GroqConfig, LLMProvider};
    use insta::assert_yaml_snapshot;

    #[test]
    fn test_config_snapshot() {
        let config = GroqConfig {
            api_key: "test_api_key_redacted".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_url: "https://api.groq.com/openai/v1".to_string(),
            temperature: 0.5,
        };

        assert_yaml_snapshot!(config, @r###"
        ---
        api_key: test_api_key_redacted
        model: llama-3.3-70b-versatile
        api_url: "https://api.groq.com/openai/v1"
        temperature: 0.5
        "###);
    }

    #[test]
    fn test_chat_completions_url() {
        let mut config = GroqConfig::new("key".to_string());
        assert_eq!(
            config.chat_completions_url(),
            "https://api.groq.com/openai/v1/chat/completions"
        );

        config.api_url = "http://localhost:8080/v1/".to_string();
        assert_eq!(config.chat_completions_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_default_model() {
        let client = GroqClient::new(GroqConfig::new("key".to_string())).unwrap();
        assert_yaml_snapshot!(client.model_id(), @"llama-3.3-70b-versatile");
        assert_yaml_snapshot!(GroqClient::LLAMA_3_1_8B_INSTANT, @"llama-3.1-8b-instant");
    }
}
