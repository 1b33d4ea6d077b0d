//! Snapshot tests for CLI rendering

#[cfg(test)]
mod snapshot_tests {
    use crate::{ChatCommand, format_source};
    use insta::assert_snapshot;
    use kbchat_core::VectorDocument;
    use serde_json::json;

    #[test]
    fn test_source_line_snapshot() {
        let doc = VectorDocument {
            id: "abc".to_string(),
            content: "The library opens at nine in the morning.".to_string(),
            embedding: None,
            metadata: json!({"source": "data/hours.txt", "chunk_index": 0}),
            score: Some(0.5),
        };

        assert_snapshot!(format_source(1, &doc), @"[1] (data/hours.txt) The library opens at nine in the morning.");
    }

    #[test]
    fn test_command_debug_snapshot() {
        let parsed = format!("{:?}", ChatCommand::parse("DEBUG who wrote it?"));
        assert_snapshot!(parsed, @r###"Debug("who wrote it?")"###);
    }
}
