//! Parsing of what the user types at the question prompt

/// One line of input at the question prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Blank line
    Empty,
    Exit,
    /// Drop the current knowledge base and ask for a new directory
    New,
    Help,
    /// Toggle printing sources after every answer
    ToggleSources,
    /// Answer and show the chunks used
    Debug(String),
    Ask(String),
}

impl ChatCommand {
    /// Keywords are matched case-insensitively; questions keep their case
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return ChatCommand::Empty;
        }

        match input.to_lowercase().as_str() {
            "exit" | "quit" => return ChatCommand::Exit,
            "new" => return ChatCommand::New,
            "help" => return ChatCommand::Help,
            "sources" => return ChatCommand::ToggleSources,
            _ => {}
        }

        let mut parts = input.splitn(2, char::is_whitespace);
        let head = parts.next().unwrap_or_default();
        if head.eq_ignore_ascii_case("debug") {
            return ChatCommand::Debug(parts.next().unwrap_or_default().trim().to_string());
        }

        ChatCommand::Ask(input.to_string())
    }
}
