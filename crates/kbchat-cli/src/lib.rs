//! Terminal interface for kbchat

mod command;
mod ui;

#[cfg(test)]
mod tests;

pub use command::ChatCommand;
pub use ui::{
    MAX_SOURCES_SHOWN, SOURCE_PREVIEW_CHARS, display_banner, format_source,
    handle_input_with_history, preview, print_answer, print_error, print_help, print_sources,
};

// Re-export core types
pub use kbchat_core::{Error, Result};
