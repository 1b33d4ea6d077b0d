//! UI utilities for the CLI

use colored::*;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, size},
};
use kbchat_core::{Result, VectorDocument};
use std::io::{self, IsTerminal, Write};

/// Sources printed by `debug` and the `sources` toggle
pub const MAX_SOURCES_SHOWN: usize = 3;

/// Characters of each source chunk shown
pub const SOURCE_PREVIEW_CHARS: usize = 200;

/// Display startup banner
pub fn display_banner() {
    let terminal_width = size().map(|(w, _)| w as usize).unwrap_or(80);
    let banner_width = std::cmp::min(70, terminal_width.saturating_sub(4)).max(40);

    let top_border = format!("┌{}┐", "─".repeat(banner_width - 2));
    let bottom_border = format!("└{}┘", "─".repeat(banner_width - 2));
    let empty_line = format!("│{}│", " ".repeat(banner_width - 2));

    println!();
    println!("{}", top_border.blue());
    println!("{}", empty_line.blue());

    let title = "KNOWLEDGE BASE CHATBOT";
    let title_line = format!(
        "│  {}{}│",
        title.blue().bold(),
        " ".repeat(banner_width.saturating_sub(title.len() + 4))
    );
    println!("{}", title_line);
    println!("{}", empty_line.blue());

    let feature_lines = [
        "Ask questions about your own documents",
        "Supported: .pdf .csv .txt .jsonl (others read as text)",
        "",
        "Answers by Groq-hosted Llama models",
    ];

    for line in feature_lines {
        if line.is_empty() {
            println!("{}", empty_line.blue());
        } else {
            let padding = banner_width.saturating_sub(line.chars().count() + 4);
            println!("{}", format!("│  {}{}│", line, " ".repeat(padding)).blue());
        }
    }

    println!("{}", empty_line.blue());
    println!("{}", bottom_border.blue());
    println!();
}

/// Read one line with ↑/↓ history navigation
///
/// Returns `None` when input is closed (EOF on a pipe, Ctrl+C or Ctrl+D).
pub fn handle_input_with_history(label: &str, history: &mut Vec<String>) -> Result<Option<String>> {
    if !io::stdin().is_terminal() {
        print!("{} ", label.green().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        let input = input.trim().to_string();
        if !input.is_empty() {
            history.push(input.clone());
        }
        return Ok(Some(input));
    }

    enable_raw_mode()?;
    let result = read_line_raw(label, history);
    disable_raw_mode()?;
    println!();

    let input = result?;
    if let Some(ref line) = input {
        if !line.trim().is_empty() {
            history.push(line.clone());
        }
    }
    Ok(input)
}

fn redraw(label: &str, input: &str, previous_len: usize) -> Result<()> {
    let clear = " ".repeat(previous_len + 1);
    print!("\r{} {}\r{} {}", label.green().bold(), clear, label.green().bold(), input);
    io::stdout().flush()?;
    Ok(())
}

fn read_line_raw(label: &str, history: &[String]) -> Result<Option<String>> {
    let mut input = String::new();
    let mut history_index: Option<usize> = None;

    print!("{} ", label.green().bold());
    io::stdout().flush()?;

    loop {
        let Event::Key(key_event) = event::read()? else {
            continue;
        };
        if key_event.kind != KeyEventKind::Press {
            continue;
        }

        let previous_len = input.chars().count();
        match key_event.code {
            KeyCode::Enter => return Ok(Some(input)),
            KeyCode::Char('c') | KeyCode::Char('d')
                if key_event.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                return Ok(None);
            }
            KeyCode::Char(c) => {
                input.push(c);
                redraw(label, &input, previous_len)?;
            }
            KeyCode::Backspace => {
                if input.pop().is_some() {
                    redraw(label, &input, previous_len)?;
                }
            }
            KeyCode::Up => {
                if !history.is_empty() {
                    let new_index = match history_index {
                        None => history.len() - 1,
                        Some(idx) if idx > 0 => idx - 1,
                        Some(idx) => idx,
                    };
                    history_index = Some(new_index);
                    input = history[new_index].clone();
                    redraw(label, &input, previous_len)?;
                }
            }
            KeyCode::Down => {
                if let Some(idx) = history_index {
                    if idx + 1 < history.len() {
                        history_index = Some(idx + 1);
                        input = history[idx + 1].clone();
                    } else {
                        history_index = None;
                        input.clear();
                    }
                    redraw(label, &input, previous_len)?;
                }
            }
            KeyCode::Esc => {
                input.clear();
                redraw(label, &input, previous_len)?;
            }
            _ => {}
        }
    }
}

/// Display help message
pub fn print_help() {
    println!("{}", "Available commands:".bold());
    println!("  {} - Ask anything about the loaded documents", "<question>".green());
    println!("  {} - Answer and show the chunks used", "debug <question>".green());
    println!("  {} - Toggle showing sources after every answer", "sources".green());
    println!("  {} - Load a different directory", "new".green());
    println!("  {} - Show this help message", "help".green());
    println!("  {} - Exit the application", "exit".green());
}

pub fn print_answer(answer: &str) {
    println!("\n{} {}", "Answer:".cyan().bold(), answer);
}

pub fn print_error(message: &str) {
    println!("\n{} {}", "ERROR:".red().bold(), message);
}

/// First `max_chars` characters, with an ellipsis when cut
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// One numbered source line: `[n] (file) preview`
pub fn format_source(index: usize, doc: &VectorDocument) -> String {
    let source = doc
        .metadata
        .get("source")
        .and_then(|s| s.as_str())
        .map(|s| format!("({}) ", s))
        .unwrap_or_default();

    format!("[{}] {}{}", index, source, preview(&doc.content, SOURCE_PREVIEW_CHARS))
}

/// Print how many chunks were used and the first few of them
pub fn print_sources(sources: &[VectorDocument]) {
    println!("\n{} ({} chunks):", "Sources used".bold(), sources.len());
    for (i, doc) in sources.iter().take(MAX_SOURCES_SHOWN).enumerate() {
        println!("\n{}", format_source(i + 1, doc).dimmed());
    }
}
