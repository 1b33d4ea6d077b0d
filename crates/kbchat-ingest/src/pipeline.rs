//! Directory ingestion: load every file, clean, dedup and chunk

use colored::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use kbchat_core::{Chunk, Document, Error, Result};

use crate::dedup::{dedup_chunks, dedup_documents};
use crate::loader::{LoaderKind, load_single_document};
use crate::splitter::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, TextSplitter};

/// Characters of the first document shown per file in preview mode
const PREVIEW_CHARS: usize = 500;

/// Configuration for directory ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Print the start of each loaded file
    pub preview: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            preview: false,
        }
    }
}

/// Outcome of loading a directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub chunks: Vec<Chunk>,
    pub files_loaded: usize,
    pub files_failed: usize,
    pub documents_loaded: usize,
    pub duplicates_removed: usize,
    /// (file name, error message) for every file that could not be loaded
    pub failures: Vec<(String, String)>,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Load every regular file directly inside `dir`, then clean, dedup and chunk
///
/// A file that fails to load is reported and skipped. An empty report is not
/// an error; the caller decides what to do when nothing was loaded.
pub fn load_and_chunk_directory(dir: &Path, config: &IngestConfig) -> Result<IngestReport> {
    if !dir.is_dir() {
        return Err(Error::InvalidInput(format!(
            "Directory '{}' not found",
            dir.display()
        )));
    }

    let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap)?;

    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    println!("{} Loading documents from directory: {}", "📂".blue(), dir.display());

    let mut report = IngestReport::default();
    let mut all_docs: Vec<Document> = Vec::new();

    for path in entries {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let kind = LoaderKind::for_path(&path);

        println!("\n{} Processing file: {}", "→".green(), file_name.bold());
        println!("   {} Using {}", "·".dimmed(), kind.name());

        match load_single_document(&path) {
            Ok(documents) => {
                if config.preview {
                    if let Some(first) = documents.first() {
                        print_preview(&first.content);
                    }
                }

                info!("Loaded {} document(s) from {}", documents.len(), file_name);
                report.files_loaded += 1;
                report.documents_loaded += documents.len();
                all_docs.extend(documents);
            }
            Err(e) => {
                println!("   {} Failed to load {}: {}", "[!]".red(), file_name, e);
                warn!("Skipping {}: {}", file_name, e);
                report.files_failed += 1;
                report.failures.push((file_name, e.to_string()));
            }
        }
    }

    let (documents, doc_duplicates) = dedup_documents(all_docs);
    report.duplicates_removed = doc_duplicates;
    if documents.is_empty() {
        return Ok(report);
    }

    println!("\n{} Total documents loaded: {}", "📚".blue(), documents.len());
    println!("Now splitting documents into chunks...");

    let (chunks, chunk_duplicates) = dedup_chunks(splitter.split_documents(&documents));
    report.duplicates_removed += chunk_duplicates;
    if report.duplicates_removed > 0 {
        println!(
            "{} Removed {} duplicate document(s)/chunk(s)",
            "🧹".yellow(),
            report.duplicates_removed
        );
    }

    println!("{} Total chunks created: {}", "✅".green(), chunks.len());
    report.chunks = chunks;

    Ok(report)
}

fn print_preview(content: &str) {
    let preview: String = content.chars().take(PREVIEW_CHARS).collect();
    println!("{}", format!("{} [CONTENT PREVIEW] {}", "=".repeat(20), "=".repeat(20)).dimmed());
    println!("{}", preview.trim());
    println!("{}", "=".repeat(62).dimmed());
}
