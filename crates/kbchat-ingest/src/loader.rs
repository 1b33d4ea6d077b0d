//! File loaders, dispatched by extension
//!
//! Every loader turns one file into one or more [`Document`]s. The content of
//! each document is normalized before it is returned.

use calamine::{Data, Reader};
use pulldown_cmark::{Event, Parser, TagEnd};
use scraper::Html;
use serde_json::{Value, json};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

use kbchat_core::{Document, Error, Result};

use crate::normalize::normalize_text;

/// Which loader handles a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    Csv,
    Pdf,
    Text,
    JsonLines,
    /// Word and spreadsheet files, markdown, HTML, or anything that decodes
    /// as UTF-8 text
    Fallback,
}

impl LoaderKind {
    /// Pick a loader from the lower-cased file extension
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => LoaderKind::Csv,
            "pdf" => LoaderKind::Pdf,
            "txt" => LoaderKind::Text,
            "jsonl" => LoaderKind::JsonLines,
            _ => LoaderKind::Fallback,
        }
    }

    /// Name shown in progress output
    pub fn name(&self) -> &'static str {
        match self {
            LoaderKind::Csv => "CSV loader",
            LoaderKind::Pdf => "PDF loader",
            LoaderKind::Text => "text loader",
            LoaderKind::JsonLines => "JSON Lines loader",
            LoaderKind::Fallback => "fallback loader",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, LoaderKind::Fallback)
    }
}

/// Load a file with the loader for its extension and normalize the text
pub fn load_single_document(path: &Path) -> Result<Vec<Document>> {
    let kind = LoaderKind::for_path(path);
    debug!("Loading {} with {}", path.display(), kind.name());

    let documents = match kind {
        LoaderKind::Csv => load_csv(path)?,
        LoaderKind::Pdf => load_pdf(path)?,
        LoaderKind::Text => load_text(path)?,
        LoaderKind::JsonLines => load_json_lines(path)?,
        LoaderKind::Fallback => load_fallback(path)?,
    };

    Ok(documents
        .into_iter()
        .map(|mut doc| {
            doc.content = normalize_text(&doc.content);
            doc
        })
        .collect())
}

fn source_of(path: &Path) -> String {
    path.display().to_string()
}

fn load_text(path: &Path) -> Result<Vec<Document>> {
    let source = source_of(path);
    let content = fs::read_to_string(path).map_err(|e| Error::loader(&source, e))?;
    Ok(vec![Document::new(content, source)])
}

/// One document per row, each line formatted as `header: value`
fn load_csv(path: &Path) -> Result<Vec<Document>> {
    let source = source_of(path);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::loader(&source, e))?;

    let headers = reader
        .headers()
        .map_err(|e| Error::loader(&source, e))?
        .clone();

    let mut documents = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::loader(&source, e))?;
        let content = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| format!("{}: {}", header.trim(), value.trim()))
            .collect::<Vec<_>>()
            .join("\n");

        documents.push(Document::new(content, source.clone()).with_metadata("row", json!(row)));
    }

    Ok(documents)
}

/// One document per page, numbered from 0; blank pages are dropped
fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    let source = source_of(path);
    let bytes = fs::read(path).map_err(|e| Error::loader(&source, e))?;

    // pdf-extract panics on some malformed files
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(&bytes))
        .map_err(|_| Error::loader(&source, "PDF parser panicked"))?
        .map_err(|e| Error::loader(&source, e))?;

    Ok(page_documents(pages, &source))
}

pub(crate) fn page_documents(pages: Vec<String>, source: &str) -> Vec<Document> {
    pages
        .into_iter()
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(page, content)| Document::new(content, source).with_metadata("page", json!(page)))
        .collect()
}

/// One document per line, taken from the line's `text` field
fn load_json_lines(path: &Path) -> Result<Vec<Document>> {
    let source = source_of(path);
    let content = fs::read_to_string(path).map_err(|e| Error::loader(&source, e))?;
    parse_json_lines(&content, &source)
}

pub(crate) fn parse_json_lines(content: &str, source: &str) -> Result<Vec<Document>> {
    let mut documents = Vec::new();

    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(line)
            .map_err(|e| Error::loader(source, format!("line {}: {}", i + 1, e)))?;

        let text = value.get("text").and_then(|t| t.as_str()).ok_or_else(|| {
            Error::loader(source, format!("line {}: missing string field \"text\"", i + 1))
        })?;

        documents.push(Document::new(text, source).with_metadata("seq_num", json!(i + 1)));
    }

    Ok(documents)
}

/// Office files are unpacked, markdown and HTML are reduced to their text,
/// anything else must be UTF-8
fn load_fallback(path: &Path) -> Result<Vec<Document>> {
    let source = source_of(path);
    let bytes = fs::read(path).map_err(|e| Error::loader(&source, e))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "docx" => return Ok(vec![Document::new(docx_to_text(&bytes, &source)?, source)]),
        "xlsx" | "xlsm" | "xls" | "ods" => return spreadsheet_documents(bytes, &source),
        _ => {}
    }

    let raw = String::from_utf8(bytes).map_err(|_| {
        Error::UnsupportedFormat(format!("{}: binary or non-UTF-8 content", source))
    })?;

    let content = match ext.as_str() {
        "md" | "markdown" => markdown_to_text(&raw),
        "html" | "htm" => html_to_text(&raw),
        _ => raw,
    };

    Ok(vec![Document::new(content, source)])
}

/// Paragraph text of a Word document, one paragraph per line
fn docx_to_text(bytes: &[u8], source: &str) -> Result<String> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| Error::loader(source, e))?;
    let mut out = String::new();

    for child in docx.document.children {
        if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
            for child in paragraph.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(text) = child {
                            out.push_str(&text.text);
                        }
                    }
                }
            }
            out.push('\n');
        }
    }

    Ok(out)
}

/// One document per non-empty sheet, rows rendered like CSV rows
///
/// The first row of a sheet is its header; every later row becomes
/// `header: value` lines, rows separated by a blank line.
fn spreadsheet_documents(bytes: Vec<u8>, source: &str) -> Result<Vec<Document>> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| Error::loader(source, e))?;

    let mut documents = Vec::new();
    for sheet in workbook.sheet_names().to_vec() {
        let range = match workbook.worksheet_range(&sheet) {
            Ok(range) => range,
            Err(e) => {
                warn!("Skipping sheet {} of {}: {}", sheet, source, e);
                continue;
            }
        };

        let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
        let Some(headers) = rows.next() else {
            continue;
        };

        let content = rows
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .map(|row| {
                headers
                    .iter()
                    .zip(row.iter())
                    .map(|(header, value)| format!("{}: {}", header, value))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        if !content.trim().is_empty() {
            documents.push(Document::new(content, source).with_metadata("sheet", json!(sheet)));
        }
    }

    Ok(documents)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn markdown_to_text(markdown: &str) -> String {
    let mut out = String::new();

    for event in Parser::new(markdown) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock,
            ) => out.push_str("\n\n"),
            _ => {}
        }
    }

    out
}

pub(crate) fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let parent = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name().to_string()));
        if matches!(parent.as_deref(), Some("script") | Some("style") | Some("head") | Some("title")) {
            continue;
        }

        let text: &str = text;
        if !text.trim().is_empty() {
            out.push_str(text.trim());
            out.push('\n');
        }
    }

    out
}
