use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::*;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Import from our modular crates
use kbchat_cli::{
    ChatCommand, display_banner, handle_input_with_history, print_answer, print_error, print_help,
    print_sources,
};
use kbchat_core::{Chunk, Embedder, RAGEngine};
use kbchat_groq::GroqClient;
use kbchat_ingest::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, IngestConfig, IngestReport, SUPPORTED_EXTENSIONS,
    TextSplitter, load_and_chunk_directory,
};
use kbchat_rag::{
    DEFAULT_COLLECTION, DEFAULT_QDRANT_URL, DEFAULT_TOP_K, EmbeddingConfig, HashingEmbedder,
    HttpEmbedder, LocalVectorStore, QdrantVectorStore, RetrievalQA,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// In-memory, rebuilt every session
    Local,
    Qdrant,
}

#[derive(Parser, Debug)]
#[command(name = "kbchat")]
#[command(about = "Ask questions about a directory of documents", long_about = None)]
struct Cli {
    /// Directory to load instead of prompting for one
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Answer a single question and exit (needs --dir)
    #[arg(short, long)]
    question: Option<String>,

    /// Chunks retrieved per question
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Print the start of every loaded file
    #[arg(long)]
    preview: bool,

    #[arg(long, value_enum, default_value_t = StoreKind::Local)]
    store: StoreKind,

    #[arg(long, default_value = DEFAULT_QDRANT_URL)]
    qdrant_url: String,

    #[arg(long, default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Groq model, overrides GROQ_MODEL
    #[arg(long)]
    model: Option<String>,

    /// Debug logging for kbchat crates (RUST_LOG wins when set)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            preview: self.preview,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,kbchat=debug,kbchat_core=debug,kbchat_ingest=debug,kbchat_groq=debug,kbchat_rag=debug"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Fail fast instead of once per directory
    TextSplitter::new(cli.chunk_size, cli.chunk_overlap)?;

    if let Some(ref question) = cli.question {
        return run_once(&cli, question).await;
    }

    display_banner();
    run_interactive(&cli).await
}

/// Load a directory off the async runtime
async fn ingest(dir: &Path, config: IngestConfig) -> Result<IngestReport> {
    let dir = dir.to_path_buf();
    let report = tokio::task::spawn_blocking(move || load_and_chunk_directory(&dir, &config)).await??;
    Ok(report)
}

async fn build_embedder() -> Result<Arc<dyn Embedder>> {
    match EmbeddingConfig::from_env() {
        Some(config) => {
            info!("Using embedding endpoint {}", config.api_url);
            Ok(Arc::new(HttpEmbedder::connect(config).await?))
        }
        None => Ok(Arc::new(HashingEmbedder::default())),
    }
}

async fn build_chatbot(chunks: &[Chunk], cli: &Cli) -> Result<Box<dyn RAGEngine>> {
    let mut llm = GroqClient::from_env()?;
    if let Some(ref model) = cli.model {
        llm = llm.with_model(model.clone());
    }

    let embedder = build_embedder().await?;

    println!("Creating embeddings and vector store...");
    let engine: Box<dyn RAGEngine> = match cli.store {
        StoreKind::Local => Box::new(
            RetrievalQA::build(chunks, embedder, LocalVectorStore::new(), llm, cli.top_k).await?,
        ),
        StoreKind::Qdrant => {
            let store = QdrantVectorStore::new(&cli.qdrant_url, &cli.collection, embedder.dimension())
                .with_api_key(env::var("QDRANT_API_KEY").ok());
            Box::new(RetrievalQA::build(chunks, embedder, store, llm, cli.top_k).await?)
        }
    };
    println!("Vector store created successfully.");

    Ok(engine)
}

fn report_no_documents(dir: &Path) {
    print_error(&format!("No documents loaded from '{}'", dir.display()));
    println!(
        "Make sure the directory contains supported files ({})",
        SUPPORTED_EXTENSIONS.join(", ")
    );
}

async fn answer(chatbot: &dyn RAGEngine, question: &str, show_sources: bool) {
    println!("{} Thinking...", "🤖".blue());

    match chatbot.ask_with_sources(question).await {
        Ok(answer) => {
            print_answer(&answer.text);
            if show_sources {
                print_sources(&answer.sources);
            }
        }
        Err(e) => {
            warn!("Question failed: {}", e);
            print_error(&format!("Failed to answer: {}", e));
        }
    }
}

async fn run_once(cli: &Cli, question: &str) -> Result<()> {
    let dir = cli.dir.as_deref().context("--question needs --dir")?;

    let report = ingest(dir, cli.ingest_config()).await?;
    if report.is_empty() {
        report_no_documents(dir);
        bail!("no documents loaded");
    }

    let chatbot = build_chatbot(&report.chunks, cli).await?;
    let answer = chatbot.ask_with_sources(question).await?;
    print_answer(&answer.text);

    Ok(())
}

async fn run_interactive(cli: &Cli) -> Result<()> {
    let mut pending_dir = cli.dir.clone();
    let mut history = Vec::new();
    let mut chatbot: Option<Box<dyn RAGEngine>> = None;
    let mut show_sources = false;

    loop {
        let Some(engine) = chatbot.as_deref() else {
            let dir = match pending_dir.take() {
                Some(dir) => dir,
                None => {
                    println!();
                    match handle_input_with_history("Enter data directory path (e.g., ./data):", &mut history)? {
                        Some(line) => PathBuf::from(line.trim()),
                        None => break,
                    }
                }
            };

            if !dir.is_dir() {
                print_error(&format!("Directory '{}' not found!", dir.display()));
                continue;
            }

            let report = match ingest(&dir, cli.ingest_config()).await {
                Ok(report) => report,
                Err(e) => {
                    print_error(&e.to_string());
                    continue;
                }
            };

            if report.is_empty() {
                report_no_documents(&dir);
                continue;
            }

            match build_chatbot(&report.chunks, cli).await {
                Ok(engine) => {
                    chatbot = Some(engine);
                    println!(
                        "\n{} Ask questions or type 'exit' to quit, 'new' for new directory, 'help' for more",
                        "Ready!".green().bold()
                    );
                }
                Err(e) => {
                    print_error(&format!("Failed to initialize chatbot: {}", e));
                    break;
                }
            }
            continue;
        };

        println!();
        let Some(input) = handle_input_with_history(">", &mut history)? else {
            println!("\n{}\n", "Goodbye!".green());
            break;
        };

        match ChatCommand::parse(&input) {
            ChatCommand::Empty => {}
            ChatCommand::Exit => {
                println!("\n{}\n", "Goodbye!".green());
                break;
            }
            ChatCommand::New => {
                println!("\nResetting chatbot...\n");
                chatbot = None;
            }
            ChatCommand::Help => print_help(),
            ChatCommand::ToggleSources => {
                show_sources = !show_sources;
                let state = if show_sources { "on" } else { "off" };
                println!("Showing sources: {}", state.bold());
            }
            ChatCommand::Debug(question) => {
                if question.is_empty() {
                    print_error("Usage: debug <question>");
                } else {
                    answer(engine, &question, true).await;
                }
            }
            ChatCommand::Ask(question) => answer(engine, &question, show_sources).await,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["kbchat"]);
        assert_eq!(cli.top_k, 3);
        assert_eq!(cli.chunk_size, 1000);
        assert_eq!(cli.chunk_overlap, 200);
        assert_eq!(cli.store, StoreKind::Local);
        assert_eq!(cli.collection, "kbchat");
        assert!(cli.dir.is_none());
        assert!(!cli.preview);
    }

    #[test]
    fn test_one_shot_flags() {
        let cli = Cli::parse_from([
            "kbchat", "-d", "./data", "-q", "When does it open?", "--store", "qdrant", "--top-k", "5",
        ]);
        assert_eq!(cli.dir, Some(PathBuf::from("./data")));
        assert_eq!(cli.question.as_deref(), Some("When does it open?"));
        assert_eq!(cli.store, StoreKind::Qdrant);
        assert_eq!(cli.top_k, 5);
    }

    #[test]
    fn test_ingest_config_from_flags() {
        let cli = Cli::parse_from(["kbchat", "--chunk-size", "500", "--chunk-overlap", "50", "--preview"]);
        let config = cli.ingest_config();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert!(config.preview);
    }
}
