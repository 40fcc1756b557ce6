//! # ragcite CLI
//!
//! Command-line interface for ragcite: chunk documents, ask questions over
//! them, and turn numbered citation markers in generated answers into
//! structured annotations.
//!
//! ## Commands
//!
//! - `ragcite chunk <FILE>` - Show how a document is chunked
//! - `ragcite cite <RESPONSE> <CHUNKS>` - Parse citations in a saved response
//! - `ragcite ask <QUESTION> --doc <FILE>...` - Answer a question with citations
//! - `ragcite config show|init|path` - Manage configuration
//!
//! ## Examples
//!
//! ```bash
//! # Inspect chunk boundaries
//! ragcite chunk report.txt
//!
//! # Ask a question, streaming the answer
//! ragcite ask "How did revenue change?" --doc q3.txt --doc q4.txt --stream
//!
//! # Get JSON output
//! ragcite chunk report.txt --format json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use futures::future::try_join_all;
use ragcite_chunker::HierarchicalChunker;
use ragcite_cite::{CitationParser, build_source_citations};
use ragcite_core::{
    AnnotatedText, BlockQuote, Chunk, Chunker, CompletionProvider, Embedder, SourceCitation,
    VectorBackend,
};
use ragcite_index::{
    Answer, AnswerEvent, AnswerRequest, NewDocument, PipelineConfig, RetrievalPipeline,
    VectorIndex,
};
use ragcite_providers::{
    EmbedderPool, HashingEmbedder, OpenAiCompletion, OpenAiEmbedder, OpenAiSettings,
};
use ragcite_store::{Backend, RemoteSettings};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod config;
mod history;

use config::{BackendKind, Config, EmbeddingProvider, api_key, data_dir};
use history::ConversationFiles;

#[derive(Parser)]
#[command(name = "ragcite")]
#[command(about = "Retrieval-augmented answers with source citations")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/ragcite/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a text file into chunks
    Chunk {
        /// Plain-text document
        file: PathBuf,

        /// Document id used in chunk ids (default: file stem)
        #[arg(long)]
        document_id: Option<String>,
    },

    /// Parse citation markers in a response against retrieved chunks
    Cite {
        /// File holding the generated response
        response: PathBuf,

        /// JSON array of the chunks the response was generated from, in rank order
        chunks: PathBuf,
    },

    /// Index documents and answer a question about them
    Ask {
        /// Question to answer
        question: String,

        /// Plain-text documents to search
        #[arg(short, long = "doc", required = true)]
        docs: Vec<PathBuf>,

        /// Continue an earlier conversation
        #[arg(long)]
        conversation: Option<String>,

        /// Maximum chunks retrieved
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print the answer as it is generated
        #[arg(long)]
        stream: bool,

        /// Ask for a plain answer without citation markers
        #[arg(long)]
        no_citations: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print sample configuration file
    Init,
    /// Show config file path
    Path,
}

/// Output structure for the `cite` command.
#[derive(Serialize)]
struct CiteOutput {
    annotated: AnnotatedText,
    block_quotes: Vec<BlockQuote>,
    sources: Vec<SourceCitation>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config from file or CLI-specified path
    let config = if let Some(ref path) = cli.config {
        Config::load_from(Some(path.clone()))
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        Config::load().context("Failed to load config")?
    };

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(&config.logging.level)
            .with_context(|| format!("Invalid log level {:?}", config.logging.level))?
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Chunk { file, document_id } => {
            let text = read_text(&file).await?;
            let document_id = document_id.unwrap_or_else(|| file_stem(&file));

            let chunker = HierarchicalChunker::new(config.chunking.clone())
                .context("Invalid chunking configuration")?;
            let chunks = chunker.chunk(&document_id, &text);
            info!("Split {} into {} chunks", file.display(), chunks.len());

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&chunks)?);
                }
                OutputFormat::Text => print_chunks(&chunks),
            }
        }

        Commands::Cite {
            response,
            chunks: chunks_path,
        } => {
            let text = read_text(&response).await?;
            let raw = read_text(&chunks_path).await?;
            let chunks: Vec<Chunk> = serde_json::from_str(&raw).with_context(|| {
                format!("Failed to parse chunks from {}", chunks_path.display())
            })?;

            let parser = CitationParser::new();
            let annotated = parser.parse(&text, &chunks);
            let block_quotes = parser.extract_block_quotes(&text, &chunks);
            let sources = build_source_citations(&chunks, &annotated.annotations);

            let output = CiteOutput {
                annotated,
                block_quotes,
                sources,
            };
            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    println!("{}\n", output.annotated.formatted_text);
                    print_sources(&output.sources);
                }
            }
        }

        Commands::Ask {
            question,
            docs,
            conversation,
            limit,
            stream,
            no_citations,
        } => {
            let pipeline = create_pipeline(&config).await?;

            let handles = docs
                .iter()
                .enumerate()
                .map(|(i, path)| load_document(i, path))
                .collect::<Vec<_>>();
            let documents = try_join_all(handles).await?;
            let handles: Vec<_> = documents
                .into_iter()
                .map(|document| pipeline.spawn_ingest(document))
                .collect();
            let records = try_join_all(handles.into_iter().map(|h| h.wait()))
                .await
                .context("Failed to index documents")?;
            let chunk_total: u32 = records.iter().map(|r| r.chunk_count).sum();
            info!("Indexed {} documents ({} chunks)", records.len(), chunk_total);

            let mut request = AnswerRequest::new(question);
            request.conversation_id = conversation;
            request.limit = limit;
            request.use_annotations = !no_citations;

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling");
                    ctrl_c.cancel();
                }
            });

            let answer = if stream {
                stream_answer(&pipeline, request, cancel, cli.format).await?
            } else {
                pipeline
                    .answer(request, &cancel)
                    .await
                    .context("Failed to answer question")?
            };

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&answer)?);
                }
                OutputFormat::Text => print_answer(&answer, stream),
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&config)
                            .context("Failed to serialize config")?
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "{}",
                        toml::to_string_pretty(&config).context("Failed to serialize config")?
                    );
                }
            },
            ConfigAction::Init => {
                println!("{}", Config::sample_toml());
            }
            ConfigAction::Path => {
                if let Some(path) = Config::config_path() {
                    println!("{}", path.display());
                } else {
                    println!("Could not determine config directory");
                }
            }
        },
    }

    Ok(())
}

/// Build the pipeline described by `config`.
async fn create_pipeline(config: &Config) -> Result<RetrievalPipeline> {
    let chunker = HierarchicalChunker::new(config.chunking.clone())
        .context("Invalid chunking configuration")?;

    let embedding = &config.embedding;
    let embedder: Arc<dyn Embedder> = match embedding.provider {
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::with_dimension(embedding.dimension)),
        EmbeddingProvider::OpenAi => {
            let settings = OpenAiSettings {
                api_key: api_key(&embedding.api_key_env).with_context(|| {
                    format!("Set {} to use the openai embedder", embedding.api_key_env)
                })?,
                base_url: embedding.base_url.clone(),
                model: embedding.model.clone(),
                timeout: embedding.timeout(),
            };
            Arc::new(
                OpenAiEmbedder::new(&settings, embedding.dimension)
                    .context("Failed to create embedder")?,
            )
        }
    };
    let pool = EmbedderPool::with_min_interval(
        embedder,
        embedding.max_concurrent,
        embedding.min_interval(),
    );

    let backend_config = match config.backend.kind {
        BackendKind::Memory => ragcite_store::BackendConfig::Memory,
        BackendKind::Remote => ragcite_store::BackendConfig::Remote {
            settings: RemoteSettings {
                url: config.backend.url.clone(),
                api_key: api_key(&config.backend.api_key_env).unwrap_or_default(),
                namespace: config.backend.namespace.clone(),
                timeout: config.backend.timeout(),
            },
            fallback_to_memory: config.backend.fallback_to_memory,
        },
    };
    let backend = Backend::connect(&backend_config, pool.dimension())
        .await
        .context("Failed to initialize vector backend")?;
    let index = VectorIndex::new(
        Arc::new(backend) as Arc<dyn VectorBackend>,
        Arc::new(pool),
    );

    let completion_config = &config.completion;
    let settings = OpenAiSettings {
        api_key: api_key(&completion_config.api_key_env).with_context(|| {
            format!(
                "Set {} to generate answers",
                completion_config.api_key_env
            )
        })?,
        base_url: completion_config.base_url.clone(),
        model: completion_config.model.clone(),
        timeout: completion_config.timeout(),
    };
    let completion = OpenAiCompletion::new(&settings).context("Failed to create completion client")?;

    let pipeline_config = PipelineConfig {
        retrieval_limit: config.retrieval.limit,
        history_messages: config.retrieval.history,
        max_tokens: completion_config.max_tokens,
        temperature: completion_config.temperature,
    };

    let mut pipeline = RetrievalPipeline::new(
        Arc::new(chunker) as Arc<dyn Chunker>,
        Arc::new(index),
        Arc::new(completion) as Arc<dyn CompletionProvider>,
    )
    .with_config(pipeline_config);

    if let Some(dir) = data_dir() {
        let conversations = ConversationFiles::new(dir.join("conversations"));
        info!("Conversations stored in {}", conversations.dir().display());
        pipeline = pipeline.with_conversations(Arc::new(conversations));
    } else {
        warn!("Could not determine data directory, conversations will not be saved");
    }

    Ok(pipeline)
}

/// Stream the answer to stdout in text mode and return the final result.
async fn stream_answer(
    pipeline: &RetrievalPipeline,
    request: AnswerRequest,
    cancel: CancellationToken,
    format: OutputFormat,
) -> Result<Answer> {
    let mut events = pipeline
        .answer_streaming(request, cancel)
        .await
        .context("Failed to start answer")?;

    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        match event.context("Answer stream failed")? {
            AnswerEvent::Fragment(text) => {
                if matches!(format, OutputFormat::Text) {
                    write!(stdout, "{text}")?;
                    stdout.flush()?;
                }
            }
            AnswerEvent::Done(answer) => {
                if matches!(format, OutputFormat::Text) {
                    writeln!(stdout)?;
                }
                return Ok(*answer);
            }
        }
    }
    anyhow::bail!("Answer stream ended without a result")
}

async fn load_document(position: usize, path: &Path) -> Result<NewDocument> {
    let text = read_text(path).await?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string());
    Ok(NewDocument::new(format!("doc-{}", position + 1), name, text))
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "document".to_string(), |s| s.to_string_lossy().to_string())
}

fn print_chunks(chunks: &[Chunk]) {
    if chunks.is_empty() {
        println!("No chunks produced.");
        return;
    }
    for chunk in chunks {
        let method = chunk.metadata.method.map_or("unknown", |m| m.as_str());
        print!("{}. {} ({} chars, {method}", chunk.chunk_index, chunk.id, chunk.char_len());
        if chunk.metadata.merged {
            print!(", merged");
        }
        println!(")");
        if let Some(ref title) = chunk.metadata.section_title {
            println!("   Section: {title}");
        }
        println!("   {}", truncate(&chunk.content, 100));
        println!();
    }
}

fn print_answer(answer: &Answer, streamed: bool) {
    if !streamed {
        match answer.annotated_response {
            Some(ref annotated) => println!("{}", annotated.formatted_text),
            None => println!("{}", answer.response),
        }
    }
    println!();
    print_sources(&answer.sources);
    println!("Conversation: {}", answer.conversation_id);
}

fn print_sources(sources: &[SourceCitation]) {
    if sources.is_empty() {
        println!("No sources cited.");
        return;
    }
    println!("Sources:");
    for (i, source) in sources.iter().enumerate() {
        print!("{}. {}", i + 1, source.document_name);
        if let Some(page) = source.page_number {
            print!(", page {page}");
        }
        if let Some(ref section) = source.section {
            print!(", {section}");
        }
        println!(
            " (relevance: {:.3}, cited {}x)",
            source.relevance_score, source.citation_count
        );
        println!("   {}", truncate(&source.content, 100));
    }
    println!();
}

/// Truncate a string to `max_len` characters, adding an ellipsis if needed.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.replace('\n', " ").replace('\r', "");
    if s.chars().count() <= max_len {
        s
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
