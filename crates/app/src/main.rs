use bookmark_rag_core::{
    import_file, ChatCompletionsClient, CharacterNgramEmbedder, Categorizer, DuplicateDetector,
    Embedder, GeneratorConfig, MemoryStore, OpenAiEmbedder, QdrantStore, RetrievalOrchestrator,
    SemanticIndex, VectorStore,
};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type DynIndex = SemanticIndex<Box<dyn VectorStore>, Box<dyn Embedder>>;

#[derive(Clone, Copy, ValueEnum)]
enum StoreKind {
    Qdrant,
    Memory,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbeddingProvider {
    Ngram,
    Openai,
}

#[derive(Parser)]
#[command(name = "bookmark-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Vector store backend
    #[arg(long, value_enum, env = "BOOKMARK_RAG_STORE", default_value = "qdrant")]
    store: StoreKind,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "BOOKMARK_RAG_COLLECTION", default_value = "bookmarks")]
    collection: String,

    /// Embedding backend
    #[arg(long, value_enum, default_value = "ngram")]
    embedding_provider: EmbeddingProvider,

    /// Base URL of an OpenAI-compatible embeddings endpoint
    #[arg(long, default_value = "https://api.openai.com/v1")]
    embedding_url: String,

    #[arg(long, default_value = "text-embedding-3-small")]
    embedding_model: String,

    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true)]
    embedding_api_key: Option<String>,

    /// Vector width; must match the remote model when using openai
    #[arg(long, default_value = "128")]
    embedding_dimensions: usize,

    /// Chat provider: openai, deepseek, kimi, glm, ollama or custom
    #[arg(long, env = "BOOKMARK_RAG_PROVIDER", default_value = "deepseek")]
    provider: String,

    #[arg(long)]
    llm_base_url: Option<String>,

    #[arg(long)]
    llm_model: Option<String>,

    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,

    #[arg(long, default_value = "0.7")]
    temperature: f32,

    /// Timeout for every outbound HTTP call
    #[arg(long, default_value = "60")]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Parse an exported bookmark file and index it.
    Import {
        /// Netscape bookmark HTML file.
        #[arg(long)]
        file: PathBuf,
        /// Drop everything already indexed first.
        #[arg(long, default_value_t = false)]
        replace: bool,
    },
    /// Semantic search over indexed bookmarks.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "10")]
        top_k: usize,
        /// Only return bookmarks whose folder path contains this text.
        #[arg(long)]
        folder: Option<String>,
    },
    /// Ask a question answered from retrieved bookmarks.
    Chat {
        #[arg(long)]
        message: String,
        #[arg(long, default_value = "5")]
        top_k: usize,
    },
    /// List exact-URL and similar-title duplicate groups.
    Duplicates {
        /// Also ask the chat provider how to merge each group.
        #[arg(long, default_value_t = false)]
        advice: bool,
    },
    /// Ask the chat provider for better folders.
    Categorize,
    /// Show index size and the configured chat provider.
    Stats,
}

impl Cli {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn build_index(&self) -> anyhow::Result<DynIndex> {
        let store: Box<dyn VectorStore> = match self.store {
            StoreKind::Qdrant => Box::new(
                QdrantStore::new(&self.qdrant_url, &self.collection, self.timeout())
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?,
            ),
            StoreKind::Memory => Box::new(MemoryStore::new()),
        };

        let embedder: Box<dyn Embedder> = match self.embedding_provider {
            EmbeddingProvider::Ngram => Box::new(CharacterNgramEmbedder {
                dimensions: self.embedding_dimensions,
            }),
            EmbeddingProvider::Openai => Box::new(
                OpenAiEmbedder::new(
                    &self.embedding_url,
                    &self.embedding_model,
                    self.embedding_api_key.clone(),
                    self.embedding_dimensions,
                    self.timeout(),
                )
                .map_err(|error| anyhow::anyhow!(error.to_string()))?,
            ),
        };

        Ok(SemanticIndex::new(store, embedder))
    }

    fn build_generator(&self) -> anyhow::Result<ChatCompletionsClient> {
        ChatCompletionsClient::from_config(GeneratorConfig {
            provider: self.provider.clone(),
            base_url: self.llm_base_url.clone(),
            model: self.llm_model.clone(),
            api_key: self.llm_api_key.clone(),
            temperature: self.temperature,
            timeout: self.timeout(),
            ..GeneratorConfig::default()
        })
        .map_err(|error| anyhow::anyhow!(error.to_string()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let index = Arc::new(cli.build_index()?);

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "bookmark-rag boot"
    );

    if matches!(cli.store, StoreKind::Memory) {
        warn!("memory store selected; the index lives only for this invocation");
    }

    match &cli.command {
        Command::Import { file, replace } => {
            let report = import_file(index.as_ref(), file, *replace)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!(
                "{} bookmarks parsed, {} folders, {} indexed (sha256 {})",
                report.bookmarks_parsed, report.folders, report.indexed, report.checksum
            );
        }
        Command::Search {
            query,
            top_k,
            folder,
        } => {
            let hits = index.query(query, *top_k, folder.as_deref()).await;
            println!("query: {query}");
            if hits.is_empty() {
                println!("no results");
            }
            for hit in hits {
                println!(
                    "score={:.4} [{}] {}",
                    hit.score, hit.bookmark.folder_path, hit.bookmark.title
                );
                println!("  {}", hit.bookmark.url);
            }
        }
        Command::Chat { message, top_k } => {
            let generator = Arc::new(cli.build_generator()?);
            let orchestrator = RetrievalOrchestrator::new(index.clone(), generator);
            let answer = orchestrator
                .answer(message, *top_k)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("{}", answer.text);
            if !answer.sources.is_empty() {
                println!();
                println!("sources:");
                for (position, source) in answer.sources.iter().enumerate() {
                    println!("  {}. {} <{}>", position + 1, source.title, source.url);
                }
            }
        }
        Command::Duplicates { advice } => {
            let detector = DuplicateDetector::new(index.clone());
            let groups = detector.detect().await;
            println!("{} duplicate group(s)", groups.len());

            for (position, group) in groups.iter().enumerate() {
                println!(
                    "[{position}] {} x{} {}",
                    group.similarity_type.as_str(),
                    group.count(),
                    group.title
                );
                println!("  url: {}", group.url);
                for location in &group.locations {
                    println!("  in: {location}");
                }
                println!("  {}", group.suggestion);
            }

            if *advice && !groups.is_empty() {
                let generator = cli.build_generator()?;
                for item in detector.merge_advice(&groups, &generator).await {
                    println!(
                        "advice: group={} duplicate={} {}",
                        item.group_index, item.is_duplicate, item.suggestion
                    );
                }
            }
        }
        Command::Categorize => {
            let generator = Arc::new(cli.build_generator()?);
            let suggestions = Categorizer::new(index.clone(), generator).suggest().await;
            if suggestions.is_empty() {
                println!("no suggestions");
            }
            for suggestion in suggestions {
                println!(
                    "{}: {} -> {} ({})",
                    suggestion.bookmark_title,
                    suggestion.current_folder,
                    suggestion.suggested_folder,
                    suggestion.reason
                );
            }
        }
        Command::Stats => match cli.build_generator() {
            Ok(generator) => {
                let stats = RetrievalOrchestrator::new(index.clone(), Arc::new(generator))
                    .stats()
                    .await;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&stats)
                        .map_err(|error| anyhow::anyhow!(error.to_string()))?
                );
            }
            Err(error) => {
                warn!(error = %error, "chat provider not configured");
                let total = index
                    .count()
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                println!("total_bookmarks: {total}");
            }
        },
    }

    Ok(())
}
