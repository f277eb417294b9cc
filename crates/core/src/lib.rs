pub mod categorize;
pub mod duplicates;
pub mod embeddings;
pub mod encoder;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod store;
pub mod stores;
pub mod traits;

pub use categorize::Categorizer;
pub use duplicates::{group_duplicates, DuplicateDetector, DuplicateReport};
pub use embeddings::{CharacterNgramEmbedder, Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use encoder::{describe, document_text, extract_domain};
pub use error::{GenerationError, ImportError, Result, SearchError};
pub use generation::{preset, ChatCompletionsClient, GeneratorConfig, PROVIDER_PRESETS};
pub use index::SemanticIndex;
pub use ingest::{import_file, import_markup, read_bookmark_file};
pub use models::{
    Answer, Bookmark, CategorySuggestion, ChatMessage, Collection, DuplicateGroup, Folder,
    ImportReport, IndexOptions, IndexStats, MergeAdvice, Role, SearchHit, SimilarityType,
    ROOT_FOLDER_PATH,
};
pub use orchestrator::RetrievalOrchestrator;
pub use parser::{parse, parse_file};
pub use stores::{MemoryStore, QdrantStore};
pub use traits::{TextGenerator, VectorStore};
