pub mod api;
pub mod cache;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod io;
pub mod llm;
pub mod models;

pub use api::{AppState, build_router, serve};
pub use cache::{CacheEntry, FileCache, content_hash};
pub use chat::{ChatEngine, ChatMemory};
pub use config::AppConfig;
pub use error::{IngestError, IngestResult};
pub use index::{SearchResult, VectorIndex};
pub use ingest::{
    ParserConfig, build_chunks, clean_text, count_tokens, is_empty_or_noise, parse_mrt_bytes,
    parse_mrt_file, parse_mrt_str,
};
pub use io::{AnalysisReport, CorpusFile, CorpusStats, load_transcripts};
pub use llm::{ChatModel, Embedder, OpenAiClient, OpenAiConfig};
pub use models::{Chunk, ChunkConfig, Transcript, TranscriptMetadata, Utterance};
