use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{IngestError, IngestResult};
use crate::ingest::ParserConfig;
use crate::models::ChunkConfig;

/// Application settings, read from the environment (and `.env` when present)
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// API key for the hosted completion/embedding service
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API
    pub openai_base_url: String,
    /// Chat completion model
    pub openai_model: String,
    /// Embedding model
    pub embedding_model: String,
    /// Target chunk size in tokens
    pub chunk_size: usize,
    /// Tokens shared between consecutive chunks
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question
    pub similarity_top_k: usize,
    /// Token budget for conversation memory
    pub chat_memory_token_limit: usize,
    /// Preamble notes longer than this are truncated
    pub notes_max_length: usize,
    pub api_host: String,
    pub api_port: u16,
    pub max_file_size_mb: u64,
    pub max_files_per_upload: usize,
    /// Lower-cased extensions including the leading dot
    pub allowed_file_types: Vec<String>,
    pub data_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Where the interactive client finds the API server
    pub cli_api_url: String,
    /// Request timeout for the interactive client, in seconds
    pub cli_api_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            chunk_size: 512,
            chunk_overlap: 50,
            similarity_top_k: 5,
            chat_memory_token_limit: 3000,
            notes_max_length: 500,
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            max_file_size_mb: 10,
            max_files_per_upload: 5,
            allowed_file_types: vec![".mrt".to_string()],
            data_dir: PathBuf::from("data/transcripts"),
            storage_dir: PathBuf::from("storage"),
            prompts_dir: PathBuf::from("prompts"),
            logs_dir: PathBuf::from("logs"),
            cli_api_url: "http://localhost:8000".to_string(),
            cli_api_timeout_secs: 60,
        }
    }
}

impl AppConfig {
    /// Load `.env` (if any) and build the config from process environment
    pub fn from_env() -> IngestResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> IngestResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);

        Ok(Self {
            openai_api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            openai_base_url: string("OPENAI_BASE_URL", defaults.openai_base_url),
            openai_model: string("OPENAI_MODEL", defaults.openai_model),
            embedding_model: string("EMBEDDING_MODEL", defaults.embedding_model),
            chunk_size: parse_var(&lookup, "CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_var(&lookup, "CHUNK_OVERLAP", defaults.chunk_overlap)?,
            similarity_top_k: parse_var(&lookup, "SIMILARITY_TOP_K", defaults.similarity_top_k)?,
            chat_memory_token_limit: parse_var(
                &lookup,
                "CHAT_MEMORY_TOKEN_LIMIT",
                defaults.chat_memory_token_limit,
            )?,
            notes_max_length: parse_var(&lookup, "NOTES_MAX_LENGTH", defaults.notes_max_length)?,
            api_host: string("API_HOST", defaults.api_host),
            api_port: parse_var(&lookup, "API_PORT", defaults.api_port)?,
            max_file_size_mb: parse_var(&lookup, "MAX_FILE_SIZE_MB", defaults.max_file_size_mb)?,
            max_files_per_upload: parse_var(
                &lookup,
                "MAX_FILES_PER_UPLOAD",
                defaults.max_files_per_upload,
            )?,
            allowed_file_types: lookup("ALLOWED_FILE_TYPES")
                .map(|raw| parse_extensions(&raw))
                .unwrap_or(defaults.allowed_file_types),
            data_dir: lookup("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            storage_dir: lookup("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            prompts_dir: lookup("PROMPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.prompts_dir),
            logs_dir: lookup("LOGS_DIR").map(PathBuf::from).unwrap_or(defaults.logs_dir),
            cli_api_url: string("CLI_API_URL", defaults.cli_api_url),
            cli_api_timeout_secs: parse_var(
                &lookup,
                "CLI_API_TIMEOUT",
                defaults.cli_api_timeout_secs,
            )?,
        })
    }

    /// Check settings needed by commands that call the hosted API
    pub fn validate(&self) -> IngestResult<()> {
        if self.openai_api_key.is_none() {
            return Err(IngestError::config(
                "OPENAI_API_KEY not set. Please set it in .env file or as environment variable.",
            ));
        }
        self.validate_chunking()
    }

    /// Check the chunk size/overlap pair
    pub fn validate_chunking(&self) -> IngestResult<()> {
        if self.chunk_size == 0 {
            return Err(IngestError::config("CHUNK_SIZE must be greater than 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Create storage, prompt and log directories if missing
    pub fn ensure_directories(&self) -> IngestResult<()> {
        for dir in [&self.storage_dir, &self.prompts_dir, &self.logs_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            notes_max_length: self.notes_max_length,
        }
    }

    pub fn chunk_config(&self) -> IngestResult<ChunkConfig> {
        ChunkConfig::new(self.chunk_size, self.chunk_overlap)
    }

    /// Location of the persisted file cache
    pub fn cache_path(&self) -> PathBuf {
        self.storage_dir.join("file_cache.json")
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> IngestResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            IngestError::config(format!("{} must be a number, got {:?}", key, raw))
        }),
        None => Ok(default),
    }
}

/// Split a comma-separated extension list, normalizing case and the leading dot
fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().to_lowercase())
        .filter(|ext| !ext.is_empty())
        .map(|ext| {
            if ext.starts_with('.') {
                ext
            } else {
                format!(".{}", ext)
            }
        })
        .collect()
}
