use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::{CacheEntry, FileCache, content_hash};
use crate::chat::ChatEngine;
use crate::config::AppConfig;
use crate::index::VectorIndex;
use crate::ingest::{build_chunks, process_file, validate_file_size, validate_file_type};
use crate::llm::{ChatModel, Embedder, OpenAiClient, OpenAiConfig, load_system_prompt};

/// Shared server state; one lock serializes index updates and chat turns
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub workspace: Arc<Mutex<Workspace>>,
    /// Mirrors `!workspace.index.is_empty()` so health checks skip the lock
    index_loaded: Arc<AtomicBool>,
}

/// Everything mutated by requests
pub struct Workspace {
    pub cache: FileCache,
    pub index: VectorIndex,
    pub engine: ChatEngine,
    /// Directory the index is persisted to; `None` keeps it in memory
    pub storage_dir: Option<PathBuf>,
}

/// What happened to one uploaded file
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Indexed { meeting_id: String, chunks: usize },
    Cached,
}

impl AppState {
    pub fn new(config: AppConfig, workspace: Workspace) -> Self {
        let index_loaded = Arc::new(AtomicBool::new(!workspace.index.is_empty()));
        Self {
            config: Arc::new(config),
            workspace: Arc::new(Mutex::new(workspace)),
            index_loaded,
        }
    }

    pub fn index_loaded(&self) -> bool {
        self.index_loaded.load(Ordering::Acquire)
    }

    /// Refresh the lock-free index flag; call while holding the workspace lock
    pub fn sync_index_loaded(&self, workspace: &Workspace) {
        self.index_loaded
            .store(!workspace.index.is_empty(), Ordering::Release);
    }

    /// Build the production state: OpenAI client, persisted cache and index
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let client = Arc::new(OpenAiClient::new(OpenAiConfig::from_app_config(&config)?));
        info!("Using chat model {}", client.model());
        config.ensure_directories()?;

        let mut cache = FileCache::open(&config.cache_path()).context("Failed to open file cache")?;
        let index = match VectorIndex::load(&config.storage_dir)? {
            Some(index) => {
                info!("Loaded index with {} chunks", index.len());
                index
            }
            None => {
                if !cache.is_empty() {
                    warn!("File cache has entries but no index was found, clearing cache");
                    cache.clear()?;
                }
                VectorIndex::new()
            }
        };

        let workspace = Workspace::new(
            &config,
            client.clone(),
            client,
            cache,
            index,
            Some(config.storage_dir.clone()),
        );
        Ok(Self::new(config, workspace))
    }
}

impl Workspace {
    pub fn new(
        config: &AppConfig,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
        cache: FileCache,
        index: VectorIndex,
        storage_dir: Option<PathBuf>,
    ) -> Self {
        let engine = ChatEngine::new(
            embedder,
            model,
            load_system_prompt(&config.prompts_dir),
            config.similarity_top_k,
            config.chat_memory_token_limit,
        );
        Self {
            cache,
            index,
            engine,
            storage_dir,
        }
    }

    /// Validate, parse, chunk and index one uploaded file.
    ///
    /// Content already in the cache is skipped without touching the index.
    pub async fn ingest_upload(&mut self, config: &AppConfig, filename: &str, content: &[u8]) -> Result<UploadOutcome> {
        validate_file_type(filename, &config.allowed_file_types)?;
        validate_file_size(content, config.max_file_size_mb)?;

        let hash = content_hash(content);
        if self.cache.check(&hash) {
            info!("Cache hit for {}", filename);
            return Ok(UploadOutcome::Cached);
        }

        let transcript = process_file(filename, content, &config.parser_config())?;
        let chunks: Vec<_> = build_chunks(&transcript, &config.chunk_config()?)?.collect();

        // The cache entry is written only once the chunks are durably indexed
        let indexed_before = self.index.len();
        let added = match self.index.add_chunks(self.engine.embedder(), chunks).await {
            Ok(count) => self.persist_index().map(|()| count),
            Err(e) => Err(e),
        };
        let count = match added {
            Ok(count) => count,
            Err(e) => {
                self.index.truncate(indexed_before);
                return Err(e.context(format!("Failed to index {}", filename)));
            }
        };

        self.cache
            .record(hash, CacheEntry::new(filename, transcript.meeting_id(), count))?;
        info!("Indexed {} ({} chunks)", filename, count);

        Ok(UploadOutcome::Indexed {
            meeting_id: transcript.meeting_id().to_string(),
            chunks: count,
        })
    }

    /// Drop cache, index and conversation memory
    pub fn clear(&mut self) -> Result<()> {
        self.cache.clear()?;
        self.index.clear();
        self.engine.reset();
        self.persist_index()
    }

    pub fn persist_index(&self) -> Result<()> {
        match &self.storage_dir {
            Some(dir) => self.index.save(dir),
            None => Ok(()),
        }
    }
}
