//! Vector Index - brute-force cosine similarity over embedded chunks
//!
//! Meeting collections are small (hundreds of chunks per meeting), so a
//! linear scan is fast enough and keeps the index a plain JSON file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::llm::Embedder;
use crate::models::Chunk;

/// Chunks sent to the embedding API per request
pub const EMBED_BATCH_SIZE: usize = 64;

/// Index file name inside the storage directory
pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    id: String,
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// A retrieved chunk with its similarity to the query
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub chunk: Chunk,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    dimensions: Option<usize>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dimensions = None;
    }

    /// Drop entries added after the first `len`
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
        if self.entries.is_empty() {
            self.dimensions = None;
        }
    }

    /// Insert chunks with precomputed embeddings
    pub fn insert(&mut self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != embeddings.len() {
            anyhow::bail!(
                "Got {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            );
        }

        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            let dimensions = *self.dimensions.get_or_insert(embedding.len());
            if embedding.len() != dimensions {
                anyhow::bail!(
                    "Vector dimension mismatch: expected {}, got {}",
                    dimensions,
                    embedding.len()
                );
            }
            self.entries.push(IndexEntry {
                id: uuid::Uuid::new_v4().to_string(),
                chunk,
                embedding,
            });
        }

        Ok(())
    }

    /// Embed chunks in batches and insert them
    pub async fn add_chunks(&mut self, embedder: &dyn Embedder, chunks: Vec<Chunk>) -> Result<usize> {
        let total = chunks.len();
        let mut remaining = chunks.into_iter().peekable();

        while remaining.peek().is_some() {
            let batch: Vec<Chunk> = remaining.by_ref().take(EMBED_BATCH_SIZE).collect();
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = embedder.embed(&texts).await?;
            self.insert(batch, embeddings)?;
            debug!("Indexed {}/{} chunks", self.len(), total);
        }

        Ok(total)
    }

    /// Top-`k` chunks by cosine similarity, best first
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchResult> {
        if self.dimensions != Some(query.len()) {
            return Vec::new();
        }

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(query, &e.embedding), e))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        scored
            .into_iter()
            .take(k)
            .map(|(score, e)| SearchResult {
                id: e.id.clone(),
                score,
                chunk: e.chunk.clone(),
            })
            .collect()
    }

    /// Embed `question` and search
    pub async fn query(&self, embedder: &dyn Embedder, question: &str, k: usize) -> Result<Vec<SearchResult>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = embedder.embed(&[question.to_string()]).await?;
        let query = vectors.pop().context("Embedding API returned no vector")?;
        if let Some(dimensions) = self.dimensions.filter(|&d| d != query.len()) {
            anyhow::bail!(
                "Query embedding has {} dimensions but the index holds {}; rebuild the index after changing the embedding model",
                query.len(),
                dimensions
            );
        }
        Ok(self.search(&query, k))
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create storage dir: {:?}", dir))?;
        let path = dir.join(INDEX_FILE);
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer(file, self).context("Failed to write index")?;
        info!("Index persisted to {:?} ({} chunks)", path, self.len());
        Ok(())
    }

    /// Load a persisted index; `None` when the directory holds no index
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path))?;
        let index: Self = serde_json::from_str(&content).context("Failed to parse index")?;
        Ok(Some(index))
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::TranscriptMetadata;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds text as counts of a few marker words
    #[derive(Default)]
    pub(crate) struct KeywordEmbedder {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    ["speech", "budget", "laugh"]
                        .iter()
                        .map(|w| t.matches(w).count() as f32 + 0.01)
                        .collect()
                })
                .collect())
        }
    }

    pub(crate) fn chunk(meeting_id: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("{}_c0", meeting_id),
            index: 0,
            text: text.to_string(),
            token_count: text.split_whitespace().count(),
            speakers: vec!["me011".to_string()],
            start_time: None,
            end_time: None,
            metadata: TranscriptMetadata {
                meeting_id: meeting_id.to_string(),
                session: meeting_id.to_string(),
                meeting_type: Some("mr".to_string()),
                meeting_type_description: "Meeting Recorder weekly meeting".to_string(),
                date_time: None,
                notes: None,
                participants: vec![],
                speakers: vec!["me011".to_string()],
                start_time: None,
                end_time: None,
                duration_seconds: None,
                source: format!("{}.mrt", meeting_id),
                uploaded_filename: None,
            },
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_insert_rejects_dimension_mismatch() {
        let mut index = VectorIndex::new();
        index
            .insert(vec![chunk("Bmr001", "a")], vec![vec![1.0, 0.0]])
            .unwrap();
        assert!(index
            .insert(vec![chunk("Bmr002", "b")], vec![vec![1.0, 0.0, 0.0]])
            .is_err());
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let embedder = KeywordEmbedder::default();
        let mut index = VectorIndex::new();
        index
            .add_chunks(
                &embedder,
                vec![
                    chunk("Bmr001", "[me011]: the speech recognizer and speech features"),
                    chunk("Bed005", "[fn002]: the budget for next year"),
                ],
            )
            .await
            .unwrap();

        let results = index.query(&embedder, "what about the budget", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.metadata.meeting_id, "Bed005");
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_query_rejects_embedding_dimension_change() {
        let mut index = VectorIndex::new();
        index
            .insert(vec![chunk("Bmr001", "speech")], vec![vec![1.0, 0.0]])
            .unwrap();

        let err = index
            .query(&KeywordEmbedder::default(), "speech", 3)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("3 dimensions but the index holds 2"));
    }

    #[test]
    fn test_truncate_rolls_back_entries() {
        let mut index = VectorIndex::new();
        index
            .insert(vec![chunk("Bmr001", "a")], vec![vec![1.0, 0.0]])
            .unwrap();
        index
            .insert(vec![chunk("Bmr002", "b")], vec![vec![0.0, 1.0]])
            .unwrap();

        index.truncate(1);
        assert_eq!(index.len(), 1);
        index.truncate(0);
        assert!(index.is_empty());
        // Dimensions reset with the last entry
        index
            .insert(vec![chunk("Bmr003", "c")], vec![vec![1.0, 0.0, 0.0]])
            .unwrap();
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        assert!(VectorIndex::load(dir.path()).unwrap().is_none());

        let embedder = KeywordEmbedder::default();
        let mut index = VectorIndex::new();
        index
            .add_chunks(&embedder, vec![chunk("Bmr001", "speech")])
            .await
            .unwrap();
        index.save(dir.path()).unwrap();

        let loaded = VectorIndex::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.search(&[1.0, 0.0, 0.0], 5).len(), 1);
    }
}
