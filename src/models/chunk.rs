use serde::{Deserialize, Serialize};

use super::TranscriptMetadata;
use crate::error::{IngestError, IngestResult};

/// Configuration for chunk generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Maximum tokens per chunk
    pub size: usize,
    /// Trailing tokens of a chunk repeated at the start of the next one
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: 512,
            overlap: 50,
        }
    }
}

impl ChunkConfig {
    pub fn new(size: usize, overlap: usize) -> IngestResult<Self> {
        let config = Self { size, overlap };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IngestResult<()> {
        if self.size == 0 {
            return Err(IngestError::config("chunk size must be greater than 0"));
        }
        if self.overlap >= self.size {
            return Err(IngestError::config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.size
            )));
        }
        Ok(())
    }
}

/// A retrieval unit: a token-bounded slice of one transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `<meeting_id>_c<index>`
    pub chunk_id: String,
    /// Position within the transcript's chunk sequence
    pub index: usize,
    /// Speaker-labelled text; utterance boundaries are newlines
    pub text: String,
    pub token_count: usize,
    /// Speakers with tokens in this chunk
    pub speakers: Vec<String>,
    /// Earliest start time of the covered utterances
    pub start_time: Option<f64>,
    /// Latest end time of the covered utterances
    pub end_time: Option<f64>,
    /// Copy of the parent transcript's metadata
    pub metadata: TranscriptMetadata,
}

impl Chunk {
    /// Filename shown to users: upload name if any, else the source
    pub fn source_filename(&self) -> &str {
        self.metadata
            .uploaded_filename
            .as_deref()
            .unwrap_or(&self.metadata.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_config_default() {
        let config = ChunkConfig::default();
        assert_eq!(config.size, 512);
        assert_eq!(config.overlap, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chunk_config_rejects_large_overlap() {
        assert!(ChunkConfig::new(10, 10).is_err());
        assert!(ChunkConfig::new(0, 0).is_err());
        assert!(ChunkConfig::new(10, 9).is_ok());
    }
}
