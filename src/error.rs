//! Error types for transcript ingestion, upload validation and configuration.

/// Errors raised while turning an MRT file into chunks.
///
/// Hosted API failures are not represented here; they travel as
/// `anyhow::Error` and are surfaced to the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Failed to parse {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("{message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using IngestError.
pub type IngestResult<T> = Result<T, IngestError>;

impl IngestError {
    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the error is a rejected upload rather than a broken file
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
