use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{Chunk, ChunkConfig, Transcript};

/// Machine-readable summary of one parsed and chunked transcript
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub meeting_id: String,
    pub meeting_type: Option<String>,
    pub meeting_type_description: String,
    pub date_time: Option<String>,
    pub duration_seconds: Option<f64>,
    pub num_utterances: usize,
    pub num_speakers: usize,
    pub speakers: Vec<SpeakerSummary>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub total_tokens: usize,
    pub chunks: Vec<ChunkSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeakerSummary {
    pub speaker: String,
    pub utterances: usize,
    pub tokens: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    pub chunk_id: String,
    pub token_count: usize,
    pub speakers: Vec<String>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

impl AnalysisReport {
    pub fn new(transcript: &Transcript, chunks: &[Chunk], config: &ChunkConfig, total_tokens: usize) -> Self {
        let meta = &transcript.metadata;

        let speakers = meta
            .speakers
            .iter()
            .map(|speaker| {
                let (utterances, tokens) = transcript
                    .utterances_by(speaker)
                    .fold((0, 0), |(n, t), u| (n + 1, t + u.text.split_whitespace().count()));
                SpeakerSummary {
                    speaker: speaker.clone(),
                    utterances,
                    tokens,
                }
            })
            .collect();

        let chunks = chunks
            .iter()
            .map(|c| ChunkSummary {
                chunk_id: c.chunk_id.clone(),
                token_count: c.token_count,
                speakers: c.speakers.clone(),
                start_time: c.start_time,
                end_time: c.end_time,
            })
            .collect();

        Self {
            meeting_id: meta.meeting_id.clone(),
            meeting_type: meta.meeting_type.clone(),
            meeting_type_description: meta.meeting_type_description.clone(),
            date_time: meta.date_time.clone(),
            duration_seconds: meta.duration_seconds,
            num_utterances: transcript.num_utterances(),
            num_speakers: meta.num_speakers(),
            speakers,
            chunk_size: config.size,
            chunk_overlap: config.overlap,
            total_tokens,
            chunks,
        }
    }

    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }

    /// Format the report as human-readable text
    pub fn format(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Meeting {} ({})\n",
            self.meeting_id, self.meeting_type_description
        ));
        if let Some(date) = &self.date_time {
            output.push_str(&format!("Recorded: {}\n", date));
        }
        if let Some(duration) = self.duration_seconds {
            output.push_str(&format!("Duration: {}\n", format_timestamp(duration)));
        }
        output.push_str(&format!(
            "Utterances: {} (digit tasks excluded)\n\n",
            self.num_utterances
        ));

        output.push_str(&format!("Speakers ({}):\n", self.num_speakers));
        for s in &self.speakers {
            output.push_str(&format!(
                "  {:<8} {:>5} utterances {:>7} tokens\n",
                s.speaker, s.utterances, s.tokens
            ));
        }

        output.push_str(&format!(
            "\nChunks: {} (size {}, overlap {}, {} tokens total)\n",
            self.chunks.len(),
            self.chunk_size,
            self.chunk_overlap,
            self.total_tokens
        ));
        for c in &self.chunks {
            let span = match (c.start_time, c.end_time) {
                (Some(start), Some(end)) => {
                    format!("[{} - {}]", format_timestamp(start), format_timestamp(end))
                }
                _ => "[no timing]".to_string(),
            };
            output.push_str(&format!(
                "  {:<14} {:>5} tokens {} {}\n",
                c.chunk_id,
                c.token_count,
                span,
                c.speakers.join(", ")
            ));
        }

        output
    }
}

/// Format seconds as MM:SS.mmm
pub fn format_timestamp(seconds: f64) -> String {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let secs = ms / 1000;
    format!("{:02}:{:02}.{:03}", secs / 60, secs % 60, ms % 1000)
}
