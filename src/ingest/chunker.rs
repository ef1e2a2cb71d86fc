use std::collections::HashSet;

use crate::error::IngestResult;
use crate::models::{Chunk, ChunkConfig, Transcript};

/// Count tokens the way the chunker does: whitespace-separated words
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split a transcript into overlapping, token-bounded chunks
///
/// Chunks are produced lazily. Each chunk holds at most `config.size`
/// tokens and starts with the last `config.overlap` tokens of the chunk
/// before it. Chunks end on an utterance boundary whenever one falls inside
/// the allowed range; otherwise the cut lands on the token budget.
pub fn build_chunks<'a>(transcript: &'a Transcript, config: &ChunkConfig) -> IngestResult<Chunks<'a>> {
    config.validate()?;
    Ok(Chunks::new(transcript, *config))
}

/// Iterator over the chunks of one transcript
pub struct Chunks<'a> {
    transcript: &'a Transcript,
    config: ChunkConfig,
    /// Words of the rendered `[speaker]: text` lines
    tokens: Vec<String>,
    /// Index of the utterance each token came from
    token_utterance: Vec<usize>,
    next_start: usize,
    next_index: usize,
    done: bool,
}

impl<'a> Chunks<'a> {
    fn new(transcript: &'a Transcript, config: ChunkConfig) -> Self {
        let mut tokens = Vec::new();
        let mut token_utterance = Vec::new();

        for (i, utterance) in transcript.utterances.iter().enumerate() {
            for word in utterance.render().split_whitespace() {
                tokens.push(word.to_string());
                token_utterance.push(i);
            }
        }

        let done = tokens.is_empty();
        Self {
            transcript,
            config,
            tokens,
            token_utterance,
            next_start: 0,
            next_index: 0,
            done,
        }
    }

    /// Total tokens across the transcript
    pub fn total_tokens(&self) -> usize {
        self.tokens.len()
    }

    /// Whether a cut at `pos` falls between two utterances
    fn is_utterance_boundary(&self, pos: usize) -> bool {
        pos == self.tokens.len()
            || (pos > 0 && self.token_utterance[pos] != self.token_utterance[pos - 1])
    }

    /// Pick the exclusive end of the chunk starting at `start`
    fn chunk_end(&self, start: usize) -> usize {
        let total = self.tokens.len();
        let limit = start + self.config.size;
        if limit >= total {
            return total;
        }

        // The next chunk starts at `end - overlap`, which must move forward
        let min_end = start + self.config.overlap + 1;
        (min_end..=limit)
            .rev()
            .find(|&end| self.is_utterance_boundary(end))
            .unwrap_or(limit)
    }

    fn make_chunk(&self, start: usize, end: usize) -> Chunk {
        let mut text = String::new();
        for pos in start..end {
            if pos > start {
                let sep = if self.token_utterance[pos] != self.token_utterance[pos - 1] {
                    '\n'
                } else {
                    ' '
                };
                text.push(sep);
            }
            text.push_str(&self.tokens[pos]);
        }

        let first = self.token_utterance[start];
        let last = self.token_utterance[end - 1];
        let covered = &self.transcript.utterances[first..=last];

        let mut seen = HashSet::new();
        let speakers = covered
            .iter()
            .filter(|u| seen.insert(u.speaker.as_str()))
            .map(|u| u.speaker.clone())
            .collect();

        let metadata = self.transcript.metadata.clone();
        Chunk {
            chunk_id: format!("{}_c{}", metadata.meeting_id, self.next_index),
            index: self.next_index,
            text,
            token_count: end - start,
            speakers,
            start_time: covered
                .iter()
                .filter_map(|u| u.start_time)
                .min_by(f64::total_cmp),
            end_time: covered
                .iter()
                .filter_map(|u| u.end_time)
                .max_by(f64::total_cmp),
            metadata,
        }
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let start = self.next_start;
        let end = self.chunk_end(start);
        let chunk = self.make_chunk(start, end);

        if end >= self.tokens.len() {
            self.done = true;
        } else {
            self.next_start = end - self.config.overlap;
        }
        self.next_index += 1;

        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TranscriptMetadata, Utterance};

    fn transcript(lines: &[(&str, &str)]) -> Transcript {
        let utterances: Vec<Utterance> = lines
            .iter()
            .enumerate()
            .map(|(i, (speaker, text))| Utterance {
                speaker: speaker.to_string(),
                start_time: Some(i as f64 * 10.0),
                end_time: Some(i as f64 * 10.0 + 5.0),
                raw_text: text.to_string(),
                text: text.to_string(),
            })
            .collect();

        Transcript {
            metadata: TranscriptMetadata {
                meeting_id: "Bmr001".to_string(),
                session: "Bmr001".to_string(),
                meeting_type: Some("mr".to_string()),
                meeting_type_description: "Meeting Recorder weekly meeting".to_string(),
                date_time: None,
                notes: None,
                participants: vec![],
                speakers: vec!["me011".to_string(), "fn002".to_string()],
                start_time: Some(0.0),
                end_time: None,
                duration_seconds: None,
                source: "Bmr001.mrt".to_string(),
                uploaded_filename: Some("upload.mrt".to_string()),
            },
            utterances,
        }
    }

    fn words(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    #[test]
    fn test_short_transcript_is_one_chunk() {
        let t = transcript(&[("me011", "hello there"), ("fn002", "hi")]);
        let chunks: Vec<Chunk> = build_chunks(&t, &ChunkConfig::new(50, 5).unwrap())
            .unwrap()
            .collect();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "[me011]: hello there\n[fn002]: hi");
        assert_eq!(chunks[0].token_count, 5);
        assert_eq!(chunks[0].speakers, vec!["me011", "fn002"]);
        assert_eq!(chunks[0].source_filename(), "upload.mrt");
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let lines: Vec<(&str, &str)> = (0..30)
            .map(|i| {
                if i % 2 == 0 {
                    ("me011", "we should look at the recognizer output again")
                } else {
                    ("fn002", "right")
                }
            })
            .collect();
        let t = transcript(&lines);
        let config = ChunkConfig::new(40, 6).unwrap();
        let chunks: Vec<Chunk> = build_chunks(&t, &config).unwrap().collect();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= config.size);
            assert_eq!(chunk.token_count, count_tokens(&chunk.text));
            assert_eq!(chunk.metadata.meeting_id, "Bmr001");
        }
        for pair in chunks.windows(2) {
            let prev = words(&pair[0].text);
            let next = words(&pair[1].text);
            assert_eq!(&prev[prev.len() - config.overlap..], &next[..config.overlap]);
        }
    }

    #[test]
    fn test_chunks_cover_every_token_once_plus_overlap() {
        let lines: Vec<(&str, &str)> = (0..12).map(|_| ("me011", "one two three four five")).collect();
        let t = transcript(&lines);
        let config = ChunkConfig::new(17, 3).unwrap();
        let chunks = build_chunks(&t, &config).unwrap();
        let total = chunks.total_tokens();
        let chunks: Vec<Chunk> = chunks.collect();

        let emitted: usize = chunks.iter().map(|c| c.token_count).sum();
        assert_eq!(emitted - config.overlap * (chunks.len() - 1), total);
    }

    #[test]
    fn test_chunks_end_on_utterance_boundaries() {
        // Each rendered line is 6 tokens
        let lines: Vec<(&str, &str)> = (0..10).map(|_| ("me011", "a b c d e")).collect();
        let t = transcript(&lines);
        let chunks: Vec<Chunk> = build_chunks(&t, &ChunkConfig::new(20, 2).unwrap())
            .unwrap()
            .collect();

        assert_eq!(chunks[0].token_count, 18);
        assert!(chunks[0].text.ends_with("a b c d e"));
    }

    #[test]
    fn test_long_utterance_is_split_at_budget() {
        let long = (0..25).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let t = transcript(&[("me011", long.as_str())]);
        let chunks: Vec<Chunk> = build_chunks(&t, &ChunkConfig::new(10, 2).unwrap())
            .unwrap()
            .collect();

        assert_eq!(chunks[0].token_count, 10);
        assert_eq!(words(&chunks[1].text)[..2], words(&chunks[0].text)[8..]);
        assert!(chunks.last().unwrap().token_count <= 10);
    }

    #[test]
    fn test_chunk_ids_and_times() {
        let lines: Vec<(&str, &str)> = (0..6).map(|_| ("me011", "a b c d e")).collect();
        let t = transcript(&lines);
        let chunks: Vec<Chunk> = build_chunks(&t, &ChunkConfig::new(12, 0).unwrap())
            .unwrap()
            .collect();

        assert_eq!(chunks[0].chunk_id, "Bmr001_c0");
        assert_eq!(chunks[1].chunk_id, "Bmr001_c1");
        assert_eq!(chunks[0].start_time, Some(0.0));
        assert_eq!(chunks[0].end_time, Some(15.0));
        assert_eq!(chunks[1].start_time, Some(20.0));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let t = transcript(&[("me011", "hello")]);
        let config = ChunkConfig { size: 4, overlap: 4 };
        assert!(build_chunks(&t, &config).is_err());
    }
}
