use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::SpeakerInfo;

/// A participant listed in the transcript preamble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Speaker ID (e.g. `me011`)
    pub id: String,
    /// Recording channel, if given
    pub channel: Option<String>,
    /// Gender and language decoded from the ID
    pub info: SpeakerInfo,
}

impl Participant {
    pub fn new(id: impl Into<String>, channel: Option<String>) -> Self {
        let id = id.into();
        let info = SpeakerInfo::parse(&id);
        Self { id, channel, info }
    }
}

/// A single kept segment of a meeting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Speaker ID from the segment's `Participant` attribute
    pub speaker: String,
    /// Start time in seconds
    pub start_time: Option<f64>,
    /// End time in seconds
    pub end_time: Option<f64>,
    /// Segment content with inline markup, as written in the file
    pub raw_text: String,
    /// Normalized plain text
    pub text: String,
}

impl Utterance {
    /// Render as a speaker-labelled line: `[me011]: text`
    pub fn render(&self) -> String {
        format!("[{}]: {}", self.speaker, self.text)
    }
}

/// Meeting-level metadata, copied onto every chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMetadata {
    pub meeting_id: String,
    pub session: String,
    /// Two-letter type code derived from the meeting ID
    pub meeting_type: Option<String>,
    pub meeting_type_description: String,
    /// Raw `DateTimeStamp` attribute (e.g. `2000-02-02-1700`)
    pub date_time: Option<String>,
    pub notes: Option<String>,
    pub participants: Vec<Participant>,
    /// Speakers with at least one kept utterance, in order of first appearance
    pub speakers: Vec<String>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub duration_seconds: Option<f64>,
    /// Path or label the transcript was read from
    pub source: String,
    /// Original filename when the transcript arrived as an upload
    pub uploaded_filename: Option<String>,
}

impl TranscriptMetadata {
    /// Parse the `DateTimeStamp` into a timestamp
    pub fn recorded_at(&self) -> Option<NaiveDateTime> {
        self.date_time
            .as_deref()
            .and_then(|raw| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d-%H%M").ok())
    }

    pub fn num_speakers(&self) -> usize {
        self.speakers.len()
    }
}

/// A parsed meeting transcript. Utterances are ordered by start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub metadata: TranscriptMetadata,
    pub utterances: Vec<Utterance>,
}

impl Transcript {
    pub fn meeting_id(&self) -> &str {
        &self.metadata.meeting_id
    }

    pub fn num_utterances(&self) -> usize {
        self.utterances.len()
    }

    /// Full normalized text, one speaker-labelled line per utterance
    pub fn text(&self) -> String {
        self.utterances
            .iter()
            .map(Utterance::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Utterances attributed to one speaker
    pub fn utterances_by<'a>(&'a self, speaker: &'a str) -> impl Iterator<Item = &'a Utterance> {
        self.utterances.iter().filter(move |u| u.speaker == speaker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(speaker: &str, text: &str) -> Utterance {
        Utterance {
            speaker: speaker.to_string(),
            start_time: None,
            end_time: None,
            raw_text: text.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_render_utterance() {
        assert_eq!(utterance("me011", "OK, so").render(), "[me011]: OK, so");
    }

    #[test]
    fn test_recorded_at() {
        let metadata = TranscriptMetadata {
            meeting_id: "Bmr001".to_string(),
            session: "Bmr001".to_string(),
            meeting_type: Some("mr".to_string()),
            meeting_type_description: "Meeting Recorder weekly meeting".to_string(),
            date_time: Some("2000-02-02-1700".to_string()),
            notes: None,
            participants: vec![],
            speakers: vec![],
            start_time: None,
            end_time: None,
            duration_seconds: None,
            source: "Bmr001.mrt".to_string(),
            uploaded_filename: None,
        };

        let ts = metadata.recorded_at().unwrap();
        assert_eq!(ts.format("%Y-%m-%d %H:%M").to_string(), "2000-02-02 17:00");
    }

    #[test]
    fn test_participant_decodes_id() {
        let p = Participant::new("fn002", Some("chan0".to_string()));
        assert!(!p.info.native_english);
    }
}
