use std::collections::HashSet;
use std::path::Path;

use roxmltree::{Document, Node, ParsingOptions};
use tracing::debug;

use super::normalize::Normalizer;
use crate::error::{IngestError, IngestResult};
use crate::models::{
    MeetingId, Participant, Transcript, TranscriptMetadata, Utterance, UNKNOWN_MEETING_TYPE,
};

/// Speaker assigned to segments without a `Participant` attribute
pub const UNKNOWN_SPEAKER: &str = "Unknown";

/// Configuration for MRT parsing
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Preamble notes are truncated to this many characters
    pub notes_max_length: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            notes_max_length: 500,
        }
    }
}

/// Parse an MRT file; the meeting ID is taken from the file stem
pub fn parse_mrt_file(path: &Path, config: &ParserConfig) -> IngestResult<Transcript> {
    let source = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| IngestError::parse(&source, e.to_string()))?;
    let meeting_id = path.file_stem().and_then(|s| s.to_str());
    parse_mrt_str(&content, &source, meeting_id, config)
}

/// Parse MRT bytes (e.g. an upload); the meeting ID comes from the `Session` attribute
pub fn parse_mrt_bytes(bytes: &[u8], source: &str, config: &ParserConfig) -> IngestResult<Transcript> {
    let content = std::str::from_utf8(bytes)
        .map_err(|e| IngestError::parse(source, format!("not valid UTF-8: {}", e)))?;
    parse_mrt_str(content, source, None, config)
}

/// Parse an MRT document into a Transcript
///
/// Digit-task segments (`DigitTask="true"`) are discarded, each remaining
/// segment is normalized, and segments with no conversational content are
/// dropped. A transcript with nothing left is an error.
pub fn parse_mrt_str(
    xml: &str,
    source: &str,
    meeting_id: Option<&str>,
    config: &ParserConfig,
) -> IngestResult<Transcript> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| IngestError::parse(source, format!("invalid XML: {}", e)))?;

    let root = doc.root_element();
    if !root.has_tag_name("Meeting") {
        return Err(IngestError::parse(
            source,
            format!("expected <Meeting> root, found <{}>", root.tag_name().name()),
        ));
    }

    let session_attr = root.attribute("Session");
    let meeting_id = meeting_id
        .or(session_attr)
        .map(str::to_string)
        .ok_or_else(|| IngestError::parse(source, "missing Session attribute"))?;
    let session = session_attr.unwrap_or(meeting_id.as_str()).to_string();

    let (notes, participants) = match child_element(root, "Preamble") {
        Some(preamble) => extract_preamble(preamble, config),
        None => (None, Vec::new()),
    };

    let transcript_node = child_element(root, "Transcript")
        .ok_or_else(|| IngestError::parse(source, "missing <Transcript> element"))?;

    let normalizer = Normalizer::new();
    let mut utterances = Vec::new();
    let mut digit_segments = 0usize;

    for segment in transcript_node
        .children()
        .filter(|n| n.has_tag_name("Segment"))
    {
        if is_digit_task(segment) {
            digit_segments += 1;
            continue;
        }

        let start_time = parse_time(segment, "StartTime", source)?;
        let end_time = parse_time(segment, "EndTime", source)?;
        let raw_text = inner_markup(xml, segment);

        if let Some(text) = normalizer.normalize_utterance(raw_text) {
            utterances.push(Utterance {
                speaker: segment
                    .attribute("Participant")
                    .unwrap_or(UNKNOWN_SPEAKER)
                    .to_string(),
                start_time,
                end_time,
                raw_text: raw_text.trim().to_string(),
                text,
            });
        }
    }

    if utterances.is_empty() {
        return Err(IngestError::parse(
            source,
            "no conversational utterances found",
        ));
    }

    // Segments are written in time order in the corpus; only re-sort when every
    // segment carries a start time so untimed segments keep their position.
    if utterances.iter().all(|u| u.start_time.is_some()) {
        utterances.sort_by(|a, b| {
            a.start_time
                .unwrap_or_default()
                .total_cmp(&b.start_time.unwrap_or_default())
        });
    }

    debug!(
        "{}: kept {} utterances, skipped {} digit-task segments",
        source,
        utterances.len(),
        digit_segments
    );

    let metadata = build_metadata(
        meeting_id,
        session,
        root.attribute("DateTimeStamp").map(str::to_string),
        notes,
        participants,
        &utterances,
        source,
    );

    Ok(Transcript {
        metadata,
        utterances,
    })
}

/// Digit-reading tasks are flagged by the corpus with `DigitTask="true"`
pub fn is_digit_task(segment: Node) -> bool {
    segment.attribute("DigitTask") == Some("true")
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn extract_preamble(preamble: Node, config: &ParserConfig) -> (Option<String>, Vec<Participant>) {
    let notes = child_element(preamble, "Notes")
        .map(|n| {
            n.descendants()
                .filter(|d| d.is_text())
                .filter_map(|d| d.text())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .map(|text| text.chars().take(config.notes_max_length).collect::<String>());

    let participants = child_element(preamble, "Participants")
        .map(|list| {
            list.children()
                .filter(|n| n.has_tag_name("Participant"))
                .filter_map(|p| {
                    let name = p.attribute("Name")?;
                    Some(Participant::new(name, p.attribute("Channel").map(str::to_string)))
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    (notes, participants)
}

fn parse_time(segment: Node, attr: &str, source: &str) -> IngestResult<Option<f64>> {
    match segment.attribute(attr) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| IngestError::parse(source, format!("{} is not a number: {:?}", attr, raw))),
        _ => Ok(None),
    }
}

/// The segment's content as written in the source, inline markup included
fn inner_markup<'a>(source: &'a str, node: Node) -> &'a str {
    match (node.first_child(), node.last_child()) {
        (Some(first), Some(last)) => &source[first.range().start..last.range().end],
        _ => "",
    }
}

fn build_metadata(
    meeting_id: String,
    session: String,
    date_time: Option<String>,
    notes: Option<String>,
    participants: Vec<Participant>,
    utterances: &[Utterance],
    source: &str,
) -> TranscriptMetadata {
    let parsed_id = MeetingId::parse(&meeting_id);
    let meeting_type_description = parsed_id
        .as_ref()
        .map(|id| id.type_description())
        .unwrap_or(UNKNOWN_MEETING_TYPE)
        .to_string();

    let mut seen = HashSet::new();
    let speakers: Vec<String> = utterances
        .iter()
        .filter(|u| seen.insert(u.speaker.as_str()))
        .map(|u| u.speaker.clone())
        .collect();

    let start_time = utterances
        .iter()
        .filter_map(|u| u.start_time)
        .min_by(f64::total_cmp);
    let end_time = utterances
        .iter()
        .filter_map(|u| u.end_time)
        .max_by(f64::total_cmp);
    let duration_seconds = match (start_time, end_time) {
        (Some(start), Some(end)) if end > start => Some(end - start),
        _ => None,
    };

    TranscriptMetadata {
        meeting_id,
        session,
        meeting_type: parsed_id.map(|id| id.type_code),
        meeting_type_description,
        date_time,
        notes,
        participants,
        speakers,
        start_time,
        end_time,
        duration_seconds,
        source: source.to_string(),
        uploaded_filename: None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const BMR001: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Meeting Session="Bmr001" DateTimeStamp="2000-02-02-1700">
  <Preamble>
    <Notes>Test meeting notes</Notes>
    <Participants>
      <Participant Name="me011" Channel="chan1"/>
      <Participant Name="me013" Channel="chan0"/>
    </Participants>
  </Preamble>
  <Transcript StartTime="0.0" EndTime="100.0">
    <Segment StartTime="2.0" EndTime="4.0" Participant="me011">
      O_K, so we are live.
    </Segment>
    <Segment StartTime="4.0" EndTime="6.0" Participant="me013">
      Let us begin the meeting.
    </Segment>
  </Transcript>
</Meeting>
"#;

    #[test]
    fn test_parse_valid_mrt() {
        let transcript =
            parse_mrt_str(BMR001, "Bmr001.mrt", Some("Bmr001"), &ParserConfig::default()).unwrap();
        let meta = &transcript.metadata;

        assert_eq!(meta.meeting_id, "Bmr001");
        assert_eq!(meta.session, "Bmr001");
        assert_eq!(meta.meeting_type.as_deref(), Some("mr"));
        assert_eq!(meta.date_time.as_deref(), Some("2000-02-02-1700"));
        assert_eq!(meta.notes.as_deref(), Some("Test meeting notes"));
        assert_eq!(meta.participants.len(), 2);
        assert_eq!(meta.speakers, vec!["me011", "me013"]);
        assert_eq!(meta.duration_seconds, Some(4.0));
        assert_eq!(transcript.num_utterances(), 2);
        assert_eq!(transcript.utterances[0].text, "OK, so we are live.");
        assert!(transcript.text().starts_with("[me011]: OK"));
    }

    #[test]
    fn test_digit_tasks_are_filtered() {
        let xml = r#"<Meeting Session="Bmr002">
  <Transcript>
    <Segment StartTime="2.0" EndTime="4.0" Participant="me011">Regular meeting content here.</Segment>
    <Segment StartTime="10.0" EndTime="12.0" Participant="me011" DigitTask="true">one two three four five</Segment>
    <Segment StartTime="20.0" EndTime="22.0" Participant="me013">Back to regular discussion.</Segment>
  </Transcript>
</Meeting>"#;

        let transcript = parse_mrt_str(xml, "Bmr002.mrt", None, &ParserConfig::default()).unwrap();

        assert_eq!(transcript.num_utterances(), 2);
        assert!(!transcript.text().contains("one two three"));
        assert!(transcript.text().contains("Regular meeting content"));
    }

    #[test]
    fn test_inline_markup_is_normalized() {
        let xml = r#"<Meeting Session="Bmr003">
  <Transcript>
    <Segment StartTime="5.0" EndTime="7.0" Participant="me011">That is funny <VocalSound Description="laugh"/> <Pause/> Tom &amp; the <Uncertain>P_D_A</Uncertain></Segment>
  </Transcript>
</Meeting>"#;

        let transcript = parse_mrt_str(xml, "Bmr003.mrt", None, &ParserConfig::default()).unwrap();
        assert_eq!(
            transcript.utterances[0].text,
            "That is funny [laugh]... Tom & the (PDA?)"
        );
    }

    #[test]
    fn test_attribute_with_angle_bracket_stays_out_of_text() {
        let xml = r#"<Meeting Session="Bmr004">
  <Transcript>
    <Segment StartTime="1.0" EndTime="2.0" Participant="me011" Note="a>b">Hello there.</Segment>
    <Segment StartTime="2.0" EndTime="3.0" Participant="me013" Note="x>y"><VocalSound Description="laugh"/> right <Pause/></Segment>
  </Transcript>
</Meeting>"#;

        let transcript = parse_mrt_str(xml, "Bmr004.mrt", None, &ParserConfig::default()).unwrap();
        assert_eq!(transcript.utterances[0].text, "Hello there.");
        assert!(transcript.utterances[1].text.starts_with("[laugh] right"));
        assert!(!transcript.text().contains("y\">"));
    }

    #[test]
    fn test_segments_are_sorted_by_start_time() {
        let xml = r#"<Meeting Session="Bmr004">
  <Transcript>
    <Segment StartTime="9.0" EndTime="10.0" Participant="me013">Second thing said.</Segment>
    <Segment StartTime="1.0" EndTime="2.0" Participant="me011">First thing said.</Segment>
  </Transcript>
</Meeting>"#;

        let transcript = parse_mrt_str(xml, "Bmr004.mrt", None, &ParserConfig::default()).unwrap();
        assert_eq!(transcript.utterances[0].speaker, "me011");
        assert_eq!(transcript.metadata.speakers, vec!["me011", "me013"]);
    }

    #[test]
    fn test_notes_are_truncated() {
        let xml = r#"<Meeting Session="Bed005">
  <Preamble><Notes>abcdefghij</Notes></Preamble>
  <Transcript>
    <Segment StartTime="1.0" EndTime="2.0" Participant="fn002">Let us discuss NLP topics.</Segment>
  </Transcript>
</Meeting>"#;
        let config = ParserConfig { notes_max_length: 4 };

        let transcript = parse_mrt_str(xml, "Bed005.mrt", None, &config).unwrap();
        assert_eq!(transcript.metadata.notes.as_deref(), Some("abcd"));
        assert!(transcript
            .metadata
            .meeting_type_description
            .contains("Even Deeper Understanding"));
    }

    #[test]
    fn test_missing_participant_is_unknown() {
        let xml = r#"<Meeting Session="Bmr005">
  <Transcript><Segment>Nobody claimed this line.</Segment></Transcript>
</Meeting>"#;
        let transcript = parse_mrt_str(xml, "x", None, &ParserConfig::default()).unwrap();
        assert_eq!(transcript.utterances[0].speaker, UNKNOWN_SPEAKER);
        assert_eq!(transcript.utterances[0].start_time, None);
    }

    #[test]
    fn test_empty_transcript_is_error() {
        let xml = r#"<Meeting Session="Bmr099"><Transcript StartTime="0.0" EndTime="0.0"></Transcript></Meeting>"#;
        let err = parse_mrt_str(xml, "Bmr099.mrt", None, &ParserConfig::default()).unwrap_err();
        assert!(err.to_string().contains("no conversational utterances"));
    }

    #[test]
    fn test_invalid_xml_is_error() {
        let err = parse_mrt_str("This is not valid XML", "bad.mrt", None, &ParserConfig::default())
            .unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));

        let err = parse_mrt_bytes(b"<Meeting>Not valid XML", "corrupted.mrt", &ParserConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse corrupted.mrt"));
    }

    #[test]
    fn test_missing_required_parts() {
        let no_session = r#"<Meeting><Transcript><Segment Participant="me011">Hi there.</Segment></Transcript></Meeting>"#;
        assert!(parse_mrt_str(no_session, "x", None, &ParserConfig::default()).is_err());

        let no_transcript = r#"<Meeting Session="Bmr006"/>"#;
        let err = parse_mrt_str(no_transcript, "x", None, &ParserConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Transcript"));

        let bad_time = r#"<Meeting Session="Bmr007"><Transcript><Segment StartTime="soon">Hi there.</Segment></Transcript></Meeting>"#;
        let err = parse_mrt_str(bad_time, "x", None, &ParserConfig::default()).unwrap_err();
        assert!(err.to_string().contains("StartTime"));
    }

    #[test]
    fn test_parse_file_uses_stem_as_meeting_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Bro017.mrt");
        std::fs::write(&path, BMR001).unwrap();

        let transcript = parse_mrt_file(&path, &ParserConfig::default()).unwrap();
        assert_eq!(transcript.metadata.meeting_id, "Bro017");
        assert_eq!(transcript.metadata.session, "Bmr001");
        assert_eq!(transcript.metadata.meeting_type.as_deref(), Some("ro"));
    }
}
