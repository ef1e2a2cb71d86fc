use serde::{Deserialize, Serialize};

/// ICSI meeting type codes and their descriptions
pub const MEETING_TYPES: &[(&str, &str)] = &[
    ("db", "Database issues meeting"),
    ("ed", "Even Deeper Understanding (NLP/AI) weekly meeting"),
    ("mr", "Meeting Recorder weekly meeting"),
    ("ns", "Network Services and Applications group meeting"),
    ("ro", "Robustness (signal processing) weekly meeting"),
    ("sr", "SRI collaboration meeting"),
    ("tr", "Meeting Recorder transcriber's meeting"),
    ("uw", "UW collaboration meeting"),
];

pub const UNKNOWN_MEETING_TYPE: &str = "Unknown meeting type";

/// Look up the description of a meeting type code
pub fn meeting_type_description(code: &str) -> &'static str {
    MEETING_TYPES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, desc)| *desc)
        .unwrap_or(UNKNOWN_MEETING_TYPE)
}

/// Components of a meeting ID such as `Bmr001`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingId {
    /// Recording site (`B` = ICSI Berkeley)
    pub location: String,
    /// Two-letter meeting type code
    pub type_code: String,
    /// Meeting number within the series
    pub number: String,
}

impl MeetingId {
    /// Split `Xyz###` into its parts; IDs shorter than six characters are rejected
    pub fn parse(id: &str) -> Option<Self> {
        if id.chars().count() < 6 || !id.is_ascii() {
            return None;
        }
        Some(Self {
            location: id[..1].to_string(),
            type_code: id[1..3].to_string(),
            number: id[3..].to_string(),
        })
    }

    pub fn type_description(&self) -> &'static str {
        meeting_type_description(&self.type_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Unknown,
    Computer,
}

impl Gender {
    fn from_code(code: char) -> Self {
        match code {
            'm' => Self::Male,
            'f' => Self::Female,
            'x' => Self::Computer,
            _ => Self::Unknown,
        }
    }
}

/// Decoded speaker ID such as `me011` or `fn002`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerInfo {
    pub raw_id: String,
    pub gender: Gender,
    pub native_english: bool,
    pub speaker_num: String,
}

impl SpeakerInfo {
    /// Decode `XY###`; malformed IDs keep the raw ID with unknown attributes
    pub fn parse(speaker_id: &str) -> Self {
        let mut chars = speaker_id.chars();
        match (chars.next(), chars.next()) {
            (Some(g), Some(lang)) if speaker_id.chars().count() >= 5 => Self {
                raw_id: speaker_id.to_string(),
                gender: Gender::from_code(g),
                native_english: lang == 'e',
                speaker_num: chars.collect(),
            },
            _ => Self {
                raw_id: speaker_id.to_string(),
                gender: Gender::Unknown,
                native_english: false,
                speaker_num: String::new(),
            },
        }
    }
}
