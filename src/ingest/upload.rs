use std::path::Path;

use crate::error::{IngestError, IngestResult};
use crate::models::Transcript;

use super::parser::{parse_mrt_bytes, ParserConfig};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Lower-cased extension with its leading dot, or an empty string
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Reject files whose extension is not in the allow-list (case-insensitive)
pub fn validate_file_type(filename: &str, allowed_extensions: &[String]) -> IngestResult<()> {
    let extension = extension_of(filename);
    let allowed = allowed_extensions
        .iter()
        .any(|a| a.to_lowercase() == extension && !extension.is_empty());

    if allowed {
        Ok(())
    } else {
        let shown = if extension.is_empty() {
            "(none)".to_string()
        } else {
            format!("'{}'", extension)
        };
        Err(IngestError::validation(format!(
            "{} files are not allowed. Allowed file types: {}",
            shown,
            allowed_extensions.join(", ")
        )))
    }
}

/// Reject files larger than `max_size_mb` megabytes
pub fn validate_file_size(content: &[u8], max_size_mb: u64) -> IngestResult<()> {
    let size = content.len() as u64;
    if size > max_size_mb * BYTES_PER_MB {
        return Err(IngestError::validation(format!(
            "File is too large ({:.2}MB). Maximum allowed size is {}MB.",
            size as f64 / BYTES_PER_MB as f64,
            max_size_mb
        )));
    }
    Ok(())
}

/// Reject uploads with more files than allowed
pub fn validate_file_count(count: usize, max_files: usize) -> IngestResult<()> {
    if count > max_files {
        return Err(IngestError::validation(format!(
            "Too many files. Maximum: {}",
            max_files
        )));
    }
    Ok(())
}

/// Parse an uploaded MRT file and tag it with its original filename
pub fn process_file(filename: &str, content: &[u8], config: &ParserConfig) -> IngestResult<Transcript> {
    let extension = extension_of(filename);
    if extension != ".mrt" {
        return Err(IngestError::validation(format!(
            "Cannot process '{}' files. Only .mrt (Meeting Room Transcript) files are supported.",
            extension
        )));
    }

    let mut transcript = parse_mrt_bytes(content, filename, config)?;
    transcript.metadata.uploaded_filename = Some(filename.to_string());
    Ok(transcript)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mrt() -> Vec<String> {
        vec![".mrt".to_string()]
    }

    #[test]
    fn test_file_type_case_insensitive() {
        for name in ["file.mrt", "file.MRT", "file.Mrt", "file.mRt"] {
            assert!(validate_file_type(name, &mrt()).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_file_type_rejections() {
        let err = validate_file_type("test.txt", &mrt()).unwrap_err();
        assert!(err.to_string().contains(".txt"));
        assert!(err.to_string().contains(".mrt"));

        let err = validate_file_type("noextension", &mrt()).unwrap_err();
        assert!(err.to_string().to_lowercase().contains("not allowed"));

        let allowed = vec![".mrt".to_string(), ".xml".to_string()];
        let err = validate_file_type("test.pdf", &allowed).unwrap_err();
        assert!(err.to_string().contains(".pdf"));
        assert!(err.to_string().contains(".xml"));

        assert!(validate_file_type("test.mrt", &[]).is_err());
    }

    #[test]
    fn test_file_size_limits() {
        assert!(validate_file_size(&vec![b'x'; 1024], 10).is_ok());
        assert!(validate_file_size(&vec![b'x'; 1024 * 1024], 1).is_ok());
        assert!(validate_file_size(b"", 10).is_ok());

        let err = validate_file_size(&vec![b'x'; 1024 * 1024 + 1], 1).unwrap_err();
        assert!(err.to_string().to_lowercase().contains("too large"));
        assert!(err.is_validation());

        assert!(validate_file_size(&vec![b'x'; 1024], 0).is_err());
    }

    #[test]
    fn test_file_count_limit() {
        assert!(validate_file_count(5, 5).is_ok());
        assert!(validate_file_count(6, 5).is_err());
    }

    #[test]
    fn test_process_file_rejects_other_extensions() {
        let err = process_file("document.pdf", b"content", &ParserConfig::default()).unwrap_err();
        assert!(err.to_string().contains(".pdf"));
        assert!(err.to_string().contains("Only .mrt"));
    }

    #[test]
    fn test_process_file_reports_parse_failures() {
        let err = process_file("corrupted.mrt", b"<Meeting>Not valid XML", &ParserConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
        assert!(process_file("empty.mrt", b"", &ParserConfig::default()).is_err());
    }

    #[test]
    fn test_process_file_adds_uploaded_filename() {
        let content = br#"<?xml version="1.0" encoding="UTF-8"?>
<Meeting Session="Test001">
    <Transcript>
        <Segment Participant="me001" StartTime="0.0" EndTime="1.0">
            Hello world
        </Segment>
    </Transcript>
</Meeting>"#;

        let transcript = process_file("test.mrt", content, &ParserConfig::default()).unwrap();
        assert_eq!(transcript.metadata.uploaded_filename.as_deref(), Some("test.mrt"));
        assert_eq!(transcript.metadata.meeting_id, "Test001");
    }
}
