use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cache::content_hash;
use crate::ingest::{ParserConfig, parse_mrt_bytes, parse_mrt_str};
use crate::models::Transcript;

/// File in the corpus directory holding only preamble templates
const PREAMBLES_STEM: &str = "preambles";

/// A parsed transcript from the corpus directory
#[derive(Debug, Clone)]
pub struct CorpusFile {
    pub path: PathBuf,
    pub filename: String,
    pub content_hash: String,
    pub transcript: Transcript,
}

/// Totals over a loaded corpus
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusStats {
    pub transcripts: usize,
    pub utterances: usize,
    pub speakers: usize,
    /// Meeting type code ("unknown" when absent) to number of meetings
    pub meeting_types: BTreeMap<String, usize>,
}

impl CorpusStats {
    pub fn from_files(files: &[CorpusFile]) -> Self {
        let mut speakers = BTreeSet::new();
        let mut stats = Self {
            transcripts: files.len(),
            ..Self::default()
        };

        for file in files {
            let meta = &file.transcript.metadata;
            stats.utterances += file.transcript.num_utterances();
            speakers.extend(meta.speakers.iter().cloned());
            let code = meta.meeting_type.clone().unwrap_or_else(|| "unknown".to_string());
            *stats.meeting_types.entry(code).or_default() += 1;
        }

        stats.speakers = speakers.len();
        stats
    }
}

/// Load one MRT file; the meeting ID is taken from the file stem
pub fn load_transcript(path: &Path, config: &ParserConfig) -> Result<CorpusFile> {
    let content = std::fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let transcript = match path.file_stem().and_then(|s| s.to_str()) {
        Some(stem) => {
            let xml = std::str::from_utf8(&content)
                .with_context(|| format!("{} is not valid UTF-8", filename))?;
            parse_mrt_str(xml, &filename, Some(stem), config)?
        }
        None => parse_mrt_bytes(&content, &filename, config)?,
    };

    Ok(CorpusFile {
        path: path.to_path_buf(),
        filename,
        content_hash: content_hash(&content),
        transcript,
    })
}

/// Load every `.mrt` file in `dir`, in filename order.
///
/// `preambles.mrt` is skipped. Files that fail to parse are logged and
/// skipped; an empty or missing directory is an error.
pub fn load_transcripts(dir: &Path, config: &ParserConfig) -> Result<Vec<CorpusFile>> {
    if !dir.is_dir() {
        anyhow::bail!(
            "Data directory not found: {:?}. Place ICSI .mrt files there or pass --data-dir",
            dir
        );
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("mrt"))
        })
        .filter(|p| p.file_stem().and_then(|s| s.to_str()) != Some(PREAMBLES_STEM))
        .collect();
    paths.sort();

    if paths.is_empty() {
        anyhow::bail!("No .mrt files found in {:?}", dir);
    }

    info!("Loading {} transcript files from {:?}", paths.len(), dir);

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        match load_transcript(path, config) {
            Ok(file) => files.push(file),
            Err(e) => warn!("Skipping {:?}: {:#}", path, e),
        }
    }

    let stats = CorpusStats::from_files(&files);
    info!(
        "Loaded {} transcripts: {} utterances (excluding digit tasks), {} unique speakers",
        stats.transcripts, stats.utterances, stats.speakers
    );

    Ok(files)
}
