use std::path::Path;

use tracing::debug;

use crate::index::SearchResult;

/// System prompt used when no override file is present
pub const SYSTEM_PROMPT: &str = r#"You are an assistant that answers questions about recorded research meetings from the ICSI Meeting Corpus.

Answer ONLY from the transcript excerpts provided in the context. Each excerpt lists the meeting ID, meeting type, date and the speakers, followed by lines of the form "[speaker_id]: text".

Transcript conventions:
- "..." marks a pause.
- Text in square brackets such as [laugh] or [breath] is a non-speech sound.
- Text in parentheses ending in a question mark, e.g. (word?), was uncertain to the transcriber.
- Speaker IDs encode gender and language: the first letter is m (male), f (female), u (unknown) or x (computer); the second is e (native English) or n (non-native).

When you answer:
- Name the meeting(s) and speakers your answer is based on.
- If the excerpts do not contain the answer, say so instead of guessing."#;

/// Name of the optional prompt override inside the prompts directory
pub const SYSTEM_PROMPT_FILE: &str = "system_prompt.txt";

/// Load the system prompt override, falling back to the built-in prompt
pub fn load_system_prompt(prompts_dir: &Path) -> String {
    let path = prompts_dir.join(SYSTEM_PROMPT_FILE);
    match std::fs::read_to_string(&path) {
        Ok(content) if !content.trim().is_empty() => {
            debug!("Using system prompt from {:?}", path);
            content.trim().to_string()
        }
        _ => SYSTEM_PROMPT.to_string(),
    }
}

/// Build the context block listing retrieved excerpts with their meeting metadata
pub fn build_context_prompt(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No transcript excerpts matched this question.".to_string();
    }

    let mut prompt = String::from("Context from meeting transcripts:\n\n");

    for (i, result) in results.iter().enumerate() {
        let chunk = &result.chunk;
        let meta = &chunk.metadata;

        prompt.push_str(&format!(
            "## Excerpt {} (meeting {}, {})\n",
            i + 1,
            meta.meeting_id,
            meta.meeting_type_description
        ));
        if let Some(date) = meta.recorded_at() {
            prompt.push_str(&format!("Date: {}\n", date.format("%Y-%m-%d %H:%M")));
        }
        prompt.push_str(&format!("Speakers: {}\n", chunk.speakers.join(", ")));
        if let (Some(start), Some(end)) = (chunk.start_time, chunk.end_time) {
            prompt.push_str(&format!("Time: {:.1}s - {:.1}s\n", start, end));
        }
        prompt.push_str(&format!("Source: {}\n", chunk.source_filename()));
        prompt.push_str(&chunk.text);
        prompt.push_str("\n\n");
    }

    prompt
}
