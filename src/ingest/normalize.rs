use std::sync::LazyLock;

use regex::{Captures, Regex};

/// A substitution applied to segment markup, in order
struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

/// Rewrites MRT inline markup into plain readable text
///
/// Markers that carry meaning for a reader are kept in a readable form:
/// - `<Pause/>` becomes `...`
/// - `<VocalSound Description="laugh"/>` becomes `[laugh]`
/// - `<Uncertain>word</Uncertain>` becomes `(word?)`
/// - `P_D_A` becomes `PDA`
///
/// Everything else that looks like a tag is removed.
pub struct Normalizer {
    rules: Vec<Rule>,
    acronym: Regex,
    bracketed_only: Regex,
    whitespace: Regex,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        let rule = |pattern: &str, replacement: &'static str| Rule {
            pattern: Regex::new(pattern).unwrap(),
            replacement,
        };

        let rules = vec![
            rule(r#"<VocalSound\s+Description="([^"]+)"\s*/>"#, "[${1}]"),
            rule(r#"<NonVocalSound\s+Description="([^"]+)"\s*/>"#, "[${1}]"),
            rule(r"<Pause\s*/>", " ... "),
            rule(r"<Emphasis[^>]*>\s*([^<]+?)\s*</Emphasis>", "${1}"),
            // Unintelligible spans must be handled before the generic uncertain rule
            rule(r"<Uncertain[^>]*>\s*@@\s*</Uncertain>", "(unintelligible)"),
            rule(r"<Uncertain[^>]*>\s*([^<]+?)\s*</Uncertain>", "(${1}?)"),
            rule(r"<Foreign[^>]*>\s*([^<]+?)\s*</Foreign>", "${1}"),
            rule(r"<Pronounce[^>]*>\s*([^<]+?)\s*</Pronounce>", "${1}"),
            rule(r#"<Comment\s+Description="[^"]*"\s*/>"#, " "),
            rule(r"<[^>]+>", " "),
        ];

        Self {
            rules,
            acronym: Regex::new(r"\b[A-Za-z](?:_[A-Za-z])+\b").unwrap(),
            bracketed_only: Regex::new(r"^\[[^\]]+\]$").unwrap(),
            whitespace: Regex::new(r"\s+").unwrap(),
        }
    }

    /// Normalize one segment's markup into plain text
    pub fn clean(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }

        let mut text = html_escape::decode_html_entities(raw).into_owned();

        for rule in &self.rules {
            text = rule
                .pattern
                .replace_all(&text, rule.replacement)
                .into_owned();
        }

        text = self
            .acronym
            .replace_all(&text, |caps: &Captures| caps[0].replace('_', ""))
            .into_owned();

        let collapsed = self.whitespace.replace_all(&text, " ");
        tidy_pauses(collapsed.trim())
    }

    /// Whether cleaned text carries no conversational content
    ///
    /// Empty strings, single characters and a lone sound tag such as `[laugh]`
    /// count as noise.
    pub fn is_noise(&self, text: &str) -> bool {
        let trimmed = text.trim();
        trimmed.chars().count() < 2 || self.bracketed_only.is_match(trimmed)
    }

    /// Clean a segment and drop it if nothing conversational remains
    pub fn normalize_utterance(&self, raw: &str) -> Option<String> {
        let cleaned = self.clean(raw);
        if self.is_noise(&cleaned) {
            None
        } else {
            Some(cleaned)
        }
    }
}

/// Attach pause ellipses to the preceding word
fn tidy_pauses(text: &str) -> String {
    text.replace(" ...", "...")
}

static DEFAULT_NORMALIZER: LazyLock<Normalizer> = LazyLock::new(Normalizer::new);

/// Normalize segment markup with the shared rule set
pub fn clean_text(raw: &str) -> String {
    DEFAULT_NORMALIZER.clean(raw)
}

/// See [`Normalizer::is_noise`]
pub fn is_empty_or_noise(text: &str) -> bool {
    DEFAULT_NORMALIZER.is_noise(text)
}

/// See [`Normalizer::normalize_utterance`]
pub fn normalize_utterance(raw: &str) -> Option<String> {
    DEFAULT_NORMALIZER.normalize_utterance(raw)
}
