//! Parser: raw results to typed entity candidates.
//!
//! Dispatch is by media type. Structural extraction runs for sources whose
//! envelope is known; pattern extraction runs over the visible text of
//! every result; textual name extraction is a low-confidence supplement.
//! A parse failure yields zero candidates and a warning, never an error.

pub mod patterns;
pub mod sanitize;
mod structural;

pub use sanitize::{screen, DEFAULT_SIZE_CAP};

use crate::entity::{AttributeKey, EntityCandidate};
use once_cell::sync::Lazy;
use osint_core::types::{EntityType, MediaType, RawResult};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};

const PATTERN_CONFIDENCE: f64 = 0.7;
const TEXTUAL_CONFIDENCE: f64 = 0.35;

/// Capitalized bigrams/trigrams that plausibly name a person.
static NAME_CANDIDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-z]{1,20})\s+([A-Z][a-z]{1,20})(?:\s+([A-Z][a-z]{1,20}))?\b")
        .expect("static pattern")
});

/// Leading words that disqualify a capitalized bigram as a name.
const NAME_STOPWORDS: &[&str] = &[
    "The", "This", "That", "New", "About", "Contact", "Privacy", "Terms", "All", "More", "From",
    "United", "North", "South", "East", "West",
];

#[derive(Debug, Clone)]
pub struct Parser {
    /// Enables the low-confidence textual name extractor
    extract_names: bool,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            extract_names: true,
        }
    }

    pub fn without_textual_extraction(mut self) -> Self {
        self.extract_names = false;
        self
    }

    /// Extract candidates from one raw result. Flagged (redacted) results
    /// only produce structural candidates from their metadata.
    pub fn parse(&self, result: &RawResult, source_confidence: f64) -> Vec<EntityCandidate> {
        let mut candidates = structural::extract(result, source_confidence);

        if result.is_flagged() {
            debug!(
                source = %result.source_name,
                url = %result.url,
                "skipping content extraction for redacted result"
            );
            return candidates;
        }

        let text = match self.visible_text(result) {
            Some(text) => text,
            None => {
                warn!(
                    source = %result.source_name,
                    url = %result.url,
                    media_type = ?result.media_type,
                    "content could not be decoded, skipping extraction"
                );
                return candidates;
            }
        };

        candidates.extend(self.pattern_candidates(result, &text, source_confidence));
        if self.extract_names {
            candidates.extend(self.textual_candidates(result, &text, source_confidence));
        }
        candidates
    }

    fn visible_text(&self, result: &RawResult) -> Option<String> {
        let raw = String::from_utf8_lossy(&result.content);
        match result.media_type {
            MediaType::Html => {
                let document = Html::parse_document(&raw);
                let selector = Selector::parse("body").ok()?;
                let body_text: String = match document.select(&selector).next() {
                    Some(body) => body.text().collect::<Vec<_>>().join(" "),
                    None => document.root_element().text().collect::<Vec<_>>().join(" "),
                };
                Some(format!("{} {}", result.title, body_text))
            }
            MediaType::Json => {
                let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
                let mut strings = Vec::new();
                collect_json_strings(&value, &mut strings);
                Some(strings.join(" "))
            }
            MediaType::Xml => {
                // Tag-stripped text is enough for pattern extraction.
                static TAGS: Lazy<Regex> =
                    Lazy::new(|| Regex::new(r"<[^>]*>").expect("static pattern"));
                Some(TAGS.replace_all(&raw, " ").into_owned())
            }
            MediaType::Text => Some(raw.into_owned()),
            MediaType::Other => None,
        }
    }

    fn pattern_candidates(
        &self,
        result: &RawResult,
        text: &str,
        source_confidence: f64,
    ) -> Vec<EntityCandidate> {
        let mut candidates = Vec::new();

        for email in patterns::extract_emails(text) {
            candidates.push(
                self.candidate(EntityType::Email, result, source_confidence)
                    .with_attribute(AttributeKey::Email, email),
            );
        }
        for phone in patterns::extract_phones(text) {
            candidates.push(
                self.candidate(EntityType::Phone, result, source_confidence)
                    .with_attribute(AttributeKey::Phone, phone),
            );
        }
        for handle in patterns::extract_handles(text) {
            candidates.push(
                self.candidate(EntityType::Username, result, source_confidence)
                    .with_attribute(AttributeKey::Username, handle),
            );
        }
        for domain in patterns::extract_domains(text) {
            candidates.push(
                self.candidate(EntityType::Domain, result, source_confidence)
                    .with_attribute(AttributeKey::Domain, domain),
            );
        }

        candidates
    }

    fn textual_candidates(
        &self,
        result: &RawResult,
        text: &str,
        source_confidence: f64,
    ) -> Vec<EntityCandidate> {
        let mut seen = std::collections::BTreeSet::new();
        let mut candidates = Vec::new();

        for caps in NAME_CANDIDATE.captures_iter(text).take(50) {
            let first = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if NAME_STOPWORDS.contains(&first) {
                continue;
            }
            let full = caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();
            if seen.insert(full.clone()) {
                candidates.push(
                    self.candidate(EntityType::Person, result, source_confidence)
                        .with_attribute(AttributeKey::FullName, full)
                        .with_extraction_confidence(TEXTUAL_CONFIDENCE),
                );
            }
        }
        candidates
    }

    fn candidate(
        &self,
        entity_type: EntityType,
        result: &RawResult,
        source_confidence: f64,
    ) -> EntityCandidate {
        EntityCandidate::new(entity_type, result.source_name.clone())
            .with_source_ref(result.result_id.clone())
            .with_extraction_confidence(PATTERN_CONFIDENCE)
            .with_source_confidence(source_confidence)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_json_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_json_strings(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for (key, item) in map {
                out.push(key.clone());
                collect_json_strings(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osint_core::types::QueryId;

    fn raw(source: &str, content: &str, media_type: MediaType) -> RawResult {
        RawResult::new(
            QueryId::new(),
            source,
            "https://example.com/page",
            "Profile page",
            content.as_bytes().to_vec(),
            media_type,
        )
    }

    #[test]
    fn test_html_pattern_extraction() {
        let html = r#"<html><body>
            <p>Contact Alice Roe at <a href="mailto:alice@aroe.example">alice@aroe.example</a></p>
            <p>or on <a href="https://github.com/aroe">github.com/aroe</a>, phone +15035551234</p>
        </body></html>"#;
        let candidates = Parser::new().parse(&raw("web_search", html, MediaType::Html), 0.5);

        let emails: Vec<_> = candidates
            .iter()
            .filter(|c| c.entity_type == EntityType::Email)
            .collect();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].text(AttributeKey::Email), Some("alice@aroe.example"));

        assert!(candidates
            .iter()
            .any(|c| c.entity_type == EntityType::Username
                && c.text(AttributeKey::Username) == Some("aroe")));
        assert!(candidates
            .iter()
            .any(|c| c.entity_type == EntityType::Phone));
    }

    #[test]
    fn test_textual_names_have_low_confidence() {
        let text = "Alice Roe spoke at the conference. The Weather was nice.";
        let candidates = Parser::new().parse(&raw("web_search", text, MediaType::Text), 0.5);

        let people: Vec<_> = candidates
            .iter()
            .filter(|c| c.entity_type == EntityType::Person)
            .collect();
        assert!(people
            .iter()
            .any(|c| c.text(AttributeKey::FullName) == Some("Alice Roe")));
        // "The Weather" is stopworded out.
        assert!(!people
            .iter()
            .any(|c| c.text(AttributeKey::FullName) == Some("The Weather")));
        for person in people {
            assert!(person.extraction_confidence < 0.5);
        }
    }

    #[test]
    fn test_textual_extraction_can_be_disabled() {
        let text = "Alice Roe spoke at the conference.";
        let candidates = Parser::new()
            .without_textual_extraction()
            .parse(&raw("web_search", text, MediaType::Text), 0.5);
        assert!(!candidates.iter().any(|c| c.entity_type == EntityType::Person));
    }

    #[test]
    fn test_malformed_json_yields_structural_only() {
        let result = raw("social_profiles", "{not json", MediaType::Json)
            .with_metadata("platform", "mastodon")
            .with_metadata("username", "aroe");
        let candidates = Parser::new().parse(&result, 0.7);

        // Structural extraction from metadata still works; the broken body
        // contributes nothing and raises no error.
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].entity_type, EntityType::SocialProfile);
    }

    #[test]
    fn test_flagged_result_skips_content() {
        let mut result = raw("web_search", "<script>evil</script> alice@aroe.example", MediaType::Html);
        sanitize::screen(&mut result, sanitize::DEFAULT_SIZE_CAP);
        assert!(result.is_flagged());

        let candidates = Parser::new().parse(&result, 0.5);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_unknown_media_type_is_silent() {
        let result = raw("web_search", "binary-ish", MediaType::Other);
        let candidates = Parser::new().parse(&result, 0.5);
        assert!(candidates.is_empty());
    }
}
