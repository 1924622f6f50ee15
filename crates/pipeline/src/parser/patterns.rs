//! Extraction patterns for pattern-based entity candidates.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

pub static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,12}\b").expect("static pattern")
});

/// E.164 and common national phone layouts.
pub static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?x)
        (?:\+\d{1,3}[\s\-.]?)?          # optional dial code
        (?:\(\d{2,4}\)[\s\-.]?)?        # optional area code in parens
        \d{3}[\s\-.]\d{3,4}[\s\-.]?\d{0,4}
        | \+\d{7,15}
    ")
    .expect("static pattern")
});

pub static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s"'<>)\]]+"#).expect("static pattern"));

/// Prefixed @handles.
pub static AT_HANDLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[\s(])@([A-Za-z0-9_.\-]{2,40})\b").expect("static pattern"));

/// Platform profile paths.
pub static PLATFORM_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:github\.com|gitlab\.com|twitter\.com|x\.com|instagram\.com|linkedin\.com/in|keybase\.io)/([A-Za-z0-9_\-.]{2,40})",
    )
    .expect("static pattern")
});

pub static DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:[a-z0-9][a-z0-9\-]{0,62}\.)+[a-z]{2,12}\b").expect("static pattern")
});

/// Domains that appear in almost any page and carry no subject signal.
const NOISE_DOMAINS: &[&str] = &[
    "w3.org",
    "schema.org",
    "google.com",
    "gstatic.com",
    "googleapis.com",
    "cloudflare.com",
];

pub fn extract_emails(text: &str) -> BTreeSet<String> {
    EMAIL
        .find_iter(text)
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect()
}

pub fn extract_phones(text: &str) -> BTreeSet<String> {
    PHONE
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|p| p.chars().filter(|c| c.is_ascii_digit()).count() >= 7)
        .collect()
}

pub fn extract_urls(text: &str) -> BTreeSet<String> {
    URL.find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
        .collect()
}

pub fn extract_handles(text: &str) -> BTreeSet<String> {
    let mut handles: BTreeSet<String> = AT_HANDLE
        .captures_iter(text)
        .filter_map(|caps| caps.get(2))
        .map(|m| m.as_str().to_lowercase())
        .collect();
    handles.extend(
        PLATFORM_PATH
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_lowercase()),
    );
    handles
}

pub fn extract_domains(text: &str) -> BTreeSet<String> {
    DOMAIN
        .find_iter(text)
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|domain| {
            !NOISE_DOMAINS
                .iter()
                .any(|noise| domain == noise || domain.ends_with(&format!(".{}", noise)))
        })
        // Email hosts are covered by the email extractor.
        .filter(|domain| !text.to_ascii_lowercase().contains(&format!("@{}", domain)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_extraction() {
        let found = extract_emails("reach Alice.Roe@aroe.example or admin@ops.example.");
        assert!(found.contains("alice.roe@aroe.example"));
        assert!(found.contains("admin@ops.example"));
    }

    #[test]
    fn test_phone_extraction_formats() {
        let found = extract_phones("call +15035551234 or (503) 555-9876 today");
        assert!(found.iter().any(|p| p.contains("5551234")));
        assert!(found.iter().any(|p| p.contains("555-9876") || p.contains("555 9876")));
    }

    #[test]
    fn test_handle_extraction() {
        let found = extract_handles("follow @aroe and https://github.com/alice-roe");
        assert!(found.contains("aroe"));
        assert!(found.contains("alice-roe"));
    }

    #[test]
    fn test_domain_extraction_skips_noise() {
        let found = extract_domains("hosted on aroe.example, schema at schema.org");
        assert!(found.contains("aroe.example"));
        assert!(!found.contains("schema.org"));
    }
}
