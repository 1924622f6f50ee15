//! Blocked query patterns.
//!
//! Every outbound query string is screened before it may reach a scheduler.
//! A match rejects the query with `security_rejected`; such queries are
//! never retried and never leave the process.

use once_cell::sync::Lazy;
use osint_core::{Error, Result};
use regex::Regex;
use tracing::warn;

struct BlockedPattern {
    name: &'static str,
    regex: Regex,
}

static DEFAULT_PATTERNS: Lazy<Vec<BlockedPattern>> = Lazy::new(|| {
    vec![
        BlockedPattern {
            name: "credential_dump_operator",
            regex: Regex::new(
                r"(?i)(combo\s*list|credential\s*dump|password\s+dump|leaked\s+passwords?\s+(list|db)|filetype:\s*(sql|env|log)\s+password)",
            )
            .expect("static pattern"),
        },
        BlockedPattern {
            name: "raw_ssn",
            regex: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("static pattern"),
        },
        BlockedPattern {
            name: "raw_credit_card",
            regex: Regex::new(r"\b(?:\d[ -]?){15,16}\b").expect("static pattern"),
        },
        BlockedPattern {
            name: "auth_endpoint_probe",
            regex: Regex::new(
                r"(?i)(inurl:\s*(wp-login|admin/login|signin|phpmyadmin)|intitle:\s*login|/wp-login\.php|/\.git/config|/etc/passwd)",
            )
            .expect("static pattern"),
        },
        BlockedPattern {
            name: "sql_injection",
            regex: Regex::new(r#"(?i)('\s*(or|and)\s+[\w'"]+\s*=|union\s+select|;\s*drop\s+table)"#)
                .expect("static pattern"),
        },
        BlockedPattern {
            name: "command_injection",
            regex: Regex::new(r"(?i)(;\s*(rm|curl|wget|nc)\s+-|\$\(.*\)|`[^`]+`|\|\s*sh\b)")
                .expect("static pattern"),
        },
    ]
});

/// Compiled screen over the blocked pattern set. Extra patterns from
/// configuration extend (never replace) the built-in minimum.
pub struct QueryScreen {
    extra: Vec<(String, Regex)>,
}

impl QueryScreen {
    pub fn new() -> Self {
        Self { extra: Vec::new() }
    }

    /// Compile additional patterns; invalid regexes are rejected at startup.
    pub fn with_patterns<I>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut extra = Vec::new();
        for pattern in patterns {
            let regex = Regex::new(&pattern).map_err(|e| {
                Error::new(
                    osint_core::ErrorCode::ConfigurationError,
                    format!("invalid blocked pattern '{}': {}", pattern, e),
                )
            })?;
            extra.push((pattern, regex));
        }
        Ok(Self { extra })
    }

    /// Reject `query_string` if it matches any blocked pattern.
    pub fn screen(&self, query_string: &str) -> Result<()> {
        for pattern in DEFAULT_PATTERNS.iter() {
            if pattern.regex.is_match(query_string) {
                warn!(pattern = pattern.name, "query rejected by blocked pattern");
                return Err(Error::security_rejected(format!(
                    "query matches blocked pattern '{}'",
                    pattern.name
                )));
            }
        }
        for (source, regex) in &self.extra {
            if regex.is_match(query_string) {
                warn!(pattern = %source, "query rejected by configured pattern");
                return Err(Error::security_rejected(
                    "query matches configured blocked pattern",
                ));
            }
        }
        Ok(())
    }
}

impl Default for QueryScreen {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benign_queries_pass() {
        let screen = QueryScreen::new();
        assert!(screen.screen("Alice Roe Portland").is_ok());
        assert!(screen.screen("site:github.com aroe").is_ok());
        assert!(screen.screen("aroe.example whois").is_ok());
    }

    #[test]
    fn test_credential_dump_rejected() {
        let screen = QueryScreen::new();
        assert!(screen.screen("alice combo list 2024").is_err());
        assert!(screen.screen("filetype:sql password example.com").is_err());
    }

    #[test]
    fn test_pii_formats_rejected() {
        let screen = QueryScreen::new();
        assert!(screen.screen("123-45-6789").is_err());
        assert!(screen.screen("4111 1111 1111 1111").is_err());
    }

    #[test]
    fn test_auth_probe_rejected() {
        let screen = QueryScreen::new();
        assert!(screen.screen("inurl:wp-login example.com").is_err());
        assert!(screen.screen("example.com/wp-login.php").is_err());
    }

    #[test]
    fn test_injection_operators_rejected() {
        let screen = QueryScreen::new();
        assert!(screen.screen("x'; DROP TABLE users").is_err());
        assert!(screen.screen("a' OR '1'='1").is_err());
        assert!(screen.screen("name; rm -rf /").is_err());
    }

    #[test]
    fn test_configured_patterns_extend_defaults() {
        let screen =
            QueryScreen::with_patterns(vec!["(?i)forbidden-term".to_string()]).unwrap();
        assert!(screen.screen("a forbidden-term query").is_err());
        assert!(screen.screen("123-45-6789").is_err());
    }

    #[test]
    fn test_invalid_pattern_rejected_at_startup() {
        assert!(QueryScreen::with_patterns(vec!["(unclosed".to_string()]).is_err());
    }
}
