//! Unsafe-content screening for raw results.
//!
//! Runs before a result may be cached or logged: content matching an
//! injection pattern, or exceeding the size cap, is redacted in place and
//! the result tagged. Redacted results stay in the pipeline so their
//! metadata remains usable and traceable.

use once_cell::sync::Lazy;
use osint_core::types::{RawResult, SecurityFlag};
use regex::Regex;
use tracing::warn;

/// Default content size cap: 2 MiB.
pub const DEFAULT_SIZE_CAP: usize = 2 * 1024 * 1024;

static SQL_INJECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(union\s+select|;\s*drop\s+(table|database)|'\s*or\s+'1'\s*=\s*'1|insert\s+into\s+\w+\s+values)")
        .expect("static pattern")
});

static XSS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(<script[\s>]|javascript:\s*\w|\bon(error|load|click)\s*=)")
        .expect("static pattern")
});

static COMMAND_INJECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(;\s*(rm|curl|wget|nc|bash)\s+-|\$\((?:[^)]{1,200})\)|`[^`]{1,200}`\s*;)")
        .expect("static pattern")
});

static PATH_TRAVERSAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\.\./){2,}|%2e%2e%2f%2e%2e").expect("static pattern")
});

/// Screen one raw result, redacting in place. Returns the flags raised.
pub fn screen(result: &mut RawResult, size_cap: usize) -> Vec<SecurityFlag> {
    let mut flags = Vec::new();

    if result.content.len() > size_cap {
        flags.push(SecurityFlag::OversizedContent);
    } else {
        let text = String::from_utf8_lossy(&result.content);
        if SQL_INJECTION.is_match(&text) {
            flags.push(SecurityFlag::SqlInjection);
        }
        if XSS.is_match(&text) {
            flags.push(SecurityFlag::CrossSiteScripting);
        }
        if COMMAND_INJECTION.is_match(&text) {
            flags.push(SecurityFlag::CommandInjection);
        }
        if PATH_TRAVERSAL.is_match(&text) {
            flags.push(SecurityFlag::PathTraversal);
        }
    }

    for flag in &flags {
        warn!(
            source = %result.source_name,
            url = %result.url,
            flag = ?flag,
            "unsafe content redacted"
        );
        result.redact(*flag);
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use osint_core::types::{MediaType, QueryId};

    fn raw(content: &[u8]) -> RawResult {
        RawResult::new(
            QueryId::new(),
            "web_search",
            "https://example.com/page",
            "page",
            content.to_vec(),
            MediaType::Html,
        )
    }

    #[test]
    fn test_clean_content_passes() {
        let mut result = raw(b"Alice Roe works at Example Corp in Portland.");
        let flags = screen(&mut result, DEFAULT_SIZE_CAP);
        assert!(flags.is_empty());
        assert!(!result.is_flagged());
    }

    #[test]
    fn test_xss_redacted() {
        let mut result = raw(b"hello <script>document.location='evil'</script>");
        let flags = screen(&mut result, DEFAULT_SIZE_CAP);
        assert_eq!(flags, vec![SecurityFlag::CrossSiteScripting]);
        assert_eq!(result.content, b"[REDACTED]".to_vec());
    }

    #[test]
    fn test_sql_injection_redacted() {
        let mut result = raw(b"x' UNION SELECT username, password FROM users--");
        let flags = screen(&mut result, DEFAULT_SIZE_CAP);
        assert!(flags.contains(&SecurityFlag::SqlInjection));
    }

    #[test]
    fn test_path_traversal_redacted() {
        let mut result = raw(b"GET ../../../../etc/shadow");
        let flags = screen(&mut result, DEFAULT_SIZE_CAP);
        assert!(flags.contains(&SecurityFlag::PathTraversal));
    }

    #[test]
    fn test_oversize_redacted_without_scan() {
        let mut result = raw(&vec![b'a'; 64]);
        let flags = screen(&mut result, 32);
        assert_eq!(flags, vec![SecurityFlag::OversizedContent]);
        assert_eq!(result.content, b"[REDACTED]".to_vec());
    }

    #[test]
    fn test_hash_survives_redaction() {
        let mut result = raw(b"<script>x</script>");
        let original = result.content_hash.clone();
        screen(&mut result, DEFAULT_SIZE_CAP);
        assert_eq!(result.content_hash, original);
    }
}
