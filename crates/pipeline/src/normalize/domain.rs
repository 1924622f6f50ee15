//! Domain canonicalization.

/// Lowercase, strip scheme/path fragments, drop the trailing dot.
/// Unicode labels are kept lowercased as-is; comparisons run on this form.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let mut domain = raw.trim().to_lowercase();

    if let Some(stripped) = domain
        .strip_prefix("https://")
        .or_else(|| domain.strip_prefix("http://"))
    {
        domain = stripped.to_string();
    }
    if let Some(slash) = domain.find('/') {
        domain.truncate(slash);
    }
    if let Some(colon) = domain.find(':') {
        domain.truncate(colon);
    }
    let domain = domain.trim_end_matches('.').to_string();

    let plausible = domain.contains('.')
        && !domain.contains(char::is_whitespace)
        && domain.len() <= 253
        && !domain.starts_with('.');
    if plausible {
        Some(domain)
    } else {
        None
    }
}

/// The registrable label pair, used for grouping hosts of one zone.
pub fn apex_domain(normalized: &str) -> String {
    let labels: Vec<&str> = normalized.split('.').collect();
    if labels.len() <= 2 {
        return normalized.to_string();
    }
    labels[labels.len() - 2..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_scheme_and_trailing_dot() {
        assert_eq!(
            normalize_domain("https://AROE.Example/path?q=1"),
            Some("aroe.example".to_string())
        );
        assert_eq!(
            normalize_domain("aroe.example."),
            Some("aroe.example".to_string())
        );
    }

    #[test]
    fn test_rejects_non_domains() {
        assert_eq!(normalize_domain("localhost"), None);
        assert_eq!(normalize_domain("has space.example"), None);
        assert_eq!(normalize_domain(""), None);
    }

    #[test]
    fn test_apex_grouping() {
        assert_eq!(apex_domain("mail.aroe.example"), "aroe.example");
        assert_eq!(apex_domain("aroe.example"), "aroe.example");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalize_domain("HTTPS://Www.Aroe.Example.").unwrap();
        assert_eq!(normalize_domain(&once), Some(once.clone()));
    }
}
