//! Email canonicalization.

/// Providers where dots in the local part do not affect delivery.
const DOT_INSIGNIFICANT: &[&str] = &["gmail.com"];

/// Providers that support plus-tagged aliases.
const PLUS_TAGGING: &[&str] = &[
    "gmail.com",
    "outlook.com",
    "hotmail.com",
    "live.com",
    "protonmail.com",
    "proton.me",
    "fastmail.com",
    "icloud.com",
];

/// Domains that deliver to the same mailbox under a canonical name.
const EQUIVALENT_DOMAINS: &[(&str, &str)] = &[
    ("googlemail.com", "gmail.com"),
    ("pm.me", "protonmail.com"),
    ("outlook.de", "outlook.com"),
    ("yahoo.co.uk", "yahoo.com"),
];

fn canonical_domain(domain: &str) -> &str {
    for (alias, canonical) in EQUIVALENT_DOMAINS {
        if domain == *alias {
            return canonical;
        }
    }
    domain
}

/// Lowercase and map the domain to its canonical equivalent.
pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim().to_ascii_lowercase();
    let (local, domain) = trimmed.split_once('@')?;
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return None;
    }
    Some(format!("{}@{}", local, canonical_domain(domain)))
}

/// The address with alias semantics stripped: the key two addresses share
/// iff they deliver to the same mailbox (for known providers).
pub fn deliverable_key(raw: &str) -> Option<String> {
    let normalized = normalize_email(raw)?;
    let (local, domain) = normalized.split_once('@')?;

    let mut key_local = local.to_string();
    if PLUS_TAGGING.contains(&domain) {
        if let Some(plus) = key_local.find('+') {
            key_local.truncate(plus);
        }
    }
    if DOT_INSIGNIFICANT.contains(&domain) {
        key_local.retain(|c| c != '.');
    }
    if key_local.is_empty() {
        return None;
    }
    Some(format!("{}@{}", key_local, domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_maps_domains() {
        assert_eq!(
            normalize_email("Alice.Roe@GoogleMail.com"),
            Some("alice.roe@gmail.com".to_string())
        );
    }

    #[test]
    fn test_deliverable_key_strips_tags_and_dots() {
        assert_eq!(
            deliverable_key("alice.roe+news@gmail.com"),
            Some("aliceroe@gmail.com".to_string())
        );
        assert_eq!(
            deliverable_key("a.roe@googlemail.com"),
            Some("aroe@gmail.com".to_string())
        );
        // Dots are significant elsewhere.
        assert_eq!(
            deliverable_key("alice.roe@example.com"),
            Some("alice.roe@example.com".to_string())
        );
    }

    #[test]
    fn test_plus_tag_only_for_known_providers() {
        assert_eq!(
            deliverable_key("alice+tag@example.com"),
            Some("alice+tag@example.com".to_string())
        );
        assert_eq!(
            deliverable_key("alice+tag@outlook.com"),
            Some("alice@outlook.com".to_string())
        );
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        assert_eq!(normalize_email("not-an-email"), None);
        assert_eq!(normalize_email("@example.com"), None);
        assert_eq!(normalize_email("a@nodot"), None);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalize_email("Alice.Roe+x@GoogleMail.com").unwrap();
        assert_eq!(normalize_email(&once), Some(once.clone()));

        let key = deliverable_key(&once).unwrap();
        assert_eq!(deliverable_key(&key), Some(key.clone()));
    }
}
