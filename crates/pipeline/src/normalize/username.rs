//! Username canonicalization and variant generation.

use std::collections::BTreeSet;

const SEPARATORS: &[char] = &['.', '_', '-'];

/// Lowercase with separators stripped: the canonical comparison form.
pub fn canonical_username(raw: &str) -> Option<String> {
    let lowered = raw.trim().trim_start_matches('@').to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    let canonical: String = lowered.chars().filter(|c| !SEPARATORS.contains(c)).collect();
    if canonical.is_empty() {
        None
    } else {
        Some(canonical)
    }
}

/// A small set of plausible handle variants: the raw lowercase form, the
/// separator-stripped form, and single-separator rewrites.
pub fn username_variants(raw: &str) -> Vec<String> {
    let lowered = raw.trim().trim_start_matches('@').to_lowercase();
    if lowered.is_empty() {
        return Vec::new();
    }

    let mut variants = BTreeSet::new();
    variants.insert(lowered.clone());

    if let Some(canonical) = canonical_username(&lowered) {
        variants.insert(canonical.clone());
        if lowered != canonical {
            // Rewrites with each separator in place of the originals.
            for separator in SEPARATORS {
                let rewritten: String = lowered
                    .chars()
                    .map(|c| if SEPARATORS.contains(&c) { *separator } else { c })
                    .collect();
                variants.insert(rewritten);
            }
        }
    }

    variants.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_strips_separators_and_at() {
        assert_eq!(canonical_username("@Alice_Roe"), Some("aliceroe".to_string()));
        assert_eq!(canonical_username("a.roe"), Some("aroe".to_string()));
        assert_eq!(canonical_username("___"), None);
        assert_eq!(canonical_username(""), None);
    }

    #[test]
    fn test_variants_cover_separator_rewrites() {
        let variants = username_variants("alice.roe");
        assert!(variants.contains(&"alice.roe".to_string()));
        assert!(variants.contains(&"aliceroe".to_string()));
        assert!(variants.contains(&"alice_roe".to_string()));
        assert!(variants.contains(&"alice-roe".to_string()));
    }

    #[test]
    fn test_separator_free_handle_has_single_variant() {
        assert_eq!(username_variants("aroe"), vec!["aroe".to_string()]);
    }

    #[test]
    fn test_canonicalization_is_idempotent() {
        let once = canonical_username("Alice_Roe").unwrap();
        assert_eq!(canonical_username(&once), Some(once.clone()));
    }
}
