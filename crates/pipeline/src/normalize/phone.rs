//! Phone canonicalization to E.164.

/// Dial codes for the countries the pipeline maps hints onto.
const DIAL_CODES: &[(&str, &str)] = &[
    ("US", "1"),
    ("CA", "1"),
    ("GB", "44"),
    ("DE", "49"),
    ("FR", "33"),
    ("NL", "31"),
    ("ES", "34"),
    ("IT", "39"),
    ("SE", "46"),
    ("AU", "61"),
    ("JP", "81"),
    ("IN", "91"),
    ("BR", "55"),
];

fn dial_code(country: &str) -> Option<&'static str> {
    let country = country.to_ascii_uppercase();
    DIAL_CODES
        .iter()
        .find(|(code, _)| *code == country)
        .map(|(_, dial)| *dial)
}

/// Parse a raw phone string to E.164, inferring the country for national
/// formats from `default_country` (ISO 3166-1 alpha-2).
pub fn normalize_phone(raw: &str, default_country: Option<&str>) -> Option<String> {
    let trimmed = raw.trim();
    let international = trimmed.starts_with('+') || trimmed.starts_with("00");

    let mut digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if trimmed.starts_with("00") {
        digits = digits[2..].to_string();
    }

    if international {
        if (7..=15).contains(&digits.len()) {
            return Some(format!("+{}", digits));
        }
        return None;
    }

    let country = default_country?;
    let dial = dial_code(country)?;

    // National trunk prefix: strip a leading zero outside NANP.
    if dial != "1" && digits.starts_with('0') {
        digits = digits[1..].to_string();
    }

    // NANP numbers are exactly ten national digits.
    if dial == "1" {
        if digits.len() == 11 && digits.starts_with('1') {
            digits = digits[1..].to_string();
        }
        if digits.len() != 10 {
            return None;
        }
    } else if !(6..=14).contains(&digits.len()) {
        return None;
    }

    let combined = format!("+{}{}", dial, digits);
    if (8..=16).contains(&combined.len()) {
        Some(combined)
    } else {
        None
    }
}

/// Partial-match key: the last seven digits.
pub fn last7(e164: &str) -> Option<String> {
    let digits: String = e164.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 7 {
        return None;
    }
    Some(digits[digits.len() - 7..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_e164_passthrough() {
        assert_eq!(
            normalize_phone("+1 (503) 555-1234", None),
            Some("+15035551234".to_string())
        );
        assert_eq!(
            normalize_phone("0044 20 7946 0123", None),
            Some("+442079460123".to_string())
        );
    }

    #[test]
    fn test_national_with_inferred_country() {
        assert_eq!(
            normalize_phone("(503) 555-1234", Some("US")),
            Some("+15035551234".to_string())
        );
        assert_eq!(
            normalize_phone("1-503-555-1234", Some("US")),
            Some("+15035551234".to_string())
        );
        assert_eq!(
            normalize_phone("020 7946 0123", Some("GB")),
            Some("+442079460123".to_string())
        );
    }

    #[test]
    fn test_national_without_country_fails() {
        assert_eq!(normalize_phone("503-555-1234", None), None);
    }

    #[test]
    fn test_last7_key() {
        assert_eq!(last7("+15035551234"), Some("5551234".to_string()));
        assert_eq!(last7("+1234"), None);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalize_phone("(503) 555-1234", Some("US")).unwrap();
        assert_eq!(normalize_phone(&once, Some("US")), Some(once.clone()));
        assert_eq!(normalize_phone(&once, None), Some(once));
    }
}
