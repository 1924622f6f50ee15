//! Location canonicalization to a (country, region, city) key.

use crate::entity::LocationKey;

const COUNTRY_NAMES: &[(&str, &str)] = &[
    ("united states", "US"),
    ("usa", "US"),
    ("america", "US"),
    ("united kingdom", "GB"),
    ("uk", "GB"),
    ("england", "GB"),
    ("germany", "DE"),
    ("france", "FR"),
    ("canada", "CA"),
    ("australia", "AU"),
    ("netherlands", "NL"),
    ("spain", "ES"),
    ("italy", "IT"),
    ("sweden", "SE"),
    ("japan", "JP"),
    ("india", "IN"),
    ("brazil", "BR"),
];

const US_STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC",
];

fn country_code(token: &str) -> Option<String> {
    let lowered = token.trim().to_lowercase();
    if lowered.len() == 2 && lowered.chars().all(|c| c.is_ascii_alphabetic()) {
        return Some(lowered.to_ascii_uppercase());
    }
    COUNTRY_NAMES
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, code)| code.to_string())
}

/// Parse free-text locations like "Portland, OR" or "Berlin, Germany" into
/// a location key. `default_country` fills the country when the text only
/// names a city/region.
pub fn normalize_location(raw: &str, default_country: Option<&str>) -> Option<LocationKey> {
    let parts: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        return None;
    }

    let mut city: Option<String> = None;
    let mut region: Option<String> = None;
    let mut country: Option<String> = None;

    match parts.len() {
        1 => {
            if let Some(code) = country_code(parts[0]) {
                country = Some(code);
            } else {
                city = Some(parts[0].to_lowercase());
            }
        }
        2 => {
            city = Some(parts[0].to_lowercase());
            let second = parts[1];
            let upper = second.to_ascii_uppercase();
            if US_STATES.contains(&upper.as_str()) {
                region = Some(upper);
                country = Some("US".to_string());
            } else if let Some(code) = country_code(second) {
                country = Some(code);
            } else {
                region = Some(second.to_lowercase());
            }
        }
        _ => {
            city = Some(parts[0].to_lowercase());
            region = Some(parts[1].to_lowercase());
            country = country_code(parts[parts.len() - 1]);
        }
    }

    let country = country.or_else(|| default_country.map(|c| c.to_ascii_uppercase()))?;
    Some(LocationKey {
        country,
        region,
        city,
    })
}
