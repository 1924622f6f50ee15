//! Candidate normalization: canonical forms plus a quality score.

mod domain;
mod email;
mod location;
mod name;
mod phone;
mod username;

pub use domain::{apex_domain, normalize_domain};
pub use email::{deliverable_key, normalize_email};
pub use location::normalize_location;
pub use name::{metaphone, name_tokens, phonetic_codes, soundex};
pub use phone::{last7, normalize_phone};
pub use username::{canonical_username, username_variants};

use crate::entity::{
    AttributeKey, CanonicalForms, EntityCandidate, NormalizedEntity,
};
use osint_core::types::EntityType;
use osint_core::utils::clamp_unit;

/// Normalizer configured from the investigation seed: geographic hints
/// supply the default country for national phone formats and bare city
/// locations.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    default_country: Option<String>,
}

impl Normalizer {
    pub fn new(default_country: Option<String>) -> Self {
        Self {
            default_country: default_country.map(|c| c.to_ascii_uppercase()),
        }
    }

    pub fn normalize(&self, candidate: EntityCandidate) -> NormalizedEntity {
        let canonical = self.canonical_forms(&candidate);
        let quality_score = self.quality_score(&candidate, &canonical);
        NormalizedEntity {
            candidate,
            canonical,
            quality_score,
        }
    }

    fn canonical_forms(&self, candidate: &EntityCandidate) -> CanonicalForms {
        let country = self.default_country.as_deref();
        let mut forms = CanonicalForms::default();

        if let Some(email) = candidate.text(AttributeKey::Email) {
            forms.normalized_email = normalize_email(email);
            forms.deliverable_key = deliverable_key(email);
        }
        if let Some(phone) = candidate.text(AttributeKey::Phone) {
            forms.e164_phone = normalize_phone(phone, country);
            forms.phone_last7 = forms.e164_phone.as_deref().and_then(last7);
        }
        if let Some(handle) = candidate.text(AttributeKey::Username) {
            forms.canonical_username = canonical_username(handle);
            forms.username_variants = username_variants(handle);
        }
        let name = candidate
            .text(AttributeKey::FullName)
            .or_else(|| candidate.text(AttributeKey::DisplayName));
        if let Some(name) = name {
            forms.name_tokens = name_tokens(name);
            forms.phonetic_codes = phonetic_codes(&forms.name_tokens);
        }
        if let Some(domain) = candidate.text(AttributeKey::Domain) {
            forms.normalized_domain = normalize_domain(domain);
        }
        if let Some(city) = candidate.text(AttributeKey::City) {
            let composed = match candidate.text(AttributeKey::Region) {
                Some(region) => format!("{}, {}", city, region),
                None => city.to_string(),
            };
            let explicit_country = candidate.text(AttributeKey::Country);
            forms.location = normalize_location(&composed, explicit_country.or(country));
        }

        forms
    }

    /// completeness x internal consistency x source confidence, all in [0, 1].
    fn quality_score(&self, candidate: &EntityCandidate, canonical: &CanonicalForms) -> f64 {
        let completeness = Self::completeness(candidate);
        let consistency = self.consistency(candidate, canonical);
        clamp_unit(completeness * consistency * candidate.source_confidence)
    }

    fn completeness(candidate: &EntityCandidate) -> f64 {
        let expected: &[AttributeKey] = match candidate.entity_type {
            EntityType::Person => &[
                AttributeKey::FullName,
                AttributeKey::Email,
                AttributeKey::Username,
                AttributeKey::City,
                AttributeKey::Employer,
            ],
            EntityType::Organization => &[
                AttributeKey::FullName,
                AttributeKey::Domain,
                AttributeKey::Jurisdiction,
            ],
            EntityType::Email => &[AttributeKey::Email],
            EntityType::Phone => &[AttributeKey::Phone],
            EntityType::Username => &[AttributeKey::Username, AttributeKey::Platform],
            EntityType::Domain => &[
                AttributeKey::Domain,
                AttributeKey::Registrar,
                AttributeKey::RegisteredAt,
            ],
            EntityType::SocialProfile => &[
                AttributeKey::Username,
                AttributeKey::Platform,
                AttributeKey::Url,
            ],
            EntityType::Location => &[AttributeKey::City, AttributeKey::Country],
            EntityType::Document => &[AttributeKey::DocumentTitle, AttributeKey::Url],
            EntityType::Event => &[AttributeKey::EventDate, AttributeKey::DocumentTitle],
        };

        let present = expected
            .iter()
            .filter(|key| candidate.attributes.contains_key(key))
            .count();
        // A lone identifying attribute still carries real signal.
        let floor = 1.0 / expected.len().max(1) as f64;
        (present as f64 / expected.len().max(1) as f64).max(floor)
    }

    fn consistency(&self, candidate: &EntityCandidate, canonical: &CanonicalForms) -> f64 {
        let mut score: f64 = 1.0;

        // A phone that cannot be parsed, or that disagrees with the
        // geographic hints' dial region, lowers internal consistency.
        if candidate.text(AttributeKey::Phone).is_some() {
            match (&canonical.e164_phone, self.default_country.as_deref()) {
                (None, _) => score *= 0.7,
                (Some(e164), Some("US" | "CA")) if !e164.starts_with("+1") => score *= 0.8,
                _ => {}
            }
        }

        if candidate.text(AttributeKey::Email).is_some() && canonical.normalized_email.is_none() {
            score *= 0.7;
        }

        if let Some(year) = candidate
            .attributes
            .get(&AttributeKey::BirthYear)
            .and_then(|value| value.as_integer())
        {
            if !(1900..=2010).contains(&year) {
                score *= 0.6;
            }
        }

        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityCandidate;
    use osint_core::types::EntityType;

    fn person_candidate() -> EntityCandidate {
        EntityCandidate::new(EntityType::Person, "web_search")
            .with_attribute(AttributeKey::FullName, "Alice Roe")
            .with_attribute(AttributeKey::Email, "Alice.Roe+news@GoogleMail.com")
            .with_attribute(AttributeKey::Phone, "(503) 555-1234")
            .with_attribute(AttributeKey::Username, "Alice_Roe")
            .with_attribute(AttributeKey::City, "Portland")
            .with_attribute(AttributeKey::Region, "OR")
            .with_source_confidence(0.9)
    }

    #[test]
    fn test_canonical_forms_populated() {
        let normalizer = Normalizer::new(Some("us".to_string()));
        let normalized = normalizer.normalize(person_candidate());
        let forms = &normalized.canonical;

        assert_eq!(
            forms.normalized_email.as_deref(),
            Some("alice.roe+news@gmail.com")
        );
        assert_eq!(forms.deliverable_key.as_deref(), Some("aliceroe@gmail.com"));
        assert_eq!(forms.e164_phone.as_deref(), Some("+15035551234"));
        assert_eq!(forms.phone_last7.as_deref(), Some("5551234"));
        assert_eq!(forms.canonical_username.as_deref(), Some("aliceroe"));
        assert_eq!(forms.name_tokens, vec!["alice", "roe"]);
        assert!(!forms.phonetic_codes.is_empty());
        let location = forms.location.as_ref().unwrap();
        assert_eq!(location.country, "US");
    }

    #[test]
    fn test_quality_score_in_unit_range() {
        let normalizer = Normalizer::new(Some("US".to_string()));
        let normalized = normalizer.normalize(person_candidate());
        assert!(normalized.quality_score > 0.0);
        assert!(normalized.quality_score <= 1.0);
    }

    #[test]
    fn test_inconsistent_phone_lowers_quality() {
        let normalizer = Normalizer::new(Some("US".to_string()));

        let clean = normalizer.normalize(person_candidate());
        let garbled = normalizer.normalize(
            person_candidate().with_attribute(AttributeKey::Phone, "12"),
        );

        assert!(garbled.quality_score < clean.quality_score);
    }

    #[test]
    fn test_normalizing_normalized_entity_is_noop() {
        let normalizer = Normalizer::new(Some("US".to_string()));
        let first = normalizer.normalize(person_candidate());

        // Re-normalizing the same candidate reproduces identical canonical
        // forms and quality.
        let second = normalizer.normalize(first.candidate.clone());
        assert_eq!(
            serde_json::to_value(&first.canonical).unwrap(),
            serde_json::to_value(&second.canonical).unwrap()
        );
        assert!((first.quality_score - second.quality_score).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sparse_candidate_gets_floor_completeness() {
        let normalizer = Normalizer::default();
        let candidate = EntityCandidate::new(EntityType::Email, "breach_directory")
            .with_attribute(AttributeKey::Email, "bob@example.com")
            .with_source_confidence(0.8);
        let normalized = normalizer.normalize(candidate);
        assert!(normalized.quality_score > 0.5);
    }
}
