//! Weighted fuzzy matching between two normalized entity records.
//!
//! Produces a score in [0, 100] with a per-field breakdown naming the
//! algorithm used, the inputs, and each field's contribution. Fields absent
//! from either record are excluded and the remaining weights renormalized;
//! a field present on both sides that disagrees scores low and drags the
//! total down.

use crate::entity::NormalizedEntity;
use serde::Serialize;
use std::collections::BTreeSet;
use strsim::{jaro_winkler, normalized_levenshtein};

/// Relative field weights; defaults follow the investigation profile
/// (identity signals over biography).
#[derive(Debug, Clone, Serialize)]
pub struct MatchWeights {
    pub name: f64,
    pub email: f64,
    pub phone: f64,
    pub username: f64,
    pub biographical: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            name: 0.25,
            email: 0.25,
            phone: 0.15,
            username: 0.15,
            biographical: 0.20,
        }
    }
}

/// One field's verdict inside a match score
#[derive(Debug, Clone, Serialize)]
pub struct FieldScore {
    pub field: &'static str,
    pub algorithm: String,
    /// Raw field score in [0, 100]
    pub score: f64,
    pub weight: f64,
    /// Weighted contribution to the renormalized total
    pub contribution: f64,
    pub reasoning: String,
}

/// The weighted total plus its per-field explanation
#[derive(Debug, Clone, Serialize)]
pub struct MatchScore {
    pub total: f64,
    pub fields: Vec<FieldScore>,
}

impl MatchScore {
    pub fn explain(&self) -> String {
        let mut lines = vec![format!("total score {:.1}", self.total)];
        for field in &self.fields {
            lines.push(format!(
                "  {}: {:.1} via {} (weight {:.2}) - {}",
                field.field, field.score, field.algorithm, field.weight, field.reasoning
            ));
        }
        lines.join("\n")
    }
}

pub struct FuzzyMatcher {
    weights: MatchWeights,
}

impl FuzzyMatcher {
    pub fn new(weights: MatchWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, a: &NormalizedEntity, b: &NormalizedEntity) -> MatchScore {
        let mut fields = Vec::new();

        if let Some(field) = self.score_name(a, b) {
            fields.push(field);
        }
        if let Some(field) = self.score_email(a, b) {
            fields.push(field);
        }
        if let Some(field) = self.score_phone(a, b) {
            fields.push(field);
        }
        if let Some(field) = self.score_username(a, b) {
            fields.push(field);
        }
        if let Some(field) = self.score_biographical(a, b) {
            fields.push(field);
        }

        let weight_sum: f64 = fields.iter().map(|field| field.weight).sum();
        let total = if weight_sum > 0.0 {
            let weighted: f64 = fields
                .iter()
                .map(|field| field.score * field.weight)
                .sum::<f64>()
                / weight_sum;
            weighted.clamp(0.0, 100.0)
        } else {
            0.0
        };

        for field in &mut fields {
            field.contribution = if weight_sum > 0.0 {
                field.score * field.weight / weight_sum
            } else {
                0.0
            };
        }

        MatchScore { total, fields }
    }

    fn score_name(&self, a: &NormalizedEntity, b: &NormalizedEntity) -> Option<FieldScore> {
        let tokens_a = &a.canonical.name_tokens;
        let tokens_b = &b.canonical.name_tokens;
        if tokens_a.is_empty() || tokens_b.is_empty() {
            return None;
        }

        let jaccard = token_jaccard(tokens_a, tokens_b) * 100.0;
        let joined_a = tokens_a.join(" ");
        let joined_b = tokens_b.join(" ");
        let edit = normalized_levenshtein(&joined_a, &joined_b) * 100.0;
        let jw = jaro_winkler(&joined_a, &joined_b) * 100.0;
        let phonetic = phonetic_overlap(&a.canonical.phonetic_codes, &b.canonical.phonetic_codes)
            * 100.0;

        let candidates = [
            ("token_set_jaccard", jaccard),
            ("ordered_token_edit_distance", edit),
            ("jaro_winkler", jw),
            ("phonetic_code_match", phonetic),
        ];
        let (algorithm, score) = candidates
            .iter()
            .max_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(std::cmp::Ordering::Equal))
            .copied()?;

        Some(FieldScore {
            field: "name",
            algorithm: algorithm.to_string(),
            score,
            weight: self.weights.name,
            contribution: 0.0,
            reasoning: format!("'{}' vs '{}', best of four metrics", joined_a, joined_b),
        })
    }

    fn score_email(&self, a: &NormalizedEntity, b: &NormalizedEntity) -> Option<FieldScore> {
        let email_a = a.canonical.normalized_email.as_deref()?;
        let email_b = b.canonical.normalized_email.as_deref()?;
        let key_a = a.canonical.deliverable_key.as_deref();
        let key_b = b.canonical.deliverable_key.as_deref();

        let (algorithm, score, reasoning) = if key_a.is_some() && key_a == key_b {
            (
                "deliverable_key_exact",
                100.0,
                format!("both deliver to {}", key_a.unwrap_or_default()),
            )
        } else {
            let (local_a, domain_a) = email_a.split_once('@')?;
            let (local_b, domain_b) = email_b.split_once('@')?;
            let stripped_a = strip_alias(local_a);
            let stripped_b = strip_alias(local_b);

            if stripped_a == stripped_b && domain_a != domain_b {
                (
                    "alias_equivalent_local",
                    90.0,
                    format!("same local '{}' on different providers", stripped_a),
                )
            } else if domain_a == domain_b {
                let jw = jaro_winkler(local_a, local_b) * 100.0;
                (
                    "jaro_winkler_local",
                    jw,
                    format!("same domain {}, locals '{}' vs '{}'", domain_a, local_a, local_b),
                )
            } else {
                (
                    "no_overlap",
                    0.0,
                    format!("{} vs {}", email_a, email_b),
                )
            }
        };

        Some(FieldScore {
            field: "email",
            algorithm: algorithm.to_string(),
            score,
            weight: self.weights.email,
            contribution: 0.0,
            reasoning,
        })
    }

    fn score_phone(&self, a: &NormalizedEntity, b: &NormalizedEntity) -> Option<FieldScore> {
        let phone_a = a.canonical.e164_phone.as_deref()?;
        let phone_b = b.canonical.e164_phone.as_deref()?;

        let (algorithm, score, reasoning) = if phone_a == phone_b {
            ("e164_exact", 100.0, format!("both {}", phone_a))
        } else if a.canonical.phone_last7.is_some()
            && a.canonical.phone_last7 == b.canonical.phone_last7
        {
            (
                "last7_match",
                80.0,
                format!("last seven digits agree: {} vs {}", phone_a, phone_b),
            )
        } else {
            let digits_a: String = phone_a.chars().filter(|c| c.is_ascii_digit()).collect();
            let digits_b: String = phone_b.chars().filter(|c| c.is_ascii_digit()).collect();
            (
                "jaro_winkler_digits",
                jaro_winkler(&digits_a, &digits_b) * 100.0,
                format!("{} vs {}", phone_a, phone_b),
            )
        };

        Some(FieldScore {
            field: "phone",
            algorithm: algorithm.to_string(),
            score,
            weight: self.weights.phone,
            contribution: 0.0,
            reasoning,
        })
    }

    fn score_username(&self, a: &NormalizedEntity, b: &NormalizedEntity) -> Option<FieldScore> {
        let canon_a = a.canonical.canonical_username.as_deref()?;
        let canon_b = b.canonical.canonical_username.as_deref()?;

        let (algorithm, score, reasoning) = if canon_a == canon_b {
            ("canonical_exact", 100.0, format!("both canonicalize to '{}'", canon_a))
        } else {
            let variants_a: BTreeSet<&String> = a.canonical.username_variants.iter().collect();
            let variants_b: BTreeSet<&String> = b.canonical.username_variants.iter().collect();
            if variants_a.intersection(&variants_b).next().is_some() {
                (
                    "variant_match",
                    90.0,
                    format!("variant sets of '{}' and '{}' intersect", canon_a, canon_b),
                )
            } else {
                (
                    "edit_distance_ratio",
                    normalized_levenshtein(canon_a, canon_b) * 100.0,
                    format!("'{}' vs '{}'", canon_a, canon_b),
                )
            }
        };

        Some(FieldScore {
            field: "username",
            algorithm: algorithm.to_string(),
            score,
            weight: self.weights.username,
            contribution: 0.0,
            reasoning,
        })
    }

    fn score_biographical(&self, a: &NormalizedEntity, b: &NormalizedEntity) -> Option<FieldScore> {
        use crate::entity::AttributeKey;

        let mut components: Vec<(String, f64)> = Vec::new();

        let year_a = a
            .candidate
            .attributes
            .get(&AttributeKey::BirthYear)
            .and_then(|value| value.as_integer());
        let year_b = b
            .candidate
            .attributes
            .get(&AttributeKey::BirthYear)
            .and_then(|value| value.as_integer());
        if let (Some(year_a), Some(year_b)) = (year_a, year_b) {
            let score = if (year_a - year_b).abs() <= 1 { 70.0 } else { 0.0 };
            components.push((format!("birth year {} vs {}", year_a, year_b), score));
        }

        let city_a = a.canonical.location.as_ref().and_then(|l| l.city.clone());
        let city_b = b.canonical.location.as_ref().and_then(|l| l.city.clone());
        if let (Some(city_a), Some(city_b)) = (city_a, city_b) {
            let score = if city_a == city_b { 60.0 } else { 0.0 };
            components.push((format!("city '{}' vs '{}'", city_a, city_b), score));
        }

        let employer_a = a.candidate.text(AttributeKey::Employer);
        let employer_b = b.candidate.text(AttributeKey::Employer);
        if let (Some(employer_a), Some(employer_b)) = (employer_a, employer_b) {
            let tokens_a: Vec<String> = crate::normalize::name_tokens(employer_a);
            let tokens_b: Vec<String> = crate::normalize::name_tokens(employer_b);
            let overlap = token_jaccard(&tokens_a, &tokens_b);
            components.push((
                format!("employer '{}' vs '{}'", employer_a, employer_b),
                overlap * 80.0,
            ));
        }

        if components.is_empty() {
            return None;
        }

        // Additive hint combination, saturating at 100.
        let score: f64 = components
            .iter()
            .map(|(_, score)| score)
            .sum::<f64>()
            .min(100.0);
        let reasoning = components
            .iter()
            .map(|(desc, score)| format!("{} ({:.0})", desc, score))
            .collect::<Vec<_>>()
            .join("; ");

        Some(FieldScore {
            field: "biographical",
            algorithm: "hint_combination".to_string(),
            score,
            weight: self.weights.biographical,
            contribution: 0.0,
            reasoning,
        })
    }
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(MatchWeights::default())
    }
}

fn strip_alias(local: &str) -> &str {
    match local.find('+') {
        Some(plus) => &local[..plus],
        None => local,
    }
}

fn token_jaccard(a: &[String], b: &[String]) -> f64 {
    let set_a: BTreeSet<&String> = a.iter().collect();
    let set_b: BTreeSet<&String> = b.iter().collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn phonetic_overlap(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set_a: BTreeSet<&String> = a.iter().collect();
    let set_b: BTreeSet<&String> = b.iter().collect();
    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / set_a.len().min(set_b.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{AttributeKey, EntityCandidate};
    use crate::normalize::Normalizer;
    use osint_core::types::EntityType;

    fn normalized(build: impl FnOnce(EntityCandidate) -> EntityCandidate) -> NormalizedEntity {
        let candidate = build(EntityCandidate::new(EntityType::Person, "test"));
        Normalizer::new(Some("US".to_string())).normalize(candidate)
    }

    #[test]
    fn test_identical_records_score_high() {
        let a = normalized(|c| {
            c.with_attribute(AttributeKey::FullName, "Alice Roe")
                .with_attribute(AttributeKey::Email, "alice@aroe.example")
                .with_attribute(AttributeKey::Username, "aroe")
        });
        let b = normalized(|c| {
            c.with_attribute(AttributeKey::FullName, "Alice Roe")
                .with_attribute(AttributeKey::Email, "alice@aroe.example")
                .with_attribute(AttributeKey::Username, "aroe")
        });

        let score = FuzzyMatcher::default().score(&a, &b);
        assert!(score.total > 95.0, "got {}", score.total);
    }

    #[test]
    fn test_deliverable_key_alias_scores_full() {
        let a = normalized(|c| {
            c.with_attribute(AttributeKey::FullName, "Alice Roe")
                .with_attribute(AttributeKey::Email, "alice.roe+news@gmail.com")
        });
        let b = normalized(|c| {
            c.with_attribute(AttributeKey::FullName, "Alice Roe")
                .with_attribute(AttributeKey::Email, "aliceroe@googlemail.com")
        });

        let score = FuzzyMatcher::default().score(&a, &b);
        let email = score.fields.iter().find(|f| f.field == "email").unwrap();
        assert_eq!(email.algorithm, "deliverable_key_exact");
        assert!((email.score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_phone_last7_partial_match() {
        let a = normalized(|c| {
            c.with_attribute(AttributeKey::FullName, "Alice Roe")
                .with_attribute(AttributeKey::Phone, "+15035551234")
        });
        let b = normalized(|c| {
            c.with_attribute(AttributeKey::FullName, "Alice Roe")
                .with_attribute(AttributeKey::Phone, "+442075551234")
        });

        let score = FuzzyMatcher::default().score(&a, &b);
        let phone = score.fields.iter().find(|f| f.field == "phone").unwrap();
        assert_eq!(phone.algorithm, "last7_match");
        assert!((phone.score - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_username_variant_match() {
        let a = normalized(|c| {
            c.with_attribute(AttributeKey::FullName, "Alice Roe")
                .with_attribute(AttributeKey::Username, "alice.roe")
        });
        let b = normalized(|c| {
            c.with_attribute(AttributeKey::FullName, "Alice Roe")
                .with_attribute(AttributeKey::Username, "alice_roe")
        });

        let score = FuzzyMatcher::default().score(&a, &b);
        let username = score.fields.iter().find(|f| f.field == "username").unwrap();
        // Both handles canonicalize to the same form.
        assert_eq!(username.algorithm, "canonical_exact");
    }

    #[test]
    fn test_conflicting_identities_land_in_ambiguous_band() {
        // Same name, city, and employer; different mailboxes; birth years
        // five apart. Expected: enough signal to flag, not enough to merge.
        let a = normalized(|c| {
            c.with_attribute(AttributeKey::FullName, "Jordan Vale")
                .with_attribute(AttributeKey::Email, "jordan.v@example.com")
                .with_attribute(AttributeKey::City, "Portland")
                .with_attribute(AttributeKey::Region, "OR")
                .with_attribute(AttributeKey::Employer, "Example Corp")
                .with_attribute(AttributeKey::BirthYear, 1985_i64)
        });
        let b = normalized(|c| {
            c.with_attribute(AttributeKey::FullName, "Jordan Vale")
                .with_attribute(AttributeKey::Email, "jv.consulting@elsewhere.net")
                .with_attribute(AttributeKey::City, "Portland")
                .with_attribute(AttributeKey::Region, "OR")
                .with_attribute(AttributeKey::Employer, "Example Corp")
                .with_attribute(AttributeKey::BirthYear, 1990_i64)
        });

        let score = FuzzyMatcher::default().score(&a, &b);
        assert!(
            (60.0..=75.0).contains(&score.total),
            "expected ambiguous band, got {:.1}\n{}",
            score.total,
            score.explain()
        );
    }

    #[test]
    fn test_unrelated_records_score_low() {
        let a = normalized(|c| {
            c.with_attribute(AttributeKey::FullName, "Alice Roe")
                .with_attribute(AttributeKey::Email, "alice@aroe.example")
        });
        let b = normalized(|c| {
            c.with_attribute(AttributeKey::FullName, "Bogdan Chen")
                .with_attribute(AttributeKey::Email, "bchen@unrelated.net")
        });

        let score = FuzzyMatcher::default().score(&a, &b);
        assert!(score.total < 40.0, "got {}", score.total);
    }

    #[test]
    fn test_reasoning_names_algorithms() {
        let a = normalized(|c| c.with_attribute(AttributeKey::FullName, "Alice Roe"));
        let b = normalized(|c| c.with_attribute(AttributeKey::FullName, "Alice Roe"));

        let score = FuzzyMatcher::default().score(&a, &b);
        let explanation = score.explain();
        assert!(explanation.contains("name"));
        assert!(explanation.contains("weight"));
    }

    #[test]
    fn test_no_common_fields_scores_zero() {
        let a = normalized(|c| c.with_attribute(AttributeKey::Email, "a@example.com"));
        let b = normalized(|c| c.with_attribute(AttributeKey::Phone, "+15035551234"));

        let score = FuzzyMatcher::default().score(&a, &b);
        assert_eq!(score.total, 0.0);
        assert!(score.fields.is_empty());
    }
}
