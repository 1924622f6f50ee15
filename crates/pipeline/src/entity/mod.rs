//! Entity data model: candidates out of the parser, normalized entities
//! with canonical forms, and resolved clusters.
//!
//! Attributes are a typed map keyed by a closed enum, not open
//! dictionaries; every attribute the pipeline understands is named here.

use crate::types::VerificationStatus;
use chrono::{DateTime, Utc};
use osint_core::types::{EntityType, ResultId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a pre-resolution candidate
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(pub String);

impl CandidateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CandidateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable (within one investigation) identifier for a resolved entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed attribute vocabulary
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKey {
    FullName,
    DisplayName,
    Email,
    Phone,
    Username,
    Platform,
    Domain,
    Url,
    Bio,
    City,
    Region,
    Country,
    Employer,
    Industry,
    JobTitle,
    BirthYear,
    Registrar,
    RegisteredAt,
    Nameservers,
    BreachName,
    BreachDate,
    DataClasses,
    DocumentTitle,
    EventDate,
    CompanyNumber,
    Jurisdiction,
    Officers,
    FirstSeen,
    LastSeen,
}

/// Typed attribute values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
    List(Vec<String>),
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AttributeValue::List(values) => Some(values),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

pub type AttributeMap = BTreeMap<AttributeKey, AttributeValue>;

/// A typed extraction from one raw result, pre-normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCandidate {
    pub candidate_id: CandidateId,
    pub entity_type: EntityType,
    pub attributes: AttributeMap,
    pub source_refs: Vec<ResultId>,
    /// Extractor confidence in [0, 1]; textual extraction scores lower
    /// than structural or pattern extraction
    pub extraction_confidence: f64,
    pub source_name: String,
    /// Base confidence of the producing source, in [0, 1]
    pub source_confidence: f64,
    pub retrieved_at: DateTime<Utc>,
}

impl EntityCandidate {
    pub fn new(entity_type: EntityType, source_name: impl Into<String>) -> Self {
        Self {
            candidate_id: CandidateId::new(),
            entity_type,
            attributes: BTreeMap::new(),
            source_refs: Vec::new(),
            extraction_confidence: 0.5,
            source_name: source_name.into(),
            source_confidence: 0.5,
            retrieved_at: Utc::now(),
        }
    }

    pub fn with_attribute(
        mut self,
        key: AttributeKey,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(key, value.into());
        self
    }

    pub fn with_source_ref(mut self, result_id: ResultId) -> Self {
        self.source_refs.push(result_id);
        self
    }

    pub fn with_extraction_confidence(mut self, confidence: f64) -> Self {
        self.extraction_confidence = osint_core::utils::clamp_unit(confidence);
        self
    }

    pub fn with_source_confidence(mut self, confidence: f64) -> Self {
        self.source_confidence = osint_core::utils::clamp_unit(confidence);
        self
    }

    pub fn text(&self, key: AttributeKey) -> Option<&str> {
        self.attributes.get(&key).and_then(AttributeValue::as_text)
    }
}

/// Canonical comparison forms computed by the normalizer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanonicalForms {
    /// Lowercased, provider-canonicalized address
    pub normalized_email: Option<String>,
    /// Address with provider alias semantics stripped (dots, plus tags)
    pub deliverable_key: Option<String>,
    pub e164_phone: Option<String>,
    pub phone_last7: Option<String>,
    pub canonical_username: Option<String>,
    pub username_variants: Vec<String>,
    /// Alphabetically ordered name tokens (comparison key)
    pub name_tokens: Vec<String>,
    /// Phonetic codes (Soundex and Metaphone-like) per name token
    pub phonetic_codes: Vec<String>,
    pub normalized_domain: Option<String>,
    pub location: Option<LocationKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationKey {
    /// ISO 3166-1 alpha-2
    pub country: String,
    pub region: Option<String>,
    pub city: Option<String>,
}

/// A candidate with canonical forms and a quality score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEntity {
    pub candidate: EntityCandidate,
    pub canonical: CanonicalForms,
    /// completeness x consistency x source confidence, in [0, 1]
    pub quality_score: f64,
}

/// A cluster of normalized candidates treated as one real-world entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub entity_id: EntityId,
    pub entity_type: EntityType,
    pub attributes: AttributeMap,
    /// Conflicting values that lost merge resolution, preserved for review
    pub disputed_attributes: BTreeMap<AttributeKey, Vec<AttributeValue>>,
    /// Final confidence in 0-100
    pub confidence: u8,
    pub verification_status: VerificationStatus,
    pub member_candidates: Vec<CandidateId>,
    pub sources: BTreeSet<String>,
    pub source_refs: BTreeSet<ResultId>,
    /// Set when a below-threshold pairing left this entity unmerged but
    /// plausibly the same subject as another
    pub ambiguous_with: Vec<EntityId>,
}

impl ResolvedEntity {
    pub fn is_ambiguous(&self) -> bool {
        !self.ambiguous_with.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_builder() {
        let candidate = EntityCandidate::new(EntityType::Person, "web_search")
            .with_attribute(AttributeKey::FullName, "Alice Roe")
            .with_attribute(AttributeKey::BirthYear, 1988_i64)
            .with_extraction_confidence(1.2);

        assert_eq!(candidate.text(AttributeKey::FullName), Some("Alice Roe"));
        assert_eq!(
            candidate
                .attributes
                .get(&AttributeKey::BirthYear)
                .and_then(AttributeValue::as_integer),
            Some(1988)
        );
        // Confidence clamps into [0, 1].
        assert!((candidate.extraction_confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_attribute_value_accessors() {
        let list = AttributeValue::List(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(list.as_list().map(|l| l.len()), Some(2));
        assert!(list.as_text().is_none());
    }
}
