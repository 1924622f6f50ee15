//! Multi-factor risk scoring.
//!
//! Three sub-scores in [0, 100] plus an overall weighted blend. Scoring is
//! a pure function of the resolved entities, graph, and timeline, so the
//! same investigation data always produces the same numbers.

use crate::entity::{AttributeKey, ResolvedEntity};
use crate::graph::EntityGraph;
use crate::timeline::TimelineBuilder;
use osint_core::types::EntityType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            RiskLevel::Low
        } else if score < 50.0 {
            RiskLevel::Medium
        } else if score < 70.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

/// One exposure category's contribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryExposure {
    pub category: String,
    pub weight: f64,
    /// Saturating raw score in [0, 100]
    pub score: f64,
    pub item_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub privacy_exposure: f64,
    pub security_risk: f64,
    pub identity_theft_risk: f64,
    pub overall_score: f64,
    pub risk_level: RiskLevel,
    pub categories: Vec<CategoryExposure>,
    /// Highest-contributing factors, for the executive summary
    pub key_exposures: Vec<String>,
}

pub struct RiskScorer;

impl RiskScorer {
    pub fn assess(
        entities: &[ResolvedEntity],
        graph: &EntityGraph,
        timeline: &TimelineBuilder,
        reference_year: i32,
    ) -> RiskAssessment {
        let categories = Self::privacy_categories(entities, graph);
        let privacy_exposure = categories
            .iter()
            .map(|category| category.score * category.weight)
            .sum::<f64>()
            .clamp(0.0, 100.0);

        let security_risk = Self::security_risk(entities, reference_year);
        let identity_theft_risk = Self::identity_theft_risk(entities);
        let misc = Self::footprint_score(entities, timeline);

        let overall_score = (0.35 * privacy_exposure
            + 0.30 * security_risk
            + 0.20 * identity_theft_risk
            + 0.15 * misc)
            .clamp(0.0, 100.0);

        let mut ranked: Vec<(f64, String)> = categories
            .iter()
            .filter(|category| category.score > 0.0)
            .map(|category| {
                (
                    category.score * category.weight,
                    format!(
                        "{} exposure ({} items)",
                        category.category, category.item_count
                    ),
                )
            })
            .collect();
        if security_risk > 30.0 {
            ranked.push((
                security_risk * 0.30,
                format!("breach exposure (security score {:.0})", security_risk),
            ));
        }
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        let key_exposures: Vec<String> = ranked.into_iter().take(3).map(|(_, s)| s).collect();

        RiskAssessment {
            privacy_exposure,
            security_risk,
            identity_theft_risk,
            overall_score,
            risk_level: RiskLevel::from_score(overall_score),
            categories,
            key_exposures,
        }
    }

    fn privacy_categories(
        entities: &[ResolvedEntity],
        graph: &EntityGraph,
    ) -> Vec<CategoryExposure> {
        let has = |entity: &ResolvedEntity, key: AttributeKey| entity.attributes.contains_key(&key);

        let contact_items = entities
            .iter()
            .filter(|e| has(e, AttributeKey::Email) || has(e, AttributeKey::Phone))
            .count();
        let professional_items = entities
            .iter()
            .filter(|e| has(e, AttributeKey::Employer) || has(e, AttributeKey::JobTitle))
            .count();
        let identity_items = entities
            .iter()
            .filter(|e| {
                e.entity_type == EntityType::Person
                    && (has(e, AttributeKey::FullName) || has(e, AttributeKey::BirthYear))
            })
            .count();
        let behavioral_items = entities
            .iter()
            .filter(|e| {
                e.entity_type == EntityType::SocialProfile || e.entity_type == EntityType::Username
            })
            .count();
        let network_items = graph.edge_count();

        // Each category saturates: a handful of exposed items is already
        // most of the damage.
        let saturate = |count: usize, full_at: usize| -> f64 {
            (count as f64 / full_at as f64 * 100.0).min(100.0)
        };

        vec![
            CategoryExposure {
                category: "contact".to_string(),
                weight: 0.30,
                score: saturate(contact_items, 3),
                item_count: contact_items,
            },
            CategoryExposure {
                category: "professional".to_string(),
                weight: 0.25,
                score: saturate(professional_items, 3),
                item_count: professional_items,
            },
            CategoryExposure {
                category: "identity".to_string(),
                weight: 0.20,
                score: saturate(identity_items, 2),
                item_count: identity_items,
            },
            CategoryExposure {
                category: "behavioral".to_string(),
                weight: 0.15,
                score: saturate(behavioral_items, 4),
                item_count: behavioral_items,
            },
            CategoryExposure {
                category: "network".to_string(),
                weight: 0.10,
                score: saturate(network_items, 10),
                item_count: network_items,
            },
        ]
    }

    fn security_risk(entities: &[ResolvedEntity], reference_year: i32) -> f64 {
        let mut score: f64 = 0.0;

        for entity in entities {
            let Some(breach_date) = entity
                .attributes
                .get(&AttributeKey::BreachDate)
                .and_then(|v| v.as_text())
            else {
                continue;
            };

            // Number x recency: recent breaches weigh more.
            let breach_year: i32 = breach_date
                .get(0..4)
                .and_then(|y| y.parse().ok())
                .unwrap_or(reference_year - 10);
            let age = (reference_year - breach_year).max(0) as f64;
            let recency = (1.0 - age / 10.0).max(0.2);
            score += 25.0 * recency;

            // Leaked credential material is the dominant signal.
            if let Some(classes) = entity
                .attributes
                .get(&AttributeKey::DataClasses)
                .and_then(|v| v.as_list())
            {
                if classes.iter().any(|class| {
                    let class = class.to_lowercase();
                    class.contains("password") || class.contains("credential")
                }) {
                    score += 20.0;
                }
            }
        }

        // Infrastructure surface: certificate and archive history expands
        // the attack surface modestly.
        let infra = entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Domain)
            .count();
        score += (infra as f64 * 4.0).min(20.0);

        score.clamp(0.0, 100.0)
    }

    fn identity_theft_risk(entities: &[ResolvedEntity]) -> f64 {
        let mut score: f64 = 0.0;
        let has_any = |key: AttributeKey| entities.iter().any(|e| e.attributes.contains_key(&key));

        if has_any(AttributeKey::BirthYear) {
            score += 30.0;
        }
        if has_any(AttributeKey::City) || has_any(AttributeKey::Region) {
            score += 20.0;
        }
        let credentialed = entities.iter().any(|e| {
            e.attributes
                .get(&AttributeKey::DataClasses)
                .and_then(|v| v.as_list())
                .map(|classes| {
                    classes.iter().any(|class| {
                        let class = class.to_lowercase();
                        class.contains("password")
                            || class.contains("bank")
                            || class.contains("credit")
                    })
                })
                .unwrap_or(false)
        });
        if credentialed {
            score += 35.0;
        }
        if has_any(AttributeKey::Email) && has_any(AttributeKey::Phone) {
            score += 15.0;
        }

        score.clamp(0.0, 100.0)
    }

    fn footprint_score(entities: &[ResolvedEntity], timeline: &TimelineBuilder) -> f64 {
        let entity_spread = (entities.len() as f64 * 5.0).min(60.0);
        let event_spread = timeline
            .subjects()
            .iter()
            .map(|subject| timeline.event_count(subject))
            .sum::<usize>() as f64
            * 4.0;
        (entity_spread + event_spread.min(40.0)).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{AttributeValue, EntityId};
    use crate::types::VerificationStatus;
    use std::collections::{BTreeMap, BTreeSet};

    fn entity(entity_type: EntityType, attrs: Vec<(AttributeKey, AttributeValue)>) -> ResolvedEntity {
        ResolvedEntity {
            entity_id: EntityId::new(),
            entity_type,
            attributes: attrs.into_iter().collect(),
            disputed_attributes: BTreeMap::new(),
            confidence: 80,
            verification_status: VerificationStatus::Probable,
            member_candidates: vec![],
            sources: BTreeSet::new(),
            source_refs: BTreeSet::new(),
            ambiguous_with: vec![],
        }
    }

    #[test]
    fn test_empty_investigation_is_low_risk() {
        let assessment = RiskScorer::assess(&[], &EntityGraph::new(), &TimelineBuilder::new(), 2026);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert_eq!(assessment.overall_score, 0.0);
    }

    #[test]
    fn test_breach_with_passwords_raises_security_risk() {
        let clean = vec![entity(
            EntityType::Person,
            vec![(
                AttributeKey::FullName,
                AttributeValue::Text("Alice Roe".to_string()),
            )],
        )];
        let breached = vec![entity(
            EntityType::Email,
            vec![
                (
                    AttributeKey::BreachDate,
                    AttributeValue::Text("2024-06-01".to_string()),
                ),
                (
                    AttributeKey::DataClasses,
                    AttributeValue::List(vec![
                        "Email addresses".to_string(),
                        "Passwords".to_string(),
                    ]),
                ),
            ],
        )];

        let graph = EntityGraph::new();
        let timeline = TimelineBuilder::new();
        let clean_assessment = RiskScorer::assess(&clean, &graph, &timeline, 2026);
        let breached_assessment = RiskScorer::assess(&breached, &graph, &timeline, 2026);

        assert!(breached_assessment.security_risk > clean_assessment.security_risk);
        assert!(breached_assessment.security_risk >= 40.0);
    }

    #[test]
    fn test_old_breach_weighs_less_than_recent() {
        let breach = |date: &str| {
            vec![entity(
                EntityType::Email,
                vec![(
                    AttributeKey::BreachDate,
                    AttributeValue::Text(date.to_string()),
                )],
            )]
        };
        let graph = EntityGraph::new();
        let timeline = TimelineBuilder::new();

        let recent = RiskScorer::assess(&breach("2025-01-01"), &graph, &timeline, 2026);
        let ancient = RiskScorer::assess(&breach("2012-01-01"), &graph, &timeline, 2026);
        assert!(recent.security_risk > ancient.security_risk);
    }

    #[test]
    fn test_level_bands() {
        assert_eq!(RiskLevel::from_score(10.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(35.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(55.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(85.0), RiskLevel::Critical);
    }

    #[test]
    fn test_assessment_is_deterministic() {
        let entities = vec![entity(
            EntityType::Person,
            vec![
                (
                    AttributeKey::Email,
                    AttributeValue::Text("a@example.com".to_string()),
                ),
                (AttributeKey::BirthYear, AttributeValue::Integer(1988)),
            ],
        )];
        let graph = EntityGraph::new();
        let timeline = TimelineBuilder::new();

        let first = RiskScorer::assess(&entities, &graph, &timeline, 2026);
        let second = RiskScorer::assess(&entities, &graph, &timeline, 2026);
        assert_eq!(first.overall_score, second.overall_score);
        assert_eq!(first.key_exposures, second.key_exposures);
    }
}
