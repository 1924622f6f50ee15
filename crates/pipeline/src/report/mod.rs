//! Report assembly.
//!
//! The reporter is a pure function of the resolved entities, graph,
//! timeline, seed, and collected raw results: no clocks, no randomness.
//! Rendering to presentation formats is someone else's concern; this
//! module emits the structured value.

mod risk;

pub use risk::{CategoryExposure, RiskAssessment, RiskLevel, RiskScorer};

use crate::entity::{AttributeKey, EntityId, ResolvedEntity};
use crate::graph::{EntityGraph, GraphSnapshot};
use crate::timeline::{TimelineBuilder, TimelineEvent};
use crate::types::{InvestigationError, InvestigationRecord, VerificationStatus};
use chrono::{DateTime, Datelike, Utc};
use osint_core::types::{EntityType, RawResult};
use osint_core::InvestigationId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub overall_score: f64,
    pub risk_level: RiskLevel,
    pub key_exposures: Vec<String>,
    pub entities_resolved: usize,
    pub sources_consulted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySummary {
    pub entity_id: EntityId,
    pub entity_type: EntityType,
    pub label: String,
    pub confidence: u8,
    pub ambiguous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub date: chrono::NaiveDate,
    pub precision: crate::timeline::DatePrecision,
    pub event_type: crate::timeline::EventType,
    pub title: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// 1 is most urgent
    pub priority: u8,
    pub category: String,
    pub action: String,
    /// Expected exposure reduction in [0, 1]
    pub impact_estimate: f64,
    pub effort: Effort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReference {
    pub url: String,
    pub source_name: String,
    pub retrieved_at: DateTime<Utc>,
    pub content_hash: String,
}

/// The final report value of an investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub investigation_id: InvestigationId,
    pub partial: bool,
    pub executive_summary: ExecutiveSummary,
    pub risk: RiskAssessment,
    /// Resolved entities grouped by verification status
    pub identity_inventory: BTreeMap<String, Vec<EntitySummary>>,
    pub exposure_analysis: Vec<CategoryExposure>,
    pub activity_timeline: Vec<EventSummary>,
    pub remediation_recommendations: Vec<Recommendation>,
    pub detailed_findings: Vec<ResolvedEntity>,
    pub graph: GraphSnapshot,
    pub source_references: Vec<SourceReference>,
    pub errors: Vec<InvestigationError>,
}

pub struct Reporter;

impl Reporter {
    pub fn build(
        record: &InvestigationRecord,
        entities: &[ResolvedEntity],
        graph: &EntityGraph,
        timeline: &TimelineBuilder,
        raw_results: &[RawResult],
        partial: bool,
    ) -> Report {
        // The reference year comes from the investigation record, keeping
        // the reporter a pure function of its inputs.
        let reference_year = record.started_at.year();
        let risk = RiskScorer::assess(entities, graph, timeline, reference_year);

        let mut identity_inventory: BTreeMap<String, Vec<EntitySummary>> = BTreeMap::new();
        for entity in entities {
            identity_inventory
                .entry(entity.verification_status.as_str().to_string())
                .or_default()
                .push(EntitySummary {
                    entity_id: entity.entity_id.clone(),
                    entity_type: entity.entity_type,
                    label: label_of(entity),
                    confidence: entity.confidence,
                    ambiguous: entity.is_ambiguous(),
                });
        }
        for summaries in identity_inventory.values_mut() {
            summaries.sort_by(|a, b| {
                b.confidence
                    .cmp(&a.confidence)
                    .then_with(|| a.entity_id.cmp(&b.entity_id))
            });
        }

        let mut activity_timeline: Vec<EventSummary> = timeline
            .subjects()
            .iter()
            .flat_map(|subject| timeline.events(subject))
            .map(|event: TimelineEvent| EventSummary {
                date: event.date,
                precision: event.date_precision,
                event_type: event.event_type,
                title: event.title,
                confidence: event.confidence,
            })
            .collect();
        activity_timeline.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then(a.precision.cmp(&b.precision))
                .then_with(|| a.title.cmp(&b.title))
        });

        let mut detailed_findings = entities.to_vec();
        detailed_findings.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

        let mut source_references: Vec<SourceReference> = raw_results
            .iter()
            .map(|result| SourceReference {
                url: result.url.clone(),
                source_name: result.source_name.clone(),
                retrieved_at: result.retrieved_at,
                content_hash: result.content_hash.clone(),
            })
            .collect();
        source_references.sort_by(|a, b| {
            a.url
                .cmp(&b.url)
                .then_with(|| a.content_hash.cmp(&b.content_hash))
        });
        source_references.dedup_by(|a, b| a.url == b.url && a.content_hash == b.content_hash);

        let executive_summary = ExecutiveSummary {
            overall_score: risk.overall_score,
            risk_level: risk.risk_level,
            key_exposures: risk.key_exposures.clone(),
            entities_resolved: entities.len(),
            sources_consulted: source_references
                .iter()
                .map(|reference| reference.source_name.as_str())
                .collect::<std::collections::BTreeSet<_>>()
                .len(),
        };

        Report {
            investigation_id: record.investigation_id.clone(),
            partial,
            remediation_recommendations: Self::recommendations(entities, &risk),
            executive_summary,
            risk,
            identity_inventory,
            exposure_analysis: Vec::new(),
            activity_timeline,
            detailed_findings,
            graph: graph.snapshot(),
            source_references,
            errors: record.errors.clone(),
        }
        .with_exposure_analysis()
    }

    fn recommendations(entities: &[ResolvedEntity], risk: &RiskAssessment) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        let breached = entities
            .iter()
            .any(|e| e.attributes.contains_key(&AttributeKey::BreachName));
        if breached {
            recommendations.push(Recommendation {
                priority: 1,
                category: "credentials".to_string(),
                action: "Rotate passwords for accounts tied to breached addresses and enable two-factor authentication".to_string(),
                impact_estimate: 0.8,
                effort: Effort::Low,
            });
        }

        let whois_exposed = entities.iter().any(|e| {
            e.entity_type == EntityType::Domain
                && e.sources.contains("whois_lookup")
        });
        if whois_exposed {
            recommendations.push(Recommendation {
                priority: 2,
                category: "domains".to_string(),
                action: "Enable registrar privacy protection on personally registered domains".to_string(),
                impact_estimate: 0.5,
                effort: Effort::Low,
            });
        }

        let social_surface = entities
            .iter()
            .filter(|e| e.entity_type == EntityType::SocialProfile)
            .count();
        if social_surface > 0 {
            recommendations.push(Recommendation {
                priority: 3,
                category: "profiles".to_string(),
                action: "Review visibility settings on public social profiles and remove location details".to_string(),
                impact_estimate: 0.4,
                effort: Effort::Medium,
            });
        }

        if risk.identity_theft_risk >= 50.0 {
            recommendations.push(Recommendation {
                priority: 2,
                category: "identity".to_string(),
                action: "Place a credit freeze or fraud alert with the major bureaus".to_string(),
                impact_estimate: 0.7,
                effort: Effort::Medium,
            });
        }

        if recommendations.is_empty() {
            recommendations.push(Recommendation {
                priority: 5,
                category: "hygiene".to_string(),
                action: "No acute exposures found; periodic re-checks are sufficient".to_string(),
                impact_estimate: 0.1,
                effort: Effort::Low,
            });
        }

        recommendations.sort_by(|a, b| a.priority.cmp(&b.priority));
        recommendations
    }
}

impl Report {
    fn with_exposure_analysis(mut self) -> Self {
        self.exposure_analysis = self.risk.categories.clone();
        self
    }
}

fn label_of(entity: &ResolvedEntity) -> String {
    entity
        .attributes
        .get(&AttributeKey::FullName)
        .or_else(|| entity.attributes.get(&AttributeKey::Email))
        .or_else(|| entity.attributes.get(&AttributeKey::Username))
        .or_else(|| entity.attributes.get(&AttributeKey::Domain))
        .and_then(|value| value.as_text())
        .unwrap_or(entity.entity_id.as_str())
        .to_string()
}

/// Every entity in the report must trace to at least one raw result among
/// the source references. Used by tests and the coordinator's final check.
pub fn verify_traceability(report: &Report, raw_results: &[RawResult]) -> bool {
    let known: std::collections::BTreeSet<&str> = raw_results
        .iter()
        .map(|result| result.result_id.as_str())
        .collect();
    report.detailed_findings.iter().all(|entity| {
        !entity.source_refs.is_empty()
            && entity
                .source_refs
                .iter()
                .any(|reference| known.contains(reference.as_str()))
    })
}
