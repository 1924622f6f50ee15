//! Graph and timeline enrichment from a resolution outcome.
//!
//! As clusters form, each resolved entity becomes a graph node; entities
//! co-mentioned in the same raw result gain an edge, typed when the source
//! relationship is known and `co_occurs` otherwise. Dated attributes turn
//! into timeline events attached to the owning entity.

use super::ResolutionOutcome;
use crate::entity::{AttributeKey, ResolvedEntity};
use crate::graph::{EdgeClass, EntityGraph, Relationship};
use crate::timeline::{extract_date, DatePrecision, EventType, TimelineBuilder, TimelineEvent};
use chrono::NaiveDate;
use osint_core::types::{EntityType, ResultId};
use std::collections::HashMap;
use tracing::debug;

pub fn enrich_graph_and_timeline(
    outcome: &ResolutionOutcome,
    graph: &mut EntityGraph,
    timeline: &mut TimelineBuilder,
) {
    for entity in &outcome.entities {
        graph.add_node(
            entity.entity_id.clone(),
            entity.entity_type,
            entity_label(entity),
        );
        add_timeline_events(entity, timeline);
    }

    // Co-mention edges: entities sharing a raw result.
    let mut by_result: HashMap<&ResultId, Vec<&ResolvedEntity>> = HashMap::new();
    for entity in &outcome.entities {
        for result_id in &entity.source_refs {
            by_result.entry(result_id).or_default().push(entity);
        }
    }

    for (result_id, entities) in by_result {
        for (index, first) in entities.iter().enumerate() {
            for second in &entities[index + 1..] {
                if first.entity_id == second.entity_id {
                    continue;
                }
                let (src, dst, relationship) = typed_relationship(first, second);
                let confidence =
                    (first.confidence.min(second.confidence) as f64 / 100.0).clamp(0.0, 1.0);
                let strength = if relationship == Relationship::CoOccurs {
                    0.3
                } else {
                    0.6
                };
                let sources: Vec<String> = first
                    .sources
                    .intersection(&second.sources)
                    .cloned()
                    .collect();
                if let Err(error) = graph.add_edge(
                    &src.entity_id,
                    &dst.entity_id,
                    relationship,
                    EdgeClass::Direct,
                    strength,
                    confidence,
                    sources,
                ) {
                    debug!(error = %error, result = %result_id, "skipped co-mention edge");
                }
            }
        }
    }
}

fn entity_label(entity: &ResolvedEntity) -> String {
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

/// Relationship typing by entity-type pair; order may flip so the edge
/// points the natural way.
fn typed_relationship<'a>(
    a: &'a ResolvedEntity,
    b: &'a ResolvedEntity,
) -> (&'a ResolvedEntity, &'a ResolvedEntity, Relationship) {
    use EntityType::*;
    match (a.entity_type, b.entity_type) {
        (Person, Domain) => (a, b, Relationship::Registered),
        (Domain, Person) => (b, a, Relationship::Registered),
        (Person, Organization) => (a, b, Relationship::WorksWith),
        (Organization, Person) => (b, a, Relationship::WorksWith),
        (Person, SocialProfile) => (a, b, Relationship::Owns),
        (SocialProfile, Person) => (b, a, Relationship::Owns),
        (Person, Email) => (a, b, Relationship::Owns),
        (Email, Person) => (b, a, Relationship::Owns),
        (Person, Username) => (a, b, Relationship::Owns),
        (Username, Person) => (b, a, Relationship::Owns),
        (Organization, Domain) => (a, b, Relationship::Registered),
        (Domain, Organization) => (b, a, Relationship::Registered),
        (Person, Location) => (a, b, Relationship::LocatedAt),
        (Location, Person) => (b, a, Relationship::LocatedAt),
        (Person, Document) => (a, b, Relationship::Authored),
        (Document, Person) => (b, a, Relationship::Authored),
        _ => (a, b, Relationship::CoOccurs),
    }
}

fn add_timeline_events(entity: &ResolvedEntity, timeline: &mut TimelineBuilder) {
    let confidence = entity.confidence as f64 / 100.0;
    let sources = entity.sources.clone();

    let mut push = |event_type: EventType,
                    date: NaiveDate,
                    precision: DatePrecision,
                    title: String,
                    timeline: &mut TimelineBuilder| {
        let mut event = TimelineEvent::new(
            entity.entity_id.clone(),
            event_type,
            date,
            precision,
            title,
        )
        .with_confidence(confidence);
        for source in &sources {
            event = event.with_source(source.clone());
        }
        timeline.add_event(event);
    };

    if let Some(registered) = entity
        .attributes
        .get(&AttributeKey::RegisteredAt)
        .and_then(|value| value.as_text())
    {
        if let Some((date, precision)) = extract_date(registered) {
            let event_type = if entity.entity_type == EntityType::Organization {
                EventType::LegalFiling
            } else {
                EventType::DigitalRegistration
            };
            push(
                event_type,
                date,
                precision,
                format!("Registered: {}", entity_label(entity)),
                timeline,
            );
        }
    }

    if let Some(breach_date) = entity
        .attributes
        .get(&AttributeKey::BreachDate)
        .and_then(|value| value.as_text())
    {
        if let Some((date, precision)) = extract_date(breach_date) {
            let breach_name = entity
                .attributes
                .get(&AttributeKey::BreachName)
                .and_then(|value| value.as_text())
                .unwrap_or("unknown corpus");
            push(
                EventType::DigitalActivity,
                date,
                precision,
                format!("Breach exposure: {}", breach_name),
                timeline,
            );
        }
    }

    if let Some(first_seen) = entity
        .attributes
        .get(&AttributeKey::FirstSeen)
        .and_then(|value| value.as_text())
    {
        // Archive timestamps are yyyymmdd...; reshape for the extractor.
        if first_seen.len() >= 8 {
            let reshaped = format!(
                "{}-{}-{}",
                &first_seen[0..4],
                &first_seen[4..6],
                &first_seen[6..8]
            );
            if let Some((date, precision)) = extract_date(&reshaped) {
                push(
                    EventType::DigitalActivity,
                    date,
                    precision,
                    format!("First archived: {}", entity_label(entity)),
                    timeline,
                );
            }
        }
    }

    if let Some(year) = entity
        .attributes
        .get(&AttributeKey::BirthYear)
        .and_then(|value| value.as_integer())
    {
        if let Some(date) = NaiveDate::from_ymd_opt(year as i32, 1, 1) {
            push(
                EventType::Birth,
                date,
                DatePrecision::Year,
                "Birth (year inferred)".to_string(),
                timeline,
            );
        }
    }
}
