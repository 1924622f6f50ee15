//! Per-subject event timelines with date precision and milestone queries.

mod dates;

pub use dates::{extract_date, DatePrecision};

use crate::entity::EntityId;
use chrono::{Datelike, NaiveDate};
use osint_core::utils::combine_confidence;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Birth,
    EducationStart,
    EducationEnd,
    JobStart,
    JobEnd,
    RelationshipStart,
    RelationshipEnd,
    LocationMove,
    DigitalRegistration,
    DigitalActivity,
    LegalFiling,
    MediaMention,
}

impl EventType {
    /// Milestone kinds surface once, at their first occurrence.
    pub fn is_milestone(&self) -> bool {
        matches!(
            self,
            EventType::Birth
                | EventType::EducationStart
                | EventType::EducationEnd
                | EventType::JobStart
                | EventType::RelationshipStart
                | EventType::DigitalRegistration
                | EventType::LegalFiling
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub event_id: String,
    pub subject_id: EntityId,
    pub event_type: EventType,
    pub date: NaiveDate,
    pub date_precision: DatePrecision,
    pub title: String,
    pub location: Option<String>,
    /// Merged confidence in [0, 1]
    pub confidence: f64,
    pub sources: BTreeSet<String>,
    pub metadata: BTreeMap<String, String>,
}

impl TimelineEvent {
    pub fn new(
        subject_id: EntityId,
        event_type: EventType,
        date: NaiveDate,
        date_precision: DatePrecision,
        title: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            subject_id,
            event_type,
            date,
            date_precision,
            title: title.into(),
            location: None,
            confidence: 0.5,
            sources: BTreeSet::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = osint_core::utils::clamp_unit(confidence);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.insert(source.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    fn merge_key(&self) -> (EntityId, EventType, NaiveDate, String) {
        (
            self.subject_id.clone(),
            self.event_type,
            self.date,
            normalize_title(&self.title),
        )
    }
}

fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Bucketing granularity for activity queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Day,
    Week,
    Month,
    Year,
}

pub struct TimelineBuilder {
    events: HashMap<EntityId, Vec<TimelineEvent>>,
}

impl TimelineBuilder {
    pub fn new() -> Self {
        Self {
            events: HashMap::new(),
        }
    }

    /// Add an event. Events identical in `(subject, type, date, normalized
    /// title)` merge: confidence combines independently, sources union.
    pub fn add_event(&mut self, event: TimelineEvent) {
        let subject_events = self.events.entry(event.subject_id.clone()).or_default();
        let key = event.merge_key();

        if let Some(existing) = subject_events
            .iter_mut()
            .find(|candidate| candidate.merge_key() == key)
        {
            existing.confidence = combine_confidence(&[existing.confidence, event.confidence]);
            existing.sources.extend(event.sources);
            existing.metadata.extend(event.metadata);
            // The more precise reading of the same date wins.
            if event.date_precision < existing.date_precision {
                existing.date_precision = event.date_precision;
            }
            if existing.location.is_none() {
                existing.location = event.location;
            }
        } else {
            subject_events.push(event);
        }
    }

    /// Ordered view: by date, then precision (more precise first), then
    /// confidence (higher first). Storage order is irrelevant.
    pub fn events(&self, subject: &EntityId) -> Vec<TimelineEvent> {
        let mut events = self.events.get(subject).cloned().unwrap_or_default();
        events.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then(a.date_precision.cmp(&b.date_precision))
                .then(
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });
        events
    }

    pub fn subjects(&self) -> Vec<EntityId> {
        let mut subjects: Vec<EntityId> = self.events.keys().cloned().collect();
        subjects.sort();
        subjects
    }

    pub fn event_count(&self, subject: &EntityId) -> usize {
        self.events.get(subject).map(Vec::len).unwrap_or(0)
    }

    /// First occurrence per milestone kind.
    pub fn milestones(&self, subject: &EntityId) -> Vec<TimelineEvent> {
        let mut seen: BTreeSet<EventType> = BTreeSet::new();
        let mut milestones = Vec::new();
        for event in self.events(subject) {
            if event.event_type.is_milestone() && seen.insert(event.event_type) {
                milestones.push(event);
            }
        }
        milestones
    }

    /// Age estimate: birth events first, then declared priors on first
    /// education (start age 18) and first job (start age 22).
    pub fn estimated_age(&self, subject: &EntityId, as_of: NaiveDate) -> Option<(u32, f64)> {
        let events = self.events(subject);

        if let Some(birth) = events.iter().find(|e| e.event_type == EventType::Birth) {
            let age = as_of.years_since(birth.date)?;
            return Some((age, birth.confidence));
        }

        if let Some(education) = events
            .iter()
            .find(|e| e.event_type == EventType::EducationStart)
        {
            let age = as_of.years_since(education.date)? + 18;
            return Some((age, education.confidence * 0.5));
        }

        if let Some(job) = events.iter().find(|e| e.event_type == EventType::JobStart) {
            let age = as_of.years_since(job.date)? + 22;
            return Some((age, job.confidence * 0.4));
        }

        None
    }

    /// Event counts per bucket, keyed by a sortable bucket label.
    pub fn activity_buckets(&self, subject: &EntityId, bucket: Bucket) -> BTreeMap<String, usize> {
        let mut buckets = BTreeMap::new();
        for event in self.events(subject) {
            let key = match bucket {
                Bucket::Day => event.date.format("%Y-%m-%d").to_string(),
                Bucket::Week => format!("{}-W{:02}", event.date.year(), event.date.iso_week().week()),
                Bucket::Month => event.date.format("%Y-%m").to_string(),
                Bucket::Year => event.date.format("%Y").to_string(),
            };
            *buckets.entry(key).or_insert(0) += 1;
        }
        buckets
    }

    /// Buckets with the most events, descending.
    pub fn most_active_periods(
        &self,
        subject: &EntityId,
        bucket: Bucket,
        top_n: usize,
    ) -> Vec<(String, usize)> {
        let mut periods: Vec<(String, usize)> =
            self.activity_buckets(subject, bucket).into_iter().collect();
        periods.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        periods.truncate(top_n);
        periods
    }
}

impl Default for TimelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> EntityId {
        EntityId("subject-1".to_string())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_identical_events_merge() {
        let mut timeline = TimelineBuilder::new();
        timeline.add_event(
            TimelineEvent::new(
                subject(),
                EventType::DigitalRegistration,
                date(2019, 3, 14),
                DatePrecision::ExactDate,
                "Registered aroe.example",
            )
            .with_confidence(0.6)
            .with_source("whois_lookup"),
        );
        timeline.add_event(
            TimelineEvent::new(
                subject(),
                EventType::DigitalRegistration,
                date(2019, 3, 14),
                DatePrecision::ExactDate,
                "registered  AROE.example",
            )
            .with_confidence(0.5)
            .with_source("web_archive"),
        );

        let events = timeline.events(&subject());
        assert_eq!(events.len(), 1);
        let merged = &events[0];
        // 1 - (1-0.6)(1-0.5) = 0.8
        assert!((merged.confidence - 0.8).abs() < 1e-9);
        assert_eq!(merged.sources.len(), 2);
    }

    #[test]
    fn test_read_order_by_date_then_precision() {
        let mut timeline = TimelineBuilder::new();
        timeline.add_event(TimelineEvent::new(
            subject(),
            EventType::JobStart,
            date(2020, 6, 1),
            DatePrecision::Month,
            "joined example corp",
        ));
        timeline.add_event(TimelineEvent::new(
            subject(),
            EventType::EducationEnd,
            date(2010, 6, 15),
            DatePrecision::ExactDate,
            "graduated",
        ));
        timeline.add_event(TimelineEvent::new(
            subject(),
            EventType::DigitalActivity,
            date(2020, 6, 1),
            DatePrecision::ExactDate,
            "posted",
        ));

        let events = timeline.events(&subject());
        assert_eq!(events[0].title, "graduated");
        // Same date: the exact reading precedes the month-precision one.
        assert_eq!(events[1].title, "posted");
        assert_eq!(events[2].title, "joined example corp");
    }

    #[test]
    fn test_milestones_first_occurrence_only() {
        let mut timeline = TimelineBuilder::new();
        timeline.add_event(TimelineEvent::new(
            subject(),
            EventType::JobStart,
            date(2015, 1, 1),
            DatePrecision::Year,
            "first job",
        ));
        timeline.add_event(TimelineEvent::new(
            subject(),
            EventType::JobStart,
            date(2020, 1, 1),
            DatePrecision::Year,
            "second job",
        ));
        timeline.add_event(TimelineEvent::new(
            subject(),
            EventType::DigitalActivity,
            date(2018, 1, 1),
            DatePrecision::Year,
            "not a milestone",
        ));

        let milestones = timeline.milestones(&subject());
        assert_eq!(milestones.len(), 1);
        assert_eq!(milestones[0].title, "first job");
    }

    #[test]
    fn test_estimated_age_from_birth_then_priors() {
        let mut timeline = TimelineBuilder::new();
        let as_of = date(2026, 1, 1);

        timeline.add_event(TimelineEvent::new(
            subject(),
            EventType::EducationStart,
            date(2006, 9, 1),
            DatePrecision::Year,
            "enrolled",
        ));
        let (age, confidence) = timeline.estimated_age(&subject(), as_of).unwrap();
        assert_eq!(age, 19 + 18);
        assert!(confidence < 0.5);

        timeline.add_event(
            TimelineEvent::new(
                subject(),
                EventType::Birth,
                date(1988, 3, 14),
                DatePrecision::ExactDate,
                "born",
            )
            .with_confidence(0.9),
        );
        let (age, confidence) = timeline.estimated_age(&subject(), as_of).unwrap();
        assert_eq!(age, 37);
        assert!((confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_activity_buckets_and_top_periods() {
        let mut timeline = TimelineBuilder::new();
        for day in [1, 2, 3] {
            timeline.add_event(TimelineEvent::new(
                subject(),
                EventType::DigitalActivity,
                date(2020, 5, day),
                DatePrecision::ExactDate,
                format!("post {}", day),
            ));
        }
        timeline.add_event(TimelineEvent::new(
            subject(),
            EventType::DigitalActivity,
            date(2021, 1, 1),
            DatePrecision::ExactDate,
            "lone post",
        ));

        let buckets = timeline.activity_buckets(&subject(), Bucket::Month);
        assert_eq!(buckets.get("2020-05"), Some(&3));

        let top = timeline.most_active_periods(&subject(), Bucket::Year, 1);
        assert_eq!(top, vec![("2020".to_string(), 3)]);
    }
}
