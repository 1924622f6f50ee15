//! Structural extraction tied to source schemas.
//!
//! Adapters surface their envelope fields through result metadata; this
//! module turns those fields into typed candidates with high extraction
//! confidence. Unknown sources fall through to pattern extraction only.

use crate::entity::{AttributeKey, AttributeValue, EntityCandidate};
use osint_core::types::{EntityType, RawResult};

const STRUCTURAL_CONFIDENCE: f64 = 0.9;

fn base(
    entity_type: EntityType,
    result: &RawResult,
    source_confidence: f64,
) -> EntityCandidate {
    EntityCandidate::new(entity_type, result.source_name.clone())
        .with_source_ref(result.result_id.clone())
        .with_extraction_confidence(STRUCTURAL_CONFIDENCE)
        .with_source_confidence(source_confidence)
}

/// Extract candidates from a source whose envelope the pipeline knows.
pub fn extract(result: &RawResult, source_confidence: f64) -> Vec<EntityCandidate> {
    match result.source_name.as_str() {
        "whois_lookup" => whois(result, source_confidence),
        "social_profiles" => social_profile(result, source_confidence),
        "code_hosting" => code_account(result, source_confidence),
        "breach_directory" => breach(result, source_confidence),
        "cert_transparency" => certificates(result, source_confidence),
        "corporate_registry" => company(result, source_confidence),
        "web_archive" => archive(result, source_confidence),
        _ => Vec::new(),
    }
}

fn meta<'a>(result: &'a RawResult, key: &str) -> Option<&'a str> {
    result.metadata.get(key).map(String::as_str)
}

fn whois(result: &RawResult, confidence: f64) -> Vec<EntityCandidate> {
    let mut candidates = Vec::new();

    if let Some(domain) = meta(result, "domain") {
        let mut candidate = base(EntityType::Domain, result, confidence)
            .with_attribute(AttributeKey::Domain, domain);
        if let Some(registrar) = meta(result, "registrar") {
            candidate = candidate.with_attribute(AttributeKey::Registrar, registrar);
        }
        if let Some(created) = meta(result, "created") {
            candidate = candidate.with_attribute(AttributeKey::RegisteredAt, created);
        }
        if let Some(nameservers) = meta(result, "nameservers") {
            candidate = candidate.with_attribute(
                AttributeKey::Nameservers,
                AttributeValue::List(nameservers.split(',').map(str::to_string).collect()),
            );
        }
        candidates.push(candidate);
    }

    if let Some(name) = meta(result, "registrant_name") {
        let mut person = base(EntityType::Person, result, confidence)
            .with_attribute(AttributeKey::FullName, name);
        if let Some(email) = meta(result, "registrant_email") {
            person = person.with_attribute(AttributeKey::Email, email);
        }
        if let Some(country) = meta(result, "registrant_country") {
            person = person.with_attribute(AttributeKey::Country, country);
        }
        if let Some(domain) = meta(result, "domain") {
            person = person.with_attribute(AttributeKey::Domain, domain);
        }
        candidates.push(person);
    }

    if let Some(org) = meta(result, "registrant_organization") {
        candidates.push(
            base(EntityType::Organization, result, confidence)
                .with_attribute(AttributeKey::FullName, org),
        );
    }

    if let Some(email) = meta(result, "registrant_email") {
        candidates.push(
            base(EntityType::Email, result, confidence)
                .with_attribute(AttributeKey::Email, email),
        );
    }

    candidates
}

fn social_profile(result: &RawResult, confidence: f64) -> Vec<EntityCandidate> {
    let Some(username) = meta(result, "username") else {
        return Vec::new();
    };
    let mut candidate = base(EntityType::SocialProfile, result, confidence)
        .with_attribute(AttributeKey::Username, username)
        .with_attribute(AttributeKey::Url, result.url.clone());
    if let Some(platform) = meta(result, "platform") {
        candidate = candidate.with_attribute(AttributeKey::Platform, platform);
    }
    if let Some(display_name) = meta(result, "display_name") {
        candidate = candidate.with_attribute(AttributeKey::FullName, display_name);
    }
    if let Some(location) = meta(result, "location") {
        let mut parts = location.splitn(2, ',');
        if let Some(city) = parts.next() {
            candidate = candidate.with_attribute(AttributeKey::City, city.trim());
        }
        if let Some(region) = parts.next() {
            candidate = candidate.with_attribute(AttributeKey::Region, region.trim());
        }
    }
    vec![candidate]
}

fn code_account(result: &RawResult, confidence: f64) -> Vec<EntityCandidate> {
    let Some(username) = meta(result, "username") else {
        return Vec::new();
    };
    let mut candidate = base(EntityType::Username, result, confidence)
        .with_attribute(AttributeKey::Username, username)
        .with_attribute(AttributeKey::Platform, "code_hosting")
        .with_attribute(AttributeKey::Url, result.url.clone());
    if let Some(email) = meta(result, "email") {
        candidate = candidate.with_attribute(AttributeKey::Email, email);
    }
    if let Some(company) = meta(result, "company") {
        candidate = candidate.with_attribute(AttributeKey::Employer, company);
    }
    vec![candidate]
}

fn breach(result: &RawResult, confidence: f64) -> Vec<EntityCandidate> {
    let Some(breach_name) = meta(result, "breach_name") else {
        return Vec::new();
    };
    let mut candidate = base(EntityType::Email, result, confidence)
        .with_attribute(AttributeKey::BreachName, breach_name);
    if let Some(date) = meta(result, "breach_date") {
        candidate = candidate.with_attribute(AttributeKey::BreachDate, date);
    }
    if let Some(classes) = meta(result, "data_classes") {
        candidate = candidate.with_attribute(
            AttributeKey::DataClasses,
            AttributeValue::List(classes.split(',').map(str::to_string).collect()),
        );
    }
    vec![candidate]
}

fn certificates(result: &RawResult, confidence: f64) -> Vec<EntityCandidate> {
    let Some(domain) = meta(result, "domain") else {
        return Vec::new();
    };
    let mut candidates = vec![base(EntityType::Domain, result, confidence)
        .with_attribute(AttributeKey::Domain, domain)];

    if let Some(names) = meta(result, "subject_names") {
        for name in names.split(',').filter(|n| !n.is_empty() && *n != domain) {
            candidates.push(
                base(EntityType::Domain, result, confidence)
                    .with_attribute(AttributeKey::Domain, name)
                    .with_extraction_confidence(0.8),
            );
        }
    }
    candidates
}

fn company(result: &RawResult, confidence: f64) -> Vec<EntityCandidate> {
    let Some(name) = meta(result, "company_name") else {
        return Vec::new();
    };
    let mut candidates = Vec::new();

    let mut organization = base(EntityType::Organization, result, confidence)
        .with_attribute(AttributeKey::FullName, name);
    if let Some(number) = meta(result, "company_number") {
        organization = organization.with_attribute(AttributeKey::CompanyNumber, number);
    }
    if let Some(jurisdiction) = meta(result, "jurisdiction") {
        organization = organization.with_attribute(AttributeKey::Jurisdiction, jurisdiction);
    }
    if let Some(date) = meta(result, "incorporation_date") {
        organization = organization.with_attribute(AttributeKey::RegisteredAt, date);
    }
    if let Some(officers) = meta(result, "officers") {
        organization = organization.with_attribute(AttributeKey::Officers, officers);
        // Officers are person candidates in their own right.
        for officer in officers.split(';') {
            let officer_name = officer.split('(').next().unwrap_or("").trim();
            if !officer_name.is_empty() {
                candidates.push(
                    base(EntityType::Person, result, confidence)
                        .with_attribute(AttributeKey::FullName, officer_name)
                        .with_attribute(AttributeKey::Employer, name),
                );
            }
        }
    }
    candidates.push(organization);
    candidates
}

fn archive(result: &RawResult, confidence: f64) -> Vec<EntityCandidate> {
    let Some(domain) = meta(result, "domain") else {
        return Vec::new();
    };
    let mut candidate = base(EntityType::Domain, result, confidence)
        .with_attribute(AttributeKey::Domain, domain);
    if let Some(first_seen) = meta(result, "first_seen") {
        candidate = candidate.with_attribute(AttributeKey::FirstSeen, first_seen);
    }
    if let Some(last_seen) = meta(result, "last_seen") {
        candidate = candidate.with_attribute(AttributeKey::LastSeen, last_seen);
    }
    vec![candidate]
}
