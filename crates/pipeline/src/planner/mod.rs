//! Discovery planning: seed identifiers to a deduplicated, prioritized
//! query plan.
//!
//! Every candidate query is screened against the blocked patterns before
//! it can reach a scheduler; matches are rejected with `security_rejected`
//! and recorded, never executed.

use crate::entity::{AttributeKey, ResolvedEntity};
use crate::error::{PipelineError, Result};
use crate::types::SeedInput;
use osint_connectors::{ConnectorRegistry, QueryScreen};
use osint_core::types::{Query, QueryKind};
use osint_core::Error;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Hard cap on plan size after dedup
    pub max_plan_size: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self { max_plan_size: 200 }
    }
}

/// The plan plus any queries the security pass refused.
#[derive(Debug)]
pub struct PlanOutcome {
    pub queries: Vec<Query>,
    pub rejected: Vec<Error>,
}

pub struct DiscoveryPlanner {
    registry: Arc<ConnectorRegistry>,
    screen: Arc<QueryScreen>,
    config: PlannerConfig,
}

impl DiscoveryPlanner {
    pub fn new(
        registry: Arc<ConnectorRegistry>,
        screen: Arc<QueryScreen>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            registry,
            screen,
            config,
        }
    }

    /// First-round plan from the seed.
    pub fn plan(&self, seed: &SeedInput) -> Result<PlanOutcome> {
        let mut templates: Vec<(QueryKind, String, u8)> = Vec::new();

        // Single-attribute templates.
        templates.push((QueryKind::Name, seed.full_name.clone(), 60));
        for email in &seed.emails {
            templates.push((QueryKind::Email, email.clone(), 90));
        }
        for phone in &seed.phone_numbers {
            templates.push((QueryKind::Phone, phone.clone(), 85));
        }
        for username in &seed.usernames {
            templates.push((QueryKind::Username, username.clone(), 75));
        }
        for domain in &seed.known_domains {
            templates.push((QueryKind::Domain, domain.clone(), 80));
        }
        if let Some(professional) = &seed.professional_hints {
            if let Some(employer) = &professional.employer {
                templates.push((QueryKind::Company, employer.clone(), 65));
            }
        }

        // Composite templates cover more seed attributes and outrank the
        // single-attribute forms they combine.
        if let Some(geographic) = &seed.geographic_hints {
            if let Some(city) = &geographic.city {
                templates.push((
                    QueryKind::Composite,
                    format!("{} {}", seed.full_name, city),
                    85,
                ));
            }
        }
        if let Some(professional) = &seed.professional_hints {
            if let Some(employer) = &professional.employer {
                templates.push((
                    QueryKind::Composite,
                    format!("{} {}", seed.full_name, employer),
                    85,
                ));
            }
            if let Some(title) = &professional.title {
                templates.push((
                    QueryKind::Composite,
                    format!("{} {}", seed.full_name, title),
                    80,
                ));
            }
        }

        self.build(templates, 0)
    }

    /// Follow-up round over identifiers surfaced by resolution that the
    /// seed did not contain. The coordinator bounds rounds by
    /// `constraints.max_search_depth`.
    pub fn follow_up(
        &self,
        seed: &SeedInput,
        discovered: &[ResolvedEntity],
        depth: u8,
    ) -> Result<PlanOutcome> {
        let known_emails: BTreeSet<String> =
            seed.emails.iter().map(|e| e.to_lowercase()).collect();
        let known_usernames: BTreeSet<String> =
            seed.usernames.iter().map(|u| u.to_lowercase()).collect();
        let known_domains: BTreeSet<String> =
            seed.known_domains.iter().map(|d| d.to_lowercase()).collect();

        let mut templates: Vec<(QueryKind, String, u8)> = Vec::new();
        for entity in discovered {
            if let Some(email) = entity
                .attributes
                .get(&AttributeKey::Email)
                .and_then(|v| v.as_text())
            {
                if !known_emails.contains(&email.to_lowercase()) {
                    templates.push((QueryKind::Email, email.to_string(), 70));
                }
            }
            if let Some(username) = entity
                .attributes
                .get(&AttributeKey::Username)
                .and_then(|v| v.as_text())
            {
                if !known_usernames.contains(&username.to_lowercase()) {
                    templates.push((QueryKind::Username, username.to_string(), 60));
                }
            }
            if let Some(domain) = entity
                .attributes
                .get(&AttributeKey::Domain)
                .and_then(|v| v.as_text())
            {
                if !known_domains.contains(&domain.to_lowercase()) {
                    templates.push((QueryKind::Domain, domain.to_string(), 65));
                }
            }
        }

        self.build(templates, depth)
    }

    fn build(&self, templates: Vec<(QueryKind, String, u8)>, depth: u8) -> Result<PlanOutcome> {
        let mut rejected = Vec::new();
        let mut seen: BTreeSet<(QueryKind, String)> = BTreeSet::new();
        let mut queries: Vec<Query> = Vec::new();

        for (kind, raw_string, base_priority) in templates {
            let normalized = normalize_query_string(&raw_string);
            if normalized.is_empty() {
                continue;
            }
            if !seen.insert((kind, normalized.clone())) {
                continue;
            }

            // Security pass: a blocked query must never reach a scheduler.
            if let Err(error) = self.screen.screen(&normalized) {
                rejected.push(error.add_metadata("query_kind", serde_json::json!(kind.as_str())));
                continue;
            }

            let connectors = self.registry.route(kind);
            if connectors.is_empty() {
                debug!(kind = %kind, "no connector serves this query kind");
                continue;
            }

            let mean_confidence: f64 = connectors
                .iter()
                .filter_map(|name| self.registry.get(name))
                .map(|connector| connector.base_confidence())
                .sum::<f64>()
                / connectors.len() as f64;
            let priority =
                (base_priority as f64 + mean_confidence * 10.0).round().min(100.0) as u8;

            queries.push(
                Query::new(normalized, kind)
                    .with_priority(priority)
                    .with_depth(depth)
                    .with_connectors(connectors),
            );
        }

        if queries.len() > self.config.max_plan_size {
            // Keep the highest-priority slice of an oversized plan.
            queries.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then_with(|| a.query_string.cmp(&b.query_string))
            });
            queries.truncate(self.config.max_plan_size);
        }

        queries.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.query_string.cmp(&b.query_string))
        });

        info!(
            planned = queries.len(),
            rejected = rejected.len(),
            depth = depth,
            "query plan built"
        );
        if queries.is_empty() && rejected.is_empty() && depth == 0 {
            return Err(PipelineError::Internal {
                message: "seed produced an empty plan".to_string(),
            });
        }
        Ok(PlanOutcome { queries, rejected })
    }
}

fn normalize_query_string(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeographicHints, ProfessionalHints};
    use osint_connectors::{StaticTransport, WebSearchConnector, WhoisConnector};

    fn registry() -> Arc<ConnectorRegistry> {
        let registry = ConnectorRegistry::new();
        let transport = Arc::new(StaticTransport::new());
        registry.register(Arc::new(WebSearchConnector::new(transport.clone())));
        registry.register(Arc::new(WhoisConnector::new(transport)));
        Arc::new(registry)
    }

    fn planner() -> DiscoveryPlanner {
        DiscoveryPlanner::new(
            registry(),
            Arc::new(QueryScreen::new()),
            PlannerConfig::default(),
        )
    }

    fn seed() -> SeedInput {
        SeedInput {
            full_name: "Alice Roe".to_string(),
            usernames: vec!["aroe".to_string()],
            emails: vec!["alice@aroe.example".to_string()],
            phone_numbers: vec![],
            geographic_hints: Some(GeographicHints {
                city: Some("Portland".to_string()),
                region: Some("OR".to_string()),
                country: Some("US".to_string()),
            }),
            professional_hints: Some(ProfessionalHints {
                employer: Some("Example Corp".to_string()),
                industry: None,
                title: None,
            }),
            known_domains: vec!["aroe.example".to_string()],
        }
    }

    #[test]
    fn test_plan_covers_seed_dimensions() {
        let outcome = planner().plan(&seed()).unwrap();
        let kinds: BTreeSet<QueryKind> = outcome.queries.iter().map(|q| q.kind).collect();

        assert!(kinds.contains(&QueryKind::Name));
        assert!(kinds.contains(&QueryKind::Email));
        assert!(kinds.contains(&QueryKind::Username));
        assert!(kinds.contains(&QueryKind::Domain));
        assert!(kinds.contains(&QueryKind::Composite));
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn test_composites_outrank_name_search() {
        let outcome = planner().plan(&seed()).unwrap();
        let composite = outcome
            .queries
            .iter()
            .find(|q| q.kind == QueryKind::Composite)
            .unwrap();
        let name = outcome
            .queries
            .iter()
            .find(|q| q.kind == QueryKind::Name)
            .unwrap();
        assert!(composite.priority > name.priority);
    }

    #[test]
    fn test_minimal_seed_yields_name_search() {
        let minimal = SeedInput {
            full_name: "Alice Roe".to_string(),
            usernames: vec![],
            emails: vec![],
            phone_numbers: vec![],
            geographic_hints: None,
            professional_hints: None,
            known_domains: vec![],
        };
        let outcome = planner().plan(&minimal).unwrap();
        assert!(!outcome.queries.is_empty());
        assert!(outcome.queries.iter().any(|q| q.kind == QueryKind::Name));
        assert!(outcome.queries.len() <= PlannerConfig::default().max_plan_size);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let first = planner().plan(&seed()).unwrap();
        let second = planner().plan(&seed()).unwrap();

        let shape = |outcome: &PlanOutcome| -> Vec<(QueryKind, String, u8)> {
            outcome
                .queries
                .iter()
                .map(|q| (q.kind, q.query_string.clone(), q.priority))
                .collect()
        };
        assert_eq!(shape(&first), shape(&second));
    }

    #[test]
    fn test_duplicate_identifiers_dedupe() {
        let mut duplicated = seed();
        duplicated.known_domains = vec!["aroe.example".to_string(), "AROE.example".to_string()];
        let outcome = planner().plan(&duplicated).unwrap();

        let domain_queries: Vec<_> = outcome
            .queries
            .iter()
            .filter(|q| q.kind == QueryKind::Domain)
            .collect();
        assert_eq!(domain_queries.len(), 1);
    }

    #[test]
    fn test_blocked_seed_value_rejected_before_scheduling() {
        let mut hostile = seed();
        hostile.known_domains = vec!["x.example/wp-login.php".to_string()];
        let outcome = planner().plan(&hostile).unwrap();

        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(
            outcome.rejected[0].code,
            osint_core::ErrorCode::SecurityRejected
        );
        assert!(!outcome
            .queries
            .iter()
            .any(|q| q.query_string.contains("wp-login")));
    }

    #[test]
    fn test_follow_up_skips_known_identifiers() {
        use crate::entity::{AttributeValue, EntityId};
        use crate::types::VerificationStatus;
        use std::collections::BTreeMap;

        let discovered = ResolvedEntity {
            entity_id: EntityId::new(),
            entity_type: osint_core::types::EntityType::Person,
            attributes: BTreeMap::from([
                (
                    AttributeKey::Email,
                    AttributeValue::Text("alice@aroe.example".to_string()),
                ),
                (
                    AttributeKey::Domain,
                    AttributeValue::Text("newly-found.example".to_string()),
                ),
            ]),
            disputed_attributes: BTreeMap::new(),
            confidence: 80,
            verification_status: VerificationStatus::Probable,
            member_candidates: vec![],
            sources: BTreeSet::new(),
            source_refs: BTreeSet::new(),
            ambiguous_with: vec![],
        };

        let outcome = planner().follow_up(&seed(), &[discovered], 1).unwrap();
        // The seed email is known; only the new domain expands.
        assert_eq!(outcome.queries.len(), 1);
        assert_eq!(outcome.queries[0].kind, QueryKind::Domain);
        assert_eq!(outcome.queries[0].depth, 1);
    }
}
