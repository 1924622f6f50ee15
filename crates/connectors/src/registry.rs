//! Connector registry.
//!
//! Connectors are values registered once at startup, keyed by their stable
//! `source_name`. The registry is a process-wide singleton handed to the
//! planner (for routing) and the scheduler (for dispatch).

use crate::traits::{ConnectorDescriptor, SourceConnector};
use dashmap::DashMap;
use osint_core::types::QueryKind;
use std::sync::Arc;
use tracing::info;

pub struct ConnectorRegistry {
    connectors: DashMap<String, Arc<dyn SourceConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self {
            connectors: DashMap::new(),
        }
    }

    /// Register a connector. Re-registering a name replaces the previous
    /// adapter; the last registration wins.
    pub fn register(&self, connector: Arc<dyn SourceConnector>) {
        let name = connector.source_name().to_string();
        info!(
            source = %name,
            source_type = %connector.source_type(),
            rate_limit_per_hour = connector.rate_limit_per_hour(),
            "connector registered"
        );
        self.connectors.insert(name, connector);
    }

    pub fn get(&self, source_name: &str) -> Option<Arc<dyn SourceConnector>> {
        self.connectors
            .get(source_name)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Connector names able to serve a query kind, ordered by descending
    /// base confidence so planners prefer stronger sources.
    pub fn route(&self, kind: QueryKind) -> Vec<String> {
        let mut matches: Vec<(String, f64)> = self
            .connectors
            .iter()
            .filter(|entry| entry.value().handles_kind(kind))
            .map(|entry| (entry.key().clone(), entry.value().base_confidence()))
            .collect();
        matches.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        matches.into_iter().map(|(name, _)| name).collect()
    }

    /// Capability metadata for every registered connector.
    pub fn descriptors(&self) -> Vec<ConnectorDescriptor> {
        let mut descriptors: Vec<ConnectorDescriptor> = self
            .connectors
            .iter()
            .map(|entry| entry.value().descriptor())
            .collect();
        descriptors.sort_by(|a, b| a.source_name.cmp(&b.source_name));
        descriptors
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectorResult;
    use crate::traits::SearchContext;
    use async_trait::async_trait;
    use osint_core::types::{EntityType, Query, RawResult, SourceType};

    struct FakeConnector {
        name: &'static str,
        confidence: f64,
        entity_types: Vec<EntityType>,
    }

    #[async_trait]
    impl SourceConnector for FakeConnector {
        fn source_name(&self) -> &str {
            self.name
        }
        fn source_type(&self) -> SourceType {
            SourceType::SearchEngine
        }
        fn supported_entity_types(&self) -> &[EntityType] {
            &self.entity_types
        }
        fn rate_limit_per_hour(&self) -> u32 {
            100
        }
        fn base_confidence(&self) -> f64 {
            self.confidence
        }
        async fn search(
            &self,
            _query: &Query,
            _ctx: &SearchContext,
        ) -> ConnectorResult<Vec<RawResult>> {
            Ok(vec![])
        }
        async fn validate_credentials(&self) -> ConnectorResult<bool> {
            Ok(true)
        }
    }

    #[test]
    fn test_routing_ordered_by_confidence() {
        let registry = ConnectorRegistry::new();
        registry.register(Arc::new(FakeConnector {
            name: "weak",
            confidence: 0.3,
            entity_types: vec![EntityType::Person],
        }));
        registry.register(Arc::new(FakeConnector {
            name: "strong",
            confidence: 0.9,
            entity_types: vec![EntityType::Person],
        }));
        registry.register(Arc::new(FakeConnector {
            name: "domains_only",
            confidence: 0.8,
            entity_types: vec![EntityType::Domain],
        }));

        let route = registry.route(QueryKind::Name);
        assert_eq!(route, vec!["strong".to_string(), "weak".to_string()]);
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = ConnectorRegistry::new();
        registry.register(Arc::new(FakeConnector {
            name: "dup",
            confidence: 0.1,
            entity_types: vec![EntityType::Person],
        }));
        registry.register(Arc::new(FakeConnector {
            name: "dup",
            confidence: 0.7,
            entity_types: vec![EntityType::Person],
        }));

        assert_eq!(registry.len(), 1);
        let connector = registry.get("dup").unwrap();
        assert!((connector.base_confidence() - 0.7).abs() < f64::EPSILON);
    }
}
