use super::InvestigationStore;
use crate::error::Result;
use crate::report::Report;
use crate::types::InvestigationRecord;
use async_trait::async_trait;
use dashmap::DashMap;
use osint_core::InvestigationId;

/// In-memory store. Writes for one investigation id are serialized by the
/// entry lock; the coordinator is the only writer per id anyway.
pub struct MemoryStore {
    records: DashMap<String, InvestigationRecord>,
    reports: DashMap<String, Report>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            reports: DashMap::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InvestigationStore for MemoryStore {
    async fn save_investigation(&self, record: &InvestigationRecord) -> Result<()> {
        self.records
            .insert(record.investigation_id.as_str().to_string(), record.clone());
        Ok(())
    }

    async fn get_investigation(
        &self,
        id: &InvestigationId,
    ) -> Result<Option<InvestigationRecord>> {
        Ok(self.records.get(id.as_str()).map(|entry| entry.clone()))
    }

    async fn save_report(&self, id: &InvestigationId, report: &Report) -> Result<()> {
        self.reports.insert(id.as_str().to_string(), report.clone());
        Ok(())
    }

    async fn get_report(&self, id: &InvestigationId) -> Result<Option<Report>> {
        Ok(self.reports.get(id.as_str()).map(|entry| entry.clone()))
    }

    async fn list_investigations(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<InvestigationRecord>> {
        let mut records: Vec<InvestigationRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    async fn delete_investigation(&self, id: &InvestigationId) -> Result<bool> {
        let removed = self.records.remove(id.as_str()).is_some();
        self.reports.remove(id.as_str());
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InvestigationRequest, SeedInput};

    fn record(name: &str) -> InvestigationRecord {
        InvestigationRecord::new(InvestigationRequest {
            correlation_id: None,
            subject_identifiers: SeedInput {
                full_name: name.to_string(),
                usernames: vec![],
                emails: vec![],
                phone_numbers: vec![],
                geographic_hints: None,
                professional_hints: None,
                known_domains: vec![],
            },
            constraints: Default::default(),
            thresholds: Default::default(),
        })
    }

    #[tokio::test]
    async fn test_round_trip_and_delete() {
        let store = MemoryStore::new();
        let record = record("Alice Roe");
        let id = record.investigation_id.clone();

        store.save_investigation(&record).await.unwrap();
        let loaded = store.get_investigation(&id).await.unwrap().unwrap();
        assert_eq!(loaded.subject_identifiers.full_name, "Alice Roe");

        assert!(store.delete_investigation(&id).await.unwrap());
        assert!(store.get_investigation(&id).await.unwrap().is_none());
        assert!(!store.delete_investigation(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_newest_first_with_paging() {
        let store = MemoryStore::new();
        for name in ["first", "second", "third"] {
            store.save_investigation(&record(name)).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let page = store.list_investigations(2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].subject_identifiers.full_name, "third");

        let rest = store.list_investigations(2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].subject_identifiers.full_name, "first");
    }
}
