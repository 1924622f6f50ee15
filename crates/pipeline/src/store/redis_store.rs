use super::InvestigationStore;
use crate::error::{PipelineError, Result};
use crate::report::Report;
use crate::types::InvestigationRecord;
use async_trait::async_trait;
use osint_core::InvestigationId;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

const RECORD_PREFIX: &str = "osint:investigation:";
const REPORT_PREFIX: &str = "osint:report:";
const INDEX_KEY: &str = "osint:investigations";

/// Redis-backed store with the same contract as [`super::MemoryStore`].
/// Callers that cannot reach Redis at startup fall back to memory-only
/// operation; a connected store surfaces later failures as `Store` errors.
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| PipelineError::Store(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?;
        Ok(Self { conn })
    }

    fn record_key(id: &InvestigationId) -> String {
        format!("{}{}", RECORD_PREFIX, id.as_str())
    }

    fn report_key(id: &InvestigationId) -> String {
        format!("{}{}", REPORT_PREFIX, id.as_str())
    }
}

#[async_trait]
impl InvestigationStore for RedisStore {
    async fn save_investigation(&self, record: &InvestigationRecord) -> Result<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(record)?;
        let score = record.started_at.timestamp_millis() as f64;
        redis::pipe()
            .set(Self::record_key(&record.investigation_id), payload)
            .zadd(INDEX_KEY, record.investigation_id.as_str(), score)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?;
        Ok(())
    }

    async fn get_investigation(
        &self,
        id: &InvestigationId,
    ) -> Result<Option<InvestigationRecord>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(Self::record_key(id))
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save_report(&self, id: &InvestigationId, report: &Report) -> Result<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(report)?;
        conn.set::<_, _, ()>(Self::report_key(id), payload)
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?;
        Ok(())
    }

    async fn get_report(&self, id: &InvestigationId) -> Result<Option<Report>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(Self::report_key(id))
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn list_investigations(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<InvestigationRecord>> {
        let mut conn = self.conn.clone();
        let start = offset as isize;
        let stop = (offset + limit) as isize - 1;
        let ids: Vec<String> = conn
            .zrevrange(INDEX_KEY, start, stop)
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self
                .get_investigation(&InvestigationId::from_string(id))
                .await?
            {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn delete_investigation(&self, id: &InvestigationId) -> Result<bool> {
        let mut conn = self.conn.clone();
        let (removed, _, _): (i64, i64, i64) = redis::pipe()
            .del(Self::record_key(id))
            .del(Self::report_key(id))
            .zrem(INDEX_KEY, id.as_str())
            .query_async(&mut conn)
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?;
        Ok(removed > 0)
    }
}
