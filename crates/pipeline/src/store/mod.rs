//! Investigation persistence.
//!
//! The store is an opaque key/value abstraction: it persists investigation
//! records and reports without interpreting them. After an investigation
//! reaches terminal state the store is the source of truth; status queries
//! must succeed even when the in-memory working set is gone.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::error::Result;
use crate::report::Report;
use crate::types::InvestigationRecord;
use async_trait::async_trait;
use osint_core::InvestigationId;

#[async_trait]
pub trait InvestigationStore: Send + Sync {
    async fn save_investigation(&self, record: &InvestigationRecord) -> Result<()>;

    async fn get_investigation(
        &self,
        id: &InvestigationId,
    ) -> Result<Option<InvestigationRecord>>;

    async fn save_report(&self, id: &InvestigationId, report: &Report) -> Result<()>;

    async fn get_report(&self, id: &InvestigationId) -> Result<Option<Report>>;

    /// Newest first.
    async fn list_investigations(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<InvestigationRecord>>;

    async fn delete_investigation(&self, id: &InvestigationId) -> Result<bool>;
}
