//! Optional Redis mirror for the result cache.
//!
//! Carries the same contract as the in-memory map: fingerprint keyed,
//! TTL-bounded. Every operation returns a classified error; callers treat
//! any failure as a miss and continue memory-only.

use super::Fingerprint;
use crate::error::{Error, Result};
use crate::types::RawResult;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

const KEY_PREFIX: &str = "osint:cache:";

#[derive(Clone)]
pub struct RedisMirror {
    conn: ConnectionManager,
}

impl RedisMirror {
    /// Connect to the configured Redis URL. The caller decides whether a
    /// connection failure is fatal; for the cache it never is.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(Error::from)?;
        let conn = ConnectionManager::new(client).await.map_err(Error::from)?;
        Ok(Self { conn })
    }

    fn key(fingerprint: &Fingerprint) -> String {
        format!("{}{}", KEY_PREFIX, fingerprint.as_str())
    }

    pub async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<RawResult>>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(Self::key(fingerprint)).await.map_err(Error::from)?;
        match payload {
            Some(json) => {
                let results: Vec<RawResult> = serde_json::from_str(&json)?;
                Ok(Some(results))
            }
            None => Ok(None),
        }
    }

    pub async fn set(
        &self,
        fingerprint: &Fingerprint,
        results: &[RawResult],
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(results)?;
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(Self::key(fingerprint), payload, ttl_secs)
            .await
            .map_err(Error::from)?;
        Ok(())
    }
}
