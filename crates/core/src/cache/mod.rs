//! Result cache for raw connector output.
//!
//! Maps a deterministic fingerprint of `(source, normalized query,
//! parameters)` to the raw result list. Guarantees at-most-one concurrent
//! upstream fetch per fingerprint: concurrent callers coalesce onto the same
//! in-flight fetch and observe the same outcome, including the same error.
//! Successful outcomes are stored with a TTL (per-source overridable) under
//! a mandatory LRU size cap. An optional Redis mirror carries the same
//! contract; mirror unavailability silently degrades to memory-only.

mod mirror;

pub use mirror::RedisMirror;

use crate::config::CacheSettings;
use crate::error::{Error, Result};
use crate::types::RawResult;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

/// Deterministic cache key for one `(source, query, parameters)` triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The query string must already be normalized (trimmed, lowercased)
    /// by the planner so equivalent queries collide.
    pub fn compute(
        source: &str,
        normalized_query: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Self {
        let mut material = String::new();
        material.push_str(source);
        material.push('\x1f');
        material.push_str(normalized_query);
        for (key, value) in parameters {
            material.push('\x1f');
            material.push_str(key);
            material.push('=');
            material.push_str(value);
        }
        Self(crate::utils::sha256_hex(material.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a lookup was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Fresh value was already in memory (or the mirror)
    Hit,
    /// This caller performed the upstream fetch
    MissFetched,
    /// Another caller's in-flight fetch satisfied this lookup
    Coalesced,
}

type FetchOutcome = std::result::Result<Arc<Vec<RawResult>>, Error>;

struct CacheEntry {
    value: Arc<Vec<RawResult>>,
    stored_at: Instant,
    ttl: Duration,
    last_access: AtomicU64,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() <= self.ttl
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub evictions: u64,
    pub mirror_errors: u64,
    pub entries: usize,
}

/// Process-wide result cache with fetch coalescing.
pub struct ResultCache {
    entries: DashMap<Fingerprint, CacheEntry>,
    inflight: DashMap<Fingerprint, Arc<OnceCell<FetchOutcome>>>,
    per_source_ttl: DashMap<String, Duration>,
    default_ttl: Duration,
    max_entries: usize,
    mirror: RwLock<Option<RedisMirror>>,
    access_clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    evictions: AtomicU64,
    mirror_errors: AtomicU64,
}

impl ResultCache {
    pub fn new(settings: &CacheSettings) -> Self {
        assert!(settings.max_entries > 0, "cache size cap is mandatory");
        Self {
            entries: DashMap::new(),
            inflight: DashMap::new(),
            per_source_ttl: DashMap::new(),
            default_ttl: Duration::from_secs(settings.ttl_sec),
            max_entries: settings.max_entries,
            mirror: RwLock::new(None),
            access_clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            mirror_errors: AtomicU64::new(0),
        }
    }

    /// Attach the external KV mirror. Called once at startup when
    /// `cache.redis_url` is configured; failures there degrade to
    /// memory-only and are not fatal.
    pub async fn attach_mirror(&self, mirror: RedisMirror) {
        *self.mirror.write().await = Some(mirror);
    }

    /// Override the TTL for one source (declared by its connector).
    pub fn set_source_ttl(&self, source: &str, ttl: Duration) {
        self.per_source_ttl.insert(source.to_string(), ttl);
    }

    fn ttl_for(&self, source: &str) -> Duration {
        self.per_source_ttl
            .get(source)
            .map(|entry| *entry.value())
            .unwrap_or(self.default_ttl)
    }

    /// Look up `fingerprint`, running `fetch` on a miss. Concurrent callers
    /// for the same fingerprint share one fetch and one outcome.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        source: &str,
        fingerprint: &Fingerprint,
        fetch: F,
    ) -> Result<(Arc<Vec<RawResult>>, CacheStatus)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<RawResult>>>,
    {
        if let Some(value) = self.lookup_memory(fingerprint) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((value, CacheStatus::Hit));
        }

        if let Some(value) = self.lookup_mirror(source, fingerprint).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((value, CacheStatus::Hit));
        }

        let cell = self
            .inflight
            .entry(fingerprint.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let led_fetch = Arc::new(AtomicBool::new(false));
        let led_flag = Arc::clone(&led_fetch);
        let outcome = cell
            .get_or_init(|| async move {
                led_flag.store(true, Ordering::SeqCst);
                match fetch().await {
                    Ok(results) => Ok(Arc::new(results)),
                    Err(error) => Err(error),
                }
            })
            .await
            .clone();

        if led_fetch.load(Ordering::SeqCst) {
            // The leader publishes the outcome and retires the flight group.
            self.misses.fetch_add(1, Ordering::Relaxed);
            if let Ok(value) = &outcome {
                self.insert(source, fingerprint.clone(), Arc::clone(value)).await;
            }
            self.inflight.remove(fingerprint);
            outcome.map(|value| (value, CacheStatus::MissFetched))
        } else {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            outcome.map(|value| (value, CacheStatus::Coalesced))
        }
    }

    fn lookup_memory(&self, fingerprint: &Fingerprint) -> Option<Arc<Vec<RawResult>>> {
        let stale = {
            let entry = self.entries.get(fingerprint)?;
            if entry.is_fresh() {
                let stamp = self.access_clock.fetch_add(1, Ordering::Relaxed);
                entry.last_access.store(stamp, Ordering::Relaxed);
                return Some(Arc::clone(&entry.value));
            }
            true
        };
        if stale {
            self.entries.remove(fingerprint);
        }
        None
    }

    async fn lookup_mirror(
        &self,
        source: &str,
        fingerprint: &Fingerprint,
    ) -> Option<Arc<Vec<RawResult>>> {
        let guard = self.mirror.read().await;
        let mirror = guard.as_ref()?;
        match mirror.get(fingerprint).await {
            Ok(Some(results)) => {
                let value = Arc::new(results);
                self.insert_memory(source, fingerprint.clone(), Arc::clone(&value));
                Some(value)
            }
            Ok(None) => None,
            Err(error) => {
                self.mirror_errors.fetch_add(1, Ordering::Relaxed);
                debug!(error = %error, "cache mirror read failed, memory-only");
                None
            }
        }
    }

    async fn insert(&self, source: &str, fingerprint: Fingerprint, value: Arc<Vec<RawResult>>) {
        self.insert_memory(source, fingerprint.clone(), Arc::clone(&value));

        let guard = self.mirror.read().await;
        if let Some(mirror) = guard.as_ref() {
            if let Err(error) = mirror.set(&fingerprint, &value, self.ttl_for(source)).await {
                self.mirror_errors.fetch_add(1, Ordering::Relaxed);
                debug!(error = %error, "cache mirror write failed, memory-only");
            }
        }
    }

    fn insert_memory(&self, source: &str, fingerprint: Fingerprint, value: Arc<Vec<RawResult>>) {
        while self.entries.len() >= self.max_entries {
            if !self.evict_one() {
                break;
            }
        }

        let stamp = self.access_clock.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            fingerprint,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl: self.ttl_for(source),
                last_access: AtomicU64::new(stamp),
            },
        );
    }

    /// Evict the least-recently-accessed entry. Linear scan; the cap keeps
    /// the map small enough that this stays off the hot path.
    fn evict_one(&self) -> bool {
        let mut victim: Option<(Fingerprint, u64)> = None;
        for entry in self.entries.iter() {
            let stamp = entry.last_access.load(Ordering::Relaxed);
            match &victim {
                Some((_, oldest)) if stamp >= *oldest => {}
                _ => victim = Some((entry.key().clone(), stamp)),
            }
        }
        match victim {
            Some((key, _)) => {
                self.entries.remove(&key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Drop expired entries; maintenance hook for long-running processes.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh());
        before - self.entries.len()
    }

    pub fn invalidate(&self, fingerprint: &Fingerprint) {
        self.entries.remove(fingerprint);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            mirror_errors: self.mirror_errors.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}
