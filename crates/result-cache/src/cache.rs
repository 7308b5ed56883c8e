//! The tiered result cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use firewall_types::{ValidationResult, Verdict};

use crate::l1::LruTtlCache;
use crate::store::KvStore;

/// Tier sizing and TTLs.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub l1_capacity: usize,
    pub l1_ttl: Duration,
    pub l2_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_capacity: 1000,
            l1_ttl: Duration::from_secs(300),
            l2_ttl: Duration::from_secs(3600),
        }
    }
}

/// What gets cached: the verdict and its policy coordinates, without the
/// per-request latency and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResult {
    pub prompt_fingerprint: String,
    pub verdict: Verdict,
    pub policy_id: String,
    /// Version observed at insertion; checked against the active version on
    /// every read.
    pub policy_version: u64,
}

/// Rolling cache counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub misses: u64,
    pub stores: u64,
    /// Store attempts refused by the safety invariant.
    pub rejected_stores: u64,
    /// L2 errors silently downgraded to misses.
    pub errors: u64,
}

/// Two-tier verdict cache: process-local LRU in front of a shared store.
///
/// Reads check L1 first and promote L2 hits; writes populate both tiers.
/// Every failure path degrades to a miss: a broken cache slows requests
/// down, it never fails them.
pub struct ResultCache {
    l1: Mutex<LruTtlCache<CachedResult>>,
    l2: Arc<dyn KvStore>,
    config: CacheConfig,
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    rejected_stores: AtomicU64,
    errors: AtomicU64,
}

impl ResultCache {
    pub fn new(config: CacheConfig, l2: Arc<dyn KvStore>) -> Self {
        Self {
            l1: Mutex::new(LruTtlCache::new(config.l1_capacity, config.l1_ttl)),
            l2,
            config,
            l1_hits: AtomicU64::new(0),
            l2_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
            rejected_stores: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Look up a fingerprint, returning the cached result only if it was
    /// stored under the currently active policy version.
    ///
    /// A version mismatch reads as a miss and lazily deletes the stale entry
    /// from both tiers.
    pub async fn lookup(&self, fingerprint: &str, active_version: u64) -> Option<CachedResult> {
        // L1 first.
        let l1_hit = {
            let mut l1 = self.l1.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            l1.get(fingerprint).cloned()
        };

        if let Some(cached) = l1_hit {
            if cached.policy_version == active_version {
                self.l1_hits.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint, "l1 cache hit");
                return Some(cached);
            }
            debug!(fingerprint, "stale l1 entry; deleting");
            self.delete(fingerprint).await;
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        // L2 on miss.
        match self.l2.get(fingerprint).await {
            Ok(Some(raw)) => match serde_json::from_str::<CachedResult>(&raw) {
                Ok(cached) if cached.policy_version == active_version => {
                    self.l2_hits.fetch_add(1, Ordering::Relaxed);
                    debug!(fingerprint, "l2 cache hit; promoting to l1");
                    let mut l1 =
                        self.l1.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    l1.insert(fingerprint.to_string(), cached.clone());
                    Some(cached)
                }
                Ok(_) => {
                    debug!(fingerprint, "stale l2 entry; deleting");
                    self.delete(fingerprint).await;
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    None
                }
                Err(err) => {
                    warn!(%err, "undecodable cache entry; deleting");
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    self.delete(fingerprint).await;
                    None
                }
            },
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(err) => {
                warn!(%err, "l2 read failed; treating as miss");
                self.errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a validation result in both tiers, best effort.
    ///
    /// Enforces the safety invariant regardless of caller: anything other
    /// than an `allowed` verdict with zero findings is refused. Caching a
    /// blocked or findings-bearing result would keep serving it after the
    /// policy or pattern set changed.
    pub async fn store(&self, result: &ValidationResult) {
        if !result.verdict.is_cacheable_safe() {
            self.rejected_stores.fetch_add(1, Ordering::Relaxed);
            debug!(
                fingerprint = %result.prompt_fingerprint,
                status = ?result.verdict.status,
                "result not cacheable; skipping store"
            );
            return;
        }

        let cached = CachedResult {
            prompt_fingerprint: result.prompt_fingerprint.clone(),
            verdict: result.verdict.clone(),
            policy_id: result.policy_id.clone(),
            policy_version: result.policy_version,
        };

        {
            let mut l1 = self.l1.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            l1.insert(cached.prompt_fingerprint.clone(), cached.clone());
        }

        match serde_json::to_string(&cached) {
            Ok(raw) => {
                if let Err(err) = self
                    .l2
                    .set(&cached.prompt_fingerprint, raw, self.config.l2_ttl)
                    .await
                {
                    warn!(%err, "l2 write failed; entry lives in l1 only");
                    self.errors.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(err) => {
                warn!(%err, "failed to serialize cache entry");
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.stores.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove a fingerprint from both tiers, best effort.
    pub async fn delete(&self, fingerprint: &str) {
        {
            let mut l1 = self.l1.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            l1.remove(fingerprint);
        }
        if let Err(err) = self.l2.delete(fingerprint).await {
            warn!(%err, "l2 delete failed");
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            rejected_stores: self.rejected_stores.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
