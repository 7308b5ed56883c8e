//! Rolling pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use firewall_types::VerdictStatus;

/// Point-in-time snapshot of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PipelineStats {
    pub validations: u64,
    pub allowed: u64,
    pub blocked: u64,
    pub warned: u64,
    pub errors: u64,
    pub cache_hits: u64,
    /// Requests where at least one detector degraded or timed out.
    pub degraded: u64,
    /// Requests whose deadline expired before every detector finished.
    pub truncated: u64,
}

/// Lock-free counters updated on every validation.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    validations: AtomicU64,
    allowed: AtomicU64,
    blocked: AtomicU64,
    warned: AtomicU64,
    errors: AtomicU64,
    cache_hits: AtomicU64,
    degraded: AtomicU64,
    truncated: AtomicU64,
}

impl Counters {
    pub fn record(&self, status: VerdictStatus, cached: bool, degraded: bool, truncated: bool) {
        self.validations.fetch_add(1, Ordering::Relaxed);
        let bucket = match status {
            VerdictStatus::Allowed => &self.allowed,
            VerdictStatus::Blocked => &self.blocked,
            VerdictStatus::Warned => &self.warned,
            VerdictStatus::Error => &self.errors,
        };
        bucket.fetch_add(1, Ordering::Relaxed);

        if cached {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        if degraded {
            self.degraded.fetch_add(1, Ordering::Relaxed);
        }
        if truncated {
            self.truncated.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            validations: self.validations.load(Ordering::Relaxed),
            allowed: self.allowed.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            warned: self.warned.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
        }
    }
}
