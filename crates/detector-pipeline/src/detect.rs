//! The detector capability contract and the adapters that plug the concrete
//! detection layers into it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use firewall_types::Finding;
use pattern_detect::{PatternProvider, RegexDetector};
use semantic_detect::SemanticDetector;

/// Per-call inputs shared by every detector.
#[derive(Debug, Clone)]
pub struct DetectContext {
    /// Time budget left for this detector; enforcement happens in the
    /// pipeline, but slow detectors can use it to cut work short.
    pub remaining: Duration,
    /// Similarity floor from the active policy.
    pub semantic_threshold: f64,
}

/// What one detector contributed to a request.
#[derive(Debug, Default)]
pub struct DetectorOutcome {
    pub findings: Vec<Finding>,
    /// Set when the detector failed internally and contributed nothing.
    pub degraded: bool,
}

/// The minimal contract every detector exposes.
///
/// The pipeline holds detectors as trait objects and never downcasts; new
/// detection layers drop in as additional instances.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Stable name used in `degraded_detectors` lists and logs.
    fn name(&self) -> &str;

    async fn detect(&self, text: &str, ctx: &DetectContext) -> DetectorOutcome;
}

// ---------------------------------------------------------------------------
// PatternDetectorAdapter
// ---------------------------------------------------------------------------

/// Runs the deterministic pattern layer against the provider's current
/// snapshot.
///
/// The snapshot is taken per call, so a pattern reload between two requests
/// is picked up without restarting the pipeline while an in-flight request
/// keeps the set it started with.
pub struct PatternDetectorAdapter {
    provider: Arc<PatternProvider>,
}

impl PatternDetectorAdapter {
    pub fn new(provider: Arc<PatternProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Detector for PatternDetectorAdapter {
    fn name(&self) -> &str {
        "regex"
    }

    async fn detect(&self, text: &str, _ctx: &DetectContext) -> DetectorOutcome {
        let detector = RegexDetector::new(self.provider.snapshot());
        DetectorOutcome {
            findings: detector.detect(text, None),
            degraded: false,
        }
    }
}

// ---------------------------------------------------------------------------
// SemanticDetectorAdapter
// ---------------------------------------------------------------------------

/// Runs the similarity layer with the policy's threshold.
pub struct SemanticDetectorAdapter {
    detector: Arc<SemanticDetector>,
}

impl SemanticDetectorAdapter {
    pub fn new(detector: Arc<SemanticDetector>) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl Detector for SemanticDetectorAdapter {
    fn name(&self) -> &str {
        "semantic"
    }

    async fn detect(&self, text: &str, ctx: &DetectContext) -> DetectorOutcome {
        let outcome = self.detector.detect(text, ctx.semantic_threshold).await;
        DetectorOutcome {
            findings: outcome.findings,
            degraded: outcome.degraded,
        }
    }
}
