//! The validation pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tracing::{debug, warn};

use detection_log::{DetectionRecord, DetectionSink};
use firewall_types::{ValidateRequest, ValidationResult, Verdict, VerdictStatus};
use policy_engine::PolicyProvider;
use result_cache::{fingerprint, ResultCache};

use crate::detect::{DetectContext, Detector};
use crate::error::FirewallError;
use crate::merge::merge_findings;
use crate::stats::{Counters, PipelineStats};

/// Tunable limits for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Overall budget for one validation call; propagated to every detector.
    pub deadline: Duration,
    /// Prompts larger than this are rejected as invalid input.
    pub max_prompt_bytes: usize,
    /// Upper bound on requests per batch call.
    pub max_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_millis(150),
            max_prompt_bytes: 64 * 1024,
            max_batch_size: 100,
        }
    }
}

/// Orchestrates cache lookup, detector fan-out, policy evaluation, cache
/// population, and sink publication for validation calls.
pub struct Pipeline {
    policies: Arc<PolicyProvider>,
    detectors: Vec<Arc<dyn Detector>>,
    cache: Option<Arc<ResultCache>>,
    sink: Option<DetectionSink>,
    config: PipelineConfig,
    counters: Counters,
}

impl Pipeline {
    pub fn new(policies: Arc<PolicyProvider>) -> Self {
        Self {
            policies,
            detectors: Vec::new(),
            cache: None,
            sink: None,
            config: PipelineConfig::default(),
            counters: Counters::default(),
        }
    }

    /// Register a detector; detectors run concurrently in registration
    /// order-independent fashion, registration order only fixes merge
    /// tie-breaking.
    pub fn with_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_sink(mut self, sink: DetectionSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Validate a single prompt.
    ///
    /// Never returns an error: invalid input and unknown policies come back
    /// as `status = error` results, everything below that degrades
    /// gracefully.
    pub async fn validate(&self, req: &ValidateRequest) -> ValidationResult {
        self.validate_until(req, Instant::now() + self.config.deadline)
            .await
    }

    /// Validate up to `max_batch_size` prompts concurrently under one shared
    /// deadline, preserving input order.
    ///
    /// The batch is not atomic: an individual failure produces an error
    /// result at its position without affecting siblings.
    pub async fn validate_batch(
        &self,
        requests: &[ValidateRequest],
    ) -> Result<Vec<ValidationResult>, FirewallError> {
        if requests.len() > self.config.max_batch_size {
            return Err(FirewallError::InputInvalid(format!(
                "batch of {} requests exceeds the limit of {}",
                requests.len(),
                self.config.max_batch_size
            )));
        }

        let deadline = Instant::now() + self.config.deadline;
        let results = join_all(
            requests
                .iter()
                .map(|req| self.validate_until(req, deadline)),
        )
        .await;
        Ok(results)
    }

    async fn validate_until(&self, req: &ValidateRequest, deadline: Instant) -> ValidationResult {
        let start = Instant::now();
        match self.run(req, start, deadline).await {
            Ok(result) => result,
            Err(err) => {
                warn!(%err, policy_id = req.effective_policy_id(), "validation failed");
                self.counters
                    .record(VerdictStatus::Error, false, false, false);
                ValidationResult {
                    request_id: uuid::Uuid::new_v4(),
                    prompt_fingerprint: String::new(),
                    verdict: Verdict::error(err.to_string()),
                    policy_id: req.effective_policy_id().to_string(),
                    policy_version: 0,
                    latency: start.elapsed(),
                    cached: false,
                    timestamp: chrono::Utc::now(),
                    degraded_detectors: Vec::new(),
                    truncated: false,
                }
            }
        }
    }

    async fn run(
        &self,
        req: &ValidateRequest,
        start: Instant,
        deadline: Instant,
    ) -> Result<ValidationResult, FirewallError> {
        // 1. Input validation.
        if req.prompt.is_empty() {
            return Err(FirewallError::InputInvalid(
                "prompt must not be empty".to_string(),
            ));
        }
        if req.prompt.len() > self.config.max_prompt_bytes {
            return Err(FirewallError::InputInvalid(format!(
                "prompt of {} bytes exceeds the limit of {}",
                req.prompt.len(),
                self.config.max_prompt_bytes
            )));
        }

        // 2. Policy resolution; the engine snapshot is held for the whole
        //    call.
        let policy_id = req.effective_policy_id();
        let engine = self.policies.get(policy_id)?;
        let policy_version = engine.policy().version;

        // 3. Cache lookup.
        let prompt_fingerprint = fingerprint(policy_id, policy_version, &req.prompt);
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lookup(&prompt_fingerprint, policy_version).await {
                debug!(policy_id, "validation served from cache");
                let result = ValidationResult {
                    request_id: uuid::Uuid::new_v4(),
                    prompt_fingerprint,
                    verdict: hit.verdict,
                    policy_id: policy_id.to_string(),
                    policy_version,
                    latency: start.elapsed(),
                    cached: true,
                    timestamp: chrono::Utc::now(),
                    degraded_detectors: Vec::new(),
                    truncated: false,
                };
                self.counters.record(result.status(), true, false, false);
                return Ok(result);
            }
        }

        // 4. Concurrent detector fan-out under the shared deadline.
        let threshold = engine.policy().semantic_threshold;
        let text = req.prompt.as_str();
        let detector_futures: Vec<_> = self
            .detectors
            .iter()
            .map(|detector| {
                let detector = Arc::clone(detector);
                let remaining = deadline.saturating_duration_since(Instant::now());
                let ctx = DetectContext {
                    remaining,
                    semantic_threshold: threshold,
                };
                async move {
                    let name = detector.name().to_string();
                    match tokio::time::timeout(ctx.remaining, detector.detect(text, &ctx)).await
                    {
                        Ok(outcome) => (name, Some(outcome)),
                        Err(_) => (name, None),
                    }
                }
            })
            .collect();

        let outcomes = join_all(detector_futures).await;

        let mut per_detector = Vec::with_capacity(outcomes.len());
        let mut degraded_detectors = Vec::new();
        let mut truncated = false;
        for (name, outcome) in outcomes {
            match outcome {
                Some(outcome) => {
                    if outcome.degraded {
                        degraded_detectors.push(name);
                    }
                    per_detector.push(outcome.findings);
                }
                // Deadline expired before the detector finished; keep what
                // the others produced.
                None => {
                    debug!(detector = %name, "detector missed the deadline");
                    truncated = true;
                    degraded_detectors.push(name);
                    per_detector.push(Vec::new());
                }
            }
        }

        // 5. Merge into a deterministic finding set.
        let findings = merge_findings(per_detector);

        // 6. Verdict.
        let verdict = engine.evaluate(&req.prompt, findings);

        let result = ValidationResult {
            request_id: uuid::Uuid::new_v4(),
            prompt_fingerprint,
            verdict,
            policy_id: policy_id.to_string(),
            policy_version,
            latency: start.elapsed(),
            cached: false,
            timestamp: chrono::Utc::now(),
            degraded_detectors,
            truncated,
        };

        // 7. Cache population, best effort. A degraded or truncated pass may
        //    have missed findings, so only complete safe results are stored.
        if let Some(cache) = &self.cache {
            if result.verdict.is_cacheable_safe()
                && result.degraded_detectors.is_empty()
                && !result.truncated
            {
                cache.store(&result).await;
            }
        }

        // 8. Sink publication, non-blocking.
        if let Some(sink) = &self.sink {
            sink.publish(DetectionRecord::from_result(&result, req.user_id.clone()));
        }

        self.counters.record(
            result.status(),
            false,
            !result.degraded_detectors.is_empty(),
            result.truncated,
        );
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
