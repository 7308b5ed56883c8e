use serde::{Deserialize, Serialize};

use firewall_types::{FindingType, Severity, ValidationResult, VerdictStatus};

/// A single decision-log record.
///
/// The record carries the prompt fingerprint rather than the prompt itself;
/// the verbatim text is only attached when a caller explicitly opts in (for
/// deployments whose sink feeds a quarantine review queue).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub id: uuid::Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub request_id: uuid::Uuid,
    pub prompt_fingerprint: String,
    pub policy_id: String,
    pub policy_version: u64,
    pub status: VerdictStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
    pub message: String,
    pub latency_ms: u64,
    pub cached: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub degraded_detectors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub findings: Vec<FindingSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Verbatim prompt text; opt-in, absent by default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
}

/// Compact finding representation for the log stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingSummary {
    pub finding_type: FindingType,
    pub pattern_name: String,
    pub category: String,
    pub severity: Severity,
    pub confidence: f64,
    pub match_count: usize,
}

impl DetectionRecord {
    /// Build a record from a finished validation result.
    pub fn from_result(result: &ValidationResult, user_id: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            request_id: result.request_id,
            prompt_fingerprint: result.prompt_fingerprint.clone(),
            policy_id: result.policy_id.clone(),
            policy_version: result.policy_version,
            status: result.verdict.status,
            matched_rule: result.verdict.matched_rule.clone(),
            message: result.verdict.message.clone(),
            latency_ms: result.latency.as_millis() as u64,
            cached: result.cached,
            degraded_detectors: result.degraded_detectors.clone(),
            findings: result
                .verdict
                .findings
                .iter()
                .map(|f| FindingSummary {
                    finding_type: f.finding_type,
                    pattern_name: f.pattern_name.clone(),
                    category: f.category.clone(),
                    severity: f.severity,
                    confidence: f.confidence,
                    match_count: f.match_spans.len(),
                })
                .collect(),
            user_id,
            prompt_text: None,
        }
    }

    /// Attach the verbatim prompt, consuming and returning `self` for
    /// builder-style usage.
    pub fn with_prompt_text(mut self, text: impl Into<String>) -> Self {
        self.prompt_text = Some(text.into());
        self
    }
}
