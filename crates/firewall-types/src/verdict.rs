use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::finding::Finding;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Final decision class for a validated prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Allowed,
    Blocked,
    Warned,
    Error,
}

/// The decision produced by the policy engine for one prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    /// True iff the prompt may be forwarded without caveats.
    pub is_safe: bool,
    /// Name of the rule that decided the winning action, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
    /// Human-readable explanation of the decision.
    pub message: String,
    /// All findings that survived the merge, in deterministic order.
    #[serde(rename = "detections")]
    pub findings: Vec<Finding>,
}

impl Verdict {
    /// An `allowed` verdict carrying the given findings.
    pub fn allowed(message: impl Into<String>, findings: Vec<Finding>) -> Self {
        Self {
            status: VerdictStatus::Allowed,
            is_safe: true,
            matched_rule: None,
            message: message.into(),
            findings,
        }
    }

    /// An `error` verdict; used when validation could not run at all.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Error,
            is_safe: false,
            matched_rule: None,
            message: message.into(),
            findings: Vec::new(),
        }
    }

    /// A safe result is `allowed` with zero findings; only safe results are
    /// eligible for caching.
    pub fn is_cacheable_safe(&self) -> bool {
        self.status == VerdictStatus::Allowed && self.findings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ValidationResult
// ---------------------------------------------------------------------------

/// Everything the pipeline returns for a single validated prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub request_id: uuid::Uuid,
    pub prompt_fingerprint: String,
    pub verdict: Verdict,
    pub policy_id: String,
    pub policy_version: u64,
    /// Wall-clock time spent validating, serialized as integer milliseconds.
    #[serde(with = "duration_millis")]
    pub latency: Duration,
    pub cached: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Names of detectors that failed or timed out for this request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_detectors: Vec<String>,
    /// Set when the deadline expired before every detector finished.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl ValidationResult {
    pub fn status(&self) -> VerdictStatus {
        self.verdict.status
    }
}

/// Serialize a [`Duration`] as whole milliseconds.
mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{FindingType, Severity};

    fn result(verdict: Verdict) -> ValidationResult {
        ValidationResult {
            request_id: uuid::Uuid::new_v4(),
            prompt_fingerprint: "abc123".to_string(),
            verdict,
            policy_id: "default".to_string(),
            policy_version: 1,
            latency: Duration::from_millis(12),
            cached: false,
            timestamp: chrono::Utc::now(),
            degraded_detectors: Vec::new(),
            truncated: false,
        }
    }

    #[test]
    fn safe_verdict_is_cacheable() {
        let v = Verdict::allowed("Prompt is safe", Vec::new());
        assert!(v.is_cacheable_safe());
    }

    #[test]
    fn verdict_with_findings_is_not_cacheable() {
        let finding = Finding::new(
            FindingType::Regex,
            "us_ssn",
            "pii",
            Severity::High,
            1.0,
            vec![(10, 21)],
        );
        let v = Verdict::allowed("Allowed with warnings", vec![finding]);
        assert!(!v.is_cacheable_safe());
    }

    #[test]
    fn latency_round_trips_as_millis() {
        let r = result(Verdict::allowed("Prompt is safe", Vec::new()));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["latency"], 12);

        let back: ValidationResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.latency, Duration::from_millis(12));
    }

    #[test]
    fn findings_serialize_as_detections() {
        let finding = Finding::new(
            FindingType::Semantic,
            "internal_hostname",
            "infrastructure",
            Severity::High,
            0.92,
            vec![(0, 34)],
        );
        let r = result(Verdict {
            status: VerdictStatus::Blocked,
            is_safe: false,
            matched_rule: Some("block_infra".to_string()),
            message: "Blocked by rule 'block_infra'".to_string(),
            findings: vec![finding],
        });
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["verdict"]["detections"][0]["detection_type"], "semantic");
        assert_eq!(json["verdict"]["status"], "blocked");
    }
}
