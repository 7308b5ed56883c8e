use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// How serious a single piece of detected content is.
///
/// The ordering is total (`info < low < medium < high < critical`) so that
/// policy rules can express a severity floor with a plain comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// FindingType
// ---------------------------------------------------------------------------

/// Which detection layer produced a finding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FindingType {
    /// Deterministic pattern match.
    Regex,
    /// Nearest-neighbour similarity against known-sensitive references.
    Semantic,
    /// Synthesized by the policy layer itself (e.g. a denylist hit).
    Policy,
    /// A contextual trigger phrase (lower confidence than a regex match).
    Contextual,
}

impl fmt::Display for FindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Regex => "regex",
            Self::Semantic => "semantic",
            Self::Policy => "policy",
            Self::Contextual => "contextual",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

/// Half-open `[start, end)` byte range into the prompt text.
pub type Span = (usize, usize);

/// A single detection event: evidence that the prompt contains sensitive
/// content.
///
/// Serialized field names follow the external wire shape
/// (`detection_type`, `matched_pattern`, `confidence_score`,
/// `match_positions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Unique per validation call.
    pub id: uuid::Uuid,
    #[serde(rename = "detection_type")]
    pub finding_type: FindingType,
    /// Name of the pattern or reference that matched.
    #[serde(rename = "matched_pattern")]
    pub pattern_name: String,
    /// Category the pattern belongs to (e.g. `api_keys`, `pii`).
    pub category: String,
    pub severity: Severity,
    /// 1.0 for regex matches; the similarity score for semantic matches.
    #[serde(rename = "confidence_score")]
    pub confidence: f64,
    /// Byte offsets of every match, half-open.
    #[serde(rename = "match_positions")]
    pub match_spans: Vec<Span>,
    /// Free-form string metadata. A BTreeMap keeps serialization and
    /// comparison deterministic.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Finding {
    /// Construct a finding with a fresh id and empty metadata.
    pub fn new(
        finding_type: FindingType,
        pattern_name: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
        confidence: f64,
        match_spans: Vec<Span>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            finding_type,
            pattern_name: pattern_name.into(),
            category: category.into(),
            severity,
            confidence,
            match_spans,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry, consuming and returning `self` for
    /// builder-style usage.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The first match span, if any.
    pub fn first_span(&self) -> Option<Span> {
        self.match_spans.first().copied()
    }

    /// Identity used when deduplicating merged detector output.
    pub fn dedupe_key(&self) -> (FindingType, &str, Option<Span>) {
        (self.finding_type, self.pattern_name.as_str(), self.first_span())
    }

    /// Deterministic ordering for merged finding sets:
    /// severity descending, then type, pattern name, and span start
    /// ascending.
    pub fn display_order(&self, other: &Self) -> Ordering {
        other
            .severity
            .cmp(&self.severity)
            .then_with(|| self.finding_type.cmp(&other.finding_type))
            .then_with(|| self.pattern_name.cmp(&other.pattern_name))
            .then_with(|| {
                let a = self.first_span().map(|s| s.0).unwrap_or(usize::MAX);
                let b = other.first_span().map(|s| s.0).unwrap_or(usize::MAX);
                a.cmp(&b)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_is_total() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
        let s: Severity = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(s, Severity::High);
    }

    #[test]
    fn finding_uses_wire_field_names() {
        let f = Finding::new(
            FindingType::Regex,
            "openai_api_key",
            "api_keys",
            Severity::Critical,
            1.0,
            vec![(14, 49)],
        );
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["detection_type"], "regex");
        assert_eq!(json["matched_pattern"], "openai_api_key");
        assert_eq!(json["confidence_score"], 1.0);
        assert_eq!(json["match_positions"][0][0], 14);
        assert_eq!(json["match_positions"][0][1], 49);
    }

    #[test]
    fn display_order_sorts_severity_first() {
        let low = Finding::new(
            FindingType::Regex,
            "a",
            "pii",
            Severity::Low,
            1.0,
            vec![(0, 4)],
        );
        let critical = Finding::new(
            FindingType::Semantic,
            "z",
            "api_keys",
            Severity::Critical,
            0.9,
            vec![(8, 12)],
        );
        let mut v = vec![low.clone(), critical.clone()];
        v.sort_by(|a, b| a.display_order(b));
        assert_eq!(v[0].pattern_name, "z");
        assert_eq!(v[1].pattern_name, "a");
    }

    #[test]
    fn display_order_breaks_ties_by_name_then_span() {
        let mk = |name: &str, start: usize| {
            Finding::new(
                FindingType::Regex,
                name,
                "pii",
                Severity::High,
                1.0,
                vec![(start, start + 4)],
            )
        };
        let mut v = vec![mk("b", 0), mk("a", 10), mk("a", 2)];
        v.sort_by(|x, y| x.display_order(y));
        assert_eq!(v[0].pattern_name, "a");
        assert_eq!(v[0].first_span(), Some((2, 6)));
        assert_eq!(v[1].first_span(), Some((10, 14)));
        assert_eq!(v[2].pattern_name, "b");
    }
}
