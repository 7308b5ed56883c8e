//! The deterministic regex detector.
//!
//! Scans prompt text with every enabled pattern, applies content validators
//! and context-term windows, resolves same-category span collisions, and
//! emits findings with `confidence = 1.0` (0.8 for contextual triggers).

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use firewall_types::{Finding, FindingType, Span};

use crate::schema::{CompiledPattern, PatternSet};
use crate::validator::validate_match;

/// Bytes of surrounding text inspected when a pattern requires context terms.
const CONTEXT_WINDOW: usize = 64;

/// Category reported for contextual trigger findings.
const CONTEXTUAL_CATEGORY: &str = "contextual";

/// Confidence assigned to contextual trigger findings; a plain phrase hit is
/// weaker evidence than a structured regex match.
const CONTEXTUAL_CONFIDENCE: f64 = 0.8;

/// Deterministic matcher over a compiled [`PatternSet`].
pub struct RegexDetector {
    set: Arc<PatternSet>,
    /// Stop scanning once this many match events have been accepted.
    max_findings: usize,
}

/// A candidate `(pattern index, span)` pair prior to collision resolution.
struct Candidate {
    pattern_idx: usize,
    span: Span,
}

impl RegexDetector {
    /// Default cap on accepted match events per call.
    pub const DEFAULT_MAX_FINDINGS: usize = 64;

    pub fn new(set: Arc<PatternSet>) -> Self {
        Self {
            set,
            max_findings: Self::DEFAULT_MAX_FINDINGS,
        }
    }

    /// Override the aggregate match cap.
    pub fn with_max_findings(mut self, max_findings: usize) -> Self {
        self.max_findings = max_findings;
        self
    }

    pub fn pattern_count(&self) -> usize {
        self.set.len()
    }

    /// Scan `text` and return findings, optionally restricted to a set of
    /// active categories.
    ///
    /// Matches within the same category that cover an identical span are
    /// collapsed to the highest-severity pattern (ties broken by pattern
    /// name ascending); overlapping matches from different categories are
    /// all kept.
    pub fn detect(&self, text: &str, categories: Option<&HashSet<String>>) -> Vec<Finding> {
        let lower = text.to_ascii_lowercase();
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut accepted = 0usize;

        'patterns: for (idx, pattern) in self.set.patterns.iter().enumerate() {
            if let Some(active) = categories {
                if !active.contains(&pattern.category) {
                    continue;
                }
            }

            for m in pattern.regex.find_iter(text) {
                if !validate_match(pattern.validator, m.as_str()) {
                    debug!(
                        pattern = %pattern.name,
                        "candidate match rejected by validator"
                    );
                    continue;
                }
                if !context_terms_present(pattern, &lower, m.start(), m.end()) {
                    debug!(
                        pattern = %pattern.name,
                        "candidate match rejected: no context term in window"
                    );
                    continue;
                }

                candidates.push(Candidate {
                    pattern_idx: idx,
                    span: (m.start(), m.end()),
                });
                accepted += 1;
                if accepted >= self.max_findings {
                    warn!(
                        max = self.max_findings,
                        "match cap reached; remaining patterns skipped"
                    );
                    break 'patterns;
                }
            }
        }

        let resolved = self.resolve_same_category_collisions(candidates);
        let mut findings = self.aggregate(resolved);

        findings.extend(self.detect_contextual(&lower, categories));
        findings
    }

    /// Within one category, identical spans keep only the winning pattern:
    /// higher severity first, then pattern name ascending.
    fn resolve_same_category_collisions(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut best: Vec<Candidate> = Vec::with_capacity(candidates.len());

        for cand in candidates {
            let pat = &self.set.patterns[cand.pattern_idx];
            let existing = best.iter().position(|other| {
                let other_pat = &self.set.patterns[other.pattern_idx];
                other.span == cand.span && other_pat.category == pat.category
            });

            match existing {
                None => best.push(cand),
                Some(i) => {
                    let incumbent = &self.set.patterns[best[i].pattern_idx];
                    let challenger_wins = pat
                        .severity
                        .cmp(&incumbent.severity)
                        .then_with(|| incumbent.name.cmp(&pat.name))
                        .is_gt();
                    if challenger_wins {
                        best[i] = cand;
                    }
                }
            }
        }

        best
    }

    /// Group surviving candidates by pattern into one finding per pattern,
    /// spans sorted ascending.
    fn aggregate(&self, candidates: Vec<Candidate>) -> Vec<Finding> {
        let mut by_pattern: Vec<(usize, Vec<Span>)> = Vec::new();

        for cand in candidates {
            match by_pattern.iter_mut().find(|(idx, _)| *idx == cand.pattern_idx) {
                Some((_, spans)) => spans.push(cand.span),
                None => by_pattern.push((cand.pattern_idx, vec![cand.span])),
            }
        }

        by_pattern
            .into_iter()
            .map(|(idx, mut spans)| {
                spans.sort_unstable();
                let pat = &self.set.patterns[idx];
                let count = spans.len();
                let mut finding = Finding::new(
                    FindingType::Regex,
                    pat.name.clone(),
                    pat.category.clone(),
                    pat.severity,
                    1.0,
                    spans,
                )
                .with_metadata("match_count", count.to_string());
                if let Some(desc) = &pat.description {
                    finding = finding.with_metadata("description", desc.clone());
                }
                finding
            })
            .collect()
    }

    /// Contextual trigger phrases: case-insensitive substring hits emitted at
    /// reduced confidence.
    fn detect_contextual(
        &self,
        lower: &str,
        categories: Option<&HashSet<String>>,
    ) -> Vec<Finding> {
        if let Some(active) = categories {
            if !active.contains(CONTEXTUAL_CATEGORY) {
                return Vec::new();
            }
        }

        let mut findings = Vec::new();
        for ctx in &self.set.contextual {
            let trigger = ctx.trigger.to_ascii_lowercase();
            if trigger.is_empty() {
                continue;
            }
            if let Some(idx) = lower.find(&trigger) {
                let span = (idx, idx + trigger.len());
                findings.push(
                    Finding::new(
                        FindingType::Contextual,
                        ctx.trigger.clone(),
                        CONTEXTUAL_CATEGORY,
                        ctx.severity,
                        CONTEXTUAL_CONFIDENCE,
                        vec![span],
                    )
                    .with_metadata("trigger", ctx.trigger.clone()),
                );
            }
        }
        findings
    }
}

/// Check that at least one of the pattern's context terms occurs within
/// [`CONTEXT_WINDOW`] bytes of the match.
fn context_terms_present(
    pattern: &CompiledPattern,
    lower: &str,
    start: usize,
    end: usize,
) -> bool {
    if pattern.context_terms.is_empty() {
        return true;
    }

    let win_start = start.saturating_sub(CONTEXT_WINDOW);
    let win_end = (end + CONTEXT_WINDOW).min(lower.len());
    // `to_ascii_lowercase` preserves byte offsets, but a window edge can
    // still split a multi-byte character; widen to the nearest boundaries.
    let win_start = floor_char_boundary(lower, win_start);
    let win_end = ceil_char_boundary(lower, win_end);
    let window = &lower[win_start..win_end];

    pattern.context_terms.iter().any(|term| window.contains(term.as_str()))
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
