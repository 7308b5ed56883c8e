//! Deterministic merge of per-detector finding lists.

use std::collections::HashSet;

use firewall_types::{Finding, FindingType, Span};

/// Merge detector outputs into one finding set.
///
/// Duplicates (same type, pattern name, and first span) are collapsed to
/// the first occurrence, then the set is sorted by `(severity desc, type
/// asc, pattern name asc, span start asc)`. Both steps are independent of
/// detector completion order, which keeps verdict messages and tests stable
/// under concurrency.
pub fn merge_findings(per_detector: Vec<Vec<Finding>>) -> Vec<Finding> {
    // Flatten in detector registration order so dedup keeps a stable
    // representative whichever detector finished first.
    let mut merged: Vec<Finding> = Vec::new();
    let mut seen: HashSet<(FindingType, String, Option<Span>)> = HashSet::new();

    for findings in per_detector {
        for finding in findings {
            let (ftype, name, span) = finding.dedupe_key();
            let key = (ftype, name.to_string(), span);
            if seen.insert(key) {
                merged.push(finding);
            }
        }
    }

    merged.sort_by(|a, b| a.display_order(b));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use firewall_types::{FindingType, Severity};

    fn finding(
        ftype: FindingType,
        name: &str,
        severity: Severity,
        span: (usize, usize),
    ) -> Finding {
        Finding::new(ftype, name, "pii", severity, 1.0, vec![span])
    }

    #[test]
    fn duplicates_across_detectors_collapse() {
        let a = vec![finding(FindingType::Regex, "us_ssn", Severity::High, (0, 11))];
        let b = vec![finding(FindingType::Regex, "us_ssn", Severity::High, (0, 11))];

        let merged = merge_findings(vec![a, b]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn same_name_different_span_both_kept() {
        let a = vec![finding(FindingType::Regex, "us_ssn", Severity::High, (0, 11))];
        let b = vec![finding(FindingType::Regex, "us_ssn", Severity::High, (20, 31))];

        let merged = merge_findings(vec![a, b]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_is_independent_of_detector_order() {
        let regex = vec![
            finding(FindingType::Regex, "us_ssn", Severity::High, (0, 11)),
            finding(FindingType::Regex, "email", Severity::Medium, (15, 25)),
        ];
        let semantic = vec![finding(
            FindingType::Semantic,
            "near_dup",
            Severity::Critical,
            (0, 30),
        )];

        let forward = merge_findings(vec![regex.clone(), semantic.clone()]);
        let reverse = merge_findings(vec![semantic, regex]);

        let names = |v: &[Finding]| -> Vec<String> {
            v.iter().map(|f| f.pattern_name.clone()).collect()
        };
        assert_eq!(names(&forward), names(&reverse));
    }

    #[test]
    fn output_is_sorted_severity_first() {
        let merged = merge_findings(vec![vec![
            finding(FindingType::Regex, "low_one", Severity::Low, (5, 6)),
            finding(FindingType::Regex, "crit_one", Severity::Critical, (50, 60)),
            finding(FindingType::Regex, "high_one", Severity::High, (0, 3)),
        ]]);

        let names: Vec<&str> = merged.iter().map(|f| f.pattern_name.as_str()).collect();
        assert_eq!(names, vec!["crit_one", "high_one", "low_one"]);
    }
}
