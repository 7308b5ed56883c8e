use regex::Regex;
use tracing::{debug, trace};

use firewall_types::{Finding, FindingType, Severity, Verdict, VerdictStatus};

use crate::loader::PolicyLoadError;
use crate::schema::{Policy, Rule, RuleAction};

/// Category reported on findings synthesized by the policy layer itself.
const DENYLIST_CATEGORY: &str = "denylist";

// ---------------------------------------------------------------------------
// PolicyEngine
// ---------------------------------------------------------------------------

/// The policy evaluation engine.
///
/// Construct via [`PolicyEngine::new`], which sorts the rule list by its
/// ordering index and pre-compiles every denylist regex for repeated
/// evaluation.
pub struct PolicyEngine {
    policy: Policy,
    /// Enabled rules sorted by `(order, list position)`.
    sorted_rules: Vec<Rule>,
    /// Compiled denylist regexes, parallel to `policy.denylist.patterns`.
    denylist_regexes: Vec<Regex>,
    /// Lowercased denylist keywords and phrases.
    denylist_terms: Vec<String>,
    /// Lowercased allowlist phrases.
    allowlist_terms: Vec<String>,
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("policy_id", &self.policy.policy_id)
            .field("version", &self.policy.version)
            .field("enabled", &self.policy.enabled)
            .field("num_rules", &self.sorted_rules.len())
            .finish()
    }
}

impl PolicyEngine {
    /// Create a new engine from a validated [`Policy`].
    ///
    /// Returns an error if any denylist regex is invalid.
    pub fn new(policy: Policy) -> Result<Self, PolicyLoadError> {
        let mut keyed: Vec<(u32, usize, Rule)> = policy
            .rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| (rule.order.unwrap_or(idx as u32), idx, rule.clone()))
            .collect();
        keyed.sort_by_key(|(order, idx, _)| (*order, *idx));
        let sorted_rules = keyed.into_iter().map(|(_, _, rule)| rule).collect();

        let denylist_regexes = policy
            .denylist
            .patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| PolicyLoadError::Invalid {
                    policy_id: policy.policy_id.clone(),
                    reason: format!("invalid denylist pattern '{p}': {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let denylist_terms = policy
            .denylist
            .keywords
            .iter()
            .chain(&policy.denylist.phrases)
            .map(|t| t.to_lowercase())
            .collect();

        let allowlist_terms = policy
            .allowlist
            .phrases
            .iter()
            .map(|t| t.to_lowercase())
            .collect();

        Ok(Self {
            policy,
            sorted_rules,
            denylist_regexes,
            denylist_terms,
            allowlist_terms,
        })
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Evaluate `findings` for `prompt` and produce the final verdict.
    ///
    /// The finding list is returned on the verdict untouched (order
    /// included), whatever the decision.
    pub fn evaluate(&self, prompt: &str, findings: Vec<Finding>) -> Verdict {
        if !self.policy.enabled {
            debug!(policy_id = %self.policy.policy_id, "policy disabled");
            return Verdict {
                status: VerdictStatus::Allowed,
                is_safe: true,
                matched_rule: None,
                message: "policy disabled".to_string(),
                findings,
            };
        }

        // Deny- and allowlists are checked before any rule.
        if let Some(finding) = self.check_denylist(prompt) {
            let mut findings = findings;
            findings.push(finding);
            return Verdict {
                status: VerdictStatus::Blocked,
                is_safe: false,
                matched_rule: None,
                message: "Prompt contains denied keywords or phrases".to_string(),
                findings,
            };
        }

        if self.check_allowlist(prompt) {
            return Verdict {
                status: VerdictStatus::Allowed,
                is_safe: true,
                matched_rule: None,
                message: "Prompt matches allowlist".to_string(),
                findings,
            };
        }

        // Highest-precedence action wins across all matching rules; the
        // first rule that emitted the winning action is reported.
        let mut winner: Option<(&Rule, &Finding)> = None;
        for rule in &self.sorted_rules {
            if !rule.enabled {
                continue;
            }
            let Some(finding) = findings.iter().find(|f| rule.matcher.matches(f)) else {
                continue;
            };
            trace!(rule = %rule.name, finding = %finding.pattern_name, "rule matched");

            match &winner {
                None => winner = Some((rule, finding)),
                Some((current, _)) if rule.action.precedence() > current.action.precedence() => {
                    winner = Some((rule, finding));
                }
                Some(_) => {}
            }
        }

        let (action, matched_rule, trigger) = match winner {
            Some((rule, finding)) => (rule.action, Some(rule.name.clone()), Some(finding)),
            None => (self.policy.default_action, None, None),
        };

        let status = match action {
            RuleAction::Block => VerdictStatus::Blocked,
            RuleAction::Warn => VerdictStatus::Warned,
            RuleAction::Allow | RuleAction::Log => VerdictStatus::Allowed,
        };

        let message = match status {
            VerdictStatus::Blocked => {
                let (name, pattern, severity) = match (&matched_rule, trigger) {
                    (Some(name), Some(f)) => {
                        (name.as_str(), f.pattern_name.as_str(), f.severity)
                    }
                    // Default action was block with no matching rule.
                    _ => ("default", "default_action", Severity::Info),
                };
                format!("Blocked by rule '{name}': {pattern} ({severity})")
            }
            _ if findings.is_empty() => "Prompt is safe".to_string(),
            _ => "Allowed with warnings".to_string(),
        };

        debug!(
            policy_id = %self.policy.policy_id,
            ?status,
            matched_rule = matched_rule.as_deref(),
            findings = findings.len(),
            "policy evaluated"
        );

        Verdict {
            status,
            is_safe: status == VerdictStatus::Allowed,
            matched_rule,
            message,
            findings,
        }
    }

    /// Check the prompt against denylist terms and regexes; a hit yields a
    /// synthesized `policy`-type finding for observability.
    fn check_denylist(&self, prompt: &str) -> Option<Finding> {
        let lower = prompt.to_lowercase();

        for term in &self.denylist_terms {
            if let Some(idx) = lower.find(term.as_str()) {
                debug!(term = %term, "denylist term matched");
                return Some(
                    Finding::new(
                        FindingType::Policy,
                        term.clone(),
                        DENYLIST_CATEGORY,
                        Severity::High,
                        1.0,
                        vec![(idx, idx + term.len())],
                    )
                    .with_metadata("source", "denylist_term".to_string()),
                );
            }
        }

        for regex in &self.denylist_regexes {
            if let Some(m) = regex.find(prompt) {
                debug!(pattern = %regex.as_str(), "denylist pattern matched");
                return Some(
                    Finding::new(
                        FindingType::Policy,
                        regex.as_str().to_string(),
                        DENYLIST_CATEGORY,
                        Severity::High,
                        1.0,
                        vec![(m.start(), m.end())],
                    )
                    .with_metadata("source", "denylist_pattern".to_string()),
                );
            }
        }

        None
    }

    fn check_allowlist(&self, prompt: &str) -> bool {
        if self.allowlist_terms.is_empty() {
            return false;
        }
        let lower = prompt.to_lowercase();
        self.allowlist_terms.iter().any(|t| lower.contains(t.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_policy_from_str;

    fn engine_from_yaml(yaml: &str) -> PolicyEngine {
        let policy = load_policy_from_str(yaml).expect("test YAML should parse");
        PolicyEngine::new(policy).expect("engine construction should succeed")
    }

    fn finding(
        finding_type: FindingType,
        name: &str,
        category: &str,
        severity: Severity,
    ) -> Finding {
        Finding::new(finding_type, name, category, severity, 1.0, vec![(0, 8)])
    }

    const CREDENTIALS_POLICY: &str = r#"
policy_id: default
version: 1
default_action: allow
rules:
  - name: block_credentials
    match: { categories: [api_keys, private_keys, passwords], min_severity: high }
    action: block
  - name: warn_pii
    match: { categories: [pii] }
    action: warn
"#;

    // -- Basic decisions --

    #[test]
    fn no_findings_is_safe() {
        let engine = engine_from_yaml(CREDENTIALS_POLICY);
        let verdict = engine.evaluate("What is the capital of France?", Vec::new());
        assert_eq!(verdict.status, VerdictStatus::Allowed);
        assert!(verdict.is_safe);
        assert_eq!(verdict.message, "Prompt is safe");
        assert!(verdict.matched_rule.is_none());
    }

    #[test]
    fn critical_api_key_is_blocked_with_message() {
        let engine = engine_from_yaml(CREDENTIALS_POLICY);
        let f = finding(
            FindingType::Regex,
            "openai_api_key",
            "api_keys",
            Severity::Critical,
        );
        let verdict = engine.evaluate("my key is sk-...", vec![f]);

        assert_eq!(verdict.status, VerdictStatus::Blocked);
        assert!(!verdict.is_safe);
        assert_eq!(verdict.matched_rule.as_deref(), Some("block_credentials"));
        assert_eq!(
            verdict.message,
            "Blocked by rule 'block_credentials': openai_api_key (critical)"
        );
        assert_eq!(verdict.findings.len(), 1);
    }

    #[test]
    fn pii_is_warned() {
        let engine = engine_from_yaml(CREDENTIALS_POLICY);
        let f = finding(FindingType::Regex, "us_ssn", "pii", Severity::High);
        let verdict = engine.evaluate("ssn...", vec![f]);

        assert_eq!(verdict.status, VerdictStatus::Warned);
        assert!(!verdict.is_safe);
        assert_eq!(verdict.matched_rule.as_deref(), Some("warn_pii"));
        assert_eq!(verdict.message, "Allowed with warnings");
    }

    #[test]
    fn severity_floor_filters_rule() {
        let engine = engine_from_yaml(CREDENTIALS_POLICY);
        // api_keys finding below the high floor: block_credentials does not
        // match, and no other rule covers the category.
        let f = finding(FindingType::Regex, "weak_key", "api_keys", Severity::Medium);
        let verdict = engine.evaluate("...", vec![f]);
        assert_eq!(verdict.status, VerdictStatus::Allowed);
        assert_eq!(verdict.message, "Allowed with warnings");
    }

    // -- Precedence --

    #[test]
    fn block_beats_warn_whatever_the_rule_order() {
        let engine = engine_from_yaml(
            r#"
policy_id: default
version: 1
default_action: allow
rules:
  - name: warn_first
    match: { categories: [pii] }
    action: warn
  - name: block_later
    match: { categories: [api_keys] }
    action: block
"#,
        );
        let verdict = engine.evaluate(
            "...",
            vec![
                finding(FindingType::Regex, "us_ssn", "pii", Severity::High),
                finding(FindingType::Regex, "key", "api_keys", Severity::Critical),
            ],
        );
        assert_eq!(verdict.status, VerdictStatus::Blocked);
        assert_eq!(verdict.matched_rule.as_deref(), Some("block_later"));
    }

    #[test]
    fn warn_beats_log_beats_allow() {
        let engine = engine_from_yaml(
            r#"
policy_id: default
version: 1
default_action: allow
rules:
  - name: allow_info
    match: { categories: [pii] }
    action: allow
  - name: log_pii
    match: { categories: [pii] }
    action: log
  - name: warn_pii
    match: { categories: [pii] }
    action: warn
"#,
        );
        let verdict = engine.evaluate(
            "...",
            vec![finding(FindingType::Regex, "us_ssn", "pii", Severity::High)],
        );
        assert_eq!(verdict.status, VerdictStatus::Warned);
        assert_eq!(verdict.matched_rule.as_deref(), Some("warn_pii"));
    }

    #[test]
    fn first_rule_with_winning_action_is_reported() {
        let engine = engine_from_yaml(
            r#"
policy_id: default
version: 1
default_action: allow
rules:
  - name: block_a
    match: { categories: [api_keys] }
    action: block
  - name: block_b
    match: { categories: [pii] }
    action: block
"#,
        );
        let verdict = engine.evaluate(
            "...",
            vec![
                finding(FindingType::Regex, "us_ssn", "pii", Severity::High),
                finding(FindingType::Regex, "key", "api_keys", Severity::Critical),
            ],
        );
        assert_eq!(verdict.matched_rule.as_deref(), Some("block_a"));
    }

    #[test]
    fn log_action_allows_but_returns_findings() {
        let engine = engine_from_yaml(
            r#"
policy_id: default
version: 1
default_action: allow
rules:
  - name: log_semantic
    match: { types: [semantic] }
    action: log
"#,
        );
        let f = Finding::new(
            FindingType::Semantic,
            "near_dup",
            "infrastructure",
            Severity::Medium,
            0.9,
            vec![(0, 10)],
        );
        let verdict = engine.evaluate("...", vec![f]);
        assert_eq!(verdict.status, VerdictStatus::Allowed);
        assert!(verdict.is_safe);
        assert_eq!(verdict.findings.len(), 1);
        assert_eq!(verdict.message, "Allowed with warnings");
    }

    // -- Ordering index --

    #[test]
    fn explicit_order_overrides_list_position() {
        let engine = engine_from_yaml(
            r#"
policy_id: default
version: 1
default_action: allow
rules:
  - name: listed_first
    order: 10
    match: { categories: [pii] }
    action: block
  - name: listed_second
    order: 1
    match: { categories: [pii] }
    action: block
"#,
        );
        let verdict = engine.evaluate(
            "...",
            vec![finding(FindingType::Regex, "us_ssn", "pii", Severity::High)],
        );
        assert_eq!(verdict.matched_rule.as_deref(), Some("listed_second"));
    }

    // -- Disabled rules and policies --

    #[test]
    fn disabled_rule_is_skipped() {
        let engine = engine_from_yaml(
            r#"
policy_id: default
version: 1
default_action: allow
rules:
  - name: block_pii
    enabled: false
    match: { categories: [pii] }
    action: block
"#,
        );
        let verdict = engine.evaluate(
            "...",
            vec![finding(FindingType::Regex, "us_ssn", "pii", Severity::High)],
        );
        assert_eq!(verdict.status, VerdictStatus::Allowed);
    }

    #[test]
    fn disabled_policy_allows_but_keeps_findings() {
        let engine = engine_from_yaml(
            r#"
policy_id: default
version: 1
enabled: false
default_action: block
rules:
  - name: block_everything
    action: block
"#,
        );
        let f = finding(FindingType::Regex, "key", "api_keys", Severity::Critical);
        let verdict = engine.evaluate("...", vec![f]);
        assert_eq!(verdict.status, VerdictStatus::Allowed);
        assert!(verdict.is_safe);
        assert_eq!(verdict.message, "policy disabled");
        assert_eq!(verdict.findings.len(), 1);
    }

    // -- Default action --

    #[test]
    fn default_action_block_applies_without_rules() {
        let engine = engine_from_yaml(
            r#"
policy_id: locked-down
version: 1
default_action: block
"#,
        );
        let f = finding(FindingType::Regex, "us_ssn", "pii", Severity::High);
        let verdict = engine.evaluate("...", vec![f]);
        assert_eq!(verdict.status, VerdictStatus::Blocked);
        assert!(verdict.matched_rule.is_none());
    }

    // -- Deny/allow lists --

    #[test]
    fn denylist_keyword_blocks_and_synthesizes_finding() {
        let engine = engine_from_yaml(
            r#"
policy_id: default
version: 1
default_action: allow
denylist:
  keywords: ["classified"]
"#,
        );
        let verdict = engine.evaluate("this is Classified material", Vec::new());
        assert_eq!(verdict.status, VerdictStatus::Blocked);
        assert_eq!(verdict.findings.len(), 1);
        assert_eq!(verdict.findings[0].finding_type, FindingType::Policy);
        assert_eq!(verdict.findings[0].category, "denylist");
    }

    #[test]
    fn denylist_regex_blocks() {
        let engine = engine_from_yaml(
            r#"
policy_id: default
version: 1
default_action: allow
denylist:
  patterns: ['(?i)top\s+secret']
"#,
        );
        let verdict = engine.evaluate("TOP  SECRET dossier", Vec::new());
        assert_eq!(verdict.status, VerdictStatus::Blocked);
    }

    #[test]
    fn allowlist_short_circuits_rules() {
        let engine = engine_from_yaml(
            r#"
policy_id: default
version: 1
default_action: allow
allowlist:
  phrases: ["approved test prompt"]
rules:
  - name: block_pii
    match: { categories: [pii] }
    action: block
"#,
        );
        let f = finding(FindingType::Regex, "us_ssn", "pii", Severity::High);
        let verdict = engine.evaluate("APPROVED TEST PROMPT with 123-45-6789", vec![f]);
        assert_eq!(verdict.status, VerdictStatus::Allowed);
        assert_eq!(verdict.message, "Prompt matches allowlist");
    }

    #[test]
    fn invalid_denylist_regex_rejected_at_construction() {
        let policy = load_policy_from_str(
            r#"
policy_id: default
version: 1
denylist:
  patterns: ['[unclosed']
"#,
        )
        .unwrap();
        let err = PolicyEngine::new(policy).unwrap_err();
        assert!(
            err.to_string().contains("invalid denylist pattern"),
            "unexpected error: {err}"
        );
    }
}
