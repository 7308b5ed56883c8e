use serde::{Deserialize, Serialize};

use firewall_types::{Finding, FindingType, Severity};

/// Top-level policy document loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Unique, stable identifier requests select the policy by.
    pub policy_id: String,
    /// Monotonically increasing; bumped on every edit so cached verdicts
    /// keyed on the old version stop matching.
    pub version: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum cosine similarity for semantic findings under this policy.
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f64,
    /// Action taken when no rule matches.
    #[serde(default)]
    pub default_action: RuleAction,
    /// Ordered list of rules evaluated against the finding set.
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Phrase/keyword/regex blocks checked before any rule.
    #[serde(default)]
    pub denylist: Denylist,
    /// Phrases that short-circuit straight to `allowed`.
    #[serde(default)]
    pub allowlist: Allowlist,
}

fn default_true() -> bool {
    true
}

fn default_semantic_threshold() -> f64 {
    0.85
}

/// A single policy rule: a predicate over findings plus the action to take
/// when any finding satisfies it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Human-readable, unique rule name.
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Explicit ordering index; rules without one keep their list position.
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(rename = "match", default)]
    pub matcher: RuleMatch,
    pub action: RuleAction,
}

/// Predicate over a [`Finding`]. All present constraints must hold
/// (AND logic); empty lists mean "any".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleMatch {
    /// Finding categories the rule applies to; empty matches every category.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Severity floor; findings below it never match.
    #[serde(default)]
    pub min_severity: Option<Severity>,
    /// Finding types the rule applies to; empty matches every type.
    #[serde(default)]
    pub types: Vec<FindingType>,
}

impl RuleMatch {
    /// Check the predicate against one finding.
    pub fn matches(&self, finding: &Finding) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&finding.category) {
            return false;
        }
        if let Some(floor) = self.min_severity {
            if finding.severity < floor {
                return false;
            }
        }
        if !self.types.is_empty() && !self.types.contains(&finding.finding_type) {
            return false;
        }
        true
    }
}

/// What to do when a rule (or the default) fires.
///
/// Precedence when several rules match: `Block > Warn > Log > Allow`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    #[default]
    Allow,
    Log,
    Warn,
    Block,
}

impl RuleAction {
    /// Numeric precedence; higher wins.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::Log => 1,
            Self::Warn => 2,
            Self::Block => 3,
        }
    }
}

/// Keywords, phrases, and regexes that block a prompt outright.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Denylist {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub phrases: Vec<String>,
    /// Regex sources; compiled at load time.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Denylist {
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.phrases.is_empty() && self.patterns.is_empty()
    }
}

/// Phrases that mark a prompt as pre-approved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Allowlist {
    #[serde(default)]
    pub phrases: Vec<String>,
}
