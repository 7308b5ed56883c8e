//! Built-in pattern catalogue.
//!
//! Used when no pattern file is configured.  Each entry carries a
//! human-readable name, its category, a regex string compiled at load time,
//! and the validator/context requirements that keep false positives down.

use firewall_types::Severity;

use crate::schema::{ContextualPattern, PatternDef, PatternFile, PatternValidator};

/// A single built-in pattern.
pub struct BuiltinPattern {
    /// Short, snake_case identifier used in logs and findings.
    pub name: &'static str,
    /// Category the pattern reports under (e.g. `api_keys`, `pii`).
    pub category: &'static str,
    /// A regex string (compiled by the loader).
    pub regex: &'static str,
    pub severity: Severity,
    pub validator: PatternValidator,
    /// Terms that must appear near the match for it to count.
    pub context_terms: &'static [&'static str],
    pub description: &'static str,
}

/// The built-in pattern library.
///
/// Patterns are intentionally kept as a static slice so that they are
/// available at zero runtime cost until the loader compiles them.
pub static PATTERNS: &[BuiltinPattern] = &[
    // ---- API keys and tokens -------------------------------------------
    BuiltinPattern {
        name: "openai_api_key",
        category: "api_keys",
        regex: r"sk-[A-Za-z0-9]{32,}",
        severity: Severity::Critical,
        validator: PatternValidator::None,
        context_terms: &[],
        description: "OpenAI API key",
    },
    BuiltinPattern {
        name: "aws_access_key",
        category: "api_keys",
        regex: r"AKIA[0-9A-Z]{16}",
        severity: Severity::Critical,
        validator: PatternValidator::None,
        context_terms: &[],
        description: "AWS access key id",
    },
    BuiltinPattern {
        name: "github_token",
        category: "api_keys",
        regex: r"ghp_[A-Za-z0-9]{36}",
        severity: Severity::Critical,
        validator: PatternValidator::None,
        context_terms: &[],
        description: "GitHub personal access token",
    },
    BuiltinPattern {
        name: "slack_token",
        category: "api_keys",
        regex: r"xox[baprs]-[A-Za-z0-9-]{10,}",
        severity: Severity::Critical,
        validator: PatternValidator::None,
        context_terms: &[],
        description: "Slack token",
    },
    BuiltinPattern {
        name: "generic_api_key",
        category: "api_keys",
        regex: r#"(?i)(api[_-]?key|apikey)\s*[:=]\s*["']?[A-Za-z0-9_\-]{20,}["']?"#,
        severity: Severity::High,
        validator: PatternValidator::None,
        context_terms: &[],
        description: "Generic api_key=... assignment",
    },
    // ---- Private keys ---------------------------------------------------
    BuiltinPattern {
        name: "pem_private_key",
        category: "private_keys",
        regex: r"-----BEGIN (?:RSA |EC |DSA |OPENSSH )?PRIVATE KEY-----(?s:.*?)-----END (?:RSA |EC |DSA |OPENSSH )?PRIVATE KEY-----",
        severity: Severity::Critical,
        validator: PatternValidator::KeyFence,
        context_terms: &[],
        description: "PEM-fenced private key block",
    },
    // ---- PII -------------------------------------------------------------
    BuiltinPattern {
        name: "us_ssn",
        category: "pii",
        regex: r"\b\d{3}-\d{2}-\d{4}\b",
        severity: Severity::High,
        validator: PatternValidator::None,
        context_terms: &[],
        description: "US social security number",
    },
    BuiltinPattern {
        name: "credit_card",
        category: "pii",
        regex: r"\b(?:\d[ -]?){12,18}\d\b",
        severity: Severity::Critical,
        validator: PatternValidator::Luhn,
        context_terms: &[],
        description: "Payment card number (Luhn-validated)",
    },
    BuiltinPattern {
        name: "email_address",
        category: "pii",
        regex: r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        severity: Severity::Medium,
        validator: PatternValidator::None,
        context_terms: &[],
        description: "Email address",
    },
    // ---- Credentials in prose -------------------------------------------
    BuiltinPattern {
        name: "password_assignment",
        category: "passwords",
        regex: r"(?i)password\s*[:=]\s*\S{6,}",
        severity: Severity::High,
        validator: PatternValidator::None,
        context_terms: &["password", "passwd", "credentials"],
        description: "Literal password assignment",
    },
];

/// Contextual trigger phrases shipped with the built-in catalogue.
pub static CONTEXTUAL_TRIGGERS: &[(&str, Severity)] = &[
    ("my password is", Severity::High),
    ("the secret key is", Severity::High),
];

/// Materialise the static catalogue as a [`PatternFile`] so it goes through
/// the same compilation path as file-loaded patterns.
pub fn default_pattern_file() -> PatternFile {
    let mut file = PatternFile {
        patterns: Default::default(),
        contextual_patterns: CONTEXTUAL_TRIGGERS
            .iter()
            .map(|(trigger, severity)| ContextualPattern {
                trigger: trigger.to_string(),
                severity: *severity,
            })
            .collect(),
    };

    for pat in PATTERNS {
        file.patterns
            .entry(pat.category.to_string())
            .or_default()
            .push(PatternDef {
                name: pat.name.to_string(),
                regex: pat.regex.to_string(),
                severity: pat.severity,
                description: Some(pat.description.to_string()),
                validator: pat.validator,
                context_terms: pat.context_terms.iter().map(|t| t.to_string()).collect(),
            });
    }

    file
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_patterns_compile() {
        for pat in PATTERNS {
            regex::Regex::new(pat.regex)
                .unwrap_or_else(|e| panic!("pattern '{}' failed to compile: {e}", pat.name));
        }
    }

    #[test]
    fn names_are_unique_within_category() {
        let mut seen = std::collections::HashSet::new();
        for pat in PATTERNS {
            assert!(
                seen.insert((pat.category, pat.name)),
                "duplicate pattern name: {}/{}",
                pat.category,
                pat.name
            );
        }
    }

    #[test]
    fn default_file_covers_all_builtin_patterns() {
        let file = default_pattern_file();
        let total: usize = file.patterns.values().map(|v| v.len()).sum();
        assert_eq!(total, PATTERNS.len());
        assert_eq!(file.contextual_patterns.len(), CONTEXTUAL_TRIGGERS.len());
    }
}
