use std::collections::HashSet;
use std::path::Path;

use crate::schema::Policy;

/// Errors raised while loading or validating a policy document.
#[derive(Debug, thiserror::Error)]
pub enum PolicyLoadError {
    #[error("failed to read policy file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse policy file: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("policy '{policy_id}': {reason}")]
    Invalid { policy_id: String, reason: String },
}

/// Load a [`Policy`] from a YAML file on disk.
pub fn load_policy(path: impl AsRef<Path>) -> Result<Policy, PolicyLoadError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| PolicyLoadError::Read {
        path: path.display().to_string(),
        source,
    })?;
    load_policy_from_str(&contents)
}

/// Parse and validate a [`Policy`] from a YAML string.
///
/// This is the primary entry point used in tests.
pub fn load_policy_from_str(yaml: &str) -> Result<Policy, PolicyLoadError> {
    let policy: Policy = serde_yml::from_str(yaml)?;
    validate(&policy)?;
    Ok(policy)
}

/// Run post-deserialization validation checks.
fn validate(policy: &Policy) -> Result<(), PolicyLoadError> {
    let invalid = |reason: String| PolicyLoadError::Invalid {
        policy_id: policy.policy_id.clone(),
        reason,
    };

    if policy.policy_id.is_empty() {
        return Err(invalid("policy_id must not be empty".to_string()));
    }

    if !(0.0..=1.0).contains(&policy.semantic_threshold) {
        return Err(invalid(format!(
            "semantic_threshold {} is outside [0, 1]",
            policy.semantic_threshold
        )));
    }

    let mut seen = HashSet::new();
    for rule in &policy.rules {
        if rule.name.is_empty() {
            return Err(invalid("rule name must not be empty".to_string()));
        }
        if !seen.insert(&rule.name) {
            return Err(invalid(format!("duplicate rule name: '{}'", rule.name)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_minimal_policy() {
        let yaml = r#"
policy_id: default
version: 1
"#;
        let policy = load_policy_from_str(yaml).unwrap();
        assert_eq!(policy.policy_id, "default");
        assert!(policy.rules.is_empty());
    }

    #[test]
    fn reject_duplicate_rule_names() {
        let yaml = r#"
policy_id: default
version: 1
rules:
  - name: "dup"
    action: allow
  - name: "dup"
    action: block
"#;
        let err = load_policy_from_str(yaml).unwrap_err();
        assert!(
            err.to_string().contains("duplicate rule name"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn reject_empty_rule_name() {
        let yaml = r#"
policy_id: default
version: 1
rules:
  - name: ""
    action: allow
"#;
        let err = load_policy_from_str(yaml).unwrap_err();
        assert!(
            err.to_string().contains("must not be empty"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn reject_threshold_out_of_range() {
        let yaml = r#"
policy_id: default
version: 1
semantic_threshold: 1.5
"#;
        let err = load_policy_from_str(yaml).unwrap_err();
        assert!(
            err.to_string().contains("outside [0, 1]"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn reject_unknown_action() {
        let yaml = r#"
policy_id: default
version: 1
rules:
  - name: "bad"
    action: obliterate
"#;
        assert!(load_policy_from_str(yaml).is_err());
    }

    #[test]
    fn load_from_nonexistent_file() {
        let err = load_policy("/does/not/exist.yaml").unwrap_err();
        assert!(
            err.to_string().contains("failed to read policy file"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn load_from_file_on_disk() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"
policy_id: strict
version: 2
default_action: block
rules:
  - name: warn_pii
    match: {{ categories: [pii] }}
    action: warn
"#
        )
        .unwrap();
        let policy = load_policy(tmp.path()).unwrap();
        assert_eq!(policy.policy_id, "strict");
        assert_eq!(policy.version, 2);
        assert_eq!(policy.rules.len(), 1);
    }
}
