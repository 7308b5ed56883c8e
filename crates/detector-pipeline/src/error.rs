/// The closed set of failures a validation call can surface.
///
/// Only the first three reach callers, and then only as `status = error`
/// results; detector failures, cache failures, and deadline expiry are
/// recovered inside the pipeline and recorded as flags on the result.
#[derive(Debug, thiserror::Error)]
pub enum FirewallError {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("policy not found: {0}")]
    PolicyNotFound(String),

    #[error("policy malformed: {0}")]
    PolicyMalformed(#[from] policy_engine::PolicyLoadError),

    #[error("pattern load failed: {0}")]
    PatternLoad(#[from] pattern_detect::PatternLoadError),

    /// Programmer error; the only kind allowed to escape to the transport.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<policy_engine::PolicyLookupError> for FirewallError {
    fn from(err: policy_engine::PolicyLookupError) -> Self {
        match err {
            policy_engine::PolicyLookupError::NotFound(id) => Self::PolicyNotFound(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_error_maps_to_policy_not_found() {
        let err: FirewallError =
            policy_engine::PolicyLookupError::NotFound("strict".to_string()).into();
        assert!(matches!(err, FirewallError::PolicyNotFound(ref id) if id == "strict"));
        assert_eq!(err.to_string(), "policy not found: strict");
    }
}
