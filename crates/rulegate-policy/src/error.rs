use thiserror::Error;

/// Single error enum for policy construction, compilation and auditing.
///
/// Rejections are not `PolicyError`s: an enforcement that does not end in
/// Allow yields [`crate::enforce::Rejection`], which carries the rule and
/// context that produced it.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy document parse error: {0}")]
    ParseError(String),

    #[error("unknown policy: '{0}'")]
    UnknownPolicy(String),

    #[error("policy reference cycle: {0}")]
    ReferenceCycle(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("audit sink error: {0}")]
    AuditSinkError(String),
}

impl From<toml::de::Error> for PolicyError {
    fn from(e: toml::de::Error) -> Self {
        PolicyError::ParseError(format!("TOML: {}", e))
    }
}

impl From<serde_json::Error> for PolicyError {
    fn from(e: serde_json::Error) -> Self {
        PolicyError::ParseError(format!("JSON: {}", e))
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_error_variants() {
        let errors = vec![
            PolicyError::ParseError("bad toml".into()),
            PolicyError::UnknownPolicy("restricted".into()),
            PolicyError::ReferenceCycle("a -> b -> a".into()),
            PolicyError::ValidationError("empty attribute".into()),
            PolicyError::AuditSinkError("sink unavailable".into()),
        ];
        for err in errors {
            let msg = format!("{}", err);
            assert!(!msg.is_empty());
        }
    }

    #[test]
    fn test_unknown_policy_display() {
        let err = PolicyError::UnknownPolicy("restricted".into());
        assert_eq!(err.to_string(), "unknown policy: 'restricted'");
    }

    #[test]
    fn test_from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: PolicyError = toml_err.into();
        assert!(matches!(err, PolicyError::ParseError(_)));
        assert!(err.to_string().contains("TOML"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: PolicyError = json_err.into();
        assert!(matches!(err, PolicyError::ParseError(_)));
    }

    #[test]
    fn test_policy_result_type_alias() {
        fn test_fn() -> PolicyResult<u32> {
            Ok(42)
        }
        assert_eq!(test_fn().unwrap(), 42);

        fn test_err() -> PolicyResult<u32> {
            Err(PolicyError::ValidationError("test".into()))
        }
        assert!(test_err().is_err());
    }
}
