use rulegate_core::{Context, Decision};
use rulegate_policy::Rejection;
use thiserror::Error;

/// Error type for the rulegate root crate and binary, aggregating errors
/// from the library crates.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("policy error: {0}")]
    Policy(#[from] rulegate_policy::PolicyError),

    #[error("context error: {0}")]
    Core(#[from] rulegate_core::CoreError),

    /// An enforced check ended without an explicit Allow.
    #[error("access rejected by rule '{rule_label}' ({decision})")]
    Rejected {
        rule_label: String,
        context: Context,
        decision: Decision,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<Rejection<Context>> for RootError {
    fn from(rejection: Rejection<Context>) -> Self {
        RootError::Rejected {
            rule_label: rejection.rule_label().to_string(),
            context: rejection.context,
            decision: rejection.decision,
        }
    }
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
