use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Decision: three-way rule outcome
// ---------------------------------------------------------------------------

/// Outcome of evaluating a rule against a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The rule grants the request.
    Allow,
    /// The rule rejects the request.
    Deny,
    /// The rule has no opinion; the next rule in a chain is consulted.
    Undecided,
}

impl Decision {
    /// Map a boolean verdict onto a decisive outcome.
    pub fn from_bool(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    /// True for Allow and Deny.
    pub fn is_decisive(self) -> bool {
        !matches!(self, Decision::Undecided)
    }

    /// True only for an explicit Allow.
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Swap Allow and Deny. Undecided stays Undecided.
    pub fn invert(self) -> Self {
        match self {
            Decision::Allow => Decision::Deny,
            Decision::Deny => Decision::Allow,
            Decision::Undecided => Decision::Undecided,
        }
    }

    /// Replace Undecided with `fallback`; decisive values pass through.
    pub fn or_else(self, fallback: Decision) -> Self {
        match self {
            Decision::Undecided => fallback,
            decided => decided,
        }
    }

    /// `Some(true)` for Allow, `Some(false)` for Deny, `None` for Undecided.
    pub fn as_option(self) -> Option<bool> {
        match self {
            Decision::Allow => Some(true),
            Decision::Deny => Some(false),
            Decision::Undecided => None,
        }
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        Decision::from_bool(allowed)
    }
}

impl From<Option<bool>> for Decision {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Decision::Undecided, Decision::from_bool)
    }
}

impl From<Decision> for Option<bool> {
    fn from(decision: Decision) -> Self {
        decision.as_option()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::Deny => write!(f, "deny"),
            Decision::Undecided => write!(f, "undecided"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bool() {
        assert_eq!(Decision::from_bool(true), Decision::Allow);
        assert_eq!(Decision::from_bool(false), Decision::Deny);
        assert_eq!(Decision::from(true), Decision::Allow);
    }

    #[test]
    fn test_is_decisive() {
        assert!(Decision::Allow.is_decisive());
        assert!(Decision::Deny.is_decisive());
        assert!(!Decision::Undecided.is_decisive());
    }

    #[test]
    fn test_only_allow_is_allowed() {
        assert!(Decision::Allow.is_allowed());
        assert!(!Decision::Deny.is_allowed());
        assert!(!Decision::Undecided.is_allowed());
    }

    #[test]
    fn test_invert_preserves_undecided() {
        assert_eq!(Decision::Allow.invert(), Decision::Deny);
        assert_eq!(Decision::Deny.invert(), Decision::Allow);
        assert_eq!(Decision::Undecided.invert(), Decision::Undecided);
    }

    #[test]
    fn test_or_else_only_replaces_undecided() {
        assert_eq!(Decision::Undecided.or_else(Decision::Deny), Decision::Deny);
        assert_eq!(Decision::Allow.or_else(Decision::Deny), Decision::Allow);
        assert_eq!(Decision::Deny.or_else(Decision::Allow), Decision::Deny);
    }

    #[test]
    fn test_option_conversions() {
        assert_eq!(Decision::from(None), Decision::Undecided);
        assert_eq!(Decision::from(Some(false)), Decision::Deny);
        let as_opt: Option<bool> = Decision::Allow.into();
        assert_eq!(as_opt, Some(true));
        assert_eq!(Decision::Undecided.as_option(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Decision::Allow.to_string(), "allow");
        assert_eq!(Decision::Deny.to_string(), "deny");
        assert_eq!(Decision::Undecided.to_string(), "undecided");
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Decision::Undecided).unwrap();
        assert_eq!(json, "\"undecided\"");
        let parsed: Decision = serde_json::from_str("\"deny\"").unwrap();
        assert_eq!(parsed, Decision::Deny);
    }
}
