//! Rulegate Policy Engine
//!
//! Composable access-control rules over an arbitrary context. A predicate
//! answers yes or no; a rule answers Allow, Deny or Undecided. Rules chain
//! with first-match-wins semantics, and enforcement is closed: anything
//! short of an explicit Allow is a rejection.
//!
//! Key features:
//! - Named predicates with short-circuiting `every`/`some`/`none` combinators
//! - Allow/deny converters, inversion and gated forcing of rules
//! - Nestable rule chains, so a specific policy can extend a general one
//! - Enforcement with a typed [`enforce::Rejection`] and an optional audit trail
//! - A request guard that merges derived and direct contexts
//! - User/operation access lists with a per-entity cache
//! - TOML/JSON policy documents compiled into rules

pub mod acl;
pub mod audit;
pub mod combine;
pub mod document;
pub mod enforce;
pub mod error;
pub mod guard;
pub mod predicate;
pub mod rule;

// Re-export primary types for convenience
pub use acl::{AccessList, AccessRequest, AclCache, AclEntity};
pub use audit::{AuditSink, EnforcementEvent, InMemoryAuditSink, TracingAuditSink};
pub use combine::{build, combine_rules, evaluate_traced, DecidingRule, RuleChain, Verdict};
pub use document::{ConditionSpec, PolicyDocument, PolicySpec, RuleSpec};
pub use enforce::{check, enforce, enforce_decision, Enforcement, Enforcer, Rejection};
pub use error::{PolicyError, PolicyResult};
pub use guard::{ContextSource, Guard, NoDerivedContext};
pub use predicate::Predicate;
pub use rule::Rule;
