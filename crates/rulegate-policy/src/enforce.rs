use rulegate_core::Decision;
use std::fmt;

use crate::audit::{AuditSink, EnforcementEvent};
use crate::error::{PolicyError, PolicyResult};
use crate::rule::Rule;

// ---------------------------------------------------------------------------
// Rejection: raised when a rule does not explicitly allow
// ---------------------------------------------------------------------------

/// Signal that a rule denied a context or could not decide on it.
///
/// Carries the rejecting rule and a copy of the context for the caller's
/// audit trail or denial response.
pub struct Rejection<C> {
    pub rule: Rule<C>,
    pub context: C,
    pub decision: Decision,
}

impl<C> Rejection<C> {
    pub fn rule_label(&self) -> &str {
        self.rule.label()
    }

    /// True when the rule abstained rather than denied.
    pub fn was_undecided(&self) -> bool {
        self.decision == Decision::Undecided
    }
}

impl<C: fmt::Debug> fmt::Debug for Rejection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejection")
            .field("rule", &self.rule)
            .field("context", &self.context)
            .field("decision", &self.decision)
            .finish()
    }
}

impl<C> fmt::Display for Rejection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "access rejected by rule '{}' ({})",
            self.rule.label(),
            self.decision
        )
    }
}

impl<C: fmt::Debug> std::error::Error for Rejection<C> {}

// ---------------------------------------------------------------------------
// enforce / check
// ---------------------------------------------------------------------------

/// Evaluate `rule` and require an explicit Allow.
///
/// Deny and Undecided both produce a [`Rejection`]; ambiguity never grants
/// access.
pub fn enforce<C: Clone>(rule: &Rule<C>, context: &C) -> Result<Decision, Rejection<C>> {
    enforce_decision(rule, context, rule.evaluate(context))
}

/// [`enforce`] for a decision `rule` already produced on `context`, e.g.
/// the decision of a [`crate::combine::Verdict`].
pub fn enforce_decision<C: Clone>(
    rule: &Rule<C>,
    context: &C,
    decision: Decision,
) -> Result<Decision, Rejection<C>> {
    if decision.is_allowed() {
        tracing::debug!(rule = rule.label(), "access allowed");
        return Ok(decision);
    }
    tracing::warn!(rule = rule.label(), %decision, "access rejected");
    Err(Rejection {
        rule: rule.clone(),
        context: context.clone(),
        decision,
    })
}

/// Boolean form of [`enforce`]: true only for an explicit Allow.
pub fn check<C>(rule: &Rule<C>, context: &C) -> bool {
    rule.evaluate(context).is_allowed()
}

// ---------------------------------------------------------------------------
// Enforcer: enforcement with an audit trail
// ---------------------------------------------------------------------------

/// Outcome of an audited enforcement. The outer `PolicyResult` reports
/// audit failures; the inner `Result` is the access decision.
pub type Enforcement<C> = PolicyResult<Result<Decision, Rejection<C>>>;

/// Enforces rules and records every outcome to an [`AuditSink`].
pub struct Enforcer<'a> {
    audit_sink: &'a dyn AuditSink,
}

impl<'a> Enforcer<'a> {
    pub fn new(audit_sink: &'a dyn AuditSink) -> Self {
        Self { audit_sink }
    }

    /// [`enforce`], after recording the decision.
    ///
    /// If the sink fails the call returns `Err(PolicyError::AuditSinkError)`
    /// even when the rule allowed.
    pub fn enforce<C: Clone>(&self, rule: &Rule<C>, context: &C) -> Enforcement<C> {
        self.enforce_decision(rule, context, rule.evaluate(context))
    }

    /// [`enforce_decision`], after recording the decision.
    pub fn enforce_decision<C: Clone>(
        &self,
        rule: &Rule<C>,
        context: &C,
        decision: Decision,
    ) -> Enforcement<C> {
        let event = EnforcementEvent::new(rule.label(), decision);
        self.audit_sink.emit(&event).map_err(|e| {
            PolicyError::AuditSinkError(format!("failed to emit enforcement audit: {}", e))
        })?;
        Ok(enforce_decision(rule, context, decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditSink;
    use crate::predicate::{attribute_equals, Predicate};
    use crate::rule::{allow, allow_always, deny_always};
    use rulegate_core::Context;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn is_read() -> Predicate<Context> {
        attribute_equals("op", "read").renamed("isRead")
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn emit(&self, _event: &EnforcementEvent) -> Result<(), String> {
            Err("disk full".into())
        }
    }

    #[test]
    fn test_enforce_allows() {
        let rule = allow(is_read());
        let result = enforce(&rule, &Context::new().with("op", "read"));
        assert_eq!(result.unwrap(), Decision::Allow);
    }

    #[test]
    fn test_enforce_rejects_undecided_with_rule_and_context() {
        let rule = allow(is_read());
        let ctx = Context::new().with("op", "write");
        let rejection = enforce(&rule, &ctx).unwrap_err();
        assert_eq!(rejection.rule_label(), "allow:isRead");
        assert_eq!(rejection.context, ctx);
        assert_eq!(rejection.decision, Decision::Undecided);
        assert!(rejection.was_undecided());
    }

    #[test]
    fn test_enforce_rejects_deny() {
        let rejection = enforce(&deny_always(), &Context::new()).unwrap_err();
        assert_eq!(rejection.decision, Decision::Deny);
        assert!(!rejection.was_undecided());
        assert_eq!(
            rejection.to_string(),
            "access rejected by rule 'deny' (deny)"
        );
    }

    #[test]
    fn test_rejection_is_std_error() {
        let rejection = enforce(&deny_always(), &Context::new()).unwrap_err();
        let boxed: Box<dyn std::error::Error> = Box::new(rejection);
        assert!(boxed.to_string().contains("deny"));
    }

    #[test]
    fn test_check() {
        let rule = allow(is_read());
        assert!(check(&rule, &Context::new().with("op", "read")));
        assert!(!check(&rule, &Context::new()));
    }

    #[test]
    fn test_enforcer_audits_every_call() {
        let sink = InMemoryAuditSink::new();
        let enforcer = Enforcer::new(&sink);
        let rule = allow(is_read());

        let allowed = enforcer
            .enforce(&rule, &Context::new().with("op", "read"))
            .unwrap();
        assert!(allowed.is_ok());
        let rejected = enforcer
            .enforce(&rule, &Context::new().with("op", "write"))
            .unwrap();
        assert!(rejected.is_err());

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(events[0].allowed);
        assert_eq!(events[1].decision, Decision::Undecided);
        assert_eq!(events[1].rule_label, "allow:isRead");
    }

    #[test]
    fn test_enforcer_sink_failure_never_grants() {
        let sink = FailingSink;
        let enforcer = Enforcer::new(&sink);
        let err = enforcer
            .enforce(&allow_always(), &Context::new())
            .unwrap_err();
        assert!(matches!(err, PolicyError::AuditSinkError(_)));
    }

    #[test]
    fn test_enforce_decision_uses_given_decision() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let rule = Rule::from_fn("counted", move |_: &Context| {
            counter.fetch_add(1, Ordering::SeqCst);
            Decision::Allow
        });
        let ctx = Context::new();

        let decision = rule.evaluate(&ctx);
        assert_eq!(enforce_decision(&rule, &ctx, decision).unwrap(), Decision::Allow);

        let sink = InMemoryAuditSink::new();
        let rejection = Enforcer::new(&sink)
            .enforce_decision(&rule, &ctx, Decision::Undecided)
            .unwrap()
            .unwrap_err();
        assert!(rejection.was_undecided());
        assert_eq!(rejection.rule_label(), "counted");
        assert_eq!(sink.events()[0].decision, Decision::Undecided);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
