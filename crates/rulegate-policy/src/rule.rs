use rulegate_core::Decision;
use std::fmt;
use std::sync::Arc;

use crate::predicate::{join_names, Predicate};

/// A labelled pure decision over a context.
///
/// Like [`Predicate`], a rule is a shared value: cloning it shares the same
/// closure, so a base policy can be reused inside many composites. The label
/// is diagnostic only and never affects evaluation.
pub struct Rule<C> {
    label: Arc<str>,
    decide: Arc<dyn Fn(&C) -> Decision + Send + Sync>,
}

impl<C> Rule<C> {
    pub fn from_fn<F>(label: impl Into<String>, decide: F) -> Self
    where
        F: Fn(&C) -> Decision + Send + Sync + 'static,
    {
        Self {
            label: Arc::from(label.into()),
            decide: Arc::new(decide),
        }
    }

    pub fn evaluate(&self, context: &C) -> Decision {
        (self.decide)(context)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Same decision function under a new label. Used to name a policy
    /// ("restricted") after it has been assembled.
    pub fn relabel(&self, label: impl Into<String>) -> Self {
        Self {
            label: Arc::from(label.into()),
            decide: Arc::clone(&self.decide),
        }
    }
}

impl<C> Clone for Rule<C> {
    fn clone(&self) -> Self {
        Self {
            label: Arc::clone(&self.label),
            decide: Arc::clone(&self.decide),
        }
    }
}

impl<C> fmt::Debug for Rule<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rule").field(&self.label).finish()
    }
}

impl<C> fmt::Display for Rule<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

// ---------------------------------------------------------------------------
// Predicate -> Rule converters
// ---------------------------------------------------------------------------

/// Allow when `predicate` matches, otherwise abstain. Never denies.
pub fn allow<C: 'static>(predicate: Predicate<C>) -> Rule<C> {
    allow_when([predicate])
}

/// Deny when `predicate` matches, otherwise abstain. Never allows.
pub fn deny<C: 'static>(predicate: Predicate<C>) -> Rule<C> {
    deny_when([predicate])
}

/// Unconditional Allow.
pub fn allow_always<C: 'static>() -> Rule<C> {
    allow_when(Vec::new())
}

/// Unconditional Deny, typically the last entry of a chain.
pub fn deny_always<C: 'static>() -> Rule<C> {
    deny_when(Vec::new())
}

/// Allow when every predicate matches. An empty list allows unconditionally.
pub fn allow_when<C: 'static>(predicates: impl IntoIterator<Item = Predicate<C>>) -> Rule<C> {
    converter("allow", Decision::Allow, predicates.into_iter().collect())
}

/// Deny when every predicate matches. An empty list denies unconditionally.
pub fn deny_when<C: 'static>(predicates: impl IntoIterator<Item = Predicate<C>>) -> Rule<C> {
    converter("deny", Decision::Deny, predicates.into_iter().collect())
}

fn converter<C: 'static>(polarity: &str, outcome: Decision, predicates: Vec<Predicate<C>>) -> Rule<C> {
    let label = if predicates.is_empty() {
        polarity.to_string()
    } else {
        format!("{}:{}", polarity, join_names(&predicates))
    };
    Rule::from_fn(label, move |ctx: &C| {
        if predicates.iter().all(|p| p.test(ctx)) {
            outcome
        } else {
            Decision::Undecided
        }
    })
}

// ---------------------------------------------------------------------------
// Rule refinement
// ---------------------------------------------------------------------------

/// Swap Allow and Deny of `rule`; an undecided rule stays undecided.
pub fn invert<C: 'static>(rule: Rule<C>) -> Rule<C> {
    let label = format!("invert({})", rule.label());
    Rule::from_fn(label, move |ctx: &C| rule.evaluate(ctx).invert())
}

/// Scope `rule` behind `gate` and force it to decide inside that scope.
///
/// When the gate does not match the result is Undecided and `rule` is not
/// consulted at all. When it matches, an undecided `rule` yields
/// `undecided_result` instead.
pub fn force_decision_if<C: 'static>(
    gate: Predicate<C>,
    rule: Rule<C>,
    undecided_result: bool,
) -> Rule<C> {
    let label = format!("force({}:{})", gate.name(), rule.label());
    let fallback = Decision::from_bool(undecided_result);
    Rule::from_fn(label, move |ctx: &C| {
        if gate.test(ctx) {
            rule.evaluate(ctx).or_else(fallback)
        } else {
            Decision::Undecided
        }
    })
}

/// [`force_decision_if`] with the closed default: undecided becomes Deny.
pub fn force_decision_if_default<C: 'static>(gate: Predicate<C>, rule: Rule<C>) -> Rule<C> {
    force_decision_if(gate, rule, false)
}
