use rulegate_core::Decision;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::predicate::Predicate;
use crate::rule::{allow_always, allow_when, deny_always, deny_when, Rule};

/// Outcome of a traced chain evaluation: the decision plus which child made
/// it. `decided_by` is `None` when every child abstained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub decision: Decision,
    pub decided_by: Option<DecidingRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecidingRule {
    pub index: usize,
    pub label: String,
}

/// Evaluate `rules` in order and return the first decisive result, with
/// provenance. Undecided when every rule abstains or the list is empty.
pub fn evaluate_traced<C>(rules: &[Rule<C>], context: &C) -> Verdict {
    for (index, rule) in rules.iter().enumerate() {
        let decision = rule.evaluate(context);
        if decision.is_decisive() {
            tracing::trace!(index, rule = rule.label(), %decision, "rule decided");
            return Verdict {
                decision,
                decided_by: Some(DecidingRule {
                    index,
                    label: rule.label().to_string(),
                }),
            };
        }
    }
    tracing::trace!(rules = rules.len(), "no rule decided");
    Verdict {
        decision: Decision::Undecided,
        decided_by: None,
    }
}

/// Chain `rules` into one composite rule with first-match-wins semantics.
///
/// The composite is a rule like any other and can be nested inside further
/// chains; the children are shared, not copied.
pub fn combine_rules<C: 'static>(rules: impl IntoIterator<Item = Rule<C>>) -> Rule<C> {
    let rules: Vec<Rule<C>> = rules.into_iter().collect();
    let label = format!(
        "[{}]",
        rules.iter().map(Rule::label).collect::<Vec<_>>().join(", ")
    );
    chain_rule(label, rules)
}

/// Alias of [`combine_rules`].
pub fn build<C: 'static>(rules: impl IntoIterator<Item = Rule<C>>) -> Rule<C> {
    combine_rules(rules)
}

fn chain_rule<C: 'static>(label: String, rules: Vec<Rule<C>>) -> Rule<C> {
    let rules: Arc<[Rule<C>]> = rules.into();
    Rule::from_fn(label, move |ctx: &C| evaluate_traced(&rules, ctx).decision)
}

// ---------------------------------------------------------------------------
// RuleChain: ordered policy builder
// ---------------------------------------------------------------------------

/// Builder for an ordered list of exceptions ending in a general case.
///
/// ```
/// use rulegate_core::{Context, Decision};
/// use rulegate_policy::combine::RuleChain;
/// use rulegate_policy::predicate::{attribute_absent, attribute_equals};
///
/// let restricted = RuleChain::new("restricted")
///     .deny(attribute_absent("user"))
///     .allow(attribute_equals("op", "read"))
///     .deny_rest()
///     .build();
///
/// let ctx = Context::new().with("user", "pete").with("op", "read");
/// assert_eq!(restricted.evaluate(&ctx), Decision::Allow);
/// ```
pub struct RuleChain<C> {
    name: Option<String>,
    rules: Vec<Rule<C>>,
}

impl<C: 'static> RuleChain<C> {
    /// A chain whose composite carries `name` as its label.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            rules: Vec::new(),
        }
    }

    /// A chain labelled by its children, like [`combine_rules`].
    pub fn anonymous() -> Self {
        Self {
            name: None,
            rules: Vec::new(),
        }
    }

    /// Put an inherited policy in front of the rules added so far.
    pub fn extend(mut self, base: Rule<C>) -> Self {
        self.rules.insert(0, base);
        self
    }

    pub fn then(mut self, rule: Rule<C>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn allow(self, predicate: Predicate<C>) -> Self {
        self.allow_when([predicate])
    }

    pub fn deny(self, predicate: Predicate<C>) -> Self {
        self.deny_when([predicate])
    }

    pub fn allow_when(self, predicates: impl IntoIterator<Item = Predicate<C>>) -> Self {
        self.then(allow_when(predicates))
    }

    pub fn deny_when(self, predicates: impl IntoIterator<Item = Predicate<C>>) -> Self {
        self.then(deny_when(predicates))
    }

    /// Allow whatever reached the end of the chain.
    pub fn allow_rest(self) -> Self {
        self.then(allow_always())
    }

    /// Deny whatever reached the end of the chain.
    pub fn deny_rest(self) -> Self {
        self.then(deny_always())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The ordered children, for [`evaluate_traced`].
    pub fn rules(&self) -> &[Rule<C>] {
        &self.rules
    }

    pub fn build(self) -> Rule<C> {
        match self.name {
            Some(name) => chain_rule(name, self.rules),
            None => combine_rules(self.rules),
        }
    }
}
