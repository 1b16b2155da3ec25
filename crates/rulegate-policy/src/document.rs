//! Declarative policy documents.
//!
//! A document is a set of named policies, each an ordered list of rule
//! specs over [`Context`] attributes. Policies may reference each other by
//! name, which is how a specific policy inherits a common base:
//!
//! ```toml
//! [policies.restricted]
//! rules = [
//!   { kind = "deny", when = [{ op = "absent", attribute = "user" }] },
//!   { kind = "allow", when = [{ op = "equals", attribute = "operation", value = "read" }] },
//! ]
//!
//! [policies.owner_may_write]
//! rules = [
//!   { kind = "policy", name = "restricted" },
//!   { kind = "allow", when = [{ op = "equals", attribute = "user", value = "owner" }] },
//!   { kind = "deny" },
//! ]
//! ```

use rulegate_core::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::combine::combine_rules;
use crate::error::{PolicyError, PolicyResult};
use crate::predicate::{
    always, attribute_absent, attribute_equals, attribute_in, attribute_present, every, never,
    none, not, some, Predicate,
};
use crate::rule::{allow_when, deny_when, force_decision_if, invert, Rule};

/// A predicate in declarative form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ConditionSpec {
    Always,
    Never,
    Present {
        attribute: String,
    },
    Absent {
        attribute: String,
    },
    Equals {
        attribute: String,
        value: Value,
    },
    OneOf {
        attribute: String,
        values: Vec<Value>,
    },
    Not {
        condition: Box<ConditionSpec>,
    },
    Every {
        conditions: Vec<ConditionSpec>,
    },
    #[serde(rename = "some", alias = "any")]
    Any {
        conditions: Vec<ConditionSpec>,
    },
    #[serde(rename = "none")]
    NoneOf {
        conditions: Vec<ConditionSpec>,
    },
}

/// A rule in declarative form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    /// Allow when every condition holds; no conditions allows outright.
    Allow {
        #[serde(default)]
        when: Vec<ConditionSpec>,
    },
    /// Deny when every condition holds; no conditions denies outright.
    Deny {
        #[serde(default)]
        when: Vec<ConditionSpec>,
    },
    Invert {
        rule: Box<RuleSpec>,
    },
    /// Consult `rule` only when `gate` holds, and turn its abstention into
    /// `undecided` (false = deny).
    Force {
        gate: ConditionSpec,
        rule: Box<RuleSpec>,
        #[serde(default)]
        undecided: bool,
    },
    Chain {
        rules: Vec<RuleSpec>,
    },
    /// Another policy of the same document.
    Policy {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub policies: BTreeMap<String, PolicySpec>,
}

impl PolicyDocument {
    pub fn from_toml_str(source: &str) -> PolicyResult<Self> {
        let document: PolicyDocument = toml::from_str(source)?;
        tracing::info!(policies = document.policies.len(), "loaded TOML policy document");
        Ok(document)
    }

    pub fn from_json_str(source: &str) -> PolicyResult<Self> {
        let document: PolicyDocument = serde_json::from_str(source)?;
        tracing::info!(policies = document.policies.len(), "loaded JSON policy document");
        Ok(document)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&PolicySpec> {
        self.policies.get(name)
    }

    /// Compile one policy (and everything it references) into a rule
    /// labelled with the policy name.
    pub fn compile(&self, name: &str) -> PolicyResult<Rule<Context>> {
        Compiler::new(self).policy(name)
    }

    /// Compile the top-level rules of one policy without chaining them, for
    /// callers that want to know which member decided
    /// (see [`crate::combine::evaluate_traced`]).
    pub fn compile_members(&self, name: &str) -> PolicyResult<Vec<Rule<Context>>> {
        Compiler::new(self).members(name)
    }

    /// Compile every policy. A policy referenced from several others is
    /// compiled once and shared.
    pub fn compile_all(&self) -> PolicyResult<BTreeMap<String, Rule<Context>>> {
        let mut compiler = Compiler::new(self);
        let mut compiled = BTreeMap::new();
        for name in self.policies.keys() {
            compiled.insert(name.clone(), compiler.policy(name)?);
        }
        Ok(compiled)
    }

    /// Check that every policy compiles: references resolve, there are no
    /// reference cycles, and attribute names are non-empty.
    pub fn validate(&self) -> PolicyResult<()> {
        self.compile_all().map(|_| ())
    }
}

struct Compiler<'a> {
    document: &'a PolicyDocument,
    compiled: HashMap<String, Rule<Context>>,
    in_progress: Vec<String>,
}

impl<'a> Compiler<'a> {
    fn new(document: &'a PolicyDocument) -> Self {
        Self {
            document,
            compiled: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    fn policy(&mut self, name: &str) -> PolicyResult<Rule<Context>> {
        if let Some(rule) = self.compiled.get(name) {
            return Ok(rule.clone());
        }
        let members = self.members(name)?;
        let count = members.len();
        let rule = combine_rules(members).relabel(name);
        tracing::debug!(policy = name, rules = count, "compiled policy");
        self.compiled.insert(name.to_string(), rule.clone());
        Ok(rule)
    }

    fn members(&mut self, name: &str) -> PolicyResult<Vec<Rule<Context>>> {
        if self.in_progress.iter().any(|n| n == name) {
            let mut path = self.in_progress.clone();
            path.push(name.to_string());
            return Err(PolicyError::ReferenceCycle(path.join(" -> ")));
        }
        let document = self.document;
        let spec = document
            .policies
            .get(name)
            .ok_or_else(|| PolicyError::UnknownPolicy(name.to_string()))?;

        self.in_progress.push(name.to_string());
        let rules = spec
            .rules
            .iter()
            .map(|rule| self.rule(rule))
            .collect::<PolicyResult<Vec<_>>>()?;
        self.in_progress.pop();
        Ok(rules)
    }

    fn rule(&mut self, spec: &RuleSpec) -> PolicyResult<Rule<Context>> {
        match spec {
            RuleSpec::Allow { when } => Ok(allow_when(conditions(when)?)),
            RuleSpec::Deny { when } => Ok(deny_when(conditions(when)?)),
            RuleSpec::Invert { rule } => Ok(invert(self.rule(rule)?)),
            RuleSpec::Force {
                gate,
                rule,
                undecided,
            } => Ok(force_decision_if(
                condition(gate)?,
                self.rule(rule)?,
                *undecided,
            )),
            RuleSpec::Chain { rules } => {
                let rules = rules
                    .iter()
                    .map(|rule| self.rule(rule))
                    .collect::<PolicyResult<Vec<_>>>()?;
                Ok(combine_rules(rules))
            }
            RuleSpec::Policy { name } => self.policy(name),
        }
    }
}

fn conditions(specs: &[ConditionSpec]) -> PolicyResult<Vec<Predicate<Context>>> {
    specs.iter().map(condition).collect()
}

fn condition(spec: &ConditionSpec) -> PolicyResult<Predicate<Context>> {
    let predicate = match spec {
        ConditionSpec::Always => always(),
        ConditionSpec::Never => never(),
        ConditionSpec::Present { attribute } => attribute_present(checked(attribute)?),
        ConditionSpec::Absent { attribute } => attribute_absent(checked(attribute)?),
        ConditionSpec::Equals { attribute, value } => {
            attribute_equals(checked(attribute)?, value.clone())
        }
        ConditionSpec::OneOf { attribute, values } => {
            attribute_in(checked(attribute)?, values.iter().cloned())
        }
        ConditionSpec::Not { condition: inner } => not(condition(inner)?),
        ConditionSpec::Every { conditions: inner } => every(conditions(inner)?),
        ConditionSpec::Any { conditions: inner } => some(conditions(inner)?),
        ConditionSpec::NoneOf { conditions: inner } => none(conditions(inner)?),
    };
    Ok(predicate)
}

fn checked(attribute: &str) -> PolicyResult<&str> {
    if attribute.trim().is_empty() {
        return Err(PolicyError::ValidationError(
            "condition attribute name must not be empty".into(),
        ));
    }
    Ok(attribute)
}
